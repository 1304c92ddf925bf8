//! Binary entry. One pipeline run, start to finish.
//!
//! A missing CRM credential is the only fatal startup condition and is
//! reported before any fetch; everything else degrades to a best-effort
//! output document.

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match dealmap::config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = dealmap::run(&config).await {
        log::error!("pipeline failed: {}", e);
        std::process::exit(1);
    }
}
