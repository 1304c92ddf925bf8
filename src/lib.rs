//! dealmap: outreach and deal-pipeline intelligence for the acquisition
//! dashboard.
//!
//! One batch run: fetch the CRM outreach source, the flat CSV company
//! exports, and the spreadsheet pipeline export; reconcile company identities
//! across them by normalized name; enrich every company with approximate
//! coordinates (cache → batch geocoder → centroid fallback); and write the
//! single denormalized `data.json` the dashboard consumes.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod geo;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod sources;
pub mod types;

use std::collections::HashMap;
use std::path::Path;

use config::Config;
use error::PipelineError;
use geo::{GeoResolver, GeocodeRequest};
use normalize::company_key;
use sources::outreach::CrmClient;
use sources::CompanyInfo;
use types::OutputDoc;

/// Run the whole pipeline once and return the document that was written.
pub async fn run(config: &Config) -> Result<OutputDoc, PipelineError> {
    // Primary source: CRM outreach. Table failures degrade inside.
    let crm = CrmClient::new(config);
    let outreach = sources::outreach::fetch_outreach(&crm, &config.tables).await;

    // Secondary flat CSV exports, highest precedence after the CRM directory.
    let view_all = load_optional_csv(config.directory_csv.as_deref(), "company directory export");
    let working = load_optional_csv(config.working_sheet_csv.as_deref(), "working sheet export");

    // Pipeline deals + action tracker.
    let http = reqwest::Client::new();
    let (deals, actions) = sources::pipeline::fetch_pipeline(&http, config).await;

    // Reconcile. Source precedence: CRM directory → view-all → working sheet.
    let company_sources = vec![outreach.directory, view_all, working];
    let mut companies = merge::merge(&outreach.aggregates, &company_sources, &deals);
    log::info!("merged {} companies", companies.len());

    // Geocode: collect every cache miss, one batch call, write-back, then
    // assign coordinates from the cache or the deterministic fallback.
    let requests: Vec<GeocodeRequest> = companies
        .iter()
        .map(|c| GeocodeRequest {
            key: company_key(&c.name),
            address: c.address.clone(),
            state: c.state.clone(),
            name: c.name.clone(),
        })
        .collect();
    let mut resolver = GeoResolver::load(&config.cache_file);
    resolver.resolve_misses(&requests).await;
    for (company, request) in companies.iter_mut().zip(&requests) {
        let (lat, lng) = resolver.coords_for(request);
        company.lat = lat;
        company.lng = lng;
    }
    if let Err(e) = resolver.save() {
        log::warn!(
            "could not save geocode cache {}: {}",
            config.cache_file.display(),
            e
        );
    }

    let meta = aggregate::aggregate(&outreach.messages);

    let doc = OutputDoc {
        companies,
        pipeline: deals,
        actions,
        meta,
    };
    output::write_output(&doc, &config.output_file)?;
    log_summary(&doc, &resolver);

    Ok(doc)
}

fn load_optional_csv(path: Option<&Path>, label: &str) -> HashMap<String, CompanyInfo> {
    let Some(path) = path else {
        log::info!("{} not configured, skipping", label);
        return HashMap::new();
    };
    match sources::directory::load_company_csv(path) {
        Ok(companies) => {
            log::info!("{}: {} companies", label, companies.len());
            companies
        }
        Err(e) => {
            log::warn!("{} {} unavailable: {}", label, path.display(), e);
            HashMap::new()
        }
    }
}

fn log_summary(doc: &OutputDoc, resolver: &GeoResolver) {
    let c = &doc.companies;
    log::info!("total companies: {}", c.len());
    log::info!(
        "with coordinates: {}",
        c.iter().filter(|x| x.lat.is_some()).count()
    );
    log::info!("geocode cache entries: {}", resolver.cache_len());
    log::info!(
        "with messages: {}",
        c.iter().filter(|x| x.msgs_sent > 0).count()
    );
    log::info!("total messages: {}", doc.meta.total_messages);
    log::info!("responded: {}", c.iter().filter(|x| x.responded).count());
    log::info!(
        "scheduled intro: {}",
        c.iter().filter(|x| x.scheduled_intro).count()
    );
    log::info!(
        "assisted meeting: {}",
        c.iter().filter(|x| x.assisted_meeting).count()
    );
    log::info!(
        "not interested: {}",
        c.iter().filter(|x| x.not_interested).count()
    );
    log::info!(
        "in pipeline: {}",
        c.iter().filter(|x| x.in_pipeline).count()
    );
    log::info!("pipeline deals: {}", doc.pipeline.len());
}
