//! Output document serialization.
//!
//! The document is written pretty-printed and atomically: a tempfile in the
//! destination directory persisted over the target, so the dashboard never
//! observes a half-written file.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::PipelineError;
use crate::types::OutputDoc;

pub fn write_output(doc: &OutputDoc, path: &Path) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(doc)?;

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path)
        .map_err(|e| PipelineError::Io(e.error))?;

    log::info!("wrote {} ({} bytes)", path.display(), json.len());
    Ok(())
}
