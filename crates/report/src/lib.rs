use anyhow::{Context, Result};
use serde::Serialize;
use snapclone_core::{now_utc_rfc3339, REPORT_SCHEMA_VERSION};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ReportPaths {
    pub run_id: String,
    pub root: PathBuf,
    pub run_json: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub snapshot: String,
    pub stage: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub target: String,
    pub dry_run: bool,
    pub cloned: Vec<String>,
    pub failed: Vec<FailureEntry>,
    pub verified: Option<bool>,
}

#[derive(Debug, Serialize)]
struct RunMetadata<'a> {
    run_id: String,
    created_at_utc: String,
    schema_version: String,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

pub fn create_report_bundle(base: impl AsRef<Path>, summary: &RunSummary) -> Result<ReportPaths> {
    let run_id = Uuid::new_v4().to_string();
    let base = base.as_ref();
    let root = base.join("reports").join(&run_id);
    std::fs::create_dir_all(&root).with_context(|| format!("create {}", root.display()))?;

    let run_json = root.join("run.json");
    let run_meta = RunMetadata {
        run_id: run_id.clone(),
        created_at_utc: now_utc_rfc3339(),
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        summary,
    };
    let data = serde_json::to_string_pretty(&run_meta)?;
    std::fs::write(&run_json, data).with_context(|| format!("write {}", run_json.display()))?;

    Ok(ReportPaths {
        run_id,
        root,
        run_json,
    })
}
