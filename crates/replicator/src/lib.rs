mod replicate;
mod transient;
mod verify;
#[cfg(test)]
mod fake;

use serde::{Deserialize, Serialize};
use snapclone_core::{
    extract_identity, DefinitionParseError, DocumentRewriteError, ExternalToolError,
    IdentityRecord, SnapshotHost,
};
use snapclone_safety::{can_replicate, SafetyContext, SafetyDecision};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

pub use replicate::{replicate, FailedSnapshot, FailureStage, ReplicationOutcome};
pub use transient::TransientDocument;
pub use verify::verify;

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error(transparent)]
    Definition(#[from] DefinitionParseError),
    #[error("snapshot {snapshot}")]
    Rewrite {
        snapshot: String,
        #[source]
        source: DocumentRewriteError,
    },
    #[error(transparent)]
    Tool(#[from] ExternalToolError),
    #[error("transient document {}", .path.display())]
    TransientFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot {snapshot} was reached before its parent {parent} was committed")]
    OrderViolation { snapshot: String, parent: String },
    #[error("snapshot {0} was listed more than once")]
    Revisited(String),
    #[error("{0}")]
    Denied(String),
}

/// Neither policy rolls back snapshots already committed to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!("unsupported failure policy {}", other)),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => f.write_str("abort"),
            FailurePolicy::Continue => f.write_str("continue"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplicationSettings {
    pub policy: FailurePolicy,
    pub dry_run: bool,
    pub transient_dir: PathBuf,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::default(),
            dry_run: false,
            transient_dir: std::env::temp_dir(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CloneParams {
    pub source: String,
    pub target: String,
    pub force: bool,
    pub settings: ReplicationSettings,
}

#[derive(Debug)]
pub struct CloneResult {
    pub target_identity: IdentityRecord,
    pub outcome: ReplicationOutcome,
    pub verified: Option<bool>,
}

impl CloneResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_complete() && self.verified != Some(false)
    }
}

pub fn run_clone<H: SnapshotHost + ?Sized>(
    host: &H,
    params: &CloneParams,
) -> Result<CloneResult, ReplicationError> {
    let definition = host.dump_machine_definition(&params.target)?;
    let target_identity = extract_identity(&definition)?;
    info!(
        target = %target_identity.name,
        interfaces = target_identity.interface_addresses.len(),
        disks = target_identity.disk_paths.len(),
        "read target identity"
    );

    let existing = host.list_all_snapshots(&params.target)?;
    let ctx = SafetyContext {
        force_mode: params.force,
    };
    match can_replicate(&ctx, &params.source, &params.target, &existing) {
        SafetyDecision::Allow => {}
        SafetyDecision::Deny(reason) => return Err(ReplicationError::Denied(reason)),
    }

    let outcome = replicate(host, &params.source, &target_identity, &params.settings)?;

    let verified = if params.settings.dry_run {
        None
    } else {
        Some(verify(host, &params.source, &params.target)?)
    };
    info!(
        cloned = outcome.cloned.len(),
        failed = outcome.failed.len(),
        verified = ?verified,
        "replication finished"
    );

    Ok(CloneResult {
        target_identity,
        outcome,
        verified,
    })
}
