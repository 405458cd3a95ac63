use crate::transient::TransientDocument;
use crate::{FailurePolicy, ReplicationError, ReplicationSettings};
use snapclone_core::{rewrite_identity, IdentityRecord, SnapshotHost};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The snapshot itself was not committed.
    Clone,
    /// The snapshot was committed but its children could not be listed.
    ChildDiscovery,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Clone => "clone",
            FailureStage::ChildDiscovery => "child-discovery",
        })
    }
}

#[derive(Debug)]
pub struct FailedSnapshot {
    pub snapshot: String,
    pub stage: FailureStage,
    pub error: ReplicationError,
}

#[derive(Debug, Default)]
pub struct ReplicationOutcome {
    pub cloned: Vec<String>,
    pub failed: Vec<FailedSnapshot>,
}

impl ReplicationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Pending {
    snapshot: String,
    parent: Option<String>,
}

// A snapshot only enters the stack once its parent has been committed.
pub fn replicate<H: SnapshotHost + ?Sized>(
    host: &H,
    source: &str,
    target: &IdentityRecord,
    settings: &ReplicationSettings,
) -> Result<ReplicationOutcome, ReplicationError> {
    let roots = host.list_root_snapshots(source)?;
    debug!(source, roots = roots.len(), "discovered root snapshots");

    let mut pending: Vec<Pending> = roots
        .into_iter()
        .rev()
        .map(|snapshot| Pending {
            snapshot,
            parent: None,
        })
        .collect();
    let mut seen = HashSet::new();
    let mut committed = HashSet::new();
    let mut outcome = ReplicationOutcome::default();

    while let Some(node) = pending.pop() {
        if !seen.insert(node.snapshot.clone()) {
            return Err(ReplicationError::Revisited(node.snapshot));
        }
        if let Some(parent) = &node.parent {
            if !committed.contains(parent) {
                return Err(ReplicationError::OrderViolation {
                    snapshot: node.snapshot,
                    parent: parent.clone(),
                });
            }
        }

        if let Err(error) = clone_one(host, source, &node.snapshot, target, settings) {
            record_failure(
                settings.policy,
                node.snapshot,
                FailureStage::Clone,
                error,
                &mut outcome,
            )?;
            continue;
        }
        info!(snapshot = %node.snapshot, target = %target.name, dry_run = settings.dry_run, "cloned snapshot");
        committed.insert(node.snapshot.clone());
        outcome.cloned.push(node.snapshot.clone());

        let children = match host.list_child_snapshots(source, &node.snapshot) {
            Ok(children) => children,
            Err(error) => {
                record_failure(
                    settings.policy,
                    node.snapshot,
                    FailureStage::ChildDiscovery,
                    error.into(),
                    &mut outcome,
                )?;
                continue;
            }
        };
        pending.extend(children.into_iter().rev().map(|child| Pending {
            snapshot: child,
            parent: Some(node.snapshot.clone()),
        }));
    }

    Ok(outcome)
}

fn clone_one<H: SnapshotHost + ?Sized>(
    host: &H,
    source: &str,
    snapshot: &str,
    target: &IdentityRecord,
    settings: &ReplicationSettings,
) -> Result<(), ReplicationError> {
    let snapshot_xml = host.dump_snapshot_definition(source, snapshot)?;
    let rewritten =
        rewrite_identity(&snapshot_xml, target).map_err(|err| ReplicationError::Rewrite {
            snapshot: snapshot.to_string(),
            source: err,
        })?;

    if settings.dry_run {
        debug!(snapshot, bytes = rewritten.len(), "dry run, not defining");
        return Ok(());
    }

    let document =
        TransientDocument::write(&settings.transient_dir, source, snapshot, &rewritten)?;
    host.define_snapshot(&target.name, document.path())?;
    Ok(())
}

fn record_failure(
    policy: FailurePolicy,
    snapshot: String,
    stage: FailureStage,
    error: ReplicationError,
    outcome: &mut ReplicationOutcome,
) -> Result<(), ReplicationError> {
    match policy {
        FailurePolicy::Abort => Err(error),
        FailurePolicy::Continue => {
            warn!(snapshot = %snapshot, %stage, error = %error, "skipping descendants");
            outcome.failed.push(FailedSnapshot {
                snapshot,
                stage,
                error,
            });
            Ok(())
        }
    }
}
