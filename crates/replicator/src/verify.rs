use snapclone_core::{ExternalToolError, SnapshotHost};
use tracing::debug;

pub fn verify<H: SnapshotHost + ?Sized>(
    host: &H,
    source: &str,
    target: &str,
) -> Result<bool, ExternalToolError> {
    let source_tree = host.render_snapshot_tree(source)?;
    let target_tree = host.render_snapshot_tree(target)?;
    let matches = source_tree == target_tree;
    debug!(source, target, matches, "compared snapshot trees");
    Ok(matches)
}
