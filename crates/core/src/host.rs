use crate::error::ExternalToolError;
use std::path::Path;

/// The virtualization management tool. Every call blocks until it answers.
pub trait SnapshotHost {
    fn dump_machine_definition(&self, machine: &str) -> Result<String, ExternalToolError>;

    /// Must include security-sensitive fields.
    fn dump_snapshot_definition(
        &self,
        machine: &str,
        snapshot: &str,
    ) -> Result<String, ExternalToolError>;

    fn list_root_snapshots(&self, machine: &str) -> Result<Vec<String>, ExternalToolError>;

    /// Direct children only.
    fn list_child_snapshots(
        &self,
        machine: &str,
        snapshot: &str,
    ) -> Result<Vec<String>, ExternalToolError>;

    fn list_all_snapshots(&self, machine: &str) -> Result<Vec<String>, ExternalToolError>;

    fn define_snapshot(&self, machine: &str, document: &Path) -> Result<(), ExternalToolError>;

    fn render_snapshot_tree(&self, machine: &str) -> Result<String, ExternalToolError>;
}
