use crate::document::{
    self, apply_splices, attribute_splice, text_splice, zip_exact, MachineNodes, DOMAIN,
    DOMAIN_SNAPSHOT,
};
use crate::error::{DeviceKind, DocumentFault, DocumentRewriteError};
use crate::identity::IdentityRecord;

/// MACs and file-backed disk paths are matched by position; all other bytes are kept.
pub fn rewrite_identity(
    snapshot_xml: &str,
    target: &IdentityRecord,
) -> Result<String, DocumentRewriteError> {
    let doc = document::parse(snapshot_xml)?;
    let snapshot = document::expect_root(&doc, DOMAIN_SNAPSHOT)?;
    let domain =
        document::first_element(snapshot, DOMAIN).ok_or(DocumentFault::MissingElement("domain"))?;
    let nodes = MachineNodes::locate(domain)?;

    let interfaces = zip_exact(
        DeviceKind::Interface,
        nodes.mac_addresses,
        &target.interface_addresses,
    )?;
    let disks = zip_exact(DeviceKind::Disk, nodes.disk_files, &target.disk_paths)?;

    let mut splices = Vec::with_capacity(2 + interfaces.len() + disks.len());
    splices.push(text_splice(nodes.name, &target.name));
    splices.push(text_splice(nodes.uuid, &target.uid));
    splices.extend(
        interfaces
            .iter()
            .chain(disks.iter())
            .map(|(attr, value)| attribute_splice(attr, value)),
    );

    Ok(apply_splices(snapshot_xml, splices))
}
