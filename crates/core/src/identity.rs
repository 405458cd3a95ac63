use crate::document::{self, MachineNodes, DOMAIN};
use crate::error::{DefinitionParseError, DocumentFault};
use roxmltree::Node;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    pub uid: String,
    pub interface_addresses: Vec<String>,
    pub disk_paths: Vec<String>,
}

pub fn extract_identity(definition_xml: &str) -> Result<IdentityRecord, DefinitionParseError> {
    let doc = document::parse(definition_xml)?;
    let domain = document::expect_root(&doc, DOMAIN)?;
    let nodes = MachineNodes::locate(domain)?;

    Ok(IdentityRecord {
        name: required_text(nodes.name, "name")?,
        uid: required_text(nodes.uuid, "uuid")?,
        interface_addresses: nodes
            .mac_addresses
            .iter()
            .map(|attr| attr.value().to_string())
            .collect(),
        disk_paths: nodes
            .disk_files
            .iter()
            .map(|attr| attr.value().to_string())
            .collect(),
    })
}

fn required_text(node: Node<'_, '_>, element: &'static str) -> Result<String, DocumentFault> {
    node.text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(DocumentFault::EmptyValue(element))
}
