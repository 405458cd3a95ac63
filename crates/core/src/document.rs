use crate::error::{DeviceKind, DocumentFault};
use roxmltree::{Attribute, Document, Node};
use std::ops::Range;

pub(crate) const DOMAIN: &str = "domain";
pub(crate) const DOMAIN_SNAPSHOT: &str = "domainsnapshot";

pub(crate) fn parse(text: &str) -> Result<Document<'_>, DocumentFault> {
    Ok(Document::parse(text)?)
}

pub(crate) fn expect_root<'a, 'input>(
    doc: &'a Document<'input>,
    expected: &'static str,
) -> Result<Node<'a, 'input>, DocumentFault> {
    let root = doc.root_element();
    if root.tag_name().name() != expected {
        return Err(DocumentFault::UnexpectedRoot {
            expected,
            found: root.tag_name().name().to_string(),
        });
    }
    Ok(root)
}

pub(crate) fn elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

pub(crate) fn first_element<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> Option<Node<'a, 'input>> {
    elements(node, name).next()
}

fn attribute<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Attribute<'a, 'input>> {
    node.attributes()
        .find(|attr| attr.namespace().is_none() && attr.name() == name)
}

pub(crate) fn is_qualifying_disk(disk: Node<'_, '_>) -> bool {
    disk.attribute("type") == Some("file") && disk.attribute("device") == Some("disk")
}

pub(crate) struct MachineNodes<'a, 'input> {
    pub name: Node<'a, 'input>,
    pub uuid: Node<'a, 'input>,
    pub mac_addresses: Vec<Attribute<'a, 'input>>,
    pub disk_files: Vec<Attribute<'a, 'input>>,
}

impl<'a, 'input> MachineNodes<'a, 'input> {
    pub fn locate(domain: Node<'a, 'input>) -> Result<Self, DocumentFault> {
        let name = first_element(domain, "name").ok_or(DocumentFault::MissingElement("name"))?;
        let uuid = first_element(domain, "uuid").ok_or(DocumentFault::MissingElement("uuid"))?;

        let mut mac_addresses = Vec::new();
        let mut disk_files = Vec::new();
        for devices in elements(domain, "devices") {
            for interface in elements(devices, "interface") {
                let mac = first_element(interface, "mac")
                    .ok_or(DocumentFault::MissingElement("interface/mac"))?;
                let address = attribute(mac, "address").ok_or(DocumentFault::MissingAttribute {
                    element: "interface/mac",
                    attribute: "address",
                })?;
                mac_addresses.push(address);
            }
            for disk in elements(devices, "disk").filter(|disk| is_qualifying_disk(*disk)) {
                let source = first_element(disk, "source")
                    .ok_or(DocumentFault::MissingElement("disk/source"))?;
                let file = attribute(source, "file").ok_or(DocumentFault::MissingAttribute {
                    element: "disk/source",
                    attribute: "file",
                })?;
                disk_files.push(file);
            }
        }

        Ok(Self {
            name,
            uuid,
            mac_addresses,
            disk_files,
        })
    }
}

/// Positional pairing; unequal lengths are a `CountMismatch`, never a truncation.
pub fn zip_exact<'t, A, B>(
    kind: DeviceKind,
    document: Vec<A>,
    target: &'t [B],
) -> Result<Vec<(A, &'t B)>, DocumentFault> {
    if document.len() != target.len() {
        return Err(DocumentFault::CountMismatch {
            kind,
            document: document.len(),
            target: target.len(),
        });
    }
    Ok(document.into_iter().zip(target.iter()).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Splice {
    range: Range<usize>,
    replacement: String,
}

pub(crate) fn text_splice(element: Node<'_, '_>, value: &str) -> Splice {
    match (element.first_child(), element.last_child()) {
        (Some(first), Some(last)) => Splice {
            range: first.range().start..last.range().end,
            replacement: escape(value, false),
        },
        _ => {
            let tag = element.tag_name().name();
            Splice {
                range: element.range(),
                replacement: format!("<{tag}>{}</{tag}>", escape(value, false)),
            }
        }
    }
}

pub(crate) fn attribute_splice(attr: &Attribute<'_, '_>, value: &str) -> Splice {
    Splice {
        range: attr.range_value(),
        replacement: escape(value, true),
    }
}

pub(crate) fn apply_splices(input: &str, mut splices: Vec<Splice>) -> String {
    splices.sort_by_key(|splice| splice.range.start);
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;
    for splice in splices {
        output.push_str(&input[cursor..splice.range.start]);
        output.push_str(&splice.replacement);
        cursor = splice.range.end;
    }
    output.push_str(&input[cursor..]);
    output
}

fn escape(value: &str, in_attribute: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if in_attribute => escaped.push_str("&quot;"),
            '\'' if in_attribute => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
