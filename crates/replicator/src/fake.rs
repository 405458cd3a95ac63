use snapclone_core::{ExternalToolError, IdentityRecord, SnapshotHost};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    DumpMachine(String),
    DumpSnapshot(String),
    ListRoots(String),
    ListChildren(String),
    ListAll(String),
    Define {
        machine: String,
        snapshot: String,
        path: PathBuf,
    },
    RenderTree(String),
}

#[derive(Debug, Clone)]
struct Stored {
    name: String,
    parent: Option<String>,
    xml: String,
}

/// In-memory management tool. Its snapshot store rejects a definition whose parent
/// is not already present, like the real one.
#[derive(Debug, Default)]
pub(crate) struct FakeHost {
    machines: RefCell<HashMap<String, String>>,
    snapshots: RefCell<HashMap<String, Vec<Stored>>>,
    failing_defines: HashSet<String>,
    failing_children: HashSet<String>,
    calls: RefCell<Vec<Call>>,
}

impl FakeHost {
    pub fn with_machine(self, name: &str, definition: &str) -> Self {
        self.machines
            .borrow_mut()
            .insert(name.to_string(), definition.to_string());
        self
    }

    pub fn with_snapshot(self, machine: &str, name: &str, parent: Option<&str>, xml: &str) -> Self {
        self.snapshots
            .borrow_mut()
            .entry(machine.to_string())
            .or_default()
            .push(Stored {
                name: name.to_string(),
                parent: parent.map(str::to_string),
                xml: xml.to_string(),
            });
        self
    }

    pub fn failing_define(mut self, snapshot: &str) -> Self {
        self.failing_defines.insert(snapshot.to_string());
        self
    }

    pub fn failing_children(mut self, snapshot: &str) -> Self {
        self.failing_children.insert(snapshot.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn snapshot_names(&self, machine: &str) -> Vec<String> {
        self.stored(machine).into_iter().map(|s| s.name).collect()
    }

    /// Sorted `(child, parent)` pairs.
    pub fn tree_edges(&self, machine: &str) -> Vec<(String, Option<String>)> {
        let mut edges: Vec<_> = self
            .stored(machine)
            .into_iter()
            .map(|s| (s.name, s.parent))
            .collect();
        edges.sort();
        edges
    }

    pub fn embedded_identity(&self, machine: &str, snapshot: &str) -> IdentityRecord {
        let stored = self
            .stored(machine)
            .into_iter()
            .find(|s| s.name == snapshot)
            .expect("snapshot stored");
        let doc = roxmltree::Document::parse(&stored.xml).expect("stored document parses");
        let domain = doc
            .root_element()
            .children()
            .find(|n| n.has_tag_name("domain"))
            .expect("embedded domain");
        let text = |tag: &str| {
            domain
                .children()
                .find(|n| n.has_tag_name(tag))
                .and_then(|n| n.text())
                .unwrap_or_default()
                .to_string()
        };
        IdentityRecord {
            name: text("name"),
            uid: text("uuid"),
            interface_addresses: domain
                .descendants()
                .filter(|n| n.has_tag_name("mac"))
                .filter_map(|n| n.attribute("address"))
                .map(str::to_string)
                .collect(),
            disk_paths: domain
                .descendants()
                .filter(|n| {
                    n.has_tag_name("disk")
                        && n.attribute("type") == Some("file")
                        && n.attribute("device") == Some("disk")
                })
                .filter_map(|n| n.children().find(|c| c.has_tag_name("source")))
                .filter_map(|n| n.attribute("file"))
                .map(str::to_string)
                .collect(),
        }
    }

    fn stored(&self, machine: &str) -> Vec<Stored> {
        self.snapshots
            .borrow()
            .get(machine)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn render(&self, stored: &[Stored], parent: Option<&str>, depth: usize, out: &mut String) {
        let mut level: Vec<&Stored> = stored
            .iter()
            .filter(|s| s.parent.as_deref() == parent)
            .collect();
        level.sort_by(|a, b| a.name.cmp(&b.name));
        for node in level {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&node.name);
            out.push('\n');
            self.render(stored, Some(&node.name), depth + 1, out);
        }
    }
}

fn failed(command: &str, stderr: &str) -> ExternalToolError {
    ExternalToolError::Failed {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
        stderr: stderr.to_string(),
    }
}

impl SnapshotHost for FakeHost {
    fn dump_machine_definition(&self, machine: &str) -> Result<String, ExternalToolError> {
        self.record(Call::DumpMachine(machine.to_string()));
        self.machines
            .borrow()
            .get(machine)
            .cloned()
            .ok_or_else(|| failed("dumpxml", "domain not found"))
    }

    fn dump_snapshot_definition(
        &self,
        machine: &str,
        snapshot: &str,
    ) -> Result<String, ExternalToolError> {
        self.record(Call::DumpSnapshot(snapshot.to_string()));
        self.stored(machine)
            .into_iter()
            .find(|s| s.name == snapshot)
            .map(|s| s.xml)
            .ok_or_else(|| failed("snapshot-dumpxml", "snapshot not found"))
    }

    fn list_root_snapshots(&self, machine: &str) -> Result<Vec<String>, ExternalToolError> {
        self.record(Call::ListRoots(machine.to_string()));
        Ok(self
            .stored(machine)
            .into_iter()
            .filter(|s| s.parent.is_none())
            .map(|s| s.name)
            .collect())
    }

    fn list_child_snapshots(
        &self,
        machine: &str,
        snapshot: &str,
    ) -> Result<Vec<String>, ExternalToolError> {
        self.record(Call::ListChildren(snapshot.to_string()));
        if self.failing_children.contains(snapshot) {
            return Err(failed("snapshot-list", "injected failure"));
        }
        Ok(self
            .stored(machine)
            .into_iter()
            .filter(|s| s.parent.as_deref() == Some(snapshot))
            .map(|s| s.name)
            .collect())
    }

    fn list_all_snapshots(&self, machine: &str) -> Result<Vec<String>, ExternalToolError> {
        self.record(Call::ListAll(machine.to_string()));
        Ok(self.snapshot_names(machine))
    }

    fn define_snapshot(&self, machine: &str, document: &Path) -> Result<(), ExternalToolError> {
        let xml = std::fs::read_to_string(document)
            .map_err(|err| failed("snapshot-create", &err.to_string()))?;
        let doc = roxmltree::Document::parse(&xml)
            .map_err(|err| failed("snapshot-create", &err.to_string()))?;
        let root = doc.root_element();
        let name = root
            .children()
            .find(|n| n.has_tag_name("name"))
            .and_then(|n| n.text())
            .unwrap_or_default()
            .to_string();
        let parent = root
            .children()
            .find(|n| n.has_tag_name("parent"))
            .and_then(|p| p.children().find(|n| n.has_tag_name("name")))
            .and_then(|n| n.text())
            .map(str::to_string);

        self.record(Call::Define {
            machine: machine.to_string(),
            snapshot: name.clone(),
            path: document.to_path_buf(),
        });

        if self.failing_defines.contains(&name) {
            return Err(failed("snapshot-create", "injected failure"));
        }
        if let Some(parent) = &parent {
            if !self.snapshot_names(machine).contains(parent) {
                return Err(failed("snapshot-create", "parent snapshot not found"));
            }
        }

        self.snapshots
            .borrow_mut()
            .entry(machine.to_string())
            .or_default()
            .push(Stored { name, parent, xml });
        Ok(())
    }

    fn render_snapshot_tree(&self, machine: &str) -> Result<String, ExternalToolError> {
        self.record(Call::RenderTree(machine.to_string()));
        let mut out = String::new();
        self.render(&self.stored(machine), None, 0, &mut out);
        Ok(out)
    }
}

pub(crate) fn machine_xml(name: &str, uuid: &str, macs: &[&str], disks: &[&str]) -> String {
    let mut devices = String::new();
    for disk in disks {
        devices.push_str(&format!(
            "    <disk type='file' device='disk'>\n      <driver name='qemu' type='qcow2'/>\n      <source file='{disk}'/>\n      <target dev='vda' bus='virtio'/>\n    </disk>\n"
        ));
    }
    devices.push_str(
        "    <disk type='file' device='cdrom'>\n      <source file='/iso/install.iso'/>\n    </disk>\n",
    );
    for mac in macs {
        devices.push_str(&format!(
            "    <interface type='network'>\n      <mac address='{mac}'/>\n      <source network='default'/>\n    </interface>\n"
        ));
    }
    format!(
        "<domain type='kvm'>\n  <name>{name}</name>\n  <uuid>{uuid}</uuid>\n  <devices>\n{devices}  </devices>\n</domain>"
    )
}

pub(crate) fn snapshot_xml(name: &str, parent: Option<&str>, domain: &str) -> String {
    let parent = parent
        .map(|p| format!("  <parent>\n    <name>{p}</name>\n  </parent>\n"))
        .unwrap_or_default();
    format!(
        "<domainsnapshot>\n  <name>{name}</name>\n  <state>shutoff</state>\n{parent}  <creationTime>1700000000</creationTime>\n  <memory snapshot='no'/>\n{domain}\n</domainsnapshot>\n"
    )
}
