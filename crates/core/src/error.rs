use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Interface,
    Disk,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Interface => f.write_str("network interface"),
            DeviceKind::Disk => f.write_str("file-backed disk"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentFault {
    #[error("malformed XML: {0}")]
    Malformed(#[from] roxmltree::Error),
    #[error("root element is <{found}>, expected <{expected}>")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },
    #[error("missing element {0}")]
    MissingElement(&'static str),
    #[error("element {element} has no {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("element {0} is empty")]
    EmptyValue(&'static str),
    #[error("{kind} count mismatch: document has {document}, target machine has {target}")]
    CountMismatch {
        kind: DeviceKind,
        document: usize,
        target: usize,
    },
}

#[derive(Debug, Error)]
#[error("error in virtual machine definition XML")]
pub struct DefinitionParseError {
    #[source]
    pub fault: DocumentFault,
}

impl From<DocumentFault> for DefinitionParseError {
    fn from(fault: DocumentFault) -> Self {
        Self { fault }
    }
}

#[derive(Debug, Error)]
#[error("error in snapshot XML")]
pub struct DocumentRewriteError {
    #[source]
    pub fault: DocumentFault,
}

impl From<DocumentFault> for DocumentRewriteError {
    fn from(fault: DocumentFault) -> Self {
        Self { fault }
    }
}

impl DocumentRewriteError {
    pub fn is_count_mismatch(&self) -> bool {
        matches!(self.fault, DocumentFault::CountMismatch { .. })
    }
}

#[derive(Debug, Error)]
pub enum ExternalToolError {
    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("`{command}` did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
    #[error("`{command}` produced unexpected output: {detail}")]
    UnexpectedOutput { command: String, detail: String },
}
