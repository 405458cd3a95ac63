mod document;
mod error;
mod host;
mod identity;
mod rewrite;

use time::format_description::well_known::Rfc3339;

pub use document::zip_exact;
pub use error::{
    DefinitionParseError, DeviceKind, DocumentFault, DocumentRewriteError, ExternalToolError,
};
pub use host::SnapshotHost;
pub use identity::{extract_identity, IdentityRecord};
pub use rewrite::rewrite_identity;

pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

pub fn now_utc_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// UTC timestamp down to the microsecond, digits only (`YYYYMMDDhhmmssffffff`).
pub fn now_utc_compact() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}{:06}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.microsecond()
    )
}
