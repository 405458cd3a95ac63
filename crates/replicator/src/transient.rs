use crate::ReplicationError;
use snapclone_core::now_utc_compact;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug)]
pub struct TransientDocument {
    file: NamedTempFile,
}

impl TransientDocument {
    pub fn write(
        dir: &Path,
        machine: &str,
        snapshot: &str,
        contents: &str,
    ) -> Result<Self, ReplicationError> {
        let prefix = format!(
            "{}-{}-{}-",
            file_name_part(machine),
            file_name_part(snapshot),
            now_utc_compact()
        );
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".xml")
            .tempfile_in(dir)
            .map_err(|source| ReplicationError::TransientFile {
                path: dir.to_path_buf(),
                source,
            })?;
        file.write_all(contents.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| ReplicationError::TransientFile {
                path: file.path().to_path_buf(),
                source,
            })?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

fn file_name_part(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect()
}
