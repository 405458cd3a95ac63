use anyhow::{Context, Result};
use serde::Deserialize;
use snapclone_host_virsh::{VirshConfig, DEFAULT_TIMEOUT_SECS};
use snapclone_replicator::{FailurePolicy, ReplicationSettings};
use std::path::{Path, PathBuf};

pub const ENV_VIRSH: &str = "SNAPCLONE_VIRSH";
pub const ENV_CONNECT: &str = "SNAPCLONE_CONNECT";

/// Run settings, resolved as defaults < config file < environment < flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub virsh: String,
    pub connect: Option<String>,
    pub timeout_secs: u64,
    pub transient_dir: Option<PathBuf>,
    pub on_error: FailurePolicy,
    pub report_base: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            virsh: "virsh".to_string(),
            connect: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            transient_dir: None,
            on_error: FailurePolicy::Abort,
            report_base: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub virsh: Option<String>,
    pub connect: Option<String>,
    pub timeout_secs: Option<u64>,
    pub transient_dir: Option<PathBuf>,
    pub on_error: Option<FailurePolicy>,
    pub report_base: Option<PathBuf>,
}

impl Settings {
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&data)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(settings)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(virsh) = lookup(ENV_VIRSH).filter(|v| !v.trim().is_empty()) {
            self.virsh = virsh;
        }
        if let Some(connect) = lookup(ENV_CONNECT).filter(|v| !v.trim().is_empty()) {
            self.connect = Some(connect);
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(virsh) = overrides.virsh {
            self.virsh = virsh;
        }
        if let Some(connect) = overrides.connect {
            self.connect = Some(connect);
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(dir) = overrides.transient_dir {
            self.transient_dir = Some(dir);
        }
        if let Some(policy) = overrides.on_error {
            self.on_error = policy;
        }
        if let Some(base) = overrides.report_base {
            self.report_base = Some(base);
        }
    }

    pub fn resolve(config_file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut settings = match config_file {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.apply_overrides(overrides);
        Ok(settings)
    }

    pub fn virsh_config(&self) -> VirshConfig {
        VirshConfig {
            executable: self.virsh.clone(),
            connect: self.connect.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn replication_settings(&self, dry_run: bool) -> ReplicationSettings {
        ReplicationSettings {
            policy: self.on_error,
            dry_run,
            transient_dir: self
                .transient_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        }
    }
}
