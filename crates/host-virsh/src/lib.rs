use snapclone_core::{ExternalToolError, SnapshotHost};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirshConfig {
    pub executable: String,
    /// Passed as `-c`; virsh picks its default URI when unset.
    pub connect: Option<String>,
    pub timeout_secs: u64,
}

impl Default for VirshConfig {
    fn default() -> Self {
        Self {
            executable: "virsh".to_string(),
            connect: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Virsh {
    config: VirshConfig,
}

impl Virsh {
    pub fn new(config: VirshConfig) -> Self {
        Self { config }
    }

    fn argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if let Some(uri) = &self.config.connect {
            argv.push("-c".to_string());
            argv.push(uri.clone());
        }
        argv.extend(args.iter().map(|arg| arg.to_string()));
        argv
    }

    fn run(&self, args: &[&str]) -> Result<String, ExternalToolError> {
        let argv = self.argv(args);
        let rendered = render_command(&self.config.executable, &argv);
        debug!(command = %rendered, "running virsh");
        let mut cmd = Command::new(&self.config.executable);
        cmd.args(&argv);
        run_with_timeout(
            &mut cmd,
            &rendered,
            Duration::from_secs(self.config.timeout_secs),
        )
    }

    fn run_names(&self, args: &[&str]) -> Result<Vec<String>, ExternalToolError> {
        self.run(args).map(|stdout| parse_name_list(&stdout))
    }
}

impl SnapshotHost for Virsh {
    fn dump_machine_definition(&self, machine: &str) -> Result<String, ExternalToolError> {
        self.run(&["dumpxml", machine])
    }

    fn dump_snapshot_definition(
        &self,
        machine: &str,
        snapshot: &str,
    ) -> Result<String, ExternalToolError> {
        self.run(&["snapshot-dumpxml", machine, snapshot, "--security-info"])
    }

    fn list_root_snapshots(&self, machine: &str) -> Result<Vec<String>, ExternalToolError> {
        self.run_names(&["snapshot-list", machine, "--roots", "--name"])
    }

    fn list_child_snapshots(
        &self,
        machine: &str,
        snapshot: &str,
    ) -> Result<Vec<String>, ExternalToolError> {
        self.run_names(&["snapshot-list", machine, "--from", snapshot, "--name"])
    }

    fn list_all_snapshots(&self, machine: &str) -> Result<Vec<String>, ExternalToolError> {
        self.run_names(&["snapshot-list", machine, "--name"])
    }

    fn define_snapshot(&self, machine: &str, document: &Path) -> Result<(), ExternalToolError> {
        let document = document.to_string_lossy();
        self.run(&["snapshot-create", machine, document.as_ref(), "--redefine"])
            .map(|_| ())
    }

    fn render_snapshot_tree(&self, machine: &str) -> Result<String, ExternalToolError> {
        self.run(&["snapshot-list", machine, "--tree"])
    }
}

/// One snapshot name per line, as printed by `snapshot-list --name`.
pub fn parse_name_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn render_command(program: &str, argv: &[String]) -> String {
    let mut rendered = program.to_string();
    for arg in argv {
        rendered.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            rendered.push_str(&format!("{:?}", arg));
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}

/// Kills `cmd` once `timeout` passes.
pub fn run_with_timeout(
    cmd: &mut Command,
    rendered: &str,
    timeout: Duration,
) -> Result<String, ExternalToolError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExternalToolError::Spawn {
            command: rendered.to_string(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExternalToolError::TimedOut {
                    command: rendered.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(ExternalToolError::Spawn {
                    command: rendered.to_string(),
                    source,
                });
            }
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        return Err(ExternalToolError::Failed {
            command: rendered.to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    String::from_utf8(stdout).map_err(|err| ExternalToolError::UnexpectedOutput {
        command: rendered.to_string(),
        detail: err.to_string(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}
