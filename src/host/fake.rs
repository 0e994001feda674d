use crate::host::{DiskUsage, Host, Invocation, ProbeError, ProcessInfo};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

enum Reply {
    Stdout(String),
    Exit { code: i32, stderr: String },
}

/// In-memory host for tests. Commands are matched by prefix.
#[derive(Default)]
pub struct FakeHost {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
    replies: Vec<(String, Reply)>,
    usage: Option<DiskUsage>,
    processes: Vec<ProcessInfo>,
    commands: Mutex<Vec<String>>,
    process_scans: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.insert(path.into());
        self
    }

    pub fn with_command(mut self, prefix: &str, stdout: impl Into<String>) -> Self {
        self.replies
            .push((prefix.to_string(), Reply::Stdout(stdout.into())));
        self
    }

    pub fn with_failing_command(mut self, prefix: &str, code: i32, stderr: &str) -> Self {
        self.replies.push((
            prefix.to_string(),
            Reply::Exit {
                code,
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    pub fn with_disk_usage(mut self, usage: DiskUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_process(self, name: &str, cmd: &[&str]) -> Self {
        self.push_process(name, cmd, None)
    }

    /// A process whose working directory is `cwd`.
    pub fn with_process_in(self, name: &str, cwd: &str, cmd: &[&str]) -> Self {
        self.push_process(name, cmd, Some(PathBuf::from(cwd)))
    }

    fn push_process(mut self, name: &str, cmd: &[&str], cwd: Option<PathBuf>) -> Self {
        let pid = self.processes.len() as u32 + 1;
        self.processes.push(ProcessInfo {
            pid,
            name: name.to_string(),
            cmd: cmd.iter().map(|s| s.to_string()).collect(),
            cwd,
        });
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }

    pub fn process_scans(&self) -> usize {
        self.process_scans.load(Ordering::SeqCst)
    }

    fn known_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.keys().chain(self.dirs.iter())
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn run(&self, invocation: &Invocation) -> Result<String, ProbeError> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(invocation.command.clone());
        }
        let reply = self
            .replies
            .iter()
            .find(|(prefix, _)| invocation.command.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply);
        match reply {
            Some(Reply::Stdout(stdout)) => Ok(stdout.clone()),
            Some(Reply::Exit { code, stderr }) if invocation.check => Err(ProbeError::Exit {
                command: invocation.command.clone(),
                code: *code,
                stderr: stderr.clone(),
            }),
            Some(Reply::Exit { .. }) => Ok(String::new()),
            None => Err(ProbeError::Spawn {
                command: invocation.command.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such command"),
            }),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ProbeError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ProbeError::io(path, io::Error::from(io::ErrorKind::NotFound)))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ProbeError> {
        if !self.is_dir(path) {
            return Err(ProbeError::io(path, io::Error::from(io::ErrorKind::NotFound)));
        }
        let mut children = BTreeSet::new();
        for known in self.known_paths() {
            for ancestor in known.ancestors() {
                if ancestor.parent() == Some(path) {
                    children.insert(ancestor.to_path_buf());
                }
            }
        }
        Ok(children.into_iter().collect())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
            || self
                .known_paths()
                .any(|known| known != path && known.starts_with(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, ProbeError> {
        self.usage
            .ok_or_else(|| ProbeError::io(path, io::Error::from(io::ErrorKind::Unsupported)))
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        self.process_scans.fetch_add(1, Ordering::SeqCst);
        self.processes.clone()
    }
}
