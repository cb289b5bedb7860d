//! Inspection of processes holding a file open.

use crate::Result;
use std::path::Path;
use std::time::Duration;

/// A process that has the file open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHolder {
    pub pid: u32,
    pub name: String,
}

/// Platform capability to find, and optionally stop, the holders of a file.
pub trait FileLockInspector {
    /// Processes with the path open. Empty when unknown.
    fn holders(&self, path: &Path) -> Vec<FileHolder>;

    /// Ask a process to terminate and wait up to `timeout` for it to exit.
    fn terminate(&self, holder: &FileHolder, timeout: Duration) -> Result<()>;
}

/// Inspector for platforms without the capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInspector;

impl FileLockInspector for NoInspector {
    fn holders(&self, _path: &Path) -> Vec<FileHolder> {
        Vec::new()
    }

    fn terminate(&self, holder: &FileHolder, _timeout: Duration) -> Result<()> {
        Err(crate::Error::LockedFile(format!(
            "cannot terminate process {} on this platform",
            holder.pid
        )))
    }
}

/// Inspector reading `/proc/<pid>/fd`.
#[cfg(target_os = "linux")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcInspector;

#[cfg(target_os = "linux")]
impl FileLockInspector for ProcInspector {
    fn holders(&self, path: &Path) -> Vec<FileHolder> {
        let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut holders = Vec::new();

        let Ok(entries) = std::fs::read_dir("/proc") else {
            return holders;
        };
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // Processes we may not inspect are skipped.
            let Ok(fds) = std::fs::read_dir(entry.path().join("fd")) else {
                continue;
            };
            let holds = fds
                .flatten()
                .filter_map(|fd| std::fs::read_link(fd.path()).ok())
                .any(|link| link == target);
            if holds {
                let name = std::fs::read_to_string(entry.path().join("comm"))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                holders.push(FileHolder { pid, name });
            }
        }
        holders
    }

    fn terminate(&self, holder: &FileHolder, timeout: Duration) -> Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        tracing::warn!("Terminating process {} ({})", holder.pid, holder.name);
        kill(Pid::from_raw(holder.pid as i32), Signal::SIGTERM)
            .map_err(|e| crate::Error::LockedFile(format!("kill {}: {}", holder.pid, e)))?;

        let proc_dir = std::path::PathBuf::from(format!("/proc/{}", holder.pid));
        let deadline = std::time::Instant::now() + timeout;
        while proc_dir.exists() {
            if std::time::Instant::now() >= deadline {
                return Err(crate::Error::LockedFile(format!(
                    "process {} still running after {:?}",
                    holder.pid, timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        Ok(())
    }
}

/// The inspector available on this platform.
pub fn platform_inspector() -> Box<dyn FileLockInspector> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcInspector)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(NoInspector)
    }
}

/// Whether a move failed because another process holds the file.
pub fn is_lock_error(err: &std::io::Error) -> bool {
    if matches!(
        err.kind(),
        std::io::ErrorKind::ResourceBusy | std::io::ErrorKind::ExecutableFileBusy
    ) {
        return true;
    }
    match err.raw_os_error() {
        // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
        #[cfg(windows)]
        Some(32) | Some(33) => true,
        // EBUSY, ETXTBSY
        #[cfg(unix)]
        Some(16) | Some(26) => true,
        _ => false,
    }
}
