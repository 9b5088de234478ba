//! Subprocess plumbing shared by every command-line engine.

use crate::error::{Error, Result};
use log::{debug, warn};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// A fully resolved external program call: what to run, with which
/// arguments, and what (if anything) to feed it on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Shell-ish rendering for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push_str(&format!("{:?}", arg));
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    fn command(&self, stdout: Stdio, stderr: Stdio) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(stdout)
            .stderr(stderr);
        cmd
    }

    fn spawn(&self, stdout: Stdio, stderr: Stdio) -> Result<Child> {
        self.command(stdout, stderr).spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::Unavailable {
                    program: self.program.clone(),
                }
            } else {
                Error::Spawn {
                    program: self.program.clone(),
                    source: e,
                }
            }
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// True if `program` resolves to an executable file, either directly (when it
/// contains a path separator) or through one of the `PATH` entries.
pub fn executable_in_path(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return is_executable(Path::new(program));
    }

    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };

    std::env::split_paths(&path_var).any(|dir| is_executable(&dir.join(program)))
}

/// Runs `invocation` to completion with a deadline and returns its stdout.
/// Any failure (spawn error, timeout, non-zero exit) comes back as `None`.
pub fn capture_stdout(invocation: &Invocation, timeout: Duration) -> Option<String> {
    // Nobody reads stderr here, so it must not be a pipe that can fill up
    let mut child = match invocation.spawn(Stdio::piped(), Stdio::null()) {
        Ok(child) => child,
        Err(e) => {
            debug!("{}: {}", invocation.program, e);
            return None;
        }
    };

    // Drain stdout on the side so a chatty program cannot block on a full pipe
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        })
    });

    if let (Some(input), Some(mut stdin)) = (&invocation.stdin, child.stdin.take()) {
        let _ = stdin.write_all(input.as_bytes());
    }

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!(
                "{} timed out after {:?}, killing it",
                invocation.command_line(),
                timeout
            );
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        Err(e) => {
            debug!("waiting on {} failed: {}", invocation.program, e);
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
    };

    let stdout = reader.and_then(|handle| handle.join().ok())?;
    if !status.success() {
        debug!("{} exited with {}", invocation.command_line(), status);
        return None;
    }
    Some(String::from_utf8_lossy(&stdout).into_owned())
}

struct Tracked {
    child: Child,
    cancelled: bool,
}

/// The single in-flight process an engine instance may own.
///
/// `run` refuses to start a second process while one is tracked, so a stop
/// request always reaches the process that is actually playing.
pub struct ProcessSlot {
    current: Mutex<Option<Tracked>>,
    poll: Duration,
}

impl ProcessSlot {
    pub fn new(poll: Duration) -> Self {
        Self {
            current: Mutex::new(None),
            poll,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Tracked>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a process is running and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(|t| !t.cancelled)
    }

    /// Spawns `invocation`, feeds its stdin and blocks until it exits.
    pub fn run(&self, invocation: &Invocation, owner: &str) -> Result<()> {
        debug!("{}: running {}", owner, invocation.command_line());

        let (stdin, stderr) = {
            let mut slot = self.lock();
            if slot.is_some() {
                return Err(Error::Busy(owner.to_string()));
            }
            let mut child = invocation.spawn(Stdio::null(), Stdio::piped())?;
            let pipes = (child.stdin.take(), child.stderr.take());
            *slot = Some(Tracked {
                child,
                cancelled: false,
            });
            pipes
        };

        let stderr_reader = stderr.map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        if let (Some(input), Some(mut pipe)) = (&invocation.stdin, stdin) {
            // A stopped or crashed process closes its end early; the exit
            // status below tells the real story.
            if let Err(e) = pipe.write_all(input.as_bytes()) {
                debug!("{}: writing stdin failed: {}", owner, e);
            }
        }

        let (status, cancelled) = loop {
            {
                let mut slot = self.lock();
                let Some(tracked) = slot.as_mut() else {
                    return Err(Error::Cancelled);
                };
                match tracked.child.try_wait() {
                    Ok(Some(status)) => {
                        let cancelled = tracked.cancelled;
                        *slot = None;
                        break (status, cancelled);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        if let Some(mut tracked) = slot.take() {
                            let _ = tracked.child.kill();
                            let _ = tracked.child.wait();
                        }
                        return Err(Error::Io(e));
                    }
                }
            }
            thread::sleep(self.poll);
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if cancelled {
            debug!("{}: stopped ({})", owner, status);
            return Err(Error::Cancelled);
        }
        if !status.success() {
            return Err(Error::Failed {
                program: invocation.program.clone(),
                status: status.to_string(),
                stderr,
            });
        }
        Ok(())
    }

    /// Asks the tracked process to terminate. Returns immediately; the
    /// thread blocked in [`ProcessSlot::run`] reaps it.
    pub fn stop(&self) {
        let mut slot = self.lock();
        if let Some(tracked) = slot.as_mut() {
            if !tracked.cancelled {
                if let Err(e) = tracked.child.kill() {
                    debug!("kill failed (process already gone?): {}", e);
                }
                tracked.cancelled = true;
            }
        }
    }
}

/// Synthesis to a file only counts if the file is there and not empty.
pub fn ensure_output(program: &str, path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(Error::MissingOutput {
            program: program.to_string(),
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_whitespace() {
        let inv = Invocation::new("espeak-ng")
            .arg("-s")
            .arg("175")
            .arg("Hello world");
        assert_eq!(inv.command_line(), "espeak-ng -s 175 \"Hello world\"");
    }

    #[test]
    fn test_missing_program_is_not_available() {
        assert!(!executable_in_path("definitely-not-a-tts-engine-4242"));
        assert!(!executable_in_path("/nonexistent/dir/espeak-ng"));
        assert!(!executable_in_path(""));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_not_available() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("espeak-ng");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        let program = script.to_string_lossy().into_owned();

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!executable_in_path(&program));

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(executable_in_path(&program));

        assert!(!executable_in_path(&dir.path().to_string_lossy()));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_stdout_survives_noisy_stderr() {
        // Far more than a pipe buffer's worth of stderr
        let inv = Invocation::new("sh")
            .arg("-c")
            .arg("head -c 262144 /dev/zero >&2; echo done");
        assert_eq!(
            capture_stdout(&inv, Duration::from_secs(5)).as_deref(),
            Some("done\n")
        );
    }

    #[test]
    fn test_stop_without_process_is_noop() {
        let slot = ProcessSlot::new(Duration::from_millis(10));
        slot.stop();
        slot.stop();
        assert!(!slot.is_running());
    }

    #[test]
    fn test_run_missing_program_reports_unavailable() {
        let slot = ProcessSlot::new(Duration::from_millis(10));
        let inv = Invocation::new("definitely-not-a-tts-engine-4242").arg("hi");
        match slot.run(&inv, "test") {
            Err(Error::Unavailable { program }) => {
                assert_eq!(program, "definitely-not-a-tts-engine-4242")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!slot.is_running());
    }

    #[test]
    fn test_capture_stdout_of_missing_program_is_none() {
        let inv = Invocation::new("definitely-not-a-tts-engine-4242").arg("--voices");
        assert!(capture_stdout(&inv, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_ensure_output_rejects_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.wav");
        assert!(matches!(
            ensure_output("espeak-ng", &missing),
            Err(Error::MissingOutput { .. })
        ));

        let empty = dir.path().join("empty.wav");
        std::fs::write(&empty, b"").unwrap();
        assert!(ensure_output("espeak-ng", &empty).is_err());

        let full = dir.path().join("full.wav");
        std::fs::write(&full, b"RIFF").unwrap();
        assert!(ensure_output("espeak-ng", &full).is_ok());
    }
}
