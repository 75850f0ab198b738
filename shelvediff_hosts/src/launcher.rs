use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use shelvediff_host_api::{HostError, HostResult, ProcessLauncher, ToolProcess};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Launches diff tools as detached operating-system processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    /// Construct a launcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, command: &str, arguments: &str) -> HostResult<Box<dyn ToolProcess>> {
        let mut process = Command::new(command);
        apply_arguments(&mut process, arguments);
        process.stdin(Stdio::null());
        process.stdout(Stdio::null());
        process.stderr(Stdio::null());

        let child = process
            .spawn()
            .map_err(|err| HostError::message(format!("failed to spawn {command}: {err}")))?;
        debug!(command, pid = child.id(), "diff tool started");

        Ok(Box::new(SystemProcess { child: Some(child) }))
    }
}

#[cfg(windows)]
fn apply_arguments(process: &mut Command, arguments: &str) {
    use std::os::windows::process::CommandExt;
    process.raw_arg(arguments);
}

#[cfg(not(windows))]
fn apply_arguments(process: &mut Command, arguments: &str) {
    process.args(split_arguments(arguments));
}

/// Handle to a tool started by [`SystemLauncher`].
///
/// Dropping the handle never kills the tool; a still-running child is reaped
/// on a background thread so it does not linger as a zombie.
#[derive(Debug)]
pub struct SystemProcess {
    child: Option<Child>,
}

impl ToolProcess for SystemProcess {
    fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> HostResult<bool> {
        let Some(child) = self.child.as_mut() else {
            return Ok(true);
        };
        match child.wait_timeout(timeout) {
            Ok(Some(status)) => {
                debug!(pid = child.id(), %status, "diff tool exited");
                self.child = None;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => Err(HostError::message(format!(
                "failed waiting on diff tool: {err}"
            ))),
        }
    }
}

impl Drop for SystemProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        let spawned = thread::Builder::new()
            .name("shelvediff-reaper".into())
            .spawn(move || {
                let _ = child.wait();
            });
        if let Err(err) = spawned {
            warn!("failed to start reaper thread for diff tool: {err}");
        }
    }
}

/// Split an expanded argument string into individual arguments.
///
/// Whitespace separates arguments, double quotes group text containing
/// whitespace and are removed, and `\"` yields a literal quote. Any other
/// backslash is kept as-is so Windows-style paths survive.
#[must_use]
pub fn split_arguments(arguments: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = arguments.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                in_token = true;
            }
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        args.push(current);
    }
    args
}
