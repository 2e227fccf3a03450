//! Helpers for running child processes with combined output and cooperative
//! cancellation.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, instrument, warn};

use crate::cancel::CancellationToken;

/// How often the watcher re-checks whether the child has finished.
const WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// stdout and stderr interleaved line by line in arrival order.
    pub combined: Vec<u8>,
    /// True if an interrupt was sent because of cancellation.
    pub interrupted: bool,
}

impl CommandOutput {
    pub fn combined_lossy(&self) -> String {
        String::from_utf8_lossy(&self.combined).into_owned()
    }
}

/// Run `cmd` in its own process group, draining stdout and stderr into one
/// buffer while echoing each line to stdout when `echo` is set.
///
/// While the child runs, a watcher thread waits on `cancel`; when triggered it
/// sends SIGINT to the child's process group and lets the child exit on its
/// own.
#[instrument(skip_all, fields(echo = echo))]
pub fn run_command_cancellable(
    mut cmd: Command,
    cancel: &CancellationToken,
    echo: bool,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut cmd);

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let combined = Arc::new(Mutex::new(Vec::new()));
    let stdout_handle = {
        let combined = Arc::clone(&combined);
        thread::spawn(move || read_lines_into(stdout, &combined, echo))
    };
    let stderr_handle = {
        let combined = Arc::clone(&combined);
        thread::spawn(move || read_lines_into(stderr, &combined, echo))
    };

    let finished = Arc::new(AtomicBool::new(false));
    let interrupted = Arc::new(AtomicBool::new(false));
    let watcher = {
        let finished = Arc::clone(&finished);
        let interrupted = Arc::clone(&interrupted);
        let cancel = cancel.clone();
        let pid = child.id();
        thread::spawn(move || {
            while !finished.load(Ordering::SeqCst) {
                if cancel.wait_timeout(WATCH_INTERVAL) {
                    info!(pid, "sending SIGINT to child process group");
                    if let Err(e) = interrupt_process_group(pid) {
                        warn!(err = %e, pid, "failed to interrupt child process");
                    }
                    interrupted.store(true, Ordering::SeqCst);
                    return;
                }
            }
        })
    };

    let status = child.wait().context("wait for command");
    finished.store(true, Ordering::SeqCst);
    if watcher.join().is_err() {
        warn!("cancellation watcher panicked");
    }
    let status = status?;

    join_reader(stdout_handle).context("join stdout")?;
    join_reader(stderr_handle).context("join stderr")?;

    let combined = std::mem::take(&mut *combined.lock().unwrap_or_else(PoisonError::into_inner));
    let interrupted = interrupted.load(Ordering::SeqCst);
    debug!(exit_code = ?status.code(), interrupted, "command finished");
    Ok(CommandOutput {
        status,
        combined,
        interrupted,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_lines_into<R: Read>(reader: R, combined: &Mutex<Vec<u8>>, echo: bool) -> Result<()> {
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line).context("read line")?;
        if n == 0 {
            break;
        }
        if echo {
            let mut out = std::io::stdout().lock();
            if let Err(e) = out.write_all(&line).and_then(|()| out.flush()) {
                warn!(err = %e, "failed to echo command output");
            }
        }
        combined
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&line);
    }
    Ok(())
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn interrupt_process_group(pid: u32) -> Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid).context("pid out of range")?;
    killpg(Pid::from_raw(pid), Signal::SIGINT).context("send SIGINT")?;
    Ok(())
}

#[cfg(not(unix))]
fn interrupt_process_group(pid: u32) -> Result<()> {
    Err(anyhow!("interrupting process {pid} is not supported on this platform"))
}
