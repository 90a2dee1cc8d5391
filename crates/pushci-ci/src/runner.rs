//! External command execution.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pushci_core::CommandOutcome;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Runs one external command to completion.
///
/// A single attempt: no retries. Never fails outright; anything that keeps
/// the command from finishing is an [`OutcomeKind::Error`](pushci_core::OutcomeKind::Error)
/// outcome.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cwd: &Path, argv: &[String], timeout: Duration) -> CommandOutcome;
}

/// Spawns real processes with `tokio::process`.
///
/// stdout and stderr are read concurrently and interleaved line by line in
/// arrival order. Each command runs in its own process group; on timeout the
/// whole group is killed and the child reaped, so nothing it started keeps
/// writing into the workspace.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, cwd: &Path, argv: &[String], timeout: Duration) -> CommandOutcome {
        let start = Instant::now();
        let elapsed = || start.elapsed().as_millis() as u64;

        let Some((program, args)) = argv.split_first() else {
            return CommandOutcome::error("empty command line", String::new(), 0);
        };
        if !cwd.is_dir() {
            return CommandOutcome::error(
                format!("working directory {} does not exist", cwd.display()),
                String::new(),
                0,
            );
        }

        let program = if is_local_script(program) {
            let script = cwd.join(program);
            if let Err(e) = ensure_executable(&script) {
                return CommandOutcome::error(
                    format!("cannot make {} executable: {e}", script.display()),
                    String::new(),
                    elapsed(),
                );
            }
            script
        } else {
            PathBuf::from(program)
        };

        let mut command = Command::new(&program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutcome::error(
                    format!("failed to spawn {}: {e}", program.display()),
                    String::new(),
                    elapsed(),
                )
            }
        };
        debug!(program = %program.display(), pid = ?child.id(), "spawned");

        let (tx, rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump(stderr, tx.clone())));
        }
        drop(tx);
        let collector = tokio::spawn(collect(rx));

        let finished = tokio::time::timeout(timeout, async {
            let mut capture: io::Result<()> = Ok(());
            for reader in readers.iter_mut() {
                let result = match reader.await {
                    Ok(r) => r,
                    Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
                };
                if capture.is_ok() {
                    capture = result;
                }
            }
            (capture, child.wait().await)
        })
        .await;

        match finished {
            Ok((capture, status)) => {
                let log = collector.await.unwrap_or_default();
                let duration_ms = elapsed();
                match (capture, status) {
                    (Err(e), _) => CommandOutcome::error(format!("failed to capture output: {e}"), log, duration_ms),
                    (_, Err(e)) => CommandOutcome::error(format!("failed to wait for process: {e}"), log, duration_ms),
                    (Ok(()), Ok(status)) => match status.code() {
                        Some(code) => CommandOutcome::exited(code, log, duration_ms),
                        None => CommandOutcome::error(format!("process terminated by signal ({status})"), log, duration_ms),
                    },
                }
            }
            Err(_) => {
                if let Err(e) = kill_process_group(child.id()) {
                    warn!(program = %program.display(), error = %e, "failed to kill process group");
                }
                if let Err(e) = child.kill().await {
                    warn!(program = %program.display(), error = %e, "failed to kill timed out process");
                }
                for reader in &readers {
                    reader.abort();
                }
                let log = collector.await.unwrap_or_default();
                CommandOutcome::error(format!("timed out after {timeout:?}"), log, elapsed())
            }
        }
    }
}

/// Sends SIGKILL to the process group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) -> io::Result<()> {
    // Already reaped: the group leader is gone and so is its group id.
    let Some(pid) = pid else { return Ok(()) };
    let pgid = libc::pid_t::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: killpg takes plain integers and only delivers a signal.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    match io::Error::last_os_error() {
        e if e.raw_os_error() == Some(libc::ESRCH) => Ok(()),
        e => Err(e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) -> io::Result<()> {
    Ok(())
}

/// Relative paths like `./gradlew` name a script inside the checkout.
fn is_local_script(program: &str) -> bool {
    let path = Path::new(program);
    path.is_relative() && path.components().count() > 1
}

/// Sets the execute bit on a checked-in wrapper script that lacks it.
#[cfg(unix)]
fn ensure_executable(program: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if !program.is_file() {
        return Ok(());
    }
    let mut perms = std::fs::metadata(program)?.permissions();
    if perms.mode() & 0o111 == 0 {
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(program, perms)?;
        debug!(program = %program.display(), "set execute permission");
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(_program: &Path) -> io::Result<()> {
    Ok(())
}

async fn pump<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        let mut text = String::from_utf8_lossy(&line).into_owned();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        if tx.send(text).is_err() {
            return Ok(());
        }
    }
}

async fn collect(mut rx: mpsc::UnboundedReceiver<String>) -> String {
    let mut log = String::new();
    while let Some(line) = rx.recv().await {
        log.push_str(&line);
    }
    log
}
