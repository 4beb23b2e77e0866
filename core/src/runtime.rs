use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::timeout_at;
use tracing::{debug, error, warn};

use crate::command::ArgumentVector;
use crate::config::GatewayConfig;
use crate::error::ExecError;

/// What one finished child process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, or `-signal` when the child was killed by a signal.
    pub exit_code: i32,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs argument vectors as child processes.
///
/// Holds no per-call state, so one instance is shared by every request.
#[derive(Debug, Clone)]
pub struct Runtime {
    timeout: Duration,
}

impl Runtime {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.timeout)
    }

    /// Spawns `argv`, waits for it to exit, and returns everything it wrote.
    ///
    /// Exactly one spawn is attempted. The child runs in its own process
    /// group; once it exits (or is killed for running past the timeout) the
    /// whole group is killed, so nothing it started outlives the call.
    pub async fn execute(&self, argv: &ArgumentVector) -> Result<ExecutionResult, ExecError> {
        let program = argv.program().to_string();
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;

        // A. Spawning: no shell, no terminal, stdin closed
        debug!("Spawning {}", argv);
        let mut command = Command::new(&program);
        command
            .args(argv.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| {
            error!("Failed to launch '{}': {}", program, source);
            ExecError::Launch {
                program: program.clone(),
                source,
            }
        })?;
        let group = child.id();

        // B. Running: drain both pipes alongside the wait so a chatty child
        // never blocks on a full pipe buffer
        debug!("Running '{}' (pid {:?})", program, group);
        let stdout = tokio::spawn(drain(child.stdout.take()));
        let stderr = tokio::spawn(drain(child.stderr.take()));
        let drains = [stdout.abort_handle(), stderr.abort_handle()];

        let waited = timeout_at(deadline, child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                error!("Lost track of '{}': {}", program, source);
                kill_group(group, &program);
                reap(&mut child, &program).await;
                drains.iter().for_each(AbortHandle::abort);
                return Err(ExecError::Capture { program, source });
            }
            Err(_) => {
                warn!("'{}' exceeded {:?}, killing it", program, self.timeout);
                kill_group(group, &program);
                reap(&mut child, &program).await;
                drains.iter().for_each(AbortHandle::abort);
                return Err(ExecError::Timeout {
                    program,
                    after: self.timeout,
                });
            }
        };

        // C. Terminated: whatever is left in the group is a straggler that
        // may still hold our pipes open
        kill_group(group, &program);
        let collected = timeout_at(deadline, async {
            tokio::try_join!(collect(stdout), collect(stderr))
        })
        .await;
        let (stdout, stderr) = match collected {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                drains.iter().for_each(AbortHandle::abort);
                return Err(ExecError::Capture { program, source });
            }
            Err(_) => {
                // only a process that left the group can still hold a pipe
                drains.iter().for_each(AbortHandle::abort);
                error!("Output of '{}' held open after it exited", program);
                return Err(ExecError::Capture {
                    program,
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        "output pipe held open after exit",
                    ),
                });
            }
        };

        let result = ExecutionResult {
            stdout,
            stderr,
            exit_code: exit_code(status),
            elapsed: started.elapsed(),
        };
        debug!(
            "'{}' exited with {} after {:?} ({} bytes stdout, {} bytes stderr)",
            program,
            result.exit_code,
            result.elapsed,
            result.stdout.len(),
            result.stderr.len()
        );
        Ok(result)
    }
}

async fn drain<R>(pipe: Option<R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn collect(task: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    task.await.map_err(io::Error::other)?
}

/// Kills the child (if still alive) and waits for it.
async fn reap(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        error!("Failed to kill '{}': {}", program, e);
    }
}

/// SIGKILLs every process left in the group led by `group`.
#[cfg(unix)]
fn kill_group(group: Option<u32>, program: &str) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = group else {
        return;
    };
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) => debug!("Killed process group {} of '{}'", pgid, program),
        // group already empty
        Err(Errno::ESRCH) => {}
        Err(e) => error!("Failed to kill process group {} of '{}': {}", pgid, program, e),
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>, _program: &str) {}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
