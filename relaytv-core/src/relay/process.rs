use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Where the encoder's stdout goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Piped,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

pub type EncoderStdout = Box<dyn AsyncRead + Send + Unpin>;

/// A running encoder process.
#[async_trait::async_trait]
pub trait EncoderChild: Send {
    fn id(&self) -> Option<u32>;

    fn take_stdout(&mut self) -> Option<EncoderStdout>;

    /// Asks the process to exit. Must be a no-op once the process is gone.
    fn terminate(&mut self) -> io::Result<()>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    async fn wait(&mut self) -> io::Result<ProcessExit>;
}

pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, args: &[String], output: OutputMode) -> io::Result<Box<dyn EncoderChild>>;

    /// Program name used in logs and errors.
    fn program(&self) -> &Path;
}

#[derive(Debug, Clone)]
pub struct SystemProcessSpawner {
    program: PathBuf,
}

impl SystemProcessSpawner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemProcessSpawner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl ProcessSpawner for SystemProcessSpawner {
    fn spawn(&self, args: &[String], output: OutputMode) -> io::Result<Box<dyn EncoderChild>> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .stdout(match output {
                OutputMode::Piped => Stdio::piped(),
                OutputMode::Discard => Stdio::null(),
            });
        let child = command.spawn()?;
        debug!(
            program = %self.program.display(),
            pid = child.id(),
            "encoder spawned"
        );
        Ok(Box::new(SystemChild {
            child,
            reaped: false,
        }))
    }

    fn program(&self) -> &Path {
        &self.program
    }
}

struct SystemChild {
    child: Child,
    reaped: bool,
}

#[async_trait::async_trait]
impl EncoderChild for SystemChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stdout(&mut self) -> Option<EncoderStdout> {
        self.child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as EncoderStdout)
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }
        match self.child.id() {
            Some(pid) => send_sigterm(&mut self.child, pid),
            None => Ok(()),
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status.map(ProcessExit::from))
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status.into())
    }
}

impl Drop for SystemChild {
    fn drop(&mut self) {
        if !self.reaped {
            if let Err(err) = self.terminate() {
                warn!(error = %err, "failed to signal encoder on drop");
            }
        }
    }
}

#[cfg(unix)]
fn send_sigterm(_child: &mut Child, pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from_raw_os_error(errno as i32)),
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child, _pid: u32) -> io::Result<()> {
    child.start_kill()
}
