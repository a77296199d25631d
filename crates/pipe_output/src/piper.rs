use std::{
    fmt, io, mem,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    process::{Child, ChildStdin, Command},
};
use tracing::{debug, error, info, warn};

use crate::{
    pipeline::{OutputRunner, Record},
    resolve::resolve_executable,
    PipeOutputConfig, PipeOutputError,
};

const NEWLINE: u8 = b'\n';
const FRAME_CAPACITY: usize = 8192;

/// Lifecycle of a [`PipeOutput`]. `Terminated` is final.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PiperState {
    Uninitialized,
    Running,
    Terminated,
}

impl fmt::Display for PiperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PiperState::Uninitialized => "uninitialized",
            PiperState::Running => "running",
            PiperState::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

/// Why the write loop stopped.
#[derive(Debug)]
pub enum LoopEnd {
    /// Every sender was dropped and the channel drained.
    InputClosed,
    /// Writing the frame of the `record`-th record (0-based, arrival order) failed.
    WriteFailed { record: usize, error: io::Error },
}

/// Outcome of [`PipeOutput::run`].
#[derive(Debug)]
pub struct RunSummary {
    /// Frames accepted in full by the subprocess stdin.
    pub frames_written: usize,
    /// Frames only partially accepted. The unwritten tail of each one is dropped.
    pub short_writes: usize,
    pub end: LoopEnd,
    /// Result of waiting on the subprocess after the loop ended.
    pub exit: io::Result<ExitStatus>,
}

#[derive(Debug)]
enum Stage {
    Uninitialized,
    Running { child: Child, stdin: ChildStdin },
    Terminated,
}

impl Stage {
    fn state(&self) -> PiperState {
        match self {
            Stage::Uninitialized => PiperState::Uninitialized,
            Stage::Running { .. } => PiperState::Running,
            Stage::Terminated => PiperState::Terminated,
        }
    }
}

/// Pipes record payloads, one per line, into a single long-lived subprocess.
#[derive(Debug)]
pub struct PipeOutput {
    binary: Option<PathBuf>,
    args: Vec<String>,
    stage: Stage,
}

impl Default for PipeOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl PipeOutput {
    pub fn new() -> Self {
        Self {
            binary: None,
            args: Vec::new(),
            stage: Stage::Uninitialized,
        }
    }

    pub fn state(&self) -> PiperState {
        self.stage.state()
    }

    /// Resolved executable, once [`PipeOutput::init`] succeeded.
    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// OS process id of the subprocess while running.
    pub fn pid(&self) -> Option<u32> {
        match &self.stage {
            Stage::Running { child, .. } => child.id(),
            _ => None,
        }
    }

    /// Resolves the executable and spawns it with a piped stdin.
    ///
    /// stdout and stderr are inherited from the host. The child is killed if this instance is
    /// dropped before [`PipeOutput::run`] completes. Must be called inside a Tokio runtime.
    pub fn init(&mut self, config: &PipeOutputConfig) -> Result<(), PipeOutputError> {
        if !matches!(self.stage, Stage::Uninitialized) {
            return Err(PipeOutputError::InvalidState {
                operation: "initialize",
                state: self.state(),
            });
        }

        let binary =
            resolve_executable(&config.path).map_err(|source| PipeOutputError::Resolve {
                path: config.path.clone(),
                source,
            })?;

        let mut command = Command::new(&binary);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| PipeOutputError::Spawn {
            binary: binary.clone(),
            source,
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PipeOutputError::StdinUnavailable {
                binary: binary.clone(),
            })?;

        debug!(
            binary = ?binary,
            args = ?config.args,
            pid = ?child.id(),
            "spawned pipe output subprocess"
        );

        self.binary = Some(binary);
        self.args = config.args.clone();
        self.stage = Stage::Running { child, stdin };
        Ok(())
    }

    /// Decodes a host config section and initializes from it.
    pub fn init_from_toml(&mut self, section: toml::Value) -> Result<(), PipeOutputError> {
        let config = PipeOutputConfig::from_toml(section)?;
        self.init(&config)
    }

    /// Writes every record from `runner` to the subprocess until the input closes or a write
    /// fails, then waits for the subprocess to exit.
    ///
    /// Write and exit problems are logged and returned in the summary; `Err` only signals that
    /// the instance was not running. Records still queued when the loop stops are recycled
    /// unwritten and the input channel is closed.
    pub async fn run<R: Record>(
        &mut self,
        mut runner: OutputRunner<R>,
    ) -> Result<RunSummary, PipeOutputError> {
        let (mut child, mut stdin) = match mem::replace(&mut self.stage, Stage::Terminated) {
            Stage::Running { child, stdin } => (child, stdin),
            other => {
                let state = other.state();
                self.stage = other;
                return Err(PipeOutputError::InvalidState {
                    operation: "run",
                    state,
                });
            }
        };
        let binary = self.binary.clone().unwrap_or_default();

        let pumped = pump_records(&mut stdin, &mut runner, &binary).await;
        let released = release_queued(&mut runner);
        if released > 0 {
            debug!(
                plugin = runner.name(),
                released,
                "recycled records left unwritten"
            );
        }

        // Closing our end lets readers that wait for EOF finish.
        drop(stdin);
        let exit = child.wait().await;
        match &exit {
            Ok(status) if status.success() => info!(
                plugin = runner.name(),
                binary = ?binary,
                %status,
                "pipe output subprocess exited"
            ),
            Ok(status) => warn!(
                plugin = runner.name(),
                binary = ?binary,
                %status,
                "pipe output subprocess exited unsuccessfully"
            ),
            Err(err) => error!(
                plugin = runner.name(),
                binary = ?binary,
                error = %err,
                "failed waiting for pipe output subprocess"
            ),
        }

        Ok(RunSummary {
            frames_written: pumped.frames_written,
            short_writes: pumped.short_writes,
            end: pumped.end,
            exit,
        })
    }
}

pub(crate) struct Pumped {
    pub(crate) frames_written: usize,
    pub(crate) short_writes: usize,
    pub(crate) end: LoopEnd,
}

/// Frames each record as `<payload>\n` and writes the whole frame to `writer`.
///
/// Partial writes are continued until the frame is out, so a full pipe only suspends the loop.
/// A writer that stops accepting bytes partway through a frame is a short write: logged, the
/// tail dropped, never retried. A write error, or a frame that gets no bytes through at all,
/// ends the loop.
pub(crate) async fn pump_records<W, R>(
    writer: &mut W,
    runner: &mut OutputRunner<R>,
    binary: &Path,
) -> Pumped
where
    W: AsyncWrite + Unpin,
    R: Record,
{
    let mut frame = Vec::with_capacity(FRAME_CAPACITY);
    let mut frames_written = 0;
    let mut short_writes = 0;
    let mut index = 0;

    while let Some(record) = runner.in_chan().recv().await {
        frame.clear();
        frame.extend_from_slice(record.payload());
        frame.push(NEWLINE);
        record.recycle();

        match write_frame(writer, &frame).await {
            Ok(n) if n == frame.len() => frames_written += 1,
            Ok(n) => {
                short_writes += 1;
                warn!(
                    plugin = runner.name(),
                    binary = ?binary,
                    record = index,
                    written = n,
                    expected = frame.len(),
                    "truncated output to pipe"
                );
            }
            Err((written, error)) => {
                error!(
                    plugin = runner.name(),
                    binary = ?binary,
                    record = index,
                    written,
                    expected = frame.len(),
                    error = %error,
                    "can't pipe to subprocess"
                );
                return Pumped {
                    frames_written,
                    short_writes,
                    end: LoopEnd::WriteFailed {
                        record: index,
                        error,
                    },
                };
            }
        }
        index += 1;
    }

    Pumped {
        frames_written,
        short_writes,
        end: LoopEnd::InputClosed,
    }
}

/// Returns how many bytes went out. Errors carry the bytes written before the failure.
async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<usize, (usize, io::Error)>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while written < frame.len() {
        match writer.write(&frame[written..]).await {
            Ok(0) if written == 0 => {
                return Err((
                    0,
                    io::Error::new(
                        io::ErrorKind::WriteZero,
                        "subprocess stdin accepted no bytes",
                    ),
                ))
            }
            Ok(0) => break,
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err((written, err)),
        }
    }
    Ok(written)
}

/// Closes the input channel and recycles records that were queued but never written.
pub(crate) fn release_queued<R: Record>(runner: &mut OutputRunner<R>) -> usize {
    let in_chan = runner.in_chan();
    in_chan.close();
    let mut released = 0;
    while let Ok(record) = in_chan.try_recv() {
        record.recycle();
        released += 1;
    }
    released
}
