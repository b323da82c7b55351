//! Node process supervision: spawn, readiness detection, termination.
//!
//! The spawned child is owned by a reaper task that awaits its exit, so a
//! liveness check by pid reports the process gone instead of finding a
//! zombie. Output from both streams is drained line by line for the whole
//! life of the process; lines are buffered for diagnostics only until the
//! readiness pattern matches.

use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::Instant;

use regex::Regex;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::error::HarnessError;
use crate::error::StartupError;
use crate::polling::Backoff;
use crate::polling::StopPolicy;
use crate::process::ProcessController;
use crate::process::ProcessStatus;
use crate::process::Signal;
use crate::process::UnixProcessController;
use crate::profile::NodePorts;

/// How long an early exit waits for the drain tasks to flush remaining output.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub work_dir: PathBuf,
    pub readiness_pattern: String,
    pub timeout: Duration,
    pub display_log: bool,
    pub ports: NodePorts,
}

impl LaunchSpec {
    pub fn command_line(&self) -> String {
        std::iter::once(self.binary.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    NotReady,
    Ready(Instant),
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub pid: u32,
    pub waited: Duration,
    pub polls: usize,
}

/// A running node that has printed its readiness marker.
pub struct NodeInstance {
    pid: u32,
    work_dir: PathBuf,
    ports: NodePorts,
    ready_at: Instant,
    command: String,
    exit: watch::Receiver<Option<String>>,
    controller: Arc<dyn ProcessController>,
    stopped: bool,
}

impl std::fmt::Debug for NodeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInstance")
            .field("pid", &self.pid)
            .field("work_dir", &self.work_dir)
            .field("ports", &self.ports)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl NodeInstance {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn ports(&self) -> NodePorts {
        self.ports
    }

    pub fn ready_at(&self) -> Instant {
        self.ready_at
    }

    pub fn readiness(&self) -> ReadinessState {
        ReadinessState::Ready(self.ready_at)
    }

    pub fn command_line(&self) -> &str {
        &self.command
    }

    /// Exit status as reported by the reaper, once the process is gone.
    pub fn exit_status(&self) -> Option<String> {
        self.exit.borrow().clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    #[cfg(test)]
    pub fn detached(pid: u32, work_dir: PathBuf, controller: Arc<dyn ProcessController>) -> Self {
        let (_tx, exit) = watch::channel(None);
        Self {
            pid,
            work_dir,
            ports: NodePorts::default(),
            ready_at: Instant::now(),
            command: String::new(),
            exit,
            controller,
            stopped: false,
        }
    }
}

impl Drop for NodeInstance {
    fn drop(&mut self) {
        if self.stopped || self.has_exited() {
            return;
        }
        warn!(pid = self.pid, "Node dropped without stop; sending kill");
        if let Err(err) = self.controller.send_signal(self.pid, Signal::Kill) {
            warn!(pid = self.pid, error = %err, "Failed to kill dropped node");
        }
    }
}

fn lock_logs(logs: &Mutex<Option<Vec<String>>>) -> MutexGuard<'_, Option<Vec<String>>> {
    logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
struct OutputSink {
    pattern: Regex,
    logs: Arc<Mutex<Option<Vec<String>>>>,
    readiness: Arc<watch::Sender<ReadinessState>>,
    display: bool,
}

impl OutputSink {
    fn observe(&self, stream: &'static str, line: String) {
        if self.display {
            info!(target: "node", stream, "{line}");
        }

        let mut logs = lock_logs(&self.logs);
        let Some(buffer) = logs.as_mut() else {
            return;
        };
        let matched = self.pattern.is_match(&line);
        buffer.push(line);
        if !matched {
            return;
        }
        *logs = None;
        drop(logs);

        self.readiness.send_if_modified(|state| match state {
            ReadinessState::NotReady => {
                *state = ReadinessState::Ready(Instant::now());
                true
            }
            ReadinessState::Ready(_) => false,
        });
    }

    fn buffered(&self) -> Vec<String> {
        lock_logs(&self.logs).clone().unwrap_or_default()
    }
}

fn spawn_drain<R>(reader: R, stream: &'static str, sink: OutputSink) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    sink.observe(stream, line);
                }
                Err(err) => {
                    debug!(stream, error = %err, "Node output stream failed");
                    break;
                }
            }
        }
    })
}

enum Startup {
    Ready(Instant),
    Exited(String),
}

pub struct Supervisor {
    controller: Arc<dyn ProcessController>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_controller(Arc::new(UnixProcessController))
    }

    pub fn with_controller(controller: Arc<dyn ProcessController>) -> Self {
        Self { controller }
    }

    /// Spawns the node and waits for its readiness marker.
    ///
    /// The working directory is created here. It is removed again when the
    /// node is missing or exits early; on timeout the node is killed and the
    /// directory is kept for inspection.
    pub async fn start(&self, spec: LaunchSpec) -> Result<NodeInstance, StartupError> {
        let command = spec.command_line();
        if spec.binary.as_os_str().is_empty() {
            return Err(StartupError::MissingBinary {
                binary: spec.binary,
            });
        }
        let pattern =
            Regex::new(&spec.readiness_pattern).map_err(|source| StartupError::Pattern {
                pattern: spec.readiness_pattern.clone(),
                source,
            })?;

        std::fs::create_dir_all(&spec.work_dir).map_err(|source| StartupError::WorkDir {
            path: spec.work_dir.clone(),
            source,
        })?;

        debug!(command = %command, "Spawning node");
        let spawned_at = Instant::now();
        let spawned = Command::new(&spec.binary)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                remove_work_dir(&spec.work_dir);
                if source.kind() == std::io::ErrorKind::NotFound {
                    return Err(StartupError::MissingBinary {
                        binary: spec.binary,
                    });
                }
                return Err(StartupError::Spawn { command, source });
            }
        };

        let Some(pid) = child.id() else {
            remove_work_dir(&spec.work_dir);
            return Err(StartupError::Spawn {
                command,
                source: std::io::Error::other("child exited before its pid was read"),
            });
        };

        let (ready_tx, mut ready_rx) = watch::channel(ReadinessState::NotReady);
        let sink = OutputSink {
            pattern,
            logs: Arc::new(Mutex::new(Some(Vec::new()))),
            readiness: Arc::new(ready_tx),
            display: spec.display_log,
        };
        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(spawn_drain(stdout, "stdout", sink.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(spawn_drain(stderr, "stderr", sink.clone()));
        }

        let (exit_tx, mut exit_rx) = watch::channel(None::<String>);
        tokio::spawn(async move {
            let summary = match child.wait().await {
                Ok(status) => status.to_string(),
                Err(err) => format!("wait failed: {err}"),
            };
            debug!(pid, status = %summary, "Node process exited");
            exit_tx.send_replace(Some(summary));
        });

        let exit_watch = exit_rx.clone();
        let waited = tokio::time::timeout(spec.timeout, async {
            tokio::select! {
                biased;
                ready = ready_rx.wait_for(ReadinessState::is_ready) => match ready {
                    Ok(state) => match *state {
                        ReadinessState::Ready(at) => Startup::Ready(at),
                        ReadinessState::NotReady => Startup::Exited(String::from("unknown")),
                    },
                    Err(_) => Startup::Exited(String::from("output closed")),
                },
                exited = exit_rx.wait_for(Option::is_some) => {
                    let status = exited
                        .ok()
                        .and_then(|status| status.clone())
                        .unwrap_or_else(|| String::from("unknown"));
                    Startup::Exited(status)
                }
            }
        })
        .await;

        let ready_at = match waited {
            Ok(Startup::Ready(at)) => at,
            Ok(Startup::Exited(status)) => {
                // Output can trail the exit; flush it before deciding.
                let _ = tokio::time::timeout(DRAIN_GRACE, futures_util::future::join_all(drains))
                    .await;
                let state = *sink.readiness.borrow();
                match state {
                    ReadinessState::Ready(at) => at,
                    ReadinessState::NotReady => {
                        remove_work_dir(&spec.work_dir);
                        return Err(StartupError::ExitedEarly {
                            command,
                            status,
                            logs: sink.buffered(),
                        });
                    }
                }
            }
            Err(_) => {
                if let Err(err) = self.controller.send_signal(pid, Signal::Kill) {
                    warn!(pid, error = %err, "Failed to kill node after startup timeout");
                }
                return Err(StartupError::Timeout {
                    command,
                    timeout: spec.timeout,
                    logs: sink.buffered(),
                });
            }
        };

        info!(
            pid,
            work_dir = %spec.work_dir.display(),
            startup_ms = ready_at.saturating_duration_since(spawned_at).as_millis() as u64,
            "Node ready"
        );
        Ok(NodeInstance {
            pid,
            work_dir: spec.work_dir,
            ports: spec.ports,
            ready_at,
            command,
            exit: exit_watch,
            controller: Arc::clone(&self.controller),
            stopped: false,
        })
    }

    /// [`Supervisor::start`], reporting any failure and exiting with code 1.
    pub async fn start_or_exit(&self, spec: LaunchSpec) -> NodeInstance {
        match self.start(spec).await {
            Ok(instance) => instance,
            Err(err) => {
                error!(error = %err, "Node startup failed");
                report_startup_failure(&err);
                std::process::exit(1);
            }
        }
    }

    /// Terminates the node, waits for liveness to report it gone, then
    /// removes its working directory.
    ///
    /// Polls with exponential backoff capped at `policy.poll_interval`. After
    /// `policy.give_up_after` a kill signal is sent, the directory is left in
    /// place and [`HarnessError::TeardownStall`] is returned.
    pub async fn stop(
        &self,
        mut instance: NodeInstance,
        policy: &StopPolicy,
    ) -> Result<StopReport, HarnessError> {
        let pid = instance.pid;
        let started = Instant::now();
        let mut polls = 0usize;

        match self.check(pid)? {
            ProcessStatus::NotFound => {
                instance.stopped = true;
                info!(
                    pid,
                    status = instance.exit_status().as_deref().unwrap_or("unknown"),
                    "Node already exited"
                );
                remove_dir(&instance.work_dir)?;
                return Ok(StopReport {
                    pid,
                    waited: started.elapsed(),
                    polls,
                });
            }
            ProcessStatus::NoPermission => return Err(HarnessError::PermissionDenied { pid }),
            ProcessStatus::Running => {}
        }

        self.controller
            .send_signal(pid, Signal::Term)
            .map_err(|source| HarnessError::Process { pid, source })?;
        debug!(pid, "Sent SIGTERM to node");

        let mut backoff = Backoff::new(policy.poll_interval);
        loop {
            polls += 1;
            match self.check(pid)? {
                ProcessStatus::NotFound => break,
                ProcessStatus::NoPermission => {
                    return Err(HarnessError::PermissionDenied { pid });
                }
                ProcessStatus::Running => {}
            }

            let waited = started.elapsed();
            if waited >= policy.give_up_after {
                instance.stopped = true;
                if let Err(err) = self.controller.send_signal(pid, Signal::Kill) {
                    warn!(pid, error = %err, "Failed to kill stalled node");
                }
                warn!(
                    pid,
                    waited_ms = waited.as_millis() as u64,
                    work_dir = %instance.work_dir.display(),
                    "Node did not exit; working directory kept"
                );
                return Err(HarnessError::TeardownStall { pid, waited });
            }
            let delay = backoff
                .next_delay()
                .min(policy.give_up_after.saturating_sub(waited));
            tokio::time::sleep(delay).await;
        }

        instance.stopped = true;
        remove_dir(&instance.work_dir)?;
        let waited = started.elapsed();
        info!(
            pid,
            waited_ms = waited.as_millis() as u64,
            status = instance.exit_status().as_deref().unwrap_or("unknown"),
            "Node stopped"
        );
        Ok(StopReport { pid, waited, polls })
    }

    fn check(&self, pid: u32) -> Result<ProcessStatus, HarnessError> {
        self.controller
            .check_process(pid)
            .map_err(|source| HarnessError::Process { pid, source })
    }
}

#[expect(
    clippy::print_stderr,
    reason = "Startup diagnostics must reach the terminal before exit"
)]
fn report_startup_failure(err: &StartupError) {
    eprintln!("{}", err.diagnostics());
}

fn remove_dir(path: &Path) -> Result<(), HarnessError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(HarnessError::Io(err)),
    }
}

fn remove_work_dir(path: &Path) {
    if let Err(err) = remove_dir(path) {
        warn!(path = %path.display(), error = %err, "Failed to remove working directory");
    }
}
