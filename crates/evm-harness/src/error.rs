use std::path::PathBuf;
use std::time::Duration;

use evm_harness_rpc::ClientError;
use evm_harness_rpc::TransportError;
use thiserror::Error;

use crate::config::NODE_BINARY_ENV;

/// The node never reached readiness. Always fatal for a suite.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("node binary not found ({})", binary.display())]
    MissingBinary { binary: PathBuf },

    #[error("failed to spawn node: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid readiness pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to prepare working directory {}: {source}", path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("node did not become ready within {}ms", timeout.as_millis())]
    Timeout {
        command: String,
        timeout: Duration,
        logs: Vec<String>,
    },

    #[error("node exited before becoming ready ({status})")]
    ExitedEarly {
        command: String,
        status: String,
        logs: Vec<String>,
    },
}

impl StartupError {
    pub fn command_line(&self) -> Option<&str> {
        match self {
            StartupError::Spawn { command, .. }
            | StartupError::Timeout { command, .. }
            | StartupError::ExitedEarly { command, .. } => Some(command),
            StartupError::MissingBinary { .. }
            | StartupError::Pattern { .. }
            | StartupError::WorkDir { .. } => None,
        }
    }

    pub fn logs(&self) -> &[String] {
        match self {
            StartupError::Timeout { logs, .. } | StartupError::ExitedEarly { logs, .. } => logs,
            _ => &[],
        }
    }

    /// Multi-line report written to stderr before the process exits.
    pub fn diagnostics(&self) -> String {
        match self {
            StartupError::MissingBinary { binary } if binary.as_os_str().is_empty() => format!(
                "Missing node binary: {NODE_BINARY_ENV} is not set.\n\
                 Point it at a compiled node, e.g. after building the node project with \
                 `make` or `cargo build`."
            ),
            StartupError::MissingBinary { binary } => format!(
                "Missing node binary ({}).\n\
                 Set {NODE_BINARY_ENV} to the path of a compiled node, e.g. after building \
                 the node project with `make` or `cargo build`.",
                binary.display()
            ),
            _ => {
                let mut report = format!("Failed to start node: {self}\n");
                if let Some(command) = self.command_line() {
                    report.push_str(&format!("Command: {command}\n"));
                }
                report.push_str("Logs:\n");
                report.push_str(&self.logs().join("\n"));
                report
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Rpc(#[from] ClientError),

    #[error("failed to connect to node: {0}")]
    Connect(#[from] TransportError),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("node (pid {pid}) still alive after {}ms; working directory kept", waited.as_millis())]
    TeardownStall { pid: u32, waited: Duration },

    #[error("process control failed for pid {pid}: {source}")]
    Process {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("permission denied signalling pid {pid}")]
    PermissionDenied { pid: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_names_env_var() {
        let err = StartupError::MissingBinary {
            binary: PathBuf::from("/nope/defid"),
        };
        let report = err.diagnostics();
        assert!(report.contains("/nope/defid"));
        assert!(report.contains(NODE_BINARY_ENV));
        assert!(err.logs().is_empty());
    }

    #[test]
    fn unset_binary_guidance() {
        let err = StartupError::MissingBinary {
            binary: PathBuf::new(),
        };
        assert!(err.diagnostics().contains("HARNESS_NODE_BINARY is not set"));
    }

    #[test]
    fn timeout_report_contains_command_and_logs() {
        let err = StartupError::Timeout {
            command: "defid -regtest".to_string(),
            timeout: Duration::from_millis(200),
            logs: vec!["line one".to_string(), "line two".to_string()],
        };
        let report = err.diagnostics();
        assert!(report.contains("within 200ms"));
        assert!(report.contains("Command: defid -regtest"));
        assert!(report.contains("line one\nline two"));
        assert_eq!(err.command_line(), Some("defid -regtest"));
    }

    #[test]
    fn teardown_stall_message() {
        let err = HarnessError::TeardownStall {
            pid: 42,
            waited: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "node (pid 42) still alive after 30000ms; working directory kept"
        );
    }
}
