//! Liveness checks and signals for the node process, by pid.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    NotFound,
    NoPermission,
}

pub trait ProcessController: Send + Sync {
    fn check_process(&self, pid: u32) -> Result<ProcessStatus, std::io::Error>;

    fn send_signal(&self, pid: u32, signal: Signal) -> Result<(), std::io::Error>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessController;

fn to_pid_t(pid: u32) -> Result<libc::pid_t, std::io::Error> {
    pid.try_into()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "PID out of range"))
}

impl ProcessController for UnixProcessController {
    fn check_process(&self, pid: u32) -> Result<ProcessStatus, std::io::Error> {
        let pid_t = to_pid_t(pid)?;

        // SAFETY: signal 0 performs permission and existence checks only.
        let result = unsafe { libc::kill(pid_t, 0) };
        if result == 0 {
            return Ok(ProcessStatus::Running);
        }

        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Ok(ProcessStatus::NotFound),
            Some(libc::EPERM) => Ok(ProcessStatus::NoPermission),
            _ => Err(err),
        }
    }

    fn send_signal(&self, pid: u32, signal: Signal) -> Result<(), std::io::Error> {
        let pid_t = to_pid_t(pid)?;

        let sig = match signal {
            Signal::Term => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };

        // SAFETY: pid comes from a child this process spawned.
        let result = unsafe { libc::kill(pid_t, sig) };
        if result == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            // Already reaped.
            Some(libc::ESRCH) => Ok(()),
            _ => Err(err),
        }
    }
}
