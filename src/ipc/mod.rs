//! Cross-process coordination: the ledger semaphore and the notification pipe,
//! plus the in-process gates the Detector fans notifications out through.

pub mod fifo;
pub mod gate;
pub mod semaphore;

pub use fifo::{NotificationReceiver, NotificationSender};
pub use gate::{ActivationGate, GateBank};
pub use semaphore::{NamedSemaphore, SemaphoreGuard};

#[derive(Debug)]
pub enum IpcError {
    Io(std::io::Error),
    InvalidName(String),
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::Io(err)
    }
}

impl std::fmt::Display for IpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpcError::Io(e) => write!(f, "IO error: {}", e),
            IpcError::InvalidName(name) => write!(f, "Invalid IPC name: {}", name),
        }
    }
}

impl std::error::Error for IpcError {}
