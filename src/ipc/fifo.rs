//! Notification channel over a named pipe
//!
//! Every message is a fixed 100-byte frame: UTF-8 text, NUL-terminated,
//! zero-padded. Content is informational; receipt alone means "ledger changed".

use super::IpcError;
use std::ffi::CString;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
#[cfg(test)]
use std::time::Instant;

pub const MESSAGE_SIZE: usize = 100;

/// Pause after writing, before closing the write end
const WRITER_LINGER: Duration = Duration::from_millis(100);

/// Pause when the pipe has nothing to read
const READER_IDLE: Duration = Duration::from_millis(10);

const FIFO_MODE: u32 = 0o666;

/// Create the FIFO if it does not exist yet.
///
/// A FIFO created here gets mode 0666 regardless of the process umask.
pub fn ensure_fifo(path: &Path) -> Result<(), IpcError> {
    if path.exists() {
        return Ok(());
    }
    let c_path = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| IpcError::InvalidName(path.display().to_string()))?;
    if unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE as libc::mode_t) } != 0 {
        let err = io::Error::last_os_error();
        // Lost a creation race with the other daemon
        if err.raw_os_error() == Some(libc::EEXIST) {
            return Ok(());
        }
        return Err(IpcError::Io(err));
    }
    fs::set_permissions(path, Permissions::from_mode(FIFO_MODE))?;
    Ok(())
}

/// Build one frame, truncating on a character boundary to leave room for NUL
pub fn encode_frame(message: &str) -> [u8; MESSAGE_SIZE] {
    let mut end = message.len().min(MESSAGE_SIZE - 1);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    let mut frame = [0u8; MESSAGE_SIZE];
    frame[..end].copy_from_slice(&message.as_bytes()[..end]);
    frame
}

/// Text up to the first NUL
pub fn decode_frame(frame: &[u8]) -> String {
    let end = frame.iter().position(|b| *b == 0).unwrap_or(frame.len());
    String::from_utf8_lossy(&frame[..end]).into_owned()
}

/// Write end, used by the Ingestor
#[derive(Debug, Clone)]
pub struct NotificationSender {
    path: PathBuf,
}

impl NotificationSender {
    /// Create the FIFO if needed. Called once at start-up; `send` never
    /// creates it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IpcError> {
        let path = path.as_ref().to_path_buf();
        ensure_fifo(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send one frame. Returns `false` when no reader is attached and the
    /// message was dropped.
    ///
    /// The open never blocks, so a missing Detector cannot stall a caller
    /// that holds the ledger semaphore.
    pub fn send(&self, message: &str) -> Result<bool, IpcError> {
        let mut pipe = match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
        {
            Ok(pipe) => pipe,
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
                log::warn!(
                    "⚠️  No reader on {}, notification dropped: {}",
                    self.path.display(),
                    message
                );
                return Ok(false);
            }
            Err(e) => return Err(IpcError::Io(e)),
        };

        let frame = encode_frame(message);
        match pipe.write_all(&frame) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                log::warn!("⚠️  Pipe {} full, notification dropped", self.path.display());
                return Ok(false);
            }
            Err(e) => return Err(IpcError::Io(e)),
        }

        thread::sleep(WRITER_LINGER);
        Ok(true)
    }
}

/// Read end, used by the Detector
#[derive(Debug)]
pub struct NotificationReceiver {
    path: PathBuf,
    pipe: File,
    frame: [u8; MESSAGE_SIZE],
    filled: usize,
}

impl NotificationReceiver {
    /// Create the FIFO if needed and open it for reading without waiting
    /// for a writer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IpcError> {
        let path = path.as_ref().to_path_buf();
        ensure_fifo(&path)?;
        let pipe = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)?;
        Ok(Self {
            path,
            pipe,
            frame: [0; MESSAGE_SIZE],
            filled: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One read attempt. `Ok(None)` when there is nothing (or not yet a
    /// whole frame) to return.
    pub fn try_recv(&mut self) -> Result<Option<String>, IpcError> {
        loop {
            match self.pipe.read(&mut self.frame[self.filled..]) {
                Ok(0) => {
                    // Writer closed mid-frame: deliver what arrived
                    if self.filled > 0 {
                        return Ok(Some(self.take_frame()));
                    }
                    return Ok(None);
                }
                Ok(n) => {
                    self.filled += n;
                    if self.filled == MESSAGE_SIZE {
                        return Ok(Some(self.take_frame()));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IpcError::Io(e)),
            }
        }
    }

    /// Block until a message arrives
    pub fn recv(&mut self) -> Result<String, IpcError> {
        loop {
            if let Some(message) = self.try_recv()? {
                return Ok(message);
            }
            thread::sleep(READER_IDLE);
        }
    }

    #[cfg(test)]
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<String>, IpcError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_recv()? {
                return Ok(Some(message));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(READER_IDLE);
        }
    }

    fn take_frame(&mut self) -> String {
        let message = decode_frame(&self.frame[..self.filled]);
        self.frame = [0; MESSAGE_SIZE];
        self.filled = 0;
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_nul_terminated() {
        let frame = encode_frame("Ledger updated by branch 01");
        assert_eq!(frame.len(), MESSAGE_SIZE);
        assert_eq!(decode_frame(&frame), "Ledger updated by branch 01");
    }

    #[test]
    fn test_long_message_truncated() {
        let long = "x".repeat(250);
        let frame = encode_frame(&long);
        assert_eq!(frame[MESSAGE_SIZE - 1], 0);
        assert_eq!(decode_frame(&frame).len(), MESSAGE_SIZE - 1);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        // 98 ASCII bytes then a 3-byte euro sign straddling the limit
        let msg = format!("{}€", "a".repeat(98));
        let decoded = decode_frame(&encode_frame(&msg));
        assert_eq!(decoded, "a".repeat(98));
    }

    #[test]
    fn test_send_without_reader_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let sender = NotificationSender::open(dir.path().join("pipe")).unwrap();
        assert!(!sender.send("nobody listening").unwrap());
    }

    #[test]
    fn test_send_and_receive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        let mut receiver = NotificationReceiver::open(&path).unwrap();

        assert!(receiver.try_recv().unwrap().is_none());

        let sender = NotificationSender::open(&path).unwrap();
        assert!(sender.send("Ledger updated by branch 02 (SU002_1.csv) with 4 records").unwrap());

        let message = receiver
            .recv_timeout(Duration::from_secs(2))
            .unwrap()
            .unwrap();
        assert_eq!(message, "Ledger updated by branch 02 (SU002_1.csv) with 4 records");
    }

    #[test]
    fn test_created_fifo_ignores_umask() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        NotificationSender::open(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, FIFO_MODE);
    }

    #[test]
    fn test_send_after_fifo_removed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        let sender = NotificationSender::open(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(sender.send("gone").is_err());
        assert!(!path.exists());
    }
}
