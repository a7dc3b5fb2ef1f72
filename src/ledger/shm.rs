//! POSIX shared memory segments (`shm_open` + `mmap`)

use super::arena::{Region, HEADER_LEN};
use super::backend::LedgerError;
use std::ffi::CString;
use std::io;

const SEGMENT_MODE: libc::mode_t = 0o660;

fn segment_name(name: &str) -> Result<CString, LedgerError> {
    CString::new(name)
        .map_err(|_| LedgerError::Segment(format!("invalid segment name '{}'", name)))
}

fn os_error(call: &str, name: &str) -> LedgerError {
    LedgerError::Segment(format!("{} {}: {}", call, name, io::Error::last_os_error()))
}

/// Map `len` bytes of `fd`, closing the descriptor either way
fn map_fd(fd: libc::c_int, len: usize, prot: libc::c_int, name: &str) -> Result<*mut u8, LedgerError> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            prot,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    let err = if ptr == libc::MAP_FAILED {
        Some(os_error("mmap", name))
    } else {
        None
    };
    unsafe { libc::close(fd) };
    match err {
        Some(e) => Err(e),
        None => Ok(ptr as *mut u8),
    }
}

/// Writable mapping owned by the process that created the segment
#[derive(Debug)]
pub struct SharedSegment {
    name: String,
    ptr: *mut u8,
    len: usize,
}

// The mapping is process-wide; access is serialized by the owner
unsafe impl Send for SharedSegment {}

impl SharedSegment {
    /// Create (or reuse) the named segment sized for `capacity` data bytes
    /// plus the arena header, and map it read-write.
    ///
    /// A segment created here gets mode 0660 regardless of the process umask.
    pub fn create(name: &str, capacity: usize) -> Result<Self, LedgerError> {
        let c_name = segment_name(name)?;
        let len = HEADER_LEN + capacity;

        let mut fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                SEGMENT_MODE,
            )
        };
        if fd >= 0 {
            if unsafe { libc::fchmod(fd, SEGMENT_MODE) } != 0 {
                let err = os_error("fchmod", name);
                unsafe { libc::close(fd) };
                return Err(err);
            }
        } else if io::Error::last_os_error().raw_os_error() == Some(libc::EEXIST) {
            // Left behind by an earlier run
            fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        }
        if fd < 0 {
            return Err(os_error("shm_open", name));
        }

        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = os_error("ftruncate", name);
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let ptr = map_fd(fd, len, libc::PROT_READ | libc::PROT_WRITE, name)?;
        Ok(Self {
            name: name.to_string(),
            ptr,
            len,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the name; existing mappings stay valid until dropped
    pub fn unlink(name: &str) -> Result<(), LedgerError> {
        let c_name = segment_name(name)?;
        if unsafe { libc::shm_unlink(c_name.as_ptr()) } != 0 {
            return Err(os_error("shm_unlink", name));
        }
        Ok(())
    }
}

impl Region for SharedSegment {
    fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.len) };
    }
}

/// Read-only mapping of a segment created by another process
#[derive(Debug)]
pub struct SegmentView {
    ptr: *const u8,
    len: usize,
}

impl SegmentView {
    pub fn open(name: &str) -> Result<Self, LedgerError> {
        let c_name = segment_name(name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };
        if fd < 0 {
            return Err(os_error("shm_open", name));
        }

        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            let err = os_error("fstat", name);
            unsafe { libc::close(fd) };
            return Err(err);
        }
        let len = stat.st_size as usize;
        if len < HEADER_LEN {
            unsafe { libc::close(fd) };
            return Err(LedgerError::Segment(format!(
                "segment {} is {} bytes, smaller than its header",
                name, len
            )));
        }

        let ptr = map_fd(fd, len, libc::PROT_READ, name)?;
        Ok(Self { ptr, len })
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Drop for SegmentView {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.len) };
    }
}
