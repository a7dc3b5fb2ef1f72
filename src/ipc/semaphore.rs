//! Named POSIX semaphore used as the cross-process ledger mutex

use super::IpcError;
use std::ffi::CString;
use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

const SEM_MODE: libc::c_uint = 0o660;
const SEM_INITIAL: libc::c_uint = 1;

pub struct NamedSemaphore {
    name: String,
    sem: *mut libc::sem_t,
}

// sem_wait/sem_post are safe to call from any thread
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl std::fmt::Debug for NamedSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedSemaphore").field("name", &self.name).finish()
    }
}

impl NamedSemaphore {
    /// Open the named semaphore, creating it with value 1 if absent.
    ///
    /// A semaphore created here gets mode 0660 regardless of the process umask.
    pub fn open(name: &str) -> Result<Self, IpcError> {
        let c_name = CString::new(name).map_err(|_| IpcError::InvalidName(name.to_string()))?;
        let mut sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                SEM_MODE,
                SEM_INITIAL,
            )
        };
        if sem != libc::SEM_FAILED {
            let backing = backing_path(name);
            if let Err(e) = fs::set_permissions(&backing, Permissions::from_mode(SEM_MODE)) {
                log::warn!(
                    "⚠️  Semaphore {}: cannot set mode on {}: {}",
                    name,
                    backing.display(),
                    e
                );
            }
        } else if io::Error::last_os_error().raw_os_error() == Some(libc::EEXIST) {
            sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
        }
        if sem == libc::SEM_FAILED {
            return Err(IpcError::Io(io::Error::last_os_error()));
        }
        Ok(Self {
            name: name.to_string(),
            sem,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the semaphore is ours. Released when the guard drops.
    pub fn acquire(&self) -> Result<SemaphoreGuard<'_>, IpcError> {
        loop {
            if unsafe { libc::sem_wait(self.sem) } == 0 {
                return Ok(SemaphoreGuard { sem: self });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(IpcError::Io(err));
            }
        }
    }

    /// Take the semaphore only if it is free right now
    pub fn try_acquire(&self) -> Result<Option<SemaphoreGuard<'_>>, IpcError> {
        loop {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(Some(SemaphoreGuard { sem: self }));
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => return Ok(None),
                Some(libc::EINTR) => continue,
                _ => return Err(IpcError::Io(err)),
            }
        }
    }

    fn post(&self) {
        if unsafe { libc::sem_post(self.sem) } != 0 {
            log::error!(
                "sem_post on {} failed: {}",
                self.name,
                io::Error::last_os_error()
            );
        }
    }

    /// Remove the name from the system; open handles keep working
    pub fn unlink(name: &str) -> Result<(), IpcError> {
        let c_name = CString::new(name).map_err(|_| IpcError::InvalidName(name.to_string()))?;
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } != 0 {
            return Err(IpcError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }
}

/// Where glibc keeps a named semaphore
fn backing_path(name: &str) -> PathBuf {
    PathBuf::from(format!("/dev/shm/sem.{}", name.trim_start_matches('/')))
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_close(self.sem) };
    }
}

/// Holds the semaphore; posts it back on drop, including during unwinding
#[must_use = "the semaphore is released as soon as the guard is dropped"]
pub struct SemaphoreGuard<'a> {
    sem: &'a NamedSemaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.sem.post();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn unique_name() -> String {
        format!(
            "/fraudmon_sem_test_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        )
    }

    #[test]
    fn test_guard_excludes_second_holder() {
        let name = unique_name();
        let sem = NamedSemaphore::open(&name).unwrap();

        let guard = sem.acquire().unwrap();
        assert!(sem.try_acquire().unwrap().is_none());
        drop(guard);
        assert!(sem.try_acquire().unwrap().is_some());

        NamedSemaphore::unlink(&name).unwrap();
    }

    #[test]
    fn test_second_handle_shares_state() {
        let name = unique_name();
        let a = NamedSemaphore::open(&name).unwrap();
        let b = NamedSemaphore::open(&name).unwrap();

        let _held = a.acquire().unwrap();
        assert!(b.try_acquire().unwrap().is_none());

        NamedSemaphore::unlink(&name).unwrap();
    }

    #[test]
    fn test_critical_sections_serialize() {
        let name = unique_name();
        let sem = Arc::new(NamedSemaphore::open(&name).unwrap());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sem = Arc::clone(&sem);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _guard = sem.acquire().unwrap();
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(1));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);

        NamedSemaphore::unlink(&name).unwrap();
    }

    #[test]
    fn test_guard_released_on_panic() {
        let name = unique_name();
        let sem = Arc::new(NamedSemaphore::open(&name).unwrap());

        let worker = Arc::clone(&sem);
        let result = thread::spawn(move || {
            let _guard = worker.acquire().unwrap();
            panic!("worker failed inside critical section");
        })
        .join();
        assert!(result.is_err());
        assert!(sem.try_acquire().unwrap().is_some());

        NamedSemaphore::unlink(&name).unwrap();
    }

    #[test]
    fn test_created_semaphore_ignores_umask() {
        let name = unique_name();
        let sem = NamedSemaphore::open(&name).unwrap();
        let mode = fs::metadata(backing_path(&name)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SEM_MODE);

        // Reopening an existing semaphore keeps its value
        let guard = sem.acquire().unwrap();
        let again = NamedSemaphore::open(&name).unwrap();
        assert!(again.try_acquire().unwrap().is_none());
        drop(guard);

        NamedSemaphore::unlink(&name).unwrap();
    }
}
