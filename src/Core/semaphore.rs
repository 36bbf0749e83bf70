// Named counting semaphores shared between processes

use std::io;
use std::time::Duration;

/// Minimum number of unread signals a semaphore must be able to hold.
/// POSIX guarantees SEM_VALUE_MAX >= 32767, which covers it.
pub const MIN_SEMAPHORE_BOUND: u32 = 1024;

/// A POSIX named semaphore, created with count 0 if absent, otherwise opened as-is.
#[cfg(target_os = "linux")]
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: String,
}

#[cfg(target_os = "linux")]
unsafe impl Send for NamedSemaphore {}
#[cfg(target_os = "linux")]
unsafe impl Sync for NamedSemaphore {}

#[cfg(target_os = "linux")]
impl NamedSemaphore {
    /// Create or open the semaphore `name`. A newly created one starts at zero.
    pub fn open(name: &str) -> io::Result<Self> {
        let c_name = crate::Core::SharedMemory::to_c_name(name)?;
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                0o600 as libc::c_uint,
                0 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            let err = io::Error::last_os_error();
            return Err(io::Error::new(
                err.kind(),
                format!("Failed to open semaphore {}: {}", name, err),
            ));
        }
        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Increment the count by one, waking one waiter.
    pub fn post(&self) -> io::Result<()> {
        if unsafe { libc::sem_post(self.sem) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Wait up to `timeout` for the count to become positive, then decrement it.
    ///
    /// Returns `Ok(false)` on timeout. An interrupted wait also reports `false`
    /// so callers loop back and re-check their cancellation flag.
    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = realtime_deadline(timeout)?;
        if unsafe { libc::sem_timedwait(self.sem, &deadline) } == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ETIMEDOUT) | Some(libc::EINTR) => Ok(false),
            _ => Err(err),
        }
    }

    /// Decrement the count if it is positive, without blocking.
    pub fn try_wait(&self) -> io::Result<bool> {
        if unsafe { libc::sem_trywait(self.sem) } == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN) | Some(libc::EINTR) => Ok(false),
            _ => Err(err),
        }
    }

    /// Current count.
    pub fn value(&self) -> io::Result<i32> {
        let mut value: libc::c_int = 0;
        if unsafe { libc::sem_getvalue(self.sem, &mut value) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(value)
    }
}

#[cfg(target_os = "linux")]
impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}

#[cfg(target_os = "linux")]
impl std::fmt::Debug for NamedSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedSemaphore")
            .field("name", &self.name)
            .field("value", &self.value().ok())
            .finish()
    }
}

/// Remove the semaphore name. Open handles keep working.
#[cfg(target_os = "linux")]
pub fn unlink_semaphore(name: &str) -> io::Result<()> {
    let c_name = crate::Core::SharedMemory::to_c_name(name)?;
    if unsafe { libc::sem_unlink(c_name.as_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// sem_timedwait takes an absolute CLOCK_REALTIME deadline
#[cfg(target_os = "linux")]
fn realtime_deadline(timeout: Duration) -> io::Result<libc::timespec> {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let mut sec = now.tv_sec + timeout.as_secs() as libc::time_t;
    let mut nsec = now.tv_nsec + timeout.subsec_nanos() as libc::c_long;
    if nsec >= 1_000_000_000 {
        sec += 1;
        nsec -= 1_000_000_000;
    }
    Ok(libc::timespec {
        tv_sec: sec,
        tv_nsec: nsec,
    })
}

#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
pub struct NamedSemaphore {
    name: String,
}

#[cfg(not(target_os = "linux"))]
impl NamedSemaphore {
    pub fn open(_name: &str) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "Named semaphores only supported on Linux",
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post(&self) -> io::Result<()> {
        Ok(())
    }

    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        std::thread::sleep(timeout);
        Ok(false)
    }

    pub fn try_wait(&self) -> io::Result<bool> {
        Ok(false)
    }

    pub fn value(&self) -> io::Result<i32> {
        Ok(0)
    }
}

#[cfg(not(target_os = "linux"))]
pub fn unlink_semaphore(_name: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Named semaphores only supported on Linux",
    ))
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("/duochat_sem_test_{}_{}", tag, fastrand::u64(..))
    }

    #[test]
    fn post_then_wait() {
        let name = unique("post");
        let sem = NamedSemaphore::open(&name).unwrap();
        assert_eq!(sem.value().unwrap(), 0);
        sem.post().unwrap();
        sem.post().unwrap();
        assert_eq!(sem.value().unwrap(), 2);
        assert!(sem.wait_timeout(Duration::from_millis(10)).unwrap());
        assert!(sem.try_wait().unwrap());
        assert!(!sem.try_wait().unwrap());
        unlink_semaphore(&name).unwrap();
    }

    #[test]
    fn wait_times_out_when_empty() {
        let name = unique("timeout");
        let sem = NamedSemaphore::open(&name).unwrap();
        let start = std::time::Instant::now();
        assert!(!sem.wait_timeout(Duration::from_millis(50)).unwrap());
        assert!(start.elapsed() >= Duration::from_millis(40));
        unlink_semaphore(&name).unwrap();
    }

    #[test]
    fn reopen_sees_existing_count() {
        let name = unique("reopen");
        let first = NamedSemaphore::open(&name).unwrap();
        first.post().unwrap();
        let second = NamedSemaphore::open(&name).unwrap();
        assert_eq!(second.value().unwrap(), 1);
        assert!(second.try_wait().unwrap());
        assert_eq!(first.value().unwrap(), 0);
        unlink_semaphore(&name).unwrap();
    }

    #[test]
    fn holds_a_burst_of_unread_signals() {
        let name = unique("burst");
        let sem = NamedSemaphore::open(&name).unwrap();
        for _ in 0..MIN_SEMAPHORE_BOUND {
            sem.post().unwrap();
        }
        assert_eq!(sem.value().unwrap(), MIN_SEMAPHORE_BOUND as i32);
        unlink_semaphore(&name).unwrap();
    }
}
