// Named shared memory backend for Linux
// Uses shm_open + mmap so that unrelated processes can map the same segment by name

use std::fmt::Debug;
use std::io;
#[cfg(target_os = "linux")]
use std::ffi::CString;
#[cfg(target_os = "linux")]
use std::ptr::{self, NonNull};

/// Shared memory backend trait
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying file descriptor
    fn raw_handle(&self) -> RawHandle;

    /// Name the segment was opened under
    fn name(&self) -> &str;

    /// True if this handle created the segment, false if it attached to an existing one
    fn created(&self) -> bool;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux)
    Fd(i32),
}

/// Create a new named shared memory segment of exactly `size` bytes.
///
/// Fails with `AlreadyExists` if a segment with that name is present.
/// The returned mapping is zero-filled by the kernel.
#[cfg(target_os = "linux")]
pub fn create_shared_memory(name: &str, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(name, size)?))
}

/// Attach to an existing named shared memory segment.
///
/// The segment must be exactly `size` bytes; anything else is a layout
/// mismatch with whoever created it.
#[cfg(target_os = "linux")]
pub fn attach_shared_memory(name: &str, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::attach(name, size)?))
}

/// Create the segment, or attach to it when another process got there first.
///
/// Check [`SharedMemoryBackend::created`] to learn which happened.
#[cfg(target_os = "linux")]
pub fn open_shared_memory(name: &str, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    match LinuxSharedMemory::create(name, size) {
        Ok(shm) => Ok(Box::new(shm)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attach_shared_memory(name, size),
        Err(e) => Err(e),
    }
}

/// Remove the segment name. Existing mappings stay valid until unmapped.
#[cfg(target_os = "linux")]
pub fn unlink_shared_memory(name: &str) -> io::Result<()> {
    let c_name = to_c_name(name)?;
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_name: &str, _size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
pub fn attach_shared_memory(_name: &str, _size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
pub fn open_shared_memory(_name: &str, _size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
pub fn unlink_shared_memory(_name: &str) -> io::Result<()> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    )
}

#[cfg(target_os = "linux")]
pub(crate) fn to_c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Object name contains a NUL byte: {:?}", name),
        )
    })
}

/// How many times `attach` re-reads a zero segment size before giving up
#[cfg(target_os = "linux")]
pub const ATTACH_SIZE_RETRIES: u32 = 50;

#[cfg(target_os = "linux")]
const ATTACH_SIZE_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(2);

#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct LinuxSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
    name: String,
    created: bool,
}

#[cfg(target_os = "linux")]
unsafe impl Send for LinuxSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for LinuxSharedMemory {}

#[cfg(target_os = "linux")]
impl LinuxSharedMemory {
    /// Create the named segment exclusively and size it.
    pub fn create(name: &str, size: usize) -> io::Result<Self> {
        let c_name = to_c_name(name)?;
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(io::Error::new(
                err.kind(),
                format!("Failed to size shared memory {} to {} bytes: {}", name, size, err),
            ));
        }

        match Self::map(fd, size) {
            Ok(ptr) => Ok(Self {
                ptr,
                size,
                fd,
                name: name.to_string(),
                created: true,
            }),
            Err(e) => {
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                Err(e)
            }
        }
    }

    /// Open an existing named segment whose size must equal `expected_size`.
    pub fn attach(name: &str, expected_size: usize) -> io::Result<Self> {
        let c_name = to_c_name(name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o600) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            return Err(io::Error::new(
                err.kind(),
                format!("Failed to open shared memory {}: {}", name, err),
            ));
        }

        // A size of zero means the creator has not reached ftruncate yet
        let mut actual_size = Self::segment_size(fd)?;
        let mut retries = 0;
        while actual_size == 0 && retries < ATTACH_SIZE_RETRIES {
            std::thread::sleep(ATTACH_SIZE_RETRY_DELAY);
            actual_size = Self::segment_size(fd)?;
            retries += 1;
        }

        if actual_size != expected_size {
            unsafe { libc::close(fd) };
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Shared memory {} has incompatible size: expected {}, got {}",
                    name, expected_size, actual_size
                ),
            ));
        }

        let ptr = Self::map(fd, actual_size)?;
        Ok(Self {
            ptr,
            size: actual_size,
            fd,
            name: name.to_string(),
            created: false,
        })
    }

    /// Current size of the segment behind `fd`. Closes `fd` on failure.
    fn segment_size(fd: i32) -> io::Result<usize> {
        unsafe {
            let mut stat: libc::stat = std::mem::zeroed();
            if libc::fstat(fd, &mut stat) != 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }
            Ok(stat.st_size as usize)
        }
    }

    /// Map `fd` read-write and shared. Closes `fd` on failure.
    fn map(fd: i32, size: usize) -> io::Result<NonNull<u8>> {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        NonNull::new(ptr as *mut u8).ok_or_else(|| {
            unsafe { libc::close(fd) };
            io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping")
        })
    }
}

#[cfg(target_os = "linux")]
impl Drop for LinuxSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for LinuxSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created(&self) -> bool {
        self.created
    }
}
