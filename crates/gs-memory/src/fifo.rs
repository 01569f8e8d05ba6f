//! Self-aliasing FIFO mappings
//!
//! [`fifo_alloc`] creates one shared backing object of `size` bytes and maps
//! it `repeat` times back to back, so that an access running past the end of
//! one segment lands at the start of the same memory. Consumers can copy
//! across the logical end without splitting the copy.
//!
//! There is no internal synchronization. Concurrent access from more than
//! one thread is undefined.

use crate::pages::allocation_granularity;
use gs_core::error::MemoryError;
use std::ptr::NonNull;

/// Largest supported repeat count
pub const MAX_REPEAT: usize = 8;

/// A shared object mapped `repeat` consecutive times
pub struct FifoBuffer {
    base: NonNull<u8>,
    size: usize,
    repeat: usize,
}

// Safety: the buffer exclusively owns its mappings, and shared references
// only read through them
unsafe impl Send for FifoBuffer {}
unsafe impl Sync for FifoBuffer {}

/// Map a `size`-byte shared object `repeat` times consecutively.
///
/// `size` must be a non-zero multiple of the allocation granularity and
/// `repeat` must be in `1..=MAX_REPEAT`. On failure every mapping made so far
/// is undone and the backing object is closed.
pub fn fifo_alloc(size: usize, repeat: usize) -> Result<FifoBuffer, MemoryError> {
    let granularity = allocation_granularity();
    if size == 0 || size % granularity != 0 {
        return Err(MemoryError::InvalidSize { size, page: granularity });
    }
    if !(1..=MAX_REPEAT).contains(&repeat) {
        return Err(MemoryError::InvalidRepeat(repeat));
    }
    let total = size.checked_mul(repeat).ok_or(MemoryError::OutOfMemory)?;

    let base = imp::map_repeated(size, repeat, total)?;
    tracing::debug!("fifo_alloc: {:#x} bytes x {} at {:p}", size, repeat, base);

    Ok(FifoBuffer { base, size, repeat })
}

/// Release a FIFO mapping. Equivalent to dropping it.
pub fn fifo_free(buffer: FifoBuffer) {
    drop(buffer);
}

impl FifoBuffer {
    /// Size of one segment (the logical buffer size)
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Length of the whole mapped range, `size * repeat`
    pub fn mapped_len(&self) -> usize {
        self.size * self.repeat
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Start of segment `index`
    ///
    /// # Panics
    /// Panics if `index >= repeat`.
    pub fn segment_ptr(&self, index: usize) -> *const u8 {
        assert!(index < self.repeat, "segment {} out of range", index);
        unsafe { self.base.as_ptr().add(index * self.size) }
    }

    /// Copy `src` into the mapping starting at `offset`.
    ///
    /// `offset + src.len()` may run up to `mapped_len()`; bytes past the
    /// first segment land in the aliased start of the buffer. Returns the
    /// number of bytes written, clamped to the mapped range.
    pub fn write(&mut self, offset: usize, src: &[u8]) -> usize {
        let n = self.clamp(offset, src.len());
        if n > 0 {
            unsafe {
                std::ptr::copy(src.as_ptr(), self.base.as_ptr().add(offset), n);
            }
        }
        n
    }

    /// Copy from the mapping at `offset` into `dst`. Same clamping as [`write`](Self::write).
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> usize {
        let n = self.clamp(offset, dst.len());
        if n > 0 {
            unsafe {
                std::ptr::copy(self.base.as_ptr().add(offset), dst.as_mut_ptr(), n);
            }
        }
        n
    }

    /// Read one byte, wrapping `offset` into the first segment
    pub fn byte(&self, offset: usize) -> u8 {
        unsafe { self.base.as_ptr().add(offset % self.size).read() }
    }

    /// Fill the logical buffer with `value`
    pub fn fill(&mut self, value: u8) {
        unsafe {
            std::ptr::write_bytes(self.base.as_ptr(), value, self.size);
        }
    }

    fn clamp(&self, offset: usize, len: usize) -> usize {
        self.mapped_len().saturating_sub(offset).min(len)
    }
}

impl std::fmt::Debug for FifoBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoBuffer")
            .field("base", &self.base)
            .field("size", &self.size)
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl Drop for FifoBuffer {
    fn drop(&mut self) {
        unsafe { imp::unmap_repeated(self.base.as_ptr(), self.size, self.repeat) };
    }
}

#[cfg(unix)]
mod imp {
    use gs_core::error::MemoryError;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::ptr::NonNull;

    /// Reserved address range, unmapped on drop unless released
    struct Reservation {
        base: *mut libc::c_void,
        len: usize,
    }

    impl Reservation {
        fn new(len: usize) -> Result<Self, MemoryError> {
            let base = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_NONE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if base == libc::MAP_FAILED {
                return Err(MemoryError::OutOfMemory);
            }
            Ok(Self { base, len })
        }

        fn release(self) -> *mut libc::c_void {
            let base = self.base;
            std::mem::forget(self);
            base
        }
    }

    impl Drop for Reservation {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.base, self.len);
            }
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn create_backing() -> Result<OwnedFd, MemoryError> {
        let fd = unsafe { libc::memfd_create(c"gsx-fifo".as_ptr(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            return Err(MemoryError::SharedObject(std::io::Error::last_os_error().to_string()));
        }
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn create_backing() -> Result<OwnedFd, MemoryError> {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let name = format!(
            "/gsx-fifo-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let cname = std::ffi::CString::new(name)
            .map_err(|e| MemoryError::SharedObject(e.to_string()))?;

        let fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                0o600,
            )
        };
        if fd < 0 {
            return Err(MemoryError::SharedObject(std::io::Error::last_os_error().to_string()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        // The name is only needed to obtain the descriptor
        unsafe { libc::shm_unlink(cname.as_ptr()) };

        Ok(fd)
    }

    pub(super) fn map_repeated(
        size: usize,
        repeat: usize,
        total: usize,
    ) -> Result<NonNull<u8>, MemoryError> {
        let fd = create_backing()?;

        if unsafe { libc::ftruncate(fd.as_raw_fd(), size as libc::off_t) } != 0 {
            return Err(MemoryError::SharedObject(std::io::Error::last_os_error().to_string()));
        }

        let reservation = Reservation::new(total)?;

        for segment in 0..repeat {
            let want = unsafe { (reservation.base as *mut u8).add(segment * size) } as *mut libc::c_void;
            let got = unsafe {
                libc::mmap(
                    want,
                    size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED | libc::MAP_FIXED,
                    fd.as_raw_fd(),
                    0,
                )
            };
            if got != want {
                let reason = std::io::Error::last_os_error().to_string();
                tracing::warn!("fifo_alloc: segment {} failed: {}", segment, reason);
                return Err(MemoryError::Map { segment, reason });
            }
        }

        // Mappings keep the object alive after the descriptor closes
        drop(fd);

        NonNull::new(reservation.release() as *mut u8).ok_or(MemoryError::OutOfMemory)
    }

    pub(super) unsafe fn unmap_repeated(base: *mut u8, size: usize, repeat: usize) {
        libc::munmap(base as *mut libc::c_void, size * repeat);
    }
}

#[cfg(windows)]
mod imp {
    use gs_core::error::MemoryError;
    use std::ffi::c_void;
    use std::ptr::NonNull;
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
    use windows_sys::Win32::System::Memory::*;

    const MAX_ATTEMPTS: usize = 5;

    /// Section handle, closed on drop
    struct Section(HANDLE);

    impl Drop for Section {
        fn drop(&mut self) {
            unsafe { CloseHandle(self.0) };
        }
    }

    /// Views mapped so far, unmapped on drop unless released
    struct Views(Vec<*mut c_void>);

    impl Views {
        fn release(mut self) {
            self.0.clear();
        }
    }

    impl Drop for Views {
        fn drop(&mut self) {
            for &view in &self.0 {
                unsafe { UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS { Value: view }) };
            }
        }
    }

    /// Find a free range of `total` bytes. Another thread may claim it
    /// before the views are placed, so callers retry.
    fn probe_range(total: usize) -> Result<*mut c_void, MemoryError> {
        let base = unsafe { VirtualAlloc(std::ptr::null(), total, MEM_RESERVE, PAGE_NOACCESS) };
        if base.is_null() {
            return Err(MemoryError::OutOfMemory);
        }
        unsafe { VirtualFree(base, 0, MEM_RELEASE) };
        Ok(base)
    }

    fn try_map(section: &Section, size: usize, repeat: usize, base: *mut c_void) -> Result<(), MemoryError> {
        let mut views = Views(Vec::with_capacity(repeat));

        for segment in 0..repeat {
            let want = unsafe { (base as *mut u8).add(segment * size) } as *mut c_void;
            let got = unsafe { MapViewOfFileEx(section.0, FILE_MAP_ALL_ACCESS, 0, 0, size, want) };
            if got.Value.is_null() {
                let reason = std::io::Error::last_os_error().to_string();
                return Err(MemoryError::Map { segment, reason });
            }
            views.0.push(got.Value);
            if got.Value != want {
                return Err(MemoryError::Map {
                    segment,
                    reason: format!("view placed at {:p} instead of {:p}", got.Value, want),
                });
            }
        }

        views.release();
        Ok(())
    }

    pub(super) fn map_repeated(
        size: usize,
        repeat: usize,
        total: usize,
    ) -> Result<NonNull<u8>, MemoryError> {
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                std::ptr::null(),
                PAGE_READWRITE,
                ((size as u64) >> 32) as u32,
                size as u32,
                std::ptr::null(),
            )
        };
        if handle == 0 {
            return Err(MemoryError::SharedObject(std::io::Error::last_os_error().to_string()));
        }
        let section = Section(handle);

        let mut last_error = MemoryError::OutOfMemory;
        for attempt in 0..MAX_ATTEMPTS {
            let base = probe_range(total)?;
            match try_map(&section, size, repeat, base) {
                Ok(()) => return NonNull::new(base as *mut u8).ok_or(MemoryError::OutOfMemory),
                Err(e) => {
                    tracing::debug!("fifo_alloc: attempt {} failed: {}", attempt, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    pub(super) unsafe fn unmap_repeated(base: *mut u8, size: usize, repeat: usize) {
        for segment in 0..repeat {
            UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS {
                Value: base.add(segment * size) as *mut c_void,
            });
        }
    }
}
