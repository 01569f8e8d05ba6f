//! Page-aligned virtual memory allocation

use crate::pages::{align_up, page_size, PageFlags};
use gs_core::error::MemoryError;
use std::ptr::NonNull;

/// A page-aligned anonymous allocation returned by [`vmalloc`].
///
/// Memory is zero-filled on allocation and released on drop.
pub struct PageBuffer {
    ptr: NonNull<u8>,
    len: usize,
    flags: PageFlags,
}

// Safety: the buffer exclusively owns its mapping
unsafe impl Send for PageBuffer {}
unsafe impl Sync for PageBuffer {}

/// Allocate `size` bytes rounded up to the page size.
///
/// Executable allocations are mapped read/write/execute. On x86_64 Linux
/// they are placed in the low 2 GiB so generated code can use 32-bit
/// displacements.
pub fn vmalloc(size: usize, executable: bool) -> Result<PageBuffer, MemoryError> {
    let page = page_size();
    if size == 0 {
        return Err(MemoryError::InvalidSize { size, page });
    }

    let len = align_up(size, page);
    let flags = PageFlags::for_alloc(executable);
    let ptr = NonNull::new(map_anonymous(len, flags)?).ok_or(MemoryError::OutOfMemory)?;

    tracing::trace!("vmalloc: {} bytes at {:p} ({:?})", len, ptr, flags);

    Ok(PageBuffer { ptr, len, flags })
}

/// Release a buffer returned by [`vmalloc`]. Equivalent to dropping it.
pub fn vmfree(buffer: PageBuffer) {
    drop(buffer);
}

#[cfg(unix)]
fn map_anonymous(len: usize, flags: PageFlags) -> Result<*mut u8, MemoryError> {
    #[allow(unused_mut)]
    let mut map_flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    if flags.contains(PageFlags::EXECUTE) {
        map_flags |= libc::MAP_32BIT;
    }

    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            flags.to_native(),
            map_flags,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(MemoryError::OutOfMemory);
    }

    Ok(ptr as *mut u8)
}

#[cfg(windows)]
fn map_anonymous(len: usize, flags: PageFlags) -> Result<*mut u8, MemoryError> {
    use windows_sys::Win32::System::Memory::*;

    let ptr = unsafe {
        VirtualAlloc(
            std::ptr::null(),
            len,
            MEM_RESERVE | MEM_COMMIT,
            flags.to_native(),
        )
    };

    if ptr.is_null() {
        return Err(MemoryError::OutOfMemory);
    }

    Ok(ptr as *mut u8)
}

impl PageBuffer {
    /// Allocated length (a multiple of the page size)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn flags(&self) -> PageFlags {
        self.flags
    }

    pub fn is_executable(&self) -> bool {
        self.flags.contains(PageFlags::EXECUTE)
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Explicitly release the buffer
    pub fn free(self) {
        vmfree(self)
    }
}

impl std::fmt::Debug for PageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("flags", &self.flags)
            .finish()
    }
}

impl Drop for PageBuffer {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }

        #[cfg(windows)]
        unsafe {
            use windows_sys::Win32::System::Memory::*;
            VirtualFree(self.ptr.as_ptr() as *mut _, 0, MEM_RELEASE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vmalloc_rounds_to_page() {
        let page = page_size();
        let buf = vmalloc(1, false).unwrap();
        assert_eq!(buf.len(), page);
        assert_eq!(buf.as_ptr() as usize % page, 0);
        assert!(!buf.is_executable());

        let buf = vmalloc(page + 1, false).unwrap();
        assert_eq!(buf.len(), 2 * page);
    }

    #[test]
    fn test_vmalloc_zero_filled_and_writable() {
        let mut buf = vmalloc(0x3000, false).unwrap();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
        buf.as_mut_slice()[0x2fff] = 0xAB;
        assert_eq!(buf.as_slice()[0x2fff], 0xAB);
        buf.free();
    }

    #[test]
    fn test_vmalloc_executable() {
        let buf = vmalloc(0x100, true).unwrap();
        assert!(buf.is_executable());
        assert_eq!(buf.flags(), PageFlags::RWX);

        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert!((buf.as_ptr() as usize) < (1usize << 31));
    }

    #[test]
    fn test_vmalloc_zero_size_rejected() {
        assert!(matches!(vmalloc(0, false), Err(MemoryError::InvalidSize { size: 0, .. })));
    }
}
