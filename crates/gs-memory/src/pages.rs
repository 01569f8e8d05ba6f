//! Page flags and host page geometry

use bitflags::bitflags;
use std::sync::OnceLock;

bitflags! {
    /// Page protection flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageFlags: u32 {
        /// Page is readable
        const READ    = 0b0000_0001;
        /// Page is writable
        const WRITE   = 0b0000_0010;
        /// Page is executable
        const EXECUTE = 0b0000_0100;

        /// Read and write access
        const RW  = Self::READ.bits() | Self::WRITE.bits();
        /// Read, write, and execute access
        const RWX = Self::READ.bits() | Self::WRITE.bits() | Self::EXECUTE.bits();
    }
}

impl Default for PageFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl PageFlags {
    /// Protection for a `vmalloc` request
    pub fn for_alloc(executable: bool) -> Self {
        if executable {
            Self::RWX
        } else {
            Self::RW
        }
    }

    /// Native `mmap`/`mprotect` protection bits
    #[cfg(unix)]
    pub fn to_native(self) -> libc::c_int {
        let mut prot = libc::PROT_NONE;
        if self.contains(Self::READ) {
            prot |= libc::PROT_READ;
        }
        if self.contains(Self::WRITE) {
            prot |= libc::PROT_WRITE;
        }
        if self.contains(Self::EXECUTE) {
            prot |= libc::PROT_EXEC;
        }
        prot
    }

    /// Native `VirtualAlloc` protection constant
    #[cfg(windows)]
    pub fn to_native(self) -> windows_sys::Win32::System::Memory::PAGE_PROTECTION_FLAGS {
        use windows_sys::Win32::System::Memory::*;

        match (self.contains(Self::EXECUTE), self.contains(Self::WRITE), self.contains(Self::READ)) {
            (true, true, _) => PAGE_EXECUTE_READWRITE,
            (true, false, true) => PAGE_EXECUTE_READ,
            (true, false, false) => PAGE_EXECUTE,
            (false, true, _) => PAGE_READWRITE,
            (false, false, true) => PAGE_READONLY,
            (false, false, false) => PAGE_NOACCESS,
        }
    }
}

static GEOMETRY: OnceLock<(usize, usize)> = OnceLock::new();

#[cfg(unix)]
fn query_geometry() -> (usize, usize) {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page = if page > 0 { page as usize } else { 0x1000 };
    (page, page)
}

#[cfg(windows)]
fn query_geometry() -> (usize, usize) {
    use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

    let mut info: SYSTEM_INFO = unsafe { std::mem::zeroed() };
    unsafe { GetSystemInfo(&mut info) };
    (info.dwPageSize as usize, info.dwAllocationGranularity as usize)
}

/// Host page size in bytes
pub fn page_size() -> usize {
    GEOMETRY.get_or_init(query_geometry).0
}

/// Granularity at which views of a shared object can be placed.
///
/// Equal to the page size on Unix; 64 KiB on most Windows systems.
pub fn allocation_granularity() -> usize {
    GEOMETRY.get_or_init(query_geometry).1
}

/// Round `size` up to a multiple of `align` (a power of two)
pub fn align_up(size: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (size + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_geometry() {
        let page = page_size();
        assert!(page.is_power_of_two());
        assert!(page >= 0x1000);
        assert_eq!(allocation_granularity() % page, 0);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 0x1000), 0);
        assert_eq!(align_up(1, 0x1000), 0x1000);
        assert_eq!(align_up(0x1000, 0x1000), 0x1000);
        assert_eq!(align_up(0x1001, 0x1000), 0x2000);
    }

    #[test]
    fn test_alloc_flags() {
        assert_eq!(PageFlags::for_alloc(false), PageFlags::RW);
        assert!(PageFlags::for_alloc(true).contains(PageFlags::EXECUTE));
        assert!(PageFlags::default().is_empty());
    }
}
