//! GS local memory
//!
//! 4 MiB of VRAM, addressed linearly. The backing store is a self-aliasing
//! FIFO mapping, so a row that runs past the end of VRAM lands at address 0
//! without a split copy.

use gs_core::error::MemoryError;
use gs_memory::{fifo_alloc, FifoBuffer};

/// Size of GS local memory in bytes
pub const LOCAL_MEMORY_SIZE: usize = 4 * 1024 * 1024;

/// Number of aliased views of local memory
const REPEAT: usize = 4;

/// GS local memory
pub struct LocalMemory {
    fifo: FifoBuffer,
}

impl LocalMemory {
    pub fn new() -> Result<Self, MemoryError> {
        let fifo = fifo_alloc(LOCAL_MEMORY_SIZE, REPEAT)?;
        Ok(Self { fifo })
    }

    #[inline]
    pub fn wrap(addr: usize) -> usize {
        addr & (LOCAL_MEMORY_SIZE - 1)
    }

    /// Copy `src` to `addr`, wrapping at the end of local memory
    pub fn write(&mut self, addr: usize, src: &[u8]) {
        let mut addr = Self::wrap(addr);
        for chunk in src.chunks(LOCAL_MEMORY_SIZE) {
            self.fifo.write(addr, chunk);
            addr = Self::wrap(addr + chunk.len());
        }
    }

    /// Copy from `addr` into `dst`, wrapping at the end of local memory
    pub fn read(&self, addr: usize, dst: &mut [u8]) {
        let mut addr = Self::wrap(addr);
        for chunk in dst.chunks_mut(LOCAL_MEMORY_SIZE) {
            let len = chunk.len();
            self.fifo.read(addr, chunk);
            addr = Self::wrap(addr + len);
        }
    }

    pub fn read_u8(&self, addr: usize) -> u8 {
        self.fifo.byte(addr)
    }

    pub fn read_u16(&self, addr: usize) -> u16 {
        let mut buf = [0u8; 2];
        self.read(addr, &mut buf);
        u16::from_le_bytes(buf)
    }

    pub fn read_u32(&self, addr: usize) -> u32 {
        let mut buf = [0u8; 4];
        self.read(addr, &mut buf);
        u32::from_le_bytes(buf)
    }

    pub fn write_u32(&mut self, addr: usize, value: u32) {
        self.write(addr, &value.to_le_bytes());
    }

    /// Read the 4-bit pixel at nibble address `naddr`. Odd nibbles are the
    /// high half of their byte.
    pub fn read_nibble(&self, naddr: usize) -> u8 {
        let byte = self.read_u8(naddr >> 1);
        if naddr & 1 != 0 {
            byte >> 4
        } else {
            byte & 0x0f
        }
    }

    pub fn write_nibble(&mut self, naddr: usize, value: u8) {
        let addr = naddr >> 1;
        let byte = self.read_u8(addr);
        let merged = if naddr & 1 != 0 {
            (byte & 0x0f) | (value << 4)
        } else {
            (byte & 0xf0) | (value & 0x0f)
        };
        self.write(addr, &[merged]);
    }

    pub fn clear(&mut self) {
        self.fifo.fill(0);
    }

    /// Copy of the whole memory image
    pub fn snapshot(&self, out: &mut [u8]) {
        let n = out.len().min(LOCAL_MEMORY_SIZE);
        self.fifo.read(0, &mut out[..n]);
    }

    /// Replace the memory image with `image`
    pub fn restore(&mut self, image: &[u8]) {
        let n = image.len().min(LOCAL_MEMORY_SIZE);
        self.fifo.write(0, &image[..n]);
    }

    /// The first segment of the mapping, for bulk readers
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.fifo.as_ptr(), LOCAL_MEMORY_SIZE) }
    }

    /// Slice of `len` bytes starting at `addr`, running through the aliased
    /// views when it crosses the end of memory
    pub fn span(&self, addr: usize, len: usize) -> &[u8] {
        let start = Self::wrap(addr);
        let len = len.min(self.fifo.mapped_len() - start);
        unsafe { std::slice::from_raw_parts(self.fifo.as_ptr().add(start), len) }
    }
}

impl std::fmt::Debug for LocalMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMemory").field("fifo", &self.fifo).finish()
    }
}
