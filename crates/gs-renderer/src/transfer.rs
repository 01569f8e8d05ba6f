//! Image transfers between the host and GS local memory
//!
//! BITBLTBUF, TRXPOS and TRXREG describe a rectangle in local memory; a
//! write to TRXDIR starts moving pixels. Host to local data then arrives
//! through IMAGE packets and HWREG, local to host data leaves through the
//! read FIFO.

use crate::local_memory::LocalMemory;
use gs_vector::GsVector4i;

/// Pixel storage modes
pub mod psm {
    pub const CT32: u8 = 0x00;
    pub const CT24: u8 = 0x01;
    pub const CT16: u8 = 0x02;
    pub const CT16S: u8 = 0x0A;
    pub const T8: u8 = 0x13;
    pub const T4: u8 = 0x14;
    pub const T8H: u8 = 0x1B;
    pub const T4HL: u8 = 0x24;
    pub const T4HH: u8 = 0x2C;
    pub const Z32: u8 = 0x30;
    pub const Z24: u8 = 0x31;
    pub const Z16: u8 = 0x32;
    pub const Z16S: u8 = 0x3A;
}

/// Bits per pixel of a storage mode. Unknown modes are treated as 32-bit.
pub fn bits_per_pixel(format: u8) -> u32 {
    match format {
        psm::CT24 | psm::Z24 => 24,
        psm::CT16 | psm::CT16S | psm::Z16 | psm::Z16S => 16,
        psm::T8 => 8,
        psm::T4 => 4,
        _ => 32,
    }
}

/// BITBLTBUF: source and destination buffers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitBltBuf {
    /// Source base in bytes
    pub sbp: u32,
    /// Source width in pixels
    pub sbw: u32,
    pub spsm: u8,
    pub dbp: u32,
    pub dbw: u32,
    pub dpsm: u8,
}

impl From<u64> for BitBltBuf {
    fn from(raw: u64) -> Self {
        Self {
            sbp: ((raw & 0x3FFF) as u32) * 256,
            sbw: (((raw >> 16) & 0x3F) as u32) * 64,
            spsm: ((raw >> 24) & 0x3F) as u8,
            dbp: (((raw >> 32) & 0x3FFF) as u32) * 256,
            dbw: (((raw >> 48) & 0x3F) as u32) * 64,
            dpsm: ((raw >> 56) & 0x3F) as u8,
        }
    }
}

/// TRXPOS: rectangle origins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrxPos {
    pub ssax: u32,
    pub ssay: u32,
    pub dsax: u32,
    pub dsay: u32,
    pub dir: u8,
}

impl From<u64> for TrxPos {
    fn from(raw: u64) -> Self {
        Self {
            ssax: (raw & 0x7FF) as u32,
            ssay: ((raw >> 16) & 0x7FF) as u32,
            dsax: ((raw >> 32) & 0x7FF) as u32,
            dsay: ((raw >> 48) & 0x7FF) as u32,
            dir: ((raw >> 59) & 3) as u8,
        }
    }
}

/// TRXREG: rectangle size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrxReg {
    pub rrw: u32,
    pub rrh: u32,
}

impl From<u64> for TrxReg {
    fn from(raw: u64) -> Self {
        Self {
            rrw: (raw & 0xFFF) as u32,
            rrh: ((raw >> 32) & 0xFFF) as u32,
        }
    }
}

/// TRXDIR values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferDirection {
    HostToLocal,
    LocalToHost,
    LocalToLocal,
    #[default]
    Idle,
}

impl From<u64> for TransferDirection {
    fn from(raw: u64) -> Self {
        match raw & 3 {
            0 => Self::HostToLocal,
            1 => Self::LocalToHost,
            2 => Self::LocalToLocal,
            _ => Self::Idle,
        }
    }
}

/// Cursor over one transfer rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageTransfer {
    pub(crate) base: u32,
    pub(crate) bw: u32,
    pub(crate) psm: u8,
    pub(crate) x0: u32,
    pub(crate) y0: u32,
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) x: u32,
    pub(crate) y: u32,
    /// Bytes of a pixel split across two writes
    pub(crate) pending: [u8; 8],
    pub(crate) pending_len: u8,
}

impl ImageTransfer {
    pub fn new(base: u32, bw: u32, psm: u8, x0: u32, y0: u32, w: u32, h: u32) -> Self {
        Self {
            base,
            bw,
            psm,
            x0,
            y0,
            w,
            h,
            ..Default::default()
        }
    }

    /// Destination rectangle of a host to local transfer
    pub fn destination(buf: &BitBltBuf, pos: &TrxPos, reg: &TrxReg) -> Self {
        Self::new(buf.dbp, buf.dbw, buf.dpsm, pos.dsax, pos.dsay, reg.rrw, reg.rrh)
    }

    /// Source rectangle of a local to host or local to local transfer
    pub fn source(buf: &BitBltBuf, pos: &TrxPos, reg: &TrxReg) -> Self {
        Self::new(buf.sbp, buf.sbw, buf.spsm, pos.ssax, pos.ssay, reg.rrw, reg.rrh)
    }

    /// Whether pixels remain to be moved
    pub fn is_active(&self) -> bool {
        self.w > 0 && self.y < self.h
    }

    /// Whether a cursor restored from a snapshot can be resumed: every field
    /// fits its register width, the cursor lies inside the rectangle and a
    /// split pixel is shorter than one pixel. 4-bit transfers never split.
    pub(crate) fn is_consistent(&self) -> bool {
        let bpp = self.bits_per_pixel();
        let pending_ok = match bpp {
            4 => self.pending_len == 0,
            _ => u32::from(self.pending_len) < bpp / 8,
        };
        let fields_ok = self.base <= 0x3FFF * 256
            && self.bw <= 0x3F * 64
            && self.x0 <= 0x7FF
            && self.y0 <= 0x7FF
            && self.w <= 0xFFF
            && self.h <= 0xFFF;
        let cursor_ok = self.y <= self.h && (!self.is_active() || self.x < self.w);
        pending_ok && fields_ok && cursor_ok
    }

    pub fn bits_per_pixel(&self) -> u32 {
        bits_per_pixel(self.psm)
    }

    /// Total size of the rectangle in bytes, rounded up
    pub fn total_bytes(&self) -> usize {
        (self.w as usize * self.h as usize * self.bits_per_pixel() as usize + 7) / 8
    }

    /// Rewind to the first pixel
    pub fn restart(&mut self) {
        self.x = 0;
        self.y = 0;
        self.pending_len = 0;
    }

    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    fn pixel_index(&self) -> usize {
        (self.y0 + self.y) as usize * self.bw as usize + (self.x0 + self.x) as usize
    }

    fn byte_addr(&self, bpp: usize) -> usize {
        self.base as usize + self.pixel_index() * bpp
    }

    fn nibble_addr(&self) -> usize {
        self.base as usize * 2 + self.pixel_index()
    }

    fn advance(&mut self, pixels: u32) {
        self.x += pixels;
        if self.x >= self.w {
            self.x = 0;
            self.y += 1;
        }
    }

    /// Store host data into local memory. Returns the number of bytes
    /// consumed; data past the end of the rectangle is dropped.
    pub fn write(&mut self, mem: &mut LocalMemory, data: &[u8]) -> usize {
        if !self.is_active() {
            return 0;
        }
        match self.bits_per_pixel() {
            4 => self.write_nibbles(mem, data),
            bpp => self.write_bytes(mem, data, (bpp / 8) as usize),
        }
    }

    fn write_bytes(&mut self, mem: &mut LocalMemory, mut data: &[u8], bpp: usize) -> usize {
        let start = data.len();

        while !data.is_empty() && self.is_active() {
            if self.pending_len > 0 {
                let have = self.pending_len as usize;
                let take = (bpp - have).min(data.len());
                self.pending[have..have + take].copy_from_slice(&data[..take]);
                data = &data[take..];
                self.pending_len += take as u8;

                if self.pending_len as usize == bpp {
                    let pixel = self.pending;
                    mem.write(self.byte_addr(bpp), &pixel[..bpp]);
                    self.pending_len = 0;
                    self.advance(1);
                }
                continue;
            }

            let row_left = (self.w - self.x) as usize;
            let n = row_left.min(data.len() / bpp);
            if n == 0 {
                self.pending[..data.len()].copy_from_slice(data);
                self.pending_len = data.len() as u8;
                data = &[];
                break;
            }

            mem.write(self.byte_addr(bpp), &data[..n * bpp]);
            data = &data[n * bpp..];
            self.advance(n as u32);
        }

        start - data.len()
    }

    fn write_nibbles(&mut self, mem: &mut LocalMemory, data: &[u8]) -> usize {
        let total = data.len() * 2;
        let mut src = 0;

        while src < total && self.is_active() {
            let n = ((self.w - self.x) as usize).min(total - src);
            let dst = self.nibble_addr();

            if src % 2 == 0 && dst % 2 == 0 {
                merge_nibble_run(mem, dst / 2, &data[src / 2..], n);
            } else {
                for i in 0..n {
                    mem.write_nibble(dst + i, nibble(data, src + i));
                }
            }

            src += n;
            self.advance(n as u32);
        }

        (src + 1) / 2
    }

    /// Read pixels into `out`. Once the rectangle is exhausted the rest of
    /// `out` is zero-filled. Returns the number of bytes produced from
    /// local memory.
    pub fn read(&mut self, mem: &LocalMemory, out: &mut [u8]) -> usize {
        let produced = if !self.is_active() {
            0
        } else {
            match self.bits_per_pixel() {
                4 => self.read_nibbles(mem, out),
                bpp => self.read_bytes(mem, out, (bpp / 8) as usize),
            }
        };
        out[produced..].fill(0);
        produced
    }

    fn read_bytes(&mut self, mem: &LocalMemory, out: &mut [u8], bpp: usize) -> usize {
        let mut done = 0;

        while done < out.len() && self.is_active() {
            if self.pending_len > 0 {
                // Tail of a pixel split by the previous read
                let have = self.pending_len as usize;
                let off = bpp - have;
                let take = have.min(out.len() - done);
                out[done..done + take].copy_from_slice(&self.pending[off..off + take]);
                self.pending_len -= take as u8;
                done += take;
                if self.pending_len == 0 {
                    self.advance(1);
                }
                continue;
            }

            let row_left = (self.w - self.x) as usize;
            let n = row_left.min((out.len() - done) / bpp);
            if n == 0 {
                let mut pixel = [0u8; 8];
                mem.read(self.byte_addr(bpp), &mut pixel[..bpp]);
                let take = out.len() - done;
                out[done..].copy_from_slice(&pixel[..take]);
                // unread tail stays at pending[take..bpp]
                self.pending = pixel;
                self.pending_len = (bpp - take) as u8;
                done = out.len();
                break;
            }

            mem.read(self.byte_addr(bpp), &mut out[done..done + n * bpp]);
            done += n * bpp;
            self.advance(n as u32);
        }

        done
    }

    fn read_nibbles(&mut self, mem: &LocalMemory, out: &mut [u8]) -> usize {
        let total = out.len() * 2;
        let mut dst = 0;

        while dst < total && self.is_active() {
            let n = ((self.w - self.x) as usize).min(total - dst);
            let src = self.nibble_addr();
            for i in 0..n {
                let v = mem.read_nibble(src + i);
                let byte = &mut out[(dst + i) / 2];
                *byte = if (dst + i) % 2 == 0 { (*byte & 0xF0) | v } else { (*byte & 0x0F) | (v << 4) };
            }
            dst += n;
            self.advance(n as u32);
        }

        (dst + 1) / 2
    }
}

#[inline]
fn nibble(data: &[u8], index: usize) -> u8 {
    let byte = data[index / 2];
    if index % 2 == 0 {
        byte & 0x0F
    } else {
        byte >> 4
    }
}

/// Write `pixels` 4-bit pixels from `src` at byte `addr`, both byte aligned.
/// A trailing odd pixel only replaces the low nibble of its byte.
fn merge_nibble_run(mem: &mut LocalMemory, addr: usize, src: &[u8], pixels: usize) {
    let full = pixels / 2;
    let touched = full + pixels % 2;
    let mut done = 0;

    while done < touched {
        let chunk = (touched - done).min(GsVector4i::BYTES);
        let chunk_full = full.saturating_sub(done).min(GsVector4i::BYTES);

        let mut old = [0u8; 16];
        mem.read(addr + done, &mut old[..chunk]);

        let new = GsVector4i::load_partial(&src[done..done + chunk]);
        let whole = GsVector4i::xff(chunk_full);
        let mask = whole | GsVector4i::x0f(chunk).andnot(whole);
        let merged = GsVector4i::from_bytes(old).blend(new, mask).to_bytes();

        mem.write(addr + done, &merged[..chunk]);
        done += chunk;
    }
}

/// Copy the whole source rectangle to the destination rectangle. The source
/// is read completely before anything is written, so overlapping rectangles
/// copy the original pixels.
pub fn local_to_local(mem: &mut LocalMemory, src: &mut ImageTransfer, dst: &mut ImageTransfer) {
    let mut pixels = vec![0u8; src.total_bytes()];
    src.read(mem, &mut pixels);
    dst.write(mem, &pixels);
}
