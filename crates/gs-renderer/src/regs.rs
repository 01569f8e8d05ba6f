//! GS register maps
//!
//! Privileged registers live in an 8 KiB block owned by the host emulator
//! and are accessed through [`PrivRegs`]. General registers are written by
//! GIF packets and stored in [`crate::state::GsState`].

use std::ptr::NonNull;

/// Size of the privileged register block
pub const REGS_MEM_SIZE: usize = 0x2000;

/// Privileged register offsets inside the register block
pub mod privileged {
    pub const PMODE: usize = 0x0000;
    pub const SMODE1: usize = 0x0010;
    pub const SMODE2: usize = 0x0020;
    pub const DISPFB1: usize = 0x0070;
    pub const DISPLAY1: usize = 0x0080;
    pub const DISPFB2: usize = 0x0090;
    pub const DISPLAY2: usize = 0x00A0;
    pub const BGCOLOR: usize = 0x00E0;
    pub const CSR: usize = 0x1000;
    pub const IMR: usize = 0x1010;
    pub const BUSDIR: usize = 0x1040;
    pub const SIGLBLID: usize = 0x1080;
}

/// CSR bits
pub mod csr {
    pub const SIGNAL: u64 = 1 << 0;
    pub const FINISH: u64 = 1 << 1;
    pub const HSINT: u64 = 1 << 2;
    pub const VSINT: u64 = 1 << 3;
    pub const FIELD: u64 = 1 << 13;
}

/// General register addresses (A+D addresses)
pub mod general {
    pub const PRIM: u8 = 0x00;
    pub const RGBAQ: u8 = 0x01;
    pub const ST: u8 = 0x02;
    pub const UV: u8 = 0x03;
    pub const XYZF2: u8 = 0x04;
    pub const XYZ2: u8 = 0x05;
    pub const TEX0_1: u8 = 0x06;
    pub const TEX0_2: u8 = 0x07;
    pub const CLAMP_1: u8 = 0x08;
    pub const CLAMP_2: u8 = 0x09;
    pub const FOG: u8 = 0x0A;
    pub const XYZF3: u8 = 0x0C;
    pub const XYZ3: u8 = 0x0D;
    pub const XYOFFSET_1: u8 = 0x18;
    pub const XYOFFSET_2: u8 = 0x19;
    pub const PRMODECONT: u8 = 0x1A;
    pub const TEXFLUSH: u8 = 0x3F;
    pub const SCISSOR_1: u8 = 0x40;
    pub const SCISSOR_2: u8 = 0x41;
    pub const FRAME_1: u8 = 0x4C;
    pub const FRAME_2: u8 = 0x4D;
    pub const ZBUF_1: u8 = 0x4E;
    pub const ZBUF_2: u8 = 0x4F;
    pub const BITBLTBUF: u8 = 0x50;
    pub const TRXPOS: u8 = 0x51;
    pub const TRXREG: u8 = 0x52;
    pub const TRXDIR: u8 = 0x53;
    pub const HWREG: u8 = 0x54;
    pub const SIGNAL: u8 = 0x60;
    pub const FINISH: u8 = 0x61;
    pub const LABEL: u8 = 0x62;

    /// Number of general register slots
    pub const COUNT: usize = 0x63;
}

#[inline]
fn field(raw: u64, lo: u32, bits: u32) -> u32 {
    ((raw >> lo) & ((1u64 << bits) - 1)) as u32
}

/// DISPFBn: display frame buffer setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayFrameBuffer {
    /// Base address in bytes
    pub base: u32,
    /// Buffer width in pixels
    pub width: u32,
    pub psm: u8,
    pub dbx: u32,
    pub dby: u32,
}

impl From<u64> for DisplayFrameBuffer {
    fn from(raw: u64) -> Self {
        Self {
            base: field(raw, 0, 9) * 2048 * 4,
            width: field(raw, 9, 6) * 64,
            psm: field(raw, 15, 5) as u8,
            dbx: field(raw, 32, 11),
            dby: field(raw, 43, 11),
        }
    }
}

/// DISPLAYn: display area setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayArea {
    pub dx: u32,
    pub dy: u32,
    pub magh: u32,
    pub magv: u32,
    pub dw: u32,
    pub dh: u32,
}

impl From<u64> for DisplayArea {
    fn from(raw: u64) -> Self {
        Self {
            dx: field(raw, 0, 12),
            dy: field(raw, 12, 11),
            magh: field(raw, 23, 4),
            magv: field(raw, 27, 2),
            dw: field(raw, 32, 12),
            dh: field(raw, 44, 11),
        }
    }
}

impl DisplayArea {
    /// Width in frame buffer pixels
    pub fn width(&self) -> u32 {
        (self.dw + 1) / (self.magh + 1)
    }

    pub fn height(&self) -> u32 {
        self.dh + 1
    }
}

/// One enabled read circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayCircuit {
    pub frame: DisplayFrameBuffer,
    pub area: DisplayArea,
}

/// View of the host's privileged register block.
///
/// Unbound views read zero and drop writes.
#[derive(Debug, Default)]
pub struct PrivRegs {
    base: Option<NonNull<u8>>,
}

// Safety: the host guarantees the block outlives the renderer and that all
// calls are serialized on the emulation thread
unsafe impl Send for PrivRegs {}

impl PrivRegs {
    /// Bind the register block.
    ///
    /// # Safety
    /// `ptr` must be null or point to `REGS_MEM_SIZE` bytes that stay valid
    /// for every later access through this view.
    pub unsafe fn bind(ptr: *mut u8) -> Self {
        Self { base: NonNull::new(ptr) }
    }

    pub fn is_bound(&self) -> bool {
        self.base.is_some()
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.base.map_or(std::ptr::null_mut(), NonNull::as_ptr)
    }

    pub fn read(&self, offset: usize) -> u64 {
        debug_assert!(offset + 8 <= REGS_MEM_SIZE);
        match self.base {
            Some(base) => unsafe { (base.as_ptr().add(offset) as *const u64).read_unaligned() },
            None => 0,
        }
    }

    pub fn write(&mut self, offset: usize, value: u64) {
        debug_assert!(offset + 8 <= REGS_MEM_SIZE);
        if let Some(base) = self.base {
            unsafe { (base.as_ptr().add(offset) as *mut u64).write_unaligned(value) };
        }
    }

    pub fn set_bits(&mut self, offset: usize, bits: u64) {
        let v = self.read(offset);
        self.write(offset, v | bits);
    }

    pub fn clear_bits(&mut self, offset: usize, bits: u64) {
        let v = self.read(offset);
        self.write(offset, v & !bits);
    }

    /// The circuit being displayed: circuit 2 when enabled, else circuit 1
    pub fn display_circuit(&self) -> Option<DisplayCircuit> {
        let pmode = self.read(privileged::PMODE);
        let (fb, area) = if pmode & 0b10 != 0 {
            (privileged::DISPFB2, privileged::DISPLAY2)
        } else if pmode & 0b01 != 0 {
            (privileged::DISPFB1, privileged::DISPLAY1)
        } else {
            return None;
        };

        Some(DisplayCircuit {
            frame: DisplayFrameBuffer::from(self.read(fb)),
            area: DisplayArea::from(self.read(area)),
        })
    }
}

/// Heap-backed privileged register block, for hosts that do not map one
pub struct RegsMemory {
    words: Box<[u64]>,
}

impl RegsMemory {
    pub fn new() -> Self {
        Self {
            words: vec![0u64; REGS_MEM_SIZE / 8].into_boxed_slice(),
        }
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr() as *mut u8
    }

    pub fn read(&self, offset: usize) -> u64 {
        self.words[offset / 8]
    }

    pub fn write(&mut self, offset: usize, value: u64) {
        self.words[offset / 8] = value;
    }

    /// Program PMODE/DISPFB/DISPLAY for circuit 1 showing a `width` x `height`
    /// PSMCT32 buffer at `base_page` (2048-word pages)
    pub fn set_display(&mut self, base_page: u32, width: u32, height: u32) {
        self.write(privileged::PMODE, 0b01);
        let fbw = (width + 63) / 64;
        self.write(privileged::DISPFB1, (base_page as u64) | ((fbw as u64) << 9));
        // MAGH 3: four video clocks per pixel
        let dw = width * 4 - 1;
        let display = (3u64 << 23) | ((dw as u64) << 32) | (((height - 1) as u64) << 44);
        self.write(privileged::DISPLAY1, display);
    }
}

impl Default for RegsMemory {
    fn default() -> Self {
        Self::new()
    }
}
