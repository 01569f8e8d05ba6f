//! Emulated GS state
//!
//! [`GsState`] consumes GIF packets from the four paths, keeps the general
//! registers, runs image transfers against local memory and reports
//! SIGNAL/FINISH/LABEL events through the host's privileged registers.
//! Rasterization is not done here; kicked vertices are only counted.

use crate::gif::{desc, read_u64_le, GifFormat, GifPath, GifTag, PathState};
use crate::local_memory::LocalMemory;
use crate::regs::{csr, general, privileged, DisplayCircuit, PrivRegs};
use crate::transfer::{self, BitBltBuf, ImageTransfer, TransferDirection, TrxPos, TrxReg};
use gs_core::error::MemoryError;

/// Size of the VU1 data memory window PATH1 packets are read from
pub const VU1_WINDOW: usize = 0x4000;

/// Primitive drawn by vertex kicks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Point,
    Line,
    LineStrip,
    Triangle,
    TriangleStrip,
    TriangleFan,
    Sprite,
    Invalid,
}

impl PrimitiveType {
    pub fn from_prim(prim: u64) -> Self {
        match prim & 7 {
            0 => Self::Point,
            1 => Self::Line,
            2 => Self::LineStrip,
            3 => Self::Triangle,
            4 => Self::TriangleStrip,
            5 => Self::TriangleFan,
            6 => Self::Sprite,
            _ => Self::Invalid,
        }
    }

    /// Vertices needed to complete one primitive
    pub fn vertex_count(self) -> usize {
        match self {
            Self::Point => 1,
            Self::Line | Self::LineStrip | Self::Sprite => 2,
            Self::Triangle | Self::TriangleStrip | Self::TriangleFan => 3,
            Self::Invalid => 0,
        }
    }

    /// Whether consecutive primitives share vertices
    pub fn is_connected(self) -> bool {
        matches!(self, Self::LineStrip | Self::TriangleStrip | Self::TriangleFan)
    }
}

/// Counters for work done by the state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GsStats {
    pub vertices: u64,
    pub primitives: u64,
    pub image_bytes: u64,
    pub signals: u64,
    pub finishes: u64,
}

/// Emulated GS
pub struct GsState {
    pub(crate) regs: [u64; general::COUNT],
    pub(crate) paths: [PathState; 4],
    pub(crate) trxdir: TransferDirection,
    pub(crate) transfer: ImageTransfer,
    pub(crate) readback: ImageTransfer,
    /// Q from the last PACKED ST, as raw f32 bits
    pub(crate) q: u32,
    pub(crate) vertex_queue: usize,
    pub(crate) mem: LocalMemory,
    priv_regs: PrivRegs,
    stats: GsStats,
}

impl GsState {
    pub fn new() -> Result<Self, MemoryError> {
        Ok(Self {
            regs: [0; general::COUNT],
            paths: [PathState::default(); 4],
            trxdir: TransferDirection::Idle,
            transfer: ImageTransfer::default(),
            readback: ImageTransfer::default(),
            q: 1.0f32.to_bits(),
            vertex_queue: 0,
            mem: LocalMemory::new()?,
            priv_regs: PrivRegs::default(),
            stats: GsStats::default(),
        })
    }

    /// Bind the host's privileged register block.
    ///
    /// # Safety
    /// See [`PrivRegs::bind`].
    pub unsafe fn set_regs_mem(&mut self, basemem: *mut u8) {
        self.priv_regs = PrivRegs::bind(basemem);
    }

    pub fn regs_mem(&self) -> *mut u8 {
        self.priv_regs.as_ptr()
    }

    pub fn priv_regs(&self) -> &PrivRegs {
        &self.priv_regs
    }

    pub fn priv_regs_mut(&mut self) -> &mut PrivRegs {
        &mut self.priv_regs
    }

    pub fn memory(&self) -> &LocalMemory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut LocalMemory {
        &mut self.mem
    }

    pub fn stats(&self) -> GsStats {
        self.stats
    }

    /// Current value of general register `addr`
    pub fn reg(&self, addr: u8) -> u64 {
        self.regs.get(addr as usize).copied().unwrap_or(0)
    }

    pub fn path(&self, path: GifPath) -> &PathState {
        &self.paths[path.index()]
    }

    pub fn q(&self) -> f32 {
        f32::from_bits(self.q)
    }

    pub fn transfer_direction(&self) -> TransferDirection {
        self.trxdir
    }

    pub fn display_circuit(&self) -> Option<DisplayCircuit> {
        self.priv_regs.display_circuit()
    }

    /// Feed GIF data on `path`. Only whole qwords are consumed; a trailing
    /// partial qword is dropped. PATH1 stops at the end of a packet with EOP.
    /// Returns the number of bytes consumed.
    pub fn transfer(&mut self, path: GifPath, data: &[u8]) -> usize {
        self.process(path, data).0
    }

    /// Run a PATH1 XGKICK starting at `addr` in VU1 memory. Reads past the
    /// end of the window wrap to its start; at most one window is read.
    pub fn transfer_vu1(&mut self, vu1_mem: &[u8], addr: u32) {
        let window = &vu1_mem[..vu1_mem.len().min(VU1_WINDOW)];
        if window.is_empty() {
            return;
        }

        let start = (addr as usize % window.len()) & !0xF;
        let (head, tail) = window.split_at(start);
        let (consumed, done) = self.process(GifPath::Path1, tail);
        if !done && consumed == tail.len() {
            self.process(GifPath::Path1, head);
        }
    }

    /// Returns (bytes consumed, whether PATH1 reached EOP)
    fn process(&mut self, path: GifPath, data: &[u8]) -> (usize, bool) {
        let idx = path.index();
        let mut offset = 0;

        while offset + 16 <= data.len() {
            let qword = &data[offset..offset + 16];
            let state = self.paths[idx];

            if !state.in_packet() {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(qword);
                let tag = GifTag::decode(&raw);
                offset += 16;

                if tag.pre && tag.format == GifFormat::Packed {
                    self.write_reg(general::PRIM, tag.prim as u64);
                }
                self.paths[idx].start(tag);

                if tag.nloop == 0 && tag.eop && path == GifPath::Path1 {
                    return (offset, true);
                }
                continue;
            }

            match state.tag.format {
                GifFormat::Packed => {
                    let lo = read_u64_le(qword, 0);
                    let hi = read_u64_le(qword, 8);
                    self.write_packed(state.tag.reg(state.reg), lo, hi);
                    self.paths[idx].next_reg();
                    offset += 16;
                }
                GifFormat::Reglist => {
                    for half in 0..2 {
                        let st = self.paths[idx];
                        if !st.in_packet() {
                            break;
                        }
                        let reg = st.tag.reg(st.reg);
                        if reg != desc::A_D && reg != desc::NOP {
                            self.write_reg(reg, read_u64_le(qword, half * 8));
                        }
                        self.paths[idx].next_reg();
                    }
                    offset += 16;
                }
                GifFormat::Image => {
                    let qwords = (state.nloop as usize).min((data.len() - offset) / 16);
                    let end = offset + qwords * 16;
                    self.write_image(&data[offset..end]);
                    self.paths[idx].nloop -= qwords as u16;
                    offset = end;
                }
            }

            let st = self.paths[idx];
            if !st.in_packet() && st.tag.eop && path == GifPath::Path1 {
                return (offset, true);
            }
        }

        (offset, false)
    }

    fn write_packed(&mut self, reg: u8, lo: u64, hi: u64) {
        match reg {
            desc::PRIM => self.write_reg(general::PRIM, lo & 0x7FF),
            desc::RGBAQ => {
                let rgba = (lo & 0xFF)
                    | (((lo >> 32) & 0xFF) << 8)
                    | ((hi & 0xFF) << 16)
                    | (((hi >> 32) & 0xFF) << 24);
                self.write_reg(general::RGBAQ, rgba | ((self.q as u64) << 32));
            }
            desc::ST => {
                self.q = hi as u32;
                self.write_reg(general::ST, lo);
            }
            desc::UV => {
                let uv = (lo & 0x3FFF) | (((lo >> 32) & 0x3FFF) << 16);
                self.write_reg(general::UV, uv);
            }
            desc::XYZF2 | desc::XYZF3 => {
                let value = xy(lo) | (((hi >> 4) & 0xFF_FFFF) << 32) | (((hi >> 36) & 0xFF) << 56);
                let adc = reg == desc::XYZF3 || (hi >> 47) & 1 != 0;
                self.write_reg(if adc { general::XYZF3 } else { general::XYZF2 }, value);
            }
            desc::XYZ2 | desc::XYZ3 => {
                let value = xy(lo) | ((hi & 0xFFFF_FFFF) << 32);
                let adc = reg == desc::XYZ3 || (hi >> 47) & 1 != 0;
                self.write_reg(if adc { general::XYZ3 } else { general::XYZ2 }, value);
            }
            desc::FOG => self.write_reg(general::FOG, ((hi >> 36) & 0xFF) << 56),
            desc::A_D => self.write_reg((hi & 0xFF) as u8, lo),
            desc::RESERVED | desc::NOP => {}
            // TEX0_n, CLAMP_n
            _ => self.write_reg(reg, lo),
        }
    }

    /// Write a general register and run its side effects
    pub fn write_reg(&mut self, addr: u8, value: u64) {
        let Some(slot) = self.regs.get_mut(addr as usize) else {
            tracing::trace!("GS: write to unknown register {:#04x}", addr);
            return;
        };
        *slot = value;

        match addr {
            general::PRIM => self.vertex_queue = 0,
            general::XYZF2 | general::XYZ2 => self.vertex_kick(true),
            general::XYZF3 | general::XYZ3 => self.vertex_kick(false),
            general::TRXDIR => self.start_transfer(TransferDirection::from(value)),
            general::HWREG => self.write_image(&value.to_le_bytes()),
            general::SIGNAL => {
                self.update_siglblid(value, 0);
                self.priv_regs.set_bits(privileged::CSR, csr::SIGNAL);
                self.stats.signals += 1;
            }
            general::FINISH => {
                self.priv_regs.set_bits(privileged::CSR, csr::FINISH);
                self.stats.finishes += 1;
            }
            general::LABEL => self.update_siglblid(value, 32),
            _ => {}
        }
    }

    /// Masked update of the SIGLBLID half at `shift`
    fn update_siglblid(&mut self, value: u64, shift: u32) {
        let id = value as u32;
        let mask = (value >> 32) as u32;
        let current = self.priv_regs.read(privileged::SIGLBLID);
        let half = (current >> shift) as u32;
        let merged = (half & !mask) | (id & mask);
        let updated = (current & !(0xFFFF_FFFFu64 << shift)) | ((merged as u64) << shift);
        self.priv_regs.write(privileged::SIGLBLID, updated);
    }

    fn vertex_kick(&mut self, draw: bool) {
        let prim = PrimitiveType::from_prim(self.regs[general::PRIM as usize]);
        let needed = prim.vertex_count();
        if needed == 0 {
            return;
        }

        self.stats.vertices += 1;
        self.vertex_queue += 1;
        if self.vertex_queue >= needed {
            if draw {
                self.stats.primitives += 1;
            }
            self.vertex_queue = if prim.is_connected() { needed - 1 } else { 0 };
        }
    }

    fn start_transfer(&mut self, dir: TransferDirection) {
        let buf = BitBltBuf::from(self.regs[general::BITBLTBUF as usize]);
        let pos = TrxPos::from(self.regs[general::TRXPOS as usize]);
        let reg = TrxReg::from(self.regs[general::TRXREG as usize]);
        tracing::debug!("GS: image transfer {:?} {}x{}", dir, reg.rrw, reg.rrh);

        match dir {
            TransferDirection::HostToLocal => {
                self.transfer = ImageTransfer::destination(&buf, &pos, &reg);
            }
            TransferDirection::LocalToHost => {
                self.readback = ImageTransfer::source(&buf, &pos, &reg);
            }
            TransferDirection::LocalToLocal => {
                let mut src = ImageTransfer::source(&buf, &pos, &reg);
                let mut dst = ImageTransfer::destination(&buf, &pos, &reg);
                transfer::local_to_local(&mut self.mem, &mut src, &mut dst);
            }
            TransferDirection::Idle => {}
        }
        self.trxdir = dir;
    }

    fn write_image(&mut self, data: &[u8]) {
        if self.trxdir != TransferDirection::HostToLocal {
            return;
        }
        let n = self.transfer.write(&mut self.mem, data);
        self.stats.image_bytes += n as u64;
    }

    /// Local to host readback into `out`. Zero-filled when no readback is
    /// running or the rectangle is exhausted.
    pub fn read_fifo(&mut self, out: &mut [u8]) {
        if self.trxdir == TransferDirection::LocalToHost {
            self.readback.read(&self.mem, out);
        } else {
            out.fill(0);
        }
    }

    /// Restart the readback from the first pixel, then read into `out`
    pub fn init_read_fifo(&mut self, out: &mut [u8]) {
        self.readback.restart();
        self.read_fifo(out);
    }

    /// Clear registers, path state, transfers and local memory
    pub fn reset(&mut self) {
        self.regs = [0; general::COUNT];
        self.paths = [PathState::default(); 4];
        self.trxdir = TransferDirection::Idle;
        self.transfer = ImageTransfer::default();
        self.readback = ImageTransfer::default();
        self.q = 1.0f32.to_bits();
        self.vertex_queue = 0;
        self.mem.clear();
        self.stats = GsStats::default();
    }

    /// Reset the GIF paths selected by `mask` (bit n selects path n)
    pub fn soft_reset(&mut self, mask: u32) {
        for (n, path) in self.paths.iter_mut().enumerate() {
            if mask & (1 << n) != 0 {
                path.reset();
            }
        }
        self.trxdir = TransferDirection::Idle;
        self.q = 1.0f32.to_bits();
    }

    /// Latch the field bit at the start of a vblank
    pub fn vsync(&mut self, field: i32) {
        let regs = &mut self.priv_regs;
        if field != 0 {
            regs.set_bits(privileged::CSR, csr::FIELD);
        } else {
            regs.clear_bits(privileged::CSR, csr::FIELD);
        }
        regs.set_bits(privileged::CSR, csr::VSINT);
    }
}

#[inline]
fn xy(lo: u64) -> u64 {
    (lo & 0xFFFF) | (((lo >> 32) & 0xFFFF) << 16)
}

impl std::fmt::Debug for GsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GsState")
            .field("paths", &self.paths)
            .field("trxdir", &self.trxdir)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::RegsMemory;

    fn tag(nloop: u16, eop: bool, format: GifFormat, regs: &[u8]) -> [u8; 16] {
        let packed = regs.iter().enumerate().fold(0u64, |acc, (i, r)| acc | ((*r as u64) << (i * 4)));
        GifTag {
            nloop,
            eop,
            pre: false,
            prim: 0,
            format,
            nreg: regs.len() as u8,
            regs: packed,
        }
        .encode()
    }

    fn qword(lo: u64, hi: u64) -> [u8; 16] {
        let mut q = [0u8; 16];
        q[..8].copy_from_slice(&lo.to_le_bytes());
        q[8..].copy_from_slice(&hi.to_le_bytes());
        q
    }

    fn ad(addr: u8, value: u64) -> [u8; 16] {
        qword(value, addr as u64)
    }

    #[test]
    fn test_packed_a_d() {
        let mut gs = GsState::new().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&tag(2, true, GifFormat::Packed, &[desc::A_D]));
        data.extend_from_slice(&ad(general::FRAME_1, 0x1234));
        data.extend_from_slice(&ad(general::SCISSOR_1, 0x5678));

        assert_eq!(gs.transfer(GifPath::Path3, &data), 48);
        assert_eq!(gs.reg(general::FRAME_1), 0x1234);
        assert_eq!(gs.reg(general::SCISSOR_1), 0x5678);
        assert!(!gs.path(GifPath::Path3).in_packet());
    }

    #[test]
    fn test_packed_rgbaq_uses_st_q() {
        let mut gs = GsState::new().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&tag(1, true, GifFormat::Packed, &[desc::ST, desc::RGBAQ]));
        data.extend_from_slice(&qword(0x1111, 2.0f32.to_bits() as u64));
        data.extend_from_slice(&qword(0x10 | (0x20 << 32), 0x30 | (0x40 << 32)));
        gs.transfer(GifPath::Path2, &data);

        assert_eq!(gs.q(), 2.0);
        assert_eq!(gs.reg(general::ST), 0x1111);
        let rgbaq = gs.reg(general::RGBAQ);
        assert_eq!(rgbaq as u32, 0x40302010);
        assert_eq!((rgbaq >> 32) as u32, 2.0f32.to_bits());
    }

    #[test]
    fn test_packed_xyz_and_adc() {
        let mut gs = GsState::new().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&tag(2, true, GifFormat::Packed, &[desc::XYZ2]));
        data.extend_from_slice(&qword(0x10 | (0x20 << 32), 0x30));
        data.extend_from_slice(&qword(0x11 | (0x21 << 32), 0x31 | (1 << 47)));
        gs.transfer(GifPath::Path3, &data);

        assert_eq!(gs.reg(general::XYZ2), 0x10 | (0x20 << 16) | (0x30 << 32));
        assert_eq!(gs.reg(general::XYZ3), 0x11 | (0x21 << 16) | (0x31 << 32));
    }

    #[test]
    fn test_triangle_strip_kicks() {
        let mut gs = GsState::new().unwrap();
        let mut data = Vec::new();
        let mut t = GifTag::decode(&tag(5, true, GifFormat::Packed, &[desc::XYZ2]));
        t.pre = true;
        t.prim = 4;
        data.extend_from_slice(&t.encode());
        for i in 0..5 {
            data.extend_from_slice(&qword(i, 0));
        }
        gs.transfer(GifPath::Path3, &data);

        let stats = gs.stats();
        assert_eq!(stats.vertices, 5);
        assert_eq!(stats.primitives, 3);
    }

    #[test]
    fn test_xyz3_does_not_draw() {
        let mut gs = GsState::new().unwrap();
        gs.write_reg(general::PRIM, 6);
        gs.write_reg(general::XYZ3, 0);
        gs.write_reg(general::XYZ3, 0);
        gs.write_reg(general::XYZ2, 0);
        gs.write_reg(general::XYZ2, 0);
        assert_eq!(gs.stats().primitives, 1);
        assert_eq!(gs.stats().vertices, 4);
    }

    #[test]
    fn test_reglist_skips_ad_and_discards_tail() {
        let mut gs = GsState::new().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&tag(1, true, GifFormat::Reglist, &[desc::RGBAQ, desc::A_D, desc::UV]));
        data.extend_from_slice(&qword(0xAA, 0xBB));
        data.extend_from_slice(&qword(0xCC, 0xDD));
        assert_eq!(gs.transfer(GifPath::Path2, &data), 48);

        assert_eq!(gs.reg(general::RGBAQ), 0xAA);
        assert_eq!(gs.reg(general::UV), 0xCC);
        assert!(!gs.path(GifPath::Path2).in_packet());
    }

    #[test]
    fn test_image_upload_and_readback() {
        let mut gs = GsState::new().unwrap();
        // 4x2 CT32 at (0, 0), buffer width 64, base 0x1000 bytes
        let bitbltbuf = (0x10u64 << 32) | (1u64 << 48) | (0x10u64) | (1u64 << 16);
        let mut data = Vec::new();
        data.extend_from_slice(&tag(4, false, GifFormat::Packed, &[desc::A_D]));
        data.extend_from_slice(&ad(general::BITBLTBUF, bitbltbuf));
        data.extend_from_slice(&ad(general::TRXPOS, 0));
        data.extend_from_slice(&ad(general::TRXREG, 4 | (2u64 << 32)));
        data.extend_from_slice(&ad(general::TRXDIR, 0));
        data.extend_from_slice(&tag(2, true, GifFormat::Image, &[]));
        let pixels: Vec<u8> = (0..32).collect();
        data.extend_from_slice(&pixels);
        gs.transfer(GifPath::Path3, &data);

        assert_eq!(gs.stats().image_bytes, 32);
        assert_eq!(gs.memory().read_u32(0x1000), 0x03020100);
        assert_eq!(gs.memory().read_u32(0x1000 + 64 * 4), 0x13121110);

        gs.write_reg(general::TRXDIR, 1);
        let mut out = [0u8; 48];
        gs.read_fifo(&mut out);
        assert_eq!(&out[..32], &pixels[..]);
        assert!(out[32..].iter().all(|&b| b == 0));

        let mut again = [0u8; 16];
        gs.init_read_fifo(&mut again);
        assert_eq!(&again[..], &pixels[..16]);
    }

    #[test]
    fn test_hwreg_upload() {
        let mut gs = GsState::new().unwrap();
        gs.write_reg(general::BITBLTBUF, 1u64 << 48);
        gs.write_reg(general::TRXREG, 2 | (1u64 << 32));
        gs.write_reg(general::TRXDIR, 0);
        gs.write_reg(general::HWREG, 0x0807060504030201);
        assert_eq!(gs.memory().read_u32(4), 0x08070605);
    }

    #[test]
    fn test_signal_finish_label() {
        let mut regs = RegsMemory::new();
        let mut gs = GsState::new().unwrap();
        unsafe { gs.set_regs_mem(regs.as_mut_ptr()) };

        regs.write(privileged::SIGLBLID, 0xFFFF_0000_0000_FF00);
        gs.write_reg(general::SIGNAL, 0x0000_00FF_0000_0012);
        gs.write_reg(general::FINISH, 0);
        gs.write_reg(general::LABEL, 0x0000_FFFF_0000_ABCD);

        let sig = regs.read(privileged::SIGLBLID);
        assert_eq!(sig as u32, 0x0000_FF12);
        assert_eq!((sig >> 32) as u32, 0xFFFF_ABCD);
        let csr_value = regs.read(privileged::CSR);
        assert_ne!(csr_value & csr::SIGNAL, 0);
        assert_ne!(csr_value & csr::FINISH, 0);
        assert_eq!(gs.stats().signals, 1);
        assert_eq!(gs.stats().finishes, 1);
    }

    #[test]
    fn test_truncated_packet_resumes() {
        let mut gs = GsState::new().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&tag(2, true, GifFormat::Packed, &[desc::A_D]));
        data.extend_from_slice(&ad(general::FRAME_1, 1));
        // partial qword is dropped
        data.extend_from_slice(&[0u8; 8]);
        assert_eq!(gs.transfer(GifPath::Path2, &data), 32);
        assert!(gs.path(GifPath::Path2).in_packet());
        assert_eq!(gs.transfer(GifPath::Path2, &ad(general::FRAME_2, 2)), 16);
        assert_eq!(gs.reg(general::FRAME_2), 2);
        assert!(!gs.path(GifPath::Path2).in_packet());
    }

    #[test]
    fn test_path1_stops_at_eop_and_wraps() {
        let mut gs = GsState::new().unwrap();
        let mut vu1 = vec![0u8; VU1_WINDOW];
        // packet starts 16 bytes before the end and continues at 0
        let start = VU1_WINDOW - 16;
        vu1[start..].copy_from_slice(&tag(1, true, GifFormat::Packed, &[desc::A_D]));
        vu1[..16].copy_from_slice(&ad(general::FRAME_1, 0x77));
        // data after EOP must not be parsed
        vu1[16..32].copy_from_slice(&tag(1, true, GifFormat::Packed, &[desc::A_D]));
        vu1[32..48].copy_from_slice(&ad(general::FRAME_2, 0x99));

        gs.transfer_vu1(&vu1, start as u32);
        assert_eq!(gs.reg(general::FRAME_1), 0x77);
        assert_eq!(gs.reg(general::FRAME_2), 0);
    }

    #[test]
    fn test_soft_reset_mask() {
        let mut gs = GsState::new().unwrap();
        let open = tag(3, false, GifFormat::Packed, &[desc::A_D]);
        gs.transfer(GifPath::Path1, &open);
        gs.transfer(GifPath::Path2, &open);
        gs.transfer(GifPath::Path3, &open);

        gs.soft_reset(0b101);
        assert!(!gs.path(GifPath::Path1).in_packet());
        assert!(gs.path(GifPath::Path2).in_packet());
        assert!(!gs.path(GifPath::Path3).in_packet());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut gs = GsState::new().unwrap();
        gs.write_reg(general::FRAME_1, 5);
        gs.memory_mut().write_u32(0, 9);
        gs.reset();
        assert_eq!(gs.reg(general::FRAME_1), 0);
        assert_eq!(gs.memory().read_u32(0), 0);
        assert_eq!(gs.q(), 1.0);
    }

    #[test]
    fn test_vsync_field_bits() {
        let mut regs = RegsMemory::new();
        let mut gs = GsState::new().unwrap();
        unsafe { gs.set_regs_mem(regs.as_mut_ptr()) };
        gs.vsync(1);
        assert_ne!(regs.read(privileged::CSR) & csr::FIELD, 0);
        gs.vsync(0);
        assert_eq!(regs.read(privileged::CSR) & csr::FIELD, 0);
        assert_ne!(regs.read(privileged::CSR) & csr::VSINT, 0);
    }
}
