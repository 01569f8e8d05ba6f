//! GIF packet structures
//!
//! Every GIF packet starts with a 128-bit tag describing how many loops of
//! data follow, in which format, and which registers they target.

/// GIF transfer path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GifPath {
    /// VU1 XGKICK
    Path1,
    /// VIF1 DIRECT/DIRECTHL
    Path2,
    /// GIF DMA channel
    Path3,
    /// Pre-multiplexed stream from hosts that do not separate paths
    Unified,
}

impl GifPath {
    pub const ALL: [GifPath; 4] = [Self::Path1, Self::Path2, Self::Path3, Self::Unified];

    pub fn index(self) -> usize {
        match self {
            Self::Path1 => 0,
            Self::Path2 => 1,
            Self::Path3 => 2,
            Self::Unified => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Data format following a GIFtag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GifFormat {
    #[default]
    Packed,
    Reglist,
    Image,
}

impl GifFormat {
    fn from_flg(flg: u8) -> Self {
        match flg & 3 {
            0 => Self::Packed,
            1 => Self::Reglist,
            // 3 behaves as IMAGE on hardware
            _ => Self::Image,
        }
    }

    fn flg(self) -> u8 {
        match self {
            Self::Packed => 0,
            Self::Reglist => 1,
            Self::Image => 2,
        }
    }
}

/// Little-endian u64 at `offset`; missing bytes read as zero
#[inline]
pub(crate) fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    if let Some(src) = data.get(offset..) {
        let n = src.len().min(8);
        word[..n].copy_from_slice(&src[..n]);
    }
    u64::from_le_bytes(word)
}

/// Register descriptors used in the REGS field
pub mod desc {
    pub const PRIM: u8 = 0x0;
    pub const RGBAQ: u8 = 0x1;
    pub const ST: u8 = 0x2;
    pub const UV: u8 = 0x3;
    pub const XYZF2: u8 = 0x4;
    pub const XYZ2: u8 = 0x5;
    pub const TEX0_1: u8 = 0x6;
    pub const TEX0_2: u8 = 0x7;
    pub const CLAMP_1: u8 = 0x8;
    pub const CLAMP_2: u8 = 0x9;
    pub const FOG: u8 = 0xA;
    pub const RESERVED: u8 = 0xB;
    pub const XYZF3: u8 = 0xC;
    pub const XYZ3: u8 = 0xD;
    pub const A_D: u8 = 0xE;
    pub const NOP: u8 = 0xF;
}

/// Decoded GIFtag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifTag {
    pub nloop: u16,
    pub eop: bool,
    pub pre: bool,
    pub prim: u16,
    pub format: GifFormat,
    /// Number of register descriptors, 1..=16
    pub nreg: u8,
    pub regs: u64,
}

impl Default for GifTag {
    fn default() -> Self {
        Self {
            nloop: 0,
            eop: false,
            pre: false,
            prim: 0,
            format: GifFormat::Packed,
            nreg: 16,
            regs: 0,
        }
    }
}

impl GifTag {
    /// Size of a tag in bytes
    pub const SIZE: usize = 16;

    pub fn decode(qword: &[u8; 16]) -> Self {
        let lo = read_u64_le(qword, 0);
        let hi = read_u64_le(qword, 8);

        let nreg = ((lo >> 60) & 0xF) as u8;
        Self {
            nloop: (lo & 0x7FFF) as u16,
            eop: (lo >> 15) & 1 != 0,
            pre: (lo >> 46) & 1 != 0,
            prim: ((lo >> 47) & 0x7FF) as u16,
            format: GifFormat::from_flg(((lo >> 58) & 3) as u8),
            nreg: if nreg == 0 { 16 } else { nreg },
            regs: hi,
        }
    }

    pub fn encode(&self) -> [u8; 16] {
        let lo = (self.nloop as u64 & 0x7FFF)
            | ((self.eop as u64) << 15)
            | ((self.pre as u64) << 46)
            | ((self.prim as u64 & 0x7FF) << 47)
            | ((self.format.flg() as u64) << 58)
            | (((self.nreg & 0xF) as u64) << 60);

        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&lo.to_le_bytes());
        out[8..16].copy_from_slice(&self.regs.to_le_bytes());
        out
    }

    /// Register descriptor `i` (0-based)
    #[inline]
    pub fn reg(&self, i: u8) -> u8 {
        ((self.regs >> (u32::from(i & 0xF) * 4)) & 0xF) as u8
    }
}

/// Per-path parser state carried between transfer calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathState {
    pub tag: GifTag,
    /// Loops remaining for the current tag
    pub nloop: u16,
    /// Next register descriptor within the loop
    pub reg: u8,
}

impl PathState {
    /// Whether the current tag still expects data
    pub fn in_packet(&self) -> bool {
        self.nloop > 0
    }

    pub fn start(&mut self, tag: GifTag) {
        self.tag = tag;
        self.nloop = tag.nloop;
        self.reg = 0;
    }

    /// Advance to the next register descriptor, finishing a loop after the
    /// last one
    pub fn next_reg(&mut self) {
        self.reg += 1;
        if self.reg >= self.tag.nreg {
            self.reg = 0;
            self.nloop = self.nloop.saturating_sub(1);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fields() {
        let lo: u64 = 3 | (1 << 15) | (1 << 46) | (0x6u64 << 47) | (1u64 << 58) | (2u64 << 60);
        let hi: u64 = 0x51;
        let mut q = [0u8; 16];
        q[0..8].copy_from_slice(&lo.to_le_bytes());
        q[8..16].copy_from_slice(&hi.to_le_bytes());

        let tag = GifTag::decode(&q);
        assert_eq!(tag.nloop, 3);
        assert!(tag.eop);
        assert!(tag.pre);
        assert_eq!(tag.prim, 6);
        assert_eq!(tag.format, GifFormat::Reglist);
        assert_eq!(tag.nreg, 2);
        assert_eq!(tag.reg(0), desc::RGBAQ);
        assert_eq!(tag.reg(1), desc::XYZ2);
    }

    #[test]
    fn test_nreg_zero_means_sixteen() {
        let tag = GifTag::decode(&[0u8; 16]);
        assert_eq!(tag.nreg, 16);
        assert_eq!(tag.format, GifFormat::Packed);
        assert_eq!(tag, GifTag::default());
    }

    #[test]
    fn test_flg_three_is_image() {
        let lo: u64 = 1 | (3u64 << 58);
        let mut q = [0u8; 16];
        q[0..8].copy_from_slice(&lo.to_le_bytes());
        assert_eq!(GifTag::decode(&q).format, GifFormat::Image);
    }

    #[test]
    fn test_encode_matches_decode() {
        let tag = GifTag {
            nloop: 0x7FFF,
            eop: true,
            pre: false,
            prim: 0x3,
            format: GifFormat::Image,
            nreg: 1,
            regs: 0xE,
        };
        assert_eq!(GifTag::decode(&tag.encode()), tag);
    }

    #[test]
    fn test_path_state_loops() {
        let mut state = PathState::default();
        state.start(GifTag { nloop: 2, nreg: 2, ..Default::default() });
        assert!(state.in_packet());
        state.next_reg();
        assert_eq!((state.nloop, state.reg), (2, 1));
        state.next_reg();
        assert_eq!((state.nloop, state.reg), (1, 0));
        state.next_reg();
        state.next_reg();
        assert!(!state.in_packet());
    }

    #[test]
    fn test_path_index() {
        for (i, path) in GifPath::ALL.iter().enumerate() {
            assert_eq!(path.index(), i);
            assert_eq!(GifPath::from_index(i), Some(*path));
        }
        assert_eq!(GifPath::from_index(4), None);
    }
}
