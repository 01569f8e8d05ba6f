//! Per-game compatibility hacks keyed by executable CRC

use bitflags::bitflags;
use gs_core::GsConfig;

/// `SetGameCRC` option bit asking for all CRC hacks to be disabled
pub const OPTION_DISABLE_HACKS: i32 = 1;

/// How aggressively CRC hacks are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CrcHackLevel {
    /// Pick per renderer
    Automatic,
    None,
    Minimum,
    Partial,
    Full,
    Aggressive,
}

impl CrcHackLevel {
    /// Decode the `crc_hack_level` option; out-of-range values mean Automatic
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Minimum,
            2 => Self::Partial,
            3 => Self::Full,
            4 => Self::Aggressive,
            _ => Self::Automatic,
        }
    }

    pub fn to_i32(self) -> i32 {
        match self {
            Self::Automatic => -1,
            Self::None => 0,
            Self::Minimum => 1,
            Self::Partial => 2,
            Self::Full => 3,
            Self::Aggressive => 4,
        }
    }

    /// Concrete level for a renderer. Direct3D 11 runs with the full set,
    /// everything else with the partial set.
    pub fn resolve(self, direct3d: bool) -> Self {
        match self {
            Self::Automatic if direct3d => Self::Full,
            Self::Automatic => Self::Partial,
            level => level,
        }
    }
}

bitflags! {
    /// Compatibility hacks a game can request
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GameHacks: u32 {
        /// Skip draws that only produce post-processing effects
        const SKIP_DRAW          = 1 << 0;
        /// Flush the vertex queue on every render target change
        const AUTO_FLUSH         = 1 << 1;
        const HALF_PIXEL_OFFSET  = 1 << 2;
        /// Sample from the render target being drawn to
        const TEXTURE_INSIDE_RT  = 1 << 3;
        const WILD_ARMS_OFFSET   = 1 << 4;
        const ALIGN_SPRITE       = 1 << 5;
        const DISABLE_DEPTH      = 1 << 6;
        /// Convert frame buffers between formats on reuse
        const FB_CONVERSION      = 1 << 7;
    }
}

struct CrcEntry {
    crc: u32,
    hacks: &'static [(GameHacks, CrcHackLevel)],
}

static CRC_TABLE: &[CrcEntry] = &[
    CrcEntry {
        crc: 0x2113_EA2E,
        hacks: &[(GameHacks::SKIP_DRAW, CrcHackLevel::Partial), (GameHacks::AUTO_FLUSH, CrcHackLevel::Full)],
    },
    CrcEntry {
        crc: 0x45D1_9A8D,
        hacks: &[(GameHacks::HALF_PIXEL_OFFSET, CrcHackLevel::Minimum)],
    },
    CrcEntry {
        crc: 0x6BA2_F6B9,
        hacks: &[
            (GameHacks::TEXTURE_INSIDE_RT, CrcHackLevel::Partial),
            (GameHacks::FB_CONVERSION, CrcHackLevel::Aggressive),
        ],
    },
    CrcEntry {
        crc: 0x8B02_9334,
        hacks: &[(GameHacks::WILD_ARMS_OFFSET, CrcHackLevel::Minimum), (GameHacks::ALIGN_SPRITE, CrcHackLevel::Partial)],
    },
    CrcEntry {
        crc: 0xA39F_3F0E,
        hacks: &[(GameHacks::DISABLE_DEPTH, CrcHackLevel::Full)],
    },
    CrcEntry {
        crc: 0xD3F1_82A3,
        hacks: &[
            (GameHacks::SKIP_DRAW, CrcHackLevel::Aggressive),
            (GameHacks::AUTO_FLUSH, CrcHackLevel::Partial),
            (GameHacks::HALF_PIXEL_OFFSET, CrcHackLevel::Full),
        ],
    },
];

/// Every hack the table lists for `crc`, with its minimum level
pub fn lookup(crc: u32) -> Option<&'static [(GameHacks, CrcHackLevel)]> {
    CRC_TABLE.iter().find(|e| e.crc == crc).map(|e| e.hacks)
}

/// Parse `CrcHacksExclusions`: comma separated hex CRCs, with or without 0x
pub fn parse_exclusions(list: &str) -> Vec<u32> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let digits = s.trim_start_matches("0x").trim_start_matches("0X");
            match u32::from_str_radix(digits, 16) {
                Ok(crc) => Some(crc),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CRC exclusion {:?}", s);
                    None
                }
            }
        })
        .collect()
}

/// Hacks active for `crc` at a resolved `level`
pub fn resolve_hacks(crc: u32, options: i32, level: CrcHackLevel, exclusions: &[u32]) -> GameHacks {
    if level <= CrcHackLevel::None || options & OPTION_DISABLE_HACKS != 0 || exclusions.contains(&crc) {
        return GameHacks::empty();
    }

    lookup(crc)
        .unwrap_or(&[])
        .iter()
        .filter(|(_, min)| *min <= level)
        .fold(GameHacks::empty(), |acc, (hack, _)| acc | *hack)
}

/// Hacks forced by the user through the `UserHacks_*` options. Empty
/// unless `UserHacks` is set.
pub fn user_hacks(config: &GsConfig) -> GameHacks {
    if !config.get_b("UserHacks") {
        return GameHacks::empty();
    }

    let mut hacks = GameHacks::empty();
    hacks.set(GameHacks::AUTO_FLUSH, config.get_b("UserHacks_AutoFlush"));
    hacks.set(GameHacks::HALF_PIXEL_OFFSET, config.get_b("UserHacks_HalfPixelOffset"));
    hacks.set(GameHacks::SKIP_DRAW, config.get_i("UserHacks_SkipDraw") > 0);
    hacks.set(GameHacks::TEXTURE_INSIDE_RT, config.get_b("UserHacks_TextureInsideRt"));
    hacks.set(GameHacks::WILD_ARMS_OFFSET, config.get_b("UserHacks_WildHack"));
    hacks
}
