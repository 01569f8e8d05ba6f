//! Renderer variants
//!
//! A renderer owns the emulated GS state and at most one device. The four
//! variants differ in the device kind they accept, how they size the render
//! target and what they hand the device on vsync; everything else lives in
//! [`RendererCore`] and the provided methods of [`Renderer`].

pub mod hardware;
pub mod null;
pub mod software;

pub use hardware::HardwareRenderer;
pub use null::NullRenderer;
pub use software::SoftwareRenderer;

use crate::backend::{Device, DeviceKind, Frame};
use crate::crc::{self, CrcHackLevel, GameHacks};
use crate::freeze::{self, FreezeData, RendererSnapshot};
use crate::gif::GifPath;
use crate::state::{GsState, VU1_WINDOW};
use gs_core::error::{DeviceError, FreezeError, MemoryError};
use gs_core::GsConfig;

/// Display size assumed until the first vsync with an enabled circuit
pub const DEFAULT_DISPLAY: (u32, u32) = (640, 448);

/// Largest accepted `upscale_multiplier`
pub const MAX_UPSCALE: u32 = 8;

/// Renderer variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RendererType {
    #[default]
    Undefined,
    HardwareDx11,
    Null,
    HardwareGl,
    SoftwareGl,
}

impl RendererType {
    /// Decode the `Renderer` option
    pub fn from_config(value: i32) -> Self {
        match value {
            3 => Self::HardwareDx11,
            11 => Self::Null,
            12 => Self::HardwareGl,
            13 => Self::SoftwareGl,
            _ => Self::Undefined,
        }
    }

    pub fn to_config(self) -> i32 {
        match self {
            Self::Undefined => -1,
            Self::HardwareDx11 => 3,
            Self::Null => 11,
            Self::HardwareGl => 12,
            Self::SoftwareGl => 13,
        }
    }

    /// Device kind this variant presents through
    pub fn device_kind(self) -> Option<DeviceKind> {
        match self {
            Self::Undefined => None,
            Self::HardwareDx11 => Some(DeviceKind::Direct3D11),
            Self::Null => Some(DeviceKind::Null),
            Self::HardwareGl => Some(DeviceKind::OpenGl),
            Self::SoftwareGl => Some(DeviceKind::Software),
        }
    }

    pub fn is_hardware(self) -> bool {
        matches!(self, Self::HardwareDx11 | Self::HardwareGl)
    }
}

impl std::fmt::Display for RendererType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Undefined => "Undefined",
            Self::HardwareDx11 => "Direct3D 11",
            Self::Null => "Null",
            Self::HardwareGl => "OpenGL",
            Self::SoftwareGl => "Software",
        };
        f.write_str(name)
    }
}

/// State shared by every renderer variant
pub struct RendererCore {
    kind: RendererType,
    pub state: GsState,
    device: Option<Box<dyn Device>>,
    crc: u32,
    options: i32,
    hacks: GameHacks,
    hack_level: CrcHackLevel,
    exclusions: Vec<u32>,
    user_hacks: GameHacks,
    upscale: u32,
    display: (u32, u32),
    frame_count: u64,
}

impl RendererCore {
    pub fn new(kind: RendererType, config: &GsConfig) -> Result<Self, MemoryError> {
        let mut core = Self {
            kind,
            state: GsState::new()?,
            device: None,
            crc: 0,
            options: 0,
            hacks: GameHacks::empty(),
            hack_level: CrcHackLevel::Automatic,
            exclusions: Vec::new(),
            user_hacks: GameHacks::empty(),
            upscale: 1,
            display: DEFAULT_DISPLAY,
            frame_count: 0,
        };
        core.update_options(config);
        Ok(core)
    }

    pub fn kind(&self) -> RendererType {
        self.kind
    }

    pub fn device(&self) -> Option<&dyn Device> {
        self.device.as_deref()
    }

    pub fn upscale(&self) -> u32 {
        self.upscale
    }

    /// Native display size latched on the last vsync
    pub fn display(&self) -> (u32, u32) {
        self.display
    }

    pub fn update_options(&mut self, config: &GsConfig) {
        self.upscale = config.get_i("upscale_multiplier").clamp(1, MAX_UPSCALE as i32) as u32;
        self.hack_level = CrcHackLevel::from_i32(config.get_i("crc_hack_level"));
        self.exclusions = crc::parse_exclusions(config.get_s("CrcHacksExclusions"));
        self.user_hacks = crc::user_hacks(config);
        self.refresh_hacks();
    }

    fn refresh_hacks(&mut self) {
        let level = self.hack_level.resolve(self.kind == RendererType::HardwareDx11);
        self.hacks = crc::resolve_hacks(self.crc, self.options, level, &self.exclusions);
    }

    /// Latch vsync state and the display size. Returns the enabled circuit's
    /// frame buffer, if any.
    fn vsync_state(&mut self, field: i32) -> Option<crate::regs::DisplayCircuit> {
        self.state.vsync(field);
        self.frame_count += 1;

        let circuit = self.state.display_circuit();
        if let Some(c) = circuit {
            self.display = (c.area.width(), c.area.height());
        }
        circuit
    }

    /// Hand a frame to the device. Errors are logged; vsync never fails.
    fn present(&mut self, frame: &Frame) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        if let Err(e) = device.present(frame) {
            tracing::warn!("{} renderer: present failed: {}", self.kind, e);
        }
    }

    fn snapshot(&self) -> RendererSnapshot {
        RendererSnapshot {
            crc: self.crc,
            options: self.options,
            hacks: self.hacks.bits(),
            display: self.display,
            frame_count: self.frame_count,
        }
    }

    fn restore(&mut self, snapshot: RendererSnapshot) {
        self.crc = snapshot.crc;
        self.options = snapshot.options;
        self.hacks = GameHacks::from_bits_truncate(snapshot.hacks);
        self.display = snapshot.display;
        self.frame_count = snapshot.frame_count;
    }
}

impl std::fmt::Debug for RendererCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererCore")
            .field("kind", &self.kind)
            .field("has_device", &self.device.is_some())
            .field("crc", &format_args!("{:#010x}", self.crc))
            .field("hacks", &self.hacks)
            .field("display", &self.display)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

/// A GS renderer
pub trait Renderer: Send {
    fn core(&self) -> &RendererCore;

    fn core_mut(&mut self) -> &mut RendererCore;

    /// Render target size the device should be set up with
    fn internal_resolution(&self) -> (u32, u32);

    /// Start of a vblank: latch state and present a frame
    fn vsync(&mut self, field: i32);

    fn kind(&self) -> RendererType {
        self.core().kind
    }

    /// Bind the host's privileged register block.
    ///
    /// # Safety
    /// `basemem` must point to [`crate::regs::REGS_MEM_SIZE`] bytes that stay
    /// valid, and are not accessed concurrently, until the renderer is
    /// dropped or bound to another block.
    unsafe fn set_regs_mem(&mut self, basemem: *mut u8) {
        self.core_mut().state.set_regs_mem(basemem);
    }

    /// Take ownership of `device` and set it up for the internal resolution.
    /// On failure the device is dropped and the renderer stays without one.
    fn create_device(&mut self, mut device: Box<dyn Device>) -> Result<(), DeviceError> {
        let kind = self.kind();
        if kind.device_kind() != Some(device.kind()) {
            return Err(DeviceError::Unsupported(format!(
                "{} renderer cannot present through a {:?} device",
                kind,
                device.kind()
            )));
        }

        let (w, h) = self.internal_resolution();
        if w > 0 && h > 0 {
            device.resize_target(w, h)?;
        }

        tracing::debug!("{} renderer: device attached ({}x{})", kind, w, h);
        self.core_mut().device = Some(device);
        Ok(())
    }

    /// Reset the owned device, if any
    fn reset_device(&mut self) -> Result<(), DeviceError> {
        match self.core_mut().device.as_mut() {
            Some(device) => device.reset(),
            None => Ok(()),
        }
    }

    fn take_device(&mut self) -> Option<Box<dyn Device>> {
        self.core_mut().device.take()
    }

    fn has_device(&self) -> bool {
        self.core().device.is_some()
    }

    /// Feed GIF data on `path`
    fn transfer(&mut self, path: GifPath, data: &[u8]) {
        self.core_mut().state.transfer(path, data);
    }

    /// PATH1 transfer out of VU1 data memory starting at `addr`
    fn transfer_vu1(&mut self, vu1_mem: &[u8], addr: u32) {
        let addr = addr as usize % VU1_WINDOW;
        self.core_mut().state.transfer_vu1(vu1_mem, addr as u32);
    }

    fn read_fifo(&mut self, out: &mut [u8]) {
        if !out.is_empty() {
            self.core_mut().state.read_fifo(out);
        }
    }

    fn init_read_fifo(&mut self, out: &mut [u8]) {
        if !out.is_empty() {
            self.core_mut().state.init_read_fifo(out);
        }
    }

    /// Clear registers, GIF paths, transfers and local memory
    fn reset(&mut self) {
        self.core_mut().state.reset();
    }

    fn soft_reset(&mut self, mask: u32) {
        self.core_mut().state.soft_reset(mask);
    }

    /// Save a snapshot into `fd`, or only report its size
    fn freeze(&self, fd: &mut FreezeData, size_only: bool) -> Result<(), FreezeError> {
        if size_only {
            freeze::size(fd);
            return Ok(());
        }
        let core = self.core();
        freeze::save(&core.state, &core.snapshot(), fd)
    }

    /// Restore a snapshot. On error the renderer is left untouched.
    fn defrost(&mut self, fd: &FreezeData) -> Result<(), FreezeError> {
        let core = self.core_mut();
        let snapshot = freeze::load(&mut core.state, fd)?;
        core.restore(snapshot);
        Ok(())
    }

    fn set_game_crc(&mut self, crc: u32, options: i32) {
        let core = self.core_mut();
        core.crc = crc;
        core.options = options;
        core.refresh_hacks();
        tracing::info!("{} renderer: game CRC {:#010x}, hacks {:?}", core.kind, crc, core.hacks);
    }

    fn update_options(&mut self, config: &GsConfig) {
        self.core_mut().update_options(config);
    }

    fn crc(&self) -> u32 {
        self.core().crc
    }

    /// CRC hacks for the current game plus the user's forced hacks
    fn active_hacks(&self) -> GameHacks {
        let core = self.core();
        core.hacks | core.user_hacks
    }

    fn frame_count(&self) -> u64 {
        self.core().frame_count
    }

    fn state(&self) -> &GsState {
        &self.core().state
    }

    fn state_mut(&mut self) -> &mut GsState {
        &mut self.core_mut().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_type_encoding() {
        for kind in [
            RendererType::Undefined,
            RendererType::HardwareDx11,
            RendererType::Null,
            RendererType::HardwareGl,
            RendererType::SoftwareGl,
        ] {
            assert_eq!(RendererType::from_config(kind.to_config()), kind);
        }
        assert_eq!(RendererType::from_config(7), RendererType::Undefined);
        assert_eq!(RendererType::SoftwareGl.device_kind(), Some(DeviceKind::Software));
        assert!(RendererType::Undefined.device_kind().is_none());
    }

    #[test]
    fn test_upscale_is_clamped() {
        let mut config = GsConfig::default();
        config.set_i("upscale_multiplier", 0);
        let core = RendererCore::new(RendererType::HardwareGl, &config).unwrap();
        assert_eq!(core.upscale(), 1);

        config.set_i("upscale_multiplier", 64);
        let core = RendererCore::new(RendererType::HardwareGl, &config).unwrap();
        assert_eq!(core.upscale(), MAX_UPSCALE);
    }
}
