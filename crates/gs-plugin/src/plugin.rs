//! Plugin lifecycle: init, open, close, shutdown and the forwarders

use crate::factory::{make_device, make_renderer};
use gs_core::config::RENDERER_OPTION;
use gs_core::error::{GsError, Result};
use gs_core::GsConfig;
use gs_renderer::backend::DEFAULT_TARGET;
use gs_renderer::state::VU1_WINDOW;
use gs_renderer::{FreezeData, GifPath, GsState, HostRenderContext, HwContextType, Renderer, RendererType};
use std::sync::Arc;

/// `open2` flag bit toggling between the software and hardware renderers
pub const TOGGLE_RENDERER_FLAG: u32 = 1 << 2;

/// Save-state operation requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeMode {
    Load,
    Save,
    Size,
}

impl FreezeMode {
    pub fn from_i32(mode: i32) -> Option<Self> {
        match mode {
            0 => Some(Self::Load),
            1 => Some(Self::Save),
            2 => Some(Self::Size),
            _ => None,
        }
    }
}

/// GS plugin instance
pub struct GsPlugin {
    config: GsConfig,
    host: Arc<dyn HostRenderContext>,
    current_renderer: RendererType,
    renderer: Option<Box<dyn Renderer>>,
    /// Register block bound on the last successful open
    basemem: usize,
    stored_toggle_state: bool,
    initialized: bool,
}

impl GsPlugin {
    pub fn new(config: GsConfig, host: Arc<dyn HostRenderContext>) -> Self {
        Self {
            config,
            host,
            current_renderer: RendererType::Undefined,
            renderer: None,
            basemem: 0,
            stored_toggle_state: false,
            initialized: false,
        }
    }

    /// One-time startup. Builds the vector tables before any renderer exists.
    pub fn init(&mut self) -> Result<()> {
        gs_vector::init_vectors();
        self.initialized = true;
        tracing::info!("GS plugin initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a renderer with a device is live
    pub fn is_open(&self) -> bool {
        self.renderer.as_ref().is_some_and(|r| r.has_device())
    }

    pub fn config(&self) -> &GsConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GsConfig {
        &mut self.config
    }

    pub fn host(&self) -> &Arc<dyn HostRenderContext> {
        &self.host
    }

    /// Replace the host context. Takes effect on the next open.
    pub fn set_host(&mut self, host: Arc<dyn HostRenderContext>) {
        self.host = host;
    }

    pub fn current_renderer_type(&self) -> RendererType {
        self.current_renderer
    }

    pub fn renderer(&self) -> Option<&dyn Renderer> {
        self.renderer.as_deref()
    }

    pub fn state(&self) -> Option<&GsState> {
        self.renderer.as_ref().map(|r| r.state())
    }

    /// Open the `requested` renderer variant on the register block `basemem`.
    ///
    /// A variant change drops the old renderer and its device first. If the
    /// new device cannot be created the plugin is left closed.
    ///
    /// # Safety
    /// `basemem` must be null or point to the host's 8 KiB privileged
    /// register block, valid until the next `open`, `open2` or `shutdown`.
    pub unsafe fn open(&mut self, requested: RendererType, threads: i32, basemem: *mut u8) -> Result<()> {
        if self.is_open() && requested == self.current_renderer && basemem as usize == self.basemem {
            return Ok(());
        }

        if requested != self.current_renderer {
            if self.renderer.take().is_some() {
                tracing::info!("Renderer change {} -> {}, dropping old renderer", self.current_renderer, requested);
            }
            self.current_renderer = requested;
        }

        let (w, h) = DEFAULT_TARGET;
        let mut device = make_device(requested, &self.host)?;
        if let Err(e) = device.create(w, h) {
            tracing::error!("{} device creation failed: {}", requested, e);
            self.close();
            return Err(e.into());
        }

        let renderer = match self.renderer.take() {
            Some(renderer) => renderer,
            None => make_renderer(requested, &self.config, threads)?,
        };
        let renderer = self.renderer.insert(renderer);

        renderer.set_regs_mem(basemem);
        if let Err(e) = renderer.create_device(device) {
            tracing::error!("{} renderer rejected its device: {}", requested, e);
            self.close();
            return Err(e.into());
        }
        self.basemem = basemem as usize;

        tracing::info!("Opened {} renderer", requested);
        Ok(())
    }

    /// Pick the variant from the host context, the `renderer_option` setting
    /// and the toggle bit of `flags`, then [`open`](Self::open) it.
    ///
    /// A change of the toggle bit since the previous call swaps between the
    /// software and hardware renderers, relative to the variant in use. The
    /// very first open ignores the toggle.
    ///
    /// # Safety
    /// See [`open`](Self::open).
    pub unsafe fn open2(&mut self, flags: u32, basemem: *mut u8) -> Result<()> {
        let toggle_state = flags & TOGGLE_RENDERER_FLAG != 0;

        let mut requested = match self.host.context_type() {
            HwContextType::Direct3D => RendererType::HardwareDx11,
            HwContextType::None => RendererType::Null,
            _ if self.config.get_s(RENDERER_OPTION) == "Software" => RendererType::SoftwareGl,
            _ => RendererType::HardwareGl,
        };

        if self.current_renderer != RendererType::Undefined && self.stored_toggle_state != toggle_state {
            requested = match self.current_renderer {
                RendererType::SoftwareGl => RendererType::HardwareGl,
                RendererType::HardwareGl => RendererType::SoftwareGl,
                RendererType::HardwareDx11 => RendererType::SoftwareGl,
                _ => RendererType::SoftwareGl,
            };
            tracing::info!("Renderer toggle: {} -> {}", self.current_renderer, requested);
        }
        self.stored_toggle_state = toggle_state;

        self.open(requested, -1, basemem)
    }

    /// Release the device, keeping the renderer and its state
    pub fn close(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if !renderer.has_device() {
            return;
        }

        if let Err(e) = renderer.reset_device() {
            tracing::warn!("Device reset on close failed: {}", e);
        }
        drop(renderer.take_device());
        tracing::info!("Closed {} renderer", self.current_renderer);
    }

    /// Drop the renderer and its device
    pub fn shutdown(&mut self) {
        self.renderer = None;
        self.current_renderer = RendererType::Undefined;
        self.basemem = 0;
        tracing::info!("GS plugin shut down");
    }

    fn renderer_for(&mut self, op: &str) -> Option<&mut Box<dyn Renderer>> {
        if self.renderer.is_none() {
            tracing::warn!("{} ignored: no renderer", op);
        }
        self.renderer.as_mut()
    }

    pub fn reset(&mut self) {
        if let Some(r) = self.renderer_for("reset") {
            r.reset();
        }
    }

    pub fn gif_soft_reset(&mut self, mask: u32) {
        if let Some(r) = self.renderer_for("gif_soft_reset") {
            r.soft_reset(mask);
        }
    }

    pub fn read_fifo2(&mut self, out: &mut [u8]) {
        if out.is_empty() {
            return;
        }
        if let Some(r) = self.renderer_for("read_fifo2") {
            r.read_fifo(out);
        }
    }

    pub fn init_read_fifo2(&mut self, out: &mut [u8]) {
        if out.is_empty() {
            return;
        }
        if let Some(r) = self.renderer_for("init_read_fifo2") {
            r.init_read_fifo(out);
        }
    }

    pub fn gif_transfer(&mut self, data: &[u8]) {
        if let Some(r) = self.renderer_for("gif_transfer") {
            r.transfer(GifPath::Unified, data);
        }
    }

    /// PATH1 transfer out of the 16 KiB VU1 data memory `vu1_mem`
    pub fn gif_transfer1(&mut self, vu1_mem: &[u8], addr: u32) {
        if let Some(r) = self.renderer_for("gif_transfer1") {
            r.transfer_vu1(vu1_mem, addr % VU1_WINDOW as u32);
        }
    }

    pub fn gif_transfer2(&mut self, data: &[u8]) {
        if let Some(r) = self.renderer_for("gif_transfer2") {
            r.transfer(GifPath::Path2, data);
        }
    }

    pub fn gif_transfer3(&mut self, data: &[u8]) {
        if let Some(r) = self.renderer_for("gif_transfer3") {
            r.transfer(GifPath::Path3, data);
        }
    }

    pub fn vsync(&mut self, field: i32) {
        if let Some(r) = self.renderer_for("vsync") {
            r.vsync(field);
        }
    }

    pub fn freeze(&mut self, mode: FreezeMode, fd: &mut FreezeData) -> Result<()> {
        let renderer = self.renderer.as_mut().ok_or(GsError::NotOpen)?;
        match mode {
            FreezeMode::Save => renderer.freeze(fd, false)?,
            FreezeMode::Size => renderer.freeze(fd, true)?,
            FreezeMode::Load => renderer.defrost(fd)?,
        }
        Ok(())
    }

    pub fn set_game_crc(&mut self, crc: u32, options: i32) {
        if let Some(r) = self.renderer_for("set_game_crc") {
            r.set_game_crc(crc, options);
        }
    }

    /// Re-read renderer options from the current configuration
    pub fn update_options(&mut self) {
        if let Some(r) = self.renderer.as_mut() {
            r.update_options(&self.config);
        }
    }

    /// Size of the host's output rectangle. `None` without a renderer.
    pub fn client_rect(&self) -> Option<(u32, u32)> {
        let renderer = self.renderer.as_ref()?;
        if self.current_renderer == RendererType::HardwareDx11 {
            let (w, h) = DEFAULT_TARGET;
            let scale = renderer.core().upscale();
            return Some((w * scale, h * scale));
        }
        Some(renderer.internal_resolution())
    }
}

impl std::fmt::Debug for GsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GsPlugin")
            .field("current_renderer", &self.current_renderer)
            .field("open", &self.is_open())
            .field("stored_toggle_state", &self.stored_toggle_state)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_core::error::{DeviceError, FreezeError};
    use gs_renderer::offscreen::OffscreenHost;
    use gs_renderer::regs::RegsMemory;
    use gs_renderer::NullHost;

    fn gl_plugin() -> GsPlugin {
        GsPlugin::new(GsConfig::default(), Arc::new(OffscreenHost::gl()))
    }

    #[test]
    fn test_open_same_variant_is_noop() {
        let mut regs = RegsMemory::new();
        let mut plugin = gl_plugin();
        unsafe { plugin.open(RendererType::HardwareGl, -1, regs.as_mut_ptr()).unwrap() };
        let renderer = plugin.renderer().map(|r| r as *const dyn Renderer as *const u8);
        let creates = plugin.renderer().and_then(|r| r.core().device()).map(|d| d.stats().creates);

        unsafe { plugin.open(RendererType::HardwareGl, -1, regs.as_mut_ptr()).unwrap() };
        assert_eq!(plugin.renderer().map(|r| r as *const dyn Renderer as *const u8), renderer);
        assert_eq!(plugin.renderer().and_then(|r| r.core().device()).map(|d| d.stats().creates), creates);
    }

    #[test]
    fn test_variant_change_starts_fresh() {
        let mut regs = RegsMemory::new();
        let mut plugin = gl_plugin();
        unsafe { plugin.open(RendererType::HardwareGl, -1, regs.as_mut_ptr()).unwrap() };
        plugin.set_game_crc(0x2113_EA2E, 0);
        plugin.vsync(0);

        unsafe { plugin.open(RendererType::SoftwareGl, 0, regs.as_mut_ptr()).unwrap() };
        let renderer = plugin.renderer().unwrap();
        assert_eq!(renderer.kind(), RendererType::SoftwareGl);
        assert_eq!(renderer.crc(), 0);
        assert_eq!(renderer.frame_count(), 0);
        assert_eq!(plugin.current_renderer_type(), RendererType::SoftwareGl);
    }

    #[test]
    fn test_failed_device_leaves_plugin_closed() {
        let host = Arc::new(OffscreenHost::gl_without(&["glGenTextures"]));
        let mut plugin = GsPlugin::new(GsConfig::default(), host);
        let err = unsafe { plugin.open(RendererType::HardwareGl, -1, std::ptr::null_mut()) }.unwrap_err();
        assert!(matches!(err, GsError::Device(DeviceError::MissingEntryPoint("glGenTextures"))));
        assert!(!plugin.is_open());
        assert!(plugin.renderer().is_none());
    }

    #[test]
    fn test_open2_policy() {
        let mut plugin = GsPlugin::new(GsConfig::default(), Arc::new(NullHost::new()));
        unsafe { plugin.open2(0, std::ptr::null_mut()).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::Null);

        let mut plugin = GsPlugin::new(GsConfig::default(), Arc::new(OffscreenHost::direct3d()));
        unsafe { plugin.open2(0, std::ptr::null_mut()).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::HardwareDx11);
        assert_eq!(plugin.client_rect(), Some((640, 480)));

        let mut config = GsConfig::default();
        config.set(RENDERER_OPTION, "Software");
        let mut plugin = GsPlugin::new(config, Arc::new(OffscreenHost::gl()));
        unsafe { plugin.open2(0, std::ptr::null_mut()).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::SoftwareGl);
    }

    #[test]
    fn test_open2_toggle_edges() {
        let mut plugin = gl_plugin();
        let mut regs = RegsMemory::new();
        let base = regs.as_mut_ptr();

        // the first call ignores the toggle
        unsafe { plugin.open2(TOGGLE_RENDERER_FLAG, base).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::HardwareGl);

        unsafe { plugin.open2(0, base).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::SoftwareGl);

        unsafe { plugin.open2(TOGGLE_RENDERER_FLAG, base).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::HardwareGl);

        unsafe { plugin.open2(TOGGLE_RENDERER_FLAG, base).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::HardwareGl);
    }

    #[test]
    fn test_open2_held_toggle_returns_to_policy() {
        let mut plugin = gl_plugin();
        let mut regs = RegsMemory::new();
        let base = regs.as_mut_ptr();

        unsafe { plugin.open2(0, base).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::HardwareGl);

        unsafe { plugin.open2(TOGGLE_RENDERER_FLAG, base).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::SoftwareGl);

        // no edge: the config policy picks the variant again
        unsafe { plugin.open2(TOGGLE_RENDERER_FLAG, base).unwrap() };
        assert_eq!(plugin.current_renderer_type(), RendererType::HardwareGl);
        assert!(plugin.is_open());
    }

    #[test]
    fn test_close_keeps_renderer() {
        let mut plugin = gl_plugin();
        plugin.close();

        unsafe { plugin.open(RendererType::SoftwareGl, 0, std::ptr::null_mut()).unwrap() };
        plugin.set_game_crc(0x45D1_9A8D, 0);
        plugin.close();
        assert!(!plugin.is_open());
        assert_eq!(plugin.renderer().map(|r| r.crc()), Some(0x45D1_9A8D));

        plugin.shutdown();
        assert!(plugin.renderer().is_none());
        assert_eq!(plugin.current_renderer_type(), RendererType::Undefined);
    }

    #[test]
    fn test_forwarders_without_renderer() {
        let mut plugin = gl_plugin();
        plugin.vsync(1);
        plugin.gif_transfer(&[0u8; 32]);
        plugin.read_fifo2(&mut [0u8; 16]);
        let mut fd = FreezeData::empty();
        assert!(matches!(plugin.freeze(FreezeMode::Size, &mut fd), Err(GsError::NotOpen)));
        assert!(plugin.client_rect().is_none());
    }

    #[test]
    fn test_freeze_modes() {
        let mut plugin = GsPlugin::new(GsConfig::default(), Arc::new(NullHost::new()));
        unsafe { plugin.open(RendererType::Null, -1, std::ptr::null_mut()).unwrap() };

        let mut fd = FreezeData::empty();
        plugin.freeze(FreezeMode::Size, &mut fd).unwrap();
        let mut buf = vec![0u8; fd.size];
        plugin.freeze(FreezeMode::Save, &mut FreezeData::new(&mut buf)).unwrap();
        plugin.freeze(FreezeMode::Load, &mut FreezeData::new(&mut buf)).unwrap();

        let err = plugin.freeze(FreezeMode::Load, &mut FreezeData::new(&mut buf[..8])).unwrap_err();
        assert!(matches!(err, GsError::Freeze(FreezeError::BufferTooSmall { .. })));
        assert_eq!(FreezeMode::from_i32(2), Some(FreezeMode::Size));
        assert_eq!(FreezeMode::from_i32(3), None);
    }
}
