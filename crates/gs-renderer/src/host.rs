//! Host render context
//!
//! The emulator frontend owns the window and the graphics context. Devices
//! reach it only through these traits: GL entry points are resolved by name,
//! Direct3D 11 work goes through a narrow texture/present interface.

use gs_core::error::DeviceError;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kind of hardware context the host created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwContextType {
    /// No hardware context (headless)
    None,
    OpenGl,
    OpenGlCore,
    OpenGles3,
    Vulkan,
    Direct3D,
}

impl HwContextType {
    /// Whether this context exposes GL entry points
    pub fn is_gl(self) -> bool {
        matches!(self, Self::OpenGl | Self::OpenGlCore | Self::OpenGles3)
    }
}

/// Render context offered by the host emulator
pub trait HostRenderContext: Send + Sync {
    fn context_type(&self) -> HwContextType;

    /// Resolve a GL entry point by name. Null when unavailable.
    fn get_proc_address(&self, name: &str) -> *const c_void;

    /// Framebuffer object frames should be drawn into
    fn current_framebuffer(&self) -> u32 {
        0
    }

    /// Notify the host that a frame of the given size is ready
    fn video_refresh(&self, width: u32, height: u32);

    /// Direct3D 11 interface, when the host runs a D3D11 context
    fn d3d11(&self) -> Option<Arc<dyn D3d11Context>> {
        None
    }
}

/// Texture and present operations on a host-owned D3D11 device
pub trait D3d11Context: Send + Sync {
    /// Create an RGBA8 texture and return its handle
    fn create_texture(&self, width: u32, height: u32) -> Result<u64, DeviceError>;

    fn release_texture(&self, texture: u64);

    /// Upload `pixels` (RGBA8, `pitch` bytes per row) into a texture
    fn update_texture(&self, texture: u64, pixels: &[u8], pitch: usize) -> Result<(), DeviceError>;

    /// Draw a texture to the host back buffer
    fn present(&self, texture: u64, width: u32, height: u32) -> Result<(), DeviceError>;
}

/// Host without any hardware context, for headless runs
#[derive(Debug, Default)]
pub struct NullHost {
    refreshes: AtomicU64,
}

impl NullHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames handed to the host so far
    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

impl HostRenderContext for NullHost {
    fn context_type(&self) -> HwContextType {
        HwContextType::None
    }

    fn get_proc_address(&self, _name: &str) -> *const c_void {
        std::ptr::null()
    }

    fn video_refresh(&self, _width: u32, _height: u32) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }
}
