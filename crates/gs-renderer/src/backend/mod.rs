//! Presentation devices
//!
//! A device owns the backend resources a renderer presents through: render
//! target textures, resolved GL entry points, Direct3D 11 texture handles,
//! CPU staging frames. Renderers own exactly one device at a time.

pub mod d3d11;
pub mod gl;
pub mod null;
pub mod opengl;
pub mod software;

pub use d3d11::Dx11Device;
pub use null::NullDevice;
pub use opengl::OglDevice;
pub use software::SoftwareDevice;

use gs_core::error::DeviceError;

/// Render target size used until a renderer asks for something else
pub const DEFAULT_TARGET: (u32, u32) = (640, 480);

/// Backend family of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Null,
    OpenGl,
    Direct3D11,
    /// OpenGL presentation of CPU-rendered frames
    Software,
}

/// Counters exposed for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub creates: u64,
    pub resets: u64,
    pub presents: u64,
    pub uploads: u64,
}

/// A frame handed to [`Device::present`]
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows. `None` presents the current target as is.
    pub pixels: Option<&'a [u8]>,
}

impl<'a> Frame<'a> {
    pub fn new(width: u32, height: u32, pixels: &'a [u8]) -> Self {
        Self {
            width,
            height,
            pixels: Some(pixels),
        }
    }

    /// Present without new pixel data
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: None,
        }
    }

    /// Pixels, when present and large enough for the frame size
    pub fn rgba(&self) -> Option<&'a [u8]> {
        let needed = self.width as usize * self.height as usize * 4;
        self.pixels.filter(|p| p.len() >= needed).map(|p| &p[..needed])
    }
}

/// Backend device
pub trait Device: Send {
    fn kind(&self) -> DeviceKind;

    /// Acquire backend resources with a `width` x `height` render target
    fn create(&mut self, width: u32, height: u32) -> Result<(), DeviceError>;

    /// Release and reacquire backend resources. The device stays usable.
    fn reset(&mut self) -> Result<(), DeviceError>;

    fn resize_target(&mut self, width: u32, height: u32) -> Result<(), DeviceError>;

    fn present(&mut self, frame: &Frame) -> Result<(), DeviceError>;

    fn target_size(&self) -> (u32, u32);

    fn stats(&self) -> DeviceStats;

    /// Whether `create` has succeeded
    fn is_created(&self) -> bool;
}
