//! Hardware renderers (OpenGL and Direct3D 11)
//!
//! Both variants run the same GS emulation and render at the native
//! display size times `upscale_multiplier`. Only the device they accept
//! and the CRC hack level they resolve to differ.

use super::{Renderer, RendererCore, RendererType};
use crate::backend::Frame;
use gs_core::error::GsError;
use gs_core::GsConfig;

#[derive(Debug)]
pub struct HardwareRenderer {
    core: RendererCore,
}

impl HardwareRenderer {
    /// Create a hardware renderer of `kind`, which must be
    /// [`RendererType::HardwareGl`] or [`RendererType::HardwareDx11`]
    pub fn new(kind: RendererType, config: &GsConfig) -> Result<Self, GsError> {
        if !kind.is_hardware() {
            return Err(GsError::RendererCreation(format!("{} is not a hardware renderer", kind)));
        }
        Ok(Self {
            core: RendererCore::new(kind, config)?,
        })
    }

    pub fn opengl(config: &GsConfig) -> Result<Self, GsError> {
        Self::new(RendererType::HardwareGl, config)
    }

    pub fn direct3d11(config: &GsConfig) -> Result<Self, GsError> {
        Self::new(RendererType::HardwareDx11, config)
    }
}

impl Renderer for HardwareRenderer {
    fn core(&self) -> &RendererCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RendererCore {
        &mut self.core
    }

    fn internal_resolution(&self) -> (u32, u32) {
        let (w, h) = self.core.display();
        let scale = self.core.upscale();
        (w * scale, h * scale)
    }

    fn vsync(&mut self, field: i32) {
        self.core.vsync_state(field);
        // the device draws on the GPU; there are no CPU pixels to upload
        let (w, h) = self.internal_resolution();
        self.core.present(&Frame::blank(w, h));
    }
}
