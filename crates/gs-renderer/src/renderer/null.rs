//! Renderer that emulates GS state but never draws

use super::{Renderer, RendererCore, RendererType};
use crate::backend::Frame;
use gs_core::error::MemoryError;
use gs_core::GsConfig;

#[derive(Debug)]
pub struct NullRenderer {
    core: RendererCore,
}

impl NullRenderer {
    pub fn new(config: &GsConfig) -> Result<Self, MemoryError> {
        Ok(Self {
            core: RendererCore::new(RendererType::Null, config)?,
        })
    }
}

impl Renderer for NullRenderer {
    fn core(&self) -> &RendererCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RendererCore {
        &mut self.core
    }

    /// No render target
    fn internal_resolution(&self) -> (u32, u32) {
        (0, 0)
    }

    fn vsync(&mut self, field: i32) {
        self.core.vsync_state(field);
        self.core.present(&Frame::blank(0, 0));
    }
}
