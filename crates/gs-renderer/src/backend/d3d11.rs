//! Direct3D 11 device
//!
//! The host owns the D3D11 device and swap chain; this device only manages
//! its render target texture through [`D3d11Context`].

use super::{Device, DeviceKind, DeviceStats, Frame};
use crate::host::{D3d11Context, HostRenderContext};
use gs_core::error::DeviceError;
use std::sync::Arc;

pub struct Dx11Device {
    host: Arc<dyn HostRenderContext>,
    context: Option<Arc<dyn D3d11Context>>,
    texture: Option<u64>,
    size: (u32, u32),
    stats: DeviceStats,
}

impl Dx11Device {
    pub fn new(host: Arc<dyn HostRenderContext>) -> Self {
        Self {
            host,
            context: None,
            texture: None,
            size: (0, 0),
            stats: DeviceStats::default(),
        }
    }

    fn context(&self) -> Result<&Arc<dyn D3d11Context>, DeviceError> {
        self.context.as_ref().ok_or(DeviceError::NoDevice)
    }

    fn allocate_target(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        self.size = (width, height);
        if width == 0 || height == 0 {
            return Ok(());
        }
        let texture = self.context()?.create_texture(width, height)?;
        self.texture = Some(texture);
        Ok(())
    }

    fn release_target(&mut self) {
        if let (Some(context), Some(texture)) = (self.context.as_ref(), self.texture.take()) {
            context.release_texture(texture);
        }
    }
}

impl Device for Dx11Device {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Direct3D11
    }

    fn create(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        let context = self
            .host
            .d3d11()
            .ok_or_else(|| DeviceError::Unsupported("host has no Direct3D 11 context".into()))?;

        self.release_target();
        self.context = Some(context);
        if let Err(e) = self.allocate_target(width, height) {
            self.context = None;
            return Err(e);
        }
        self.stats.creates += 1;

        tracing::info!("Direct3D 11 device created ({}x{})", width, height);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        if self.context.is_none() {
            return Ok(());
        }
        let (w, h) = self.size;
        self.release_target();
        self.allocate_target(w, h)?;
        self.stats.resets += 1;
        Ok(())
    }

    fn resize_target(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        if self.size == (width, height) && self.texture.is_some() {
            return Ok(());
        }
        self.release_target();
        self.allocate_target(width, height)
    }

    fn present(&mut self, frame: &Frame) -> Result<(), DeviceError> {
        if self.size != (frame.width, frame.height) {
            self.resize_target(frame.width, frame.height)?;
        }

        let context = self.context()?.clone();
        if let Some(texture) = self.texture {
            if let Some(pixels) = frame.rgba() {
                context.update_texture(texture, pixels, frame.width as usize * 4)?;
                self.stats.uploads += 1;
            }
            context.present(texture, self.size.0, self.size.1)?;
        }

        self.host.video_refresh(self.size.0, self.size.1);
        self.stats.presents += 1;
        Ok(())
    }

    fn target_size(&self) -> (u32, u32) {
        self.size
    }

    fn stats(&self) -> DeviceStats {
        self.stats
    }

    fn is_created(&self) -> bool {
        self.context.is_some()
    }
}

impl Drop for Dx11Device {
    fn drop(&mut self) {
        self.release_target();
    }
}
