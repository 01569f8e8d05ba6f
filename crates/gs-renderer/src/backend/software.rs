//! Software presentation device
//!
//! CPU-rendered frames are copied into a page-aligned staging buffer and
//! uploaded through the host's GL context.

use super::{Device, DeviceKind, DeviceStats, Frame, OglDevice};
use crate::host::HostRenderContext;
use gs_core::error::DeviceError;
use gs_memory::{vmalloc, PageBuffer};
use std::sync::Arc;

pub struct SoftwareDevice {
    gl: OglDevice,
    staging: Option<PageBuffer>,
}

impl SoftwareDevice {
    pub fn new(host: Arc<dyn HostRenderContext>) -> Self {
        Self {
            gl: OglDevice::new(host),
            staging: None,
        }
    }

    /// Make sure the staging buffer holds at least `len` bytes
    fn reserve_staging(&mut self, len: usize) -> Result<(), DeviceError> {
        let len = len.max(1);
        if self.staging.as_ref().is_some_and(|s| s.len() >= len) {
            return Ok(());
        }
        let buffer = vmalloc(len, false).map_err(|e| DeviceError::Backend(e.to_string()))?;
        tracing::debug!("Software staging buffer: {} bytes", buffer.len());
        self.staging = Some(buffer);
        Ok(())
    }

    pub fn staging_len(&self) -> usize {
        self.staging.as_ref().map_or(0, PageBuffer::len)
    }
}

impl Device for SoftwareDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Software
    }

    fn create(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        self.gl.create(width, height)?;
        self.reserve_staging(width as usize * height as usize * 4)
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        self.gl.reset()
    }

    fn resize_target(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        self.gl.resize_target(width, height)?;
        self.reserve_staging(width as usize * height as usize * 4)
    }

    fn present(&mut self, frame: &Frame) -> Result<(), DeviceError> {
        let Some(pixels) = frame.rgba() else {
            return self.gl.present(frame);
        };

        self.reserve_staging(pixels.len())?;
        let staging = self.staging.as_mut().ok_or(DeviceError::NoDevice)?;
        staging.as_mut_slice()[..pixels.len()].copy_from_slice(pixels);

        let staged = Frame::new(frame.width, frame.height, &staging.as_slice()[..pixels.len()]);
        self.gl.present(&staged)
    }

    fn target_size(&self) -> (u32, u32) {
        self.gl.target_size()
    }

    fn stats(&self) -> DeviceStats {
        self.gl.stats()
    }

    fn is_created(&self) -> bool {
        self.gl.is_created()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offscreen::OffscreenHost;

    #[test]
    fn test_staging_sized_for_target() {
        let host = Arc::new(OffscreenHost::gl());
        let mut device = SoftwareDevice::new(host);
        device.create(64, 64).unwrap();
        assert!(device.staging_len() >= 64 * 64 * 4);
        assert_eq!(device.kind(), DeviceKind::Software);
    }

    #[test]
    fn test_present_goes_through_gl() {
        let host = Arc::new(OffscreenHost::gl());
        let mut device = SoftwareDevice::new(host.clone());
        device.create(2, 1).unwrap();

        let pixels = [1u8, 2, 3, 255, 4, 5, 6, 255];
        device.present(&Frame::new(2, 1, &pixels)).unwrap();
        assert_eq!(host.gl_capture().last_upload, pixels);
        assert_eq!(device.stats().presents, 1);
    }

    #[test]
    fn test_fails_like_gl_device() {
        let host = Arc::new(OffscreenHost::gl_without(&["glTexSubImage2D"]));
        let mut device = SoftwareDevice::new(host);
        assert!(matches!(
            device.create(64, 64),
            Err(DeviceError::MissingEntryPoint("glTexSubImage2D"))
        ));
    }
}
