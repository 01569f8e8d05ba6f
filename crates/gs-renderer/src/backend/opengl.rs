//! OpenGL device

use super::gl::{self, gl_call, GlFunctions};
use super::{Device, DeviceKind, DeviceStats, Frame};
use crate::host::HostRenderContext;
use gs_core::error::DeviceError;
use std::sync::Arc;

/// Device drawing into the host's GL context.
///
/// Owns one RGBA8 render target texture attached to a framebuffer object.
/// Presenting blits that target into the host framebuffer.
pub struct OglDevice {
    host: Arc<dyn HostRenderContext>,
    gl: Option<GlFunctions>,
    texture: u32,
    fbo: u32,
    size: (u32, u32),
    stats: DeviceStats,
}

impl OglDevice {
    pub fn new(host: Arc<dyn HostRenderContext>) -> Self {
        Self {
            host,
            gl: None,
            texture: 0,
            fbo: 0,
            size: (0, 0),
            stats: DeviceStats::default(),
        }
    }

    pub fn functions(&self) -> Option<&GlFunctions> {
        self.gl.as_ref()
    }

    pub fn host(&self) -> &Arc<dyn HostRenderContext> {
        &self.host
    }

    fn allocate_target(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        let gl = self.gl.as_ref().ok_or(DeviceError::NoDevice)?;
        self.size = (width, height);
        if width == 0 || height == 0 {
            return Ok(());
        }

        let (w, h) = (width as i32, height as i32);
        let mut texture = 0u32;
        gl_call!(gl, gen_textures(1, &mut texture));
        gl_call!(gl, bind_texture(gl::GL_TEXTURE_2D, texture));
        if gl.has_texture_storage() {
            gl_call!(gl, tex_storage_2d(gl::GL_TEXTURE_2D, 1, gl::GL_RGBA8, w, h));
        } else {
            gl_call!(gl, tex_image_2d(
                gl::GL_TEXTURE_2D,
                0,
                gl::GL_RGBA8 as i32,
                w,
                h,
                0,
                gl::GL_RGBA,
                gl::GL_UNSIGNED_BYTE,
                std::ptr::null()
            ));
        }
        gl_call!(gl, tex_parameter_i(gl::GL_TEXTURE_2D, gl::GL_TEXTURE_MIN_FILTER, gl::GL_NEAREST as i32));
        gl_call!(gl, tex_parameter_i(gl::GL_TEXTURE_2D, gl::GL_TEXTURE_MAG_FILTER, gl::GL_LINEAR as i32));

        let mut fbo = 0u32;
        gl_call!(gl, gen_framebuffers(1, &mut fbo));
        gl_call!(gl, bind_framebuffer(gl::GL_FRAMEBUFFER, fbo));
        gl_call!(gl, framebuffer_texture_2d(gl::GL_FRAMEBUFFER, gl::GL_COLOR_ATTACHMENT0, gl::GL_TEXTURE_2D, texture, 0));
        gl_call!(gl, bind_framebuffer(gl::GL_FRAMEBUFFER, self.host.current_framebuffer()));

        self.texture = texture;
        self.fbo = fbo;
        gl.check_error()
    }

    fn release_target(&mut self) {
        let Some(gl) = self.gl.as_ref() else {
            return;
        };
        if self.fbo != 0 {
            gl_call!(gl, delete_framebuffers(1, &self.fbo));
            self.fbo = 0;
        }
        if self.texture != 0 {
            gl_call!(gl, delete_textures(1, &self.texture));
            self.texture = 0;
        }
    }

    fn upload(&mut self, pixels: &[u8]) {
        let Some(gl) = self.gl.as_ref() else {
            return;
        };
        let (w, h) = self.size;
        gl_call!(gl, bind_texture(gl::GL_TEXTURE_2D, self.texture));
        gl_call!(gl, tex_sub_image_2d(
            gl::GL_TEXTURE_2D,
            0,
            0,
            0,
            w as i32,
            h as i32,
            gl::GL_RGBA,
            gl::GL_UNSIGNED_BYTE,
            pixels.as_ptr().cast()
        ));
        self.stats.uploads += 1;
    }
}

impl Device for OglDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::OpenGl
    }

    fn create(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        if !self.host.context_type().is_gl() {
            return Err(DeviceError::Unsupported(format!(
                "OpenGL device needs a GL context, host offers {:?}",
                self.host.context_type()
            )));
        }

        self.release_target();
        self.gl = Some(GlFunctions::load(self.host.as_ref())?);
        self.allocate_target(width, height)?;
        self.stats.creates += 1;

        tracing::info!("OpenGL device created ({}x{})", width, height);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        if self.gl.is_none() {
            return Ok(());
        }
        let (w, h) = self.size;
        self.release_target();
        self.allocate_target(w, h)?;
        self.stats.resets += 1;
        Ok(())
    }

    fn resize_target(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        if self.size == (width, height) && self.texture != 0 {
            return Ok(());
        }
        self.release_target();
        self.allocate_target(width, height)
    }

    fn present(&mut self, frame: &Frame) -> Result<(), DeviceError> {
        if self.gl.is_none() {
            return Err(DeviceError::NoDevice);
        }
        if self.size != (frame.width, frame.height) {
            self.resize_target(frame.width, frame.height)?;
        }
        if let Some(pixels) = frame.rgba() {
            self.upload(pixels);
        }

        let gl = self.gl.as_ref().ok_or(DeviceError::NoDevice)?;
        let (w, h) = (self.size.0 as i32, self.size.1 as i32);
        let target = self.host.current_framebuffer();

        gl_call!(gl, bind_framebuffer(gl::GL_DRAW_FRAMEBUFFER, target));
        gl_call!(gl, viewport(0, 0, w, h));
        gl_call!(gl, clear_color(0.0, 0.0, 0.0, 1.0));
        gl_call!(gl, clear(gl::GL_COLOR_BUFFER_BIT));
        if self.fbo != 0 {
            gl_call!(gl, bind_framebuffer(gl::GL_READ_FRAMEBUFFER, self.fbo));
            // flip: GL rows run bottom up
            gl_call!(gl, blit_framebuffer(0, 0, w, h, 0, h, w, 0, gl::GL_COLOR_BUFFER_BIT, gl::GL_NEAREST));
        }
        gl.check_error()?;

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
        self.gl.is_some()
    }
}

impl Drop for OglDevice {
    fn drop(&mut self) {
        self.release_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use crate::offscreen::OffscreenHost;

    #[test]
    fn test_create_and_present() {
        let host = Arc::new(OffscreenHost::gl());
        let mut device = OglDevice::new(host.clone());
        device.create(4, 2).unwrap();
        assert!(device.is_created());
        assert_eq!(device.target_size(), (4, 2));

        let pixels = vec![0x7Fu8; 4 * 2 * 4];
        device.present(&Frame::new(4, 2, &pixels)).unwrap();

        let capture = host.gl_capture();
        assert_eq!(capture.uploads, 1);
        assert_eq!(capture.blits, 1);
        assert_eq!(capture.last_upload, pixels);
        assert_eq!(host.refreshes(), 1);
        assert_eq!(device.stats().presents, 1);
    }

    #[test]
    fn test_missing_required_entry_point() {
        let host = Arc::new(OffscreenHost::gl_without(&["glBlitFramebuffer"]));
        let mut device = OglDevice::new(host);
        let err = device.create(640, 480).unwrap_err();
        assert!(matches!(err, DeviceError::MissingEntryPoint("glBlitFramebuffer")));
        assert!(!device.is_created());
    }

    #[test]
    fn test_needs_gl_context() {
        let mut device = OglDevice::new(Arc::new(NullHost::new()));
        assert!(matches!(device.create(640, 480), Err(DeviceError::Unsupported(_))));
    }

    #[test]
    fn test_reset_and_drop_release_resources() {
        let host = Arc::new(OffscreenHost::gl());
        {
            let mut device = OglDevice::new(host.clone());
            device.create(8, 8).unwrap();
            assert_eq!(host.gl_capture().live_textures, 1);
            device.reset().unwrap();
            assert_eq!(host.gl_capture().live_textures, 1);
            assert_eq!(device.stats().resets, 1);
        }
        let capture = host.gl_capture();
        assert_eq!(capture.live_textures, 0);
        assert_eq!(capture.live_framebuffers, 0);
    }

    #[test]
    fn test_present_resizes_target() {
        let host = Arc::new(OffscreenHost::gl());
        let mut device = OglDevice::new(host);
        device.create(8, 8).unwrap();
        device.present(&Frame::blank(16, 4)).unwrap();
        assert_eq!(device.target_size(), (16, 4));
        assert_eq!(device.stats().uploads, 0);
    }
}
