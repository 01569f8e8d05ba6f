//! Offscreen host contexts
//!
//! Hosts that satisfy the device interfaces without a window or a GPU.
//! GL entry points are software stubs that record what was called; the
//! Direct3D 11 context keeps its textures in memory. Used by the headless
//! runner and by tests.

use crate::host::{D3d11Context, HostRenderContext, HwContextType};
use gs_core::error::DeviceError;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What the stub GL entry points observed on the current thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlCapture {
    pub uploads: u64,
    pub blits: u64,
    pub clears: u64,
    pub last_upload: Vec<u8>,
    pub live_textures: usize,
    pub live_framebuffers: usize,
    next_name: u32,
}

thread_local! {
    static CAPTURE: RefCell<GlCapture> = RefCell::new(GlCapture::default());
}

fn with_capture<R>(f: impl FnOnce(&mut GlCapture) -> R) -> R {
    CAPTURE.with(|c| f(&mut c.borrow_mut()))
}

/// Host offering either stub GL entry points or an in-memory D3D11 context
pub struct OffscreenHost {
    context: HwContextType,
    missing: Vec<&'static str>,
    d3d: Option<Arc<OffscreenD3d11>>,
    refreshes: AtomicU64,
}

impl OffscreenHost {
    /// GL host with every entry point available.
    ///
    /// The GL capture is per thread; creating a host clears it.
    pub fn gl() -> Self {
        Self::gl_without(&[])
    }

    /// GL host that reports the named entry points as unavailable
    pub fn gl_without(missing: &[&'static str]) -> Self {
        with_capture(|c| *c = GlCapture::default());
        Self {
            context: HwContextType::OpenGlCore,
            missing: missing.to_vec(),
            d3d: None,
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn direct3d() -> Self {
        Self {
            context: HwContextType::Direct3D,
            missing: Vec::new(),
            d3d: Some(Arc::new(OffscreenD3d11::default())),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Snapshot of the GL calls made on this thread
    pub fn gl_capture(&self) -> GlCapture {
        with_capture(|c| c.clone())
    }

    pub fn d3d11_backend(&self) -> Option<Arc<OffscreenD3d11>> {
        self.d3d.clone()
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

impl HostRenderContext for OffscreenHost {
    fn context_type(&self) -> HwContextType {
        self.context
    }

    fn get_proc_address(&self, name: &str) -> *const c_void {
        if !self.context.is_gl() || self.missing.contains(&name) {
            return std::ptr::null();
        }
        stub_entry_point(name)
    }

    fn video_refresh(&self, _width: u32, _height: u32) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    fn d3d11(&self) -> Option<Arc<dyn D3d11Context>> {
        self.d3d.clone().map(|d| d as Arc<dyn D3d11Context>)
    }
}

fn stub_entry_point(name: &str) -> *const c_void {
    match name {
        "glGenTextures" => gen_textures as *const c_void,
        "glDeleteTextures" => delete_textures as *const c_void,
        "glBindTexture" => bind_texture as *const c_void,
        "glTexImage2D" => tex_image_2d as *const c_void,
        "glTexSubImage2D" => tex_sub_image_2d as *const c_void,
        "glTexParameteri" => tex_parameter_i as *const c_void,
        "glGenFramebuffers" => gen_framebuffers as *const c_void,
        "glDeleteFramebuffers" => delete_framebuffers as *const c_void,
        "glBindFramebuffer" => bind_framebuffer as *const c_void,
        "glFramebufferTexture2D" => framebuffer_texture_2d as *const c_void,
        "glBlitFramebuffer" => blit_framebuffer as *const c_void,
        "glViewport" => viewport as *const c_void,
        "glClearColor" => clear_color as *const c_void,
        "glClear" => clear as *const c_void,
        "glGetError" => get_error as *const c_void,
        "glTexStorage2D" => tex_storage_2d as *const c_void,
        _ => std::ptr::null(),
    }
}

// Uploads are always tightly packed RGBA8, which is all the devices send.
const BYTES_PER_PIXEL: usize = 4;

extern "system" fn gen_textures(n: i32, names: *mut u32) {
    with_capture(|c| {
        for i in 0..n.max(0) as usize {
            c.next_name += 1;
            // Safety: GL callers pass room for `n` names
            unsafe { *names.add(i) = c.next_name };
            c.live_textures += 1;
        }
    });
}

extern "system" fn delete_textures(n: i32, _names: *const u32) {
    with_capture(|c| c.live_textures = c.live_textures.saturating_sub(n.max(0) as usize));
}

extern "system" fn bind_texture(_target: u32, _texture: u32) {}

#[allow(clippy::too_many_arguments)]
extern "system" fn tex_image_2d(
    _target: u32,
    _level: i32,
    _internal: i32,
    _w: i32,
    _h: i32,
    _border: i32,
    _format: u32,
    _ty: u32,
    _pixels: *const c_void,
) {
}

#[allow(clippy::too_many_arguments)]
extern "system" fn tex_sub_image_2d(
    _target: u32,
    _level: i32,
    _x: i32,
    _y: i32,
    w: i32,
    h: i32,
    _format: u32,
    _ty: u32,
    pixels: *const c_void,
) {
    let len = w.max(0) as usize * h.max(0) as usize * BYTES_PER_PIXEL;
    let data = if pixels.is_null() || len == 0 {
        Vec::new()
    } else {
        // Safety: GL callers pass `w * h` packed pixels
        unsafe { std::slice::from_raw_parts(pixels.cast::<u8>(), len) }.to_vec()
    };
    with_capture(|c| {
        c.uploads += 1;
        c.last_upload = data;
    });
}

extern "system" fn tex_parameter_i(_target: u32, _pname: u32, _param: i32) {}

extern "system" fn gen_framebuffers(n: i32, names: *mut u32) {
    with_capture(|c| {
        for i in 0..n.max(0) as usize {
            c.next_name += 1;
            // Safety: GL callers pass room for `n` names
            unsafe { *names.add(i) = c.next_name };
            c.live_framebuffers += 1;
        }
    });
}

extern "system" fn delete_framebuffers(n: i32, _names: *const u32) {
    with_capture(|c| c.live_framebuffers = c.live_framebuffers.saturating_sub(n.max(0) as usize));
}

extern "system" fn bind_framebuffer(_target: u32, _fbo: u32) {}

extern "system" fn framebuffer_texture_2d(_target: u32, _attachment: u32, _textarget: u32, _texture: u32, _level: i32) {}

#[allow(clippy::too_many_arguments)]
extern "system" fn blit_framebuffer(
    _sx0: i32,
    _sy0: i32,
    _sx1: i32,
    _sy1: i32,
    _dx0: i32,
    _dy0: i32,
    _dx1: i32,
    _dy1: i32,
    _mask: u32,
    _filter: u32,
) {
    with_capture(|c| c.blits += 1);
}

extern "system" fn viewport(_x: i32, _y: i32, _w: i32, _h: i32) {}

extern "system" fn clear_color(_r: f32, _g: f32, _b: f32, _a: f32) {}

extern "system" fn clear(_mask: u32) {
    with_capture(|c| c.clears += 1);
}

extern "system" fn get_error() -> u32 {
    0
}

extern "system" fn tex_storage_2d(_target: u32, _levels: i32, _format: u32, _w: i32, _h: i32) {}

struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// In-memory Direct3D 11 context
#[derive(Default)]
pub struct OffscreenD3d11 {
    textures: Mutex<HashMap<u64, Texture>>,
    next_handle: AtomicU64,
    presents: AtomicU64,
    last_present: Mutex<Option<Vec<u8>>>,
}

impl OffscreenD3d11 {
    pub fn live_textures(&self) -> usize {
        self.textures.lock().len()
    }

    pub fn presents(&self) -> u64 {
        self.presents.load(Ordering::Relaxed)
    }

    /// Contents of the texture most recently presented
    pub fn last_present(&self) -> Option<Vec<u8>> {
        self.last_present.lock().clone()
    }
}

impl D3d11Context for OffscreenD3d11 {
    fn create_texture(&self, width: u32, height: u32) -> Result<u64, DeviceError> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        let pixels = vec![0; width as usize * height as usize * BYTES_PER_PIXEL];
        self.textures.lock().insert(handle, Texture { width, height, pixels });
        Ok(handle)
    }

    fn release_texture(&self, texture: u64) {
        self.textures.lock().remove(&texture);
    }

    fn update_texture(&self, texture: u64, pixels: &[u8], pitch: usize) -> Result<(), DeviceError> {
        let mut textures = self.textures.lock();
        let tex = textures
            .get_mut(&texture)
            .ok_or_else(|| DeviceError::Backend(format!("unknown texture {}", texture)))?;

        let row = tex.width as usize * BYTES_PER_PIXEL;
        if pitch < row {
            return Err(DeviceError::Backend(format!("pitch {} below row size {}", pitch, row)));
        }
        for (y, dst) in tex.pixels.chunks_exact_mut(row).enumerate() {
            let Some(src) = pixels.get(y * pitch..y * pitch + row) else {
                break;
            };
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    fn present(&self, texture: u64, width: u32, height: u32) -> Result<(), DeviceError> {
        let textures = self.textures.lock();
        let tex = textures
            .get(&texture)
            .ok_or_else(|| DeviceError::Backend(format!("unknown texture {}", texture)))?;
        if (tex.width, tex.height) != (width, height) {
            return Err(DeviceError::Backend(format!(
                "present size {}x{} does not match texture {}x{}",
                width, height, tex.width, tex.height
            )));
        }
        *self.last_present.lock() = Some(tex.pixels.clone());
        self.presents.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
