//! Host render context backed by C callbacks

use gs_core::error::DeviceError;
use gs_renderer::{D3d11Context, HostRenderContext, HwContextType};
use std::ffi::{c_char, c_void, CString};
use std::sync::Arc;

/// Callbacks the host emulator registers with `GSsetHostCallbacks`.
///
/// `context_type`: 0 none, 1 OpenGL, 2 OpenGL core, 3 OpenGL ES 3,
/// 4 Vulkan, 5 Direct3D. The D3D11 callbacks are only used with context
/// type 5 and must all be set for it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GsHostCallbacks {
    pub context_type: i32,
    pub user: *mut c_void,
    pub get_proc_address: Option<unsafe extern "C" fn(name: *const c_char) -> *const c_void>,
    pub current_framebuffer: Option<unsafe extern "C" fn(user: *mut c_void) -> u32>,
    pub video_refresh: Option<unsafe extern "C" fn(user: *mut c_void, width: u32, height: u32)>,
    /// Returns a non-zero texture handle, or 0 on failure
    pub d3d11_create_texture: Option<unsafe extern "C" fn(user: *mut c_void, width: u32, height: u32) -> u64>,
    pub d3d11_release_texture: Option<unsafe extern "C" fn(user: *mut c_void, texture: u64)>,
    /// Returns 0 on success
    pub d3d11_update_texture:
        Option<unsafe extern "C" fn(user: *mut c_void, texture: u64, pixels: *const u8, len: usize, pitch: usize) -> i32>,
    /// Returns 0 on success
    pub d3d11_present: Option<unsafe extern "C" fn(user: *mut c_void, texture: u64, width: u32, height: u32) -> i32>,
}

impl GsHostCallbacks {
    fn hw_context(&self) -> HwContextType {
        match self.context_type {
            1 => HwContextType::OpenGl,
            2 => HwContextType::OpenGlCore,
            3 => HwContextType::OpenGles3,
            4 => HwContextType::Vulkan,
            5 => HwContextType::Direct3D,
            _ => HwContextType::None,
        }
    }
}

/// [`HostRenderContext`] forwarding to [`GsHostCallbacks`]
pub struct FfiHost {
    callbacks: GsHostCallbacks,
    d3d11: Option<Arc<FfiD3d11>>,
}

// Safety: the host promises its callbacks and `user` stay valid while
// registered, and every call comes from the emulation thread
unsafe impl Send for FfiHost {}
unsafe impl Sync for FfiHost {}

impl FfiHost {
    pub fn new(callbacks: GsHostCallbacks) -> Self {
        let d3d11 = FfiD3d11::from_callbacks(&callbacks).map(Arc::new);
        if callbacks.hw_context() == HwContextType::Direct3D && d3d11.is_none() {
            tracing::warn!("Direct3D host registered without D3D11 callbacks");
        }
        Self { callbacks, d3d11 }
    }
}

impl HostRenderContext for FfiHost {
    fn context_type(&self) -> HwContextType {
        self.callbacks.hw_context()
    }

    fn get_proc_address(&self, name: &str) -> *const c_void {
        let (Some(resolve), Ok(name)) = (self.callbacks.get_proc_address, CString::new(name)) else {
            return std::ptr::null();
        };
        unsafe { resolve(name.as_ptr()) }
    }

    fn current_framebuffer(&self) -> u32 {
        match self.callbacks.current_framebuffer {
            Some(f) => unsafe { f(self.callbacks.user) },
            None => 0,
        }
    }

    fn video_refresh(&self, width: u32, height: u32) {
        if let Some(f) = self.callbacks.video_refresh {
            unsafe { f(self.callbacks.user, width, height) };
        }
    }

    fn d3d11(&self) -> Option<Arc<dyn D3d11Context>> {
        if self.callbacks.hw_context() != HwContextType::Direct3D {
            return None;
        }
        self.d3d11.clone().map(|d| d as Arc<dyn D3d11Context>)
    }
}

type CreateTexture = unsafe extern "C" fn(*mut c_void, u32, u32) -> u64;
type ReleaseTexture = unsafe extern "C" fn(*mut c_void, u64);
type UpdateTexture = unsafe extern "C" fn(*mut c_void, u64, *const u8, usize, usize) -> i32;
type Present = unsafe extern "C" fn(*mut c_void, u64, u32, u32) -> i32;

struct FfiD3d11 {
    user: *mut c_void,
    create: CreateTexture,
    release: ReleaseTexture,
    update: UpdateTexture,
    present: Present,
}

// Safety: see FfiHost
unsafe impl Send for FfiD3d11 {}
unsafe impl Sync for FfiD3d11 {}

impl FfiD3d11 {
    fn from_callbacks(cb: &GsHostCallbacks) -> Option<Self> {
        Some(Self {
            user: cb.user,
            create: cb.d3d11_create_texture?,
            release: cb.d3d11_release_texture?,
            update: cb.d3d11_update_texture?,
            present: cb.d3d11_present?,
        })
    }
}

impl D3d11Context for FfiD3d11 {
    fn create_texture(&self, width: u32, height: u32) -> Result<u64, DeviceError> {
        match unsafe { (self.create)(self.user, width, height) } {
            0 => Err(DeviceError::Backend(format!("host could not create a {}x{} texture", width, height))),
            texture => Ok(texture),
        }
    }

    fn release_texture(&self, texture: u64) {
        unsafe { (self.release)(self.user, texture) };
    }

    fn update_texture(&self, texture: u64, pixels: &[u8], pitch: usize) -> Result<(), DeviceError> {
        match unsafe { (self.update)(self.user, texture, pixels.as_ptr(), pixels.len(), pitch) } {
            0 => Ok(()),
            code => Err(DeviceError::Backend(format!("texture update failed ({})", code))),
        }
    }

    fn present(&self, texture: u64, width: u32, height: u32) -> Result<(), DeviceError> {
        match unsafe { (self.present)(self.user, texture, width, height) } {
            0 => Ok(()),
            code => Err(DeviceError::Backend(format!("present failed ({})", code))),
        }
    }
}
