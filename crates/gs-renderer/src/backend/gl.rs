//! GL entry point table
//!
//! Entry points are declared once with their signature and whether the
//! device can run without them. Loading resolves every name through the
//! host and fails on the first missing required one.

use crate::host::HostRenderContext;
use gs_core::error::DeviceError;
use std::ffi::c_void;

pub const GL_NO_ERROR: u32 = 0;
pub const GL_TEXTURE_2D: u32 = 0x0DE1;
pub const GL_UNSIGNED_BYTE: u32 = 0x1401;
pub const GL_RGBA: u32 = 0x1908;
pub const GL_RGBA8: u32 = 0x8058;
pub const GL_NEAREST: u32 = 0x2600;
pub const GL_LINEAR: u32 = 0x2601;
pub const GL_TEXTURE_MAG_FILTER: u32 = 0x2800;
pub const GL_TEXTURE_MIN_FILTER: u32 = 0x2801;
pub const GL_COLOR_BUFFER_BIT: u32 = 0x4000;
pub const GL_READ_FRAMEBUFFER: u32 = 0x8CA8;
pub const GL_DRAW_FRAMEBUFFER: u32 = 0x8CA9;
pub const GL_COLOR_ATTACHMENT0: u32 = 0x8CE0;
pub const GL_FRAMEBUFFER: u32 = 0x8D40;

/// One entry of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlEntryPoint {
    pub name: &'static str,
    pub required: bool,
}

macro_rules! gl_functions {
    (@required required) => { true };
    (@required optional) => { false };

    ($( $req:ident $field:ident = $name:literal : fn($($arg:ty),*) $(-> $ret:ty)?; )*) => {
        /// Resolved GL entry points
        pub struct GlFunctions {
            $( pub $field: Option<unsafe extern "system" fn($($arg),*) $(-> $ret)?>, )*
        }

        /// Every entry point the devices use
        pub const ENTRY_POINTS: &[GlEntryPoint] = &[
            $( GlEntryPoint { name: $name, required: gl_functions!(@required $req) }, )*
        ];

        impl GlFunctions {
            /// Resolve all entry points through `host`
            pub fn load(host: &dyn HostRenderContext) -> Result<Self, DeviceError> {
                Ok(Self {
                    $( $field: {
                        let ptr = host.get_proc_address($name);
                        if ptr.is_null() {
                            if gl_functions!(@required $req) {
                                return Err(DeviceError::MissingEntryPoint($name));
                            }
                            tracing::debug!("Optional GL entry point {} not available", $name);
                            None
                        } else {
                            // Safety: the host returns a pointer to the named GL function
                            Some(unsafe {
                                std::mem::transmute::<*const c_void, unsafe extern "system" fn($($arg),*) $(-> $ret)?>(ptr)
                            })
                        }
                    }, )*
                })
            }
        }
    };
}

gl_functions! {
    required gen_textures = "glGenTextures": fn(i32, *mut u32);
    required delete_textures = "glDeleteTextures": fn(i32, *const u32);
    required bind_texture = "glBindTexture": fn(u32, u32);
    required tex_image_2d = "glTexImage2D": fn(u32, i32, i32, i32, i32, i32, u32, u32, *const c_void);
    required tex_sub_image_2d = "glTexSubImage2D": fn(u32, i32, i32, i32, i32, i32, u32, u32, *const c_void);
    required tex_parameter_i = "glTexParameteri": fn(u32, u32, i32);
    required gen_framebuffers = "glGenFramebuffers": fn(i32, *mut u32);
    required delete_framebuffers = "glDeleteFramebuffers": fn(i32, *const u32);
    required bind_framebuffer = "glBindFramebuffer": fn(u32, u32);
    required framebuffer_texture_2d = "glFramebufferTexture2D": fn(u32, u32, u32, u32, i32);
    required blit_framebuffer = "glBlitFramebuffer": fn(i32, i32, i32, i32, i32, i32, i32, i32, u32, u32);
    required viewport = "glViewport": fn(i32, i32, i32, i32);
    required clear_color = "glClearColor": fn(f32, f32, f32, f32);
    required clear = "glClear": fn(u32);
    required get_error = "glGetError": fn() -> u32;
    optional texture_barrier = "glTextureBarrier": fn();
    optional debug_message_callback = "glDebugMessageCallback": fn(*const c_void, *const c_void);
    optional buffer_storage = "glBufferStorage": fn(u32, isize, *const c_void, u32);
    optional clip_control = "glClipControl": fn(u32, u32);
    optional tex_storage_2d = "glTexStorage2D": fn(u32, i32, u32, i32, i32);
}

/// Call a resolved entry point. Evaluates to `None` when it was not loaded.
macro_rules! gl_call {
    ($gl:expr, $f:ident($($arg:expr),* $(,)?)) => {
        match $gl.$f {
            Some(f) => Some(unsafe { f($($arg),*) }),
            None => None,
        }
    };
}

pub(crate) use gl_call;

impl GlFunctions {
    /// Names of the required entry points
    pub fn required() -> impl Iterator<Item = &'static str> {
        ENTRY_POINTS.iter().filter(|e| e.required).map(|e| e.name)
    }

    /// Immutable texture storage is available
    pub fn has_texture_storage(&self) -> bool {
        self.tex_storage_2d.is_some()
    }

    /// Drain the GL error queue, returning the first error
    pub fn check_error(&self) -> Result<(), DeviceError> {
        let mut first = GL_NO_ERROR;
        // bounded: a lost context can report errors forever
        for _ in 0..16 {
            match gl_call!(self, get_error()) {
                Some(GL_NO_ERROR) | None => break,
                Some(err) if first == GL_NO_ERROR => first = err,
                Some(_) => {}
            }
        }

        if first == GL_NO_ERROR {
            Ok(())
        } else {
            Err(DeviceError::Backend(format!("GL error {:#06x}", first)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    #[test]
    fn test_entry_point_table() {
        assert_eq!(ENTRY_POINTS.len(), 20);
        assert_eq!(GlFunctions::required().count(), 15);
        assert!(ENTRY_POINTS.iter().any(|e| e.name == "glTexStorage2D" && !e.required));
    }

    #[test]
    fn test_load_reports_first_missing_required() {
        let err = GlFunctions::load(&NullHost::new()).err();
        assert!(matches!(err, Some(DeviceError::MissingEntryPoint("glGenTextures"))));
    }
}
