//! GS emulation core for the gsx plugin
//!
//! [`state::GsState`] consumes GIF packets and image transfers against local
//! memory. A [`renderer::Renderer`] owns that state plus one
//! [`backend::Device`] it presents through; devices reach the emulator's
//! graphics context only through [`host::HostRenderContext`].

pub mod backend;
pub mod crc;
pub mod freeze;
pub mod gif;
pub mod host;
pub mod local_memory;
pub mod offscreen;
pub mod regs;
pub mod renderer;
pub mod state;
pub mod transfer;

pub use backend::{Device, DeviceKind, Frame};
pub use freeze::FreezeData;
pub use gif::GifPath;
pub use host::{D3d11Context, HostRenderContext, HwContextType, NullHost};
pub use renderer::{HardwareRenderer, NullRenderer, Renderer, RendererType, SoftwareRenderer};
pub use state::GsState;
