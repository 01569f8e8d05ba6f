//! Plugin lifecycle for the gsx GS plugin
//!
//! [`GsPlugin`] is the one object the host talks to: it picks a renderer
//! variant, builds the matching device through [`factory`], and forwards
//! GIF transfers, vsyncs and save states to the live renderer.

pub mod factory;
pub mod plugin;

pub use factory::{make_device, make_renderer};
pub use plugin::{FreezeMode, GsPlugin};
