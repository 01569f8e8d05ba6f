//! Fixed-width vector types for the gsx GS plugin
//!
//! `GsVector4i`/`GsVector8i` are 16- and 32-byte integer vectors,
//! `GsVector4`/`GsVector8` their float counterparts. The lane-mask tables
//! (`xff`, `x0f`) and the float constants live in one process-wide table set
//! that is built by [`init_vectors`] during plugin startup.

mod float;
mod int;
mod tables;

pub use float::{GsVector4, GsVector8};
pub use int::{GsVector4i, GsVector8i};
pub use tables::{init_vectors, is_initialized};
