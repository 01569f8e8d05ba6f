//! Platform memory helpers for the gsx GS plugin
//!
//! Page-aligned allocations ([`vmalloc`]) and self-aliasing FIFO mappings
//! ([`fifo_alloc`]) used for GS local memory.

pub mod fifo;
pub mod pages;
pub mod valloc;

pub use fifo::{fifo_alloc, fifo_free, FifoBuffer, MAX_REPEAT};
pub use pages::{allocation_granularity, page_size, PageFlags};
pub use valloc::{vmalloc, vmfree, PageBuffer};
