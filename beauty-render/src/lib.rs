//! Beauty Render - render thread and effect engine plumbing
//!
//! Everything that touches the graphics context lives here.
//!
//! Key points:
//! - One dedicated render thread per pipeline, created on first use
//! - Graphics context confined to that thread, disposed by a drop guard
//! - Pre-start work parked in a bounded queue and replayed in order
//! - Vendor engines hidden behind the `EffectEngine` capability

pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod transform;

pub use context::*;
pub use dispatcher::*;
pub use engine::*;
pub use error::*;
pub use transform::*;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
