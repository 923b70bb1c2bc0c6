//! Texture channel remap/pack engine.
//!
//! - [`remap`] — channel remap descriptors and their signed wire encoding
//! - [`sample`] — pixel decode and UV sampling
//! - [`pack`] — the rasterizer fusing contributors into packed images,
//!   with a per-run cache in [`pack::PackContext`]

pub mod pack;
pub mod remap;
pub mod sample;

pub use pack::{PackContext, PackedImage};
pub use remap::{ChannelRemap, ChannelSelect, PackKey, REMAP_ONES, REMAP_ZEROS};
pub use sample::ImagePlane;
