//! Deterministic pixel-level screenshot comparison.
//!
//! Everything in this crate is pure computation over decoded image
//! bytes: absolute per-channel differencing reduced to an intensity
//! mask, connected-component region extraction, and heatmap
//! rendering. Given identical inputs and configuration the output is
//! identical, which is what makes comparison results cacheable by
//! content hash.

pub mod compare;
pub mod errors;
pub mod heatmap;
pub mod regions;

pub use compare::PixelComparator;
pub use errors::DiffError;
pub use heatmap::HeatmapPalette;
