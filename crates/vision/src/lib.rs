//! External vision analysis of screenshot pairs.
//!
//! The classifier escalates through fixed resolution tiers, spending
//! one rate-limiter token per external call, and parses the model's
//! structured reply into change regions. Parsing never fails hard: a
//! malformed reply degrades to an empty change list with the raw text
//! preserved, so the pipeline can always fall back to pixel evidence.

pub mod classifier;
pub mod errors;
pub mod model;
pub mod parse;
pub mod prompt;

pub use classifier::{ResolutionTier, VisionAnalysis, VisionClassifier};
pub use errors::VisionError;
pub use model::{EncodedImage, HttpVisionConfig, HttpVisionModel, VisionModel};
