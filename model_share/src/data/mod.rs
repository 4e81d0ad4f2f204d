//! Concrete shareable model types
//!
//! The trained-model structures the evaluation framework actually moves
//! between processes. Each implements [`crate::model::Shareable`]: small
//! structure in the skeleton, large payloads out of band, with the payloads
//! elided from the skeleton only while a sharing scope is active so durable
//! serialization stays self-contained.

pub mod features;
pub mod matrix;

pub use features::FeatureTable;
pub use matrix::ScoreMatrix;
