//! Detection result normalization and confidence classification for ToolTrack.
//!
//! Every screen that shows detection output goes through this crate: raw server
//! payloads are reshaped by the [`normalizer::ShapeNormalizer`], reduced and
//! classified by the [`normalizer::ClassClassifier`], and the recognition cutoff is
//! owned by the [`threshold::ThresholdController`].

pub mod math;
pub mod normalizer;
pub mod prelude;
pub mod records;
pub mod registry;
pub mod telemetry;
pub mod threshold;
pub mod wire;

pub use normalizer::{ClassClassifier, NormalizedPayload, OperationResult, ShapeNormalizer};
pub use prelude::{SettingsService, Threshold, ThresholdCommitError, TransportError};
pub use threshold::ThresholdController;
