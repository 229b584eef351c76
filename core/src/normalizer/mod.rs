//! Reshaping and classification of detection payloads.

pub mod classifier;
pub mod export;
pub mod locator;
pub mod operation;
pub mod shape;

pub use classifier::{
    ClassClassifier, ClassifiedFinding, ImageVerdict, LegendEntry, OperationStatus, ReducedFindings,
    ToolStatus,
};
pub use export::export_operation;
pub use locator::{ApiBase, ApiBaseError};
pub use operation::{
    ImageResult, NormalizedPayload, OperationResult, OperationSummary, PayloadShape, ToolFinding,
};
pub use shape::ShapeNormalizer;
