//! Employees, tool sets and the issue/return ledger built on classified images.

pub mod entities;
pub mod ledger;
pub mod repository;

pub use entities::{
    Employee, EmployeeDraft, IssuanceRecord, IssuanceStatus, IssuedTool, ToolSet, ToolSetDraft,
};
pub use ledger::IssuanceLedger;
pub use repository::{Draft, InMemoryRepository, Record, Repository};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("{field} must not be blank")]
    Blank { field: &'static str },
    #[error("tool set needs at least one tool")]
    EmptyToolSet,
    #[error("no {kind} with id {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("record {id} is {status}, cannot {action}")]
    InvalidTransition {
        id: String,
        status: IssuanceStatus,
        action: &'static str,
    },
    #[error("image failed to process: {0}")]
    FailedImage(String),
}
