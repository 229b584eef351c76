pub mod controller;

pub use controller::{CommitOutcome, ThresholdController, ThresholdSnapshot, DEFAULT_DEBOUNCE};
