//! Wire-level shapes exchanged with the detection, settings and history services.

pub mod history;
pub mod observation;
pub mod settings;
pub mod value;

pub use history::{HistoryResponse, HistoryStatistics, HistorySummary};
pub use observation::DetectionObservation;
pub use settings::{SettingsResponse, SettingsUpdate};
pub use value::unit_fraction;
