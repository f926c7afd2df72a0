//! Domain ports (traits at the seams).

pub mod fleet_control;
pub mod metric_source;
pub mod result_extractor;
pub mod worker;

pub use fleet_control::{FleetControl, FleetError};
pub use metric_source::MetricSource;
pub use result_extractor::{ExtractedChanges, ResultExtractor};
pub use worker::Worker;
