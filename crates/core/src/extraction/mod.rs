pub mod extraction_coordinator;
pub mod extraction_report;
pub mod worker_count;
