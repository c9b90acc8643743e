/// Catalogue of demonstration problems integrated by the runner.
pub mod problems;
pub mod report;
pub mod setup;
