pub mod grading;
pub mod notify;
pub mod reports;
pub mod review;
pub mod scoring;
pub mod training;
