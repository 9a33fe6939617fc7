pub mod sheet;
pub mod template;
pub mod training;
pub mod types;
