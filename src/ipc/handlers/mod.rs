pub mod assignments;
pub mod backup;
pub mod calendar;
pub mod classes;
pub mod core;
pub mod metrics;
pub mod records;
