pub mod report;
pub mod scheduler;

pub use report::ReportBuilder;
pub use scheduler::Scheduler;
