pub mod assignment_service;
pub mod grading_service;
pub mod notifier;

pub use assignment_service::AssignmentService;
pub use grading_service::GradingService;
pub use notifier::{LogNotifier, Notifier};
