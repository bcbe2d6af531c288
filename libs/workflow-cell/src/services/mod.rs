pub mod notifications;
pub mod workflow;

pub use notifications::NotificationCenter;
pub use workflow::Workflow;
