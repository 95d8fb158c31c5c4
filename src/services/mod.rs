pub mod catalog;
pub mod completion;
pub mod coordinator;
pub mod interaction_log;
pub mod mastery;
pub mod parameters;
pub mod progress;
pub mod random;
pub mod reports;
pub mod selector;
pub mod tutor;
