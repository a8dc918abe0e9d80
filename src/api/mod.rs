pub mod ai;
pub mod attendance;
pub mod message;
pub mod task;
pub mod user;
