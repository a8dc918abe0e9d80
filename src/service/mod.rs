pub mod ai_client;
pub mod conversation;
pub mod metering;
