pub mod config;
pub mod conversation;
pub mod error;
pub mod estimate;
pub mod inference;
pub mod message;
pub mod store;
