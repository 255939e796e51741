mod conversation_repo;
mod database;
mod message_repo;
mod store;

#[cfg(test)]
mod tests;

pub use conversation_repo::ConversationRepo;
pub use database::Database;
pub use message_repo::MessageRepo;
