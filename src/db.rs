pub mod channel_repo;
pub use channel_repo::ChannelRepository;
pub mod contact_repo;
pub use contact_repo::ContactRepository;
pub mod conversation_repo;
pub use conversation_repo::ConversationRepository;
pub mod message_repo;
pub use message_repo::MessageRepository;
