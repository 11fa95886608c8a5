pub mod channel_service;
pub use channel_service::ChannelService;
pub mod message_service;
pub use message_service::MessageService;
pub mod resolver_service;
pub use resolver_service::ResolverService;
pub mod sinks;
pub mod webhook_service;
pub use webhook_service::WebhookService;
