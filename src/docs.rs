// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Conversas ---
        handlers::conversations::list_conversations,
        handlers::conversations::list_messages,
        handlers::conversations::send_message,
        handlers::conversations::mark_read,

        // --- Mensagens ---
        handlers::messages::edit_message,
        handlers::messages::delete_message,
        handlers::messages::search_messages,

        // --- Canais ---
        handlers::channels::list_channel_configs,
        handlers::channels::get_channel_config,
        handlers::channels::create_channel_config,
        handlers::channels::update_channel_config,
        handlers::channels::delete_channel_config,

        // --- Webhooks ---
        handlers::webhooks::receive_webhook,
    ),
    components(
        schemas(
            // --- Conversas ---
            models::conversation::Channel,
            models::conversation::ConversationStatus,
            models::conversation::Conversation,

            // --- Mensagens ---
            models::message::SenderType,
            models::message::ContentType,
            models::message::Attachment,
            models::message::Message,
            models::message::MessagePage,
            models::message::MessageSearchResult,

            // --- Contatos ---
            models::contact::Contact,

            // --- Canais ---
            models::channel::ChannelType,
            models::channel::ConnectionStatus,
            models::channel::ChannelConfigView,

            // --- Webhooks ---
            models::webhook::WebhookEnvelope,
            handlers::webhooks::WebhookAck,

            // --- Payloads ---
            handlers::conversations::SendMessagePayload,
            handlers::messages::EditMessagePayload,
            handlers::channels::CreateChannelConfigPayload,
            handlers::channels::UpdateChannelConfigPayload,
        )
    ),
    tags(
        (name = "Conversas", description = "Conversas omnichannel e mensagens"),
        (name = "Mensagens", description = "Edição, remoção e busca de mensagens"),
        (name = "Canais", description = "Integrações de canal e estado de conexão"),
        (name = "Webhooks", description = "Ingestão de eventos do gateway de chat")
    )
)]
pub struct ApiDoc;
