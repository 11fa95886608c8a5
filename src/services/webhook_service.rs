// src/services/webhook_service.rs

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ChannelRepository,
    models::channel::ChannelConfig,
    models::conversation::Channel,
    models::message::{NewMessage, SenderType},
    models::webhook::{
        extract_content, phone_from_jid, ProviderEvent, ProviderMessage, WebhookEnvelope,
    },
    services::{ChannelService, MessageService, ResolverService},
};

// Normalizador/dispatcher de webhooks: decodifica o envelope do provedor
// num evento tipado e roteia para o handler certo.
#[derive(Clone)]
pub struct WebhookService {
    channels: ChannelRepository,
    resolver: ResolverService,
    messages: MessageService,
    channel_service: ChannelService,
}

impl WebhookService {
    pub fn new(
        channels: ChannelRepository,
        resolver: ResolverService,
        messages: MessageService,
        channel_service: ChannelService,
    ) -> Self {
        Self {
            channels,
            resolver,
            messages,
            channel_service,
        }
    }

    /// Ponto de entrada do webhook. O tenant vem da própria config de
    /// canal (o provedor só conhece o id da config).
    pub async fn handle(
        &self,
        pool: &PgPool,
        channel_config_id: Uuid,
        envelope: WebhookEnvelope,
    ) -> Result<(), AppError> {
        let config = self
            .channels
            .find_by_id(channel_config_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Configuração de canal".into()))?;

        if !config.is_active {
            // Ack sem processar: provedor não deve ficar re-tentando
            tracing::warn!(config_id = %config.id, "webhook em config inativa ignorado");
            return Ok(());
        }

        match ProviderEvent::decode(&envelope)? {
            ProviderEvent::MessagesUpsert(messages) => {
                self.handle_messages_upsert(pool, &config, &envelope, messages)
                    .await
            }
            ProviderEvent::ConnectionUpdate(state) => {
                // Transição de estado jamais falha o ack do webhook
                if let Err(e) = self
                    .channel_service
                    .apply_connection_update(&config, state)
                    .await
                {
                    tracing::error!(config_id = %config.id, "falha na transição de conexão: {}", e);
                }
                Ok(())
            }
            ProviderEvent::QrcodeUpdated(code) => {
                if let Err(e) = self.channel_service.apply_qr_code(&config, code).await {
                    tracing::error!(config_id = %config.id, "falha ao registrar QR code: {}", e);
                }
                Ok(())
            }
            ProviderEvent::Unknown(event_type) => {
                // Compatibilidade futura: aceita e ignora, sem erro
                tracing::info!(
                    config_id = %config.id,
                    instance = envelope.instance.as_deref().unwrap_or("-"),
                    "evento de provedor desconhecido ignorado: {}",
                    event_type
                );
                Ok(())
            }
        }
    }

    /// Cada mensagem do lote é independente: falha em uma é logada com
    /// contexto e não derruba as demais.
    async fn handle_messages_upsert(
        &self,
        pool: &PgPool,
        config: &ChannelConfig,
        envelope: &WebhookEnvelope,
        messages: Vec<ProviderMessage>,
    ) -> Result<(), AppError> {
        for provider_message in messages {
            if let Err(e) = self
                .process_inbound(pool, config, envelope, &provider_message)
                .await
            {
                let preview = provider_message
                    .message
                    .as_ref()
                    .map(|m| truncate_json(m, 120))
                    .unwrap_or_default();
                tracing::error!(
                    event = %envelope.event,
                    instance = envelope.instance.as_deref().unwrap_or("-"),
                    provider_message_id = %provider_message.key.id,
                    content = %preview,
                    "falha ao processar mensagem inbound: {}",
                    e
                );
            }
        }
        Ok(())
    }

    async fn process_inbound(
        &self,
        pool: &PgPool,
        config: &ChannelConfig,
        envelope: &WebhookEnvelope,
        provider_message: &ProviderMessage,
    ) -> Result<(), AppError> {
        // Eco do nosso próprio envio: já registramos no caminho REST
        if provider_message.key.from_me {
            return Ok(());
        }

        let phone = phone_from_jid(&provider_message.key.remote_jid).ok_or_else(|| {
            AppError::InvalidPayload(format!(
                "remoteJid sem identidade de telefone: {}",
                provider_message.key.remote_jid
            ))
        })?;

        let Some(payload) = provider_message.message.as_ref() else {
            tracing::debug!(
                provider_message_id = %provider_message.key.id,
                "mensagem sem payload, descartada"
            );
            return Ok(());
        };
        let Some(extracted) = extract_content(payload) else {
            tracing::debug!(
                provider_message_id = %provider_message.key.id,
                "mensagem sem conteúdo renderizável, descartada"
            );
            return Ok(());
        };

        let contact = self
            .resolver
            .find_or_create_contact_by_phone(
                config.tenant_id,
                &phone,
                provider_message.push_name.as_deref(),
            )
            .await?;

        let conversation = self
            .resolver
            .find_or_create_conversation(config.tenant_id, contact.id, Channel::Whatsapp)
            .await?;

        let input = NewMessage {
            conversation_id: conversation.id,
            sender_id: None,
            sender_type: SenderType::Contact,
            content: extracted.content,
            content_type: extracted.content_type,
            attachments: extracted.attachments,
            metadata: json!({
                "remoteJid": provider_message.key.remote_jid,
                "pushName": provider_message.push_name,
                "instance": envelope.instance,
                "channelConfigId": config.id,
            }),
            mentions: Vec::new(),
            external_id: Some(provider_message.key.id.clone()),
            reply_to_id: None,
        };

        let (_, created) = self.messages.append(pool, config.tenant_id, input).await?;
        if !created {
            tracing::debug!(
                provider_message_id = %provider_message.key.id,
                "reentrega do provedor suprimida pela idempotência"
            );
        }

        Ok(())
    }
}

fn truncate_json(value: &serde_json::Value, max_chars: usize) -> String {
    let s = value.to_string();
    if s.chars().count() <= max_chars {
        s
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ContactRepository, ConversationRepository, MessageRepository};
    use crate::realtime::RealtimeHub;
    use crate::services::sinks::{TracingAuditSink, TracingNotificationSink};
    use std::sync::Arc;

    fn webhook_service(pool: &PgPool) -> WebhookService {
        let realtime = Arc::new(RealtimeHub::new());
        let channel_repo = ChannelRepository::new(pool.clone());
        let resolver = ResolverService::new(
            ContactRepository::new(pool.clone()),
            ConversationRepository::new(pool.clone()),
        );
        let messages = MessageService::new(
            MessageRepository::new(pool.clone()),
            ConversationRepository::new(pool.clone()),
            realtime.clone(),
            Arc::new(TracingNotificationSink),
            Arc::new(TracingAuditSink),
        );
        let channel_service = ChannelService::new(channel_repo.clone(), realtime);
        WebhookService::new(channel_repo, resolver, messages, channel_service)
    }

    async fn seed_config(pool: &PgPool, tenant_id: Uuid) -> Uuid {
        sqlx::query_scalar(
            r#"
            INSERT INTO channel_configs (tenant_id, channel_type, name)
            VALUES ($1, 'whatsapp', 'WhatsApp Vendas')
            RETURNING id
            "#,
        )
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn upsert_envelope(provider_message_id: &str) -> WebhookEnvelope {
        WebhookEnvelope {
            event: "messages.upsert".into(),
            instance: Some("vendas01".into()),
            data: json!([{
                "key": {
                    "remoteJid": "5511999999999@s.whatsapp.net",
                    "fromMe": false,
                    "id": provider_message_id
                },
                "pushName": "Maria",
                "message": { "conversation": "oi, quero um orçamento" }
            }]),
        }
    }

    #[sqlx::test]
    async fn upsert_cria_contato_conversa_e_mensagem_uma_unica_vez(pool: PgPool) {
        let tenant = Uuid::new_v4();
        let config_id = seed_config(&pool, tenant).await;
        let svc = webhook_service(&pool);

        svc.handle(&pool, config_id, upsert_envelope("WAMID.42"))
            .await
            .unwrap();

        let contacts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE tenant_id = $1")
                .bind(tenant)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(contacts, 1);

        let conversations = ConversationRepository::new(pool.clone())
            .list(tenant, None, None)
            .await
            .unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].channel, Channel::Whatsapp);
        assert_eq!(conversations[0].unread_count, 1);

        let (content, external_id): (String, Option<String>) = sqlx::query_as(
            "SELECT content, external_id FROM messages WHERE conversation_id = $1",
        )
        .bind(conversations[0].id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(content, "oi, quero um orçamento");
        assert_eq!(external_id.as_deref(), Some("WAMID.42"));

        // Reentrega idêntica do provedor: nenhum contato ou mensagem a mais
        svc.handle(&pool, config_id, upsert_envelope("WAMID.42"))
            .await
            .unwrap();

        let contacts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE tenant_id = $1")
                .bind(tenant)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(contacts, 1);
        let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(messages, 1);
    }

    #[sqlx::test]
    async fn eco_do_proprio_envio_e_descartado(pool: PgPool) {
        let tenant = Uuid::new_v4();
        let config_id = seed_config(&pool, tenant).await;
        let svc = webhook_service(&pool);

        let envelope = WebhookEnvelope {
            event: "messages.upsert".into(),
            instance: Some("vendas01".into()),
            data: json!([{
                "key": {
                    "remoteJid": "5511999999999@s.whatsapp.net",
                    "fromMe": true,
                    "id": "WAMID.ECO"
                },
                "message": { "conversation": "eco do envio" }
            }]),
        };
        svc.handle(&pool, config_id, envelope).await.unwrap();

        let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(messages, 0);
    }
}
