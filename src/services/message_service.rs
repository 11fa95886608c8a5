// src/services/message_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ConversationRepository, MessageRepository},
    models::message::{Message, MessagePage, MessageSearchResult, NewMessage, SenderType},
    realtime::RealtimeHub,
    services::sinks::{AuditSink, NotificationSink},
};

const DEFAULT_PAGE_LIMIT: i64 = 30;
const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct MessageService {
    messages: MessageRepository,
    conversations: ConversationRepository,
    realtime: Arc<RealtimeHub>,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
}

impl MessageService {
    pub fn new(
        messages: MessageRepository,
        conversations: ConversationRepository,
        realtime: Arc<RealtimeHub>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            messages,
            conversations,
            realtime,
            notifications,
            audit,
        }
    }

    // =========================================================================
    //  APPEND IDEMPOTENTE
    // =========================================================================

    /// Insere uma mensagem na conversa. Retorna a mensagem e um flag
    /// indicando se a linha foi criada agora (false = entrega repetida do
    /// mesmo external_id; a linha original volta intocada, sem efeitos).
    pub async fn append<'e, A>(
        &self,
        conn: A,
        tenant_id: Uuid,
        input: NewMessage,
    ) -> Result<(Message, bool), AppError>
    where
        A: Acquire<'e, Database = Postgres>,
    {
        let mut tx = conn.begin().await?;

        let conversation = self
            .conversations
            .find_by_id(&mut *tx, tenant_id, input.conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversa".into()))?;

        // Remetente autenticado já considera a própria mensagem lida
        let read_by: Vec<Uuid> = match (input.sender_type, input.sender_id) {
            (SenderType::User, Some(sender)) => vec![sender],
            _ => Vec::new(),
        };

        let inserted = self.messages.insert(&mut *tx, &input, &read_by).await?;

        let Some(message) = inserted else {
            // Entrega duplicada: devolve a linha original, nenhum efeito novo.
            // A busca é escopada: conflito com external_id de outro tenant
            // vira Conflict, nunca a linha alheia.
            tx.commit().await?;
            let external_id = input.external_id.as_deref().unwrap_or_default();
            let existing = self
                .messages
                .find_by_external_id(tenant_id, external_id)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(
                        "externalId já registrado fora do escopo da organização.".into(),
                    )
                })?;
            tracing::debug!(external_id, "entrega repetida suprimida pela idempotência");
            return Ok((existing, false));
        };

        // lastMessageAt sempre; unreadCount e reabertura só para inbound
        let inbound = input.sender_type == SenderType::Contact;
        let conversation = self
            .conversations
            .register_message(&mut *tx, conversation.id, inbound)
            .await?;

        tx.commit().await?;

        self.realtime.broadcast("message:created", &message).await;

        // Notifica o responsável, desde que não seja quem enviou
        if let Some(assignee) = conversation.assigned_to_id {
            if message.sender_id != Some(assignee) {
                self.notifications
                    .notify_new_message(
                        tenant_id,
                        assignee,
                        conversation.id,
                        &truncate(&message.content, 80),
                    )
                    .await;
            }
        }

        Ok((message, true))
    }

    // =========================================================================
    //  PAGINAÇÃO
    // =========================================================================

    /// Página por cursor decrescente de id, entregue em ordem cronológica.
    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        conversation_id: Uuid,
        cursor: Option<i64>,
        limit: Option<i64>,
    ) -> Result<MessagePage, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.conversations
            .find_by_id(executor, tenant_id, conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversa".into()))?;

        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        let rows = self
            .messages
            .fetch_page(conversation_id, cursor, limit + 1)
            .await?;

        Ok(MessagePage::from_rows(rows, limit as usize))
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    /// Marca a conversa como lida pelo usuário. Idempotente: a segunda
    /// chamada seguida retorna 0.
    pub async fn mark_read<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let conversation = self
            .conversations
            .find_by_id(executor, tenant_id, conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversa".into()))?;

        let count = self.messages.mark_read(conversation.id, user_id).await?;
        self.conversations.reset_unread(conversation.id).await?;

        self.realtime
            .broadcast(
                "conversation:read",
                json!({ "conversationId": conversation.id, "userId": user_id, "count": count }),
            )
            .await;

        Ok(count)
    }

    // =========================================================================
    //  EDIÇÃO
    // =========================================================================

    pub async fn edit(
        &self,
        tenant_id: Uuid,
        message_id: i64,
        editor_id: Uuid,
        new_content: &str,
    ) -> Result<Message, AppError> {
        let message = self
            .messages
            .find_by_id_scoped(tenant_id, message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Mensagem".into()))?;

        if message.sender_id != Some(editor_id) {
            return Err(AppError::Forbidden(
                "Só o autor pode editar a mensagem.".into(),
            ));
        }
        if message.deleted_at.is_some() {
            return Err(AppError::Conflict(
                "Mensagem apagada não pode ser editada.".into(),
            ));
        }
        if !message.within_edit_window(Utc::now()) {
            return Err(AppError::EditWindowExpired);
        }

        // O snapshot de original_content é feito no UPDATE, no máximo uma
        // vez; o guard de deleted_at na query cobre um delete concorrente
        // entre o check acima e a escrita
        let updated = self
            .messages
            .apply_edit(message.id, new_content)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Mensagem apagada não pode ser editada.".into())
            })?;

        self.audit
            .record(
                tenant_id,
                "message.edited",
                json!({ "messageId": updated.id, "editorId": editor_id }),
            )
            .await;
        self.realtime.broadcast("message:updated", &updated).await;

        Ok(updated)
    }

    // =========================================================================
    //  SOFT-DELETE
    // =========================================================================

    pub async fn soft_delete(
        &self,
        tenant_id: Uuid,
        message_id: i64,
        requester_id: Uuid,
    ) -> Result<Message, AppError> {
        let message = self
            .messages
            .find_by_id_scoped(tenant_id, message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Mensagem".into()))?;

        if message.sender_id != Some(requester_id) {
            return Err(AppError::Forbidden(
                "Só o autor pode apagar a mensagem.".into(),
            ));
        }

        // Já apagada: no-op idempotente, devolve a linha como está
        if message.deleted_at.is_some() {
            return Ok(message);
        }

        let Some(deleted) = self.messages.apply_soft_delete(message.id).await? else {
            // Delete concorrente chegou primeiro: mesmo no-op idempotente
            return self
                .messages
                .find_by_id_scoped(tenant_id, message.id)
                .await?
                .ok_or_else(|| AppError::NotFound("Mensagem".into()));
        };

        self.audit
            .record(
                tenant_id,
                "message.deleted",
                json!({ "messageId": deleted.id, "requesterId": requester_id }),
            )
            .await;
        self.realtime
            .broadcast(
                "message:deleted",
                json!({ "id": deleted.id, "conversationId": deleted.conversation_id }),
            )
            .await;

        Ok(deleted)
    }

    // =========================================================================
    //  BUSCA
    // =========================================================================

    pub async fn search(
        &self,
        tenant_id: Uuid,
        query: &str,
        conversation_id: Option<Uuid>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<MessageSearchResult, AppError> {
        let limit = limit.unwrap_or(20).clamp(1, MAX_PAGE_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let results = self
            .messages
            .search(tenant_id, query, conversation_id, limit, offset)
            .await?;
        let total = self
            .messages
            .count_search(tenant_id, query, conversation_id)
            .await?;

        Ok(MessageSearchResult { results, total })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ContentType;
    use crate::services::sinks::{TracingAuditSink, TracingNotificationSink};
    use sqlx::PgPool;

    fn service(pool: &PgPool) -> MessageService {
        MessageService::new(
            MessageRepository::new(pool.clone()),
            ConversationRepository::new(pool.clone()),
            Arc::new(RealtimeHub::new()),
            Arc::new(TracingNotificationSink),
            Arc::new(TracingAuditSink),
        )
    }

    async fn seed_conversation(pool: &PgPool, tenant_id: Uuid) -> Uuid {
        let contact_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO contacts (tenant_id, name, phone, normalized_phone)
            VALUES ($1, 'Maria', '+55 (11) 99999-9999', '5511999999999')
            RETURNING id
            "#,
        )
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .unwrap();

        sqlx::query_scalar(
            "INSERT INTO conversations (tenant_id, channel, contact_id) VALUES ($1, 'whatsapp', $2) RETURNING id",
        )
        .bind(tenant_id)
        .bind(contact_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn inbound(conversation_id: Uuid, external_id: &str) -> NewMessage {
        NewMessage {
            conversation_id,
            sender_id: None,
            sender_type: SenderType::Contact,
            content: "oi, quero um orçamento".into(),
            content_type: ContentType::Text,
            attachments: Vec::new(),
            metadata: json!({}),
            mentions: Vec::new(),
            external_id: Some(external_id.into()),
            reply_to_id: None,
        }
    }

    fn outbound(conversation_id: Uuid, sender_id: Uuid) -> NewMessage {
        NewMessage {
            conversation_id,
            sender_id: Some(sender_id),
            sender_type: SenderType::User,
            content: "segue o orçamento".into(),
            content_type: ContentType::Text,
            attachments: Vec::new(),
            metadata: json!({}),
            mentions: Vec::new(),
            external_id: None,
            reply_to_id: None,
        }
    }

    #[sqlx::test]
    async fn reentrega_do_mesmo_external_id_nao_duplica(pool: PgPool) {
        let tenant = Uuid::new_v4();
        let conversation_id = seed_conversation(&pool, tenant).await;
        let svc = service(&pool);

        let (first, created) = svc
            .append(&pool, tenant, inbound(conversation_id, "WAMID.1"))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = svc
            .append(&pool, tenant, inbound(conversation_id, "WAMID.1"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total, 1);

        // unread só subiu na entrega que criou a linha
        let conversation = ConversationRepository::new(pool.clone())
            .find_by_id(&pool, tenant, conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.unread_count, 1);
    }

    #[sqlx::test]
    async fn external_id_de_outro_tenant_nao_vaza(pool: PgPool) {
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let conversation_a = seed_conversation(&pool, tenant_a).await;
        let conversation_b = seed_conversation(&pool, tenant_b).await;
        let svc = service(&pool);

        svc.append(&pool, tenant_a, inbound(conversation_a, "WAMID.X"))
            .await
            .unwrap();

        // Colisão de chave entre tenants: Conflict, nunca a linha do outro
        let err = svc
            .append(&pool, tenant_b, inbound(conversation_b, "WAMID.X"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[sqlx::test]
    async fn unread_e_mark_read_fecham_a_conta(pool: PgPool) {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let conversation_id = seed_conversation(&pool, tenant).await;
        let svc = service(&pool);
        let conversations = ConversationRepository::new(pool.clone());

        svc.append(&pool, tenant, inbound(conversation_id, "WAMID.1"))
            .await
            .unwrap();
        let conversation = conversations
            .find_by_id(&pool, tenant, conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.unread_count, 1);

        // Mensagem do usuário não infla o contador e já nasce lida por ele
        let (sent, _) = svc
            .append(&pool, tenant, outbound(conversation_id, user))
            .await
            .unwrap();
        assert_eq!(sent.read_by, vec![user]);
        let conversation = conversations
            .find_by_id(&pool, tenant, conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.unread_count, 1);

        // Só a mensagem do contato faltava para este usuário
        let count = svc
            .mark_read(&pool, tenant, conversation_id, user)
            .await
            .unwrap();
        assert_eq!(count, 1);
        let conversation = conversations
            .find_by_id(&pool, tenant, conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.unread_count, 0);

        // Idempotente: segunda chamada seguida não marca nada
        let count = svc
            .mark_read(&pool, tenant, conversation_id, user)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    async fn snapshot_de_edicao_e_escrito_uma_unica_vez(pool: PgPool) {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let conversation_id = seed_conversation(&pool, tenant).await;
        let svc = service(&pool);

        let (message, _) = svc
            .append(&pool, tenant, outbound(conversation_id, user))
            .await
            .unwrap();

        let edited = svc
            .edit(tenant, message.id, user, "orçamento revisado")
            .await
            .unwrap();
        assert_eq!(edited.original_content.as_deref(), Some(message.content.as_str()));
        assert!(edited.edited_at.is_some());

        // Segunda edição não sobrescreve o snapshot
        let edited = svc
            .edit(tenant, message.id, user, "orçamento final")
            .await
            .unwrap();
        assert_eq!(edited.content, "orçamento final");
        assert_eq!(edited.original_content.as_deref(), Some(message.content.as_str()));

        // Não-autor continua barrado
        let err = svc
            .edit(tenant, message.id, Uuid::new_v4(), "invasão")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[sqlx::test]
    async fn mensagem_apagada_e_imutavel_mesmo_na_query(pool: PgPool) {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let conversation_id = seed_conversation(&pool, tenant).await;
        let svc = service(&pool);

        let (message, _) = svc
            .append(&pool, tenant, outbound(conversation_id, user))
            .await
            .unwrap();
        let deleted = svc.soft_delete(tenant, message.id, user).await.unwrap();
        assert!(deleted.deleted_at.is_some());

        // O guard fica na própria UPDATE: mesmo pulando os checks do
        // serviço, a linha apagada não é reescrita nem re-marcada
        let repo = MessageRepository::new(pool.clone());
        assert!(repo.apply_edit(message.id, "reescrita").await.unwrap().is_none());
        assert!(repo.apply_soft_delete(message.id).await.unwrap().is_none());

        let err = svc
            .edit(tenant, message.id, user, "reescrita")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Segundo delete: no-op com o mesmo carimbo
        let again = svc.soft_delete(tenant, message.id, user).await.unwrap();
        assert_eq!(again.deleted_at, deleted.deleted_at);
        assert_eq!(again.content, message.content);
    }
}
