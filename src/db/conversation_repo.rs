// src/db/conversation_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::conversation::{Channel, Conversation, ConversationStatus},
};

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Busca escopada por tenant. Recebe executor para poder participar
    /// da transação do append.
    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Conversation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(conversation)
    }

    /// Conversa mais recentemente ativa do contato naquele canal.
    /// Nunca cria; o find-or-create é decisão do serviço.
    pub async fn find_latest_for_contact(
        &self,
        tenant_id: Uuid,
        contact_id: Uuid,
        channel: Channel,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE tenant_id = $1 AND contact_id = $2 AND channel = $3
            ORDER BY last_message_at DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(contact_id)
        .bind(channel)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        status: Option<ConversationStatus>,
        channel: Option<Channel>,
    ) -> Result<Vec<Conversation>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE tenant_id = $1
              AND ($2::conversation_status IS NULL OR status = $2)
              AND ($3::conversation_channel IS NULL OR channel = $3)
            ORDER BY last_message_at DESC NULLS LAST
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(channel)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        channel: Channel,
        contact_id: Option<Uuid>,
        subject: Option<&str>,
    ) -> Result<Conversation, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (tenant_id, channel, contact_id, subject)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(channel)
        .bind(contact_id)
        .bind(subject)
        .fetch_one(&self.pool)
        .await?;

        Ok(conversation)
    }

    /// Efeitos de um append na conversa, numa única UPDATE:
    /// - lastMessageAt sempre atualizado;
    /// - unreadCount só cresce para mensagem de contato (inbound);
    /// - conversa fechada reabre ao receber inbound.
    pub async fn register_message<'e, E>(
        &self,
        executor: E,
        conversation_id: Uuid,
        inbound: bool,
    ) -> Result<Conversation, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations SET
                last_message_at = NOW(),
                updated_at = NOW(),
                unread_count = unread_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                status = CASE WHEN $2 AND status = 'closed' THEN 'open'::conversation_status ELSE status END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(conversation_id)
        .bind(inbound)
        .fetch_one(executor)
        .await?;

        Ok(conversation)
    }

    pub async fn reset_unread(&self, conversation_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE conversations SET unread_count = 0, updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
