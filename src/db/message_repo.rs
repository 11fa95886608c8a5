// src/db/message_repo.rs

use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::message::{Message, NewMessage},
};

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  APPEND (check-and-insert atômico)
    // =========================================================================

    /// Insere a mensagem. O índice único parcial em external_id faz do
    /// ON CONFLICT DO NOTHING o check-and-insert atômico: duas entregas
    /// concorrentes do mesmo external_id nunca geram duas linhas.
    /// Retorna None quando a chave já existia (caller busca a linha original).
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        input: &NewMessage,
        read_by: &[Uuid],
    ) -> Result<Option<Message>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (
                conversation_id, sender_id, sender_type, content, content_type,
                attachments, metadata, mentions, read_by, external_id, reply_to_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (external_id) WHERE external_id IS NOT NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(input.conversation_id)
        .bind(input.sender_id)
        .bind(input.sender_type)
        .bind(&input.content)
        .bind(input.content_type)
        .bind(Json(&input.attachments))
        .bind(&input.metadata)
        .bind(&input.mentions)
        .bind(read_by)
        .bind(&input.external_id)
        .bind(input.reply_to_id)
        .fetch_optional(executor)
        .await?;

        Ok(message)
    }

    /// Resolução da entrega duplicada. O índice único é global, então a
    /// linha original só é devolvida se pertence ao tenant do caller —
    /// external_id de outro tenant nunca vaza por aqui.
    pub async fn find_by_external_id(
        &self,
        tenant_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT m.* FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE m.external_id = $1 AND c.tenant_id = $2
            "#,
        )
        .bind(external_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    /// Busca escopada: a mensagem só existe para quem enxerga a conversa.
    pub async fn find_by_id_scoped(
        &self,
        tenant_id: Uuid,
        message_id: i64,
    ) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT m.* FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE m.id = $1 AND c.tenant_id = $2
            "#,
        )
        .bind(message_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    // =========================================================================
    //  PAGINAÇÃO POR CURSOR
    // =========================================================================

    /// Página crua: `fetch_limit` linhas (o serviço pede limit + 1) com
    /// id < cursor, da mais nova para a mais antiga.
    pub async fn fetch_page(
        &self,
        conversation_id: Uuid,
        cursor: Option<i64>,
        fetch_limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
              AND ($2::bigint IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(cursor)
        .bind(fetch_limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    /// Acrescenta o usuário ao read_by de toda mensagem que ainda não o tem.
    /// Retorna quantas mensagens foram marcadas agora (0 na segunda chamada).
    /// Corrida conhecida e aceita: dois leitores concorrentes na MESMA
    /// mensagem podem perder um append do array; não serializamos isso.
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read_by = array_append(read_by, $2)
            WHERE conversation_id = $1
              AND NOT (read_by @> ARRAY[$2]::uuid[])
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  EDIÇÃO E SOFT-DELETE
    // =========================================================================

    /// Aplica a edição já autorizada pelo serviço. O COALESCE garante o
    /// snapshot único: original_content só é escrito na primeira edição.
    /// O guard de deleted_at na própria UPDATE fecha a janela entre o
    /// check do serviço e a escrita: mensagem apagada nunca é reescrita.
    /// Retorna None quando a linha não está mais editável.
    pub async fn apply_edit(
        &self,
        message_id: i64,
        new_content: &str,
    ) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages SET
                original_content = COALESCE(original_content, content),
                content = $2,
                edited_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(new_content)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    /// None = outra chamada já marcou a linha; o caller trata como no-op.
    pub async fn apply_soft_delete(&self, message_id: i64) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    // =========================================================================
    //  BUSCA FULL-TEXT
    // =========================================================================

    pub async fn search(
        &self,
        tenant_id: Uuid,
        query: &str,
        conversation_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT m.* FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE c.tenant_id = $1
              AND ($2::uuid IS NULL OR m.conversation_id = $2)
              AND m.deleted_at IS NULL
              AND to_tsvector('simple', m.content) @@ plainto_tsquery('simple', $3)
            ORDER BY ts_rank(to_tsvector('simple', m.content), plainto_tsquery('simple', $3)) DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .bind(query)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    pub async fn count_search(
        &self,
        tenant_id: Uuid,
        query: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE c.tenant_id = $1
              AND ($2::uuid IS NULL OR m.conversation_id = $2)
              AND m.deleted_at IS NULL
              AND to_tsvector('simple', m.content) @@ plainto_tsquery('simple', $3)
            "#,
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .bind(query)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
