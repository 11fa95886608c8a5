// src/db/channel_repo.rs

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::channel::{ChannelConfig, ChannelType},
};

#[derive(Clone)]
pub struct ChannelRepository {
    pool: PgPool,
}

impl ChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<ChannelConfig>, AppError> {
        let configs = sqlx::query_as::<_, ChannelConfig>(
            "SELECT * FROM channel_configs WHERE tenant_id = $1 ORDER BY created_at ASC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(configs)
    }

    pub async fn find(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ChannelConfig>, AppError> {
        let config = sqlx::query_as::<_, ChannelConfig>(
            "SELECT * FROM channel_configs WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    /// Sem escopo de tenant: o webhook chega só com o id da config e o
    /// tenant é derivado da própria linha.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ChannelConfig>, AppError> {
        let config =
            sqlx::query_as::<_, ChannelConfig>("SELECT * FROM channel_configs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(config)
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        channel_type: ChannelType,
        name: &str,
        provider_config: &Value,
    ) -> Result<ChannelConfig, AppError> {
        let config = sqlx::query_as::<_, ChannelConfig>(
            r#"
            INSERT INTO channel_configs (tenant_id, channel_type, name, provider_config)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(channel_type)
        .bind(name)
        .bind(provider_config)
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }

    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        name: Option<&str>,
        is_active: Option<bool>,
        provider_config: &Value,
    ) -> Result<ChannelConfig, AppError> {
        let config = sqlx::query_as::<_, ChannelConfig>(
            r#"
            UPDATE channel_configs SET
                name = COALESCE($3, name),
                is_active = COALESCE($4, is_active),
                provider_config = $5,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(name)
        .bind(is_active)
        .bind(provider_config)
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }

    /// Persistência do sub-estado de conexão, escrita pela máquina de
    /// estados (single-writer por config: uma sessão de provedor por vez).
    pub async fn update_provider_config(
        &self,
        id: Uuid,
        provider_config: &Value,
    ) -> Result<ChannelConfig, AppError> {
        let config = sqlx::query_as::<_, ChannelConfig>(
            r#"
            UPDATE channel_configs SET provider_config = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider_config)
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM channel_configs WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
