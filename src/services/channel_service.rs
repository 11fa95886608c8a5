// src/services/channel_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ChannelRepository,
    models::channel::{
        merge_provider_config, ChannelConfig, ChannelConfigView, ChannelType, ProviderConfig,
    },
    models::webhook::ProviderConnectionState,
    realtime::RealtimeHub,
};

#[derive(Clone)]
pub struct ChannelService {
    channels: ChannelRepository,
    realtime: Arc<RealtimeHub>,
}

impl ChannelService {
    pub fn new(channels: ChannelRepository, realtime: Arc<RealtimeHub>) -> Self {
        Self { channels, realtime }
    }

    // =========================================================================
    //  CRUD (tudo que sai passa por redação de segredos)
    // =========================================================================

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<ChannelConfigView>, AppError> {
        let configs = self.channels.list(tenant_id).await?;
        Ok(configs.iter().map(ChannelConfig::redacted).collect())
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<ChannelConfigView, AppError> {
        let config = self
            .channels
            .find(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Configuração de canal".into()))?;
        Ok(config.redacted())
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        channel_type: ChannelType,
        name: &str,
        provider_config: Option<Value>,
    ) -> Result<ChannelConfigView, AppError> {
        // Na criação o blob entra como veio (segredos inclusos); o estado
        // de conexão começa zerado de qualquer forma.
        let provider = provider_config
            .as_ref()
            .map(ProviderConfig::from_value)
            .unwrap_or_default();

        let config = self
            .channels
            .create(tenant_id, channel_type, name, &provider.to_value())
            .await?;
        Ok(config.redacted())
    }

    /// Atualização parcial. Segredo vazio/ausente no patch preserva o que
    /// já está armazenado; o sub-estado de conexão nunca é tocado por aqui.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        name: Option<&str>,
        is_active: Option<bool>,
        provider_patch: Option<Value>,
    ) -> Result<ChannelConfigView, AppError> {
        let existing = self
            .channels
            .find(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Configuração de canal".into()))?;

        let merged = match provider_patch {
            Some(patch) => {
                let patch = ProviderConfig::from_value(&patch);
                merge_provider_config(&existing.provider(), patch)
            }
            None => existing.provider(),
        };

        let config = self
            .channels
            .update(tenant_id, id, name, is_active, &merged.to_value())
            .await?;
        Ok(config.redacted())
    }

    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let removed = self.channels.delete(tenant_id, id).await?;
        if removed == 0 {
            return Err(AppError::NotFound("Configuração de canal".into()));
        }
        Ok(())
    }

    // =========================================================================
    //  MÁQUINA DE ESTADOS DE CONEXÃO
    // =========================================================================
    //  Dirigida só por eventos do provedor; o cliente nunca muda o estado
    //  diretamente. Single-writer por config (uma sessão de provedor).

    pub async fn apply_qr_code(
        &self,
        config: &ChannelConfig,
        code: Option<String>,
    ) -> Result<(), AppError> {
        let mut provider = config.provider();
        provider.apply_qr_code(code);
        self.persist_and_broadcast(config.id, provider).await
    }

    pub async fn apply_connection_update(
        &self,
        config: &ChannelConfig,
        state: ProviderConnectionState,
    ) -> Result<(), AppError> {
        let mut provider = config.provider();
        match state {
            ProviderConnectionState::Open => provider.mark_connected(Utc::now()),
            ProviderConnectionState::Close => provider.mark_disconnected(),
            ProviderConnectionState::Connecting => provider.mark_connecting(),
            ProviderConnectionState::Unknown => {
                // Estado futuro do provedor: aceito e ignorado
                tracing::warn!(config_id = %config.id, "estado de conexão desconhecido ignorado");
                return Ok(());
            }
        }
        self.persist_and_broadcast(config.id, provider).await
    }

    async fn persist_and_broadcast(
        &self,
        config_id: Uuid,
        provider: ProviderConfig,
    ) -> Result<(), AppError> {
        let updated = self
            .channels
            .update_provider_config(config_id, &provider.to_value())
            .await?;

        tracing::info!(
            config_id = %updated.id,
            status = ?provider.connection_status,
            "estado de conexão do canal atualizado"
        );
        self.realtime
            .broadcast("channel:connection", updated.redacted())
            .await;

        Ok(())
    }
}
