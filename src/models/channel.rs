// src/models/channel.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "channel_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Whatsapp,
}

// Ciclo de pareamento/conexão de uma integração.
// As transições são dirigidas exclusivamente por eventos do provedor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    QrPending,
    Connecting,
    Connected,
}

// --- BLOB DO PROVEDOR ---

// Sub-estado de conexão + segredos, persistido como JSONB dentro do
// channel_config. Chaves desconhecidas do provedor são preservadas no flatten.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub connection_status: ConnectionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,

    // Segredos: write-only na API. Nunca saem em resposta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProviderConfig {
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Novo código de pareamento emitido: volta (ou permanece) em qr_pending.
    pub fn apply_qr_code(&mut self, code: Option<String>) {
        self.connection_status = ConnectionStatus::QrPending;
        self.qr_code = code;
    }

    /// Conexão completada pelo provedor: limpa o código e carimba o instante.
    pub fn mark_connected(&mut self, now: DateTime<Utc>) {
        self.connection_status = ConnectionStatus::Connected;
        self.qr_code = None;
        self.last_connected_at = Some(now);
    }

    pub fn mark_disconnected(&mut self) {
        self.connection_status = ConnectionStatus::Disconnected;
    }

    pub fn mark_connecting(&mut self) {
        self.connection_status = ConnectionStatus::Connecting;
    }
}

/// Merge de atualização parcial preservando segredos: um segredo vazio ou
/// ausente no patch mantém o valor já armazenado. Invariante testada direto.
pub fn merge_provider_config(existing: &ProviderConfig, patch: ProviderConfig) -> ProviderConfig {
    let password = match patch.password {
        Some(p) if !p.is_empty() => Some(p),
        _ => existing.password.clone(),
    };
    let access_token = match patch.access_token {
        Some(t) if !t.is_empty() => Some(t),
        _ => existing.access_token.clone(),
    };

    // O sub-estado de conexão pertence à máquina de estados, não ao caller:
    // um PATCH do cliente nunca muda status/qrCode/lastConnectedAt.
    let mut extra = existing.extra.clone();
    for (key, value) in patch.extra {
        extra.insert(key, value);
    }

    ProviderConfig {
        connection_status: existing.connection_status,
        qr_code: existing.qr_code.clone(),
        last_connected_at: existing.last_connected_at,
        password,
        access_token,
        extra,
    }
}

// --- CONFIG DE CANAL ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    pub id: Uuid,
    pub tenant_id: Uuid,

    pub channel_type: ChannelType,
    pub name: String,
    pub is_active: bool,

    // Blob cru (com segredos). Jamais serializar direto para o cliente:
    // todo caminho de leitura passa por `redacted()`.
    pub provider_config: Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Visão segura de uma ChannelConfig: segredos viram flags booleanas.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfigView {
    pub id: Uuid,
    pub channel_type: ChannelType,
    #[schema(example = "WhatsApp Vendas")]
    pub name: String,
    pub is_active: bool,

    pub connection_status: ConnectionStatus,
    pub qr_code: Option<String>,
    pub last_connected_at: Option<DateTime<Utc>>,

    pub has_password: bool,
    pub has_access_token: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelConfig {
    pub fn provider(&self) -> ProviderConfig {
        ProviderConfig::from_value(&self.provider_config)
    }

    pub fn redacted(&self) -> ChannelConfigView {
        let provider = self.provider();
        ChannelConfigView {
            id: self.id,
            channel_type: self.channel_type,
            name: self.name.clone(),
            is_active: self.is_active,
            connection_status: provider.connection_status,
            qr_code: provider.qr_code,
            last_connected_at: provider.last_connected_at,
            has_password: provider.password.is_some(),
            has_access_token: provider.access_token.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn qr_code_leva_a_qr_pending() {
        let mut cfg = ProviderConfig::default();
        assert_eq!(cfg.connection_status, ConnectionStatus::Disconnected);

        cfg.apply_qr_code(Some("codigo-1".into()));
        assert_eq!(cfg.connection_status, ConnectionStatus::QrPending);
        assert_eq!(cfg.qr_code.as_deref(), Some("codigo-1"));

        // Novo código antes de conectar: permanece em qr_pending, troca o código
        cfg.apply_qr_code(Some("codigo-2".into()));
        assert_eq!(cfg.connection_status, ConnectionStatus::QrPending);
        assert_eq!(cfg.qr_code.as_deref(), Some("codigo-2"));
    }

    #[test]
    fn conectar_limpa_codigo_e_carimba_instante() {
        let mut cfg = ProviderConfig::default();
        cfg.apply_qr_code(Some("codigo".into()));

        let now = Utc::now();
        cfg.mark_connected(now);

        assert_eq!(cfg.connection_status, ConnectionStatus::Connected);
        assert_eq!(cfg.qr_code, None);
        assert_eq!(cfg.last_connected_at, Some(now));
    }

    #[test]
    fn close_do_provedor_desconecta() {
        let mut cfg = ProviderConfig::default();
        cfg.mark_connected(Utc::now());

        cfg.mark_disconnected();
        assert_eq!(cfg.connection_status, ConnectionStatus::Disconnected);
        // lastConnectedAt permanece como histórico
        assert!(cfg.last_connected_at.is_some());
    }

    #[test]
    fn merge_preserva_segredo_ausente_ou_vazio() {
        let existing = ProviderConfig {
            password: Some("segredo".into()),
            access_token: Some("token-antigo".into()),
            ..Default::default()
        };

        // Patch sem password e com accessToken vazio: ambos preservados
        let patch = ProviderConfig {
            access_token: Some(String::new()),
            ..Default::default()
        };
        let merged = merge_provider_config(&existing, patch);
        assert_eq!(merged.password.as_deref(), Some("segredo"));
        assert_eq!(merged.access_token.as_deref(), Some("token-antigo"));

        // Patch com valor novo: substitui
        let patch = ProviderConfig {
            password: Some("novo-segredo".into()),
            ..Default::default()
        };
        let merged = merge_provider_config(&existing, patch);
        assert_eq!(merged.password.as_deref(), Some("novo-segredo"));
    }

    #[test]
    fn merge_nao_deixa_cliente_mexer_no_estado_de_conexao() {
        let mut existing = ProviderConfig::default();
        existing.apply_qr_code(Some("codigo".into()));

        let patch = ProviderConfig {
            connection_status: ConnectionStatus::Connected,
            qr_code: None,
            ..Default::default()
        };
        let merged = merge_provider_config(&existing, patch);
        assert_eq!(merged.connection_status, ConnectionStatus::QrPending);
        assert_eq!(merged.qr_code.as_deref(), Some("codigo"));
    }

    #[test]
    fn redacao_troca_segredos_por_flags() {
        let cfg = ChannelConfig {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            channel_type: ChannelType::Whatsapp,
            name: "WhatsApp Vendas".into(),
            is_active: true,
            provider_config: json!({
                "connectionStatus": "connected",
                "password": "super-secreto",
                "instanceName": "vendas01"
            }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let view = cfg.redacted();
        assert_eq!(view.connection_status, ConnectionStatus::Connected);
        assert!(view.has_password);
        assert!(!view.has_access_token);

        // Nenhum segredo cru pode vazar na serialização da view
        let as_json = serde_json::to_string(&view).unwrap();
        assert!(!as_json.contains("super-secreto"));
    }

    #[test]
    fn blob_preserva_chaves_desconhecidas_do_provedor() {
        let value = json!({
            "connectionStatus": "qr_pending",
            "qrCode": "abc",
            "instanceName": "vendas01",
            "webhookByEvents": true
        });
        let cfg = ProviderConfig::from_value(&value);
        let roundtrip = cfg.to_value();
        assert_eq!(roundtrip.get("instanceName"), Some(&json!("vendas01")));
        assert_eq!(roundtrip.get("webhookByEvents"), Some(&json!(true)));
    }
}
