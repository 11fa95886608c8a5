// src/models/contact.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// Superfície mínima do contato consumida pelo motor de conversas.
// O CRUD completo de contatos/empresas vive fora deste núcleo.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[schema(example = "Maria da Silva")]
    pub name: String,

    // Como o contato digitou/o provedor enviou
    #[schema(example = "+55 (11) 99999-9999")]
    pub phone: Option<String>,

    // Apenas dígitos; campo de matching. NULL em linhas legadas,
    // preenchido preguiçosamente pelo resolver.
    #[schema(example = "5511999999999")]
    pub normalized_phone: Option<String>,

    #[schema(example = "maria@email.com")]
    pub email: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
