// src/models/message.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// Janela dentro da qual o remetente ainda pode editar a própria mensagem.
pub const EDIT_WINDOW_MINUTES: i64 = 15;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "sender_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Contact,
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "message_content_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Audio,
    Image,
    File,
    Video,
}

// --- ANEXO ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[schema(example = "orcamento.pdf")]
    pub name: String,
    #[schema(example = "https://storage.example.com/orcamento.pdf")]
    pub url: String,
    #[schema(example = "application/pdf")]
    pub mime_type: String,
}

// --- MENSAGEM ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    // BIGSERIAL: monotônico, serve de cursor de paginação
    pub id: i64,
    pub conversation_id: Uuid,

    // NULL quando a mensagem veio do contato
    pub sender_id: Option<Uuid>,
    pub sender_type: SenderType,

    pub content: String,
    pub content_type: ContentType,

    #[schema(value_type = Vec<Attachment>)]
    pub attachments: Json<Vec<Attachment>>,

    // Mapa opaco do provedor; não interpretado pelo núcleo
    #[schema(value_type = Object)]
    pub metadata: Value,

    pub mentions: Vec<Uuid>,
    pub read_by: Vec<Uuid>,

    // Chave de idempotência (id da mensagem no provedor)
    pub external_id: Option<String>,
    pub reply_to_id: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,

    // Depois de setado, a mensagem é imutável
    pub deleted_at: Option<DateTime<Utc>>,

    // Snapshot do conteúdo pré-edição; escrito no máximo uma vez
    pub original_content: Option<String>,
}

impl Message {
    /// A edição só é permitida dentro da janela fixa a partir da criação.
    pub fn within_edit_window(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at <= Duration::minutes(EDIT_WINDOW_MINUTES)
    }
}

// --- ENTRADA DO APPEND ---

// Dados de uma mensagem a inserir, vinda do REST ou do webhook.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub sender_type: SenderType,
    pub content: String,
    pub content_type: ContentType,
    pub attachments: Vec<Attachment>,
    pub metadata: Value,
    pub mentions: Vec<Uuid>,
    pub external_id: Option<String>,
    pub reply_to_id: Option<i64>,
}

// --- PÁGINA DE MENSAGENS ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

impl MessagePage {
    /// Monta a página a partir das linhas buscadas (`limit + 1`, id DESC).
    /// O cursor só anda para trás no tempo, então inserções concorrentes
    /// nunca furam nem duplicam a paginação.
    pub fn from_rows(mut rows: Vec<Message>, limit: usize) -> Self {
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        // O cursor é o id da linha mais antiga da página (última no DESC)
        let next_cursor = if has_more { rows.last().map(|m| m.id) } else { None };
        // Entregamos em ordem cronológica (mais antiga primeiro)
        rows.reverse();
        Self {
            messages: rows,
            next_cursor,
            has_more,
        }
    }
}

// --- RESULTADO DE BUSCA ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageSearchResult {
    pub results: Vec<Message>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, created_minutes_ago: i64) -> Message {
        Message {
            id,
            conversation_id: Uuid::new_v4(),
            sender_id: Some(Uuid::new_v4()),
            sender_type: SenderType::User,
            content: format!("mensagem {}", id),
            content_type: ContentType::Text,
            attachments: Json(Vec::new()),
            metadata: Value::Object(Default::default()),
            mentions: Vec::new(),
            read_by: Vec::new(),
            external_id: None,
            reply_to_id: None,
            created_at: Utc::now() - Duration::minutes(created_minutes_ago),
            edited_at: None,
            deleted_at: None,
            original_content: None,
        }
    }

    #[test]
    fn janela_de_edicao_aberta_aos_14_minutos() {
        let m = msg(1, 14);
        assert!(m.within_edit_window(Utc::now()));
    }

    #[test]
    fn janela_de_edicao_fechada_aos_16_minutos() {
        let m = msg(1, 16);
        assert!(!m.within_edit_window(Utc::now()));
    }

    #[test]
    fn pagina_cheia_com_mais_linhas_tem_cursor() {
        // Busca trouxe limit + 1 = 4 linhas, id DESC
        let rows = vec![msg(40, 0), msg(30, 0), msg(20, 0), msg(10, 0)];
        let page = MessagePage::from_rows(rows, 3);

        assert!(page.has_more);
        // Cursor = id mais antigo da página entregue
        assert_eq!(page.next_cursor, Some(20));
        // Página em ordem cronológica
        let ids: Vec<i64> = page.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![20, 30, 40]);
    }

    #[test]
    fn ultima_pagina_sem_cursor() {
        let rows = vec![msg(20, 0), msg(10, 0)];
        let page = MessagePage::from_rows(rows, 3);

        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);
        let ids: Vec<i64> = page.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn pagina_vazia() {
        let page = MessagePage::from_rows(Vec::new(), 30);
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);
        assert!(page.messages.is_empty());
    }
}
