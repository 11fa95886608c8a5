// src/handlers/conversations.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::CurrentUser, tenancy::TenantContext},
    models::conversation::{Channel, Conversation, ConversationStatus},
    models::message::{Attachment, ContentType, Message, MessagePage, NewMessage, SenderType},
};

// =============================================================================
//  ÁREA 1: LISTAGEM DE CONVERSAS
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListConversationsQuery {
    pub status: Option<ConversationStatus>,
    pub channel: Option<Channel>,
}

// GET /api/conversations
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "Conversas",
    params(
        ListConversationsQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização")
    ),
    responses(
        (status = 200, description = "Conversas por atividade recente", body = Vec<Conversation>)
    )
)]
pub async fn list_conversations(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListConversationsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conversations = app_state
        .conversation_repo
        .list(tenant.0, query.status, query.channel)
        .await?;

    Ok((StatusCode::OK, Json(conversations)))
}

// =============================================================================
//  ÁREA 2: MENSAGENS DA CONVERSA (paginação por cursor)
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListMessagesQuery {
    // Cursor = id da mensagem mais antiga da página anterior
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

// GET /api/conversations/{id}/messages
#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    tag = "Conversas",
    params(
        ("id" = Uuid, Path, description = "ID da conversa"),
        ListMessagesQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização")
    ),
    responses(
        (status = 200, description = "Página em ordem cronológica", body = MessagePage),
        (status = 404, description = "Conversa não encontrada")
    )
)]
pub async fn list_messages(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state
        .message_service
        .list(
            &app_state.db_pool,
            tenant.0,
            conversation_id,
            query.cursor,
            query.limit,
        )
        .await?;

    Ok((StatusCode::OK, Json(page)))
}

// =============================================================================
//  ÁREA 3: ENVIO
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Olá! Segue o orçamento.")]
    pub content: String,

    pub content_type: Option<ContentType>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    #[serde(default)]
    pub mentions: Vec<Uuid>,

    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,

    pub reply_to_id: Option<i64>,

    // user (padrão) ou system; mensagens de contato só entram pelo webhook
    pub sender_type: Option<SenderType>,

    // Chave de idempotência opcional para reenvio do cliente
    #[schema(example = "WAMID.123")]
    pub external_id: Option<String>,
}

// POST /api/conversations/{id}/messages
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    tag = "Conversas",
    request_body = SendMessagePayload,
    params(
        ("id" = Uuid, Path, description = "ID da conversa"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização"),
        ("x-user-id" = Uuid, Header, description = "ID do usuário autenticado")
    ),
    responses(
        (status = 201, description = "Mensagem criada", body = Message),
        (status = 200, description = "Entrega repetida (idempotência)", body = Message),
        (status = 404, description = "Conversa não encontrada")
    )
)]
pub async fn send_message(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    user: CurrentUser,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sender_type = payload.sender_type.unwrap_or(SenderType::User);
    if sender_type == SenderType::Contact {
        return Err(AppError::InvalidPayload(
            "Mensagens de contato só entram pelo webhook do provedor.".into(),
        ));
    }

    let input = NewMessage {
        conversation_id,
        sender_id: Some(user.0),
        sender_type,
        content: payload.content,
        content_type: payload.content_type.unwrap_or(ContentType::Text),
        attachments: payload.attachments,
        metadata: payload.metadata.unwrap_or_else(|| json!({})),
        mentions: payload.mentions,
        external_id: payload.external_id,
        reply_to_id: payload.reply_to_id,
    };

    let (message, created) = app_state
        .message_service
        .append(&app_state.db_pool, tenant.0, input)
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(message)))
}

// =============================================================================
//  ÁREA 4: LEITURA
// =============================================================================

// POST /api/conversations/{id}/read
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/read",
    tag = "Conversas",
    params(
        ("id" = Uuid, Path, description = "ID da conversa"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização"),
        ("x-user-id" = Uuid, Header, description = "ID do usuário autenticado")
    ),
    responses(
        (status = 200, description = "Quantidade de mensagens marcadas agora")
    )
)]
pub async fn mark_read(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    user: CurrentUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let count = app_state
        .message_service
        .mark_read(&app_state.db_pool, tenant.0, conversation_id, user.0)
        .await?;

    Ok((StatusCode::OK, Json(json!({ "count": count }))))
}
