// src/handlers/messages.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::CurrentUser, tenancy::TenantContext},
    models::message::{Message, MessageSearchResult},
};

// =============================================================================
//  ÁREA 1: EDIÇÃO (janela limitada, snapshot único)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditMessagePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Conteúdo corrigido")]
    pub content: String,
}

// PATCH /api/messages/{id}
#[utoipa::path(
    patch,
    path = "/api/messages/{id}",
    tag = "Mensagens",
    request_body = EditMessagePayload,
    params(
        ("id" = i64, Path, description = "ID da mensagem"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização"),
        ("x-user-id" = Uuid, Header, description = "ID do usuário autenticado")
    ),
    responses(
        (status = 200, description = "Mensagem editada", body = Message),
        (status = 403, description = "Editor não é o autor"),
        (status = 409, description = "Mensagem já apagada"),
        (status = 422, description = "Janela de edição expirada")
    )
)]
pub async fn edit_message(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    user: CurrentUser,
    Path(message_id): Path<i64>,
    Json(payload): Json<EditMessagePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let message = app_state
        .message_service
        .edit(tenant.0, message_id, user.0, &payload.content)
        .await?;

    Ok((StatusCode::OK, Json(message)))
}

// =============================================================================
//  ÁREA 2: SOFT-DELETE
// =============================================================================

// DELETE /api/messages/{id}
#[utoipa::path(
    delete,
    path = "/api/messages/{id}",
    tag = "Mensagens",
    params(
        ("id" = i64, Path, description = "ID da mensagem"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização"),
        ("x-user-id" = Uuid, Header, description = "ID do usuário autenticado")
    ),
    responses(
        (status = 200, description = "Mensagem marcada como apagada (idempotente)", body = Message),
        (status = 403, description = "Requisitante não é o autor")
    )
)]
pub async fn delete_message(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    user: CurrentUser,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state
        .message_service
        .soft_delete(tenant.0, message_id, user.0)
        .await?;

    Ok((StatusCode::OK, Json(message)))
}

// =============================================================================
//  ÁREA 3: BUSCA FULL-TEXT
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SearchMessagesQuery {
    pub q: String,
    pub conversation_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// GET /api/messages/search
#[utoipa::path(
    get,
    path = "/api/messages/search",
    tag = "Mensagens",
    params(
        SearchMessagesQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização")
    ),
    responses(
        (status = 200, description = "Resultados por relevância", body = MessageSearchResult)
    )
)]
pub async fn search_messages(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<SearchMessagesQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.q.trim().is_empty() {
        return Err(AppError::InvalidPayload(
            "O parâmetro de busca 'q' é obrigatório.".into(),
        ));
    }

    let result = app_state
        .message_service
        .search(
            tenant.0,
            query.q.trim(),
            query.conversation_id,
            query.limit,
            query.offset,
        )
        .await?;

    Ok((StatusCode::OK, Json(result)))
}
