// src/handlers/channels.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::TenantContext,
    models::channel::{ChannelConfigView, ChannelType},
};

// Todas as respostas deste handler passam por redação de segredos:
// password/accessToken nunca saem crus, viram hasPassword/hasAccessToken.

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelConfigPayload {
    pub channel_type: ChannelType,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "WhatsApp Vendas")]
    pub name: String,

    // Blob do provedor, segredos inclusos (write-only)
    #[schema(value_type = Option<Object>)]
    pub provider_config: Option<Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChannelConfigPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: Option<String>,

    pub is_active: Option<bool>,

    // Patch parcial: segredo vazio/ausente preserva o armazenado
    #[schema(value_type = Option<Object>)]
    pub provider_config: Option<Value>,
}

// GET /api/channel-configs
#[utoipa::path(
    get,
    path = "/api/channel-configs",
    tag = "Canais",
    params(("x-tenant-id" = Uuid, Header, description = "ID da Organização")),
    responses(
        (status = 200, description = "Configurações com segredos redigidos", body = Vec<ChannelConfigView>)
    )
)]
pub async fn list_channel_configs(
    State(app_state): State<AppState>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let configs = app_state.channel_service.list(tenant.0).await?;
    Ok((StatusCode::OK, Json(configs)))
}

// GET /api/channel-configs/{id}
#[utoipa::path(
    get,
    path = "/api/channel-configs/{id}",
    tag = "Canais",
    params(
        ("id" = Uuid, Path, description = "ID da configuração"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização")
    ),
    responses(
        (status = 200, description = "Configuração com segredos redigidos", body = ChannelConfigView),
        (status = 404, description = "Configuração não encontrada")
    )
)]
pub async fn get_channel_config(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let config = app_state.channel_service.get(tenant.0, id).await?;
    Ok((StatusCode::OK, Json(config)))
}

// POST /api/channel-configs
#[utoipa::path(
    post,
    path = "/api/channel-configs",
    tag = "Canais",
    request_body = CreateChannelConfigPayload,
    params(("x-tenant-id" = Uuid, Header, description = "ID da Organização")),
    responses(
        (status = 201, description = "Configuração criada", body = ChannelConfigView)
    )
)]
pub async fn create_channel_config(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateChannelConfigPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let config = app_state
        .channel_service
        .create(
            tenant.0,
            payload.channel_type,
            &payload.name,
            payload.provider_config,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(config)))
}

// PATCH /api/channel-configs/{id}
#[utoipa::path(
    patch,
    path = "/api/channel-configs/{id}",
    tag = "Canais",
    request_body = UpdateChannelConfigPayload,
    params(
        ("id" = Uuid, Path, description = "ID da configuração"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização")
    ),
    responses(
        (status = 200, description = "Configuração atualizada", body = ChannelConfigView),
        (status = 404, description = "Configuração não encontrada")
    )
)]
pub async fn update_channel_config(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateChannelConfigPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let config = app_state
        .channel_service
        .update(
            tenant.0,
            id,
            payload.name.as_deref(),
            payload.is_active,
            payload.provider_config,
        )
        .await?;

    Ok((StatusCode::OK, Json(config)))
}

// DELETE /api/channel-configs/{id}
#[utoipa::path(
    delete,
    path = "/api/channel-configs/{id}",
    tag = "Canais",
    params(
        ("id" = Uuid, Path, description = "ID da configuração"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Organização")
    ),
    responses(
        (status = 204, description = "Configuração removida"),
        (status = 404, description = "Configuração não encontrada")
    )
)]
pub async fn delete_channel_config(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.channel_service.delete(tenant.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
