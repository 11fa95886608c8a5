// src/handlers/webhooks.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError, config::AppState, models::webhook::WebhookEnvelope,
};

// Ack devolvido ao provedor; 2xx é o que interrompe as re-tentativas.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
}

// POST /api/webhooks/{channelConfigId}
// Entrada do gateway de chat. Sem cabeçalho de tenant: o escopo vem da
// própria configuração de canal. O provedor re-tenta em não-2xx, então
// eventos desconhecidos são aceitos e ignorados, nunca recusados.
#[utoipa::path(
    post,
    path = "/api/webhooks/{channelConfigId}",
    tag = "Webhooks",
    request_body = WebhookEnvelope,
    params(("channelConfigId" = Uuid, Path, description = "ID da configuração de canal")),
    responses(
        (status = 200, description = "Evento aceito", body = WebhookAck),
        (status = 404, description = "Configuração de canal não encontrada"),
        (status = 400, description = "Shape inválido para evento conhecido")
    )
)]
pub async fn receive_webhook(
    State(app_state): State<AppState>,
    Path(channel_config_id): Path<Uuid>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .webhook_service
        .handle(&app_state.db_pool, channel_config_id, envelope)
        .await?;

    Ok((StatusCode::OK, Json(WebhookAck { received: true })))
}
