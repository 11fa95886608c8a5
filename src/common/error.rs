use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// A taxonomia cobre o motor de conversas: NotFound / Forbidden / Conflict /
// EditWindowExpired / InvalidPayload, mais os erros de infraestrutura.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Registro não encontrado: {0}")]
    NotFound(String),

    #[error("Operação não permitida: {0}")]
    Forbidden(String),

    #[error("Estado inválido para a operação: {0}")]
    Conflict(String),

    #[error("Janela de edição expirada")]
    EditWindowExpired,

    #[error("Payload inválido: {0}")]
    InvalidPayload(String),

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::NotFound(what) => {
                let body = Json(json!({ "error": format!("{} não encontrado(a).", what) }));
                return (StatusCode::NOT_FOUND, body).into_response();
            }
            AppError::Forbidden(why) => {
                let body = Json(json!({ "error": why }));
                return (StatusCode::FORBIDDEN, body).into_response();
            }
            AppError::Conflict(why) => {
                let body = Json(json!({ "error": why }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::EditWindowExpired => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "A janela de edição desta mensagem já expirou.",
            ),
            AppError::InvalidPayload(why) => {
                let body = Json(json!({ "error": why }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` vai logar a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
