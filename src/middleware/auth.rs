// src/middleware/auth.rs

// Autenticação/sessão ficam fora deste núcleo: o gateway de auth injeta a
// identidade do usuário já validada neste cabeçalho. Aqui só extraímos.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

const USER_ID_HEADER: &str = "x-user-id";

// Usuário autenticado da requisição.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Uuid);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::InvalidPayload("O cabeçalho X-User-Id é obrigatório.".into())
            })?;

        let user_id = Uuid::parse_str(value).map_err(|_| {
            AppError::InvalidPayload("Cabeçalho X-User-Id inválido (não é um UUID).".into())
        })?;

        Ok(CurrentUser(user_id))
    }
}
