// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// O nome do nosso cabeçalho HTTP customizado
const TENANT_ID_HEADER: &str = "x-tenant-id";

// Extrator do escopo de tenant. Armazena o UUID da organização que o
// utilizador quer aceder.
#[derive(Debug, Clone)]
pub struct TenantContext(pub Uuid);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    // AppError já implementa IntoResponse
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts.headers.get(TENANT_ID_HEADER);

        match header_value {
            Some(value) => {
                let value_str = value.to_str().map_err(|_| {
                    AppError::InvalidPayload(
                        "Cabeçalho X-Tenant-ID contém caracteres inválidos.".into(),
                    )
                })?;

                let tenant_id = Uuid::parse_str(value_str).map_err(|_| {
                    AppError::InvalidPayload("Cabeçalho X-Tenant-ID inválido (não é um UUID).".into())
                })?;

                Ok(TenantContext(tenant_id))
            }
            None => Err(AppError::InvalidPayload(
                "O cabeçalho X-Tenant-ID é obrigatório.".into(),
            )),
        }
    }
}
