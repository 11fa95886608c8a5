// src/db/contact_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::contact::Contact};

#[derive(Clone)]
pub struct ContactRepository {
    pool: PgPool,
}

impl ContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Match de e-mail: a comparação é feita sobre o valor canonicalizado
    /// nos dois lados.
    pub async fn find_by_email(
        &self,
        tenant_id: Uuid,
        normalized_email: &str,
    ) -> Result<Option<Contact>, AppError> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts
            WHERE tenant_id = $1 AND LOWER(TRIM(email)) = $2
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(normalized_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    /// Caminho rápido: match exato no campo normalizado.
    pub async fn find_by_normalized_phone(
        &self,
        tenant_id: Uuid,
        normalized: &str,
    ) -> Result<Option<Contact>, AppError> {
        let contact = sqlx::query_as::<_, Contact>(
            "SELECT * FROM contacts WHERE tenant_id = $1 AND normalized_phone = $2 LIMIT 1",
        )
        .bind(tenant_id)
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    /// Match por sufixo nas duas direções, para tolerar código de país
    /// faltando ou sobrando. Primeira linha encontrada vence; colisões de
    /// sufixo são raras e não são desambiguadas (limitação conhecida).
    pub async fn find_by_phone_suffix(
        &self,
        tenant_id: Uuid,
        normalized: &str,
    ) -> Result<Option<Contact>, AppError> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts
            WHERE tenant_id = $1
              AND normalized_phone IS NOT NULL
              AND normalized_phone <> ''
              AND (normalized_phone LIKE '%' || $2 OR $2 LIKE '%' || normalized_phone)
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    /// Linhas legadas cujo campo normalizado nunca foi populado.
    pub async fn find_unnormalized(&self, tenant_id: Uuid) -> Result<Vec<Contact>, AppError> {
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts
            WHERE tenant_id = $1 AND normalized_phone IS NULL AND phone IS NOT NULL
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    /// Backfill preguiçoso do campo normalizado. Best-effort: quem chama
    /// engole a falha, isto é otimização e não correção.
    pub async fn backfill_normalized_phone(
        &self,
        contact_id: Uuid,
        normalized: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE contacts SET normalized_phone = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(contact_id)
        .bind(normalized)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        name: &str,
        phone: Option<&str>,
        normalized_phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Contact, AppError> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (tenant_id, name, phone, normalized_phone, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(phone)
        .bind(normalized_phone)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(contact)
    }
}
