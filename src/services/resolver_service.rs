// src/services/resolver_service.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    common::identity::{normalize_email, normalize_phone},
    db::{ContactRepository, ConversationRepository},
    models::contact::Contact,
    models::conversation::{Channel, Conversation},
};

// Resolve identidades externas (telefone) para contato e conversa internos.
#[derive(Clone)]
pub struct ResolverService {
    contacts: ContactRepository,
    conversations: ConversationRepository,
}

impl ResolverService {
    pub fn new(contacts: ContactRepository, conversations: ConversationRepository) -> Self {
        Self {
            contacts,
            conversations,
        }
    }

    // =========================================================================
    //  RESOLUÇÃO DE CONTATO
    // =========================================================================

    /// Três caminhos, nesta ordem:
    /// 1. match exato no campo normalizado;
    /// 2. match por sufixo nas duas direções (código de país faltando/sobrando);
    /// 3. varredura das linhas legadas sem campo normalizado, com backfill
    ///    best-effort — a falha da escrita é engolida, nunca falha o caller.
    pub async fn resolve_contact_by_phone(
        &self,
        tenant_id: Uuid,
        raw_phone: &str,
    ) -> Result<Option<Contact>, AppError> {
        let Some(normalized) = normalize_phone(raw_phone) else {
            return Ok(None);
        };

        if let Some(contact) = self
            .contacts
            .find_by_normalized_phone(tenant_id, &normalized)
            .await?
        {
            return Ok(Some(contact));
        }

        if let Some(contact) = self
            .contacts
            .find_by_phone_suffix(tenant_id, &normalized)
            .await?
        {
            return Ok(Some(contact));
        }

        // Fallback legado
        let legacy = self.contacts.find_unnormalized(tenant_id).await?;
        for contact in legacy {
            let Some(phone) = contact.phone.as_deref() else {
                continue;
            };
            let Some(computed) = normalize_phone(phone) else {
                continue;
            };

            if let Err(e) = self
                .contacts
                .backfill_normalized_phone(contact.id, &computed)
                .await
            {
                tracing::warn!(
                    contact_id = %contact.id,
                    "backfill do telefone normalizado falhou (ignorado): {}",
                    e
                );
            }

            if computed == normalized
                || computed.ends_with(&normalized)
                || normalized.ends_with(&computed)
            {
                return Ok(Some(contact));
            }
        }

        Ok(None)
    }

    /// Webhook: contato precisa existir. Nome cai para o pushName do
    /// provedor, ou para o próprio telefone.
    pub async fn find_or_create_contact_by_phone(
        &self,
        tenant_id: Uuid,
        raw_phone: &str,
        display_name: Option<&str>,
    ) -> Result<Contact, AppError> {
        if let Some(contact) = self.resolve_contact_by_phone(tenant_id, raw_phone).await? {
            return Ok(contact);
        }

        let normalized = normalize_phone(raw_phone).ok_or_else(|| {
            AppError::InvalidPayload("Telefone sem dígitos não identifica um contato.".into())
        })?;
        let name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&normalized);

        self.contacts
            .create(tenant_id, name, Some(raw_phone), Some(&normalized), None)
            .await
    }

    /// Canal de e-mail: match único pelo endereço canonicalizado.
    pub async fn resolve_contact_by_email(
        &self,
        tenant_id: Uuid,
        raw_email: &str,
    ) -> Result<Option<Contact>, AppError> {
        let Some(normalized) = normalize_email(raw_email) else {
            return Ok(None);
        };
        self.contacts.find_by_email(tenant_id, &normalized).await
    }

    // =========================================================================
    //  RESOLUÇÃO DE CONVERSA
    // =========================================================================

    /// Conversa mais recentemente ativa do contato no canal. Não cria.
    pub async fn resolve_conversation(
        &self,
        tenant_id: Uuid,
        contact_id: Uuid,
        channel: Channel,
    ) -> Result<Option<Conversation>, AppError> {
        self.conversations
            .find_latest_for_contact(tenant_id, contact_id, channel)
            .await
    }

    /// Webhook: reusa a conversa mais recente ou abre uma nova.
    /// A reabertura de conversa fechada acontece no append, não aqui.
    pub async fn find_or_create_conversation(
        &self,
        tenant_id: Uuid,
        contact_id: Uuid,
        channel: Channel,
    ) -> Result<Conversation, AppError> {
        if let Some(conversation) = self
            .resolve_conversation(tenant_id, contact_id, channel)
            .await?
        {
            return Ok(conversation);
        }

        self.conversations
            .create(tenant_id, channel, Some(contact_id), None)
            .await
    }
}
