// src/services/sinks.rs

// Colaboradores externos consumidos por interface estreita: notificação
// para o usuário responsável e trilha de auditoria. O núcleo funciona sem
// implementações reais; as default apenas logam via tracing.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Disparado quando chega mensagem numa conversa atribuída a um
    /// usuário que não é o remetente. Fire-and-forget.
    async fn notify_new_message(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        conversation_id: Uuid,
        preview: &str,
    );
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Canal lateral: falha aqui nunca falha a operação principal.
    async fn record(&self, tenant_id: Uuid, action: &str, details: Value);
}

pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify_new_message(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        conversation_id: Uuid,
        preview: &str,
    ) {
        tracing::info!(
            %tenant_id, %user_id, %conversation_id,
            "notificação de nova mensagem: {}",
            preview
        );
    }
}

pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, tenant_id: Uuid, action: &str, details: Value) {
        tracing::info!(%tenant_id, action, %details, "auditoria");
    }
}
