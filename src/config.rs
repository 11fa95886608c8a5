// src/config.rs

use std::sync::Arc;
use std::{env, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::db::{ChannelRepository, ContactRepository, ConversationRepository, MessageRepository};
use crate::realtime::RealtimeHub;
use crate::services::sinks::{AuditSink, NotificationSink, TracingAuditSink, TracingNotificationSink};
use crate::services::{ChannelService, MessageService, ResolverService, WebhookService};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,

    // Registro de conexões vivas, injetado (nunca global) para o fan-out
    // ser testável sem transporte real
    pub realtime: Arc<RealtimeHub>,

    pub conversation_repo: ConversationRepository,
    pub message_service: MessageService,
    pub channel_service: ChannelService,
    pub webhook_service: WebhookService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let realtime = Arc::new(RealtimeHub::new());

        let contact_repo = ContactRepository::new(db_pool.clone());
        let conversation_repo = ConversationRepository::new(db_pool.clone());
        let message_repo = MessageRepository::new(db_pool.clone());
        let channel_repo = ChannelRepository::new(db_pool.clone());

        // Colaboradores externos por interface estreita; as default só logam
        let notifications: Arc<dyn NotificationSink> = Arc::new(TracingNotificationSink);
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

        let resolver_service = ResolverService::new(contact_repo, conversation_repo.clone());
        let message_service = MessageService::new(
            message_repo,
            conversation_repo.clone(),
            realtime.clone(),
            notifications,
            audit,
        );
        let channel_service = ChannelService::new(channel_repo.clone(), realtime.clone());
        let webhook_service = WebhookService::new(
            channel_repo,
            resolver_service,
            message_service.clone(),
            channel_service.clone(),
        );

        Ok(Self {
            db_pool,
            realtime,
            conversation_repo,
            message_service,
            channel_service,
            webhook_service,
        })
    }
}
