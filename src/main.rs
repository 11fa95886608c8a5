//src/main.rs

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod realtime;
mod services;

use crate::config::AppState;

#[tokio::main]
async fn main() {
    // Inicializa o logger
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Conversas: listagem, mensagens paginadas, envio e leitura
    let conversation_routes = Router::new()
        .route("/", get(handlers::conversations::list_conversations))
        .route(
            "/{id}/messages",
            get(handlers::conversations::list_messages)
                .post(handlers::conversations::send_message),
        )
        .route("/{id}/read", post(handlers::conversations::mark_read));

    // Mensagens: edição, soft-delete e busca
    let message_routes = Router::new()
        .route("/search", get(handlers::messages::search_messages))
        .route(
            "/{id}",
            axum::routing::patch(handlers::messages::edit_message)
                .delete(handlers::messages::delete_message),
        );

    // Configurações de canal (respostas sempre com segredos redigidos)
    let channel_routes = Router::new()
        .route(
            "/",
            get(handlers::channels::list_channel_configs)
                .post(handlers::channels::create_channel_config),
        )
        .route(
            "/{id}",
            get(handlers::channels::get_channel_config)
                .patch(handlers::channels::update_channel_config)
                .delete(handlers::channels::delete_channel_config),
        );

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/conversations", conversation_routes)
        .nest("/api/messages", message_routes)
        .nest("/api/channel-configs", channel_routes)
        // O provedor só conhece o id da config; sem cabeçalho de tenant aqui
        .route(
            "/api/webhooks/{channel_config_id}",
            post(handlers::webhooks::receive_webhook),
        )
        // Feed de eventos ao vivo (WebSocket)
        .route("/api/realtime", get(handlers::realtime::ws_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.expect("Erro no servidor Axum");
}
