// src/realtime.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};

// Buffer por cliente. Consumidor lento estoura o buffer e perde o evento;
// a fonte da verdade continua sendo o banco, o feed é só otimização de latência.
const CLIENT_BUFFER: usize = 256;

// Registro de clientes vivos do processo. Injetado via AppState — nunca
// estado global — para que o fan-out seja testável sem transporte real.
// Sem replicação entre instâncias: cliente conectado em outro processo
// não recebe os eventos desta instância.
pub struct RealtimeHub {
    clients: Mutex<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registra uma conexão viva e devolve o id + o receiver que o
    /// handler do WebSocket bombeia para o socket.
    pub async fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.lock().await.insert(id, tx);
        tracing::debug!("cliente realtime {} registrado", id);
        (id, rx)
    }

    pub async fn unregister(&self, id: u64) {
        self.clients.lock().await.remove(&id);
        tracing::debug!("cliente realtime {} removido", id);
    }

    /// Fan-out fire-and-forget do envelope `{ type, data }` para todos os
    /// clientes vivos. `try_send` nunca bloqueia a ingestão: buffer cheio
    /// perde a entrega, canal fechado remove o cliente.
    pub async fn broadcast<T: Serialize>(&self, event_type: &str, data: T) {
        let payload = match serde_json::to_string(&json!({ "type": event_type, "data": data })) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("falha ao serializar evento realtime {}: {}", event_type, e);
                return;
            }
        };

        let mut clients = self.clients.lock().await;
        let mut closed: Vec<u64> = Vec::new();
        for (id, tx) in clients.iter() {
            match tx.try_send(payload.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!("cliente realtime {} com buffer cheio, evento descartado", id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            clients.remove(&id);
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_alcanca_todos_os_clientes() {
        let hub = RealtimeHub::new();
        let (_id_a, mut rx_a) = hub.register().await;
        let (_id_b, mut rx_b) = hub.register().await;

        hub.broadcast("message:created", serde_json::json!({ "id": 1 })).await;

        let a: serde_json::Value = serde_json::from_str(&rx_a.recv().await.unwrap()).unwrap();
        let b: serde_json::Value = serde_json::from_str(&rx_b.recv().await.unwrap()).unwrap();
        assert_eq!(a["type"], "message:created");
        assert_eq!(a["data"]["id"], 1);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn cliente_desconectado_nao_recebe_e_e_removido() {
        let hub = RealtimeHub::new();
        let (id, rx) = hub.register().await;
        assert_eq!(hub.client_count().await, 1);

        hub.unregister(id).await;
        assert_eq!(hub.client_count().await, 0);

        // Receiver dropado depois do registro: o broadcast limpa o morto
        let (_id2, rx2) = hub.register().await;
        drop(rx2);
        hub.broadcast("ping", serde_json::json!({})).await;
        assert_eq!(hub.client_count().await, 0);

        drop(rx);
    }

    #[tokio::test]
    async fn buffer_cheio_nao_bloqueia_o_broadcast() {
        let hub = RealtimeHub::new();
        let (_id, mut rx) = hub.register().await;

        // Estoura o buffer do cliente sem ninguém consumindo
        for i in 0..(CLIENT_BUFFER + 50) {
            hub.broadcast("tick", serde_json::json!({ "i": i })).await;
        }

        // Cliente continua registrado; eventos além do buffer foram perdidos
        assert_eq!(hub.client_count().await, 1);
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, CLIENT_BUFFER);
    }
}
