// src/models/webhook.rs

use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::common::error::AppError;
use crate::common::identity::normalize_phone;
use crate::models::message::{Attachment, ContentType};

// --- ENVELOPE DO PROVEDOR ---

// Formato bruto que o gateway entrega no webhook:
// { event, instance, data, ... } — o resto é ignorado.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WebhookEnvelope {
    #[schema(example = "messages.upsert")]
    pub event: String,

    #[schema(example = "vendas01")]
    pub instance: Option<String>,

    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Normaliza o tipo do evento: uppercase e separadores colapsados em `_`.
/// Provedores variam entre "messages.upsert", "MESSAGES_UPSERT", "messages-upsert".
pub fn normalize_event_type(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_sep = false;
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
            last_sep = false;
        } else if !last_sep && !out.is_empty() {
            out.push('_');
            last_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

// --- EVENTO TIPADO ---

// Decodificação na borda: cada tipo conhecido vira uma variante tipada,
// o resto cai em Unknown (aceito e ignorado, nunca erro para o provedor).
#[derive(Debug)]
pub enum ProviderEvent {
    MessagesUpsert(Vec<ProviderMessage>),
    ConnectionUpdate(ProviderConnectionState),
    QrcodeUpdated(Option<String>),
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMessageKey {
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMessage {
    pub key: ProviderMessageKey,
    #[serde(default)]
    pub push_name: Option<String>,
    // Payload tipado do provedor (conversation, imageMessage, ...)
    #[serde(default)]
    pub message: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderConnectionState {
    Open,
    Close,
    Connecting,
    // Estado futuro do provedor: aceito e ignorado
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ConnectionUpdateData {
    state: ProviderConnectionState,
}

#[derive(Debug, Deserialize)]
struct QrcodeData {
    code: Option<String>,
    base64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesWrapper {
    messages: Vec<ProviderMessage>,
}

impl ProviderEvent {
    /// Decodifica o envelope num evento tipado. Só retorna erro quando o
    /// tipo é conhecido mas o shape do `data` não bate (InvalidPayload).
    pub fn decode(envelope: &WebhookEnvelope) -> Result<Self, AppError> {
        let normalized = normalize_event_type(&envelope.event);
        match normalized.as_str() {
            "MESSAGES_UPSERT" => {
                // Defensivo: alguns provedores mandam a lista crua,
                // outros embrulham em { "messages": [...] }
                let messages = if envelope.data.is_array() {
                    serde_json::from_value::<Vec<ProviderMessage>>(envelope.data.clone())
                } else {
                    serde_json::from_value::<MessagesWrapper>(envelope.data.clone())
                        .map(|w| w.messages)
                }
                .map_err(|e| {
                    AppError::InvalidPayload(format!("Shape inesperado em MESSAGES_UPSERT: {}", e))
                })?;
                Ok(ProviderEvent::MessagesUpsert(messages))
            }
            "CONNECTION_UPDATE" => {
                let data: ConnectionUpdateData = serde_json::from_value(envelope.data.clone())
                    .map_err(|e| {
                        AppError::InvalidPayload(format!(
                            "Shape inesperado em CONNECTION_UPDATE: {}",
                            e
                        ))
                    })?;
                Ok(ProviderEvent::ConnectionUpdate(data.state))
            }
            "QRCODE_UPDATED" => {
                let data: QrcodeData =
                    serde_json::from_value(envelope.data.clone()).map_err(|e| {
                        AppError::InvalidPayload(format!("Shape inesperado em QRCODE_UPDATED: {}", e))
                    })?;
                Ok(ProviderEvent::QrcodeUpdated(data.code.or(data.base64)))
            }
            _ => Ok(ProviderEvent::Unknown(normalized)),
        }
    }
}

// --- EXTRAÇÃO DE IDENTIDADE E CONTEÚDO ---

/// Extrai o telefone do endereço de roteamento do provedor
/// (ex.: "5511999999999@s.whatsapp.net", às vezes com sufixo ":device").
pub fn phone_from_jid(jid: &str) -> Option<String> {
    let user = jid.split('@').next()?;
    let user = user.split(':').next()?;
    normalize_phone(user)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub content: String,
    pub content_type: ContentType,
    pub attachments: Vec<Attachment>,
}

fn text_of(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn attachment_of(media: &Value, fallback_name: &str) -> Vec<Attachment> {
    let url = media.get("url").and_then(Value::as_str);
    match url {
        Some(url) => vec![Attachment {
            name: media
                .get("fileName")
                .and_then(Value::as_str)
                .unwrap_or(fallback_name)
                .to_string(),
            url: url.to_string(),
            mime_type: media
                .get("mimetype")
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream")
                .to_string(),
        }],
        None => Vec::new(),
    }
}

/// Deriva o conteúdo renderizável da mensagem do provedor. Mídia sem legenda
/// vira placeholder; sem nada renderizável, a mensagem é descartada (None).
pub fn extract_content(message: &Value) -> Option<ExtractedContent> {
    if let Some(text) = text_of(message, "/conversation") {
        return Some(ExtractedContent {
            content: text,
            content_type: ContentType::Text,
            attachments: Vec::new(),
        });
    }

    if let Some(text) = text_of(message, "/extendedTextMessage/text") {
        return Some(ExtractedContent {
            content: text,
            content_type: ContentType::Text,
            attachments: Vec::new(),
        });
    }

    if let Some(media) = message.get("imageMessage") {
        return Some(ExtractedContent {
            content: text_of(media, "/caption").unwrap_or_else(|| "[Imagem recebida]".into()),
            content_type: ContentType::Image,
            attachments: attachment_of(media, "imagem"),
        });
    }

    if let Some(media) = message.get("videoMessage") {
        return Some(ExtractedContent {
            content: text_of(media, "/caption").unwrap_or_else(|| "[Vídeo recebido]".into()),
            content_type: ContentType::Video,
            attachments: attachment_of(media, "video"),
        });
    }

    if let Some(media) = message.get("audioMessage") {
        return Some(ExtractedContent {
            content: "[Áudio recebido]".into(),
            content_type: ContentType::Audio,
            attachments: attachment_of(media, "audio"),
        });
    }

    if let Some(media) = message.get("documentMessage") {
        let name = text_of(media, "/fileName");
        return Some(ExtractedContent {
            content: name
                .clone()
                .map(|n| format!("[Documento: {}]", n))
                .unwrap_or_else(|| "[Documento recebido]".into()),
            content_type: ContentType::File,
            attachments: attachment_of(media, name.as_deref().unwrap_or("documento")),
        });
    }

    // Reações, stickers, enquetes etc.: nada renderizável
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event: &str, data: Value) -> WebhookEnvelope {
        WebhookEnvelope {
            event: event.to_string(),
            instance: Some("vendas01".into()),
            data,
        }
    }

    #[test]
    fn normalizacao_do_tipo_de_evento() {
        assert_eq!(normalize_event_type("messages.upsert"), "MESSAGES_UPSERT");
        assert_eq!(normalize_event_type("MESSAGES_UPSERT"), "MESSAGES_UPSERT");
        assert_eq!(normalize_event_type("connection update"), "CONNECTION_UPDATE");
        assert_eq!(normalize_event_type("qrcode--updated"), "QRCODE_UPDATED");
    }

    #[test]
    fn decodifica_upsert_com_lista_crua_e_embrulhada() {
        let raw = json!([{
            "key": { "remoteJid": "5511999999999@s.whatsapp.net", "fromMe": false, "id": "ABC123" },
            "pushName": "Maria",
            "message": { "conversation": "oi" }
        }]);

        let ev = ProviderEvent::decode(&envelope("messages.upsert", raw.clone())).unwrap();
        let ProviderEvent::MessagesUpsert(msgs) = ev else {
            panic!("variante errada");
        };
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].key.id, "ABC123");
        assert!(!msgs[0].key.from_me);

        let ev = ProviderEvent::decode(&envelope("messages.upsert", json!({ "messages": raw })))
            .unwrap();
        let ProviderEvent::MessagesUpsert(msgs) = ev else {
            panic!("variante errada");
        };
        assert_eq!(msgs[0].push_name.as_deref(), Some("Maria"));
    }

    #[test]
    fn shape_invalido_em_evento_conhecido_vira_invalid_payload() {
        let err = ProviderEvent::decode(&envelope("messages.upsert", json!({ "foo": 1 })))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
    }

    #[test]
    fn decodifica_connection_update() {
        let ev = ProviderEvent::decode(&envelope("connection.update", json!({ "state": "open" })))
            .unwrap();
        assert!(matches!(
            ev,
            ProviderEvent::ConnectionUpdate(ProviderConnectionState::Open)
        ));

        // Estado futuro do provedor não derruba o decode
        let ev = ProviderEvent::decode(&envelope("connection.update", json!({ "state": "pairing" })))
            .unwrap();
        assert!(matches!(
            ev,
            ProviderEvent::ConnectionUpdate(ProviderConnectionState::Unknown)
        ));
    }

    #[test]
    fn qrcode_cai_no_base64_quando_nao_ha_code() {
        let ev = ProviderEvent::decode(&envelope("qrcode.updated", json!({ "base64": "data:..." })))
            .unwrap();
        let ProviderEvent::QrcodeUpdated(code) = ev else {
            panic!("variante errada");
        };
        assert_eq!(code.as_deref(), Some("data:..."));
    }

    #[test]
    fn evento_desconhecido_vira_unknown() {
        let ev = ProviderEvent::decode(&envelope("presence.update", json!({}))).unwrap();
        assert!(matches!(ev, ProviderEvent::Unknown(ref t) if t == "PRESENCE_UPDATE"));
    }

    #[test]
    fn telefone_a_partir_do_jid() {
        assert_eq!(
            phone_from_jid("5511999999999@s.whatsapp.net"),
            Some("5511999999999".to_string())
        );
        assert_eq!(
            phone_from_jid("5511999999999:12@s.whatsapp.net"),
            Some("5511999999999".to_string())
        );
        assert_eq!(phone_from_jid("status@broadcast"), None);
    }

    #[test]
    fn extrai_texto_simples_e_estendido() {
        let c = extract_content(&json!({ "conversation": "oi" })).unwrap();
        assert_eq!(c.content, "oi");
        assert_eq!(c.content_type, ContentType::Text);

        let c = extract_content(&json!({ "extendedTextMessage": { "text": "olá!" } })).unwrap();
        assert_eq!(c.content, "olá!");
    }

    #[test]
    fn midia_sem_legenda_vira_placeholder() {
        let c = extract_content(&json!({
            "imageMessage": { "url": "https://cdn/img.jpg", "mimetype": "image/jpeg" }
        }))
        .unwrap();
        assert_eq!(c.content, "[Imagem recebida]");
        assert_eq!(c.content_type, ContentType::Image);
        assert_eq!(c.attachments.len(), 1);
        assert_eq!(c.attachments[0].mime_type, "image/jpeg");

        let c = extract_content(&json!({
            "imageMessage": { "caption": "olha isso", "url": "https://cdn/img.jpg" }
        }))
        .unwrap();
        assert_eq!(c.content, "olha isso");
    }

    #[test]
    fn sem_conteudo_renderizavel_descarta() {
        assert_eq!(extract_content(&json!({ "reactionMessage": { "text": "👍" } })), None);
        assert_eq!(extract_content(&json!({})), None);
    }
}
