use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use common_types::SubscriberScope;

use crate::TgConfig;

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub scope: SubscriberScope,
    pub text: String,
}

#[derive(Deserialize)]
struct UpdatesEnvelope {
    result: Vec<Update>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    chat: Chat,
    message_thread_id: Option<i64>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
}

/// Long-poll consumer for the bot's `getUpdates` feed. Tracks the
/// offset so each update is delivered once.
pub struct TgUpdates {
    client: Client,
    cfg: TgConfig,
    offset: i64,
}

impl TgUpdates {
    pub fn new(cfg: TgConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            cfg,
            offset: 0,
        })
    }

    /// One long-poll round; empty on timeout. Non-text updates are
    /// consumed (the offset advances) and dropped.
    pub async fn poll(&mut self) -> Result<Vec<IncomingMessage>> {
        let body = json!({
            "offset": self.offset,
            "timeout": 25,
            "allowed_updates": ["message"],
        });
        let resp = self
            .client
            .post(self.cfg.bot_url("getUpdates"))
            .json(&body)
            .send()
            .await
            .context("getUpdates request failed")?
            .error_for_status()?;
        let envelope: UpdatesEnvelope = resp.json().await.context("getUpdates parse failed")?;

        let mut out = Vec::new();
        for update in envelope.result {
            self.offset = self.offset.max(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let Some(text) = message.text else { continue };
            out.push(IncomingMessage {
                scope: SubscriberScope {
                    chat_id: message.chat.id,
                    thread_id: message.message_thread_id,
                },
                text,
            });
        }
        Ok(out)
    }
}
