use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::{
    sync::mpsc,
    time::{sleep, Duration},
};
use tracing::warn;

use common_types::{Notifier, SubscriberScope};

mod commands;
mod format;
mod markdown;
mod updates;

pub use commands::{parse_command, Command};
pub use format::{
    format_enrichment, format_filter_added, format_filter_list, format_filter_removed,
    format_immediate_alert, format_threshold_alert,
};
pub use markdown::escape_md_v2;
pub use updates::{IncomingMessage, TgUpdates};

#[derive(Clone, Debug, Deserialize)]
pub struct TgConfig {
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}

impl TgConfig {
    fn bot_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

#[derive(Clone, Debug)]
struct Job {
    scope: SubscriberScope,
    text: String,
    link_preview: bool,
}

/// Queued Telegram sender. Sends never block the caller beyond the
/// queue push; delivery retries happen on the worker.
#[derive(Clone)]
pub struct TgPublisher {
    queue_tx: mpsc::Sender<Job>,
}

impl TgPublisher {
    pub fn new(cfg: TgConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        let (tx, rx) = mpsc::channel::<Job>(1024);
        spawn_worker(client, cfg, rx);
        Ok(Self { queue_tx: tx })
    }

    pub async fn enqueue(&self, scope: &SubscriberScope, text: &str, link_preview: bool) -> Result<()> {
        self.queue_tx
            .send(Job {
                scope: *scope,
                text: text.to_string(),
                link_preview,
            })
            .await
            .map_err(|_| anyhow::anyhow!("tg queue closed"))
    }
}

#[async_trait]
impl Notifier for TgPublisher {
    async fn send(&self, scope: &SubscriberScope, text: &str, link_preview: bool) -> Result<()> {
        self.enqueue(scope, text, link_preview).await
    }
}

fn spawn_worker(client: Client, cfg: TgConfig, mut rx: mpsc::Receiver<Job>) {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match send_message(&client, &cfg, &job).await {
                    Ok(_) => break,
                    Err(e) => {
                        warn!(?e, attempt, chat = job.scope.chat_id, "sendMessage failed");
                        if attempt >= 5 {
                            break;
                        }
                        sleep(Duration::from_millis(300 * attempt as u64)).await;
                    }
                }
            }
        }
    });
}

async fn send_message(client: &Client, cfg: &TgConfig, job: &Job) -> Result<()> {
    let mut body = json!({
        "chat_id": job.scope.chat_id,
        "text": job.text,
        "parse_mode": "MarkdownV2",
        "disable_web_page_preview": !job.link_preview,
    });
    if let Some(thread_id) = job.scope.thread_id {
        body["message_thread_id"] = json!(thread_id);
    }
    let resp = client
        .post(cfg.bot_url("sendMessage"))
        .json(&body)
        .send()
        .await
        .context("sendMessage request failed")?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("sendMessage status={status} body={text}");
    }
    Ok(())
}
