use super::ent::HostState;
use super::tracker::Notify;
use crate::config::{HostConfig, NotifyConfig};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::runtime::Handle;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WebhookPayload {
    pub host: String,
    pub label: String,
    pub state: HostState,
    pub time: String,
}

impl WebhookPayload {
    pub fn new(hc: &HostConfig, state: HostState) -> WebhookPayload {
        WebhookPayload {
            host: hc.host.clone(),
            label: hc.label.clone(),
            state,
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Substitutes `{host}`, `{label}` and `{state}` literally, no escaping.
pub fn render_command(template: &str, hc: &HostConfig, state: HostState) -> String {
    template
        .replace("{host}", &hc.host)
        .replace("{label}", &hc.label)
        .replace("{state}", state.as_str())
}

/// Fire-and-forget delivery of transitions to a webhook and/or a shell
/// command. At most once, no retry, failures only logged.
pub struct Notifier {
    config: NotifyConfig,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Notifier {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Notifier { config, client }
    }
}

impl Notify for Notifier {
    fn notify(&self, hc: &HostConfig, state: HostState) {
        if self.config.is_empty() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("no runtime, dropping {} notification for {}", state, hc.host);
            return;
        };
        let webhook = self
            .config
            .webhook
            .clone()
            .map(|url| (url, self.client.clone(), WebhookPayload::new(hc, state)));
        let command = self
            .config
            .command
            .as_deref()
            .map(|tpl| render_command(tpl, hc, state));

        handle.spawn(async move {
            if let Some((url, client, payload)) = webhook {
                match client.post(&url).json(&payload).send().await {
                    Ok(resp) => tracing::debug!("webhook {} answered {}", url, resp.status()),
                    Err(e) => tracing::warn!("webhook {} failed: {}", url, e),
                }
            }
            if let Some(cmd) = command {
                match tokio::process::Command::new("sh").arg("-c").arg(&cmd).status().await {
                    Ok(status) => tracing::debug!("notify command exited with {}", status),
                    Err(e) => tracing::warn!("notify command failed to start: {}", e),
                }
            }
        });
    }
}
