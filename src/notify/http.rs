use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::models::config::NotifyConfig;
use crate::notify::NotificationSink;
use crate::utils::error::{AppError, AppResult, SinkError};

/// Topic used for the notifier's own status messages
const NOTIFIER_TOPIC: &str = "_notifier";

/// Timeout for a single delivery attempt
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A message waiting for delivery
#[derive(Debug)]
struct Notification {
    topic: String,
    message: String,
}

/// Publishes notifications by POSTing them to `{url}/{topic prefix}/{topic}`.
///
/// `notify` only queues the message; a background task performs the request, so the capture
/// loop never waits on the network. Failed deliveries are logged and dropped.
pub struct HttpNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl HttpNotifier {
    /// Spawn the delivery task. Must be called from within a tokio runtime.
    pub fn start(config: &NotifyConfig) -> AppResult<Self> {
        if config.url.is_empty() {
            return Err(AppError::InvalidConfig(
                "notify.url must be set when notifications are enabled".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SinkError::from)?;

        let base_url = format!(
            "{}/{}",
            config.url.trim_end_matches('/'),
            config.topic.trim_matches('/')
        );
        info!("Delivering notifications to {}", base_url);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run_delivery(client, base_url, rx));

        let notifier = Self { tx };
        notifier.notify(NOTIFIER_TOPIC, r#"{"message": "notifier started."}"#)?;
        Ok(notifier)
    }

    /// Deliver queued notifications until every sender is dropped
    async fn run_delivery(
        client: reqwest::Client,
        base_url: String,
        mut rx: mpsc::UnboundedReceiver<Notification>,
    ) {
        while let Some(notification) = rx.recv().await {
            let url = format!("{}/{}", base_url, notification.topic);

            let result = client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(notification.message)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("Published to {}", url);
                }
                Ok(response) => {
                    warn!("Notification to {} rejected: {}", url, response.status());
                }
                Err(e) => {
                    warn!("Failed to publish to {}: {}", url, e);
                }
            }
        }

        info!("Notification delivery task stopped");
    }
}

impl NotificationSink for HttpNotifier {
    fn notify(&self, topic: &str, message: &str) -> Result<(), SinkError> {
        self.tx
            .send(Notification {
                topic: topic.to_string(),
                message: message.to_string(),
            })
            .map_err(|_| SinkError::ChannelClosed)
    }
}
