//! Guardian notification collaborator
//!
//! Delivery is fire-and-forget: the ledger sends alerts from a spawned task
//! after the attendance write has committed, and a failed delivery is only
//! logged.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::attendance::AttendanceStatus;

/// Alert describing an attendance transition worth telling a guardian about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceAlert {
    pub record_id: String,
    pub student_id: String,
    pub student_name: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub class_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub previous_status: Option<AttendanceStatus>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    async fn notify(&self, alert: &AttendanceAlert) -> anyhow::Result<()>;
}

/// Default notifier: records the alert in the service log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, alert: &AttendanceAlert) -> anyhow::Result<()> {
        info!(
            "Guardian alert: student {} marked {} on {} (guardian phone: {})",
            alert.student_id,
            alert.status,
            alert.date,
            alert.guardian_phone.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }
}

/// POSTs alerts as JSON to a messaging gateway
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, alert: &AttendanceAlert) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(alert)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Deliver `alert`, logging instead of propagating a failure
pub async fn deliver(notifier: &dyn Notifier, alert: &AttendanceAlert) {
    if let Err(e) = notifier.notify(alert).await {
        warn!(
            "Notifier '{}' failed for attendance record {}: {:#}",
            notifier.name(),
            alert.record_id,
            e
        );
    }
}

/// Build the configured notifier: webhook when a URL is set, log otherwise
pub fn from_webhook_url(url: Option<&str>) -> anyhow::Result<Arc<dyn Notifier>> {
    match url {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(WebhookNotifier::new(url.trim())?)),
        _ => Ok(Arc::new(LogNotifier)),
    }
}
