//! Best-effort new-sale alerts to an external webhook
//!
//! The alert is dispatched on a detached task after the sale transaction
//! commits. It can only ever log; there is no path from a webhook failure
//! back to the mutation that triggered it.

use serde_json::json;

#[derive(Clone)]
pub struct SaleAlerter {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SaleAlerter {
    pub fn new(webhook_url: Option<String>) -> Self {
        if webhook_url.is_none() {
            tracing::info!("ALERT_WEBHOOK_URL not set, sale alerts disabled");
        }
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("ALERT_WEBHOOK_URL").ok())
    }

    /// Fire-and-forget notification about a freshly recorded sale.
    pub fn dispatch_sale_alert(&self, seller_name: &str, value_cents: i64) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };

        let text = format!(
            "New sale recorded! Seller: {} Value: {}",
            seller_name,
            format_cents(value_cents)
        );
        let client = self.client.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&json!({ "text": text })).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(status = %response.status(), "Sale alert delivered");
                }
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "Sale alert rejected by webhook");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to deliver sale alert");
                }
            }
        });
    }
}

/// Render a cent amount as a decimal string, e.g. `12345` -> `"123.45"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
