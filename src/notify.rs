//! Notification collaborators: calendar, email, chat webhook.
//!
//! Every channel returns a structured `{ok, source, detail}` outcome. Missing
//! configuration yields a successful simulated outcome, so a booking or a
//! report never fails because a side channel is unavailable.

use serde_json::{json, Value};
use tracing::warn;

use crate::config::NotificationsConfig;

pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(config: NotificationsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: config
                .webhook_url
                .filter(|url| !url.trim().is_empty()),
        }
    }

    /// Calendar event for a new booking. No external calendar is wired up,
    /// so this always reports a simulated delivery.
    pub async fn calendar_event(
        &self,
        doctor_name: &str,
        patient_name: &str,
        start_iso: &str,
        end_iso: &str,
    ) -> Value {
        json!({
            "ok": true,
            "source": "simulated_calendar",
            "detail": format!(
                "Appointment: {} with {} ({} to {})",
                patient_name, doctor_name, start_iso, end_iso
            ),
        })
    }

    /// Booking confirmation email. Simulated: there is no mail transport.
    pub async fn email(&self, to: &str, subject: &str, body: &str) -> Value {
        let _ = body;
        json!({
            "ok": true,
            "source": "simulated_email",
            "detail": format!("'{}' to {}", subject, to),
        })
    }

    /// Post a message to the configured chat webhook. Unconfigured or failed
    /// delivery never becomes an error, only an outcome the caller can show.
    pub async fn chat_message(&self, text: &str) -> Value {
        let Some(url) = &self.webhook_url else {
            return json!({
                "ok": true,
                "source": "simulated_webhook",
                "detail": "no webhook configured",
            });
        };

        let resp = self
            .client
            .post(url)
            .json(&json!({ "text": text }))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => json!({
                "ok": true,
                "source": "chat_webhook",
                "detail": "delivered",
            }),
            Ok(r) => {
                warn!(status = %r.status(), "Webhook delivery rejected");
                json!({
                    "ok": false,
                    "source": "chat_webhook",
                    "detail": format!("webhook returned {}", r.status()),
                })
            }
            Err(e) => {
                warn!("Webhook delivery failed: {}", e);
                json!({
                    "ok": false,
                    "source": "chat_webhook",
                    "detail": format!("webhook error: {}", e),
                })
            }
        }
    }

    /// True when a real (non-simulated) chat channel is configured.
    pub fn has_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }
}
