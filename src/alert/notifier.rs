/// Best-effort webhook delivery of alert events.
///
/// One POST per event, bounded timeout, no retries. Delivery failure never
/// propagates as an error: the evaluation already succeeded, so the caller
/// gets a `DeliveryStatus` and the failure is logged with classification.

use std::time::Duration;

use crate::logging;
use crate::model::AlertEvent;

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The endpoint answered 2xx; carries the status code.
    Delivered(u16),
    /// The attempt failed or the endpoint answered non-2xx; carries a
    /// description. The alert event itself remains valid.
    Unconfirmed(String),
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered(_))
    }
}

/// Posts alert events to a configured webhook endpoint.
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    /// Default 10-second deadline per attempt.
    pub fn new(url: &str) -> Self {
        Self::with_timeout(url, Duration::from_secs(10))
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Attempts delivery once. Blocks at most `timeout`.
    pub fn notify(&self, event: &AlertEvent) -> DeliveryStatus {
        let result = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(event)
            .send();

        match result {
            Ok(response) => {
                let code = response.status().as_u16();
                if response.status().is_success() {
                    logging::debug(
                        logging::DataSource::Alert,
                        Some(&event.station_id),
                        &format!("alert delivered, HTTP {}", code),
                    );
                    DeliveryStatus::Delivered(code)
                } else {
                    let reason = format!("HTTP {}", code);
                    logging::log_delivery_failure(&event.station_id, &reason);
                    DeliveryStatus::Unconfirmed(reason)
                }
            }
            Err(e) => {
                let reason = e.to_string();
                logging::log_delivery_failure(&event.station_id, &reason);
                DeliveryStatus::Unconfirmed(reason)
            }
        }
    }
}
