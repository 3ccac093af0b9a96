use super::delivery::SheetsDeliveryClient;
use super::queue::{DrainReport, DurableQueue};
use crate::config::DeliveryConfig;
use crate::error::RelayError;
use crate::google_oauth::TokenManager;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info};

/// Completes a consent round-trip and flushes the backlog it unblocks.
pub struct ReauthorizationFlow {
    tokens: Arc<TokenManager>,
    queue: Arc<DurableQueue>,
    delivery: Arc<SheetsDeliveryClient>,
    // paces backlog appends under the Sheets per-minute write quota
    limiter: DefaultDirectRateLimiter,
}

impl ReauthorizationFlow {
    pub fn new(
        tokens: Arc<TokenManager>,
        queue: Arc<DurableQueue>,
        delivery: Arc<SheetsDeliveryClient>,
        cfg: &DeliveryConfig,
    ) -> Self {
        let per_minute = NonZeroU32::new(cfg.drain_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            tokens,
            queue,
            delivery,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    /// Redeem `code`, then drain whatever is pending.
    pub async fn handle_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<DrainReport, RelayError> {
        self.tokens.exchange_code(code, pkce_verifier).await?;
        info!("Google authorization renewed");
        self.drain().await
    }

    pub async fn drain(&self) -> Result<DrainReport, RelayError> {
        if !self.queue.has_pending() {
            debug!("Nothing pending to drain");
            return Ok(DrainReport::default());
        }

        let client = self.tokens.authorized_client().await?;
        let client = &client;
        let report = self
            .queue
            .drain_pending(|record| async move {
                self.limiter.until_ready().await;
                self.delivery.append(client, &record).await.map(|_| ())
            })
            .await?;
        Ok(report)
    }
}
