use crate::api::SheetsApi;
use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::types::credentials::AuthorizedClient;
use crate::types::record::FormRecord;
use crate::types::sheets::{DeliveryTarget, RowLocator};
use backon::{ExponentialBuilder, Retryable, Sleeper};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Sleep used between retries. Swapped for a recording fake in tests.
pub type Delay = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

pub fn tokio_delay() -> Delay {
    Arc::new(|d: Duration| tokio::time::sleep(d).boxed())
}

/// Adapts a [`Delay`] to backon's sleeper so the retry future stays `Send`.
struct DelaySleeper(Delay);

impl Sleeper for DelaySleeper {
    type Sleep = BoxFuture<'static, ()>;

    fn sleep(&self, dur: Duration) -> Self::Sleep {
        (self.0)(dur)
    }
}

/// Appends records to the configured sheet, backing off on quota errors.
pub struct SheetsDeliveryClient {
    api: Arc<dyn SheetsApi>,
    target: DeliveryTarget,
    max_attempts: u32,
    base_delay: Duration,
    delay: Delay,
}

impl SheetsDeliveryClient {
    pub fn new(api: Arc<dyn SheetsApi>, target: DeliveryTarget, cfg: &DeliveryConfig) -> Self {
        Self {
            api,
            target,
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            delay: tokio_delay(),
        }
    }

    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    pub fn target(&self) -> &DeliveryTarget {
        &self.target
    }

    // delays base, 2*base, 4*base...; first attempt plus max_attempts-1 retries
    fn retry_policy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(2.0)
            .with_max_times((self.max_attempts - 1) as usize)
    }

    pub async fn append(
        &self,
        client: &AuthorizedClient,
        record: &FormRecord,
    ) -> Result<RowLocator, DeliveryError> {
        let response = (|| async {
            self.api
                .append_row(client.bearer(), &self.target, record)
                .await
        })
        .retry(self.retry_policy())
        .sleep(DelaySleeper(self.delay.clone()))
        .when(DeliveryError::is_rate_limited)
        .notify(|err, dur: Duration| {
            warn!(error = %err, sleep = ?dur, "Sheets quota exhausted, backing off");
        })
        .await?;

        let locator = response.row_locator();
        info!(row = %locator, email = record.email(), "Record appended to sheet");
        Ok(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeSheetsApi, rate_limited, recording_delay, sample_record};
    use axum::http::StatusCode;

    fn client_with(api: Arc<FakeSheetsApi>) -> (SheetsDeliveryClient, Arc<std::sync::Mutex<Vec<Duration>>>) {
        let (delay, slept) = recording_delay();
        let target = DeliveryTarget {
            spreadsheet_id: "sheet-id".into(),
            sheet_name: "Lista".into(),
            column_range: "A:F".into(),
        };
        let client = SheetsDeliveryClient::new(api, target, &DeliveryConfig::default())
            .with_delay(delay);
        (client, slept)
    }

    #[tokio::test]
    async fn retries_rate_limits_with_doubling_delay() {
        let api = Arc::new(FakeSheetsApi::scripted(vec![
            Err(rate_limited()),
            Err(rate_limited()),
            Ok("Lista!A7:F7"),
        ]));
        let (client, slept) = client_with(api.clone());

        let locator = client
            .append(&AuthorizedClient::new("t"), &sample_record("a@x"))
            .await
            .unwrap();

        assert_eq!(locator, RowLocator::Row(7));
        assert_eq!(api.calls(), 3);
        assert_eq!(
            *slept.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let api = Arc::new(FakeSheetsApi::scripted(vec![
            Err(rate_limited()),
            Err(rate_limited()),
            Err(rate_limited()),
            Ok("Lista!A1:F1"),
        ]));
        let (client, _slept) = client_with(api.clone());

        let err = client
            .append(&AuthorizedClient::new("t"), &sample_record("a@x"))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let api = Arc::new(FakeSheetsApi::scripted(vec![Err(DeliveryError::Api {
            status: StatusCode::FORBIDDEN,
            error: None,
        })]));
        let (client, slept) = client_with(api.clone());

        let err = client
            .append(&AuthorizedClient::new("t"), &sample_record("a@x"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Api { status, .. } if status == StatusCode::FORBIDDEN));
        assert_eq!(api.calls(), 1);
        assert!(slept.lock().unwrap().is_empty());
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn append_future_can_cross_threads() {
        let (client, _slept) = client_with(Arc::new(FakeSheetsApi::always_ok()));
        let client = Arc::new(client);
        let bearer = AuthorizedClient::new("t");
        let record = sample_record("a@x");
        assert_send(&client.append(&bearer, &record));

        let locator = tokio::spawn(async move { client.append(&bearer, &record).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locator, RowLocator::Row(2));
    }

    #[tokio::test]
    async fn unparsable_range_yields_unknown_locator() {
        let api = Arc::new(FakeSheetsApi::scripted(vec![Ok("Lista")]));
        let (client, _slept) = client_with(api);

        let locator = client
            .append(&AuthorizedClient::new("t"), &sample_record("a@x"))
            .await
            .unwrap();
        assert_eq!(locator, RowLocator::Unknown);
    }
}
