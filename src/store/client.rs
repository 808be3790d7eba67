//! Analytic-store client. The store itself is an external collaborator
//! (§1) — everything here is referenced only through [`SpotStore`]; the
//! `clickhouse` client is an implementation detail of [`ClickHouseStore`].

use crate::config::IngesterConfig;
use crate::core::{InsertOutcome, Result};
use crate::store::schema::{create_noise_table_sql, create_spots_table_sql, NoiseRecord, SpotRecord};
use async_trait::async_trait;
use clickhouse::Client;
use tracing::warn;

/// Everything the Ingester and BatchLoader need from the analytic store.
/// Kept as a trait so the pipeline's retry/backoff logic (§4.3 step 3e)
/// can be exercised against a fake in tests without a running server.
#[async_trait]
pub trait SpotStore: Send + Sync {
    async fn insert_spots(&self, rows: &[SpotRecord]) -> InsertOutcome;
    async fn insert_noise(&self, rows: &[NoiseRecord]) -> InsertOutcome;
    async fn ensure_schema(&self) -> Result<()>;
}

/// `SpotStore` backed by a real ClickHouse server via the `clickhouse` crate.
pub struct ClickHouseStore {
    client: Client,
    database: String,
    spots_table: String,
    noise_table: String,
}

impl ClickHouseStore {
    #[must_use]
    pub fn new(config: &IngesterConfig, user: Option<&str>, password: Option<&str>) -> Self {
        let mut client = Client::default()
            .with_url(&config.clickhouse_url)
            .with_database(&config.clickhouse_database);
        if let Some(user) = user {
            client = client.with_user(user);
        }
        if let Some(password) = password {
            client = client.with_password(password);
        }
        Self {
            client,
            database: config.clickhouse_database.clone(),
            spots_table: config.clickhouse_spots_table.clone(),
            noise_table: config.clickhouse_noise_table.clone(),
        }
    }

    /// Build a store targeting overridden table names, used by the
    /// BatchLoader's optional staging mode.
    #[must_use]
    pub fn with_tables(mut self, spots_table: Option<String>, noise_table: Option<String>) -> Self {
        if let Some(t) = spots_table {
            self.spots_table = t;
        }
        if let Some(t) = noise_table {
            self.noise_table = t;
        }
        self
    }
}

#[async_trait]
impl SpotStore for ClickHouseStore {
    async fn insert_spots(&self, rows: &[SpotRecord]) -> InsertOutcome {
        if rows.is_empty() {
            return InsertOutcome::Ok;
        }
        match self.client.insert(&self.spots_table) {
            Ok(mut insert) => {
                for row in rows {
                    if let Err(e) = insert.write(row).await {
                        warn!(error = %e, "spot insert write failed");
                        return InsertOutcome::Retry(e.to_string());
                    }
                }
                match insert.end().await {
                    Ok(()) => InsertOutcome::Ok,
                    Err(e) => InsertOutcome::Retry(e.to_string()),
                }
            }
            Err(e) => InsertOutcome::Retry(e.to_string()),
        }
    }

    async fn insert_noise(&self, rows: &[NoiseRecord]) -> InsertOutcome {
        if rows.is_empty() {
            return InsertOutcome::Ok;
        }
        match self.client.insert(&self.noise_table) {
            Ok(mut insert) => {
                for row in rows {
                    if let Err(e) = insert.write(row).await {
                        warn!(error = %e, "noise insert write failed");
                        return InsertOutcome::Retry(e.to_string());
                    }
                }
                match insert.end().await {
                    Ok(()) => InsertOutcome::Ok,
                    Err(e) => InsertOutcome::Retry(e.to_string()),
                }
            }
            Err(e) => InsertOutcome::Retry(e.to_string()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        let spots_sql = create_spots_table_sql(&self.database, &self.spots_table);
        let noise_sql = create_noise_table_sql(&self.database, &self.noise_table);
        self.client.query(&spots_sql).execute().await?;
        self.client.query(&noise_sql).execute().await?;
        Ok(())
    }
}

/// Retry an insert up to 3 attempts with exponential backoff (base 2s,
/// doubling per attempt), per §4.3 step 3e. Runs on the caller's tokio
/// runtime; callers on the thread-based Ingester loop drive this via
/// `Runtime::block_on`.
pub async fn insert_with_retry<F, Fut>(mut attempt: F) -> InsertOutcome
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = InsertOutcome>,
{
    let mut delay = std::time::Duration::from_secs(2);
    for attempt_no in 1..=3 {
        match attempt().await {
            InsertOutcome::Ok => return InsertOutcome::Ok,
            InsertOutcome::Fatal(reason) => return InsertOutcome::Fatal(reason),
            InsertOutcome::Retry(reason) => {
                if attempt_no == 3 {
                    return InsertOutcome::Retry(reason);
                }
                warn!(attempt = attempt_no, reason = %reason, "insert failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
    unreachable!("loop always returns by attempt 3")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let outcome = insert_with_retry(move || {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    InsertOutcome::Retry("transient".to_string())
                } else {
                    InsertOutcome::Ok
                }
            }
        })
        .await;
        assert_eq!(outcome, InsertOutcome::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_outcome_short_circuits_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let outcome = insert_with_retry(move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                InsertOutcome::Fatal("schema mismatch".to_string())
            }
        })
        .await;
        assert!(matches!(outcome, InsertOutcome::Fatal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_reason() {
        let outcome = insert_with_retry(|| async { InsertOutcome::Retry("still down".to_string()) }).await;
        assert!(matches!(outcome, InsertOutcome::Retry(_)));
    }
}
