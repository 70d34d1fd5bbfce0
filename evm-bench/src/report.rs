//! InfluxDB histogram reporter.
//!
//! Work results are binned into 100 ms latency buckets; once per status
//! tick the bucket map is serialized as points in the
//! `work/duration/histogram` measurement and written to InfluxDB. Write
//! failures are logged and dropped; the next tick starts afresh with the
//! accumulated buckets intact.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bench_core::{Reporter, WorkResult};
use chrono::Utc;
use influxdb2::models::DataPoint;
use tracing::warn;

/// Measurement name for the latency histogram.
const MEASUREMENT: &str = "work/duration/histogram";

/// Width of one latency bucket in milliseconds.
const BUCKET_WIDTH_MS: u64 = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// INFLUX REPORTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Bins work latencies and periodically flushes them to InfluxDB.
pub struct InfluxReporter {
    client: influxdb2::Client,
    bucket: String,
    tags: Vec<(String, String)>,
    latency_buckets: Mutex<HashMap<u64, u64>>,
}

impl std::fmt::Debug for InfluxReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxReporter")
            .field("bucket", &self.bucket)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl InfluxReporter {
    /// Create a reporter writing to `bucket` at `url` with the given tag
    /// set attached to every point.
    #[must_use]
    pub fn new(
        url: &str,
        org: &str,
        token: &str,
        bucket: String,
        tags: Vec<(String, String)>,
    ) -> Self {
        Self {
            client: influxdb2::Client::new(url, org, token),
            bucket,
            tags,
            latency_buckets: Mutex::new(HashMap::new()),
        }
    }

    fn lock_buckets(&self) -> std::sync::MutexGuard<'_, HashMap<u64, u64>> {
        self.latency_buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Reporter for InfluxReporter {
    fn collect_work_result(&self, work: &WorkResult) {
        let millis = u64::try_from(work.elapsed.as_millis()).unwrap_or(u64::MAX);
        let bucket_id = millis / BUCKET_WIDTH_MS;
        *self.lock_buckets().entry(bucket_id).or_insert(0) += 1;
    }

    async fn publish_report(&self) {
        let snapshot: Vec<(u64, u64)> = self
            .lock_buckets()
            .iter()
            .map(|(id, count)| (*id, *count))
            .collect();
        if snapshot.is_empty() {
            return;
        }

        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut points = Vec::with_capacity(snapshot.len());
        for (bucket_id, count) in snapshot {
            let mut builder = DataPoint::builder(MEASUREMENT).timestamp(timestamp);
            for (name, value) in &self.tags {
                builder = builder.tag(name.clone(), value.clone());
            }
            builder = builder.field(
                (bucket_id * BUCKET_WIDTH_MS).to_string(),
                i64::try_from(count).unwrap_or(i64::MAX),
            );
            match builder.build() {
                Ok(point) => points.push(point),
                Err(e) => warn!(error = %e, bucket_id, "Skipping malformed metric point"),
            }
        }

        if let Err(e) = self
            .client
            .write(&self.bucket, futures::stream::iter(points))
            .await
        {
            warn!(error = %e, measurement = MEASUREMENT, "Failed to publish metrics to InfluxDB");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
