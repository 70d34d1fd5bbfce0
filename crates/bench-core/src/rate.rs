//! Open-loop rate limiting for the work producer.
//!
//! The producer paces strictly by the configured target rate; it never
//! reacts to worker backlog. Unused capacity accrues as burst slack capped
//! at 10% of the rate, so short stalls are smoothed without letting the
//! submit rate run away.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as Governor};

use crate::error::{BenchError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// RATE LIMITER
// ═══════════════════════════════════════════════════════════════════════════════

/// A token source emitting `rate` tokens per second with bounded slack.
pub struct RateLimiter {
    inner: DefaultDirectRateLimiter,
    rate: u32,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter emitting `rate` tokens per second.
    ///
    /// Burst capacity is `rate / 10`, with a floor of one token.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidOptions`] if `rate` is zero.
    pub fn new(rate: u32) -> Result<Self> {
        let per_second = NonZeroU32::new(rate)
            .ok_or_else(|| BenchError::InvalidOptions("execute rate must be >= 1".into()))?;
        let burst = NonZeroU32::new((rate / 10).max(1))
            .ok_or_else(|| BenchError::InvalidOptions("burst must be >= 1".into()))?;
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Ok(Self {
            inner: Governor::direct(quota),
            rate,
        })
    }

    /// The configured steady-state rate in tokens per second.
    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    /// Suspend until a token is available, consuming exactly one.
    ///
    /// Safe for concurrent callers; each call consumes one token.
    pub async fn take(&self) {
        self.inner.until_ready().await;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn zero_rate_is_rejected() {
        assert!(matches!(
            RateLimiter::new(0),
            Err(BenchError::InvalidOptions(_))
        ));
    }

    #[tokio::test]
    async fn burst_tokens_are_immediate() {
        // 1000/s grants a burst of 100; far fewer takes finish instantly.
        let limiter = RateLimiter::new(1000).unwrap();
        let started = Instant::now();
        for _ in 0..50 {
            limiter.take().await;
        }
        assert!(started.elapsed().as_millis() < 200);
    }

    #[tokio::test]
    async fn sustained_takes_are_paced() {
        // 50/s with burst 5: 20 takes need at least (20 - 5) / 50 = 300ms.
        let limiter = RateLimiter::new(50).unwrap();
        let started = Instant::now();
        for _ in 0..20 {
            limiter.take().await;
        }
        let elapsed = started.elapsed();
        assert!(elapsed.as_millis() >= 250, "finished too fast: {elapsed:?}");
        assert!(elapsed.as_secs() < 2, "finished too slow: {elapsed:?}");
    }

    #[tokio::test]
    async fn concurrent_takes_each_consume_one_token() {
        let limiter = std::sync::Arc::new(RateLimiter::new(100).unwrap());
        // Burst is 10; 30 concurrent takes must spread over >= ~200ms.
        let started = Instant::now();
        let handles: Vec<_> = (0..30)
            .map(|_| {
                let limiter = std::sync::Arc::clone(&limiter);
                tokio::spawn(async move { limiter.take().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(started.elapsed().as_millis() >= 150);
    }
}
