//! Byte-rate limiting shared by every request of a client

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Rates up to this many bytes per second count one token per byte. Faster
/// rates group bytes into tokens so that about this many refill per second.
const TOKEN_GRANULARITY: u64 = 1000;

/// Token-bucket limiter over transferred bytes
#[derive(Clone)]
pub struct BandwidthLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    bytes_per_token: u64,
    tokens_per_second: u32,
}

impl BandwidthLimiter {
    /// `None` when `bytes_per_second` is zero, meaning unlimited
    pub fn new(bytes_per_second: u64) -> Option<Self> {
        if bytes_per_second == 0 {
            return None;
        }

        // tokens * bytes_per_token stays within 0.1% below the requested rate.
        let bytes_per_token = (bytes_per_second / TOKEN_GRANULARITY).max(1);
        let tokens = u32::try_from(bytes_per_second / bytes_per_token).unwrap_or(u32::MAX);
        let tokens_per_second = NonZeroU32::new(tokens)?;

        Some(Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(tokens_per_second))),
            bytes_per_token,
            tokens_per_second: tokens_per_second.get(),
        })
    }

    pub fn bytes_per_token(&self) -> u64 {
        self.bytes_per_token
    }

    /// Bytes the limiter lets through per second
    pub fn effective_rate(&self) -> u64 {
        self.bytes_per_token * u64::from(self.tokens_per_second)
    }

    /// Wait until `bytes` may be transferred.
    pub async fn acquire(&self, bytes: u64) {
        let mut tokens = bytes.div_ceil(self.bytes_per_token);

        // The bucket never holds more than one second of tokens.
        while tokens > 0 {
            let batch = tokens.min(u64::from(self.tokens_per_second)) as u32;
            tokens -= u64::from(batch);
            if let Some(n) = NonZeroU32::new(batch) {
                // Only fails when n exceeds the burst size, which batch never does.
                let _ = self.limiter.until_n_ready(n).await;
            }
        }
    }
}

impl std::fmt::Debug for BandwidthLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandwidthLimiter")
            .field("bytes_per_token", &self.bytes_per_token)
            .field("tokens_per_second", &self.tokens_per_second)
            .finish()
    }
}
