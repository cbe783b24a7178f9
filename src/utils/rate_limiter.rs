/// Token bucket rate limiter for provider endpoints
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    capacity: u32,
    refill_every: Duration,
    bucket: Arc<Mutex<Bucket>>,
}

impl RateLimiter {
    /// `requests_per_second` of zero is treated as one
    pub fn per_second(requests_per_second: u32) -> Self {
        let capacity = requests_per_second.max(1);
        RateLimiter {
            capacity,
            refill_every: Duration::from_secs(1),
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Try to acquire a token, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Wait until a token is available, then acquire it
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Refill whole periods elapsed since the last refill
    fn refill(&self, bucket: &mut Bucket) {
        let elapsed = bucket.last_refill.elapsed();
        if elapsed >= self.refill_every {
            let periods = (elapsed.as_secs_f64() / self.refill_every.as_secs_f64()) as u32;
            bucket.tokens = bucket
                .tokens
                .saturating_add(periods.saturating_mul(self.capacity))
                .min(self.capacity);
            bucket.last_refill = Instant::now();
        }
    }

    /// Get current available tokens
    pub async fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.tokens
    }
}
