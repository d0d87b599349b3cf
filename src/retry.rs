//! Injectable retry policy for remote calls: a fixed delay between
//! transient-failure attempts, and a longer rate-limit wait that never
//! counts against the attempt budget.
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock, backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How an error should be treated by [`RetryPolicy::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Fatal,
    Transient,
    RateLimited,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            rate_limit_delay: Duration::from_secs(61),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, the error classifies as fatal, or the
    /// attempt budget is exhausted. Rate-limit waits do not consume an
    /// attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        classify: fn(&E) -> RetryClass,
        mut op: F,
    ) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => match classify(&err) {
                    RetryClass::RateLimited => {
                        warn!(%err, "rate limited; waiting before retrying the same page");
                        sleeper.sleep(self.rate_limit_delay).await;
                    }
                    RetryClass::Transient if attempt < self.max_attempts => {
                        warn!(%err, attempt, "attempt failed; retrying after delay");
                        attempt += 1;
                        sleeper.sleep(self.retry_delay).await;
                    }
                    _ => return Err(err),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeSleeper {
        slept: Arc<Mutex<Vec<Duration>>>,
    }

    #[async_trait]
    impl Sleeper for FakeSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    #[derive(Debug)]
    enum TestError {
        Transient,
        RateLimited,
        Fatal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn classify(err: &TestError) -> RetryClass {
        match err {
            TestError::Transient => RetryClass::Transient,
            TestError::RateLimited => RetryClass::RateLimited,
            TestError::Fatal => RetryClass::Fatal,
        }
    }

    #[tokio::test]
    async fn transient_errors_retry_with_fixed_delay() {
        let sleeper = FakeSleeper::default();
        let policy = RetryPolicy::default();
        let calls = Arc::new(Mutex::new(0u32));
        let calls2 = calls.clone();

        let result: Result<(), TestError> = policy
            .run(&sleeper, classify, move || {
                let calls = calls2.clone();
                async move {
                    *calls.lock().unwrap() += 1;
                    Err(TestError::Transient)
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(*calls.lock().unwrap(), 3);
        let slept = sleeper.slept.lock().unwrap().clone();
        assert_eq!(slept, vec![Duration::from_secs(5), Duration::from_secs(5)]);
    }

    #[tokio::test]
    async fn rate_limit_waits_without_consuming_attempts() {
        let sleeper = FakeSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let calls = Arc::new(Mutex::new(0u32));
        let calls2 = calls.clone();

        let result: Result<u32, TestError> = policy
            .run(&sleeper, classify, move || {
                let calls = calls2.clone();
                async move {
                    let mut n = calls.lock().unwrap();
                    *n += 1;
                    // Rate limited three times, then transient once, then ok.
                    match *n {
                        1..=3 => Err(TestError::RateLimited),
                        4 => Err(TestError::Transient),
                        _ => Ok(*n),
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 5);
        let slept = sleeper.slept.lock().unwrap().clone();
        assert_eq!(
            slept,
            vec![
                Duration::from_secs(61),
                Duration::from_secs(61),
                Duration::from_secs(61),
                Duration::from_secs(5),
            ]
        );
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let sleeper = FakeSleeper::default();
        let policy = RetryPolicy::default();
        let result: Result<(), TestError> = policy
            .run(&sleeper, classify, || async { Err(TestError::Fatal) })
            .await;
        assert!(result.is_err());
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_on_first_attempt_never_sleeps() {
        let sleeper = FakeSleeper::default();
        let policy = RetryPolicy::default();
        let result: Result<u32, TestError> =
            policy.run(&sleeper, classify, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }
}
