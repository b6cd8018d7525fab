//! Reconnecting a dropped transport.

use super::ConnectionError;
use crate::config::{ReconnectConfig, ReconnectStrategy};
use crate::transport::{TransportError, TransportSession};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Delay between connection attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Same delay every time.
    Fixed {
        /// Delay.
        interval: Duration,
    },
    /// Delay grows by `multiplier` per attempt, capped at `max`.
    Exponential {
        /// First delay.
        initial: Duration,
        /// Cap.
        max: Duration,
        /// Growth factor.
        multiplier: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            interval: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Policy described by the `[connection.reconnect]` section.
    #[must_use]
    pub fn from_config(config: &ReconnectConfig) -> Self {
        let interval = Duration::from_millis(config.interval_ms);
        match config.strategy {
            ReconnectStrategy::Fixed => Self::Fixed { interval },
            ReconnectStrategy::Exponential => Self::Exponential {
                initial: interval,
                max: Duration::from_millis(config.max_interval_ms).max(interval),
                multiplier: config.multiplier.max(1.0),
            },
        }
    }

    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { interval } => *interval,
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let scaled = initial.as_secs_f64() * multiplier.powi(exponent);
                if scaled.is_finite() && scaled < max.as_secs_f64() {
                    Duration::from_secs_f64(scaled)
                } else {
                    *max
                }
            }
        }
    }
}

/// Opens transport sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempts one connection.
    ///
    /// # Errors
    ///
    /// [`TransportError::Unauthorized`] when the peer rejects credentials,
    /// any other variant for failures worth retrying.
    async fn connect(&self) -> Result<TransportSession, TransportError>;
}

/// Retries a [`Connector`] according to a [`ReconnectPolicy`].
#[derive(Debug)]
pub struct Reconnector<C> {
    connector: C,
    policy: ReconnectPolicy,
    retry_unauthorized: bool,
}

impl<C: Connector> Reconnector<C> {
    /// Reconnector with the default policy.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            policy: ReconnectPolicy::default(),
            retry_unauthorized: false,
        }
    }

    /// Reconnector configured from `[connection.reconnect]`.
    pub fn from_config(connector: C, config: &ReconnectConfig) -> Self {
        Self {
            connector,
            policy: ReconnectPolicy::from_config(config),
            retry_unauthorized: config.retry_unauthorized,
        }
    }

    /// Replaces the policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keeps retrying after authorization failures.
    #[must_use]
    pub fn retry_unauthorized(mut self, retry: bool) -> Self {
        self.retry_unauthorized = retry;
        self
    }

    /// Policy in use.
    #[must_use]
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Connects, retrying until a session opens.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::Cancelled`] once `token` is cancelled.
    /// - [`ConnectionError::Transport`] for an authorization failure when
    ///   those are not retried.
    pub async fn connect(&self, token: &CancellationToken) -> Result<TransportSession, ConnectionError> {
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::select! {
                () = token.cancelled() => return Err(ConnectionError::Cancelled),
                result = self.connector.connect() => result,
            };
            match result {
                Ok(session) => {
                    if attempt > 0 {
                        info!(attempts = attempt + 1, "reconnected");
                    }
                    return Ok(session);
                }
                Err(err @ TransportError::Unauthorized { .. }) if !self.retry_unauthorized => {
                    warn!(error = %err, "not retrying unauthorized connection");
                    return Err(err.into());
                }
                Err(err) => {
                    let delay = self.policy.delay(attempt);
                    warn!(error = %err, attempt, delay_ms = delay.as_millis() as u64, "connect failed, retrying");
                    tokio::select! {
                        () = token.cancelled() => return Err(ConnectionError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Serves sessions until `token` is cancelled.
    ///
    /// Each session is handed to `on_session`; when that returns (the
    /// session ended) a new one is opened.
    ///
    /// # Errors
    ///
    /// The terminal errors of [`connect`](Self::connect), except
    /// cancellation which ends the loop with `Ok`.
    pub async fn run<F, Fut>(&self, token: CancellationToken, mut on_session: F) -> Result<(), ConnectionError>
    where
        F: FnMut(TransportSession) -> Fut,
        Fut: Future<Output = ()>,
    {
        while !token.is_cancelled() {
            let session = match self.connect(&token).await {
                Ok(session) => session,
                Err(ConnectionError::Cancelled) => break,
                Err(err) => return Err(err),
            };
            on_session(session).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory_pair;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        outcomes: Mutex<VecDeque<Result<(), TransportError>>>,
        attempts: AtomicUsize,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<(), TransportError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Connector for Scripted {
        async fn connect(&self) -> Result<TransportSession, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let next = self.outcomes.lock().pop_front().unwrap_or(Ok(()));
            next.map(|()| memory_pair(1).0)
        }
    }

    fn failed() -> Result<(), TransportError> {
        Err(TransportError::Failed {
            reason: "refused".into(),
        })
    }

    #[test]
    fn fixed_delay_constant() {
        let policy = ReconnectPolicy::Fixed {
            interval: Duration::from_millis(250),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(10), Duration::from_millis(250));
    }

    #[test]
    fn exponential_delay_capped() {
        let policy = ReconnectPolicy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(1_000),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn policy_from_config() {
        let config = ReconnectConfig::default();
        assert_eq!(
            ReconnectPolicy::from_config(&config),
            ReconnectPolicy::Fixed {
                interval: Duration::from_millis(5_000)
            }
        );

        let config = ReconnectConfig {
            strategy: ReconnectStrategy::Exponential,
            interval_ms: 10,
            max_interval_ms: 80,
            ..ReconnectConfig::default()
        };
        let policy = ReconnectPolicy::from_config(&config);
        assert_eq!(policy.delay(3), Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_connected() {
        let reconnector = Reconnector::new(Scripted::new(vec![failed(), failed(), Ok(())]))
            .with_policy(ReconnectPolicy::Fixed {
                interval: Duration::from_millis(10),
            });
        let token = CancellationToken::new();
        assert!(reconnector.connect(&token).await.is_ok());
        assert_eq!(reconnector.connector.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_stops_unless_allowed() {
        let unauthorized = || {
            Err(TransportError::Unauthorized {
                reason: "expired".into(),
            })
        };
        let token = CancellationToken::new();

        let strict = Reconnector::new(Scripted::new(vec![unauthorized(), Ok(())]));
        let err = strict.connect(&token).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Transport(TransportError::Unauthorized { .. })
        ));

        let lenient = Reconnector::new(Scripted::new(vec![unauthorized(), Ok(())])).retry_unauthorized(true);
        assert!(lenient.connect(&token).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let reconnector = Reconnector::new(Scripted::new(vec![failed(); 100]));
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            cancel.cancel();
        });
        assert!(matches!(
            reconnector.connect(&token).await,
            Err(ConnectionError::Cancelled)
        ));
        assert_eq!(reconnector.connector.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_serves_sessions_until_cancelled() {
        let reconnector = Reconnector::new(Scripted::new(vec![]));
        let token = CancellationToken::new();
        let served = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&served);
        let stop = token.clone();
        reconnector
            .run(token.clone(), move |_session| {
                let counter = Arc::clone(&counter);
                let stop = stop.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                        stop.cancel();
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(served.load(Ordering::SeqCst), 3);
    }
}
