use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serialbridge_session::{Session, SessionError};
use serialbridge_transport::{CancelToken, SerialChannel};
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::producer::Producer;
use crate::snapshot::fallback_payload;

/// Default cadence in seconds.
pub const DEFAULT_INTERVAL_SECS: f64 = 5.0;

/// Default phase within each cadence cycle, in seconds.
pub const DEFAULT_OFFSET_SECS: f64 = 4.0;

/// Local wall-clock format for iteration timestamps and log lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MAX_SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Smallest wall-clock time `>= now` congruent to `offset` modulo `interval`.
///
/// With `interval = 5` and `offset = 4` the wake slots are `..., 4, 9, 14, 19, ...`.
pub fn next_wake(now: f64, interval: f64, offset: f64) -> f64 {
    let phase = offset.rem_euclid(interval);
    let cycles = ((now - phase) / interval).ceil();
    phase + cycles * interval
}

/// Schedule configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Seconds between exchanges.
    pub interval_secs: f64,
    /// Phase within each interval, in seconds.
    pub offset_secs: f64,
    /// Stop after this many exchanges. `None` runs until cancelled.
    pub max_iterations: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            offset_secs: DEFAULT_OFFSET_SECS,
            max_iterations: None,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(BridgeError::InvalidSchedule(format!(
                "interval must be a positive number of seconds, got {}",
                self.interval_secs
            )));
        }
        if !self.offset_secs.is_finite() {
            return Err(BridgeError::InvalidSchedule(format!(
                "offset must be a finite number of seconds, got {}",
                self.offset_secs
            )));
        }
        Ok(())
    }
}

/// Wall clock used by the scheduler.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn now(&self) -> f64;

    /// Sleep until `wake`. Returns `false` if `cancel` fired first.
    fn sleep_until(&self, wake: f64, cancel: &CancelToken) -> bool;

    /// Human-readable local time for progress lines.
    fn timestamp(&self) -> String;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }

    fn sleep_until(&self, wake: f64, cancel: &CancelToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let remaining = wake - self.now();
            if remaining <= 0.0 {
                return true;
            }
            std::thread::sleep(Duration::from_secs_f64(remaining).min(MAX_SLEEP_SLICE));
        }
    }

    fn timestamp(&self) -> String {
        chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
    }
}

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRecord {
    /// 1-based exchange number.
    pub iteration: u64,
    pub timestamp: String,
    pub payload: String,
    pub reply: String,
    /// True when the producer failed and the fallback snapshot was sent.
    pub fallback: bool,
}

/// How a scheduler run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub iterations: u64,
    pub fallbacks: u64,
    pub cancelled: bool,
}

/// Clock-aligned delivery loop.
pub struct Scheduler<P, K = SystemClock> {
    producer: P,
    clock: K,
    config: ScheduleConfig,
}

impl<P: Producer> Scheduler<P, SystemClock> {
    pub fn new(producer: P, config: ScheduleConfig) -> Result<Self> {
        Self::with_clock(producer, config, SystemClock)
    }
}

impl<P: Producer, K: Clock> Scheduler<P, K> {
    pub fn with_clock(producer: P, config: ScheduleConfig, clock: K) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            producer,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Run until cancelled, the iteration limit is hit, or the link fails.
    ///
    /// Takes ownership of the session and closes its channel exactly once on
    /// the way out, whatever the outcome. `on_exchange` sees every completed
    /// exchange.
    pub fn run<C, F>(
        &mut self,
        mut session: Session<C>,
        cancel: &CancelToken,
        mut on_exchange: F,
    ) -> Result<LoopSummary>
    where
        C: SerialChannel,
        F: FnMut(&ExchangeRecord),
    {
        if !session.is_ready() {
            warn!("starting schedule without a completed handshake");
        }

        let outcome = self.drive(&mut session, cancel, &mut on_exchange);
        let closed = session.close();

        let summary = outcome?;
        closed?;

        info!(
            iterations = summary.iterations,
            fallbacks = summary.fallbacks,
            cancelled = summary.cancelled,
            "schedule stopped"
        );
        Ok(summary)
    }

    fn drive<C, F>(
        &mut self,
        session: &mut Session<C>,
        cancel: &CancelToken,
        on_exchange: &mut F,
    ) -> Result<LoopSummary>
    where
        C: SerialChannel,
        F: FnMut(&ExchangeRecord),
    {
        let mut summary = LoopSummary::default();

        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if self.limit_reached(summary.iterations) {
                break;
            }

            let started = self.clock.now();
            let timestamp = self.clock.timestamp();
            info!(%timestamp, "collecting snapshot");

            let (payload, fallback) = match self.producer.produce() {
                Ok(payload) => (payload, false),
                Err(err) => {
                    warn!(error = %err, "producer failed; sending fallback snapshot");
                    (fallback_payload(), true)
                }
            };

            let reply = match session.execute(&payload, cancel) {
                Ok(reply) => reply,
                Err(SessionError::Cancelled) => {
                    info!("cancelled while awaiting reply");
                    summary.cancelled = true;
                    break;
                }
                Err(err) => return Err(err.into()),
            };

            summary.iterations += 1;
            if fallback {
                summary.fallbacks += 1;
            }
            on_exchange(&ExchangeRecord {
                iteration: summary.iterations,
                timestamp,
                payload,
                reply,
                fallback,
            });

            if self.limit_reached(summary.iterations) {
                break;
            }

            let interval = self.config.interval_secs;
            let mut wake = next_wake(self.clock.now(), interval, self.config.offset_secs);
            if wake <= started {
                wake += interval;
            }
            debug!(wake, "sleeping until next slot");

            if !self.clock.sleep_until(wake, cancel) {
                summary.cancelled = true;
                break;
            }
        }

        Ok(summary)
    }

    fn limit_reached(&self, iterations: u64) -> bool {
        self.config
            .max_iterations
            .is_some_and(|limit| iterations >= limit)
    }
}

impl<P, K> std::fmt::Debug for Scheduler<P, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
