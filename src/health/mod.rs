//! Concurrent health checking for descriptors
//!
//! Fans descriptors out over a bounded pool of in-flight probes and collects
//! one verdict per descriptor. Verdicts arrive in completion order, so the
//! alive list is not ordered like the input.

pub mod ping;
pub mod prober;

pub use prober::{tcp_reachable, NetworkProber, ProbeConfig, Prober};

use std::sync::Arc;

use futures::StreamExt;
use tracing::{info, instrument};

use crate::models::{CheckPolicy, Descriptor};

/// Health checker configuration
#[derive(Debug, Clone)]
pub struct HealthCheckerConfig {
    /// Maximum number of descriptors probed at once
    pub workers: usize,
    /// Log progress every this many completed descriptors
    pub progress_every: usize,
}

impl Default for HealthCheckerConfig {
    fn default() -> Self {
        Self {
            workers: 50,
            progress_every: 50,
        }
    }
}

/// Outcome of checking a single descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Host/port could not be parsed, kept because parsing is lenient
    ParseFailedKept,
    /// Host/port could not be parsed, dropped because parsing is strict
    ParseFailedDropped,
    TcpReachable,
    /// TCP failed but the host answered a ping
    PingReachable,
    Unreachable,
}

impl Verdict {
    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            Verdict::ParseFailedKept | Verdict::TcpReachable | Verdict::PingReachable
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::ParseFailedKept => "parse_failed_kept",
            Verdict::ParseFailedDropped => "parse_failed_dropped",
            Verdict::TcpReachable => "tcp_reachable",
            Verdict::PingReachable => "ping_reachable",
            Verdict::Unreachable => "unreachable",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A descriptor paired with its verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub descriptor: Descriptor,
    pub verdict: Verdict,
}

impl ProbeResult {
    pub fn is_alive(&self) -> bool {
        self.verdict.is_alive()
    }
}

/// Per-verdict tallies for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictCounts {
    pub parse_failed_kept: usize,
    pub parse_failed_dropped: usize,
    pub tcp_reachable: usize,
    pub ping_reachable: usize,
    pub unreachable: usize,
}

impl VerdictCounts {
    fn record(&mut self, verdict: Verdict) {
        let slot = match verdict {
            Verdict::ParseFailedKept => &mut self.parse_failed_kept,
            Verdict::ParseFailedDropped => &mut self.parse_failed_dropped,
            Verdict::TcpReachable => &mut self.tcp_reachable,
            Verdict::PingReachable => &mut self.ping_reachable,
            Verdict::Unreachable => &mut self.unreachable,
        };
        *slot += 1;
    }

    pub fn alive(&self) -> usize {
        self.parse_failed_kept + self.tcp_reachable + self.ping_reachable
    }

    pub fn total(&self) -> usize {
        self.alive() + self.parse_failed_dropped + self.unreachable
    }
}

/// Results of a full health-check pass, in completion order
#[derive(Debug, Clone, Default)]
pub struct HealthReport {
    pub results: Vec<ProbeResult>,
    pub counts: VerdictCounts,
}

impl HealthReport {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
            counts: VerdictCounts::default(),
        }
    }

    fn record(&mut self, result: ProbeResult) {
        self.counts.record(result.verdict);
        self.results.push(result);
    }

    pub fn alive_count(&self) -> usize {
        self.counts.alive()
    }

    /// Alive descriptors in completion order
    pub fn alive(&self) -> impl Iterator<Item = &Descriptor> {
        self.results
            .iter()
            .filter(|r| r.is_alive())
            .map(|r| &r.descriptor)
    }

    pub fn into_alive(self) -> Vec<Descriptor> {
        self.results
            .into_iter()
            .filter(|r| r.is_alive())
            .map(|r| r.descriptor)
            .collect()
    }
}

/// Decide a single descriptor's verdict under `policy`
pub async fn check_descriptor(
    prober: &dyn Prober,
    descriptor: Descriptor,
    policy: CheckPolicy,
) -> ProbeResult {
    let verdict = match descriptor.endpoint() {
        None if policy.strict_parse => Verdict::ParseFailedDropped,
        None => Verdict::ParseFailedKept,
        Some(endpoint) => {
            if prober.tcp(&endpoint).await {
                Verdict::TcpReachable
            } else if !policy.tcp_only && prober.ping(&endpoint.host).await {
                Verdict::PingReachable
            } else {
                Verdict::Unreachable
            }
        }
    };

    ProbeResult {
        descriptor,
        verdict,
    }
}

/// Health checker for descriptor batches
pub struct HealthChecker {
    prober: Arc<dyn Prober>,
    config: HealthCheckerConfig,
}

impl HealthChecker {
    pub fn new(prober: Arc<dyn Prober>, config: HealthCheckerConfig) -> Self {
        Self { prober, config }
    }

    pub fn config(&self) -> &HealthCheckerConfig {
        &self.config
    }

    /// Check every descriptor and return once all have a verdict
    #[instrument(skip_all, fields(policy = policy.label(), total = descriptors.len()))]
    pub async fn run(&self, descriptors: Vec<Descriptor>, policy: CheckPolicy) -> HealthReport {
        let total = descriptors.len();
        let workers = self.config.workers.max(1);
        let progress_every = self.config.progress_every.max(1);

        info!(
            "Checking {} descriptors ({}) with {} workers",
            total,
            policy.label(),
            workers
        );

        let prober = self.prober.as_ref();
        let mut pending = futures::stream::iter(descriptors)
            .map(|descriptor| check_descriptor(prober, descriptor, policy))
            .buffer_unordered(workers);

        let mut report = HealthReport::with_capacity(total);
        while let Some(result) = pending.next().await {
            report.record(result);

            let done = report.results.len();
            if done % progress_every == 0 || done == total {
                info!(
                    "Checked {}/{} ({:.1}%)",
                    done,
                    total,
                    done as f64 * 100.0 / total as f64
                );
            }
        }

        let alive = report.alive_count();
        let alive_percent = if total > 0 {
            alive as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        info!(
            "Health check ({}) complete: {} alive ({:.1}%), tcp={}, ping={}, unparsed kept={}, unparsed dropped={}, unreachable={}",
            policy.label(),
            alive,
            alive_percent,
            report.counts.tcp_reachable,
            report.counts.ping_reachable,
            report.counts.parse_failed_kept,
            report.counts.parse_failed_dropped,
            report.counts.unreachable,
        );

        report
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::Prober;
    use crate::models::Endpoint;

    /// Scripted prober keyed by host; unknown hosts fail both checks
    #[derive(Default)]
    pub struct ScriptedProber {
        outcomes: HashMap<String, (bool, bool)>,
        delay: Option<Duration>,
        pub tcp_calls: AtomicUsize,
        pub ping_calls: AtomicUsize,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl ScriptedProber {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn host(mut self, host: &str, tcp_ok: bool, ping_ok: bool) -> Self {
            self.outcomes.insert(host.to_string(), (tcp_ok, ping_ok));
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn outcome(&self, host: &str) -> (bool, bool) {
            self.outcomes.get(host).copied().unwrap_or((false, false))
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn tcp(&self, endpoint: &Endpoint) -> bool {
            self.tcp_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.outcome(&endpoint.host).0
        }

        async fn ping(&self, host: &str) -> bool {
            self.ping_calls.fetch_add(1, Ordering::SeqCst);
            self.outcome(host).1
        }
    }
}
