//! Reachability probes for descriptor endpoints

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

use super::ping::ping_once;
use crate::models::Endpoint;

/// Prober configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Timeout for each TCP connect attempt
    pub connect_timeout: Duration,
    /// Total TCP connect attempts per endpoint
    pub tcp_attempts: u32,
    /// Pause between failed TCP attempts
    pub retry_backoff: Duration,
    /// Allow the ping fallback to run at all
    pub ping_enabled: bool,
    /// Reply wait for the ping fallback
    pub ping_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            tcp_attempts: 2,
            retry_backoff: Duration::from_millis(100),
            ping_enabled: true,
            ping_timeout: Duration::from_secs(2),
        }
    }
}

/// Reachability checks used by the health checker
///
/// Implementations never fail: any error is a negative verdict.
#[async_trait]
pub trait Prober: Send + Sync {
    /// TCP connect check, including retries
    async fn tcp(&self, endpoint: &Endpoint) -> bool;

    /// ICMP-style echo check
    async fn ping(&self, host: &str) -> bool;
}

/// Prober backed by real sockets and the system `ping`
#[derive(Debug, Clone, Default)]
pub struct NetworkProber {
    config: ProbeConfig,
}

impl NetworkProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn tcp(&self, endpoint: &Endpoint) -> bool {
        tcp_reachable(
            &endpoint.host,
            endpoint.port,
            self.config.connect_timeout,
            self.config.tcp_attempts,
            self.config.retry_backoff,
        )
        .await
    }

    async fn ping(&self, host: &str) -> bool {
        if !self.config.ping_enabled {
            return false;
        }
        ping_once(host, self.config.ping_timeout).await
    }
}

/// Try to open a TCP connection to `host:port`.
///
/// Makes up to `attempts` tries (at least one), each bounded by
/// `connect_timeout`, sleeping `backoff` between failures. The connection is
/// closed as soon as it is established.
pub async fn tcp_reachable(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    attempts: u32,
    backoff: Duration,
) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match timeout(connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                return true;
            }
            Ok(Err(e)) => debug!("TCP {}:{} attempt {} failed: {}", host, port, attempt, e),
            Err(_) => debug!("TCP {}:{} attempt {} timed out", host, port, attempt),
        }

        if attempt < attempts {
            sleep(backoff).await;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_tcp_reachable_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while listener.accept().await.is_ok() {}
        });

        assert!(
            tcp_reachable(
                "127.0.0.1",
                port,
                Duration::from_secs(1),
                1,
                Duration::from_millis(10)
            )
            .await
        );
    }

    #[tokio::test]
    async fn test_tcp_reachable_bracketed_ipv6_host_is_unwrapped() {
        let Ok(listener) = TcpListener::bind("[::1]:0").await else {
            // Host without IPv6 loopback
            return;
        };
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while listener.accept().await.is_ok() {}
        });

        assert!(
            tcp_reachable(
                "[::1]",
                port,
                Duration::from_secs(1),
                1,
                Duration::from_millis(10)
            )
            .await
        );
    }

    #[tokio::test]
    async fn test_tcp_reachable_closed_port_retries_then_fails() {
        let port = closed_port().await;
        let started = tokio::time::Instant::now();

        let alive = tcp_reachable(
            "127.0.0.1",
            port,
            Duration::from_secs(1),
            3,
            Duration::from_millis(50),
        )
        .await;

        assert!(!alive);
        // Two backoffs between three attempts
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_tcp_reachable_zero_attempts_still_tries_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while listener.accept().await.is_ok() {}
        });

        assert!(
            tcp_reachable(
                "127.0.0.1",
                port,
                Duration::from_secs(1),
                0,
                Duration::ZERO
            )
            .await
        );
    }

    #[tokio::test]
    async fn test_network_prober_ping_disabled() {
        let prober = NetworkProber::new(ProbeConfig {
            ping_enabled: false,
            ..ProbeConfig::default()
        });
        assert!(!prober.ping("127.0.0.1").await);
    }

    #[tokio::test]
    async fn test_network_prober_tcp_uses_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while listener.accept().await.is_ok() {}
        });

        let prober = NetworkProber::new(ProbeConfig {
            connect_timeout: Duration::from_secs(1),
            tcp_attempts: 1,
            ..ProbeConfig::default()
        });
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
        assert!(prober.tcp(&endpoint).await);

        let closed = Endpoint::new("127.0.0.1", closed_port().await).unwrap();
        assert!(!prober.tcp(&closed).await);
    }
}
