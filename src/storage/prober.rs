//! Primary backend reachability check.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

/// Decides whether the primary backend is reachable.
///
/// Every failure mode folds into `false`; implementations never return errors.
#[async_trait]
pub trait BackendProber: Send + Sync {
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Plain TCP connect, no protocol handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

#[async_trait]
impl BackendProber for TcpProber {
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => {
                tracing::debug!("Primary backend reachable at {}:{}", host, port);
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Could not connect to PostgreSQL at {}:{}: {}", host, port, e);
                false
            }
            Err(_) => {
                tracing::warn!(
                    "Could not connect to PostgreSQL at {}:{}: timed out after {:?}",
                    host,
                    port,
                    timeout
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_listening_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(TcpProber.probe("127.0.0.1", port, TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(!TcpProber.probe("127.0.0.1", port, TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_unreachable() {
        assert!(!TcpProber.probe("primary.invalid", 5432, TIMEOUT).await);
    }
}
