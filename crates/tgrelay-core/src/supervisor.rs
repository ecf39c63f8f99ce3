use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{platform::PlatformPort, Result};

/// Owns the single platform session's lifecycle and the shutdown signal
/// shared by every background activity.
///
/// No other component may connect or disconnect the session; start/stop are
/// idempotent under the supervisor's exclusive control.
pub struct Supervisor {
    platform: Arc<dyn PlatformPort>,
    started: AtomicBool,
    stopped: AtomicBool,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(platform: Arc<dyn PlatformPort>) -> Self {
        Self {
            platform,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Establish the session. Only the first call connects; a connect
    /// failure (invalid credentials) is fatal and the process must not
    /// proceed.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.platform.connect().await
    }

    /// Signal every background task to stop and disconnect the session.
    /// Only the first call disconnects; disconnect failures are logged,
    /// not propagated.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        match self.platform.disconnect().await {
            Ok(()) => info!("session stopped"),
            Err(e) => warn!("session disconnect failed: {e}"),
        }
    }

    /// Token cancelled on `stop`; background loops select on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Block until an interrupt signal arrives or `stop` was called from
    /// elsewhere.
    pub async fn wait_for_shutdown(&self) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
            _ = self.shutdown.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use crate::{
        domain::{ChatTarget, MessageId},
        event::MediaRef,
        platform::MediaKind,
    };

    #[derive(Default)]
    struct CountingPlatform {
        connects: AtomicUsize,
        disconnects: AtomicUsize,
    }

    #[async_trait]
    impl PlatformPort for CountingPlatform {
        async fn connect(&self) -> Result<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn disconnect(&self) -> Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn send_text(&self, _: &ChatTarget, _: &str) -> Result<MessageId> {
            unreachable!()
        }
        async fn send_media(
            &self,
            _: &ChatTarget,
            _: MediaKind,
            _: &str,
            _: Option<&str>,
        ) -> Result<MessageId> {
            unreachable!()
        }
        async fn send_location(&self, _: &ChatTarget, _: f64, _: f64) -> Result<MessageId> {
            unreachable!()
        }
        async fn send_contact(
            &self,
            _: &ChatTarget,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<MessageId> {
            unreachable!()
        }
        async fn edit_text(&self, _: &ChatTarget, _: MessageId, _: &str) -> Result<MessageId> {
            unreachable!()
        }
        async fn delete_message(&self, _: &ChatTarget, _: MessageId) -> Result<()> {
            unreachable!()
        }
        async fn download_media(&self, _: &MediaRef, _: &Path) -> Result<()> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn start_connects_exactly_once() {
        let platform = Arc::new(CountingPlatform::default());
        let supervisor = Supervisor::new(platform.clone());

        supervisor.start().await.unwrap();
        supervisor.start().await.unwrap();

        assert_eq!(platform.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_disconnects_exactly_once_and_cancels_the_token() {
        let platform = Arc::new(CountingPlatform::default());
        let supervisor = Supervisor::new(platform.clone());
        let token = supervisor.shutdown_token();

        supervisor.start().await.unwrap();
        supervisor.stop().await;
        supervisor.stop().await;

        assert_eq!(platform.disconnects.load(Ordering::SeqCst), 1);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_after_stop() {
        let platform = Arc::new(CountingPlatform::default());
        let supervisor = Arc::new(Supervisor::new(platform));

        let waiter = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.wait_for_shutdown().await })
        };

        supervisor.stop().await;
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait_for_shutdown did not return")
            .unwrap();
    }
}
