//! Config Loader (spec §2, §5, §6, §10.3): reads the five config blobs from
//! the store, validates them (fail-fast on missing required keys), and
//! republishes a fresh [`ConfigSnapshot`] on a poll interval so running
//! processors observe updated policy without a restart. Readers get one
//! consistent snapshot per call via a `watch` channel, matching the
//! `StatusPublisher` pattern in `health.rs` and the store's own
//! "publishes via replacement" contract (spec §5).

use std::sync::Arc;
use std::time::Duration;

use jobforge_core::config::ConfigSnapshot;
use jobforge_core::error::StoreError;
use jobforge_core::store::TaskStore;
use tokio::sync::watch;
use tracing::{error, info, instrument};

pub struct ConfigLoader {
    store: Arc<dyn TaskStore>,
    sender: watch::Sender<Arc<ConfigSnapshot>>,
}

impl ConfigLoader {
    /// Loads and validates the initial snapshot synchronously; fails fast
    /// (spec §7 `MissingConfig`, "fatal at worker startup; no task runs")
    /// if any required blob or inner key is absent.
    pub async fn init(store: Arc<dyn TaskStore>) -> Result<(Self, watch::Receiver<Arc<ConfigSnapshot>>), StoreError> {
        let snapshot = Arc::new(store.config_snapshot().await?);
        let (sender, receiver) = watch::channel(snapshot);
        Ok((Self { store, sender }, receiver))
    }

    /// Re-reads and republishes the config snapshot every `interval`. Runs
    /// until the caller drops the last receiver. A transient read/parse
    /// failure is logged and the previous snapshot stays published —
    /// processors keep running on known-good policy rather than being
    /// force-restarted by a momentary config-store hiccup.
    #[instrument(skip(self))]
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.sender.receiver_count() == 0 {
                info!("no config subscribers remain, stopping config loader");
                return;
            }
            match self.store.config_snapshot().await {
                Ok(snapshot) => {
                    let _ = self.sender.send(Arc::new(snapshot));
                }
                Err(e) => {
                    error!(error = %e, "config reload failed, keeping previous snapshot");
                }
            }
        }
    }
}
