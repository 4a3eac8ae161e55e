//! Core engine: the scheduled discover → select → estimate → approve →
//! execute sweep, and the registry and config state it reads.
//!
//! All shared mutable state (the live config snapshot, the loaded raw
//! document and the installed stage set) sits behind a single async mutex.
//! A sweep holds it for its whole pass, so `customize` and `reconfigure`
//! only ever take effect between sweeps.

pub mod scheduler;
pub mod sweep;
pub mod watcher;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ConfigSnapshot, RawConfig, KEY_WAIT, MIN_WAIT};
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::stages::{Customization, Defaults, StageSet};

pub use scheduler::SchedulerState;
pub use sweep::{StageFailure, SweepReport};

struct EngineState {
    /// Last document handed to `reconfigure`, valid or not.
    loaded: Option<Arc<RawConfig>>,
    /// Live snapshot; `None` while the loaded document is rejected.
    snapshot: Option<Arc<ConfigSnapshot>>,
    stages: Arc<StageSet>,
    version: u64,
}

/// The liquidator context: stage registry, configuration manager and
/// scheduler in one object, shared by reference with the config watcher and
/// the process entry point.
pub struct Liquidator {
    state: Mutex<EngineState>,
    defaults: Defaults,
    period: watch::Sender<Duration>,
    scheduler: watch::Sender<SchedulerState>,
    shutdown: Shutdown,
}

impl Liquidator {
    /// A liquidator with every stage set to `defaults` and no configuration.
    pub fn new(defaults: Defaults) -> Self {
        let stages = Arc::new(Customization::new().resolve(&defaults));
        let (period, _) = watch::channel(MIN_WAIT);
        let (scheduler, _) = watch::channel(SchedulerState::Idle);
        Self {
            state: Mutex::new(EngineState {
                loaded: None,
                snapshot: None,
                stages,
                version: 0,
            }),
            defaults,
            period,
            scheduler,
            shutdown: Shutdown::new(),
        }
    }

    // -- Stage registry --------------------------------------------------

    /// Replace the whole stage set. Stages the customization leaves out are
    /// reset to their defaults.
    ///
    /// Once the swap is done the loaded config document is validated again
    /// against the new validator list; if it is rejected the configuration
    /// becomes unset rather than falling back to the previous snapshot.
    pub async fn customize(&self, customization: Customization) {
        let stages = Arc::new(customization.resolve(&self.defaults));
        {
            let mut state = self.state.lock().await;
            state.stages = stages;
        }
        debug!("Stage set replaced");

        if let Err(e) = self.revalidate().await {
            warn!(error = %e, "Config rejected by new stage set");
        }
    }

    /// The installed stage set.
    pub async fn stages(&self) -> Arc<StageSet> {
        Arc::clone(&self.state.lock().await.stages)
    }

    // -- Configuration manager -------------------------------------------

    /// Validate `raw` against the core validator and every stage validator,
    /// in order. On success it becomes the live snapshot and the scheduler
    /// period is reset; on the first rejection the configuration is unset
    /// and the error returned.
    pub async fn reconfigure(&self, raw: RawConfig) -> Result<(), ConfigError> {
        let raw = Arc::new(raw);
        let mut state = self.state.lock().await;
        state.loaded = Some(Arc::clone(&raw));
        self.apply(&mut state, raw)
    }

    /// Drop both the loaded document and the live snapshot, e.g. after the
    /// config file failed to load.
    pub async fn clear_config(&self) {
        let mut state = self.state.lock().await;
        state.loaded = None;
        state.snapshot = None;
        info!("Configuration cleared");
    }

    /// The live snapshot, if the last loaded document was accepted.
    pub async fn snapshot(&self) -> Option<Arc<ConfigSnapshot>> {
        self.state.lock().await.snapshot.clone()
    }

    /// The current sweep period (the last accepted `liquidator.wait`).
    pub fn period(&self) -> Duration {
        *self.period.borrow()
    }

    async fn revalidate(&self) -> Result<(), ConfigError> {
        let mut state = self.state.lock().await;
        match state.loaded.clone() {
            Some(raw) => self.apply(&mut state, raw),
            None => Ok(()),
        }
    }

    fn apply(&self, state: &mut EngineState, raw: Arc<RawConfig>) -> Result<(), ConfigError> {
        let wait = match state.stages.validate(&raw).and_then(|_| raw.duration(KEY_WAIT)) {
            Ok(wait) => wait,
            Err(e) => {
                // Never keep using an older snapshot once the file changed.
                state.snapshot = None;
                return Err(e);
            }
        };

        state.version += 1;
        state.snapshot = Some(Arc::new(ConfigSnapshot {
            version: state.version,
            raw,
            wait,
            loaded_at: Utc::now(),
        }));
        self.period.send_replace(wait);

        info!(version = state.version, wait = ?wait, "Configuration applied");
        Ok(())
    }

    // -- Sweeps and scheduling -------------------------------------------

    /// Run one sweep now, waiting for any in-flight sweep or reconfiguration
    /// to finish first.
    pub async fn sweep(&self, signal: &ShutdownSignal) -> SweepReport {
        let state = self.state.lock().await;
        let snapshot = state.snapshot.clone();
        let stages = Arc::clone(&state.stages);
        // The guard stays held until the pass is over.
        let report = sweep::run(signal, snapshot, stages).await;
        drop(state);
        report
    }

    /// Sweep on every tick of the configured period until `signal` fires or
    /// [`cancel`](Self::cancel) is called. Returns `Ok(())` on cancellation;
    /// an error means the scheduler itself cannot continue.
    pub async fn start(&self, signal: ShutdownSignal) -> anyhow::Result<()> {
        if signal.is_cancelled() {
            self.shutdown.trigger();
        }
        let forward = tokio::spawn({
            let shutdown = self.shutdown.clone();
            async move {
                signal.cancelled().await;
                shutdown.trigger();
            }
        });

        let result = scheduler::run(self, self.shutdown.signal()).await;
        forward.abort();
        result
    }

    /// Stop the scheduler: no new sweep starts, and a running sweep ends at
    /// its next cancellation checkpoint. Permanent for this liquidator.
    pub fn cancel(&self) {
        self.shutdown.trigger();
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        *self.scheduler.borrow()
    }

    /// Resolves once the scheduler reaches `wanted`.
    pub async fn wait_for_state(&self, wanted: SchedulerState) {
        let mut rx = self.scheduler.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|s| *s == wanted).await;
    }
}

impl Default for Liquidator {
    fn default() -> Self {
        Self::new(Defaults::standard())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
