//! Config file hot reload.
//!
//! Polls the config file and feeds every change through
//! [`Liquidator::reconfigure`]. A file that fails to load unsets the
//! configuration, the same as one that fails validation.

use anyhow::{Context, Result};
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Liquidator;
use crate::config::RawConfig;
use crate::shutdown::ShutdownSignal;

/// Default interval between file polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Keeps the file watch alive; dropping it stops reloading.
pub struct ConfigWatcher {
    _watcher: PollWatcher,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start watching `path`. Must be called from within a tokio runtime.
    pub fn spawn(
        liq: Arc<Liquidator>,
        path: impl Into<PathBuf>,
        poll_interval: Duration,
        signal: ShutdownSignal,
    ) -> Result<Self> {
        let path = path.into();
        let (tx, rx) = mpsc::channel::<NotifyEvent>(16);

        let mut watcher = PollWatcher::new(
            move |res: Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.try_send(event);
                }
                Err(e) => warn!(error = %e, "config file watch error"),
            },
            notify::Config::default()
                .with_poll_interval(poll_interval)
                .with_compare_contents(true),
        )
        .context("Failed to create config file watcher")?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file {}", path.display()))?;
        info!(path = %path.display(), "Watching config file");

        let task = tokio::spawn(reload_loop(liq, path, rx, signal));
        Ok(Self {
            _watcher: watcher,
            task,
        })
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn reload_loop(
    liq: Arc<Liquidator>,
    path: PathBuf,
    mut rx: mpsc::Receiver<NotifyEvent>,
    signal: ShutdownSignal,
) {
    loop {
        let event = tokio::select! {
            _ = signal.cancelled() => return,
            event = rx.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };

        let mut relevant = is_change(&event);
        // coalesce a burst of events into one reload
        while let Ok(more) = rx.try_recv() {
            relevant |= is_change(&more);
        }
        if !relevant {
            continue;
        }

        info!("config changed. Reloading ...");
        reload(&liq, &path).await;
    }
}

fn is_change(event: &NotifyEvent) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Load `path` and hand it to `reconfigure`, logging any failure.
pub async fn reload(liq: &Liquidator, path: &Path) {
    match RawConfig::load(path) {
        Ok(raw) => match liq.reconfigure(raw).await {
            Ok(()) => debug!(path = %path.display(), "config reloaded"),
            Err(e) => error!(error = %e, "error validating config"),
        },
        Err(e) => {
            error!(error = %e, "config file load error");
            liq.clear_config().await;
        }
    }
}
