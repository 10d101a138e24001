//! DaemonRegistry - named daemons, created on first lookup

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{DaemonError, OutputSink};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::daemon::{Lifecycle, ProducerDaemon};
use crate::ticker::{IntervalTicker, Ticker};

type RunHandle = (String, JoinHandle<Result<(), DaemonError>>);

/// Lookup-or-create table of daemons by name
///
/// Owns the cancellation token handed to every `run` started through
/// [`DaemonRegistry::spawn_all`].
pub struct DaemonRegistry<S, T = IntervalTicker> {
    daemons: Mutex<HashMap<String, Arc<ProducerDaemon<S, T>>>>,
    running: Mutex<Vec<RunHandle>>,
    cancel: CancellationToken,
}

impl<S, T> Default for DaemonRegistry<S, T> {
    fn default() -> Self {
        Self {
            daemons: Mutex::new(HashMap::new()),
            running: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }
}

impl<S, T> DaemonRegistry<S, T>
where
    S: OutputSink + Sync + 'static,
    T: Ticker + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn daemons(&self) -> MutexGuard<'_, HashMap<String, Arc<ProducerDaemon<S, T>>>> {
        self.daemons.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the daemon named `name`, creating it with `factory` if absent
    ///
    /// The factory runs at most once per name; a failed factory stores nothing.
    pub fn provide<F>(&self, name: &str, factory: F) -> Result<Arc<ProducerDaemon<S, T>>, DaemonError>
    where
        F: FnOnce(&str) -> Result<ProducerDaemon<S, T>, DaemonError>,
    {
        let mut daemons = self.daemons();
        if let Some(daemon) = daemons.get(name) {
            return Ok(Arc::clone(daemon));
        }

        let daemon = Arc::new(factory(name)?);
        daemons.insert(name.to_string(), Arc::clone(&daemon));
        debug!(daemon = name, "producer daemon registered");
        Ok(daemon)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ProducerDaemon<S, T>>> {
        self.daemons().get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.daemons().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.daemons().len()
    }

    pub fn is_empty(&self) -> bool {
        self.daemons().is_empty()
    }

    /// Forget a daemon; a running daemon keeps running until shutdown
    pub fn remove(&self, name: &str) -> Option<Arc<ProducerDaemon<S, T>>> {
        self.daemons().remove(name)
    }

    /// Forget every daemon
    pub fn clear(&self) {
        self.daemons().clear();
    }

    /// Token cancelled by [`DaemonRegistry::shutdown`]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start every registered daemon that has not been started yet
    ///
    /// Returns how many were started.
    pub fn spawn_all(&self) -> usize {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        let pending: Vec<_> = self
            .daemons()
            .values()
            .filter(|d| d.lifecycle() == Lifecycle::Created)
            .filter(|d| !running.iter().any(|(name, _)| name == d.name()))
            .cloned()
            .collect();

        for daemon in &pending {
            let name = daemon.name().to_string();
            let daemon = Arc::clone(daemon);
            let cancel = self.cancel.child_token();
            running.push((name, tokio::spawn(async move { daemon.run(cancel).await })));
        }
        pending.len()
    }

    /// Cancel every daemon started through `spawn_all` and wait for its drain
    ///
    /// Returns the first failure.
    #[instrument(name = "daemon_registry_shutdown", skip(self))]
    pub async fn shutdown(&self) -> Result<(), DaemonError> {
        self.cancel.cancel();

        let running = std::mem::take(&mut *self.running.lock().unwrap_or_else(PoisonError::into_inner));
        let count = running.len();

        let mut first_error = None;
        for (name, handle) in running {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(DaemonError::panic(&name, e.to_string())),
            };
            if let Err(e) = result {
                error!(daemon = %name, error = %e, "producer daemon failed");
                first_error.get_or_insert(e);
            }
        }

        info!(daemons = count, "producer daemons stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
