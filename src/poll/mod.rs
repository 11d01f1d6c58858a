//! Recurring poll cycles, one task per configured provider.
//!
//! Every provider that has complete settings gets its own tokio task which runs
//! a cycle, publishes the resulting snapshot and sleeps until the next one. The
//! task owns a cancellation token: cancelling it ends any pending delay, and a
//! cycle still in flight completes without publishing its result.

pub mod cycle;

use crate::api::{Error, ProxyClient};
use crate::model::{Anchor, ProviderId, ProviderInstance, ProviderType, Settings, Snapshot};
use crate::store::{BlobStore, CredentialStore};
use crate::view::{self, ProviderView};
use cycle::PollTarget;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Retries of a failed cycle before falling back to the normal interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(self.initial_delay * 2u32.saturating_pow(attempt - 1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub retry: RetryPolicy,
    /// Fixed anchor for every poller; `None` captures the local date at start.
    pub anchor: Option<Anchor>,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: POLL_INTERVAL,
            retry: RetryPolicy::default(),
            anchor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PollState {
    Idle,
    AwaitingSettings,
    Fetching,
    Succeeded,
    Failed {
        error: String,
    },
    Scheduled {
        #[serde(rename = "delayMs")]
        delay_ms: u64,
        attempt: u32,
    },
    Stopped,
}

impl PollState {
    fn scheduled(delay: Duration, attempt: u32) -> Self {
        PollState::Scheduled {
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
        }
    }
}

impl Default for PollState {
    fn default() -> Self {
        PollState::Idle
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub state: PollState,
    pub snapshot: Option<Snapshot>,
    pub anchor: Option<Anchor>,
    pub editing: bool,
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

type StatusTable = Arc<RwLock<HashMap<ProviderId, ProviderStatus>>>;

struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct PollTask {
    id: ProviderId,
    target: PollTarget,
    anchor: Anchor,
    client: ProxyClient,
    config: PollConfig,
    statuses: StatusTable,
    token: CancellationToken,
}

impl PollTask {
    async fn run(self) {
        let mut attempt = 0;

        loop {
            if !self.update(|s| s.state = PollState::Fetching) {
                break;
            }

            let delay = match self.target.fetch(&self.client, &self.anchor).await {
                Ok(snapshot) => {
                    attempt = 0;
                    let published = self.update(move |s| {
                        s.snapshot = Some(snapshot);
                        s.successes += 1;
                        s.last_error = None;
                        s.state = PollState::Succeeded;
                    });
                    if !published {
                        log::debug!("Discarding snapshot of stopped provider {}", self.id);
                        break;
                    }
                    self.config.interval
                }
                Err(e) => {
                    log::error!("Poll cycle of {} failed: {}", self.id, e);
                    attempt += 1;
                    let delay = match self.config.retry.delay(attempt) {
                        Some(delay) if e.is_transient() => delay,
                        _ => {
                            attempt = 0;
                            self.config.interval
                        }
                    };
                    let recorded = self.update(|s| {
                        s.failures += 1;
                        s.last_error = Some(e.to_string());
                        s.state = PollState::Failed {
                            error: e.to_string(),
                        };
                    });
                    if !recorded {
                        break;
                    }
                    delay
                }
            };

            log::debug!("Next poll of {} in {:?}", self.id, delay);
            if !self.update(|s| s.state = PollState::scheduled(delay, attempt)) {
                break;
            }

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        log::debug!("Poller of {} finished", self.id);
    }

    /// Apply `f` to this provider's status, unless the poller was cancelled
    /// or the provider is gone.
    fn update<F: FnOnce(&mut ProviderStatus)>(&self, f: F) -> bool {
        let mut statuses = match self.statuses.write() {
            Ok(statuses) => statuses,
            Err(e) => {
                log::error!("Status table poisoned: {}", e);
                return false;
            }
        };
        if self.token.is_cancelled() {
            return false;
        }
        match statuses.get_mut(&self.id) {
            Some(status) => {
                f(status);
                true
            }
            None => false,
        }
    }
}

/// Application state: stored providers, their pollers and latest snapshots.
pub struct Monitor<S> {
    store: Mutex<CredentialStore<S>>,
    client: ProxyClient,
    config: PollConfig,
    statuses: StatusTable,
    handles: Mutex<HashMap<ProviderId, PollHandle>>,
}

impl<S: BlobStore> Monitor<S> {
    pub fn new(store: CredentialStore<S>, client: ProxyClient, config: PollConfig) -> Self {
        Monitor {
            store: Mutex::new(store),
            client,
            config,
            statuses: Arc::new(RwLock::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, CredentialStore<S>>, Error> {
        self.store.lock().or(Err(Error::InternalError))
    }

    pub fn providers(&self) -> Vec<ProviderInstance> {
        self.store().map(|store| store.list()).unwrap_or_default()
    }

    pub fn provider(&self, id: &ProviderId) -> Option<ProviderInstance> {
        self.store().ok().and_then(|store| store.get(id))
    }

    /// Store a new provider with empty settings; it waits for settings.
    pub fn add_provider(&self, provider_type: ProviderType) -> Result<ProviderInstance, Error> {
        let instance = self.store()?.add(provider_type)?;
        self.start(&instance);
        Ok(instance)
    }

    pub fn remove_provider(&self, id: &ProviderId) -> Result<(), Error> {
        self.store()?.remove(id)?;
        self.stop(id);
        if let Ok(mut statuses) = self.statuses.write() {
            statuses.remove(id);
        }
        Ok(())
    }

    /// Persist new settings and restart polling with them.
    pub fn update_settings(
        &self,
        id: &ProviderId,
        settings: Settings,
    ) -> Result<ProviderInstance, Error> {
        let instance = {
            let store = self.store()?;
            store.update_settings(id, settings)?;
            store
                .get(id)
                .ok_or_else(|| Error::UnknownProvider(id.to_string()))?
        };

        self.start(&instance);
        Ok(instance)
    }

    pub fn start_all(&self) {
        for instance in self.providers() {
            self.start(&instance);
        }
    }

    /// (Re)start polling `instance`. Without complete settings no task is
    /// spawned and the provider awaits settings.
    pub fn start(&self, instance: &ProviderInstance) {
        let (mut handles, mut statuses) = match (self.handles.lock(), self.statuses.write()) {
            (Ok(handles), Ok(statuses)) => (handles, statuses),
            _ => {
                log::error!("Unable to start {}: state poisoned", instance.id);
                return;
            }
        };

        if let Some(previous) = handles.remove(&instance.id) {
            previous.token.cancel();
        }

        let status = statuses.entry(instance.id.clone()).or_default();
        status.snapshot = None;
        status.editing = false;

        let target = match PollTarget::from_instance(instance) {
            Some(target) => target,
            None => {
                log::info!(
                    "Provider {} needs settings: {:?}",
                    instance.id,
                    instance.provider_type.missing_settings(&instance.settings)
                );
                status.state = PollState::AwaitingSettings;
                status.anchor = None;
                return;
            }
        };

        let anchor = self.config.anchor.unwrap_or_else(Anchor::now);
        status.state = PollState::Idle;
        status.anchor = Some(anchor);

        let token = CancellationToken::new();
        let task = PollTask {
            id: instance.id.clone(),
            target,
            anchor,
            client: self.client.clone(),
            config: self.config,
            statuses: Arc::clone(&self.statuses),
            token: token.clone(),
        };

        log::info!(
            "Polling {} provider {} (anchor {})",
            instance.provider_type,
            instance.id,
            anchor.date
        );
        let task = tokio::spawn(task.run());
        handles.insert(instance.id.clone(), PollHandle { token, task });
    }

    /// Cancel polling of `id` and discard its snapshot.
    pub fn stop(&self, id: &ProviderId) {
        let (mut handles, mut statuses) = match (self.handles.lock(), self.statuses.write()) {
            (Ok(handles), Ok(statuses)) => (handles, statuses),
            _ => {
                log::error!("Unable to stop {}: state poisoned", id);
                return;
            }
        };

        if let Some(handle) = handles.remove(id) {
            handle.token.cancel();
            log::info!("Stopped polling {}", id);
        }
        if let Some(status) = statuses.get_mut(id) {
            status.state = PollState::Stopped;
            status.snapshot = None;
        }
    }

    pub fn shutdown(&self) {
        let ids: Vec<ProviderId> = match self.handles.lock() {
            Ok(handles) => handles.keys().cloned().collect(),
            Err(_) => return,
        };
        for id in ids {
            self.stop(&id);
        }
    }

    pub fn is_polling(&self, id: &ProviderId) -> bool {
        self.handles
            .lock()
            .map(|handles| handles.get(id).map_or(false, |h| !h.task.is_finished()))
            .unwrap_or(false)
    }

    pub fn status(&self, id: &ProviderId) -> Option<ProviderStatus> {
        self.statuses
            .read()
            .ok()
            .and_then(|statuses| statuses.get(id).cloned())
    }

    pub fn snapshot(&self, id: &ProviderId) -> Option<Snapshot> {
        self.status(id).and_then(|status| status.snapshot)
    }

    pub fn view(&self, id: &ProviderId) -> Option<ProviderView> {
        let instance = self.provider(id)?;
        Some(view::resolve(&instance, self.status(id).as_ref()))
    }

    pub fn views(&self) -> Vec<(ProviderInstance, ProviderView)> {
        self.providers()
            .into_iter()
            .map(|instance| {
                let view = view::resolve(&instance, self.status(&instance.id).as_ref());
                (instance, view)
            })
            .collect()
    }

    /// Switch `id` to settings capture, keeping its snapshot and poller.
    pub fn edit_settings(&self, id: &ProviderId) -> Result<(), Error> {
        self.set_editing(id, true)
    }

    pub fn cancel_edit(&self, id: &ProviderId) -> Result<(), Error> {
        self.set_editing(id, false)
    }

    fn set_editing(&self, id: &ProviderId, editing: bool) -> Result<(), Error> {
        if self.provider(id).is_none() {
            return Err(Error::UnknownProvider(id.to_string()));
        }
        let mut statuses = self.statuses.write().or(Err(Error::InternalError))?;
        statuses.entry(id.clone()).or_default().editing = editing;
        Ok(())
    }
}

impl<S> Drop for Monitor<S> {
    fn drop(&mut self) {
        if let Ok(handles) = self.handles.lock() {
            for handle in handles.values() {
                handle.token.cancel();
            }
        }
    }
}
