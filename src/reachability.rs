//! Reachability monitoring for the Instapaper service.
//!
//! A [`ReachabilityMonitor`] tracks whether the service can be reached and runs the
//! registered callbacks on every transition from unreachable to reachable. Status is
//! fed either by a background polling task ([`ReachabilityMonitor::start`]) driven by
//! a [`ReachabilityProbe`], or directly through [`ReachabilityMonitor::set_status`]
//! (the client reports failed requests this way).
//!
//! The monitor starts out unreachable, so the first successful probe counts as a
//! transition.

use crate::config::ReachabilityConfig;
use crate::traits::ReachabilityProbe;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connectivity to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityStatus {
    Unreachable,
    ReachableViaAny,
}

impl ReachabilityStatus {
    pub fn is_reachable(self) -> bool {
        self == ReachabilityStatus::ReachableViaAny
    }
}

/// Callback run when the service becomes reachable.
pub type ReachableCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Observes reachability transitions.
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Clone)]
pub struct ReachabilityMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    probe: Arc<dyn ReachabilityProbe>,
    config: ReachabilityConfig,
    status: Mutex<ReachabilityStatus>,
    callbacks: Mutex<Vec<ReachableCallback>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for ReachabilityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachabilityMonitor")
            .field("status", &self.current_status())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ReachabilityMonitor {
    pub fn new(probe: Arc<dyn ReachabilityProbe>, config: ReachabilityConfig) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                probe,
                config,
                status: Mutex::new(ReachabilityStatus::Unreachable),
                callbacks: Mutex::new(Vec::new()),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn current_status(&self) -> ReachabilityStatus {
        self.inner
            .status
            .lock()
            .map(|status| *status)
            .unwrap_or(ReachabilityStatus::Unreachable)
    }

    /// Registers a callback for unreachable→reachable transitions.
    ///
    /// All registered callbacks run, each once per transition.
    pub fn on_became_reachable<F>(&self, callback: F)
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.inner.callbacks.lock() {
            callbacks.push(Arc::new(callback));
        }
    }

    /// Records the latest status and fires callbacks on a transition to reachable.
    pub fn set_status(&self, status: ReachabilityStatus) {
        self.inner.set_status(status);
    }

    /// Starts background polling. Calling it while already running does nothing.
    pub fn start(&self) {
        let Ok(mut task) = self.inner.task.lock() else {
            return;
        };
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, reachability monitoring not started");
            return;
        };

        info!(
            host = %self.inner.config.probe_host,
            port = self.inner.config.probe_port,
            "Starting reachability monitoring"
        );
        let weak = Arc::downgrade(&self.inner);
        *task = Some(runtime.spawn(poll_loop(weak)));
    }

    /// Stops background polling. Registered callbacks are kept.
    pub fn stop(&self) {
        if let Ok(mut task) = self.inner.task.lock() {
            if let Some(handle) = task.take() {
                debug!("Stopping reachability monitoring");
                handle.abort();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .map(|task| task.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }
}

impl MonitorInner {
    fn set_status(&self, status: ReachabilityStatus) {
        let previous = match self.status.lock() {
            Ok(mut current) => std::mem::replace(&mut *current, status),
            Err(_) => return,
        };
        if previous == status {
            return;
        }
        debug!(?previous, ?status, "Reachability changed");
        if !status.is_reachable() {
            return;
        }

        let callbacks = match self.callbacks.lock() {
            Ok(callbacks) => callbacks.clone(),
            Err(_) => return,
        };
        if callbacks.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                for callback in callbacks {
                    runtime.spawn(callback());
                }
            }
            Err(_) => warn!("Service became reachable outside a tokio runtime, callbacks skipped"),
        }
    }

    fn next_delay(&self) -> Duration {
        let interval = self.config.poll_interval();
        if self.config.enable_jitter {
            let jitter = fastrand::u64(0..=interval.as_millis() as u64 / 4);
            interval + Duration::from_millis(jitter)
        } else {
            interval
        }
    }
}

async fn poll_loop(monitor: Weak<MonitorInner>) {
    loop {
        let Some(inner) = monitor.upgrade() else {
            break;
        };
        let status = inner.probe.probe().await;
        inner.set_status(status);
        let delay = inner.next_delay();
        drop(inner);

        tokio::time::sleep(delay).await;
    }
}

/// Probe that is reachable iff a TCP connection to the service succeeds.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_config(config: &ReachabilityConfig) -> Self {
        Self::new(
            config.probe_host.clone(),
            config.probe_port,
            config.probe_timeout(),
        )
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self) -> ReachabilityStatus {
        let connect = tokio::net::TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => ReachabilityStatus::ReachableViaAny,
            Ok(Err(e)) => {
                debug!(host = %self.host, error = %e, "Reachability probe failed");
                ReachabilityStatus::Unreachable
            }
            Err(_) => {
                debug!(host = %self.host, "Reachability probe timed out");
                ReachabilityStatus::Unreachable
            }
        }
    }
}

/// Probe with a settable answer.
#[derive(Debug, Default)]
pub struct StaticProbe {
    reachable: AtomicBool,
}

impl StaticProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReachabilityProbe for StaticProbe {
    async fn probe(&self) -> ReachabilityStatus {
        if self.reachable.load(Ordering::SeqCst) {
            ReachabilityStatus::ReachableViaAny
        } else {
            ReachabilityStatus::Unreachable
        }
    }
}
