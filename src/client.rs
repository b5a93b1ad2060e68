//! The Instapaper client: authorization, submission and the offline queue.
//!
//! [`InstapaperClient`] owns one credential store, one pending queue and one
//! reachability monitor. Cloning it is cheap; clones share all state.
//!
//! When queuing is enabled with [`InstapaperClient::set_queue_urls`], a submission that
//! fails because the service is unreachable or failing is persisted and reported as
//! [`InstapaperError::UnreachableUrlQueued`]. Queued submissions are sent, oldest first,
//! when the service becomes reachable again, after a successful
//! [`InstapaperClient::authorize`], or on an explicit
//! [`InstapaperClient::send_queued_urls`]. Only one drain runs at a time; triggers that
//! arrive while a drain is running are folded into one extra pass.

use crate::config::Config;
use crate::credentials::{Account, KeyringCredentialStore};
use crate::error::{InstapaperError, Result};
use crate::http::InstapaperHttpClient;
use crate::queue::{FileQueueStore, PendingQueue, PendingSubmission};
use crate::reachability::{ReachabilityMonitor, ReachabilityStatus, TcpProbe};
use crate::traits::{CredentialStore, QueueStore, ReachabilityProbe, Transport};
use futures::FutureExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Outcome of a queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Submissions sent and removed from the queue
    pub sent: usize,
    /// The failure that stopped the last pass, if any
    pub stopped_on: Option<InstapaperError>,
    /// True when another drain was already running and took over this request
    pub coalesced: bool,
}

/// Client for the Instapaper Simple API with an offline submission queue.
#[derive(Clone)]
pub struct InstapaperClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    queue: PendingQueue,
    reachability: ReachabilityMonitor,
    queue_on_failure: AtomicBool,
    monitoring_started: AtomicBool,
    // Serializes account writes against credential reads.
    account_lock: RwLock<()>,
    drain_lock: Mutex<()>,
    drain_requested: AtomicBool,
}

impl std::fmt::Debug for InstapaperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstapaperClient")
            .field("queue_on_failure", &self.is_queue_enabled())
            .field("reachability", &self.inner.reachability)
            .finish_non_exhaustive()
    }
}

impl InstapaperClient {
    /// Creates a new client builder.
    pub fn builder() -> InstapaperClientBuilder {
        InstapaperClientBuilder::default()
    }

    /// Creates a client with the production stack: HTTP transport, platform keychain,
    /// queue file and TCP reachability probe, all taken from `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Verifies the credentials with the service and stores them.
    ///
    /// The password may be `None`; Instapaper accounts do not require one. Verified
    /// credentials that cannot be stored are reported as a keychain error.
    pub async fn authorize(&self, username: &str, password: Option<&str>) -> Result<()> {
        if crate::utils::is_blank(username) {
            return Err(InstapaperError::NoUsername);
        }
        self.start_monitoring();

        let account = Account::new(username.trim(), password);
        if let Err(e) = self.inner.transport.authenticate(&account).await {
            let err = InstapaperError::from(e);
            self.note_failure(&err);
            warn!(username = %account.username, error = %err, "Authorization failed");
            return Err(err);
        }
        self.note_reachable();

        {
            let _guard = self.inner.account_lock.write().await;
            self.inner.credentials.save(&account)?;
        }
        info!(
            username = %account.username,
            has_password = account.has_password(),
            "Authorized Instapaper account"
        );

        if self.is_queue_enabled() {
            self.spawn_drain();
        }
        Ok(())
    }

    /// Saves a URL to the stored account.
    ///
    /// With queuing enabled, connectivity failures queue the URL and return
    /// [`InstapaperError::UnreachableUrlQueued`].
    pub async fn send(
        &self,
        url: &str,
        title: Option<&str>,
        selection: Option<&str>,
    ) -> Result<()> {
        if crate::utils::is_blank(url) {
            return Err(InstapaperError::NoUrl);
        }
        let account = self.stored_account().await?;
        self.start_monitoring();

        let submission = PendingSubmission::new(url.trim(), title, selection);
        match self.inner.transport.add_url(&account, &submission).await {
            Ok(()) => {
                self.note_reachable();
                debug!(url = %submission.url, "Sent URL to Instapaper");
                Ok(())
            }
            Err(e) => {
                let err = InstapaperError::from(e);
                self.note_failure(&err);
                if err.is_queueable() && self.is_queue_enabled() {
                    info!(url = %submission.url, reason = %err, "Queueing URL until Instapaper is reachable");
                    self.inner.queue.enqueue(submission).await?;
                    return Err(InstapaperError::UnreachableUrlQueued);
                }
                warn!(url = %submission.url, error = %err, "Failed to send URL");
                Err(err)
            }
        }
    }

    pub async fn has_stored_account(&self) -> bool {
        self.stored_account().await.is_ok()
    }

    /// Gets the stored account's username.
    pub async fn account_username(&self) -> Result<String> {
        Ok(self.stored_account().await?.username)
    }

    /// Deletes the stored account. Succeeds when nothing is stored.
    pub async fn delete_stored_account(&self) -> Result<()> {
        let _guard = self.inner.account_lock.write().await;
        self.inner.credentials.delete()?;
        info!("Deleted stored Instapaper account");
        Ok(())
    }

    /// Sets whether failed submissions are queued. Existing queue contents are kept.
    pub fn set_queue_urls(&self, enabled: bool) {
        self.inner.queue_on_failure.store(enabled, Ordering::SeqCst);
    }

    pub fn is_queue_enabled(&self) -> bool {
        self.inner.queue_on_failure.load(Ordering::SeqCst)
    }

    /// Sends every queued submission now, regardless of the queuing flag.
    ///
    /// Also starts reachability monitoring, so call it on launch to flush URLs queued
    /// by a previous run. Safe to call while another drain is running.
    pub async fn send_queued_urls(&self) -> Result<DrainReport> {
        self.start_monitoring();
        self.drain().await
    }

    /// Returns the queued submissions, oldest first.
    pub async fn queued_submissions(&self) -> Result<Vec<PendingSubmission>> {
        self.inner.queue.peek_all().await
    }

    /// Drops every queued submission.
    pub async fn clear_queue(&self) -> Result<()> {
        self.inner.queue.clear().await
    }

    pub fn reachability_status(&self) -> ReachabilityStatus {
        self.inner.reachability.current_status()
    }

    /// Stops reachability monitoring. Queued submissions stay persisted.
    pub fn shutdown(&self) {
        self.inner.reachability.stop();
        self.inner.monitoring_started.store(false, Ordering::SeqCst);
    }

    async fn stored_account(&self) -> Result<Account> {
        let _guard = self.inner.account_lock.read().await;
        self.inner.credentials.load()
    }

    fn start_monitoring(&self) {
        if self.inner.monitoring_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.reachability.start();
    }

    fn note_reachable(&self) {
        self.inner
            .reachability
            .set_status(ReachabilityStatus::ReachableViaAny);
    }

    fn note_failure(&self, err: &InstapaperError) {
        if err.is_queueable() {
            self.inner
                .reachability
                .set_status(ReachabilityStatus::Unreachable);
        }
    }

    fn spawn_drain(&self) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.drain().await {
                warn!(error = %e, "Queued URL drain failed");
            }
        });
    }

    /// Runs passes until no trigger is pending. A storage failure ends its pass but
    /// not the triggers folded in while it ran; the last pass decides the result.
    async fn drain(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        let mut failure = None;
        self.inner.drain_requested.store(true, Ordering::SeqCst);

        loop {
            let Ok(guard) = self.inner.drain_lock.try_lock() else {
                debug!("Queue drain already running");
                report.coalesced = true;
                return Ok(report);
            };
            while self.inner.drain_requested.swap(false, Ordering::SeqCst) {
                failure = match self.drain_pass(&mut report).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(error = %e, "Queue drain pass failed");
                        Some(e)
                    }
                };
            }
            drop(guard);

            // A trigger may have arrived between the last pass and the unlock.
            if !self.inner.drain_requested.load(Ordering::SeqCst) {
                return match failure {
                    Some(e) => Err(e),
                    None => Ok(report),
                };
            }
        }
    }

    /// Sends a snapshot of the queue in order, stopping at the first failure.
    async fn drain_pass(&self, report: &mut DrainReport) -> Result<()> {
        let snapshot = self.inner.queue.peek_all().await?;
        if snapshot.is_empty() {
            return Ok(());
        }
        info!(count = snapshot.len(), "Sending queued URLs to Instapaper");
        report.stopped_on = None;

        for submission in snapshot {
            let account = match self.stored_account().await {
                Ok(account) => account,
                Err(e) => {
                    warn!(error = %e, "Cannot send queued URLs without a stored account");
                    report.stopped_on = Some(e);
                    return Ok(());
                }
            };

            if let Err(e) = self.inner.transport.add_url(&account, &submission).await {
                let err = InstapaperError::from(e);
                self.note_failure(&err);
                warn!(url = %submission.url, error = %err, "Stopping queue drain");
                report.stopped_on = Some(err);
                return Ok(());
            }

            self.inner.queue.remove(&submission).await?;
            report.sent += 1;
            debug!(url = %submission.url, "Sent queued URL");
            self.note_reachable();
        }
        Ok(())
    }
}

/// Builder for [`InstapaperClient`].
///
/// Collaborators that are not set are created from the configuration.
#[derive(Default)]
pub struct InstapaperClientBuilder {
    config: Option<Config>,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    queue_store: Option<Arc<dyn QueueStore>>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    queue_on_failure: bool,
}

impl InstapaperClientBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn queue_store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.queue_store = Some(store);
        self
    }

    pub fn reachability_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Initial value of the queuing flag (default: disabled).
    pub fn queue_urls(mut self, enabled: bool) -> Self {
        self.queue_on_failure = enabled;
        self
    }

    pub fn build(self) -> Result<InstapaperClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(InstapaperHttpClient::with_config(config.clone())?),
        };
        let credentials: Arc<dyn CredentialStore> = match self.credentials {
            Some(store) => store,
            None => Arc::new(KeyringCredentialStore::new(
                config.storage.keychain_service.clone(),
            )?),
        };
        let queue_store: Arc<dyn QueueStore> = self
            .queue_store
            .unwrap_or_else(|| Arc::new(FileQueueStore::new(config.storage.queue_path.clone())));
        let probe: Arc<dyn ReachabilityProbe> = self
            .probe
            .unwrap_or_else(|| Arc::new(TcpProbe::from_config(&config.reachability)));

        let inner = Arc::new(ClientInner {
            transport,
            credentials,
            queue: PendingQueue::new(queue_store),
            reachability: ReachabilityMonitor::new(probe, config.reachability.clone()),
            queue_on_failure: AtomicBool::new(self.queue_on_failure),
            monitoring_started: AtomicBool::new(false),
            account_lock: RwLock::new(()),
            drain_lock: Mutex::new(()),
            drain_requested: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        inner.reachability.on_became_reachable(move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let client = InstapaperClient { inner };
                if !client.is_queue_enabled() {
                    return;
                }
                if let Err(e) = client.drain().await {
                    warn!(error = %e, "Queued URL drain failed");
                }
            }
            .boxed()
        });

        Ok(InstapaperClient { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::error::TransportError;
    use crate::queue::MemoryQueueStore;
    use crate::reachability::StaticProbe;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    type AddBehavior =
        Box<dyn Fn(usize, &PendingSubmission) -> std::result::Result<(), TransportError> + Send + Sync>;

    /// Transport whose answers are scripted per call.
    struct StubTransport {
        auth_status: Option<u16>,
        auth_unreachable: bool,
        add: AddBehavior,
        delay: Duration,
        auth_calls: AtomicUsize,
        add_calls: AtomicUsize,
        sent: StdMutex<Vec<String>>,
    }

    impl StubTransport {
        fn new<F>(add: F) -> Self
        where
            F: Fn(usize, &PendingSubmission) -> std::result::Result<(), TransportError>
                + Send
                + Sync
                + 'static,
        {
            Self {
                auth_status: None,
                auth_unreachable: false,
                add: Box::new(add),
                delay: Duration::ZERO,
                auth_calls: AtomicUsize::new(0),
                add_calls: AtomicUsize::new(0),
                sent: StdMutex::new(Vec::new()),
            }
        }

        fn succeeding() -> Self {
            Self::new(|_, _| Ok(()))
        }

        fn unreachable() -> Self {
            let mut stub =
                Self::new(|_, _| Err(TransportError::Unreachable("connection refused".into())));
            stub.auth_unreachable = true;
            stub
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn authenticate(&self, _account: &Account) -> std::result::Result<(), TransportError> {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            if self.auth_unreachable {
                return Err(TransportError::Unreachable("connection refused".into()));
            }
            match self.auth_status {
                Some(status) => Err(TransportError::Status {
                    status,
                    body: String::new(),
                }),
                None => Ok(()),
            }
        }

        async fn add_url(
            &self,
            _account: &Account,
            submission: &PendingSubmission,
        ) -> std::result::Result<(), TransportError> {
            let attempt = self.add_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.add)(attempt, submission)?;
            self.sent.lock().unwrap().push(submission.url.clone());
            Ok(())
        }
    }

    /// Queue store whose next write fails once when armed.
    #[derive(Default)]
    struct FlakyQueueStore {
        inner: MemoryQueueStore,
        fail_next_store: AtomicBool,
    }

    #[async_trait]
    impl QueueStore for FlakyQueueStore {
        async fn load(&self) -> Result<Vec<PendingSubmission>> {
            self.inner.load().await
        }

        async fn store(&self, entries: &[PendingSubmission]) -> Result<()> {
            if self.fail_next_store.swap(false, Ordering::SeqCst) {
                return Err(InstapaperError::storage_error("disk full"));
            }
            self.inner.store(entries).await
        }
    }

    struct Harness {
        client: InstapaperClient,
        transport: Arc<StubTransport>,
        credentials: Arc<MemoryCredentialStore>,
    }

    fn harness(transport: StubTransport, account: Option<Account>) -> Harness {
        harness_with_store(transport, account, Arc::new(MemoryQueueStore::new()))
    }

    fn harness_with_store(
        transport: StubTransport,
        account: Option<Account>,
        queue_store: Arc<dyn QueueStore>,
    ) -> Harness {
        let transport = Arc::new(transport);
        let credentials = Arc::new(match account {
            Some(account) => MemoryCredentialStore::with_account(account),
            None => MemoryCredentialStore::new(),
        });
        let client = InstapaperClient::builder()
            .transport(transport.clone())
            .credential_store(credentials.clone())
            .queue_store(queue_store)
            .reachability_probe(Arc::new(StaticProbe::new(false)))
            .build()
            .unwrap();
        Harness {
            client,
            transport,
            credentials,
        }
    }

    fn reader() -> Option<Account> {
        Some(Account::new("reader@example.com", Some("secret")))
    }

    async fn queued_urls(client: &InstapaperClient) -> Vec<String> {
        client
            .queued_submissions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.url)
            .collect()
    }

    #[tokio::test]
    async fn test_authorize_blank_username() {
        let h = harness(StubTransport::succeeding(), None);
        for username in ["", " ", "\t\n"] {
            assert_eq!(
                h.client.authorize(username, Some("pw")).await,
                Err(InstapaperError::NoUsername)
            );
        }
        assert_eq!(h.transport.auth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authorize_stores_account() {
        let h = harness(StubTransport::succeeding(), None);
        assert!(!h.client.has_stored_account().await);

        h.client.authorize("reader@example.com", None).await.unwrap();

        assert!(h.client.has_stored_account().await);
        assert_eq!(
            h.client.account_username().await.unwrap(),
            "reader@example.com"
        );
        assert_eq!(h.credentials.load().unwrap().password, "");
    }

    #[tokio::test]
    async fn test_authorize_status_mapping() {
        let mut transport = StubTransport::succeeding();
        transport.auth_status = Some(403);
        let h = harness(transport, None);
        assert_eq!(
            h.client.authorize("reader", Some("wrong")).await,
            Err(InstapaperError::InvalidCredentials)
        );
        assert!(!h.client.has_stored_account().await);

        let mut transport = StubTransport::succeeding();
        transport.auth_status = Some(500);
        let h = harness(transport, None);
        assert_eq!(
            h.client.authorize("reader", None).await,
            Err(InstapaperError::ServiceIssues)
        );
    }

    #[tokio::test]
    async fn test_authorize_unreachable_is_never_queued() {
        let h = harness(StubTransport::unreachable(), None);
        h.client.set_queue_urls(true);
        assert_eq!(
            h.client.authorize("reader", None).await,
            Err(InstapaperError::Unreachable)
        );
        assert!(h.client.queued_submissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authorize_keychain_failure() {
        let h = harness(StubTransport::succeeding(), None);
        h.credentials.set_failing(true);
        let result = h.client.authorize("reader", None).await;
        assert!(matches!(result, Err(InstapaperError::Keychain { .. })));
        assert_eq!(h.transport.auth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_blank_url() {
        let h = harness(StubTransport::succeeding(), None);
        h.credentials.set_failing(true);
        // Validated before the credential store is touched
        assert_eq!(h.client.send("", None, None).await, Err(InstapaperError::NoUrl));
        assert_eq!(h.client.send("  ", None, None).await, Err(InstapaperError::NoUrl));
        assert_eq!(h.transport.add_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_keychain_failure_not_queued() {
        let h = harness(StubTransport::unreachable(), reader());
        h.client.set_queue_urls(true);
        h.credentials.set_failing(true);

        let result = h.client.send("https://example.com", None, None).await;
        assert!(matches!(result, Err(InstapaperError::Keychain { .. })));
        assert_eq!(h.transport.add_calls.load(Ordering::SeqCst), 0);
        assert!(h.client.queued_submissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_without_account() {
        let h = harness(StubTransport::succeeding(), None);
        assert_eq!(
            h.client.send("https://example.com", None, None).await,
            Err(InstapaperError::NoStoredAccount)
        );
        assert_eq!(h.transport.add_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_success() {
        let h = harness(StubTransport::succeeding(), reader());
        h.client
            .send("https://example.com/a", Some("A"), Some("quote"))
            .await
            .unwrap();
        assert_eq!(h.transport.sent(), vec!["https://example.com/a"]);
    }

    #[tokio::test]
    async fn test_send_invalid_credentials_not_queued() {
        let h = harness(
            StubTransport::new(|_, _| {
                Err(TransportError::Status {
                    status: 403,
                    body: String::new(),
                })
            }),
            reader(),
        );
        h.client.set_queue_urls(true);
        assert_eq!(
            h.client.send("https://example.com", None, None).await,
            Err(InstapaperError::InvalidCredentials)
        );
        assert!(h.client.queued_submissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_unreachable_without_queue() {
        let h = harness(StubTransport::unreachable(), reader());
        assert!(!h.client.is_queue_enabled());
        assert_eq!(
            h.client.send("https://example.com", None, None).await,
            Err(InstapaperError::Unreachable)
        );
        assert!(h.client.queued_submissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_service_issues_without_queue() {
        let h = harness(
            StubTransport::new(|_, _| {
                Err(TransportError::Status {
                    status: 500,
                    body: String::new(),
                })
            }),
            reader(),
        );
        assert_eq!(
            h.client.send("https://example.com", None, None).await,
            Err(InstapaperError::ServiceIssues)
        );
    }

    #[tokio::test]
    async fn test_send_unreachable_queues_at_tail() {
        let h = harness(StubTransport::unreachable(), reader());
        h.client.set_queue_urls(true);

        for url in ["https://example.com/1", "https://example.com/2"] {
            assert_eq!(
                h.client.send(url, Some("title"), None).await,
                Err(InstapaperError::UnreachableUrlQueued)
            );
        }

        let queued = h.client.queued_submissions().await.unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[1].url, "https://example.com/2");
        assert_eq!(queued[1].title.as_deref(), Some("title"));
        assert_eq!(h.client.reachability_status(), ReachabilityStatus::Unreachable);
    }

    #[tokio::test]
    async fn test_drain_stops_at_first_failure() {
        let h = harness(
            StubTransport::new(|attempt, _| {
                if attempt == 2 {
                    Err(TransportError::Unreachable("dropped".into()))
                } else {
                    Ok(())
                }
            }),
            reader(),
        );
        for n in 1..=5 {
            h.client
                .inner
                .queue
                .enqueue(PendingSubmission::new(format!("https://example.com/{n}"), None, None))
                .await
                .unwrap();
        }

        let report = h.client.send_queued_urls().await.unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.stopped_on, Some(InstapaperError::Unreachable));
        assert_eq!(
            h.transport.sent(),
            vec!["https://example.com/1", "https://example.com/2"]
        );
        assert_eq!(
            queued_urls(&h.client).await,
            vec![
                "https://example.com/3",
                "https://example.com/4",
                "https://example.com/5"
            ]
        );

        // The next trigger picks up where the last one stopped
        let report = h.client.send_queued_urls().await.unwrap();
        assert_eq!(report.sent, 3);
        assert!(queued_urls(&h.client).await.is_empty());
    }

    #[tokio::test]
    async fn test_drain_empty_queue() {
        let h = harness(StubTransport::succeeding(), reader());
        let report = h.client.send_queued_urls().await.unwrap();
        assert_eq!(report, DrainReport::default());
        assert_eq!(h.transport.add_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drain_without_account_keeps_queue() {
        let h = harness(StubTransport::succeeding(), None);
        h.client
            .inner
            .queue
            .enqueue(PendingSubmission::new("https://example.com", None, None))
            .await
            .unwrap();

        let report = h.client.send_queued_urls().await.unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(report.stopped_on, Some(InstapaperError::NoStoredAccount));
        assert_eq!(queued_urls(&h.client).await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_drains_send_each_once() {
        let mut transport = StubTransport::succeeding();
        transport.delay = Duration::from_millis(50);
        let h = harness(transport, reader());
        for n in 1..=4 {
            h.client
                .inner
                .queue
                .enqueue(PendingSubmission::new(format!("https://example.com/{n}"), None, None))
                .await
                .unwrap();
        }

        let first = tokio::spawn({
            let client = h.client.clone();
            async move { client.send_queued_urls().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = h.client.send_queued_urls().await.unwrap();
        let first = first.await.unwrap().unwrap();

        // Exactly one of the two calls did the work
        assert!(first.coalesced ^ second.coalesced);
        assert_eq!(first.sent + second.sent, 4);
        assert_eq!(
            h.transport.sent(),
            vec![
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3",
                "https://example.com/4"
            ]
        );
        assert_eq!(h.transport.add_calls.load(Ordering::SeqCst), 4);
        assert!(queued_urls(&h.client).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_storage_failure_keeps_coalesced_trigger() {
        let store = Arc::new(FlakyQueueStore::default());
        let mut transport = StubTransport::succeeding();
        transport.delay = Duration::from_millis(50);
        let h = harness_with_store(transport, reader(), store.clone());
        h.client
            .inner
            .queue
            .enqueue(PendingSubmission::new("https://example.com/1", None, None))
            .await
            .unwrap();
        store.fail_next_store.store(true, Ordering::SeqCst);

        let first = tokio::spawn({
            let client = h.client.clone();
            async move { client.send_queued_urls().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = h.client.send_queued_urls().await.unwrap();
        assert!(second.coalesced);

        // The folded-in trigger gets its own pass, which retries the failed removal
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.sent, 1);
        assert!(queued_urls(&h.client).await.is_empty());
        assert_eq!(
            h.transport.sent(),
            vec!["https://example.com/1", "https://example.com/1"]
        );
    }

    #[tokio::test]
    async fn test_storage_failure_reported_without_pending_trigger() {
        let store = Arc::new(FlakyQueueStore::default());
        let h = harness_with_store(StubTransport::succeeding(), reader(), store.clone());
        h.client
            .inner
            .queue
            .enqueue(PendingSubmission::new("https://example.com/1", None, None))
            .await
            .unwrap();
        store.fail_next_store.store(true, Ordering::SeqCst);

        let result = h.client.send_queued_urls().await;
        assert!(matches!(result, Err(InstapaperError::Storage { .. })));
        assert_eq!(queued_urls(&h.client).await.len(), 1);
    }

    #[tokio::test]
    async fn test_authorize_flushes_queue_when_enabled() {
        let h = harness(StubTransport::succeeding(), None);
        h.client.set_queue_urls(true);
        h.client
            .inner
            .queue
            .enqueue(PendingSubmission::new("https://example.com/later", None, None))
            .await
            .unwrap();

        h.client.authorize("reader", Some("pw")).await.unwrap();

        for _ in 0..50 {
            if queued_urls(&h.client).await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(queued_urls(&h.client).await.is_empty());
        assert_eq!(h.transport.sent(), vec!["https://example.com/later"]);
    }

    #[tokio::test]
    async fn test_reachability_transition_triggers_drain() {
        let h = harness(StubTransport::succeeding(), reader());
        h.client.set_queue_urls(true);
        h.client
            .inner
            .queue
            .enqueue(PendingSubmission::new("https://example.com/queued", None, None))
            .await
            .unwrap();

        h.client
            .inner
            .reachability
            .set_status(ReachabilityStatus::ReachableViaAny);

        for _ in 0..50 {
            if queued_urls(&h.client).await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.transport.sent(), vec!["https://example.com/queued"]);
    }

    #[tokio::test]
    async fn test_reachability_ignored_when_queue_disabled() {
        let h = harness(StubTransport::succeeding(), reader());
        h.client
            .inner
            .queue
            .enqueue(PendingSubmission::new("https://example.com/queued", None, None))
            .await
            .unwrap();

        h.client
            .inner
            .reachability
            .set_status(ReachabilityStatus::ReachableViaAny);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(h.transport.sent().is_empty());
        assert_eq!(queued_urls(&h.client).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_stored_account() {
        let h = harness(StubTransport::succeeding(), None);
        // Empty store
        assert!(h.client.delete_stored_account().await.is_ok());

        h.client.authorize("reader", None).await.unwrap();
        assert!(h.client.has_stored_account().await);

        h.client.delete_stored_account().await.unwrap();
        assert!(!h.client.has_stored_account().await);
        assert_eq!(
            h.client.account_username().await,
            Err(InstapaperError::NoStoredAccount)
        );

        h.credentials.set_failing(true);
        assert!(matches!(
            h.client.delete_stored_account().await,
            Err(InstapaperError::Keychain { .. })
        ));
        assert!(matches!(
            h.client.account_username().await,
            Err(InstapaperError::Keychain { .. })
        ));
    }

    #[tokio::test]
    async fn test_disabling_queue_keeps_contents() {
        let h = harness(StubTransport::unreachable(), reader());
        h.client.set_queue_urls(true);
        let _ = h.client.send("https://example.com", None, None).await;
        h.client.set_queue_urls(false);
        assert_eq!(queued_urls(&h.client).await.len(), 1);

        h.client.clear_queue().await.unwrap();
        assert!(queued_urls(&h.client).await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_monitoring() {
        let h = harness(StubTransport::succeeding(), reader());
        h.client.send("https://example.com", None, None).await.unwrap();
        assert!(h.client.inner.reachability.is_running());

        h.client.shutdown();
        assert!(!h.client.inner.reachability.is_running());
    }

    #[test]
    fn test_builder_validates_config() {
        let mut config = Config::default();
        config.http.request_timeout_secs = 0;
        let result = InstapaperClient::builder()
            .config(config)
            .transport(Arc::new(StubTransport::succeeding()))
            .credential_store(Arc::new(MemoryCredentialStore::new()))
            .build();
        assert!(matches!(result, Err(InstapaperError::Config { .. })));
    }
}
