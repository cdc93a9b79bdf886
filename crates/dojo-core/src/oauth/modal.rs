use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::machine::{transition, Effect, FlowEvent, FlowState};
use super::{AuthWindow, ConnectionApi, FlowConfig, FlowError, FlowListener, LogListener};

/// Non-error endings of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Connected { connection_id: String },
    /// The user closed the auth window before finishing.
    Cancelled { connection_id: String },
}

/// Drives one connection attempt at a time.
///
/// While a flow is awaiting authorization two timer tasks run: one polls the
/// connection status, the other checks whether the auth window is still
/// open. Both share a [`CancellationToken`] and feed events into a single
/// driver loop, which owns the state machine. Any terminal transition
/// cancels the token and stops both.
pub struct ConnectionModal {
    api: Arc<dyn ConnectionApi>,
    window: Arc<dyn AuthWindow>,
    listener: Arc<dyn FlowListener>,
    config: FlowConfig,
    state: Mutex<FlowState>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when `connect` returns or its future is dropped.
/// A flow abandoned while awaiting authorization goes back to `Idle`.
struct InFlightGuard<'a>(&'a ConnectionModal);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.0.lock_state();
            if state.is_awaiting() {
                tracing::debug!("Connection flow {} abandoned", state.name());
                *state = FlowState::Idle;
            }
        }
        self.0.in_flight.store(false, Ordering::Release);
    }
}

struct Timers {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Timers {
    async fn stop(mut self) {
        self.token.cancel();
        for handle in std::mem::take(&mut self.handles) {
            let _ = handle.await;
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

struct Session {
    connection_id: String,
    tx: mpsc::Sender<FlowEvent>,
    timers: Option<Timers>,
}

impl ConnectionModal {
    pub fn new(api: Arc<dyn ConnectionApi>, window: Arc<dyn AuthWindow>, config: FlowConfig) -> Self {
        Self {
            api,
            window,
            listener: Arc::new(LogListener),
            config,
            state: Mutex::new(FlowState::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn FlowListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn state(&self) -> FlowState {
        self.lock_state().clone()
    }

    /// Return a finished flow to `Idle`. Returns `false` if a flow is still
    /// running.
    pub fn reset(&self) -> bool {
        if self.in_flight.load(Ordering::Acquire) {
            return false;
        }
        self.apply(FlowEvent::Reset);
        true
    }

    /// Run a full connection flow for `user_id` on `toolkit_slug`.
    ///
    /// Resolves once the flow reaches a terminal state. A user closing the
    /// window is not an error and yields [`FlowOutcome::Cancelled`].
    pub async fn connect(&self, toolkit_slug: &str, user_id: &str) -> Result<FlowOutcome, FlowError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(FlowError::AlreadyInFlight);
        }
        let _guard = InFlightGuard(self);

        *self.lock_state() = FlowState::Idle;

        let initiated = match self.api.initiate(toolkit_slug, user_id).await {
            Ok(initiated) => initiated,
            Err(e) => {
                let effects = self.apply(FlowEvent::InitiateFailed(e.to_string()));
                self.run_detached(effects);
                return Err(FlowError::Initiate(e));
            }
        };

        tracing::info!(
            "Awaiting authorization of {} connection {}",
            initiated.toolkit_slug,
            initiated.connection_id
        );

        let (tx, mut rx) = mpsc::channel(16);
        let mut session = Session {
            connection_id: initiated.connection_id.clone(),
            tx,
            timers: None,
        };

        let effects = self.apply(FlowEvent::Initiated {
            connection_id: initiated.connection_id,
            auth_url: initiated.auth_url,
        });
        self.run_effects(effects, &mut session).await;

        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        while self.is_awaiting() {
            let event = tokio::select! {
                Some(event) = rx.recv() => event,
                _ = wait_until(deadline) => FlowEvent::Deadline,
            };
            let effects = self.apply(event);
            self.run_effects(effects, &mut session).await;
        }

        if let Some(timers) = session.timers.take() {
            timers.stop().await;
        }

        match self.state() {
            FlowState::Active { connection_id } => Ok(FlowOutcome::Connected { connection_id }),
            FlowState::Cancelled { connection_id } => Ok(FlowOutcome::Cancelled { connection_id }),
            FlowState::TimedOut { connection_id } => Err(FlowError::TimedOut { connection_id }),
            FlowState::Failed {
                connection_id,
                reason,
            } => Err(FlowError::Failed {
                connection_id,
                reason,
            }),
            other => Err(FlowError::Failed {
                connection_id: other.connection_id().map(str::to_string),
                reason: format!("Flow ended in unexpected state {}", other.name()),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_awaiting(&self) -> bool {
        self.lock_state().is_awaiting()
    }

    fn apply(&self, event: FlowEvent) -> Vec<Effect> {
        let mut state = self.lock_state();
        let (next, effects) = transition(&state, event, self.config.poll_error_threshold);
        if next.name() != state.name() {
            tracing::debug!("Connection flow {} -> {}", state.name(), next.name());
        }
        *state = next;
        effects
    }

    /// Effects that need no session (an initiate failure).
    fn run_detached(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.notify(&effect);
        }
    }

    fn notify(&self, effect: &Effect) {
        match effect {
            Effect::NotifyConnected(id) => self.listener.on_connected(id),
            Effect::ShowError(message) => self.listener.on_error(message),
            Effect::Warn(message) => self.listener.on_warning(message),
            Effect::LogPollError(message) => {
                tracing::warn!("Connection status check failed: {}", message)
            }
            _ => {}
        }
    }

    async fn run_effects(&self, effects: Vec<Effect>, session: &mut Session) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::OpenWindow(url) => {
                    if let Err(e) = self.window.open(&url).await {
                        queue.extend(self.apply(FlowEvent::WindowFailed(e.to_string())));
                    }
                }
                Effect::StartTimers => {
                    if self.is_awaiting() && session.timers.is_none() {
                        session.timers = Some(self.spawn_timers(&session.connection_id, &session.tx));
                    }
                }
                Effect::StopTimers => {
                    if let Some(timers) = session.timers.take() {
                        timers.stop().await;
                    }
                }
                Effect::CloseWindow => self.window.close().await,
                other => self.notify(&other),
            }
        }
    }

    fn spawn_timers(&self, connection_id: &str, tx: &mpsc::Sender<FlowEvent>) -> Timers {
        let token = CancellationToken::new();
        let status = tokio::spawn(poll_status(
            self.api.clone(),
            connection_id.to_string(),
            self.config.status_interval,
            tx.clone(),
            token.clone(),
        ));
        let liveness = tokio::spawn(watch_window(
            self.window.clone(),
            self.config.liveness_interval,
            tx.clone(),
            token.clone(),
        ));
        Timers {
            token,
            handles: vec![status, liveness],
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn poll_status(
    api: Arc<dyn ConnectionApi>,
    connection_id: String,
    period: Duration,
    tx: mpsc::Sender<FlowEvent>,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = api.status(&connection_id) => match result {
                Ok(response) => FlowEvent::StatusPolled(response.status),
                Err(e) => FlowEvent::PollError(e.to_string()),
            },
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = tx.send(event) => if sent.is_err() { break },
        }
    }
    tracing::debug!("Status polling for {} stopped", connection_id);
}

async fn watch_window(
    window: Arc<dyn AuthWindow>,
    period: Duration,
    tx: mpsc::Sender<FlowEvent>,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !window.is_closed().await {
            continue;
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            _ = tx.send(FlowEvent::WindowClosed) => {}
        }
        break;
    }
    tracing::debug!("Auth window watcher stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ServerError;
    use crate::models::{ConnectionInitiateResponse, ConnectionStatus, ConnectionStatusResponse};

    #[derive(Default)]
    struct ScriptedApi {
        script: Mutex<VecDeque<Result<ConnectionStatus, String>>>,
        initiated: AtomicUsize,
        polls: AtomicUsize,
        fail_initiate: AtomicBool,
    }

    impl ScriptedApi {
        fn with_script(script: Vec<Result<ConnectionStatus, String>>) -> Arc<Self> {
            let api = Self::default();
            *api.script.lock().unwrap() = script.into();
            Arc::new(api)
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConnectionApi for ScriptedApi {
        async fn initiate(
            &self,
            toolkit_slug: &str,
            _user_id: &str,
        ) -> Result<ConnectionInitiateResponse, ServerError> {
            if self.fail_initiate.load(Ordering::SeqCst) {
                return Err(ServerError::Network("connection refused".into()));
            }
            let n = self.initiated.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(ConnectionInitiateResponse {
                connection_id: format!("ca_{}", n),
                auth_url: format!("https://auth.example.test/ca_{}", n),
                toolkit_slug: toolkit_slug.to_string(),
                status: ConnectionStatus::Pending,
            })
        }

        async fn status(&self, connection_id: &str) -> Result<ConnectionStatusResponse, ServerError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ConnectionStatus::Pending));
            match next {
                Ok(status) => Ok(ConnectionStatusResponse {
                    connection_id: connection_id.to_string(),
                    status,
                    message: None,
                }),
                Err(e) => Err(ServerError::Network(e)),
            }
        }
    }

    #[derive(Default)]
    struct FakeWindow {
        opened: Mutex<Vec<String>>,
        closed_by_user: AtomicBool,
        close_calls: AtomicUsize,
        fail_open: bool,
    }

    #[async_trait]
    impl AuthWindow for FakeWindow {
        async fn open(&self, url: &str) -> Result<(), FlowError> {
            if self.fail_open {
                return Err(FlowError::Window("popup blocked".into()));
            }
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }

        async fn is_closed(&self) -> bool {
            self.closed_by_user.load(Ordering::SeqCst)
        }

        async fn close(&self) {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Recorder {
        connected: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
        warnings: Mutex<Vec<String>>,
    }

    impl FlowListener for Recorder {
        fn on_connected(&self, connection_id: &str) {
            self.connected.lock().unwrap().push(connection_id.to_string());
        }
        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
        fn on_warning(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }
    }

    fn modal(
        api: Arc<ScriptedApi>,
        window: Arc<FakeWindow>,
        config: FlowConfig,
    ) -> (ConnectionModal, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let modal = ConnectionModal::new(api, window, config).with_listener(recorder.clone());
        (modal, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_closes_window_and_stops_timers() {
        let api = ScriptedApi::with_script(vec![
            Ok(ConnectionStatus::Pending),
            Ok(ConnectionStatus::Active),
        ]);
        let window = Arc::new(FakeWindow::default());
        let (modal, recorder) = modal(api.clone(), window.clone(), FlowConfig::default());

        let outcome = modal.connect("gmail", "alice").await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Connected {
                connection_id: "ca_1".into()
            }
        );
        assert_eq!(
            window.opened.lock().unwrap().as_slice(),
            ["https://auth.example.test/ca_1".to_string()]
        );
        assert_eq!(window.close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.connected.lock().unwrap().len(), 1);
        assert_eq!(api.polls(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.polls(), 2);
        assert_eq!(modal.state().name(), "ACTIVE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_window_cancels_within_one_liveness_tick() {
        let api = ScriptedApi::with_script(Vec::new());
        let window = Arc::new(FakeWindow::default());
        let (modal, recorder) = modal(api.clone(), window.clone(), FlowConfig::default());

        let closer = window.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            closer.closed_by_user.store(true, Ordering::SeqCst);
        });

        let started = Instant::now();
        let outcome = modal.connect("slack", "alice").await.unwrap();
        assert!(matches!(outcome, FlowOutcome::Cancelled { .. }));
        assert!(started.elapsed() <= Duration::from_secs(4));
        assert!(recorder.errors.lock().unwrap().is_empty());
        assert_eq!(window.close_calls.load(Ordering::SeqCst), 0);

        let polls = api.polls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.polls(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_surfaces_error() {
        let api = ScriptedApi::with_script(vec![Ok(ConnectionStatus::Failed)]);
        let window = Arc::new(FakeWindow::default());
        let (modal, recorder) = modal(api, window.clone(), FlowConfig::default());

        let err = modal.connect("github", "bob").await.unwrap_err();
        assert!(matches!(err, FlowError::Failed { .. }));
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
        assert_eq!(window.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out() {
        let api = ScriptedApi::with_script(Vec::new());
        let window = Arc::new(FakeWindow::default());
        let config = FlowConfig {
            timeout: Some(Duration::from_secs(10)),
            ..FlowConfig::default()
        };
        let (modal, recorder) = modal(api, window.clone(), config);

        let started = Instant::now();
        let err = modal.connect("zoom", "carol").await.unwrap_err();
        assert!(matches!(err, FlowError::TimedOut { .. }));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
        assert_eq!(window.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_keep_polling_and_warn_once() {
        let mut script: Vec<Result<ConnectionStatus, String>> =
            (0..7).map(|_| Err("503 from upstream".to_string())).collect();
        script.push(Ok(ConnectionStatus::Active));
        let api = ScriptedApi::with_script(script);
        let window = Arc::new(FakeWindow::default());
        let config = FlowConfig {
            poll_error_threshold: 3,
            ..FlowConfig::default()
        };
        let (modal, recorder) = modal(api.clone(), window, config);

        let outcome = modal.connect("notion", "dave").await.unwrap();
        assert!(matches!(outcome, FlowOutcome::Connected { .. }));
        assert_eq!(api.polls(), 8);
        assert_eq!(recorder.warnings.lock().unwrap().len(), 1);
        assert!(recorder.errors.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_while_in_flight_is_rejected() {
        let api = ScriptedApi::with_script(Vec::new());
        let window = Arc::new(FakeWindow::default());
        let (modal, _) = modal(api.clone(), window.clone(), FlowConfig::default());
        let modal = Arc::new(modal);

        let first = tokio::spawn({
            let modal = modal.clone();
            async move { modal.connect("trello", "erin").await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(modal.state().is_awaiting());

        let err = modal.connect("trello", "erin").await.unwrap_err();
        assert!(matches!(err, FlowError::AlreadyInFlight));
        assert_eq!(modal.state().connection_id(), Some("ca_1"));
        assert_eq!(api.initiated.load(Ordering::SeqCst), 1);
        assert!(!modal.reset());

        window.closed_by_user.store(true, Ordering::SeqCst);
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Cancelled {
                connection_id: "ca_1".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_initiate_failure_stays_idle() {
        let api = Arc::new(ScriptedApi::default());
        api.fail_initiate.store(true, Ordering::SeqCst);
        let window = Arc::new(FakeWindow::default());
        let (modal, recorder) = modal(api, window.clone(), FlowConfig::default());

        let err = modal.connect("asana", "frank").await.unwrap_err();
        assert!(matches!(err, FlowError::Initiate(_)));
        assert_eq!(modal.state(), FlowState::Idle);
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
        assert!(window.opened.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_that_cannot_open_fails_the_flow() {
        let api = ScriptedApi::with_script(Vec::new());
        let window = Arc::new(FakeWindow {
            fail_open: true,
            ..FakeWindow::default()
        });
        let (modal, _) = modal(api.clone(), window, FlowConfig::default());

        let err = modal.connect("dropbox", "gina").await.unwrap_err();
        assert!(err.to_string().contains("popup blocked"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_modal_can_be_reused_after_reset() {
        let api = ScriptedApi::with_script(vec![Ok(ConnectionStatus::Active)]);
        let window = Arc::new(FakeWindow::default());
        let (modal, _) = modal(api.clone(), window.clone(), FlowConfig::default());

        modal.connect("discord", "hank").await.unwrap();
        assert!(modal.reset());
        assert_eq!(modal.state(), FlowState::Idle);

        window.closed_by_user.store(true, Ordering::SeqCst);
        let outcome = modal.connect("discord", "hank").await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Cancelled {
                connection_id: "ca_2".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_flow_leaves_modal_reusable() {
        let api = ScriptedApi::with_script(Vec::new());
        let window = Arc::new(FakeWindow::default());
        let (modal, _) = modal(api.clone(), window.clone(), FlowConfig::default());
        let modal = Arc::new(modal);

        let first = tokio::spawn({
            let modal = modal.clone();
            async move { modal.connect("gmail", "alice").await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(modal.state().is_awaiting());
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        assert_eq!(modal.state(), FlowState::Idle);
        let polls = api.polls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.polls(), polls);

        let closer = window.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            closer.closed_by_user.store(true, Ordering::SeqCst);
        });
        let outcome = modal.connect("gmail", "alice").await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Cancelled {
                connection_id: "ca_2".into()
            }
        );
        assert_eq!(
            window.opened.lock().unwrap().as_slice(),
            [
                "https://auth.example.test/ca_1".to_string(),
                "https://auth.example.test/ca_2".to_string()
            ]
        );
        assert!(api.polls() > polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flow_against_integration_manager() {
        use crate::composio::testing::FakeComposio;
        use crate::db::Database;
        use crate::integrations::IntegrationManager;
        use crate::store::ConnectionStore;

        let fake = Arc::new(FakeComposio::default());
        let manager = Arc::new(IntegrationManager::new(
            fake.clone(),
            ConnectionStore::new(Database::open_in_memory().unwrap()),
        ));
        let window = Arc::new(FakeWindow::default());
        let modal = ConnectionModal::new(manager.clone(), window.clone(), FlowConfig::default());

        let approver = window.clone();
        let upstream = fake.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let url = approver.opened.lock().unwrap().first().cloned();
                if let Some(url) = url {
                    if let Some((_, id)) = url.split_once("connection=") {
                        upstream.set_status(id, "ACTIVE");
                        break;
                    }
                }
            }
        });

        let outcome = modal.connect("googlecalendar", "ivy").await.unwrap();
        let FlowOutcome::Connected { connection_id } = outcome else {
            panic!("expected a connected outcome");
        };
        let stored = manager.store().get(&connection_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConnectionStatus::Active);
    }
}
