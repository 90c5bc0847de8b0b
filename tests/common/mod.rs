//! Test doubles standing in for the OS session API and the host UI.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use url::Url;
use webauth_bridge::{
    AuthSession, CompletionSink, Error, FixedAnchor, RedirectUrl, SessionFailure,
    SessionMechanism, SessionRequest, WebAuthAdapter,
};

pub const ANCHOR: &str = "main-window";

static LOGGING_INIT: Once = Once::new();

/// Routes adapter logs to the test output, filtered by `RUST_LOG`.
pub fn setup_test_logging() {
    LOGGING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Runs once, inside the first `create` call, while the adapter is still starting.
pub type CreateHook = Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>;

/// What a fake session does by itself as soon as it is started.
#[derive(Debug, Clone)]
pub enum AutoOutcome {
    Redirect(&'static str),
    Failure(SessionFailure),
}

/// Everything a fake session saw, kept after the adapter drops the session.
pub struct FakeSessionState {
    pub mechanism: &'static str,
    pub url: Url,
    pub callback_scheme: String,
    pub prefers_ephemeral: bool,
    pub anchor: Option<&'static str>,
    pub completion: CompletionSink,
    pub started: AtomicBool,
    pub cancelled: AtomicUsize,
}

impl FakeSessionState {
    /// Simulates the OS invoking the session's completion handler.
    pub fn os_complete(&self, url: Option<&str>, failure: Option<SessionFailure>) -> bool {
        self.completion.complete(url.map(RedirectUrl::new), failure)
    }

    pub fn was_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct Recorder {
    sessions: Mutex<Vec<Arc<FakeSessionState>>>,
}

impl Recorder {
    pub fn session(&self, index: usize) -> Arc<FakeSessionState> {
        self.sessions.lock().unwrap()[index].clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

pub struct FakeMechanism {
    pub name: &'static str,
    pub available: bool,
    pub requires_anchor: bool,
    pub start_succeeds: bool,
    pub auto_outcome: Option<AutoOutcome>,
    pub on_create: CreateHook,
    pub recorder: Arc<Recorder>,
}

impl FakeMechanism {
    pub fn new(name: &'static str, recorder: &Arc<Recorder>) -> Self {
        Self {
            name,
            available: true,
            requires_anchor: true,
            start_succeeds: true,
            auto_outcome: None,
            on_create: CreateHook::default(),
            recorder: recorder.clone(),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn anchorless(mut self) -> Self {
        self.requires_anchor = false;
        self
    }

    pub fn refusing_start(mut self) -> Self {
        self.start_succeeds = false;
        self
    }

    pub fn completing_with(mut self, outcome: AutoOutcome) -> Self {
        self.auto_outcome = Some(outcome);
        self
    }

    pub fn with_create_hook(mut self, hook: &CreateHook) -> Self {
        self.on_create = hook.clone();
        self
    }
}

impl SessionMechanism for FakeMechanism {
    type Anchor = &'static str;

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn requires_anchor(&self) -> bool {
        self.requires_anchor
    }

    fn create(
        &self,
        request: &SessionRequest,
        anchor: Option<&'static str>,
        completion: CompletionSink,
    ) -> Result<Box<dyn AuthSession>, Error> {
        let state = Arc::new(FakeSessionState {
            mechanism: self.name,
            url: request.url().clone(),
            callback_scheme: request.callback_scheme().to_owned(),
            prefers_ephemeral: request.options().prefers_ephemeral_web_browser_session,
            anchor,
            completion,
            started: AtomicBool::new(false),
            cancelled: AtomicUsize::new(0),
        });
        self.recorder.sessions.lock().unwrap().push(state.clone());
        let hook = self.on_create.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(Box::new(FakeSession {
            state,
            start_succeeds: self.start_succeeds,
            auto_outcome: self.auto_outcome.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<FakeSessionState>,
    start_succeeds: bool,
    auto_outcome: Option<AutoOutcome>,
}

impl AuthSession for FakeSession {
    fn start(&self) -> bool {
        self.state.started.store(true, Ordering::SeqCst);
        match &self.auto_outcome {
            Some(AutoOutcome::Redirect(url)) => {
                self.state.os_complete(Some(url), None);
            }
            Some(AutoOutcome::Failure(failure)) => {
                self.state.os_complete(None, Some(failure.clone()));
            }
            None => {}
        }
        self.start_succeeds
    }

    fn cancel(&self) {
        self.state.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

pub type TestAdapter = WebAuthAdapter<FixedAnchor<&'static str>>;

pub fn adapter_with(mechanism: FakeMechanism) -> TestAdapter {
    setup_test_logging();
    WebAuthAdapter::new(FixedAnchor(Some(ANCHOR))).with_mechanism(mechanism)
}

pub fn request() -> SessionRequest {
    SessionRequest::parse("https://example.com/auth", "myapp", false).unwrap()
}
