use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, Weak},
    task::{Context, Poll},
};

use crate::{
    AnchorResolver, AuthSession, CompletionSink, Error, RedirectUrl, SessionMechanism,
    SessionRequest, sync::MutexExt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterState {
    Idle,
    /// A request reserved the session slot but its OS session has not been started yet.
    Starting,
    AwaitingCompletion,
}

struct ActiveSession {
    generation: u64,
    completion: CompletionSink,
    session: Option<Arc<dyn AuthSession>>,
}

impl ActiveSession {
    /// Drops the pending callback first so a late OS completion finds nothing to call.
    fn abandon(self) {
        self.completion.discard();
        if let Some(session) = self.session {
            session.cancel();
        }
    }
}

#[derive(Default)]
struct Inner {
    generation: u64,
    active: Option<ActiveSession>,
}

impl Inner {
    fn take_generation(&mut self, generation: u64) -> Option<ActiveSession> {
        self.active.take_if(|active| active.generation == generation)
    }
}

/// Runs at most one web authentication session at a time.
///
/// Starting a new session cancels the running one; its pending callback is
/// discarded without being invoked. The adapter returns to [`AdapterState::Idle`]
/// after every outcome and can be reused indefinitely.
pub struct WebAuthAdapter<R: AnchorResolver> {
    resolver: R,
    mechanisms: Vec<Box<dyn SessionMechanism<Anchor = R::Anchor>>>,
    inner: Arc<Mutex<Inner>>,
}

impl<R: AnchorResolver> WebAuthAdapter<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            mechanisms: Vec::new(),
            inner: Arc::default(),
        }
    }

    /// Appends a mechanism. Mechanisms added first are preferred.
    pub fn with_mechanism<M>(mut self, mechanism: M) -> Self
    where
        M: SessionMechanism<Anchor = R::Anchor> + 'static,
    {
        self.mechanisms.push(Box::new(mechanism));
        self
    }

    pub fn state(&self) -> AdapterState {
        match &self.inner.lock_or_recover().active {
            None => AdapterState::Idle,
            Some(active) if active.session.is_none() => AdapterState::Starting,
            Some(_) => AdapterState::AwaitingCompletion,
        }
    }

    /// Starts a session and reports its outcome through `callback`.
    ///
    /// Errors that occur before the OS session runs (no supported mechanism,
    /// no presentation anchor, a refused start) are returned directly and
    /// `callback` is dropped without being called.
    pub fn start(
        &self,
        request: &SessionRequest,
        callback: impl FnOnce(Result<RedirectUrl, Error>) + Send + 'static,
    ) -> Result<(), Error> {
        let (generation, completion, previous) = {
            let mut inner = self.inner.lock_or_recover();
            inner.generation += 1;
            let generation = inner.generation;
            let completion = CompletionSink::new(release_on_completion(
                Arc::downgrade(&self.inner),
                generation,
                callback,
            ));
            let previous = inner.active.replace(ActiveSession {
                generation,
                completion: completion.clone(),
                session: None,
            });
            (generation, completion, previous)
        };
        if let Some(previous) = previous {
            tracing::debug!(
                "Cancelling session {} superseded by {generation}",
                previous.generation
            );
            previous.abandon();
        }

        match self.launch(request, generation, &completion) {
            Ok(()) => Ok(()),
            Err(err) => {
                // A consumed or discarded callback means the outcome already
                // went (or will go) through the callback path.
                let still_pending = completion.discard();
                let failed = self.inner.lock_or_recover().take_generation(generation);
                if let Some(failed) = failed {
                    failed.abandon();
                }
                if still_pending {
                    Err(err)
                } else {
                    tracing::debug!("Session {generation} ended before its start returned: {err}");
                    Ok(())
                }
            }
        }
    }

    /// Future flavour of [`WebAuthAdapter::start`].
    pub fn authenticate(&self, request: &SessionRequest) -> AuthenticationFuture {
        let (sender, receiver) = futures::channel::oneshot::channel();
        let error = self
            .start(request, move |result| {
                sender.send(result).ok();
            })
            .err();

        AuthenticationFuture { receiver, error }
    }

    /// Cancels the running session, if any, and drops its pending callback.
    pub fn cancel(&self) {
        let active = self.inner.lock_or_recover().active.take();
        if let Some(active) = active {
            tracing::debug!("Cancelling session {}", active.generation);
            active.abandon();
        }
    }

    /// Completes the pending session with a redirect that reached the app
    /// through another route, e.g. a universal link.
    ///
    /// Returns whether the redirect was consumed.
    pub fn handle_external_redirect(&self, url: impl Into<RedirectUrl>) -> bool {
        let url = url.into();
        let completion = self
            .inner
            .lock_or_recover()
            .active
            .as_ref()
            .map(|active| active.completion.clone());
        match completion {
            Some(completion) => completion.complete(Some(url), None),
            None => {
                tracing::debug!("Ignoring external redirect to {url}, no session pending");
                false
            }
        }
    }

    /// Nothing outlives a process restart here and only one call is ever
    /// pending, so there is never anything to replay.
    pub fn clean_up_dangling_calls(&self) -> Result<(), Error> {
        Ok(())
    }

    fn launch(
        &self,
        request: &SessionRequest,
        generation: u64,
        completion: &CompletionSink,
    ) -> Result<(), Error> {
        let Some(mechanism) = self.mechanisms.iter().find(|mechanism| mechanism.is_available())
        else {
            tracing::warn!("No web authentication mechanism available");
            return Err(Error::Unsupported);
        };
        tracing::debug!("Using {} for session {generation}", mechanism.name());

        let anchor = if mechanism.requires_anchor() {
            match self.resolver.resolve_anchor() {
                Some(anchor) => Some(anchor),
                None => {
                    tracing::warn!("Unable to resolve a presentation anchor");
                    return Err(Error::AnchorResolutionFailed);
                }
            }
        } else {
            None
        };

        tracing::trace!(
            "Creating session {generation} for {} with callback scheme {}",
            request.url(),
            request.callback_scheme()
        );
        let session: Arc<dyn AuthSession> =
            Arc::from(mechanism.create(request, anchor, completion.clone())?);
        if !session.can_start() {
            return Err(Error::StartFailed);
        }

        let registered = match self.inner.lock_or_recover().active.as_mut() {
            Some(active) if active.generation == generation => {
                active.session = Some(session.clone());
                true
            }
            _ => false,
        };
        if !registered {
            session.cancel();
            return Err(Error::Aborted);
        }

        if session.start() {
            Ok(())
        } else {
            Err(Error::StartFailed)
        }
    }
}

/// Wraps a caller's callback so the session slot is released before the
/// caller hears about the outcome.
fn release_on_completion<F>(
    inner: Weak<Mutex<Inner>>,
    generation: u64,
    callback: F,
) -> impl FnOnce(Result<RedirectUrl, Error>) + Send + 'static
where
    F: FnOnce(Result<RedirectUrl, Error>) + Send + 'static,
{
    move |result| {
        if let Some(inner) = inner.upgrade() {
            let finished = inner.lock_or_recover().take_generation(generation);
            drop(finished);
        }
        callback(result);
    }
}

pub struct AuthenticationFuture {
    receiver: futures::channel::oneshot::Receiver<Result<RedirectUrl, Error>>,
    error: Option<Error>,
}

impl Future for AuthenticationFuture {
    type Output = Result<RedirectUrl, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(err) = this.error.take() {
            return Poll::Ready(Err(err));
        }
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(v)) => Poll::Ready(v),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Aborted)),
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::FixedAnchor;

    fn request() -> SessionRequest {
        SessionRequest::parse("https://example.com/auth", "myapp", false).unwrap()
    }

    #[test]
    #[traced_test]
    fn adapter_without_mechanisms_is_unsupported() {
        let adapter = WebAuthAdapter::new(FixedAnchor(Some(())));
        let err = adapter
            .start(&request(), |_| panic!("callback must not run"))
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported));
        assert_eq!(adapter.state(), AdapterState::Idle);
        assert!(logs_contain("No web authentication mechanism available"));
    }

    #[test]
    #[traced_test]
    fn idle_redirect_is_ignored() {
        let adapter = WebAuthAdapter::new(FixedAnchor::<()>(None));
        assert!(!adapter.handle_external_redirect("https://example.com/cb"));
        assert!(logs_contain("no session pending"));
    }
}
