use std::{
    fmt,
    sync::{Arc, Mutex},
};

use url::Url;

use crate::{Error, sync::MutexExt};

pub(crate) type Callback = Box<dyn FnOnce(Result<RedirectUrl, Error>) + Send + 'static>;

/// The final redirect, byte for byte as the OS or the link handler delivered it.
///
/// It is never normalized; [`RedirectUrl::to_url`] parses it on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedirectUrl(String);

impl RedirectUrl {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn to_url(&self) -> Result<Url, Error> {
        Url::parse(&self.0).map_err(Error::InvalidUrlInResponse)
    }
}

impl fmt::Display for RedirectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RedirectUrl {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for RedirectUrl {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl From<Url> for RedirectUrl {
    fn from(url: Url) -> Self {
        Self(url.into())
    }
}

impl From<RedirectUrl> for String {
    fn from(url: RedirectUrl) -> Self {
        url.0
    }
}

impl PartialEq<str> for RedirectUrl {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RedirectUrl {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Failure reported by an OS session alongside (or instead of) a redirect URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// The user dismissed the authentication sheet.
    CanceledLogin,
    /// Any other failure, with the OS' localized description.
    Other(String),
}

/// Maps what an OS session hands to its completion handler onto the
/// adapter's result. An error always wins over a URL.
pub fn resolve_outcome(
    url: Option<RedirectUrl>,
    failure: Option<SessionFailure>,
) -> Result<RedirectUrl, Error> {
    match (url, failure) {
        (_, Some(SessionFailure::CanceledLogin)) => Err(Error::Canceled),
        (_, Some(SessionFailure::Other(message))) => Err(Error::Unknown(message)),
        (Some(url), None) => Ok(url),
        (None, None) => Err(Error::NoUrlInResponse),
    }
}

/// Single-shot completion handle shared between the adapter, the running
/// session and the external redirect path.
///
/// Whoever reaches the callback first consumes it; every later delivery is a
/// no-op that returns `false`.
#[derive(Clone)]
pub struct CompletionSink {
    callback: Arc<Mutex<Option<Callback>>>,
}

impl CompletionSink {
    pub(crate) fn new(
        callback: impl FnOnce(Result<RedirectUrl, Error>) + Send + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(Mutex::new(Some(Box::new(callback)))),
        }
    }

    /// Delivers the raw outcome of an OS session.
    pub fn complete(&self, url: Option<RedirectUrl>, failure: Option<SessionFailure>) -> bool {
        self.deliver(resolve_outcome(url, failure))
    }

    /// Delivers an already mapped result. Returns whether the callback was consumed.
    pub fn deliver(&self, result: Result<RedirectUrl, Error>) -> bool {
        // Take under the lock, invoke outside of it.
        let callback = self.callback.lock_or_recover().take();
        match callback {
            Some(callback) => {
                tracing::trace!("Delivering completion: {result:?}");
                callback(result);
                true
            }
            None => {
                tracing::debug!("Completion already delivered or discarded, ignoring {result:?}");
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.callback.lock_or_recover().is_some()
    }

    /// Drops the callback without invoking it.
    pub(crate) fn discard(&self) -> bool {
        self.callback.lock_or_recover().take().is_some()
    }
}

impl fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSink")
            .field("pending", &self.is_pending())
            .finish()
    }
}
