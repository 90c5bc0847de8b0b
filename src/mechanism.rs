use std::fmt;

use crate::{CompletionSink, Error, SessionRequest};

/// A running (or ready to run) OS authentication session.
///
/// Implementations must tolerate `cancel` being called after the session has
/// already completed, and more than once.
pub trait AuthSession: Send + Sync {
    fn can_start(&self) -> bool {
        true
    }

    /// Starts the session. Returns `false` if the OS refused to start it.
    fn start(&self) -> bool;

    fn cancel(&self);
}

/// One way of running an authentication session on the current platform.
///
/// An adapter holds its mechanisms in descending order of preference and uses
/// the first one that reports itself available.
pub trait SessionMechanism: Send + Sync {
    type Anchor;

    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Whether `create` needs a presentation anchor.
    fn requires_anchor(&self) -> bool {
        true
    }

    /// Builds the session without starting it. The session reports its
    /// outcome through `completion`.
    fn create(
        &self,
        request: &SessionRequest,
        anchor: Option<Self::Anchor>,
        completion: CompletionSink,
    ) -> Result<Box<dyn AuthSession>, Error>;
}

/// Operating system version, compared as `(major, minor, patch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PlatformVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            patch: 0,
        }
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        *self >= Self::new(major, minor)
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
