use std::fmt;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("User canceled login")]
    Canceled,
    /// The pending call was dropped because the session was cancelled or superseded.
    #[error("Aborted")]
    Aborted,
    #[error("No web authentication mechanism is supported on this platform")]
    Unsupported,
    #[error("Failed to acquire root view controller")]
    AnchorResolutionFailed,
    #[error("{0}")]
    Unknown(String),
    #[error("URL was null, but no error provided.")]
    NoUrlInResponse,
    #[error("Invalid URL in response: {0}")]
    InvalidUrlInResponse(url::ParseError),
    #[error("Invalid URL: {0}")]
    InvalidUrl(url::ParseError),
    #[error("Callback URL scheme must not be empty")]
    EmptyCallbackScheme,
    #[error("Authentication session could not be started")]
    StartFailed,
    #[error("Needs to run on main thread")]
    NeedsToRunOnMainThread,
    #[cfg(all(feature = "webview", target_os = "linux"))]
    #[error("Wry error: {0}")]
    Wry(#[from] wry::Error),
    #[cfg(all(feature = "webview", target_os = "linux"))]
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] wry::http::header::InvalidHeaderName),
    #[cfg(all(feature = "webview", target_os = "linux"))]
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] wry::http::header::InvalidHeaderValue),
}

impl Error {
    /// The caller-facing discriminant this error is reported under.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Canceled | Error::Aborted => ErrorCode::Canceled,
            Error::Unsupported => ErrorCode::Failed,
            Error::AnchorResolutionFailed => ErrorCode::AcquireRootViewControllerFailed,
            _ => ErrorCode::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The user dismissed the session.
    Canceled,
    /// Any other failure; the message is passed through.
    Unknown,
    /// The running OS supports none of the session mechanisms.
    Failed,
    /// No presentation anchor could be resolved.
    AcquireRootViewControllerFailed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Canceled => "CANCELED",
            ErrorCode::Unknown => "EUNKNOWN",
            ErrorCode::Failed => "FAILED",
            ErrorCode::AcquireRootViewControllerFailed => "ACQUIRE_ROOT_VIEW_CONTROLLER_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
