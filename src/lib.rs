mod activity;
mod adapter;
mod anchor;
mod channel;
mod completion;
#[cfg(target_vendor = "apple")]
pub mod darwin;
mod error;
mod mechanism;
mod sync;
#[cfg(all(feature = "webview", target_os = "linux"))]
pub mod webview;

use std::collections::HashMap;

pub use activity::{ActivityType, UserActivity};
pub use adapter::{AdapterState, AuthenticationFuture, WebAuthAdapter};
pub use anchor::{
    AnchorResolver, FixedAnchor, HierarchyAnchorResolver, UiNode, deepest_presented,
};
pub use channel::{ChannelError, MethodCall, MethodResponse, methods};
pub use completion::{CompletionSink, RedirectUrl, SessionFailure, resolve_outcome};
pub use error::{Error, ErrorCode};
pub use mechanism::{AuthSession, PlatformVersion, SessionMechanism};

#[derive(Debug, Clone, Default)]
pub struct WebAuthOptions {
    pub prefers_ephemeral_web_browser_session: bool,
    /// Sent with the initial request by mechanisms that support it.
    pub additional_header_fields: HashMap<String, String>,
}

/// One call to `authenticate`: what to open and which scheme ends the flow.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    url: url::Url,
    callback_scheme: String,
    options: WebAuthOptions,
}

impl SessionRequest {
    pub fn new(
        url: url::Url,
        callback_scheme: impl Into<String>,
        options: WebAuthOptions,
    ) -> Result<Self, Error> {
        let callback_scheme = callback_scheme.into();
        if callback_scheme.is_empty() {
            return Err(Error::EmptyCallbackScheme);
        }
        Ok(Self {
            url,
            callback_scheme,
            options,
        })
    }

    /// Builds a request from the raw values an invocation channel carries.
    pub fn parse(url: &str, callback_scheme: &str, prefer_ephemeral: bool) -> Result<Self, Error> {
        let url = url::Url::parse(url).map_err(Error::InvalidUrl)?;
        Self::new(
            url,
            callback_scheme,
            WebAuthOptions {
                prefers_ephemeral_web_browser_session: prefer_ephemeral,
                ..Default::default()
            },
        )
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    pub fn callback_scheme(&self) -> &str {
        &self.callback_scheme
    }

    pub fn options(&self) -> &WebAuthOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_all_fields() {
        let request = SessionRequest::parse("https://example.com/auth", "myapp", true).unwrap();
        assert_eq!(request.url().as_str(), "https://example.com/auth");
        assert_eq!(request.callback_scheme(), "myapp");
        assert!(request.options().prefers_ephemeral_web_browser_session);
        assert!(request.options().additional_header_fields.is_empty());
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(matches!(
            SessionRequest::parse("not a url", "myapp", false),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_empty_scheme() {
        assert!(matches!(
            SessionRequest::parse("https://example.com/auth", "", false),
            Err(Error::EmptyCallbackScheme)
        ));
    }
}
