//! Embedded webview sessions for hosts without an OS authentication broker.
//!
//! The webview intercepts navigation to the callback scheme instead of letting
//! it leave the app. It is built and shown on the GTK main thread; `start` must
//! be called there too.

use std::{str::FromStr, sync::Mutex};

use gtk::{
    Container,
    glib::{self, thread_guard::ThreadGuard},
};
use wry::{
    WebView, WebViewAttributes, WebViewBuilder, WebViewBuilderExtUnix,
    http::{HeaderMap, HeaderName, HeaderValue},
};

use crate::{
    AuthSession, CompletionSink, Error, FixedAnchor, RedirectUrl, SessionMechanism,
    SessionRequest, WebAuthAdapter, sync::MutexExt,
};

#[derive(Debug, Default)]
pub struct WebViewMechanism;

impl SessionMechanism for WebViewMechanism {
    type Anchor = Container;

    fn name(&self) -> &'static str {
        "wry webview"
    }

    fn is_available(&self) -> bool {
        gtk::is_initialized()
    }

    fn create(
        &self,
        request: &SessionRequest,
        anchor: Option<Container>,
        completion: CompletionSink,
    ) -> Result<Box<dyn AuthSession>, Error> {
        let container = anchor.ok_or(Error::AnchorResolutionFailed)?;
        let callback_scheme = format!("{}:", request.callback_scheme());
        let options = request.options();

        let attributes = WebViewAttributes {
            user_agent: Some("WebAuth".to_string()),
            incognito: options.prefers_ephemeral_web_browser_session,
            focused: true,
            visible: false,
            ..Default::default()
        };

        let web_view = WebViewBuilder::new_with_attributes(attributes)
            .with_navigation_handler(move |url| {
                if !url.starts_with(&callback_scheme) {
                    return true;
                }
                completion.complete(Some(RedirectUrl::new(url)), None);
                false
            })
            .with_headers(
                options
                    .additional_header_fields
                    .iter()
                    .map(|(key, value)| {
                        Ok((HeaderName::from_str(key)?, HeaderValue::from_str(value)?))
                    })
                    .collect::<Result<HeaderMap, Error>>()?,
            )
            .with_url(request.url().as_str())
            .build_gtk(&container)?;

        Ok(Box::new(WebViewSession {
            web_view: Mutex::new(Some(ThreadGuard::new(web_view))),
        }))
    }
}

struct WebViewSession {
    web_view: Mutex<Option<ThreadGuard<WebView>>>,
}

impl AuthSession for WebViewSession {
    fn start(&self) -> bool {
        tracing::trace!("Showing authentication webview");
        match self.web_view.lock_or_recover().as_ref() {
            Some(web_view) => web_view
                .get_ref()
                .set_visible(true)
                .map_err(|err| tracing::error!("Failed to show webview: {err}"))
                .is_ok(),
            None => false,
        }
    }

    fn cancel(&self) {
        let web_view = self.web_view.lock_or_recover().take();
        if let Some(web_view) = web_view {
            // The webview has to be destroyed on the thread that created it.
            glib::MainContext::default().invoke(move || drop(web_view));
        }
    }
}

impl Drop for WebViewSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// An adapter that embeds the authentication page into `container`.
pub fn adapter(container: Container) -> WebAuthAdapter<FixedAnchor<Container>> {
    WebAuthAdapter::new(FixedAnchor(Some(container))).with_mechanism(WebViewMechanism)
}
