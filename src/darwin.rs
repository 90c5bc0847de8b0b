//! `ASWebAuthenticationSession` backed mechanisms.

use block2::RcBlock;
use dispatch2::MainThreadBound;
use objc2::{
    AnyThread, DefinedClass, MainThreadMarker, MainThreadOnly, define_class, msg_send,
    rc::Retained, runtime::ProtocolObject,
};
use objc2_authentication_services::{
    ASPresentationAnchor, ASWebAuthenticationPresentationContextProviding,
    ASWebAuthenticationSession, ASWebAuthenticationSessionCallback,
};
use objc2_foundation::{
    NSDictionary, NSError, NSObject, NSObjectProtocol, NSProcessInfo, NSString, NSURL,
};

use crate::{
    AuthSession, CompletionSink, Error, PlatformVersion, RedirectUrl, SessionFailure,
    SessionMechanism, SessionRequest,
};

const SESSION_ERROR_DOMAIN: &str = "com.apple.AuthenticationServices.WebAuthenticationSession";
/// `ASWebAuthenticationSessionErrorCodeCanceledLogin`
const CANCELED_LOGIN: isize = 1;

pub fn platform_version() -> PlatformVersion {
    let version = NSProcessInfo::processInfo().operatingSystemVersion();
    PlatformVersion {
        major: version.majorVersion as u32,
        minor: version.minorVersion as u32,
        patch: version.patchVersion as u32,
    }
}

const fn version(major: u32, minor: u32, patch: u32) -> PlatformVersion {
    PlatformVersion {
        major,
        minor,
        patch,
    }
}

#[cfg(target_os = "macos")]
mod gates {
    use super::{PlatformVersion, version};

    pub const CALLBACK_API: PlatformVersion = version(14, 4, 0);
    pub const SCHEME_API: PlatformVersion = version(10, 15, 0);
    pub const ANCHORED: PlatformVersion = version(10, 15, 0);
    pub const CAN_START: PlatformVersion = version(10, 15, 4);
}

#[cfg(not(target_os = "macos"))]
mod gates {
    use super::{PlatformVersion, version};

    pub const CALLBACK_API: PlatformVersion = version(17, 4, 0);
    pub const SCHEME_API: PlatformVersion = version(12, 0, 0);
    pub const ANCHORED: PlatformVersion = version(13, 0, 0);
    pub const CAN_START: PlatformVersion = version(13, 4, 0);
}

fn at_least(gate: PlatformVersion) -> bool {
    platform_version() >= gate
}

/// Sessions matched through `ASWebAuthenticationSessionCallback`. Supports
/// additional header fields.
#[derive(Debug, Default)]
pub struct CallbackSessionMechanism;

impl SessionMechanism for CallbackSessionMechanism {
    type Anchor = Retained<ASPresentationAnchor>;

    fn name(&self) -> &'static str {
        "ASWebAuthenticationSession (callback)"
    }

    fn is_available(&self) -> bool {
        at_least(gates::CALLBACK_API)
    }

    fn create(
        &self,
        request: &SessionRequest,
        anchor: Option<Self::Anchor>,
        completion: CompletionSink,
    ) -> Result<Box<dyn AuthSession>, Error> {
        let mtm = MainThreadMarker::new().ok_or(Error::NeedsToRunOnMainThread)?;
        let completion_handler = completion_block(completion);
        let url = ns_url(request)?;
        let session = unsafe {
            ASWebAuthenticationSession::initWithURL_callback_completionHandler(
                ASWebAuthenticationSession::alloc(),
                &url,
                &ASWebAuthenticationSessionCallback::callbackWithCustomScheme(&NSString::from_str(
                    request.callback_scheme(),
                )),
                RcBlock::as_ptr(&completion_handler),
            )
        };

        let headers = &request.options().additional_header_fields;
        if !headers.is_empty() {
            let keys: Vec<_> = headers.keys().map(|key| NSString::from_str(key)).collect();
            let values: Vec<_> = headers.values().map(|value| NSString::from_str(value)).collect();
            unsafe {
                session.setAdditionalHeaderFields(Some(&NSDictionary::from_retained_objects::<
                    NSString,
                >(
                    &keys.iter().map(|key| key.as_ref()).collect::<Vec<_>>(),
                    &values,
                )));
            }
        }

        DarwinSession::configure(mtm, session, completion_handler, request, anchor)
    }
}

/// Sessions matched by callback URL scheme, the older API.
#[derive(Debug, Default)]
pub struct SchemeSessionMechanism;

impl SessionMechanism for SchemeSessionMechanism {
    type Anchor = Retained<ASPresentationAnchor>;

    fn name(&self) -> &'static str {
        "ASWebAuthenticationSession (scheme)"
    }

    fn is_available(&self) -> bool {
        at_least(gates::SCHEME_API)
    }

    fn requires_anchor(&self) -> bool {
        at_least(gates::ANCHORED)
    }

    #[allow(deprecated)]
    fn create(
        &self,
        request: &SessionRequest,
        anchor: Option<Self::Anchor>,
        completion: CompletionSink,
    ) -> Result<Box<dyn AuthSession>, Error> {
        let mtm = MainThreadMarker::new().ok_or(Error::NeedsToRunOnMainThread)?;
        if !request.options().additional_header_fields.is_empty() {
            tracing::warn!(
                "Additional header fields are not supported by {}, ignoring",
                self.name()
            );
        }
        let completion_handler = completion_block(completion);
        let url = ns_url(request)?;
        let session = unsafe {
            ASWebAuthenticationSession::initWithURL_callbackURLScheme_completionHandler(
                ASWebAuthenticationSession::alloc(),
                &url,
                Some(&NSString::from_str(request.callback_scheme())),
                RcBlock::as_ptr(&completion_handler),
            )
        };

        DarwinSession::configure(mtm, session, completion_handler, request, anchor)
    }
}

fn ns_url(request: &SessionRequest) -> Result<Retained<NSURL>, Error> {
    NSURL::URLWithString(&NSString::from_str(request.url().as_str())).ok_or_else(|| {
        Error::Unknown(format!("NSURL rejected {}", request.url()))
    })
}

type CompletionHandler = RcBlock<dyn Fn(*mut NSURL, *mut NSError)>;

fn completion_block(completion: CompletionSink) -> CompletionHandler {
    RcBlock::new(move |url: *mut NSURL, error: *mut NSError| {
        tracing::trace!("Completion handler called with URL: {url:?}, error: {error:?}");
        if let Some(error) = unsafe { error.as_ref() } {
            let failure = session_failure(error);
            if failure != SessionFailure::CanceledLogin {
                tracing::error!(
                    "Error in ASWebAuthenticationSession: {:?}",
                    error.debugDescription()
                );
            }
            completion.complete(None, Some(failure));
            return;
        }
        let Some(url) = (unsafe { url.as_ref() }) else {
            completion.complete(None, None);
            return;
        };
        // absoluteString is delivered untouched; parsing would normalize it.
        let redirect = unsafe { url.absoluteString() }.map(|raw| RedirectUrl::new(raw.to_string()));
        completion.complete(redirect, None);
    })
}

fn session_failure(error: &NSError) -> SessionFailure {
    if error.domain().to_string() == SESSION_ERROR_DOMAIN && error.code() == CANCELED_LOGIN {
        SessionFailure::CanceledLogin
    } else {
        SessionFailure::Other(error.localizedDescription().to_string())
    }
}

struct SessionParts {
    session: Retained<ASWebAuthenticationSession>,
    // The session only holds its presentation context provider weakly.
    _provider: Option<Retained<PresentationContextProvider>>,
    _completion_handler: CompletionHandler,
}

/// A configured `ASWebAuthenticationSession`, only ever messaged on the main thread.
struct DarwinSession {
    parts: MainThreadBound<SessionParts>,
}

impl DarwinSession {
    fn configure(
        mtm: MainThreadMarker,
        session: Retained<ASWebAuthenticationSession>,
        completion_handler: CompletionHandler,
        request: &SessionRequest,
        anchor: Option<Retained<ASPresentationAnchor>>,
    ) -> Result<Box<dyn AuthSession>, Error> {
        let provider = anchor.map(|anchor| PresentationContextProvider::new(mtm, anchor));
        if let Some(provider) = &provider {
            let pcp = ProtocolObject::from_ref(&**provider);
            unsafe {
                session.setPresentationContextProvider(Some(pcp));
            }
        }
        if at_least(gates::ANCHORED) {
            unsafe {
                session.setPrefersEphemeralWebBrowserSession(
                    request.options().prefers_ephemeral_web_browser_session,
                );
            }
        } else if request.options().prefers_ephemeral_web_browser_session {
            tracing::warn!("Ephemeral sessions are not supported on {}", platform_version());
        }

        Ok(Box::new(DarwinSession {
            parts: MainThreadBound::new(
                SessionParts {
                    session,
                    _provider: provider,
                    _completion_handler: completion_handler,
                },
                mtm,
            ),
        }))
    }
}

impl AuthSession for DarwinSession {
    fn can_start(&self) -> bool {
        // Older systems have no `canStart` and always allow starting.
        if !at_least(gates::CAN_START) {
            return true;
        }
        dispatch2::run_on_main(|mtm| unsafe { self.parts.get(mtm).session.canStart() })
    }

    fn start(&self) -> bool {
        tracing::trace!("Starting ASWebAuthenticationSession");
        dispatch2::run_on_main(|mtm| unsafe { self.parts.get(mtm).session.start() })
    }

    fn cancel(&self) {
        dispatch2::run_on_main(|mtm| unsafe { self.parts.get(mtm).session.cancel() })
    }
}

impl Drop for DarwinSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Clone)]
struct Ivars {
    anchor: Retained<ASPresentationAnchor>,
}

define_class!(
    // SAFETY:
    // - The superclass NSObject does not have any subclassing requirements.
    // - `PresentationContextProvider` does not implement `Drop`.
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[ivars = Ivars]
    struct PresentationContextProvider;

    unsafe impl NSObjectProtocol for PresentationContextProvider {}

    unsafe impl ASWebAuthenticationPresentationContextProviding for PresentationContextProvider {
        #[unsafe(method(presentationAnchorForWebAuthenticationSession:))]
        unsafe fn presentation_anchor_for_web_authentication_session(
            &self,
            _session: &ASWebAuthenticationSession,
        ) -> *mut ASPresentationAnchor {
            Retained::autorelease_return(self.ivars().anchor.clone())
        }
    }
);

impl PresentationContextProvider {
    fn new(mtm: MainThreadMarker, anchor: Retained<ASPresentationAnchor>) -> Retained<Self> {
        let this = Self::alloc(mtm).set_ivars(Ivars { anchor });
        // Call `NSObject`'s `init` method.
        unsafe { msg_send![super(this), init] }
    }
}

#[cfg(target_os = "macos")]
pub use appkit::{KeyWindowResolver, system_adapter};

#[cfg(target_os = "macos")]
mod appkit {
    use objc2::{MainThreadMarker, rc::Retained};
    use objc2_app_kit::{NSApplication, NSWindow};

    use super::{CallbackSessionMechanism, SchemeSessionMechanism};
    use crate::{AnchorResolver, HierarchyAnchorResolver, UiNode, WebAuthAdapter};

    struct Window(Retained<NSWindow>);

    impl UiNode for Window {
        type Anchor = Retained<NSWindow>;

        fn presented(&self) -> Option<Self> {
            self.0.attachedSheet().map(Window)
        }

        fn anchor(&self) -> Option<Self::Anchor> {
            Some(self.0.clone())
        }
    }

    /// Anchors sheets to an explicit window, or to the deepest sheet of the
    /// key window (falling back to the main window) when none is given.
    pub struct KeyWindowResolver {
        window: Option<MainThreadBoundWindow>,
        hierarchy: HierarchyAnchorResolver<Window>,
    }

    type MainThreadBoundWindow = dispatch2::MainThreadBound<Retained<NSWindow>>;

    impl KeyWindowResolver {
        pub fn new(window: Option<Retained<NSWindow>>) -> Option<Self> {
            let mtm = MainThreadMarker::new()?;
            let hierarchy = HierarchyAnchorResolver::new()
                .with_root(|| {
                    let mtm = MainThreadMarker::new()?;
                    NSApplication::sharedApplication(mtm).keyWindow().map(Window)
                })
                .with_root(|| {
                    let mtm = MainThreadMarker::new()?;
                    NSApplication::sharedApplication(mtm).mainWindow().map(Window)
                });
            Some(Self {
                window: window.map(|window| dispatch2::MainThreadBound::new(window, mtm)),
                hierarchy,
            })
        }
    }

    impl AnchorResolver for KeyWindowResolver {
        type Anchor = Retained<NSWindow>;

        fn resolve_anchor(&self) -> Option<Self::Anchor> {
            let mtm = MainThreadMarker::new()?;
            match &self.window {
                Some(window) => Some(window.get(mtm).clone()),
                None => self.hierarchy.resolve_anchor(),
            }
        }
    }

    /// An adapter using both session mechanisms, the callback API first.
    ///
    /// Returns `None` when not called on the main thread.
    pub fn system_adapter(
        window: Option<Retained<NSWindow>>,
    ) -> Option<WebAuthAdapter<KeyWindowResolver>> {
        Some(
            WebAuthAdapter::new(KeyWindowResolver::new(window)?)
                .with_mechanism(CallbackSessionMechanism)
                .with_mechanism(SchemeSessionMechanism),
        )
    }
}
