use crate::{AnchorResolver, RedirectUrl, WebAuthAdapter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityType {
    /// The app was opened from a web page link (a universal link).
    BrowsingWeb,
    Other(String),
}

/// An activity the host platform hands to the app when it is continued from
/// outside, as delivered by its link-handling entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActivity {
    pub activity_type: ActivityType,
    pub webpage_url: Option<RedirectUrl>,
}

impl UserActivity {
    pub fn browsing_web(url: impl Into<RedirectUrl>) -> Self {
        Self {
            activity_type: ActivityType::BrowsingWeb,
            webpage_url: Some(url.into()),
        }
    }
}

impl<R: AnchorResolver> WebAuthAdapter<R> {
    /// Routes a continued web-browsing activity to the pending session.
    ///
    /// Returns `false` for any other activity, for activities without a URL
    /// and when no session is pending.
    pub fn continue_user_activity(&self, activity: &UserActivity) -> bool {
        match (&activity.activity_type, &activity.webpage_url) {
            (ActivityType::BrowsingWeb, Some(url)) => self.handle_external_redirect(url.clone()),
            (activity_type, _) => {
                tracing::debug!("Not handling user activity {activity_type:?}");
                false
            }
        }
    }
}
