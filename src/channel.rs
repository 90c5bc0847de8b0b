//! Message-based invocation surface used by the app framework's method channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AnchorResolver, Error, SessionRequest, WebAuthAdapter};

pub mod methods {
    pub const AUTHENTICATE: &str = "authenticate";
    pub const CLEAN_UP_DANGLING_CALLS: &str = "cleanUpDanglingCalls";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateArguments {
    url: String,
    callback_url_scheme: String,
    prefer_ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelError {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl From<&Error> for ChannelError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code().as_str().to_owned(),
            message: err.to_string(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum MethodResponse {
    Success(Value),
    Error(ChannelError),
    NotImplemented,
}

impl<R: AnchorResolver> WebAuthAdapter<R> {
    /// Dispatches one channel call.
    ///
    /// Calls with missing or malformed arguments are answered with
    /// [`MethodResponse::NotImplemented`], the same as unknown methods.
    pub async fn handle_method_call(&self, call: MethodCall) -> MethodResponse {
        match call.method.as_str() {
            methods::AUTHENTICATE => {
                let Some(request) = authenticate_request(call.arguments) else {
                    return MethodResponse::NotImplemented;
                };
                match self.authenticate(&request).await {
                    Ok(url) => MethodResponse::Success(Value::String(url.into_string())),
                    Err(err) => {
                        tracing::debug!("authenticate failed with {}: {err}", err.code());
                        MethodResponse::Error((&err).into())
                    }
                }
            }
            methods::CLEAN_UP_DANGLING_CALLS => match self.clean_up_dangling_calls() {
                Ok(()) => MethodResponse::Success(Value::Null),
                Err(err) => MethodResponse::Error((&err).into()),
            },
            other => {
                tracing::debug!("Method {other} is not implemented");
                MethodResponse::NotImplemented
            }
        }
    }
}

fn authenticate_request(arguments: Value) -> Option<SessionRequest> {
    let arguments: AuthenticateArguments = serde_json::from_value(arguments)
        .map_err(|err| tracing::warn!("Malformed authenticate arguments: {err}"))
        .ok()?;
    SessionRequest::parse(
        &arguments.url,
        &arguments.callback_url_scheme,
        arguments.prefer_ephemeral,
    )
    .map_err(|err| tracing::warn!("Rejecting authenticate call: {err}"))
    .ok()
}
