//! Mediated command channel for the isolated front-end.
//!
//! The renderer never touches the filesystem or the process: it posts
//! `{command, args}` envelopes here and gets `{result}` or `{error}` back.
//! The command set is fixed and enumerable; anything else is an
//! UnsupportedOperation error, never a silent drop.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use outrigger_core::{InstallOptions, PluginError, PluginRecord};

use crate::AppState;

/// Build the bridge router
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(invoke))
}

#[derive(Debug, Deserialize)]
pub struct BridgeRequest {
    pub command: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct BridgeError {
    pub kind: String,
    pub message: String,
}

/// Envelope response: exactly one of `result` / `error` is present.
#[derive(Debug, Serialize)]
pub struct BridgeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeError>,
}

impl BridgeResponse {
    fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    fn err(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(BridgeError {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }

    /// HTTP status carried alongside the envelope: errors are 400-class
    /// (404 for unknown names), registry-integrity failures are 500s.
    pub fn status(&self) -> StatusCode {
        match &self.error {
            None => StatusCode::OK,
            Some(error) => match error.kind.as_str() {
                "NotFound" => StatusCode::NOT_FOUND,
                "Internal" | "PersistenceFailed" | "LoadCorrupted" => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl From<PluginError> for BridgeResponse {
    fn from(err: PluginError) -> Self {
        BridgeResponse::err(err.kind(), err.to_string())
    }
}

#[derive(Deserialize)]
struct NameArgs {
    name: String,
}

#[derive(Deserialize)]
struct InstallArgs {
    specifier: String,
    #[serde(default)]
    options: InstallOptions,
}

#[derive(Deserialize)]
struct UninstallArgs {
    name: String,
    #[serde(default)]
    immediate: bool,
}

async fn invoke(
    State(state): State<AppState>,
    Json(req): Json<BridgeRequest>,
) -> (StatusCode, Json<BridgeResponse>) {
    let response = dispatch(&state, req).await;
    (response.status(), Json(response))
}

/// Route a bridge envelope to the lifecycle engine. Plugin-level failures
/// come back as structured errors; nothing here can take the host down.
pub async fn dispatch(state: &AppState, req: BridgeRequest) -> BridgeResponse {
    match req.command.as_str() {
        "get" => {
            let args: NameArgs = match parse_args(req.args) {
                Ok(args) => args,
                Err(resp) => return resp,
            };
            match state.engine.store().get(&args.name).await {
                Ok(record) => record_response(&record),
                Err(err) => err.into(),
            }
        }
        "listAll" => records_response(&state.engine.store().list().await),
        "listActive" => records_response(&state.engine.store().list_active().await),
        "install" => {
            let args: InstallArgs = match parse_args(req.args) {
                Ok(args) => args,
                Err(resp) => return resp,
            };
            match state.engine.install(&args.specifier, args.options).await {
                Ok(record) => record_response(&record),
                Err(err) => err.into(),
            }
        }
        "uninstall" => {
            let args: UninstallArgs = match parse_args(req.args) {
                Ok(args) => args,
                Err(resp) => return resp,
            };
            match state.engine.uninstall(&args.name, args.immediate).await {
                Ok(()) => BridgeResponse::ok(Value::Null),
                Err(err) => err.into(),
            }
        }
        other => BridgeResponse::err(
            "UnsupportedOperation",
            format!("unsupported bridge command '{}'", other),
        ),
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, BridgeResponse> {
    serde_json::from_value(args)
        .map_err(|e| BridgeResponse::err("BadRequest", format!("invalid arguments: {}", e)))
}

fn record_response(record: &PluginRecord) -> BridgeResponse {
    match serde_json::to_value(record) {
        Ok(value) => BridgeResponse::ok(value),
        Err(e) => BridgeResponse::err("Internal", format!("failed to encode record: {}", e)),
    }
}

fn records_response(records: &[PluginRecord]) -> BridgeResponse {
    match serde_json::to_value(records) {
        Ok(value) => BridgeResponse::ok(value),
        Err(e) => BridgeResponse::err("Internal", format!("failed to encode records: {}", e)),
    }
}
