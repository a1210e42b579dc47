//! Route handlers.

use std::collections::BTreeMap;

use axum::{
    extract::{FromRequest, Path, Query, Request, State},
    http::{header, Method},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::wizard::{Outcome, RequestIntent, WizardRequest, WizardResponse};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub base_route: String,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        base_route: state.definition.base_route().to_string(),
    })
}

/// Wizard entry point; redirects to the first step
pub async fn start(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Response, ApiError> {
    let request = WizardRequest {
        intent: RequestIntent::Fetch,
        params,
        context: Value::Null,
    };
    run_cycle(&state, request, None, true)
}

/// Show (GET) or submit (POST) a step
pub async fn step(
    State(state): State<AppState>,
    Path(step): Path<String>,
    Query(mut params): Query<BTreeMap<String, String>>,
    request: Request,
) -> Result<Response, ApiError> {
    let method = request.method().clone();
    let intent = RequestIntent::from_method(method.as_str())
        .ok_or_else(|| ApiError::MethodNotAllowed(format!("{} is not supported", method)))?;

    // Form fields win over query parameters of the same name
    if intent == RequestIntent::Submit {
        let Form(form) = Form::<BTreeMap<String, String>>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        params.extend(form);
    }

    let request = WizardRequest {
        intent,
        params,
        context: json!({ "method": method.as_str() }),
    };
    // HEAD never consumes flash messages meant for the following GET
    run_cycle(&state, request, Some(&step), method != Method::HEAD)
}

/// Run one wizard cycle and convert the result into an HTTP response
fn run_cycle(
    state: &AppState,
    request: WizardRequest,
    step: Option<&str>,
    drain_messages: bool,
) -> Result<Response, ApiError> {
    let wizard = state.definition.cycle(request, step)?;
    let mut outcome = wizard.handle()?;

    // Messages queued by earlier redirects are shown on the next page
    if let Outcome::Render { data, .. } = &mut outcome {
        let messages = if drain_messages {
            state.messages.take()
        } else {
            state.messages.messages()
        };
        data.insert("messages".into(), json!(messages));
    }

    Ok(into_http(wizard.respond(outcome)?))
}

fn into_http(response: WizardResponse) -> Response {
    match response {
        WizardResponse::Page {
            body, content_type, ..
        } => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        WizardResponse::Redirect { location, .. } => Redirect::to(&location).into_response(),
    }
}
