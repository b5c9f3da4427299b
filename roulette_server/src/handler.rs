//! HTTP long-polling handlers for the roulette signaling server
//!
//! Clients hold no socket open; they poll for queued events and post their
//! own events as separate requests. Connections that stop polling are reaped
//! at the start of every request.

use crate::error::{ClientRequestError, SignalingError};
use crate::state::ServerState;
use roulette_protocol::ClientId;
use tracing::warn;
use wstd::http::{Body, HeaderValue, Method, Request, Response, StatusCode};

const CLIENT_ID_HEADER: &str = "x-client-id";

const INFO_PAGE: &str = "Roulette Signaling Server (Long-Polling)\n\
    \n\
    Endpoints:\n\
    - GET /health - Health check\n\
    - GET /stats - Connection, queue and session counts\n\
    - GET /poll?client_id={id} - Connect, or poll for pending events\n\
    - POST /event - Send an event (X-Client-Id header required)\n\
    - POST /disconnect - Close the connection (X-Client-Id header required)\n\
    \n\
    Protocol:\n\
    1. GET /poll to connect and get client_id + initial events\n\
    2. POST /event {\"event\":\"find-match\"} to start searching\n\
    3. Poll GET /poll?client_id={id} for waiting / match-found / signals\n\
    4. POST /event with offer, answer, ice-candidate or send-message to talk to your partner\n\
    \n\
    Response format: {\"client_id\": \"uuid\", \"events\": [...]}\n";

/// Build a response with CORS enabled
fn respond(status: StatusCode, content_type: &'static str, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert("content-type", HeaderValue::from_static(content_type));
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    response
}

fn text(status: StatusCode, body: impl Into<String>) -> Response<Body> {
    respond(status, "text/plain", Body::from(body.into()))
}

fn json(value: serde_json::Value) -> Response<Body> {
    respond(StatusCode::OK, "application/json", Body::from(value.to_string()))
}

/// Get query parameter from URI
fn get_query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let k = parts.next()?;
        let v = parts.next()?;
        if k == key { Some(v) } else { None }
    })
}

/// Read the sender's id from the X-Client-Id header
fn client_id(request: &Request<Body>) -> Result<ClientId, ClientRequestError> {
    let raw = request
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ClientRequestError::MissingClientId)?;
    Ok(raw.trim().parse()?)
}

fn request_error(error: ClientRequestError) -> Response<Body> {
    match error {
        ClientRequestError::Signaling(SignalingError::UnknownClient) => {
            text(StatusCode::NOT_FOUND, "Client not found")
        }
        other => {
            warn!(error = %other, "rejected client request");
            text(StatusCode::BAD_REQUEST, other.to_string())
        }
    }
}

/// Connect or poll - returns client ID and any pending events
fn handle_poll(client_id: Option<ClientId>, state: &ServerState) -> Response<Body> {
    let (client_id, events) = state.connect_or_poll(client_id);
    json(serde_json::json!({
        "client_id": client_id.to_string(),
        "events": events,
    }))
}

/// Handle an event POST request
async fn handle_event(request: Request<Body>, state: &ServerState) -> Response<Body> {
    let sender = match client_id(&request) {
        Ok(id) => id,
        Err(e) => return request_error(e),
    };

    let mut body = request.into_body();
    let body = match body.str_contents().await {
        Ok(s) => s.to_string(),
        Err(e) => return request_error(ClientRequestError::Body(format!("{e:?}"))),
    };

    match state.handle_raw(sender, &body) {
        Ok(()) => text(StatusCode::OK, "OK"),
        Err(e) => request_error(e),
    }
}

/// Handle a transport-level close
fn handle_disconnect(request: &Request<Body>, state: &ServerState) -> Response<Body> {
    match client_id(request) {
        Ok(id) => {
            state.disconnect(id);
            text(StatusCode::OK, "OK")
        }
        Err(e) => request_error(e),
    }
}

/// Handle CORS preflight
fn handle_cors_preflight() -> Response<Body> {
    let mut response = respond(StatusCode::NO_CONTENT, "text/plain", Body::empty());
    let headers = response.headers_mut();
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type, x-client-id"),
    );
    headers.insert("access-control-max-age", HeaderValue::from_static("86400"));
    response
}

/// Handle an HTTP request - main router
pub async fn handle_request(
    request: Request<Body>,
    state: &ServerState,
) -> Result<Response<Body>, wstd::http::Error> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path();

    if method == Method::OPTIONS {
        return Ok(handle_cors_preflight());
    }

    state.reap_expired();

    let response = match (&method, path) {
        (&Method::GET, "/health") => text(StatusCode::OK, "OK"),
        (&Method::GET, "/stats") => match serde_json::to_value(state.stats()) {
            Ok(stats) => json(stats),
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        (&Method::GET, "/poll") => {
            let client_id = get_query_param(uri.query(), "client_id")
                .and_then(|s| s.parse::<ClientId>().ok());
            handle_poll(client_id, state)
        }
        (&Method::POST, "/event") => handle_event(request, state).await,
        (&Method::POST, "/disconnect") => handle_disconnect(&request, state),
        (&Method::GET, "/") => text(StatusCode::OK, INFO_PAGE),
        _ => text(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}
