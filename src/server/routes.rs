//! HTTP routes of the control surface
//!
//! Thin request/response translation onto [`RelayContext`]. Join and leave
//! answer 201, signal and stream answer 202, failures carry a JSON
//! `{"error": ...}` body with the status from [`Error::status_code`].

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::Error;
use crate::session::{LeaveOutcome, RelayContext};
use crate::voice::Destination;

/// Body of `/webrtc/signal`
#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    /// Remote session description, passed through untouched
    pub offer: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the control router over a relay context
pub fn router(context: Arc<RelayContext>) -> Router {
    Router::new()
        .route("/discord/start", post(start_session))
        .route("/get-info", get(get_info))
        .route("/close", post(close))
        .route("/join", post(join))
        .route("/leave", post(leave))
        .route("/webrtc/signal", post(signal))
        .route("/webrtc/stream", post(stream))
        .with_state(context)
}

async fn start_session(
    State(context): State<Arc<RelayContext>>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let Some(credential) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
    else {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing Authorization header" })),
        )
            .into_response());
    };

    context.start_session(credential).await?;
    Ok((StatusCode::OK, "ok").into_response())
}

async fn get_info(State(context): State<Arc<RelayContext>>) -> Result<Response, Error> {
    let guilds = context.info().await?;
    Ok((StatusCode::OK, Json(guilds)).into_response())
}

async fn close(State(context): State<Arc<RelayContext>>) -> impl IntoResponse {
    context.close().await;
    (StatusCode::OK, "ok")
}

async fn join(
    State(context): State<Arc<RelayContext>>,
    Json(destination): Json<Destination>,
) -> Result<impl IntoResponse, Error> {
    context.join(destination).await?;
    Ok((StatusCode::CREATED, "ok"))
}

async fn leave(
    State(context): State<Arc<RelayContext>>,
    Json(destination): Json<Destination>,
) -> Result<impl IntoResponse, Error> {
    if context.leave(&destination).await? == LeaveOutcome::NotJoined {
        tracing::debug!(channel = %destination, "Leave for channel that was not joined");
    }
    Ok((StatusCode::CREATED, "ok"))
}

async fn signal(
    State(context): State<Arc<RelayContext>>,
    Json(request): Json<SignalRequest>,
) -> Result<impl IntoResponse, Error> {
    let answer = context.signal(&request.offer).await?;
    Ok((
        StatusCode::ACCEPTED,
        [(header::CONTENT_TYPE, "application/json")],
        answer,
    ))
}

async fn stream(State(context): State<Arc<RelayContext>>) -> impl IntoResponse {
    context.start_stream().await;
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::session::RelayConfig;
    use crate::testing::{FakeNegotiator, FakeVoiceClient};

    fn context(client: Arc<FakeVoiceClient>) -> Arc<RelayContext> {
        let (_tracks, negotiator) = FakeNegotiator::new();
        Arc::new(RelayContext::new(client, negotiator, RelayConfig::default()))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_start_and_get_info() {
        let ctx = context(FakeVoiceClient::new());
        let app = router(Arc::clone(&ctx));

        let response = app
            .clone()
            .oneshot(
                Request::post("/discord/start")
                    .header(header::AUTHORIZATION, "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/get-info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body[0]["id"], "g1");
        assert_eq!(body[0]["voiceChannels"][0]["name"], "General");

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_without_credential() {
        let ctx = context(FakeVoiceClient::new());

        let response = router(Arc::clone(&ctx))
            .oneshot(Request::post("/discord/start").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_join_twice_and_leave() {
        let ctx = context(FakeVoiceClient::new());
        let app = router(Arc::clone(&ctx));
        let body = r#"{"guildId":"g1","channelId":"c1"}"#;

        let response = app.clone().oneshot(post_json("/join", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_string(response).await, "ok");

        let response = app.clone().oneshot(post_json("/join", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        for _ in 0..2 {
            let response = app.clone().oneshot(post_json("/leave", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        assert!(!ctx.coordinator().is_joined("c1").await);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_platform_failure() {
        let client = FakeVoiceClient::new();
        client.fail_start();
        let ctx = context(client.clone());

        let response = router(Arc::clone(&ctx))
            .oneshot(
                Request::post("/discord/start")
                    .header(header::AUTHORIZATION, "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(!client.is_started());

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("invalid token"));

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_leave_teardown_failure() {
        let client = FakeVoiceClient::new();
        let ctx = context(client.clone());
        let app = router(Arc::clone(&ctx));
        let body = r#"{"guildId":"g1","channelId":"c1"}"#;

        let response = app.clone().oneshot(post_json("/join", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        client.fail_leave();

        let response = app.clone().oneshot(post_json("/leave", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(!ctx.coordinator().is_joined("c1").await);

        // Nothing left to tear down
        let response = app.oneshot(post_json("/leave", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_join_connection_failure() {
        let client = FakeVoiceClient::new();
        client.fail_join("c1");
        let ctx = context(client);

        let response = router(Arc::clone(&ctx))
            .oneshot(post_json("/join", r#"{"guildId":"g1","channelId":"c1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ctx.stats().subscribers, 0);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_signal_round_trip() {
        let ctx = context(FakeVoiceClient::new());
        let app = router(Arc::clone(&ctx));
        let offer = json!({ "offer": r#"{"type":"offer","sdp":"v=0"}"# }).to_string();

        let response = app.clone().oneshot(post_json("/webrtc/signal", &offer)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_string(response).await, r#"{"type":"answer","sdp":"v=0"}"#);

        let bad = json!({ "offer": "garbage" }).to_string();
        let response = app.oneshot(post_json("/webrtc/signal", &bad)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_and_close() {
        let client = FakeVoiceClient::new();
        let ctx = context(client.clone());
        let app = router(Arc::clone(&ctx));

        let response = app
            .clone()
            .oneshot(Request::post("/webrtc/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app
            .oneshot(Request::post("/close").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(client.is_closed());

        ctx.shutdown().await;
    }
}
