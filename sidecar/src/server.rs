use crate::app::App;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{any, get},
};
use loputoo_common::access_log;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

pub async fn run(cancel: CancellationToken, args: crate::args::ServerArgs, app_state: App) -> Result<()> {
    let port = args.port;
    let addr: SocketAddr = format!("0.0.0.0:{}", port)
        .parse()
        .expect("Invalid address");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!(
        "{}{}",
        "🚀 Starting sidecar • port=".green(),
        port.green().dimmed()
    );
    loputoo_common::signal_ready();
    axum::serve(listener, router(app_state))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .context("Failed to serve consent router")?;
    println!("{}", "🛑 Sidecar shut down gracefully.".red());
    Ok(())
}

pub fn router(app_state: App) -> Router {
    Router::new()
        .route("/allow_delete", get(get_allow_delete).post(set_allow_delete))
        .route("/shutdown", get(get_shutdown).post(set_shutdown))
        .route("/health", any(health))
        .with_state(app_state)
        .layer(middleware::from_fn(access_log::internal))
}

/// Wire format of the deletion consent flag.
#[derive(Serialize, Deserialize)]
pub struct AllowDelete {
    pub allowed: bool,
}

/// Wire format of the operator's shutdown request flag.
#[derive(Serialize, Deserialize)]
pub struct Shutdown {
    pub shutdown: bool,
}

async fn health() -> impl IntoResponse {
    StatusCode::OK.into_response()
}

async fn get_allow_delete(State(state): State<App>) -> impl IntoResponse {
    let allowed = state.state.lock().await.delete_allowed;
    (StatusCode::OK, Json(AllowDelete { allowed }))
}

async fn set_allow_delete(
    State(state): State<App>,
    Json(request): Json<AllowDelete>,
) -> impl IntoResponse {
    state.state.lock().await.delete_allowed = request.allowed;
    (StatusCode::OK, Json(request))
}

async fn get_shutdown(State(state): State<App>) -> impl IntoResponse {
    let shutdown = state.state.lock().await.shutdown_requested;
    (StatusCode::OK, Json(Shutdown { shutdown }))
}

async fn set_shutdown(
    State(state): State<App>,
    Json(request): Json<Shutdown>,
) -> impl IntoResponse {
    state.state.lock().await.shutdown_requested = request.shutdown;
    (StatusCode::OK, Json(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        router(App::new(CancellationToken::new()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn allow_delete_defaults_to_false() {
        let response = test_router()
            .oneshot(Request::get("/allow_delete").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"allowed": false}));
    }

    #[tokio::test]
    async fn allow_delete_round_trip() {
        let router = test_router();

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/allow_delete",
                serde_json::json!({"allowed": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"allowed": true}));

        let response = router
            .oneshot(Request::get("/allow_delete").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, serde_json::json!({"allowed": true}));
    }

    #[tokio::test]
    async fn shutdown_round_trip() {
        let router = test_router();

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/shutdown",
                serde_json::json!({"shutdown": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(Request::get("/shutdown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, serde_json::json!({"shutdown": true}));

        // Last writer wins.
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/shutdown",
                serde_json::json!({"shutdown": false}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/shutdown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, serde_json::json!({"shutdown": false}));
    }

    #[tokio::test]
    async fn flags_are_independent() {
        let router = test_router();

        router
            .clone()
            .oneshot(json_request(
                "POST",
                "/allow_delete",
                serde_json::json!({"allowed": true}),
            ))
            .await
            .unwrap();

        let response = router
            .oneshot(Request::get("/shutdown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await, serde_json::json!({"shutdown": false}));
    }

    #[tokio::test]
    async fn health_accepts_any_method() {
        for method in ["GET", "POST", "HEAD"] {
            let response = test_router()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/health")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
