//! API route modules.

pub mod debug;
pub mod stream;

use axum::{Router, routing::get};

use crate::api::server::AppState;

/// Plain-text liveness banner.
pub const BANNER: &str = "GLIVE SERVER IS RUNNING";

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .nest("/glivestreaming/v1", stream::router())
        .nest("/debug", debug::router())
        .with_state(state)
}

async fn banner() -> &'static str {
    BANNER
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::test_state;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_banner() {
        let (state, _) = test_state().await;
        let response = create_router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], BANNER.as_bytes());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (state, _) = test_state().await;
        let response = create_router(state)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
