//! # HTTP surface
//!
//! `GET /` answers without authentication; everything under `/api/v1`
//! requires the bearer API key unless authentication is disabled.
pub mod auth;
pub mod routes;

use crate::config::Config;
use crate::database::Database;
use crate::ingest::Ingestor;
use crate::server::auth::ApiKey;
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::error;
use tracing::info;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub api_key: Arc<ApiKey>,
}

impl AppState {
    pub fn new(ingestor: Ingestor, api_key: ApiKey) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
            api_key: Arc::new(api_key),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .route("/upload", post(routes::upload))
        .route("/tables", get(routes::tables))
        .route("/tables/{name}", get(routes::table_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/", get(routes::root))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Opens the database, builds the router and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let database = Database::open(&config.database)
        .with_context(|| format!("Failed to open database {}", config.database.display()))?;
    let ingestor = Ingestor::new(database, &config.schema, &config.upload_dir, config.batch_size)
        .context("Failed to prepare ingestion")?;

    let api_key = match config.api_key.as_deref() {
        _ if config.disable_auth => {
            warn!("Authentication is disabled, /api routes are open to every client");
            ApiKey::Disabled
        }
        Some(key) => ApiKey::new(key),
        None => anyhow::bail!("API_KEY is not configured"),
    };

    let app = router(AppState::new(ingestor, api_key), config.max_upload_bytes);
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(
        address = %config.listen,
        database = %config.database.display(),
        schema = %config.schema,
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::WorkbookBuilder;
    use axum::body::Body;
    use axum::http::header::AUTHORIZATION;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use axum::http::StatusCode;
    use axum::response::Response;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const KEY: &str = "test-key";
    const BOUNDARY: &str = "sheet-ingest-boundary";

    fn app(api_key: ApiKey) -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open_in_memory().unwrap();
        let ingestor = Ingestor::new(database, "main", &dir.path().join("uploads"), 0).unwrap();
        (router(AppState::new(ingestor, api_key), 1024 * 1024), dir)
    }

    fn multipart(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/api/v1/upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(key) = key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn workbook() -> Vec<u8> {
        WorkbookBuilder::new()
            .sheet("Hoja1", &[&["Código", "Nombre Producto"], &["A1", "Café"], &["", ""], &["B2", "Té"]])
            .build()
    }

    #[tokio::test]
    async fn root_needs_no_key() {
        let (app, _dir) = app(ApiKey::new(KEY));
        let response = app.oneshot(get("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn uploads_and_reads_back() {
        let (app, _dir) = app(ApiKey::new(KEY));
        let response = app
            .clone()
            .oneshot(upload_request(multipart("file", "Inventario.xlsx", &workbook()), Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["table"], "inventario");
        assert_eq!(body["inserted"], 2);
        assert_eq!(body["skipped"], 1);
        assert_eq!(body["preview"][1]["nombre_producto"], "Té");

        let authorization = format!("Bearer {KEY}");
        let response = app.clone().oneshot(get("/api/v1/tables", Some(&authorization))).await.unwrap();
        assert_eq!(json(response).await, serde_json::json!({ "tables": ["inventario"] }));

        let response = app.clone().oneshot(get("/api/v1/tables/Inventario", Some(&authorization))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["rows"].as_array().unwrap().len(), 2);

        let response = app.oneshot(get("/api/v1/tables/nada", Some(&authorization))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn client_errors_are_400() {
        let (app, _dir) = app(ApiKey::Disabled);
        let response = app
            .clone()
            .oneshot(upload_request(multipart("file", "datos.csv", b"a,b\n"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json(response).await["error"].as_str().unwrap().contains(".xlsx"));

        let response = app
            .clone()
            .oneshot(upload_request(multipart("other", "datos.xlsx", &workbook()), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let header_only = WorkbookBuilder::new().sheet("Hoja1", &[&["a"]]).build();
        let response = app
            .oneshot(upload_request(multipart("file", "vacio.xlsx", &header_only), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn server_errors_hide_detail() {
        let (app, _dir) = app(ApiKey::Disabled);
        let response = app
            .oneshot(upload_request(multipart("file", "!!!.xlsx", &workbook()), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await, serde_json::json!({ "error": "Failed to process the file" }));
    }

    #[tokio::test]
    async fn authentication_statuses() {
        let (app, _dir) = app(ApiKey::new(KEY));
        let response = app.clone().oneshot(get("/api/v1/tables", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(json(response).await["details"].is_string());

        let response = app.clone().oneshot(get("/api/v1/tables", Some("Token abc"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.clone().oneshot(get("/api/v1/tables", Some("Bearer"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/api/v1/tables", Some("Bearer wrong"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected() {
        let (app, _dir) = app(ApiKey::Disabled);
        let big = vec![b'x'; 2 * 1024 * 1024];
        let response = app
            .oneshot(upload_request(multipart("file", "grande.xlsx", &big), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
