use crate::database::identifier::normalize;
use crate::database::preview::fetch_rows;
use crate::database::preview::list_tables;
use crate::database::preview::JsonRow;
use crate::database::preview::TABLE_DATA_LIMIT;
use crate::error::SheetIngestError;
use crate::ingest::IngestError;
use crate::ingest::IngestionResult;
use crate::ingest::UploadedFile;
use crate::server::AppState;
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use serde_json::Value as JsonValue;
use tokio::task::JoinError;
use tracing::error;
use tracing::warn;

/// Form field carrying the workbook.
const FILE_FIELD: &str = "file";

/// Error response rendered as `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        let status = if error.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        ApiError::new(status, error.public_message())
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        warn!(%error, "Malformed multipart request");
        ApiError::new(error.status(), error.body_text())
    }
}

impl From<JoinError> for ApiError {
    fn from(error: JoinError) -> Self {
        error!(%error, "Blocking task failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

pub async fn root() -> &'static str {
    "Sheet ingest service is running"
}

/// `POST /api/v1/upload`
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<IngestionResult>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if upload.is_none() && field.name() == Some(FILE_FIELD) {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let content = field.bytes().await?;
            upload = Some(UploadedFile::new(file_name, content.to_vec()));
        }
    }
    let upload = match upload {
        Some(upload) => upload,
        None => {
            warn!("Upload without a file field");
            return Err(IngestError::MissingFile.into());
        }
    };

    let ingestor = state.ingestor.clone();
    let result = tokio::task::spawn_blocking(move || ingestor.ingest(upload)).await??;
    Ok(Json(result))
}

/// `GET /api/v1/tables`
pub async fn tables(State(state): State<AppState>) -> Result<Json<JsonValue>, ApiError> {
    let ingestor = state.ingestor.clone();
    let tables = tokio::task::spawn_blocking(move || -> Result<Vec<String>, SheetIngestError> {
        let conn = ingestor.database().connect()?;
        list_tables(&conn, ingestor.schema())
    })
    .await?
    .map_err(|error| {
        error!(%error, "Failed to list tables");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list tables")
    })?;
    Ok(Json(json!({ "tables": tables })))
}

/// `GET /api/v1/tables/{name}`: the first rows of one table.
pub async fn table_data(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<JsonValue>, ApiError> {
    let table = normalize(&name);
    let not_found = || ApiError::new(StatusCode::NOT_FOUND, format!("Table '{name}' does not exist"));
    if table.is_empty() {
        return Err(not_found());
    }

    let ingestor = state.ingestor.clone();
    let rows = tokio::task::spawn_blocking(move || -> Result<Option<Vec<JsonRow>>, SheetIngestError> {
        if !ingestor.database().table_exists(ingestor.schema(), &table)? {
            return Ok(None);
        }
        let conn = ingestor.database().connect()?;
        fetch_rows(&conn, ingestor.schema(), &table, TABLE_DATA_LIMIT).map(Some)
    })
    .await?
    .map_err(|error| {
        error!(%error, "Failed to read table data");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read table data")
    })?
    .ok_or_else(not_found)?;
    Ok(Json(json!({ "rows": rows })))
}
