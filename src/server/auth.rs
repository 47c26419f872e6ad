//! Bearer API-key check for the `/api` routes.
use crate::server::AppState;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// How requests to the API are authenticated.
#[derive(Clone)]
pub enum ApiKey {
    /// Every request passes
    Disabled,
    /// SHA-256 digest of the expected bearer token
    Required([u8; 32]),
}

impl ApiKey {
    pub fn new(key: &str) -> Self {
        ApiKey::Required(Sha256::digest(key.as_bytes()).into())
    }

    /// Compares digests in constant time so the response time does not
    /// depend on how much of the token matched.
    fn accepts(&self, token: &str) -> bool {
        match self {
            ApiKey::Disabled => true,
            ApiKey::Required(expected) => {
                let provided = Sha256::digest(token.as_bytes());
                provided.as_slice().ct_eq(expected.as_slice()).into()
            }
        }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiKey::Disabled => f.write_str("Disabled"),
            ApiKey::Required(_) => f.write_str("Required(..)"),
        }
    }
}

fn reject(status: StatusCode, error: &str, details: &str) -> Response {
    (status, Json(json!({ "error": error, "details": details }))).into_response()
}

/// Middleware: missing header -> 401, malformed header -> 400, wrong key -> 403.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let ApiKey::Disabled = state.api_key.as_ref() {
        return next.run(request).await;
    }

    let header = match request.headers().get(AUTHORIZATION) {
        Some(header) => header,
        None => {
            return reject(
                StatusCode::UNAUTHORIZED,
                "Token required",
                "Send the header Authorization: Bearer <token>",
            )
        }
    };
    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| *scheme == "Bearer")
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty());
    let token = match token {
        Some(token) => token,
        None => {
            return reject(
                StatusCode::BAD_REQUEST,
                "Invalid token format",
                "Use the format: Bearer <token>",
            )
        }
    };

    if state.api_key.accepts(token) {
        next.run(request).await
    } else {
        reject(
            StatusCode::FORBIDDEN,
            "Access denied",
            "The provided token is not valid",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_digests() {
        let key = ApiKey::new("s3cret");
        assert!(key.accepts("s3cret"));
        assert!(!key.accepts("s3cret "));
        assert!(!key.accepts(""));
        assert!(ApiKey::Disabled.accepts("anything"));
    }

    #[test]
    fn debug_hides_digest() {
        assert_eq!(format!("{:?}", ApiKey::new("s3cret")), "Required(..)");
    }
}
