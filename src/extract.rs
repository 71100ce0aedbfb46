use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ApiError;

pub const FIELD_REQUIRED: &str = "This field is required.";

/// `Json` body that rejects with the API error envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

lazy_static! {
    static ref MISSING_FIELD: Regex = Regex::new(r"missing field `([^`]+)`").unwrap();
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        warn!(error = %text, "request body rejected");
        if let JsonRejection::JsonDataError(_) = rejection {
            if let Some(field) = MISSING_FIELD.captures(&text).and_then(|c| c.get(1)) {
                return ApiError::field(field.as_str(), FIELD_REQUIRED);
            }
        }
        ApiError::BadRequest(text)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::FIELD_REQUIRED;
    use crate::testing::{TestContext, STRONG_PASSWORD};

    #[tokio::test]
    async fn missing_fields_are_reported_per_field() {
        let ctx = TestContext::new();

        let (status, body) = ctx
            .request(
                Method::POST,
                "/api/v1/password-reset",
                None,
                Some(json!({"user": {}})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["email"][0], FIELD_REQUIRED);

        let (status, body) = ctx
            .request(
                Method::PATCH,
                "/api/v1/password-reset/abc",
                None,
                Some(json!({"password_data": {"new_password": STRONG_PASSWORD}})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["confirm_password"][0], FIELD_REQUIRED);

        let (status, body) = ctx
            .request(
                Method::POST,
                "/api/v1/register",
                None,
                Some(json!({"user": {"email": "ada@example.com", "password": STRONG_PASSWORD}})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["username"][0], FIELD_REQUIRED);
    }

    #[tokio::test]
    async fn missing_envelope_is_a_field_error() {
        let ctx = TestContext::new();
        let (status, body) = ctx
            .request(Method::POST, "/api/v1/login", None, Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["user"][0], FIELD_REQUIRED);
    }

    #[tokio::test]
    async fn wrong_types_are_400_in_the_envelope() {
        let ctx = TestContext::new();
        let (status, body) = ctx
            .request(
                Method::POST,
                "/api/v1/auth/google",
                None,
                Some(json!({"google": {"access_token": 42}})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"].is_string(), "{}", body);
    }

    #[tokio::test]
    async fn malformed_json_is_400_in_the_envelope() {
        let ctx = TestContext::new();
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/v1/login")
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{\"user\": "))
            .unwrap();
        let (status, body) = ctx.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"].is_string(), "{}", body);
    }

    #[tokio::test]
    async fn missing_content_type_is_400_in_the_envelope() {
        let ctx = TestContext::new();
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/v1/login")
            .body(axum::body::Body::from("{}"))
            .unwrap();
        let (status, body) = ctx.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"].is_string(), "{}", body);
    }
}
