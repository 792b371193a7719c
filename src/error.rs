use std::collections::BTreeMap;
use std::env;
use std::fmt::{self, Debug, Display};

use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub const INVALID_STATE: i32 = 100;
pub const INVALID_INPUT: i32 = 101;
pub const UNAUTHENTICATED: i32 = 102;
pub const FORBIDDEN: i32 = 103;
pub const NOT_FOUND: i32 = 104;

/// Errors with a code in `1..=99` are internal and never expose their message
/// to the caller.
#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl Error {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            errors: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            INVALID_STATE | INVALID_INPUT => StatusCode::BAD_REQUEST,
            UNAUTHENTICATED => StatusCode::UNAUTHORIZED,
            FORBIDDEN => StatusCode::FORBIDDEN,
            NOT_FOUND => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        authorizor_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match self.is_internal() {
            true => "Internal server error",
            false => self.message.as_str(),
        };

        let mut body = json!({
            "code": self.code,
            "message": message,
        });

        if let Some(errors) = &self.errors {
            body["errors"] = json!(errors);
        }

        (status, Json(body)).into_response()
    }
}

pub fn invalid_state_error(message: impl Into<String>) -> Error {
    Error::new(INVALID_STATE, message)
}

pub fn invalid_transition_error(from: impl Display, to: impl Display) -> Error {
    invalid_state_error(format!("Cannot transition from {} to {}", from, to))
}

pub fn invalid_input_error(message: impl Into<String>) -> Error {
    Error::new(INVALID_INPUT, message)
}

pub fn validation_error(errors: BTreeMap<String, Vec<String>>) -> Error {
    Error {
        errors: Some(errors),
        ..invalid_input_error("Validation failed")
    }
}

pub fn unauthenticated_error() -> Error {
    Error::new(UNAUTHENTICATED, "Unauthorized")
}

pub fn forbidden_error(message: impl Into<String>) -> Error {
    Error::new(FORBIDDEN, message)
}

pub fn not_found_error(message: impl Into<String>) -> Error {
    Error::new(NOT_FOUND, message)
}

pub fn env_var_error(err: env::VarError) -> Error {
    tracing::error!(error = %err, "environment variable error");

    Error::new(1, "environment variable error")
}

pub fn database_error<T: Debug>(err: T) -> Error {
    tracing::error!(error = ?err, "database error");

    Error::new(2, "database error")
}

pub fn authorizor_error(err: oso::OsoError) -> Error {
    tracing::error!(error = %err, "authorizor error");

    Error::new(3, "authorizor error")
}

pub fn configuration_error(message: impl Into<String>) -> Error {
    let message = message.into();
    tracing::error!(%message, "configuration error");

    Error::new(4, message)
}

pub fn unexpected_error() -> Error {
    Error::new(5, "unexpected error")
}

#[test]
fn status_mapping_test() {
    assert_eq!(invalid_state_error("x").status(), StatusCode::BAD_REQUEST);
    assert_eq!(invalid_input_error("x").status(), StatusCode::BAD_REQUEST);
    assert_eq!(unauthenticated_error().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(forbidden_error("x").status(), StatusCode::FORBIDDEN);
    assert_eq!(not_found_error("x").status(), StatusCode::NOT_FOUND);
    assert_eq!(unexpected_error().status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(database_error("boom").is_internal());
}

#[test]
fn invalid_transition_message_test() {
    let err = invalid_transition_error("requested", "completed");

    assert_eq!(err.code, INVALID_STATE);
    assert_eq!(err.message, "Cannot transition from requested to completed");
}

#[tokio::test]
async fn internal_errors_hide_their_message_test() {
    let response = database_error("connection refused").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "Internal server error");
    assert_eq!(body["code"], 2);
}
