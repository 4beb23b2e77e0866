use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use rally_core::{ExecError, ExecutionResult, FieldError, ResponseShape};

/// Exit code of the child that produced the response body.
pub const EXIT_CODE_HEADER: HeaderName = HeaderName::from_static("x-tool-exit-code");

// Output: the one route that wraps stdout
#[derive(Debug, Serialize)]
pub struct OutResponse {
    pub out: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Turns a finished child into the response for its route.
pub fn render(shape: ResponseShape, result: ExecutionResult) -> Response {
    let exit_code = HeaderValue::from(result.exit_code);

    let mut response = match shape {
        ResponseShape::JsonOut => Json(OutResponse {
            out: result.stdout_lossy(),
            err: (!result.stderr.is_empty()).then(|| result.stderr_lossy()),
        })
        .into_response(),
        ResponseShape::Raw => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            result.stdout,
        )
            .into_response(),
    };

    response.headers_mut().insert(EXIT_CODE_HEADER, exit_code);
    response
}

/// Everything a tool-backed handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// HEAD would run the tool only to throw its output away.
    HeadNotAllowed,
    Field(FieldError),
    MalformedBody(serde_json::Error),
    Exec(ExecError),
}

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        ApiError::Field(err)
    }
}

impl From<ExecError> for ApiError {
    fn from(err: ExecError) -> Self {
        ApiError::Exec(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::HeadNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "HEAD is not supported on tool routes".to_string(),
            ),
            ApiError::Field(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::MalformedBody(err) => (
                StatusCode::BAD_REQUEST,
                format!("malformed request body: {}", err),
            ),
            // OS detail stays in the logs
            ApiError::Exec(ExecError::Launch { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to launch tool".to_string(),
            ),
            ApiError::Exec(ExecError::Timeout { after, .. }) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("tool did not finish within {}s", after.as_secs_f64()),
            ),
            ApiError::Exec(ExecError::Capture { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to collect tool output".to_string(),
            ),
        };

        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        } else {
            warn!("Rejected request: {}", message);
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    fn finished(stdout: &str, exit_code: i32) -> ExecutionResult {
        failed(stdout, "", exit_code)
    }

    fn failed(stdout: &str, stderr: &str, exit_code: i32) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            exit_code,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn raw_response_carries_exit_code() {
        let response = render(ResponseShape::Raw, finished("uuid | name\n", 1));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[EXIT_CODE_HEADER], "1");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn json_response_is_application_json() {
        let response = render(ResponseShape::JsonOut, finished("tempest\n", 0));
        assert_eq!(response.headers()[EXIT_CODE_HEADER], "0");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn json_envelope_carries_stderr_only_when_present() {
        let quiet = serde_json::to_value(OutResponse {
            out: "ok\n".to_string(),
            err: None,
        })
        .unwrap();
        assert_eq!(quiet, serde_json::json!({ "out": "ok\n" }));

        let response = render(
            ResponseShape::JsonOut,
            failed("", "No active deployment\n", 1),
        );
        assert_eq!(response.headers()[EXIT_CODE_HEADER], "1");
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            ApiError::HeadNotAllowed.into_response().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );

        let field = ApiError::from(FieldError::Missing { field: "name" });
        assert_eq!(field.into_response().status(), StatusCode::BAD_REQUEST);

        let malformed = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            ApiError::MalformedBody(malformed).into_response().status(),
            StatusCode::BAD_REQUEST
        );

        let launch = ApiError::from(ExecError::Launch {
            program: "rally".to_string(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });
        assert_eq!(
            launch.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let timeout = ApiError::from(ExecError::Timeout {
            program: "rally".to_string(),
            after: Duration::from_secs(300),
        });
        assert_eq!(timeout.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
