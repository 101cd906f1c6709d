use crate::errors::ApiError;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET,POST,PUT,PATCH,DELETE,OPTIONS"),
    (
        "Access-Control-Allow-Headers",
        "Content-Type,Authorization,X-Requested-With,X-User-Id,X-Account-Id",
    ),
];

/// JSON body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn builder(status: StatusCode) -> lambda_http::http::response::Builder {
    CORS_HEADERS
        .iter()
        .fold(Response::builder().status(status), |b, (k, v)| b.header(*k, *v))
}

fn envelope_response<T: Serialize>(
    status: StatusCode,
    envelope: &Envelope<T>,
) -> Result<Response<Body>, Error> {
    Ok(builder(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(envelope)?.into())
        .map_err(Box::new)?)
}

/// 200 with CORS headers and no body.
pub fn preflight() -> Result<Response<Body>, Error> {
    Ok(builder(StatusCode::OK).body(Body::Empty).map_err(Box::new)?)
}

pub fn ok<T: Serialize>(data: T) -> Result<Response<Body>, Error> {
    json(StatusCode::OK, data)
}

pub fn json<T: Serialize>(status: StatusCode, data: T) -> Result<Response<Body>, Error> {
    envelope_response(
        status,
        &Envelope {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        },
    )
}

/// Success without a payload, e.g. after a delete.
pub fn message(msg: &str) -> Result<Response<Body>, Error> {
    envelope_response::<()>(
        StatusCode::OK,
        &Envelope {
            success: true,
            data: None,
            error: None,
            message: Some(msg.to_string()),
        },
    )
}

pub fn error(err: &ApiError) -> Result<Response<Body>, Error> {
    if let ApiError::Dependency(detail) = err {
        tracing::error!("Dependency failure: {}", detail);
    }
    envelope_response::<()>(
        err.status(),
        &Envelope {
            success: false,
            data: None,
            error: Some(err.code().to_string()),
            message: Some(err.public_message()),
        },
    )
}

/// Render a handler outcome.
pub fn from_result<T: Serialize>(
    status: StatusCode,
    result: Result<T, ApiError>,
) -> Result<Response<Body>, Error> {
    match result {
        Ok(data) => json(status, data),
        Err(e) => error(&e),
    }
}

pub fn not_found() -> Result<Response<Body>, Error> {
    error(&ApiError::not_found("Not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn body_json(resp: &Response<Body>) -> Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    fn assert_cors(resp: &Response<Body>) {
        for (k, v) in CORS_HEADERS {
            assert_eq!(resp.headers().get(k).unwrap(), v);
        }
        // credentials are never allowed alongside a wildcard origin
        assert!(resp.headers().get("Access-Control-Allow-Credentials").is_none());
    }

    #[test]
    fn test_preflight_has_cors_and_empty_body() {
        let resp = preflight().unwrap();
        assert_eq!(resp.status(), 200);
        assert_cors(&resp);
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_success_envelope() {
        let resp = ok(json!({"id": "abc"})).unwrap();
        assert_eq!(resp.status(), 200);
        assert_cors(&resp);
        assert_eq!(body_json(&resp), json!({"success": true, "data": {"id": "abc"}}));
    }

    #[test]
    fn test_error_envelope() {
        let resp = error(&ApiError::Auth("Unauthorized".into())).unwrap();
        assert_eq!(resp.status(), 401);
        assert_cors(&resp);
        assert_eq!(
            body_json(&resp),
            json!({"success": false, "error": "AuthError", "message": "Unauthorized"})
        );
    }

    #[test]
    fn test_message_envelope() {
        let resp = message("Connection deleted").unwrap();
        assert_eq!(
            body_json(&resp),
            json!({"success": true, "message": "Connection deleted"})
        );
    }

    #[test]
    fn test_from_result_maps_statuses() {
        let resp = from_result::<Value>(StatusCode::CREATED, Err(ApiError::access_denied())).unwrap();
        assert_eq!(resp.status(), 403);
        let resp = from_result(StatusCode::CREATED, Ok(json!([]))).unwrap();
        assert_eq!(resp.status(), 201);
    }
}
