use crate::errors::ApiError;
use serde::de::DeserializeOwned;

/// Decode a JSON request body. An empty body is a 400.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::validation("Request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Rejected request body: {}", e);
        ApiError::from(e)
    })
}

/// Trimmed, non-empty string field or a 400 naming the field.
pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::validation(format!("{} is required", field))),
    }
}

/// `limit` query parameter: default when absent, 400 outside `1..=max`.
pub fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> Result<usize, ApiError> {
    match raw {
        None => Ok(default),
        Some(s) => match s.parse::<usize>() {
            Ok(n) if (1..=max).contains(&n) => Ok(n),
            _ => Err(ApiError::validation(format!(
                "limit must be a number between 1 and {}",
                max
            ))),
        },
    }
}
