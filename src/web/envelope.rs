use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Standard success envelope. Failures are shaped by `AppError`'s
/// `IntoResponse` so both halves of the contract live next to each other.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub meta: Value,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            meta: json!({}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let Json(envelope) = ApiResponse::success(json!({"answer": "42"}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["data"]["answer"], json!("42"));
        assert_eq!(value["meta"], json!({}));
    }
}
