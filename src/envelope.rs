use std::collections::BTreeMap;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// `messages` is either a single success/error line or a per-field error map.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Messages {
    Success { success: String },
    Error { error: String },
    Fields(BTreeMap<String, String>),
}

/// Uniform response body: `{status, messages, data?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: u16,
    pub messages: Messages,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status: status.as_u16(),
            messages: Messages::Success {
                success: message.into(),
            },
            data,
        }
    }

    pub fn ok(data: T) -> Self {
        Self::success(StatusCode::OK, "OK", Some(data))
    }

    pub fn created(data: T) -> Self {
        Self::success(StatusCode::CREATED, "OK", Some(data))
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::success(StatusCode::OK, message, None)
    }

    pub fn failure(status: StatusCode, messages: Messages) -> Self {
        Self {
            status: status.as_u16(),
            messages,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_with_data() {
        let env = Envelope::created(json!({ "user_id": 7 }));
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(
            v,
            json!({ "status": 201, "messages": { "success": "OK" }, "data": { "user_id": 7 } })
        );
    }

    #[test]
    fn message_only_omits_data() {
        let v = serde_json::to_value(Envelope::message("User updated successfully")).unwrap();
        assert_eq!(
            v,
            json!({ "status": 200, "messages": { "success": "User updated successfully" } })
        );
    }

    #[test]
    fn field_errors_flatten_into_messages() {
        let mut fields = BTreeMap::new();
        fields.insert("email".to_string(), "bad".to_string());
        let v = serde_json::to_value(Envelope::failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            Messages::Fields(fields),
        ))
        .unwrap();
        assert_eq!(v, json!({ "status": 422, "messages": { "email": "bad" } }));
    }

    #[test]
    fn http_status_mirrors_body() {
        let res = Envelope::failure(
            StatusCode::NOT_FOUND,
            Messages::Error {
                error: "User not found".into(),
            },
        )
        .into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
