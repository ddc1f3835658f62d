use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Request},
    http::{
        header::{HeaderValue, CONTENT_TYPE},
        request::Parts,
    },
    Form, Json,
};
use serde_json::Value;

use crate::{error::ApiError, images::UploadItem};

/// `:id` path segment; anything that is not an integer names no user.
#[derive(Debug, Clone, Copy)]
pub struct UserPath(pub i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::NotFound("User not found"))?;
        raw.trim()
            .parse::<i64>()
            .map(UserPath)
            .map_err(|_| ApiError::NotFound("User not found"))
    }
}

/// Request fields from a multipart, JSON or urlencoded body. Bodies without
/// a content type are read as urlencoded. Only multipart can carry the
/// `profile_image` file.
#[derive(Debug, Default)]
pub struct RequestFields {
    pub fields: HashMap<String, String>,
    pub profile_image: Option<UploadItem>,
}

impl RequestFields {
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for RequestFields {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if content_type.starts_with("multipart/form-data") {
            let mp = Multipart::from_request(req, state)
                .await
                .map_err(|e| rejected(e.status(), e.body_text()))?;
            return read_multipart(mp).await;
        }

        if content_type.starts_with("application/json") || content_type.contains("+json") {
            let Json(body) = Json::<HashMap<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.status(), e.body_text()))?;
            return from_json(body);
        }

        let mut req = req;
        if content_type.is_empty() {
            req.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        }
        let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        Ok(RequestFields {
            fields,
            profile_image: None,
        })
    }
}

fn rejected(status: axum::http::StatusCode, message: String) -> ApiError {
    ApiError::Rejected { status, message }
}

/// Scalars become their text form; `null` counts as absent.
fn from_json(body: HashMap<String, Value>) -> Result<RequestFields, ApiError> {
    let mut fields = HashMap::with_capacity(body.len());
    for (name, value) in body {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ApiError::bad_request(format!(
                    "field {} must be a string",
                    name
                )))
            }
        };
        fields.insert(name, text);
    }
    Ok(RequestFields {
        fields,
        profile_image: None,
    })
}

/// Text parts keyed by name, plus the `profile_image` file part if it has content.
async fn read_multipart(mut mp: Multipart) -> Result<RequestFields, ApiError> {
    let mut out = RequestFields::default();

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "profile_image" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let body = field.bytes().await.map_err(bad_multipart)?;
            if !body.is_empty() {
                out.profile_image = Some(UploadItem {
                    file_name,
                    content_type,
                    body,
                });
            }
        } else {
            let value = field.text().await.map_err(bad_multipart)?;
            out.fields.insert(name, value);
        }
    }
    Ok(out)
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    rejected(e.status(), format!("invalid multipart body: {}", e.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};

    async fn fields(content_type: Option<&str>, body: &'static str) -> Result<RequestFields, ApiError> {
        let mut req = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            req = req.header(CONTENT_TYPE, ct);
        }
        RequestFields::from_request(req.body(Body::from(body)).unwrap(), &()).await
    }

    #[tokio::test]
    async fn reads_urlencoded_with_or_without_content_type() {
        let mut f = fields(Some("application/x-www-form-urlencoded"), "name=Bob&phone=1")
            .await
            .unwrap();
        assert_eq!(f.take("name").as_deref(), Some("Bob"));
        assert_eq!(f.take("phone").as_deref(), Some("1"));

        let mut f = fields(None, "old_password=abcdef").await.unwrap();
        assert_eq!(f.take("old_password").as_deref(), Some("abcdef"));

        assert!(fields(None, "").await.unwrap().fields.is_empty());
    }

    #[tokio::test]
    async fn reads_json_scalars() {
        let mut f = fields(
            Some("application/json"),
            r#"{"name":"Bob","phone":5550100,"email":null}"#,
        )
        .await
        .unwrap();
        assert_eq!(f.take("name").as_deref(), Some("Bob"));
        assert_eq!(f.take("phone").as_deref(), Some("5550100"));
        assert_eq!(f.take("email"), None);
    }

    #[tokio::test]
    async fn bad_bodies_are_rejections() {
        let err = fields(Some("application/json"), "{nope").await.unwrap_err();
        assert!(err.status().is_client_error());

        let err = fields(Some("application/json"), r#"{"name":["a"]}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = fields(Some("multipart/form-data"), "x").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn path_must_be_an_integer() {
        use axum::{routing::get, Router};
        use tower::ServiceExt;

        async fn echo(UserPath(id): UserPath) -> String {
            id.to_string()
        }
        async fn status(app: Router, uri: &str) -> StatusCode {
            app.oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap()
                .status()
        }

        let app = Router::new().route("/users/:id", get(echo));
        assert_eq!(status(app.clone(), "/users/12").await, StatusCode::OK);
        assert_eq!(status(app, "/users/abc").await, StatusCode::NOT_FOUND);
    }
}
