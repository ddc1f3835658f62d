use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    pub dir: String,
    pub base_url: String,
}

/// How the current user is identified. Bearer tokens are always checked;
/// the plain id header is only honoured when `trust_header` is on, for
/// deployments where a gateway owns that header.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub trust_header: bool,
    pub header: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub images: ImageConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let images = ImageConfig {
            dir: std::env::var("PROFILE_IMAGE_DIR").unwrap_or_else(|_| "public/images/user".into()),
            base_url: std::env::var("PROFILE_IMAGE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/images/user".into()),
        };
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "bidhouse".into()),
            trust_header: std::env::var("SESSION_TRUST_HEADER")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            header: std::env::var("SESSION_USER_HEADER")
                .map(|v| v.to_ascii_lowercase())
                .unwrap_or_else(|_| "x-session-user-id".into()),
        };
        Ok(Self {
            database_url,
            max_connections,
            images,
            session,
        })
    }
}
