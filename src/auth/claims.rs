use serde::{Deserialize, Serialize};

/// Payload of a session token minted by the login service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String, // user id
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
}
