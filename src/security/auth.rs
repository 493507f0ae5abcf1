//! Authentication Module
//!
//! A visitor is authenticated when the request carries a credential issued by
//! the login flow:
//! - an API key (`X-API-Key` or `Authorization: ApiKey …`)
//! - a JWT (`Authorization: Bearer …`, HS256)
//!
//! No credential means an anonymous visitor. A credential that fails
//! verification is an error, never a silent downgrade to anonymous.

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::config::config::SecurityConfig;
use crate::error::{AppError, Result};

/// Credentials presented with a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// API key (if provided)
    pub api_key: Option<String>,
    /// JWT token (if provided)
    pub jwt_token: Option<String>,
}

impl Credentials {
    pub fn new(api_key: Option<String>, jwt_token: Option<String>) -> Self {
        Self { api_key, jwt_token }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.jwt_token.is_none()
    }

    /// Try to extract credentials from Authorization header
    pub fn from_authorization_header(auth_header: Option<&str>) -> Self {
        match auth_header {
            Some(header) => {
                if let Some(key) = header.strip_prefix("ApiKey ") {
                    Self::new(Some(key.trim().to_string()), None)
                } else if let Some(token) = header.strip_prefix("Bearer ") {
                    Self::new(None, Some(token.trim().to_string()))
                } else {
                    Self::anonymous()
                }
            }
            None => Self::anonymous(),
        }
    }

    /// `Authorization` takes precedence over `X-API-Key`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let from_auth = Self::from_authorization_header(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok()),
        );
        if !from_auth.is_empty() {
            return from_auth;
        }

        headers
            .get("X-API-Key")
            .and_then(|value| value.to_str().ok())
            .map(|key| Self::new(Some(key.trim().to_string()), None))
            .unwrap_or_default()
    }
}

/// Token type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// API Key token
    ApiKey,
    /// Bearer token (JWT)
    Bearer,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::ApiKey => write!(f, "ApiKey"),
            TokenType::Bearer => write!(f, "Bearer"),
        }
    }
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject: String,
    pub token_type: TokenType,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID from the login flow)
    pub sub: String,
    /// Token expiration timestamp
    pub exp: usize,
    /// Token not before timestamp
    pub nbf: usize,
    /// Issued at timestamp
    pub iat: usize,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Unique token ID
    pub jti: String,
}

/// Authentication trait for different authentication methods
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify credentials and return who presented them
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity>;
}

/// API Key based authentication
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    valid_keys: HashSet<String>,
}

impl ApiKeyAuth {
    pub fn new(api_keys: HashSet<String>) -> Self {
        Self {
            valid_keys: api_keys,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.valid_keys.is_empty()
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity> {
        if !self.is_enabled() {
            return Err(AppError::Authentication(
                "API key authentication is disabled".to_string(),
            ));
        }

        let api_key = credentials
            .api_key
            .as_ref()
            .ok_or_else(|| AppError::Authentication("No API key provided".to_string()))?;

        if !self.valid_keys.contains(api_key) {
            return Err(AppError::Authentication("Invalid API key".to_string()));
        }

        let prefix: String = api_key.chars().take(4).collect();
        Ok(Identity {
            subject: format!("api-key:{}…", prefix),
            token_type: TokenType::ApiKey,
        })
    }
}

/// JWT based authentication
#[derive(Clone)]
pub struct JwtAuth {
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
}

impl fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAuth")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl JwtAuth {
    pub fn new(secret: &str, issuer: String, audience: String) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
        }
    }

    /// Verify signature, expiry, issuer and audience.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.set_audience(&[self.audience.clone()]);
        validation.validate_nbf = true;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| AppError::Authentication(format!("Invalid JWT token: {}", e)))
    }
}

#[async_trait]
impl Authenticator for JwtAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity> {
        let jwt_token = credentials
            .jwt_token
            .as_ref()
            .ok_or_else(|| AppError::Authentication("No JWT token provided".to_string()))?;

        let claims = self.validate_token(jwt_token)?;
        Ok(Identity {
            subject: claims.sub,
            token_type: TokenType::Bearer,
        })
    }
}

/// Combined authenticator that tries multiple methods
#[derive(Debug, Clone)]
pub struct CombinedAuthenticator {
    api_key_auth: ApiKeyAuth,
    /// `None` when no JWT secret is configured
    jwt_auth: Option<JwtAuth>,
}

impl CombinedAuthenticator {
    pub fn new(api_key_auth: ApiKeyAuth, jwt_auth: Option<JwtAuth>) -> Self {
        Self {
            api_key_auth,
            jwt_auth,
        }
    }

    /// Create from security settings
    pub fn from_config(config: &SecurityConfig) -> Self {
        let jwt_auth = (!config.jwt_secret.is_empty()).then(|| {
            JwtAuth::new(
                &config.jwt_secret,
                config.jwt_issuer.clone(),
                config.jwt_audience.clone(),
            )
        });

        Self::new(ApiKeyAuth::new(config.api_keys.clone()), jwt_auth)
    }

    /// Anonymous for empty credentials, an identity for valid ones, an
    /// authentication error otherwise.
    pub async fn resolve(&self, credentials: &Credentials) -> Result<Option<Identity>> {
        if credentials.is_empty() {
            return Ok(None);
        }
        self.authenticate(credentials).await.map(Some)
    }
}

#[async_trait]
impl Authenticator for CombinedAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity> {
        if credentials.api_key.is_some() {
            return self.api_key_auth.authenticate(credentials).await;
        }

        match (&self.jwt_auth, &credentials.jwt_token) {
            (Some(jwt_auth), Some(_)) => jwt_auth.authenticate(credentials).await,
            (None, Some(_)) => Err(AppError::Authentication(
                "JWT authentication is disabled".to_string(),
            )),
            _ => Err(AppError::Authentication(
                "No valid authentication method provided".to_string(),
            )),
        }
    }
}
