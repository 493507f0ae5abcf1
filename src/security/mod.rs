//! Security Module
//!
//! - Authentication (API Key + JWT)
//! - Visitor resolution and security headers middleware

pub mod auth;
pub mod middleware;

pub use auth::{
    ApiKeyAuth, Authenticator, CombinedAuthenticator, Credentials, Identity, JwtAuth, TokenType,
};
pub use middleware::{Visitor, security_headers_middleware, visitor_middleware};
