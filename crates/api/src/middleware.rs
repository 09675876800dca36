use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use moldtrack_auth::{JwtClaims, validate_claims};

use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    decoding: Arc<DecodingKey>,
}

impl AuthState {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding: Arc::new(DecodingKey::from_secret(secret)),
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    // Claims carry RFC 3339 timestamps, not numeric `exp`/`iat`, so the
    // library-level time checks are disabled and the window is validated
    // deterministically below.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::new();

    let data = jsonwebtoken::decode::<JwtClaims>(token, &state.decoding, &validation)
        .map_err(|_e| StatusCode::UNAUTHORIZED)?;

    validate_claims(&data.claims, Utc::now()).map_err(|_e| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(PrincipalContext::new(
        data.claims.sub,
        data.claims.roles.clone(),
    ));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
