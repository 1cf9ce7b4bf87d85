use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::ClinicConfig;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// State for the authentication middleware, independent of any cell's own
/// router state.
#[derive(Clone)]
pub struct AuthContext {
    pub jwt_secret: String,
}

impl AuthContext {
    pub fn new(config: &ClinicConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}

/// Middleware for authentication: validates the bearer token and inserts the
/// resulting `AuthUser` into request extensions.
pub async fn auth_middleware(
    State(ctx): State<Arc<AuthContext>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    let token = &auth_value[7..];

    let user = validate_token(token, &ctx.jwt_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
