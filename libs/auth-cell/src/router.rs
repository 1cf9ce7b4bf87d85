use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthContext};

use crate::handlers::{self, AuthState};

pub fn auth_routes(state: Arc<AuthState>, auth: Arc<AuthContext>) -> Router {
    let public_routes = Router::new()
        .route("/send-otp", post(handlers::send_otp))
        .route("/verify-otp", post(handlers::verify_otp))
        .route("/login", post(handlers::login))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password", post(handlers::reset_password))
        .route("/resend-otp", post(handlers::resend_otp));

    let protected_routes = Router::new()
        .route("/me", get(handlers::me))
        .route("/update-profile", put(handlers::update_profile))
        .route("/change-password", post(handlers::change_password))
        .route("/logout", post(handlers::logout))
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
