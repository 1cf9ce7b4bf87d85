use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{AuthUser, JwtClaims};

const TOKEN_VALIDITY_DAYS: i64 = 30;

pub fn issue_token(user_id: Uuid, jwt_secret: &str) -> Result<String, String> {
    issue_token_with_validity(user_id, jwt_secret, Duration::days(TOKEN_VALIDITY_DAYS))
}

pub fn issue_token_with_validity(
    user_id: Uuid,
    jwt_secret: &str,
    validity: Duration,
) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + validity).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to sign token: {}", e))
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthUser, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token expired".to_string(),
        _ => "Invalid token".to_string(),
    })?;

    let id = Uuid::parse_str(&data.claims.sub).map_err(|_| "Invalid token subject".to_string())?;

    debug!("Token validated successfully for user: {}", id);
    Ok(AuthUser { id })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn issued_token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, SECRET).unwrap();

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), SECRET).unwrap();

        let err = validate_token(&token, "some-other-secret").unwrap_err();
        assert_eq!(err, "Invalid token");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue_token(Uuid::new_v4(), SECRET).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = parts[1].chars().rev().collect();

        assert!(validate_token(&parts.join("."), SECRET).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // jsonwebtoken applies 60s leeway, so step well past it
        let token =
            issue_token_with_validity(Uuid::new_v4(), SECRET, Duration::minutes(-5)).unwrap();

        let err = validate_token(&token, SECRET).unwrap_err();
        assert_eq!(err, "Token expired");
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(issue_token(Uuid::new_v4(), "").is_err());
        assert!(validate_token("a.b.c", "").is_err());
    }
}
