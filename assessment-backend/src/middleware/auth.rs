use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| Error::Unauthorized("token subject is not a user id".to_string()))
    }
}

/// Caller id from optional claims; `None` means an anonymous caller.
pub fn caller_id(claims: Option<&Claims>) -> Result<Option<Uuid>> {
    claims.map(Claims::user_id).transpose()
}

enum BearerError {
    Missing,
    BadHeader,
    UnsupportedScheme,
    InvalidToken,
}

impl BearerError {
    fn into_response(self) -> Response {
        let code = match self {
            BearerError::Missing => "missing_authorization",
            BearerError::BadHeader => "bad_authorization",
            BearerError::UnsupportedScheme => "unsupported_scheme",
            BearerError::InvalidToken => "invalid_token",
        };
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
    }
}

fn bearer_claims(headers: &HeaderMap) -> std::result::Result<Claims, BearerError> {
    let auth_header = headers.get(AUTHORIZATION).ok_or(BearerError::Missing)?;
    let auth_str = auth_header.to_str().map_err(|_| BearerError::BadHeader)?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(BearerError::UnsupportedScheme)?;

    let config = crate::config::get_config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| BearerError::InvalidToken)
}

pub async fn require_bearer_auth(mut req: Request, next: Next) -> Response {
    match bearer_claims(req.headers()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Lets anonymous requests through. A token that is present but invalid is
/// still rejected.
pub async fn optional_bearer_auth(mut req: Request, next: Next) -> Response {
    match bearer_claims(req.headers()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(BearerError::Missing) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_id_parses_the_subject() {
        let id = Uuid::new_v4();
        let claims = Claims {
            sub: id.to_string(),
            exp: 0,
        };
        assert_eq!(caller_id(Some(&claims)).unwrap(), Some(id));
        assert_eq!(caller_id(None).unwrap(), None);

        let bogus = Claims {
            sub: "hr-42".to_string(),
            ..claims
        };
        assert!(matches!(caller_id(Some(&bogus)), Err(Error::Unauthorized(_))));
    }
}
