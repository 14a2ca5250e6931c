use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{error::AppError, models::CurrentUser, AppState};

/// Cookie holding the access token of a browser session.
pub const SESSION_COOKIE: &str = "evm_session";

// Audience the identity service stamps on user access tokens
const TOKEN_AUDIENCE: &str = "authenticated";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (User ID)
    pub exp: usize,
    pub aud: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

// --- Token Verification ---

/// Checks signature, expiry and audience of an HS256 access token.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let decoded = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| {
            warn!("Token validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".into()),
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AppError::Unauthorized("Invalid token audience".into()),
                _ => AppError::Unauthorized("Invalid token".into()),
            }
        })?;

    Ok(decoded.claims)
}

/// Access token from the Authorization header, else from the session cookie.
pub fn session_token(parts: &Parts) -> Option<String> {
    if let Some(Authorization(bearer)) = parts.headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

// --- Extractor ---

/// The signed-in user. Handlers that also serve visitors take
/// `Option<AuthenticatedUser>`.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user: CurrentUser,
    pub access_token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or_else(|| AppError::Unauthorized("Please sign in to continue".into()))?;
        let app_state = AppState::from_ref(state);

        // Reject forged or expired tokens without a round trip
        let claims = match app_state.settings.jwt_secret() {
            Some(secret) => Some(verify_token(&token, secret)?),
            None => None,
        };

        let user = app_state
            .sessions
            .current_user(&token, app_state.backend.as_ref())
            .await?
            .ok_or_else(|| {
                info!("Session token no longer valid");
                AppError::Unauthorized("Your session has expired. Please sign in again.".into())
            })?;

        if let Some(claims) = claims {
            if claims.sub != user.id {
                warn!("Token subject {} does not match user {}", claims.sub, user.id);
                return Err(AppError::Unauthorized("Invalid token".into()));
            }
        }

        Ok(AuthenticatedUser { user, access_token: token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Request};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, aud: &str, exp_offset: i64) -> String {
        let claims = Claims {
            sub: "u1".into(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
            aud: aud.into(),
            email: Some("aoife@example.ie".into()),
            role: Some("authenticated".into()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let claims = verify_token(&token("s3cret", "authenticated", 600), "s3cret").unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email.as_deref(), Some("aoife@example.ie"));
    }

    #[test]
    fn rejects_bad_signature_audience_and_expiry() {
        assert!(matches!(
            verify_token(&token("other", "authenticated", 600), "s3cret"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            verify_token(&token("s3cret", "anon", 600), "s3cret"),
            Err(AppError::Unauthorized(m)) if m == "Invalid token audience"
        ));
        assert!(matches!(
            verify_token(&token("s3cret", "authenticated", -600), "s3cret"),
            Err(AppError::Unauthorized(m)) if m == "Token expired"
        ));
    }

    #[test]
    fn token_comes_from_header_or_cookie() {
        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc")
            .header(header::COOKIE, format!("{}=xyz", SESSION_COOKIE))
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(session_token(&parts).as_deref(), Some("abc"));

        let (parts, _) = Request::builder()
            .header(header::COOKIE, format!("theme=dark; {}=xyz", SESSION_COOKIE))
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(session_token(&parts).as_deref(), Some("xyz"));

        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert!(session_token(&parts).is_none());
    }
}
