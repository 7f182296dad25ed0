use actix_web::{dev::Payload, http::header::HeaderValue, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use crate::error::AppError;
use crate::routes::AppState;

/// Identity proven by the bearer token of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub name: String,
}

fn bearer_token(request: &HttpRequest) -> Option<&str> {
    request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)?
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn authenticate(request: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let state = request
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("application state is not registered".into()))?;
    let token = bearer_token(request).ok_or(AppError::MissingToken)?;
    let claims = state.tokens.verify(token)?;
    Ok(AuthenticatedUser {
        user_id: claims.user_id,
        name: claims.name,
    })
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = authenticate(request);
        if let Err(err) = &result {
            tracing::debug!(path = request.path(), error = %err, "request rejected");
        }
        ready(result)
    }
}
