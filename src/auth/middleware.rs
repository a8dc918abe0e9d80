use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::AUTHORIZATION,
    middleware::Next,
    web::Data,
};
use tracing::debug;

use crate::{auth::auth::AuthUser, auth::jwt::bearer_token, config::Config, error::ApiError};

/// Rejects requests without a valid access token and stashes the caller in
/// the request extensions for the `AuthUser` extractor.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get(AUTHORIZATION) {
        Some(h) => match h.to_str() {
            Ok(v) => v,
            Err(_) => {
                let err = ApiError::Unauthorized("Invalid Authorization header encoding".into());
                return Ok(req.into_response(err.error_response()));
            }
        },
        None => {
            let err = ApiError::Unauthorized("Missing Authorization header".into());
            return Ok(req.into_response(err.error_response()));
        }
    };

    let token = match bearer_token(header_value) {
        Some(t) => t,
        None => {
            let err =
                ApiError::Unauthorized("Authorization header must start with Bearer".into());
            return Ok(req.into_response(err.error_response()));
        }
    };

    let auth_user = match AuthUser::from_access_token(token, &config.jwt_secret) {
        Ok(user) => user,
        Err(err) => {
            debug!(path = %req.path(), "Rejected token");
            return Ok(req.into_response(err.error_response()));
        }
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
