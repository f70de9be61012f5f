//! Transport-boundary error mapping (spec §7): the only place that reads
//! [`sa_domain::error::Error::status`]. Every handler returns
//! `Result<T, ApiError>` and lets `?` do the conversion.

use axum::response::{IntoResponse, Response};
use axum::Json;

use sa_domain::error::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = axum::http::StatusCode::from_u16(self.0.status()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.envelope())).into_response()
    }
}
