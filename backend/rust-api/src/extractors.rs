use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::Validate;

/// Custom JSON extractor that returns JSON error responses instead of HTML
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!("Failed to parse JSON request body: {}", rejection);
                tracing::warn!("{}", message);
                Err(json_error(StatusCode::BAD_REQUEST, message))
            }
        }
    }
}

/// JSON extractor that also runs the payload's `validator` rules.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: serde::de::DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let AppJson(value) = AppJson::<T>::from_request(req, state).await?;
        if let Err(errors) = value.validate() {
            let message = format!("Request validation failed: {}", errors);
            tracing::warn!("{}", message);
            return Err(json_error(StatusCode::BAD_REQUEST, message));
        }
        Ok(ValidatedJson(value))
    }
}

fn json_error(status: StatusCode, message: String) -> Response {
    let body = json!({
        "message": message,
        "status": status.as_u16(),
    });
    (status, Json(body)).into_response()
}
