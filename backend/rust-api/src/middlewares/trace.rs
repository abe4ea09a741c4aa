use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

#[derive(Clone, Debug)]
pub struct RequestTraceContext {
    pub trace_id: String,
}

/// Ensures every request/response pair carries a trace identifier so logs
/// and metrics can be correlated across systems.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestTraceContext {
        trace_id: trace_id.clone(),
    });

    let header_name = HeaderName::from_static(TRACE_ID_HEADER);
    if let Ok(header_value) = HeaderValue::from_str(&trace_id) {
        request
            .headers_mut()
            .entry(header_name.clone())
            .or_insert(header_value.clone());

        let mut response = next.run(request).await;
        response
            .headers_mut()
            .entry(header_name)
            .or_insert(header_value);
        return response;
    }

    next.run(request).await
}
