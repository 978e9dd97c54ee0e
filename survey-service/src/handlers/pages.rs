//! Fixed pages and the fallback/panic responses.

use crate::middleware::Caller;
use axum::{
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use service_core::error::AppError;
use std::any::Any;

pub async fn home() -> Html<&'static str> {
    Html(
        "<h1>Welcome to the Shop!</h1> \
         <p>Visit /product/1 to see an item.</p>",
    )
}

/// The shop moved to `/`. Sent as 302 Found.
pub async fn old_shop() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/")])
}

pub async fn dashboard(caller: Caller) -> String {
    format!("Welcome to your dashboard, {}!", caller.user_id)
}

pub async fn admin(caller: Caller) -> Result<&'static str, AppError> {
    caller.require_admin()?;
    Ok("Welcome, Admin.")
}

/// Always fails: exercises the 500 path.
pub async fn crash() -> Result<String, AppError> {
    let total = 10_i64;
    let parts = std::hint::black_box(0_i64);
    let share = total
        .checked_div(parts)
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("attempt to divide by zero")))?;
    Ok(share.to_string())
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No route for {}", uri.path()))
}

/// Response for a handler that panicked.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    AppError::InternalError(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}
