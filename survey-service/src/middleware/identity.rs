use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const ROLE_HEADER: &str = "X-User-Role";

const ADMIN_ROLE: &str = "admin";

/// Authenticated caller, taken from the `X-User-ID` / `X-User-Role` headers
/// set by the fronting gateway.
///
/// A request without a user id is rejected with 401. The role defaults to
/// `user` when the header is absent.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: String,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case(ADMIN_ROLE)
    }

    /// 403 unless the caller holds the admin role.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id, role = %self.role, "Admin access denied");
            Err(AppError::Forbidden(anyhow::anyhow!(
                "You do not have permission to access this page"
            )))
        }
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER).ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("You must login to view this page"))
        })?;
        let role = header_value(parts, ROLE_HEADER).unwrap_or("user");

        tracing::Span::current().record("user_id", user_id);

        Ok(Caller {
            user_id: user_id.to_string(),
            role: role.to_string(),
        })
    }
}
