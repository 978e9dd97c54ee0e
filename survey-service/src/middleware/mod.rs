pub mod identity;
pub mod json;

pub use identity::{Caller, ROLE_HEADER, USER_ID_HEADER};
pub use json::ApiJson;
