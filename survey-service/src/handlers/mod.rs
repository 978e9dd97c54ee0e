pub mod health;
pub mod pages;
pub mod products;
pub mod survey;

pub use health::{health_check, metrics_endpoint, readiness_check};
