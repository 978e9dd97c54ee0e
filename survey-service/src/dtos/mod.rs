use crate::models::Product;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "name must not be empty"))]
    pub name: String,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,
}

impl CreateProductRequest {
    /// Trim the name so whitespace-only names fail the length check.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            ..self
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price: f64,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct BulkCreatedResponse {
    pub message: String,
    pub count: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ProductResponse>,
}

#[derive(Debug, Serialize)]
pub struct SurveyUsersResponse {
    pub count: usize,
    pub users: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub deleted_count: u64,
}
