use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: f64,
}

impl Product {
    pub fn new(name: String, price: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            price,
        }
    }

    /// Items inserted into an empty catalog at startup.
    pub fn starter_catalog() -> Vec<Product> {
        vec![
            Product {
                id: "1".to_string(),
                name: "Laptop".to_string(),
                price: 1000.0,
            },
            Product {
                id: "2".to_string(),
                name: "Phone".to_string(),
                price: 500.0,
            },
        ]
    }

    pub fn to_document(&self) -> Result<Document, AppError> {
        bson::to_document(self).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize product: {}", e))
        })
    }

    pub fn from_document(document: Document) -> Result<Self, AppError> {
        bson::from_document(document).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Stored product is malformed: {}", e))
        })
    }
}
