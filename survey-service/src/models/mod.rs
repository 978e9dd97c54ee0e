pub mod product;
pub mod survey;

pub use product::Product;

use mongodb::bson::Bson;

/// Collection holding survey responses keyed by `user_id`.
pub const RAW_DATA_COLLECTION: &str = "raw_data";
pub const PRODUCTS_COLLECTION: &str = "products";

/// Render a store-assigned id for JSON responses.
pub fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}
