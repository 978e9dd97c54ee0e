//! Survey records: free-form JSON objects whose only required field is an
//! integer `user_id`. No other schema is enforced.

use mongodb::bson::{self, Bson, Document};
use serde_json::{Map, Value};
use service_core::error::AppError;

pub const USER_ID_FIELD: &str = "user_id";

pub fn user_id_filter(user_id: i64) -> Document {
    let mut filter = Document::new();
    filter.insert(USER_ID_FIELD, user_id);
    filter
}

/// Validate a request body and convert it to a storable document.
pub fn record_from_json(value: Value) -> Result<Document, AppError> {
    let Value::Object(fields) = value else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Survey record must be a JSON object"
        )));
    };

    match fields.get(USER_ID_FIELD) {
        None | Some(Value::Null) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Missing required field '{}'",
                USER_ID_FIELD
            )))
        }
        Some(id) if id.as_i64().is_none() => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "'{}' must be an integer",
                USER_ID_FIELD
            )))
        }
        Some(_) => {}
    }

    fields_to_document(&fields)
}

/// Convert the body of an update request for `user_id` into the fields for
/// `$set`. `_id` is immutable, and `user_id` may only repeat the path value.
pub fn fields_from_json(user_id: i64, value: Value) -> Result<Document, AppError> {
    let fields = match value {
        Value::Object(fields) if !fields.is_empty() => fields,
        Value::Object(_) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Update body must contain at least one field"
            )))
        }
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Update body must be a JSON object"
            )))
        }
    };

    if fields.contains_key("_id") {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "'_id' cannot be updated"
        )));
    }
    if let Some(id) = fields.get(USER_ID_FIELD) {
        if id.as_i64() != Some(user_id) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "'{}' cannot be changed by an update",
                USER_ID_FIELD
            )));
        }
    }

    fields_to_document(&fields)
}

fn fields_to_document(fields: &Map<String, Value>) -> Result<Document, AppError> {
    bson::to_document(fields)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Unsupported field value: {}", e)))
}

/// Render a stored record for clients, without the store's `_id`.
pub fn record_to_json(mut document: Document) -> Value {
    document.remove("_id");
    Bson::Document(document).into_relaxed_extjson()
}

pub fn parse_user_id(raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| {
        AppError::BadRequest(anyhow::anyhow!(
            "User id must be an integer, got '{}'",
            raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use serde_json::json;

    #[test]
    fn record_requires_integer_user_id() {
        assert!(record_from_json(json!({ "user_id": 42, "age": 30 })).is_ok());
        assert!(matches!(
            record_from_json(json!({ "age": 30 })),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            record_from_json(json!({ "user_id": "42" })),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            record_from_json(json!([1, 2])),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn record_to_json_drops_store_id() {
        let document = doc! {
            "_id": bson::oid::ObjectId::new(),
            "user_id": 42_i64,
            "platforms": ["Instagram", "YouTube"],
        };

        assert_eq!(
            record_to_json(document),
            json!({ "user_id": 42, "platforms": ["Instagram", "YouTube"] })
        );
    }

    #[test]
    fn update_fields_must_be_non_empty_object() {
        assert!(fields_from_json(5, json!({ "age": 31 })).is_ok());
        assert!(fields_from_json(5, json!({})).is_err());
        assert!(fields_from_json(5, json!("{\"age\": 31}")).is_err());
    }

    #[test]
    fn update_fields_cannot_move_record_keys() {
        assert!(matches!(
            fields_from_json(5, json!({ "_id": "other" })),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            fields_from_json(5, json!({ "user_id": "x" })),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            fields_from_json(5, json!({ "user_id": 6 })),
            Err(AppError::BadRequest(_))
        ));
        assert!(fields_from_json(5, json!({ "user_id": 5, "age": 31 })).is_ok());
    }

    #[test]
    fn user_id_path_must_be_numeric() {
        assert_eq!(parse_user_id("42").unwrap(), 42);
        assert!(parse_user_id("abc").is_err());
    }
}
