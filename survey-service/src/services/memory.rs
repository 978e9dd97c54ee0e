//! Process-local [`DocumentStore`] used by tests and `SURVEY_STORE=memory` runs.
//!
//! Filters support field equality (numbers compare across integer/double
//! types), dotted paths and the comparison operators `$eq`, `$ne`, `$gt`,
//! `$gte`, `$lt`, `$lte`, `$in`. Projections are top-level only.

use super::store::{validate_update, DocumentStore, StoreError, UpdateOutcome};
use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    closed: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn open_collections(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<Document>>>, StoreError> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("connection is closed".to_string()));
        }
        self.collections
            .lock()
            .map_err(|e| StoreError::OperationFailed(format!("store mutex poisoned: {}", e)))
    }

    fn insert_into(collection: &mut Vec<Document>, document: Document) -> Result<Bson, StoreError> {
        let document = if document.contains_key("_id") {
            document
        } else {
            let mut with_id = doc! { "_id": ObjectId::new() };
            for (key, value) in document {
                with_id.insert(key, value);
            }
            with_id
        };
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);

        if collection
            .iter()
            .any(|existing| existing.get("_id").is_some_and(|e| values_equal(e, &id)))
        {
            return Err(StoreError::OperationFailed(format!(
                "duplicate key: _id {}",
                id
            )));
        }

        collection.push(document);
        Ok(id)
    }

    fn update(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        multi: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        validate_update(update)?;

        let mut collections = self.open_collections()?;
        let mut outcome = UpdateOutcome::default();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(outcome);
        };

        for document in documents.iter_mut() {
            if !matches_filter(document, filter)? {
                continue;
            }
            outcome.matched_count += 1;

            let mut updated = document.clone();
            apply_update(&mut updated, update)?;
            if updated != *document {
                *document = updated;
                outcome.modified_count += 1;
            }

            if !multi {
                break;
            }
        }

        Ok(outcome)
    }

    fn delete(&self, collection: &str, filter: &Document, multi: bool) -> Result<u64, StoreError> {
        let mut collections = self.open_collections()?;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut deleted = 0;
        let mut index = 0;
        while index < documents.len() {
            if matches_filter(&documents[index], filter)? {
                documents.remove(index);
                deleted += 1;
                if !multi {
                    break;
                }
            } else {
                index += 1;
            }
        }

        Ok(deleted)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        let mut collections = self.open_collections()?;
        let documents = collections.entry(collection.to_string()).or_default();
        Self::insert_into(documents, document)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Bson>, StoreError> {
        let mut collections = self.open_collections()?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let target = collections.entry(collection.to_string()).or_default();
        documents
            .into_iter()
            .map(|document| Self::insert_into(target, document))
            .collect()
    }

    async fn find(
        &self,
        collection: &str,
        filter: Option<Document>,
        projection: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.open_collections()?;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let filter = filter.unwrap_or_default();
        let mut found = Vec::new();
        for document in documents {
            if matches_filter(document, &filter)? {
                found.push(match &projection {
                    Some(projection) => project(document, projection),
                    None => document.clone(),
                });
            }
        }
        Ok(found)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.open_collections()?;
        let Some(documents) = collections.get(collection) else {
            return Ok(None);
        };

        for document in documents {
            if matches_filter(document, &filter)? {
                return Ok(Some(document.clone()));
            }
        }
        Ok(None)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        self.update(collection, &filter, &update, false)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        self.update(collection, &filter, &update, true)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64, StoreError> {
        self.delete(collection, &filter, false)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, StoreError> {
        self.delete(collection, &filter, true)
    }

    async fn close(&self) {
        if !self.closed.swap(true, AtomicOrdering::SeqCst) {
            tracing::info!("In-memory store closed");
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.open_collections().map(|_| ())
    }
}

fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn is_operator_document(value: &Bson) -> Option<&Document> {
    match value {
        Bson::Document(inner) if inner.keys().next().is_some_and(|k| k.starts_with('$')) => {
            Some(inner)
        }
        _ => None,
    }
}

fn matches_filter(document: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (path, condition) in filter {
        if path.starts_with('$') {
            return Err(StoreError::OperationFailed(format!(
                "unsupported query operator '{}'",
                path
            )));
        }
        let actual = get_path(document, path);

        let matched = match is_operator_document(condition) {
            Some(operators) => matches_operators(actual, operators)?,
            None => match actual {
                Some(value) => values_equal(value, condition),
                None => matches!(condition, Bson::Null),
            },
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_operators(actual: Option<&Bson>, operators: &Document) -> Result<bool, StoreError> {
    for (operator, operand) in operators {
        let ordering = actual.and_then(|value| compare_values(value, operand));
        let matched = match operator.as_str() {
            "$eq" => actual.is_some_and(|value| values_equal(value, operand)),
            "$ne" => !actual.is_some_and(|value| values_equal(value, operand)),
            "$gt" => ordering == Some(Ordering::Greater),
            "$gte" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            "$lt" => ordering == Some(Ordering::Less),
            "$lte" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            "$in" => match operand {
                Bson::Array(candidates) => actual.is_some_and(|value| {
                    candidates.iter().any(|candidate| values_equal(value, candidate))
                }),
                _ => {
                    return Err(StoreError::OperationFailed(
                        "$in needs an array".to_string(),
                    ))
                }
            },
            other => {
                return Err(StoreError::OperationFailed(format!(
                    "unsupported query operator '{}'",
                    other
                )))
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        other => as_number(other).map_or(true, |n| n != 0.0),
    }
}

fn project(document: &Document, projection: &Document) -> Document {
    let include_id = projection.get("_id").map_or(true, is_truthy);
    let inclusive = projection
        .iter()
        .any(|(key, value)| key != "_id" && is_truthy(value));

    document
        .iter()
        .filter(|(key, _)| {
            if key.as_str() == "_id" {
                return include_id;
            }
            match projection.get(key.as_str()) {
                Some(value) => is_truthy(value),
                None => !inclusive,
            }
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<(), StoreError> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(StoreError::OperationFailed(format!(
                    "cannot create field '{}' inside a non-document value",
                    rest
                ))),
            }
        }
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Ok(inner) = document.get_document_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn increment(current: Option<&Bson>, delta: &Bson) -> Result<Bson, StoreError> {
    let non_numeric = || StoreError::OperationFailed("cannot apply $inc to a non-numeric value".to_string());
    let current = current.cloned().unwrap_or(Bson::Int32(0));

    match (&current, delta) {
        (Bson::Int32(a), Bson::Int32(b)) => Ok(a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)))),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            let a = as_number_i64(&current).ok_or_else(non_numeric)?;
            let b = as_number_i64(delta).ok_or_else(non_numeric)?;
            a.checked_add(b)
                .map(Bson::Int64)
                .ok_or_else(|| StoreError::OperationFailed("$inc overflowed".to_string()))
        }
        _ => {
            let a = as_number(&current).ok_or_else(non_numeric)?;
            let b = as_number(delta).ok_or_else(non_numeric)?;
            Ok(Bson::Double(a + b))
        }
    }
}

fn as_number_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

fn apply_update(document: &mut Document, update: &Document) -> Result<(), StoreError> {
    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            continue;
        };
        for (path, value) in fields {
            match operator.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$unset" => remove_path(document, path),
                "$inc" => {
                    let next = increment(get_path(document, path), value)?;
                    set_path(document, path, next)?;
                }
                _ => {}
            }
        }
    }
    Ok(())
}
