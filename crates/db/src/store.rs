//! Document capability.
//!
//! A document store holds JSON documents grouped into collections addressed
//! by `/`-separated paths (`posts`, `posts/{id}/likes`). Besides one-shot
//! reads and writes it offers live subscriptions that re-deliver the full
//! current result set of a query whenever the collection changes.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use socialsync_common::{AppError, AppResult};

use crate::subscription::Subscription;

/// A stored document: its ID plus a JSON object body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document ID, unique within its collection.
    pub id: String,
    /// JSON object body.
    pub data: Value,
}

impl Document {
    /// Create a document from a serializable value.
    pub fn from_model<T: Serialize>(id: impl Into<String>, model: &T) -> AppResult<Self> {
        Ok(Self {
            id: id.into(),
            data: serde_json::to_value(model)?,
        })
    }

    /// Decode the body into a typed model.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        T::deserialize(&self.data).map_err(|e| {
            AppError::RemoteRead(format!("Malformed document {}: {e}", self.id))
        })
    }

    /// Read one top-level field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// A predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value.
    Eq { field: String, value: Value },
    /// Field equals one of the values.
    In { field: String, values: Vec<Value> },
}

impl Filter {
    fn matches(&self, data: &Value) -> bool {
        match self {
            Self::Eq { field, value } => data.get(field) == Some(value),
            Self::In { field, values } => data
                .get(field)
                .is_some_and(|actual| values.iter().any(|v| v == actual)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Ordering on a top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Filters, ordering and limit applied to one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    /// An unfiltered, unordered query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep documents whose `field` equals `value`.
    #[must_use]
    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Keep documents whose `field` is one of `values`.
    #[must_use]
    pub fn filter_in<V: Into<Value>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Order by `field`, ascending.
    #[must_use]
    pub fn order_by_asc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction: Direction::Asc,
        });
        self
    }

    /// Order by `field`, descending.
    #[must_use]
    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction: Direction::Desc,
        });
        self
    }

    /// Return at most `limit` documents.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document body passes every filter.
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }

    /// Evaluate the query over documents given in insertion order.
    ///
    /// Sorting is stable: documents with equal sort keys keep insertion order.
    #[must_use]
    pub fn evaluate<'a>(&self, docs: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut result: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.matches(&doc.data))
            .cloned()
            .collect();

        if let Some(order) = &self.order_by {
            result.sort_by(|a, b| {
                let ord = compare_values(a.field(&order.field), b.field(&order.field));
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            result.truncate(limit);
        }

        result
    }
}

/// Compare two optional field values.
///
/// Missing and null sort first. RFC 3339 timestamps compare chronologically,
/// numbers numerically, other strings lexically.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Listener for query subscriptions.
pub type QueryListener = Arc<dyn Fn(AppResult<Vec<Document>>) + Send + Sync>;

/// Listener for single-document subscriptions.
pub type DocumentListener = Arc<dyn Fn(AppResult<Option<Document>>) + Send + Sync>;

/// Document store operations consumed by the client.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a one-shot query.
    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>>;

    /// Fetch one document.
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>>;

    /// Create a document; fails with `Conflict` if the ID is taken.
    async fn create(&self, collection: &str, id: &str, data: Value) -> AppResult<()>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, id: &str, data: Value) -> AppResult<()>;

    /// Merge top-level fields into an existing document.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<()>;

    /// Atomically append `values` to the array field `field`.
    ///
    /// A missing or non-array field becomes a new array. Values already
    /// present are appended again. Fails with `NotFound` when the document
    /// does not exist.
    async fn array_append(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> AppResult<()>;

    /// Delete a document if it exists.
    async fn delete(&self, collection: &str, id: &str) -> AppResult<()>;

    /// Register a live query.
    ///
    /// The listener receives the current result set right away and the full
    /// result set again after every change to the collection.
    fn subscribe(&self, collection: &str, query: Query, listener: QueryListener) -> Subscription;

    /// Register a live single-document read.
    fn subscribe_doc(&self, collection: &str, id: &str, listener: DocumentListener)
    -> Subscription;

    /// The store's clock, used for creation timestamps.
    fn server_time(&self) -> DateTime<Utc>;
}

/// Shared document store handle.
pub type DocumentStoreService = Arc<dyn DocumentStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        Document {
            id: id.to_string(),
            data,
        }
    }

    #[test]
    fn test_filter_in() {
        let docs = [
            doc("a", json!({"uid": "u1"})),
            doc("b", json!({"uid": "u2"})),
            doc("c", json!({"uid": "u3"})),
        ];
        let result = Query::new().filter_in("uid", ["u1", "u3"]).evaluate(&docs);
        let ids: Vec<_> = result.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[test]
    fn test_order_desc_by_timestamp_with_mixed_precision() {
        let docs = [
            doc("late", json!({"createdAt": "2024-01-01T00:00:00.5Z"})),
            doc("early", json!({"createdAt": "2024-01-01T00:00:00.123456789Z"})),
            doc("mid", json!({"createdAt": "2024-01-01T00:00:00.25Z"})),
        ];
        let result = Query::new().order_by_desc("createdAt").evaluate(&docs);
        let ids: Vec<_> = result.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["late", "mid", "early"]);
    }

    #[test]
    fn test_equal_keys_keep_insertion_order() {
        let docs = [
            doc("first", json!({"n": 1})),
            doc("second", json!({"n": 1})),
            doc("third", json!({"n": 2})),
        ];
        let result = Query::new().order_by_desc("n").evaluate(&docs);
        let ids: Vec<_> = result.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["third", "first", "second"]);
    }

    #[test]
    fn test_limit() {
        let docs = [doc("a", json!({})), doc("b", json!({}))];
        assert_eq!(Query::new().limit(1).evaluate(&docs).len(), 1);
    }

    #[test]
    fn test_decode_malformed_is_read_error() {
        #[derive(serde::Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            name: String,
        }
        let result = doc("x", json!({"other": 1})).decode::<Needs>();
        assert!(matches!(result, Err(AppError::RemoteRead(_))));
    }
}
