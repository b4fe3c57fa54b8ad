//! In-process document store with live subscriptions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use socialsync_common::{AppError, AppResult};
use tracing::debug;

use crate::store::{Document, DocumentListener, DocumentStore, Query, QueryListener};
use crate::subscription::Subscription;

/// Per-watch delivery slot.
///
/// Snapshots carry the store version they were computed at. Only one caller
/// drains a slot at a time and a snapshot older than one already accepted is
/// dropped, so the listener always ends on the newest result set even when
/// writes on different threads finish out of order.
struct Mailbox<T> {
    listener: Arc<dyn Fn(AppResult<T>) + Send + Sync>,
    slot: Mutex<Slot<T>>,
}

struct Slot<T> {
    newest: u64,
    pending: Option<AppResult<T>>,
    draining: bool,
}

impl<T> Mailbox<T> {
    fn new(listener: Arc<dyn Fn(AppResult<T>) + Send + Sync>) -> Arc<Self> {
        Arc::new(Self {
            listener,
            slot: Mutex::new(Slot {
                newest: 0,
                pending: None,
                draining: false,
            }),
        })
    }

    fn slot(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn offer(&self, version: u64, result: AppResult<T>) {
        {
            let mut slot = self.slot();
            if version <= slot.newest {
                return;
            }
            slot.newest = version;
            slot.pending = Some(result);
            if slot.draining {
                // The caller already draining picks it up.
                return;
            }
            slot.draining = true;
        }

        loop {
            let next = {
                let mut slot = self.slot();
                match slot.pending.take() {
                    Some(next) => next,
                    None => {
                        slot.draining = false;
                        return;
                    }
                }
            };
            (self.listener)(next);
        }
    }
}

struct QueryWatch {
    collection: String,
    query: Query,
    mailbox: Arc<Mailbox<Vec<Document>>>,
}

struct DocumentWatch {
    collection: String,
    id: String,
    mailbox: Arc<Mailbox<Option<Document>>>,
}

#[derive(Default)]
struct Inner {
    /// Documents per collection, in insertion order.
    collections: HashMap<String, Vec<Document>>,
    query_watches: HashMap<u64, QueryWatch>,
    document_watches: HashMap<u64, DocumentWatch>,
    next_watch_id: u64,
    /// Bumped on every change and registration; orders snapshots.
    version: u64,
    last_time: Option<DateTime<Utc>>,
    fail_reads: Option<String>,
    fail_writes: Option<String>,
}

/// A pending listener call, computed under the lock and run after it is released.
enum Delivery {
    Query(Arc<Mailbox<Vec<Document>>>, u64, AppResult<Vec<Document>>),
    Document(Arc<Mailbox<Option<Document>>>, u64, AppResult<Option<Document>>),
}

impl Delivery {
    fn run(self) {
        match self {
            Self::Query(mailbox, version, result) => mailbox.offer(version, result),
            Self::Document(mailbox, version, result) => mailbox.offer(version, result),
        }
    }
}

impl Inner {
    fn docs(&self, collection: &str) -> &[Document] {
        self.collections.get(collection).map_or(&[], Vec::as_slice)
    }

    fn find(&self, collection: &str, id: &str) -> Option<&Document> {
        self.docs(collection).iter().find(|d| d.id == id)
    }

    fn read_guard(&self) -> AppResult<()> {
        match &self.fail_reads {
            Some(reason) => Err(AppError::RemoteRead(reason.clone())),
            None => Ok(()),
        }
    }

    fn write_guard(&self) -> AppResult<()> {
        match &self.fail_writes {
            Some(reason) => Err(AppError::RemoteWrite(reason.clone())),
            None => Ok(()),
        }
    }

    fn query_result(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>> {
        self.read_guard()?;
        Ok(query.evaluate(self.docs(collection)))
    }

    fn document_result(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        self.read_guard()?;
        Ok(self.find(collection, id).cloned())
    }

    /// Listener calls owed after `collection` changed.
    fn deliveries_for(&mut self, collection: &str, id: &str) -> Vec<Delivery> {
        self.version += 1;
        let version = self.version;
        let queries = self
            .query_watches
            .values()
            .filter(|w| w.collection == collection)
            .map(|w| {
                Delivery::Query(
                    w.mailbox.clone(),
                    version,
                    self.query_result(collection, &w.query),
                )
            });
        let documents = self
            .document_watches
            .values()
            .filter(|w| w.collection == collection && w.id == id)
            .map(|w| {
                Delivery::Document(
                    w.mailbox.clone(),
                    version,
                    self.document_result(collection, id),
                )
            });
        queries.chain(documents).collect()
    }
}

/// Document store kept in process memory.
///
/// Listeners are never invoked while the store lock is held, so a listener
/// may itself subscribe, dispose, read or write. Each listener sees its
/// result sets one at a time and in store order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live registrations (queries and documents).
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        let inner = self.lock();
        inner.query_watches.len() + inner.document_watches.len()
    }

    /// Make every read (and subscription delivery) fail with `reason`.
    pub fn fail_reads(&self, reason: Option<&str>) {
        self.lock().fail_reads = reason.map(ToString::to_string);
    }

    /// Make every write fail with `reason`.
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.lock().fail_writes = reason.map(ToString::to_string);
    }

    /// Apply a mutation and notify affected listeners.
    fn mutate(
        &self,
        collection: &str,
        id: &str,
        op: impl FnOnce(&mut Vec<Document>) -> AppResult<bool>,
    ) -> AppResult<()> {
        let deliveries = {
            let mut inner = self.lock();
            inner.write_guard()?;
            let docs = inner.collections.entry(collection.to_string()).or_default();
            if !op(docs)? {
                return Ok(());
            }
            inner.deliveries_for(collection, id)
        };

        debug!(collection, id, listeners = deliveries.len(), "Document changed");
        for delivery in deliveries {
            delivery.run();
        }
        Ok(())
    }

    fn unwatch(inner: &Weak<Mutex<Inner>>, watch_id: u64) {
        if let Some(inner) = inner.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.query_watches.remove(&watch_id);
            inner.document_watches.remove(&watch_id);
        }
    }
}

fn ensure_object(data: &Value) -> AppResult<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(AppError::RemoteWrite(
            "Document body must be a JSON object".to_string(),
        ))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>> {
        self.lock().query_result(collection, query)
    }

    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        self.lock().document_result(collection, id)
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> AppResult<()> {
        ensure_object(&data)?;
        self.mutate(collection, id, |docs| {
            if docs.iter().any(|d| d.id == id) {
                return Err(AppError::Conflict(format!("{collection}/{id}")));
            }
            docs.push(Document {
                id: id.to_string(),
                data,
            });
            Ok(true)
        })
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> AppResult<()> {
        ensure_object(&data)?;
        self.mutate(collection, id, |docs| {
            match docs.iter_mut().find(|d| d.id == id) {
                Some(existing) => existing.data = data,
                None => docs.push(Document {
                    id: id.to_string(),
                    data,
                }),
            }
            Ok(true)
        })
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<()> {
        let Value::Object(fields) = patch else {
            return Err(AppError::RemoteWrite(
                "Update patch must be a JSON object".to_string(),
            ));
        };
        self.mutate(collection, id, |docs| {
            let existing = docs
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;
            if let Value::Object(body) = &mut existing.data {
                body.extend(fields);
            }
            Ok(true)
        })
    }

    async fn array_append(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> AppResult<()> {
        self.mutate(collection, id, |docs| {
            let existing = docs
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;
            if let Value::Object(body) = &mut existing.data {
                let array = body
                    .entry(field)
                    .or_insert_with(|| Value::Array(Vec::new()));
                match array {
                    Value::Array(items) => items.extend(values),
                    other => *other = Value::Array(values),
                }
            }
            Ok(true)
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        self.mutate(collection, id, |docs| {
            let before = docs.len();
            docs.retain(|d| d.id != id);
            Ok(docs.len() != before)
        })
    }

    fn subscribe(&self, collection: &str, query: Query, listener: QueryListener) -> Subscription {
        let mailbox = Mailbox::new(listener);
        let (watch_id, version, initial) = {
            let mut inner = self.lock();
            let watch_id = inner.next_watch_id;
            inner.next_watch_id += 1;
            inner.version += 1;
            let initial = inner.query_result(collection, &query);
            inner.query_watches.insert(
                watch_id,
                QueryWatch {
                    collection: collection.to_string(),
                    query,
                    mailbox: mailbox.clone(),
                },
            );
            (watch_id, inner.version, initial)
        };

        debug!(collection, watch_id, "Registered live query");
        mailbox.offer(version, initial);

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(format!("query {collection}#{watch_id}"), move || {
            Self::unwatch(&inner, watch_id);
        })
    }

    fn subscribe_doc(
        &self,
        collection: &str,
        id: &str,
        listener: DocumentListener,
    ) -> Subscription {
        let mailbox = Mailbox::new(listener);
        let (watch_id, version, initial) = {
            let mut inner = self.lock();
            let watch_id = inner.next_watch_id;
            inner.next_watch_id += 1;
            inner.version += 1;
            let initial = inner.document_result(collection, id);
            inner.document_watches.insert(
                watch_id,
                DocumentWatch {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    mailbox: mailbox.clone(),
                },
            );
            (watch_id, inner.version, initial)
        };

        debug!(collection, id, watch_id, "Registered live document");
        mailbox.offer(version, initial);

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(format!("document {collection}/{id}#{watch_id}"), move || {
            Self::unwatch(&inner, watch_id);
        })
    }

    fn server_time(&self) -> DateTime<Utc> {
        let mut inner = self.lock();
        let mut now = Utc::now();
        if let Some(last) = inner.last_time
            && now <= last
        {
            now = last + Duration::microseconds(1);
        }
        inner.last_time = Some(now);
        now
    }
}
