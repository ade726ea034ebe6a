//! Merge policies for run-state fields.
//!
//! Every reducer splits a merge into `check` and `apply`. A commit checks all
//! of its reducers before applying any of them, which makes it atomic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tribunal_common::{AuditError, EvidenceRecord, OpinionRecord};

pub trait Reducer {
    type Update;

    /// Reject the update without touching state
    fn check(&self, update: &Self::Update) -> Result<(), AuditError>;

    /// Land an update that passed `check`
    fn apply(&mut self, update: Self::Update);
}

/// A record that knows its own id and producer
pub trait Produced {
    fn record_id(&self) -> &str;
    fn producer(&self) -> &str;
}

impl Produced for EvidenceRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn producer(&self) -> &str {
        &self.producer_id
    }
}

impl Produced for OpinionRecord {
    fn record_id(&self) -> &str {
        &self.judge_id
    }

    fn producer(&self) -> &str {
        &self.judge_id
    }
}

/// Records one producer submits in one commit
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub producer_id: String,
    pub items: Vec<T>,
}

/// List-like field: append, one submission per producer
#[derive(Debug, Clone)]
pub struct AppendByProducer<T> {
    field: &'static str,
    items: BTreeMap<String, Arc<T>>,
    producers: BTreeSet<String>,
}

impl<T: Produced> AppendByProducer<T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            items: BTreeMap::new(),
            producers: BTreeSet::new(),
        }
    }

    pub fn items(&self) -> &BTreeMap<String, Arc<T>> {
        &self.items
    }

    pub fn has_producer(&self, producer_id: &str) -> bool {
        self.producers.contains(producer_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Produced> Reducer for AppendByProducer<T> {
    type Update = Batch<T>;

    fn check(&self, update: &Batch<T>) -> Result<(), AuditError> {
        if self.producers.contains(&update.producer_id) {
            return Err(AuditError::DuplicateProducer {
                field: self.field.to_string(),
                producer_id: update.producer_id.clone(),
            });
        }

        let mut seen = BTreeSet::new();
        for item in &update.items {
            let id = item.record_id();
            if item.producer() != update.producer_id
                || self.items.contains_key(id)
                || !seen.insert(id)
            {
                return Err(AuditError::StateConflict {
                    field: self.field.to_string(),
                    key: id.to_string(),
                });
            }
        }
        Ok(())
    }

    fn apply(&mut self, update: Batch<T>) {
        self.producers.insert(update.producer_id);
        for item in update.items {
            self.items.insert(item.record_id().to_string(), Arc::new(item));
        }
    }
}

/// Map-like field keyed by producer: the first write wins, a second is a bug
#[derive(Debug, Clone)]
pub struct InsertIfAbsent<V> {
    field: &'static str,
    entries: BTreeMap<String, V>,
}

impl<V> InsertIfAbsent<V> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            entries: BTreeMap::new(),
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, V> {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }
}

impl<V> Reducer for InsertIfAbsent<V> {
    type Update = (String, V);

    fn check(&self, update: &(String, V)) -> Result<(), AuditError> {
        if self.entries.contains_key(&update.0) {
            return Err(AuditError::StateConflict {
                field: self.field.to_string(),
                key: update.0.clone(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, update: (String, V)) {
        self.entries.insert(update.0, update.1);
    }
}
