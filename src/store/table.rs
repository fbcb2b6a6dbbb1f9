use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

struct Row<T> {
    seq: u64,
    value: T,
}

/// Id-keyed collection that remembers insertion order.
///
/// Replacing a row keeps its original position.
pub(crate) struct Table<T> {
    rows: HashMap<Uuid, Row<T>>,
    order: BTreeMap<u64, Uuid>,
    next_seq: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> Table<T> {
    pub fn get(&self, id: &Uuid) -> Option<&T> {
        self.rows.get(id).map(|row| &row.value)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.rows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Insert or replace. New rows go to the end of the insertion order.
    pub fn upsert(&mut self, id: Uuid, value: T) {
        if let Some(row) = self.rows.get_mut(&id) {
            row.value = value;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, id);
        self.rows.insert(id, Row { seq, value });
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<T> {
        let row = self.rows.remove(id)?;
        self.order.remove(&row.seq);
        Some(row.value)
    }

    /// Rows in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.order
            .values()
            .filter_map(|id| self.rows.get(id).map(|row| &row.value))
    }
}
