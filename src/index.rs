//! Per-column value indices.
//!
//! Grounded on the teacher's `ConcurrentStatus`: a handful of maps
//! guarded by a single mutex, because index mutation here is short and
//! touches several maps at once — the same rationale the teacher gives
//! for not fine-graining its lock table.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::record::Rid;

/// One column's `value -> [base rid]` map. `BTreeMap` gives ordered
/// iteration for free, which `locate_range` relies on.
type ColumnMap = BTreeMap<i64, Vec<Rid>>;

pub struct ColumnIndex {
    key_col: usize,
    maps: Mutex<Vec<Option<ColumnMap>>>,
}

impl ColumnIndex {
    pub fn new(num_user_columns: usize, key_col: usize) -> Self {
        ColumnIndex {
            key_col,
            maps: Mutex::new(vec![None; num_user_columns]),
        }
    }

    pub fn is_indexed(&self, col: usize) -> bool {
        self.maps.lock().unwrap()[col].is_some()
    }

    pub fn key_is_indexed(&self) -> bool {
        self.is_indexed(self.key_col)
    }

    /// Build the index for `col` from a full scan supplied by the
    /// caller as `(rid, value)` pairs — the table owns the page walk,
    /// the index only owns the resulting map.
    pub fn create_index(&self, col: usize, entries: impl Iterator<Item = (Rid, i64)>) {
        let mut map = ColumnMap::new();
        for (rid, value) in entries {
            map.entry(value).or_insert_with(Vec::new).push(rid);
        }
        self.maps.lock().unwrap()[col] = Some(map);
    }

    pub fn drop_index(&self, col: usize) {
        self.maps.lock().unwrap()[col] = None;
    }

    pub fn locate(&self, col: usize, value: i64) -> Vec<Rid> {
        self.maps.lock().unwrap()[col]
            .as_ref()
            .and_then(|m| m.get(&value))
            .cloned()
            .unwrap_or_default()
    }

    pub fn locate_range(&self, col: usize, lo: i64, hi: i64) -> Vec<Rid> {
        match self.maps.lock().unwrap()[col].as_ref() {
            Some(map) => map.range(lo..=hi).flat_map(|(_, rids)| rids.clone()).collect(),
            None => Vec::new(),
        }
    }

    pub fn add(&self, col: usize, value: i64, rid: Rid) {
        let mut guard = self.maps.lock().unwrap();
        if let Some(map) = guard[col].as_mut() {
            map.entry(value).or_insert_with(Vec::new).push(rid);
        }
    }

    fn remove_one(map: &mut ColumnMap, value: i64, rid: Rid) {
        if let Some(rids) = map.get_mut(&value) {
            rids.retain(|r| *r != rid);
            if rids.is_empty() {
                map.remove(&value);
            }
        }
    }

    /// No-op unless both `col` and the primary-key column are indexed —
    /// the primary-key index is the gating prerequisite for any other
    /// column's index to stay maintained. Preserved from the source
    /// verbatim; see DESIGN.md for the discussion of whether this is
    /// intentional.
    pub fn update_index(&self, col: usize, old: i64, new: i64, rid: Rid) {
        let mut guard = self.maps.lock().unwrap();
        if guard[self.key_col].is_none() {
            return;
        }
        if let Some(map) = guard[col].as_mut() {
            Self::remove_one(map, old, rid);
            map.entry(new).or_insert_with(Vec::new).push(rid);
        }
    }

    /// Remove `rid` from every currently-indexed column, given that
    /// column's latest value (caller supplies the full latest value
    /// vector, keyed by user-column index).
    pub fn delete_index(&self, latest_values: &[i64], rid: Rid) {
        let mut guard = self.maps.lock().unwrap();
        for (col, map) in guard.iter_mut().enumerate() {
            if let Some(map) = map.as_mut() {
                Self::remove_one(map, latest_values[col], rid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_and_locate_range() {
        let idx = ColumnIndex::new(2, 0);
        idx.create_index(0, vec![(1, 10), (2, 20), (3, 30)].into_iter());

        assert_eq!(idx.locate(0, 20), vec![2]);
        let mut range = idx.locate_range(0, 10, 25);
        range.sort();
        assert_eq!(range, vec![1, 2]);
    }

    #[test]
    fn update_index_is_noop_without_primary_key_index() {
        let idx = ColumnIndex::new(2, 0);
        idx.create_index(1, vec![(1, 100)].into_iter());
        idx.update_index(1, 100, 200, 1);
        assert_eq!(idx.locate(1, 100), vec![1]);
        assert_eq!(idx.locate(1, 200), Vec::<Rid>::new());
    }

    #[test]
    fn update_index_moves_rid_when_key_indexed() {
        let idx = ColumnIndex::new(2, 0);
        idx.create_index(0, vec![(1, 10)].into_iter());
        idx.create_index(1, vec![(1, 100)].into_iter());
        idx.update_index(1, 100, 200, 1);
        assert_eq!(idx.locate(1, 200), vec![1]);
        assert!(idx.locate(1, 100).is_empty());
    }

    #[test]
    fn delete_index_removes_from_every_indexed_column() {
        let idx = ColumnIndex::new(2, 0);
        idx.create_index(0, vec![(1, 10)].into_iter());
        idx.create_index(1, vec![(1, 100)].into_iter());
        idx.delete_index(&[10, 100], 1);
        assert!(idx.locate(0, 10).is_empty());
        assert!(idx.locate(1, 100).is_empty());
    }
}
