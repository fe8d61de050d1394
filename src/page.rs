//! Physical page layout and codec.
//!
//! A physical page stores one column's values for one logical page, as a
//! fixed [`PAGE_SIZE`](crate::consts::PAGE_SIZE) byte buffer: a
//! three-field header (`num_records`, `tps`, `num_updates`, each
//! [`COLUMN_SIZE`](crate::consts::COLUMN_SIZE) bytes, big-endian signed)
//! followed by up to [`page_capacity`] values.

use crate::consts::{page_capacity, COLUMN_SIZE, HEADER_SIZE, PAGE_SIZE};

#[derive(Debug, Clone)]
pub struct PhysicalPage {
    data: Vec<u8>,
    pub pin_count: i64,
    pub is_dirty: bool,
}

impl PhysicalPage {
    pub fn empty() -> Self {
        PhysicalPage {
            data: vec![0u8; PAGE_SIZE],
            pin_count: 0,
            is_dirty: false,
        }
    }

    /// Build a page from raw on-disk bytes. Freshly loaded pages are
    /// clean and unpinned.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        PhysicalPage {
            data,
            pin_count: 0,
            is_dirty: false,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn read_header_field(&self, field_index: usize) -> i64 {
        let start = field_index * COLUMN_SIZE;
        let mut buf = [0u8; COLUMN_SIZE];
        buf.copy_from_slice(&self.data[start..start + COLUMN_SIZE]);
        i64::from_be_bytes(buf)
    }

    fn write_header_field(&mut self, field_index: usize, value: i64) {
        let start = field_index * COLUMN_SIZE;
        self.data[start..start + COLUMN_SIZE].copy_from_slice(&value.to_be_bytes());
    }

    pub fn num_records(&self) -> i64 {
        self.read_header_field(0)
    }

    pub fn set_num_records(&mut self, n: i64) {
        self.write_header_field(0, n);
        self.is_dirty = true;
    }

    pub fn tps(&self) -> i64 {
        self.read_header_field(1)
    }

    pub fn set_tps(&mut self, tps: i64) {
        self.write_header_field(1, tps);
        self.is_dirty = true;
    }

    pub fn num_updates(&self) -> i64 {
        self.read_header_field(2)
    }

    pub fn set_num_updates(&mut self, n: i64) {
        self.write_header_field(2, n);
        self.is_dirty = true;
    }

    pub fn capacity(&self) -> usize {
        page_capacity()
    }

    pub fn has_capacity(&self) -> bool {
        (self.num_records() as usize) < self.capacity()
    }

    /// Decode the signed big-endian value stored at body offset `i`.
    pub fn read(&self, offset: usize) -> i64 {
        let start = HEADER_SIZE + offset * COLUMN_SIZE;
        let mut buf = [0u8; COLUMN_SIZE];
        buf.copy_from_slice(&self.data[start..start + COLUMN_SIZE]);
        i64::from_be_bytes(buf)
    }

    /// Overwrite the value at body offset `i`. Does not touch
    /// `num_records`; callers reserve offsets separately so concurrent
    /// offset reservation can be decoupled from value mutation (see
    /// `Table::reserve_offset`).
    pub fn write(&mut self, value: i64, offset: usize) {
        let start = HEADER_SIZE + offset * COLUMN_SIZE;
        self.data[start..start + COLUMN_SIZE].copy_from_slice(&value.to_be_bytes());
        self.is_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_page_has_full_capacity() {
        let page = PhysicalPage::empty();
        assert_eq!(page.num_records(), 0);
        assert!(page.has_capacity());
        assert_eq!(page.capacity(), page_capacity());
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut page = PhysicalPage::empty();
        page.write(-42, 3);
        assert_eq!(page.read(3), -42);
        assert!(page.is_dirty);
    }

    #[test]
    fn header_fields_round_trip_through_bytes() {
        let mut page = PhysicalPage::empty();
        page.set_num_records(5);
        page.set_tps(100);
        page.set_num_updates(2);

        let bytes = page.as_bytes().to_vec();
        let reloaded = PhysicalPage::from_bytes(bytes);
        assert_eq!(reloaded.num_records(), 5);
        assert_eq!(reloaded.tps(), 100);
        assert_eq!(reloaded.num_updates(), 2);
    }

    #[test]
    fn fills_at_exactly_capacity() {
        let mut page = PhysicalPage::empty();
        let cap = page.capacity();
        page.set_num_records(cap as i64);
        assert!(!page.has_capacity());
        page.set_num_records((cap - 1) as i64);
        assert!(page.has_capacity());
    }
}
