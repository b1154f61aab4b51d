//! Row records handed to the renderer
//!
//! One record per line boundary, in insertion order. Inserting or removing
//! a record renumbers everything after it, so `index` always equals the
//! record's position.

use memchr::memchr_iter;

/// One renderer row: its index and the byte length of its content,
/// excluding the terminating newline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Row {
    pub index: usize,
    pub bytes: usize,
}

/// Ordered row records derived from buffer content.
#[derive(Default)]
pub struct RowMap {
    rows: Vec<Row>,
}

impl RowMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive all records from a flattened content snapshot: one row per
    /// newline-terminated segment, plus a final row for trailing bytes.
    pub fn rebuild(&mut self, content: &[u8]) {
        self.rows.clear();
        let mut start = 0;
        for nl in memchr_iter(b'\n', content) {
            self.rows.push(Row {
                index: self.rows.len(),
                bytes: nl - start,
            });
            start = nl + 1;
        }
        if start < content.len() {
            self.rows.push(Row {
                index: self.rows.len(),
                bytes: content.len() - start,
            });
        }
    }

    /// Insert a record at `at` (clamped to the end); records at or after
    /// `at` shift up by one index.
    pub fn insert(&mut self, at: usize, bytes: usize) {
        let at = at.min(self.rows.len());
        self.rows.insert(at, Row { index: at, bytes });
        self.renumber_from(at + 1);
    }

    /// Remove the record at `at`; later records shift down by one index.
    pub fn remove(&mut self, at: usize) -> Option<Row> {
        if at >= self.rows.len() {
            return None;
        }
        let row = self.rows.remove(at);
        self.renumber_from(at);
        Some(row)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn renumber_from(&mut self, at: usize) {
        for (index, row) in self.rows.iter_mut().enumerate().skip(at) {
            row.index = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lengths(map: &RowMap) -> Vec<usize> {
        map.rows().iter().map(|row| row.bytes).collect()
    }

    fn indices(map: &RowMap) -> Vec<usize> {
        map.rows().iter().map(|row| row.index).collect()
    }

    #[test]
    fn test_rebuild_splits_on_newlines() {
        let mut map = RowMap::new();
        map.rebuild(b"hello\nworld\n");
        assert_eq!(lengths(&map), vec![5, 5]);
        assert_eq!(indices(&map), vec![0, 1]);
    }

    #[test]
    fn test_rebuild_keeps_trailing_partial_row() {
        let mut map = RowMap::new();
        map.rebuild(b"one\ntwo");
        assert_eq!(lengths(&map), vec![3, 3]);

        map.rebuild(b"\n\nx");
        assert_eq!(lengths(&map), vec![0, 0, 1]);
    }

    #[test]
    fn test_rebuild_empty_content() {
        let mut map = RowMap::new();
        map.rebuild(b"abc");
        map.rebuild(b"");
        assert!(map.is_empty());
    }

    #[test]
    fn test_insert_renumbers_subsequent_rows() {
        let mut map = RowMap::new();
        map.rebuild(b"a\nb\nc");
        map.insert(1, 9);
        assert_eq!(lengths(&map), vec![1, 9, 1, 1]);
        assert_eq!(indices(&map), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_remove_renumbers_subsequent_rows() {
        let mut map = RowMap::new();
        map.rebuild(b"a\nbb\nccc");
        let removed = map.remove(1).unwrap();
        assert_eq!(removed.bytes, 2);
        assert_eq!(lengths(&map), vec![1, 3]);
        assert_eq!(indices(&map), vec![0, 1]);

        assert!(map.remove(5).is_none());
    }

    #[test]
    fn test_insert_past_end_clamps() {
        let mut map = RowMap::new();
        map.insert(10, 4);
        assert_eq!(indices(&map), vec![0]);
    }
}
