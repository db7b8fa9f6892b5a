#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Column names as normalized from the CSV header row.
    pub headers: Vec<String>,
    /// Each data row, padded with empty cells up to `headers.len()`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
