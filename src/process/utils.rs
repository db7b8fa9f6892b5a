use std::collections::HashSet;

/// Trim, then replace spaces and hyphens with underscores.
///
/// Applying it twice yields the same name as applying it once.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim().replace(' ', "_").replace('-', "_")
}

/// Normalize a full header row. Blank headers become `Unnamed:_<idx>` and
/// repeated names get a `_<n>` suffix so the table can still be created.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());

    for (idx, h) in raw.iter().enumerate() {
        let base = if h.trim().is_empty() {
            normalize_column_name(&format!("Unnamed: {}", idx))
        } else {
            normalize_column_name(h)
        };

        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name.to_lowercase()) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        seen.insert(name.to_lowercase());
        out.push(name);
    }
    out
}

/// Cell values that are read as SQL NULL. An empty cell is always null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullValues {
    tokens: HashSet<String>,
}

/// The missing-value markers pandas `read_csv` recognises by default.
pub const DEFAULT_NULL_VALUES: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

impl NullValues {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(&self, cell: &str) -> bool {
        cell.is_empty() || self.tokens.contains(cell)
    }
}

impl Default for NullValues {
    fn default() -> Self {
        Self::new(DEFAULT_NULL_VALUES.iter().copied())
    }
}
