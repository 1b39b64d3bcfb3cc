use crate::series::Series;

/// Insertion-ordered collection of series keyed by [`Series::key`].
///
/// [`insert`](Self::insert) replaces an entry with the same key in place, while
/// [`push`](Self::push) keeps both. Pieces of one recording loaded from separate files
/// share a key until [`merge`](crate::transform::merge) joins them. Lookups return the
/// first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesTable {
    entries: Vec<(String, Series)>,
}

impl SeriesTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the series' own key; returns the replaced entry, if any.
    pub fn insert(&mut self, series: Series) -> Option<Series> {
        let key = series.key();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, series)),
            None => {
                self.entries.push((key, series));
                None
            }
        }
    }

    /// Append without replacing, so several entries may carry the same key.
    pub fn push(&mut self, series: Series) {
        let key = series.key();
        self.entries.push((key, series));
    }

    /// Number of entries carrying `name`.
    pub fn pieces(&self, name: &str) -> usize {
        self.values().filter(|s| s.name() == name).count()
    }

    pub fn remove(&mut self, key: &str) -> Option<Series> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn get(&self, key: &str) -> Option<&Series> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    /// First entry carrying `name`, whatever its shift.
    pub fn get_by_name(&self, name: &str) -> Option<&Series> {
        self.values().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Series> {
        self.entries.iter().map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn into_values(self) -> impl Iterator<Item = Series> {
        self.entries.into_iter().map(|(_, s)| s)
    }

    /// Distinct names in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for s in self.values() {
            if !names.contains(&s.name()) {
                names.push(s.name());
            }
        }
        names
    }
}

impl FromIterator<Series> for SeriesTable {
    fn from_iter<I: IntoIterator<Item = Series>>(iter: I) -> Self {
        let mut table = SeriesTable::new();
        for series in iter {
            table.push(series);
        }
        table
    }
}
