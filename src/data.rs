//! In-memory tables handed over by the data-loading layer.
//!
//! Both tables are read-only inputs: every analysis borrows them and builds its own
//! working copies. Lookups go through explicit keys (attribute name, stimulus id, field
//! key), never through positional alignment between tables.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

/// One stimulus and its categorical metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StimulusRecord {
    pub id: String,
    attributes: HashMap<String, String>,
    /// Presence marker; only records carrying it are counted when tabulating.
    pub download: bool,
}

impl StimulusRecord {
    pub fn new(id: impl Into<String>) -> Self {
        StimulusRecord {
            id: id.into(),
            attributes: HashMap::new(),
            download: true,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn without_download(mut self) -> Self {
        self.download = false;
        self
    }

    /// Value of a categorical attribute, `None` when missing for this record.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Stimulus-level metadata table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StimulusTable {
    columns: BTreeSet<String>,
    records: Vec<StimulusRecord>,
}

impl StimulusTable {
    /// Build a table; declared columns are the union of the given names and every
    /// attribute present on a record.
    pub fn new<I, S>(columns: I, records: Vec<StimulusRecord>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: BTreeSet<String> = columns.into_iter().map(Into::into).collect();
        for record in &records {
            columns.extend(record.attributes.keys().cloned());
        }
        StimulusTable { columns, records }
    }

    pub fn from_records(records: Vec<StimulusRecord>) -> Self {
        Self::new(std::iter::empty::<String>(), records)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn records(&self) -> &[StimulusRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct non-missing values of an attribute, in first-seen order.
    pub fn distinct_values(&self, attribute: &str) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut values = Vec::new();
        for value in self.records.iter().filter_map(|r| r.attribute(attribute)) {
            if seen.insert(value) {
                values.push(value);
            }
        }
        values
    }

    /// Ids of the stimuli whose attribute equals `value`.
    pub fn ids_with(&self, attribute: &str, value: &str) -> BTreeSet<String> {
        self.records
            .iter()
            .filter(|r| r.attribute(attribute) == Some(value))
            .map(|r| r.id.clone())
            .collect()
    }
}

/// One row of ratings for a stimulus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRecord {
    pub stimulus_id: String,
    values: HashMap<String, f64>,
}

impl RatingRecord {
    pub fn new(stimulus_id: impl Into<String>) -> Self {
        RatingRecord {
            stimulus_id: stimulus_id.into(),
            values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// Rating rows indexed by stimulus id; a stimulus may own several rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RatingTable {
    rows: Vec<RatingRecord>,
    #[serde(skip)]
    index: HashMap<String, Vec<usize>>,
}

impl RatingTable {
    pub fn new(rows: Vec<RatingRecord>) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, row) in rows.iter().enumerate() {
            index
                .entry(row.stimulus_id.clone())
                .or_default()
                .push(position);
        }
        RatingTable { rows, index }
    }

    pub fn rows(&self) -> &[RatingRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rating rows of one stimulus, in table order.
    pub fn ratings_for(&self, stimulus_id: &str) -> Vec<&RatingRecord> {
        self.index
            .get(stimulus_id)
            .map(|positions| positions.iter().map(|&p| &self.rows[p]).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, stimulus_id: &str) -> bool {
        self.index.contains_key(stimulus_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_values_first_seen_order() {
        let table = StimulusTable::from_records(vec![
            StimulusRecord::new("s1").with_attribute("genre", "pop"),
            StimulusRecord::new("s2").with_attribute("genre", "rock"),
            StimulusRecord::new("s3"),
            StimulusRecord::new("s4").with_attribute("genre", "pop"),
        ]);
        assert_eq!(table.distinct_values("genre"), vec!["pop", "rock"]);
        assert!(table.has_attribute("genre"));
        assert!(!table.has_attribute("mood"));
        assert_eq!(table.ids_with("genre", "pop").len(), 2);
    }

    #[test]
    fn test_declared_column_without_values() {
        let table = StimulusTable::new(["all_genders"], vec![StimulusRecord::new("s1")]);
        assert!(table.has_attribute("all_genders"));
        assert!(table.distinct_values("all_genders").is_empty());
    }

    #[test]
    fn test_rating_index_groups_rows() {
        let table = RatingTable::new(vec![
            RatingRecord::new("a").with_value("Happy", 1.0),
            RatingRecord::new("b").with_value("Happy", 2.0),
            RatingRecord::new("a").with_value("Happy", 3.0),
        ]);
        let rows = table.ratings_for("a");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].value("Happy"), Some(3.0));
        assert!(table.ratings_for("missing").is_empty());
    }
}
