//! In-memory record store
//!
//! A test double for [`RecordStore`] that runs exports without a live server.
//! It evaluates only the syntax the exporter produces: equality, `$in`,
//! `$exists`, comparisons and `$text` in filters, plus the `$match`,
//! `$project`, `$sort`, `$limit` and `$skip` stages. Anything else is an
//! `Unsupported*` error, never a silent mismatch.

use std::cmp::Ordering;

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{StreamExt, stream};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::utils::path::{get_path, project};

use super::source::{FindSpec, RecordStore, RecordStream};

/// Record store backed by a vector of documents
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    name: String,
    records: Vec<Document>,
    text_fields: Vec<String>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>, records: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            records,
            text_fields: Vec::new(),
        }
    }

    /// Restrict `$text` searches to the given paths
    ///
    /// Without text fields every top-level string is searched.
    pub fn with_text_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Records matching `filter`, in insertion order
    fn matching(&self, filter: &Document) -> Result<Vec<Document>> {
        let mut matched = Vec::new();
        for record in &self.records {
            if self.matches(record, filter)? {
                matched.push(record.clone());
            }
        }
        Ok(matched)
    }

    fn matches(&self, record: &Document, filter: &Document) -> Result<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$text" => self.matches_text(record, condition)?,
                op if op.starts_with('$') => {
                    return Err(SourceError::UnsupportedOperator(op.to_string()).into());
                }
                path => matches_condition(get_path(record, path), condition)?,
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_text(&self, record: &Document, condition: &Bson) -> Result<bool> {
        let search = match condition {
            Bson::Document(doc) => doc.get_str("$search").map_err(|_| {
                SourceError::QueryFailed("$text requires a $search string".to_string())
            })?,
            _ => {
                return Err(SourceError::QueryFailed("$text expects a document".to_string()).into());
            }
        };

        let terms: Vec<String> = search.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok(false);
        }

        let haystacks: Vec<String> = if self.text_fields.is_empty() {
            record
                .values()
                .filter_map(|v| v.as_str().map(str::to_lowercase))
                .collect()
        } else {
            self.text_fields
                .iter()
                .filter_map(|field| get_path(record, field))
                .filter_map(|v| v.as_str().map(str::to_lowercase))
                .collect()
        };

        Ok(terms
            .iter()
            .any(|term| haystacks.iter().any(|text| text.contains(term.as_str()))))
    }

    fn run_pipeline(&self, pipeline: &[Document]) -> Result<Vec<Document>> {
        let mut records = self.records.clone();

        for stage in pipeline {
            let Some((name, spec)) = stage.iter().next() else {
                return Err(SourceError::UnsupportedStage("{}".to_string()).into());
            };

            records = match (name.as_str(), spec) {
                ("$match", Bson::Document(filter)) => {
                    let mut matched = Vec::new();
                    for record in records {
                        if self.matches(&record, filter)? {
                            matched.push(record);
                        }
                    }
                    matched
                }
                ("$project", Bson::Document(projection)) => records
                    .iter()
                    .map(|record| project(record, projection))
                    .collect(),
                ("$sort", Bson::Document(sort)) => {
                    sort_records(&mut records, sort);
                    records
                }
                ("$limit", limit) => {
                    let limit = as_count(limit).ok_or_else(|| {
                        SourceError::QueryFailed(format!("invalid $limit: {limit}"))
                    })?;
                    records.into_iter().take(limit).collect()
                }
                ("$skip", skip) => {
                    let skip = as_count(skip).ok_or_else(|| {
                        SourceError::QueryFailed(format!("invalid $skip: {skip}"))
                    })?;
                    records.into_iter().skip(skip).collect()
                }
                (other, _) => {
                    return Err(SourceError::UnsupportedStage(other.to_string()).into());
                }
            };
        }

        Ok(records)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<RecordStream> {
        let mut records = self.matching(&filter)?;

        if let Some(sort) = &spec.sort {
            sort_records(&mut records, sort);
        }

        let skip = spec.skip.unwrap_or(0) as usize;
        let limit = match spec.limit {
            Some(n) if n != 0 => n.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        let records: Vec<Document> = records
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|record| match &spec.projection {
                Some(projection) => project(&record, projection),
                None => record,
            })
            .collect();

        debug!("Memory find on '{}' matched {} records", self.name, records.len());
        Ok(stream::iter(records.into_iter().map(Ok)).boxed())
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        _batch_size: Option<u32>,
    ) -> Result<RecordStream> {
        let records = self.run_pipeline(&pipeline)?;
        debug!(
            "Memory aggregate on '{}' produced {} records",
            self.name,
            records.len()
        );
        Ok(stream::iter(records.into_iter().map(Ok)).boxed())
    }
}

/// Match one field value against a condition
///
/// Plain values compare for equality (an array field matches when any element
/// is equal); documents whose keys start with `$` are operator expressions.
fn matches_condition(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    if let Bson::Document(ops) = condition {
        if ops.keys().next().is_some_and(|k| k.starts_with('$')) {
            for (op, operand) in ops {
                if !matches_operator(value, op, operand)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
    }

    Ok(equals(value, condition))
}

fn matches_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> Result<bool> {
    let matched = match op {
        "$in" => {
            let Bson::Array(candidates) = operand else {
                return Err(SourceError::QueryFailed("$in expects an array".to_string()).into());
            };
            candidates.iter().any(|c| equals(value, c))
        }
        "$exists" => value.is_some() == crate::utils::path::is_truthy(operand),
        "$gt" => compare_present(value, operand).is_some_and(Ordering::is_gt),
        "$gte" => compare_present(value, operand).is_some_and(Ordering::is_ge),
        "$lt" => compare_present(value, operand).is_some_and(Ordering::is_lt),
        "$lte" => compare_present(value, operand).is_some_and(Ordering::is_le),
        other => return Err(SourceError::UnsupportedOperator(other.to_string()).into()),
    };
    Ok(matched)
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| compare(item, expected) == Some(Ordering::Equal))
        }
        Some(actual) => compare(actual, expected) == Some(Ordering::Equal),
    }
}

fn compare_present(value: Option<&Bson>, operand: &Bson) -> Option<Ordering> {
    compare(value?, operand)
}

/// Compare two values of the same BSON family
///
/// Numbers compare across widths; values of different families are
/// incomparable.
fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => return x.partial_cmp(&y),
        (Some(_), None) | (None, Some(_)) => return None,
        (None, None) => {}
    }

    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn as_count(value: &Bson) -> Option<usize> {
    as_number(value).filter(|n| *n >= 0.0).map(|n| n as usize)
}

/// Rank of a value when sorting mixed types; missing sorts first
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
        Some(Bson::String(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::ObjectId(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

fn sort_records(records: &mut [Document], sort: &Document) {
    records.sort_by(|a, b| {
        for (path, direction) in sort {
            let (x, y) = (get_path(a, path), get_path(b, path));
            let ordering = type_rank(x).cmp(&type_rank(y)).then_with(|| match (x, y) {
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            });
            let descending = as_number(direction).is_some_and(|d| d < 0.0);
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use futures::TryStreamExt;

    fn users() -> MemoryStore {
        MemoryStore::new(
            "users",
            vec![
                doc! { "name": "Amy", "age": 30, "tags": ["admin"], "bio": "likes tea" },
                doc! { "name": "Bo", "age": 41, "tags": ["staff"], "bio": "plays chess" },
                doc! { "name": "Cy", "age": 25.5, "bio": "drinks tea daily" },
                doc! { "name": "Di" },
            ],
        )
    }

    async fn names(stream: RecordStream) -> Vec<String> {
        let records: Vec<Document> = stream.try_collect().await.unwrap();
        records
            .iter()
            .map(|r| r.get_str("name").unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_equality_and_array_membership() {
        let store = users();
        let found = store.find(doc! { "tags": "admin" }, FindSpec::default()).await.unwrap();
        assert_eq!(names(found).await, vec!["Amy"]);

        let found = store.find(doc! { "age": 41.0 }, FindSpec::default()).await.unwrap();
        assert_eq!(names(found).await, vec!["Bo"]);
    }

    #[tokio::test]
    async fn test_in_and_comparison_operators() {
        let store = users();
        let found = store
            .find(doc! { "name": { "$in": ["Amy", "Di"] } }, FindSpec::default())
            .await
            .unwrap();
        assert_eq!(names(found).await, vec!["Amy", "Di"]);

        let found = store
            .find(doc! { "age": { "$gte": 26, "$lt": 50 } }, FindSpec::default())
            .await
            .unwrap();
        assert_eq!(names(found).await, vec!["Amy", "Bo"]);
    }

    #[tokio::test]
    async fn test_text_search() {
        let store = users().with_text_fields(["bio"]);
        let found = store
            .find(doc! { "$text": { "$search": "TEA" } }, FindSpec::default())
            .await
            .unwrap();
        assert_eq!(names(found).await, vec!["Amy", "Cy"]);
    }

    #[tokio::test]
    async fn test_sort_limit_skip() {
        let spec = FindSpec {
            sort: Some(doc! { "age": -1 }),
            skip: Some(1),
            limit: Some(2),
            ..FindSpec::default()
        };
        let found = users().find(doc! {}, spec).await.unwrap();
        assert_eq!(names(found).await, vec!["Amy", "Cy"]);
    }

    #[tokio::test]
    async fn test_aggregate_subset() {
        let pipeline = vec![
            doc! { "$match": { "age": { "$exists": true } } },
            doc! { "$sort": { "name": -1 } },
            doc! { "$skip": 1 },
            doc! { "$limit": 1 },
            doc! { "$project": { "name": 1 } },
        ];
        let records: Vec<Document> = users()
            .aggregate(pipeline, None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(records, vec![doc! { "name": "Bo" }]);
    }

    #[tokio::test]
    async fn test_unsupported_syntax_is_an_error() {
        let store = users();
        let err = store
            .aggregate(vec![doc! { "$group": { "_id": "$name" } }], None)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::error::ExportableError::Source(SourceError::UnsupportedStage(ref s)) if s == "$group"
        ));

        let err = store
            .find(doc! { "name": { "$regex": "A" } }, FindSpec::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::error::ExportableError::Source(SourceError::UnsupportedOperator(_))
        ));

        let err = store
            .find(doc! { "$or": [{ "name": "Amy" }] }, FindSpec::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::error::ExportableError::Source(SourceError::UnsupportedOperator(ref op)) if op == "$or"
        ));
    }
}
