//! Typed query builder shared by every repository.
//!
//! A [`Query`] always carries a collection and an owner scope; field
//! filters, an inclusive timestamp range and a sort are optional. Both store
//! implementations evaluate queries through [`Query::apply`] so filter
//! semantics cannot drift between them.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Collection, Document};

/// Field filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value. `Eq(field, Null)` also matches a missing field.
    Eq(String, Value),
    /// Field differs from value (a missing field counts as different).
    Ne(String, Value),
    /// Field equals one of the values.
    In(String, Vec<Value>),
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(field, expected) => {
                let actual = doc.field(field).unwrap_or(Value::Null);
                &actual == expected
            }
            Filter::Ne(field, expected) => {
                let actual = doc.field(field).unwrap_or(Value::Null);
                &actual != expected
            }
            Filter::In(field, options) => {
                let actual = doc.field(field).unwrap_or(Value::Null);
                options.iter().any(|v| v == &actual)
            }
        }
    }
}

/// Timestamp range on one field. `gte`/`lte` are inclusive, `lt` exclusive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeFilter {
    pub field: String,
    pub gte: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
    pub lt: Option<DateTime<Utc>>,
}

impl RangeFilter {
    fn matches(&self, doc: &Document) -> bool {
        let Some(at) = doc.field(&self.field).as_ref().and_then(value_as_datetime) else {
            return false;
        };
        if let Some(gte) = self.gte {
            if at < gte {
                return false;
            }
        }
        if let Some(lte) = self.lte {
            if at > lte {
                return false;
            }
        }
        if let Some(lt) = self.lt {
            if at >= lt {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

/// Owner-scoped query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub owner_id: String,
    pub filters: Vec<Filter>,
    pub range: Option<RangeFilter>,
    pub sort: Option<SortSpec>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection, owner_id: impl Into<String>) -> Self {
        Self {
            collection,
            owner_id: owner_id.into(),
            filters: Vec::new(),
            range: None,
            sort: None,
            limit: None,
        }
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ne(field.into(), value.into()));
        self
    }

    pub fn one_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(field.into(), values));
        self
    }

    /// Inclusive range `gte <= field <= lte`.
    pub fn between(
        mut self,
        field: impl Into<String>,
        gte: DateTime<Utc>,
        lte: DateTime<Utc>,
    ) -> Self {
        self.range = Some(RangeFilter {
            field: field.into(),
            gte: Some(gte),
            lte: Some(lte),
            lt: None,
        });
        self
    }

    /// Exclusive upper bound `field < cutoff`.
    pub fn before(mut self, field: impl Into<String>, cutoff: DateTime<Utc>) -> Self {
        self.range = Some(RangeFilter {
            field: field.into(),
            lt: Some(cutoff),
            ..RangeFilter::default()
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            order,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.owner_id == self.owner_id
            && self.filters.iter().all(|f| f.matches(doc))
            && self.range.as_ref().map_or(true, |r| r.matches(doc))
    }

    /// Filter, sort and truncate a candidate set. The sort is stable, so
    /// documents with equal keys keep their insertion order.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(sort) = &self.sort {
            out.sort_by(|a, b| {
                let ord = compare_values(
                    &a.field(&sort.field).unwrap_or(Value::Null),
                    &b.field(&sort.field).unwrap_or(Value::Null),
                );
                match sort.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

fn value_as_datetime(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Total order over JSON scalars used for sorting. Timestamps compare as
/// instants (RFC 3339 strings with differing precision do not sort
/// lexicographically), nulls sort first.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (value_as_datetime(a), value_as_datetime(b)) {
                (Some(da), Some(db)) => da.cmp(&db),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn doc(id: &str, owner: &str, fields: Value) -> Document {
        Document {
            id: id.into(),
            owner_id: owner.into(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn owner_scope_is_always_applied() {
        let docs = vec![
            doc("a", "u1", json!({ "status": "pending" })),
            doc("b", "u2", json!({ "status": "pending" })),
        ];
        let out = Query::new(Collection::Tasks, "u1").apply(docs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn eq_null_matches_missing_field() {
        let docs = vec![
            doc("a", "u1", json!({ "taskId": null })),
            doc("b", "u1", json!({})),
            doc("c", "u1", json!({ "taskId": "t1" })),
        ];
        let out = Query::new(Collection::FocusSessions, "u1")
            .eq("taskId", Value::Null)
            .apply(docs);
        let ids: Vec<_> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let docs = vec![
            doc("lo", "u1", json!({ "startedAt": start.to_rfc3339() })),
            doc("hi", "u1", json!({ "startedAt": end.to_rfc3339() })),
            doc(
                "out",
                "u1",
                json!({ "startedAt": (end + chrono::Duration::seconds(1)).to_rfc3339() }),
            ),
        ];
        let out = Query::new(Collection::FocusSessions, "u1")
            .between("startedAt", start, end)
            .apply(docs);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn before_is_exclusive() {
        let cutoff = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let docs = vec![
            doc("at", "u1", json!({ "startedAt": cutoff.to_rfc3339() })),
            doc(
                "old",
                "u1",
                json!({ "startedAt": (cutoff - chrono::Duration::days(1)).to_rfc3339() }),
            ),
        ];
        let out = Query::new(Collection::FocusSessions, "u1")
            .before("startedAt", cutoff)
            .apply(docs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "old");
    }

    #[test]
    fn sorts_timestamps_as_instants() {
        let docs = vec![
            doc("later", "u1", json!({ "createdAt": "2024-03-01T00:00:00Z" })),
            doc("earlier", "u1", json!({ "createdAt": "2024-02-29T23:59:59.500Z" })),
        ];
        let out = Query::new(Collection::Tasks, "u1")
            .order_by("createdAt", SortOrder::Asc)
            .apply(docs);
        assert_eq!(out[0].id, "earlier");
    }

    #[test]
    fn one_of_matches_ids() {
        let docs = vec![
            doc("a", "u1", json!({})),
            doc("b", "u1", json!({})),
            doc("c", "u1", json!({})),
        ];
        let out = Query::new(Collection::Tasks, "u1")
            .one_of("id", ["a", "c"])
            .apply(docs);
        assert_eq!(out.len(), 2);
    }
}
