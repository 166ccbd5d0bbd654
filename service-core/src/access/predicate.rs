use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::Record;

/// A literal compared against a column or document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Scalar::Int(a), Value::Number(n)) => n.as_i64() == Some(*a),
            (Scalar::Bool(a), Value::Bool(b)) => a == b,
            (Scalar::Text(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// Engine-neutral row filter.
///
/// Rendered to SQL by the PostgreSQL store and to a filter document by the
/// MongoDB store. `Never` matches no row on every engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Never,
    Eq { field: String, value: Scalar },
    In { field: String, values: Vec<Scalar> },
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Predicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// An empty list can never match.
    pub fn in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        let values: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Predicate::Never;
        }
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    /// Conjunction with `Always` and `Never` folded away.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Never, _) | (_, Predicate::Never) => Predicate::Never,
            (Predicate::Always, p) | (p, Predicate::Always) => p,
            (Predicate::And(mut a), Predicate::And(b)) => {
                a.extend(b);
                Predicate::And(a)
            }
            (Predicate::And(mut a), p) => {
                a.push(p);
                Predicate::And(a)
            }
            (p, Predicate::And(mut b)) => {
                b.insert(0, p);
                Predicate::And(b)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Predicate::Never)
    }

    /// Evaluate against an in-memory record. A missing field never matches.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Never => false,
            Predicate::Eq { field, value } => {
                record.get(field).is_some_and(|v| value.matches(v))
            }
            Predicate::In { field, values } => record
                .get(field)
                .is_some_and(|v| values.iter().any(|s| s.matches(v))),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
        }
    }

    /// Every field name referenced, for identifier validation.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Predicate::Always | Predicate::Never => Vec::new(),
            Predicate::Eq { field, .. } | Predicate::In { field, .. } => vec![field.as_str()],
            Predicate::And(parts) => parts.iter().flat_map(|p| p.fields()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn and_folds_identities() {
        let owner = Predicate::eq("user_id", 7);
        assert_eq!(Predicate::Always.and(owner.clone()), owner);
        assert_eq!(owner.clone().and(Predicate::Never), Predicate::Never);

        let both = owner.clone().and(Predicate::eq("status", "open"));
        let three = both.and(Predicate::eq("archived", false));
        match three {
            Predicate::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected flattened And, got {:?}", other),
        }
    }

    #[test]
    fn matches_by_type() {
        let row = record(json!({ "user_id": 7, "status": "open" }));
        assert!(Predicate::eq("user_id", 7).matches(&row));
        assert!(!Predicate::eq("user_id", "7").matches(&row));
        assert!(!Predicate::eq("missing", 7).matches(&row));
        assert!(Predicate::in_list("user_id", [1_i64, 7]).matches(&row));
        assert!(!Predicate::Never.matches(&row));
    }

    #[test]
    fn empty_in_list_is_never() {
        assert!(Predicate::in_list("enterprise_id", Vec::<i64>::new()).is_never());
    }
}
