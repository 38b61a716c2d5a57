//! Field-name and value similarity used by the transformed-match pass.
//!
//! Field-name similarity is a strategy (`FieldSimilarity`) so the alias
//! heuristics can be extended or replaced without touching the tracer.
//! Value similarity is fixed.

/// Decides whether two field names plausibly refer to the same datum.
pub trait FieldSimilarity: Send + Sync {
    fn is_similar(&self, a: &str, b: &str) -> bool;
}

/// Built-in alias groups: a head name followed by its aliases.
const DEFAULT_ALIASES: &[&[&str]] = &[
    &["text", "content", "body", "message"],
    &["id", "_id", "identifier", "key"],
    &["name", "title", "label"],
    &["description", "desc", "summary", "abstract"],
];

/// Names are similar when they are equal ignoring case, when one contains
/// the other, or when one is a group's head name and the other one of its
/// aliases. Two aliases of the same head (`content` and `message`) are not
/// similar to each other.
#[derive(Debug, Clone)]
pub struct AliasFieldSimilarity {
    groups: Vec<(String, Vec<String>)>,
}

impl AliasFieldSimilarity {
    /// No alias groups; only case and containment rules apply.
    pub fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    /// Add aliases for `head`. Names are compared case-insensitively.
    pub fn with_aliases<I, S>(mut self, head: &str, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let aliases = aliases.into_iter().map(|n| n.as_ref().to_lowercase()).collect();
        self.groups.push((head.to_lowercase(), aliases));
        self
    }

    fn aliased(&self, a: &str, b: &str) -> bool {
        self.groups.iter().any(|(head, aliases)| {
            (head == a && aliases.iter().any(|n| n == b))
                || (head == b && aliases.iter().any(|n| n == a))
        })
    }
}

impl Default for AliasFieldSimilarity {
    fn default() -> Self {
        DEFAULT_ALIASES.iter().fold(Self::empty(), |similarity, group| match group {
            [head, aliases @ ..] => similarity.with_aliases(head, aliases),
            [] => similarity,
        })
    }
}

impl FieldSimilarity for AliasFieldSimilarity {
    fn is_similar(&self, a: &str, b: &str) -> bool {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        if a == b {
            return true;
        }
        if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
            return true;
        }
        self.aliased(&a, &b)
    }
}

/// Tolerance under which two numbers are considered the same value.
pub const NUMERIC_TOLERANCE: f64 = 0.001;

/// JSON equality that compares numbers by value, so `1` equals `1.0`.
/// Arrays and objects compare element-wise.
pub fn json_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, x)| y.get(key).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Whether a node's value plausibly became the output value.
///
/// Equal values (per `json_equal`) always match. Strings match on
/// case-insensitive equality or containment in either direction (the empty
/// string only matches itself). Numbers match when closer than
/// `NUMERIC_TOLERANCE`.
pub fn values_similar(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value;

    if json_equal(a, b) {
        return true;
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            if x.is_empty() || y.is_empty() {
                return false;
            }
            let (x, y) = (x.to_lowercase(), y.to_lowercase());
            x == y || x.contains(&y) || y.contains(&x)
        }
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < NUMERIC_TOLERANCE,
            _ => false,
        },
        _ => false,
    }
}
