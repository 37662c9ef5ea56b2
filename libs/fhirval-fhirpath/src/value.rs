use serde_json::Value as Json;

/// FHIRPath evaluates every expression against a collection, not a scalar. We keep
/// that shape rather than special-casing single values, since navigation through a
/// repeating element (`name.family`) genuinely produces more than one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection(pub Vec<Json>);

impl Collection {
    pub fn single(value: Json) -> Self {
        Self(vec![value])
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Three-valued boolean per the FHIRPath spec: an empty collection is "unknown"
    /// rather than false, a population `and`/`or`/`implies` has to account for.
    pub fn as_bool3(&self) -> Option<bool> {
        match self.0.as_slice() {
            [] => None,
            [Json::Bool(b)] => Some(*b),
            _ => Some(true),
        }
    }

    pub fn from_bool(b: bool) -> Self {
        Self(vec![Json::Bool(b)])
    }

    pub fn from_bool3(b: Option<bool>) -> Self {
        match b {
            Some(b) => Self::from_bool(b),
            None => Self::empty(),
        }
    }
}
