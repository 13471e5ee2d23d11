use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a group (order, customer) or of an entity (product).
///
/// The source tables use integer ids throughout; string ids exist so the
/// builder can also run over already-tokenised data. Integers order before
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Integer(u64),
    String(String),
}

impl EntityKey {
    /// Token form fed to trainers and used as the embedding table key.
    #[inline]
    pub fn token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Integer(i) => write!(f, "{}", i),
            EntityKey::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for EntityKey {
    fn from(i: u64) -> Self {
        EntityKey::Integer(i)
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        EntityKey::String(s)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        EntityKey::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_order_before_strings() {
        let mut keys = vec![
            EntityKey::from("b"),
            EntityKey::from(10u64),
            EntityKey::from("a"),
            EntityKey::from(2u64),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                EntityKey::from(2u64),
                EntityKey::from(10u64),
                EntityKey::from("a"),
                EntityKey::from("b"),
            ]
        );
    }

    #[test]
    fn test_untagged_deserialization() {
        let k: EntityKey = serde_json::from_str("42").unwrap();
        assert_eq!(k, EntityKey::Integer(42));
        let k: EntityKey = serde_json::from_str("\"sku-9\"").unwrap();
        assert_eq!(k.token(), "sku-9");
    }
}
