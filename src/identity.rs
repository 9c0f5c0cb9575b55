//! User identity and its canonical cache key.
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// The identity experiments are resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Login id or anonymous id.
    pub distinct_id: String,
    /// Whether `distinct_id` is a login id.
    pub is_login_id: bool,
    /// Caller-supplied alternate identity keys (e.g., a household or account id).
    #[serde(default)]
    pub custom_ids: HashMap<String, String>,
}

impl UserIdentity {
    /// Create an identity with no custom ids.
    pub fn new(distinct_id: impl Into<String>, is_login_id: bool) -> UserIdentity {
        UserIdentity {
            distinct_id: distinct_id.into(),
            is_login_id,
            custom_ids: HashMap::new(),
        }
    }

    /// Replace custom ids.
    pub fn with_custom_ids(mut self, custom_ids: HashMap<String, String>) -> UserIdentity {
        self.custom_ids = custom_ids;
        self
    }

    /// Stable key for this identity: hex-encoded md5 over the distinct id, login flag, and custom
    /// ids sorted by name. Two identities that differ only in custom-id insertion order share a
    /// key.
    pub fn cache_key(&self) -> String {
        let custom_ids: BTreeMap<&str, &str> = self
            .custom_ids
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut context = md5::Context::new();
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart.
        feed(&mut context, &self.distinct_id);
        context.consume([u8::from(self.is_login_id)]);
        for (name, value) in custom_ids {
            feed(&mut context, name);
            feed(&mut context, value);
        }
        format!("{:x}", context.compute())
    }
}

fn feed(context: &mut md5::Context, s: &str) {
    context.consume((s.len() as u64).to_be_bytes());
    context.consume(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::UserIdentity;

    #[test]
    fn key_ignores_custom_id_order() {
        let mut a = HashMap::new();
        a.insert("household".to_owned(), "h1".to_owned());
        a.insert("account".to_owned(), "a1".to_owned());
        let mut b = HashMap::new();
        b.insert("account".to_owned(), "a1".to_owned());
        b.insert("household".to_owned(), "h1".to_owned());

        assert_eq!(
            UserIdentity::new("user", true).with_custom_ids(a).cache_key(),
            UserIdentity::new("user", true).with_custom_ids(b).cache_key(),
        );
    }

    #[test]
    fn key_distinguishes_login_flag_and_custom_ids() {
        let anonymous = UserIdentity::new("user", false);
        let login = UserIdentity::new("user", true);
        let bound = UserIdentity::new("user", false).with_custom_ids(
            [("household".to_owned(), "h1".to_owned())].into_iter().collect(),
        );

        assert_ne!(anonymous.cache_key(), login.cache_key());
        assert_ne!(anonymous.cache_key(), bound.cache_key());
    }

    #[test]
    fn key_is_not_ambiguous_on_concatenation() {
        let a = UserIdentity::new("ab", false)
            .with_custom_ids([("c".to_owned(), "d".to_owned())].into_iter().collect());
        let b = UserIdentity::new("a", false)
            .with_custom_ids([("bc".to_owned(), "d".to_owned())].into_iter().collect());
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn key_is_hex_md5() {
        let key = UserIdentity::new("user", false).cache_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
