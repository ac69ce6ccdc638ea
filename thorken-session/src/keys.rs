//! Key layout shared by every store backend.
//!
//! ```text
//! n:<namespace>:t:<token>   hash        uid, expiresAt, ip
//! n:<namespace>:u:<uid>     set         tokens owned by uid
//! n:<namespace>:t:list      sorted set  "<uid>:<token>" scored by expiresAt
//! ```

const NAMESPACE_PREFIX: &str = "n:";
const USER_PREFIX: &str = "u:";
const TOKEN_PREFIX: &str = "t:";
const LIST_SUFFIX: &str = "list";

/// Builds the namespaced keys for the three session structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    namespace_key: String,
}

impl KeySchema {
    /// Create the schema for `namespace`.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace_key: format!("{}{}:", NAMESPACE_PREFIX, namespace),
        }
    }

    /// Prefix shared by every key of this namespace (`n:<namespace>:`).
    pub fn namespace_key(&self) -> &str {
        &self.namespace_key
    }

    /// Token record key.
    pub fn token(&self, token: &str) -> String {
        format!("{}{}{}", self.namespace_key, TOKEN_PREFIX, token)
    }

    /// Prefix of every token record key; the Lua scripts append a token to it.
    pub fn token_prefix(&self) -> String {
        format!("{}{}", self.namespace_key, TOKEN_PREFIX)
    }

    /// User index key.
    pub fn user(&self, uid: &str) -> String {
        format!("{}{}{}", self.namespace_key, USER_PREFIX, uid)
    }

    /// Prefix of every user index key.
    pub fn user_prefix(&self) -> String {
        format!("{}{}", self.namespace_key, USER_PREFIX)
    }

    /// Global expiry index key.
    pub fn list(&self) -> String {
        format!("{}{}{}", self.namespace_key, TOKEN_PREFIX, LIST_SUFFIX)
    }

    /// Glob matching every key of this namespace.
    pub fn pattern(&self) -> String {
        format!("{}*", self.namespace_key)
    }
}

/// A member of the global expiry index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub uid: String,
    pub token: String,
}

impl IndexEntry {
    pub fn new(uid: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            token: token.into(),
        }
    }

    /// Encoded member, `<uid>:<token>`.
    pub fn member(&self) -> String {
        format!("{}:{}", self.uid, self.token)
    }

    /// Decode a member.
    ///
    /// Tokens never contain `:`, so splitting at the last separator keeps
    /// uids that contain `:` intact.
    pub fn parse(member: &str) -> Option<Self> {
        let (uid, token) = member.rsplit_once(':')?;
        if uid.is_empty() || token.is_empty() {
            return None;
        }
        Some(Self::new(uid, token))
    }
}
