//! Module keys: stable, tenant-unique engine identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use opsconsole_core::{DomainError, DomainResult};

/// Longest key accepted by [`ModuleKey::parse`].
pub const MAX_KEY_LEN: usize = 64;

/// Identifier of an engine within a tenant (e.g. `crm`, `recycling`).
///
/// Keys match `[a-z0-9_-]+` and are immutable once a record exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleKey(String);

impl ModuleKey {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if raw.is_empty() {
            return Err(DomainError::validation("module key cannot be empty"));
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(DomainError::validation(format!(
                "module key exceeds {MAX_KEY_LEN} bytes"
            )));
        }
        if let Some(bad) = raw.chars().find(|c| !is_key_char(*c)) {
            return Err(DomainError::validation(format!(
                "module key {raw:?} contains invalid character {bad:?} \
                 (allowed: a-z, 0-9, '_', '-')"
            )));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Key from a literal authored in this codebase.
    ///
    /// Literals are checked by the standard catalog tests; debug builds assert.
    pub(crate) fn from_static(raw: &'static str) -> Self {
        debug_assert!(Self::parse(raw).is_ok(), "invalid static module key {raw:?}");
        Self(raw.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_key_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '-')
}

impl core::fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ModuleKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModuleKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ModuleKey {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ModuleKey> for String {
    fn from(value: ModuleKey) -> Self {
        value.0
    }
}
