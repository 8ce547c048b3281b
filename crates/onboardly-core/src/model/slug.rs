// ── Slugs ──
//
// Every keyed lookup in the inventory goes through a slug. Display names
// are never compared directly: two names that canonicalize to the same
// slug address the same record.

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Canonical, URL-safe identifier derived from a display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Canonicalize a display name.
    ///
    /// Decomposes to NFKD and drops combining marks, so accented letters
    /// keep their base letter. Then lowercases ASCII letters, keeps ASCII
    /// alphanumerics and `_`, folds runs of whitespace and `-` into a single
    /// `-`, drops anything else still outside ASCII, and trims `-` / `_`
    /// from both ends.
    pub fn from_name(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut pending_dash = false;

        for c in name.nfkd().filter(|c| !is_combining_mark(*c)) {
            if c.is_ascii_alphanumeric() || c == '_' {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else if c == '-' || c.is_whitespace() {
                pending_dash = true;
            }
        }

        Self(out.trim_matches(|c| c == '-' || c == '_').to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Slug {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}
