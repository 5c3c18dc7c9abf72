//! Normalized logical paths.
//!
//! A [`PathKey`] is the `/`-delimited key of an entry inside one owner's
//! namespace. It never has a leading or trailing separator, never contains
//! empty, `.` or `..` segments, and the empty key denotes the implicit
//! owner root. Since every physical path is derived from a `PathKey`, a
//! valid key can never point outside the owner's directory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// Longest segment, in bytes, that common filesystems accept as a name.
pub const MAX_SEGMENT_BYTES: usize = 255;

/// A validated, normalized logical path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathKey(String);

impl PathKey {
    /// The implicit owner root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Normalize and validate a raw, caller-supplied path.
    ///
    /// Backslashes become separators and leading/trailing separators are
    /// stripped. An input that is empty after stripping yields the root.
    pub fn normalize(raw: &str) -> AppResult<Self> {
        let unified = raw.replace('\\', "/");
        let trimmed = unified.trim_matches(SEPARATOR);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        for segment in trimmed.split(SEPARATOR) {
            validate_segment(segment, raw)?;
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Like [`normalize`](Self::normalize), but rejects the owner root.
    pub fn normalize_non_root(raw: &str) -> AppResult<Self> {
        let key = Self::normalize(raw)?;
        if key.is_root() {
            return Err(AppError::invalid_path(
                "the owner root cannot be the target of this operation",
            ));
        }
        Ok(key)
    }

    /// Whether this is the implicit owner root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the segments (nothing for the root).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Number of segments; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Final segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit(SEPARATOR).next()
    }

    /// The containing folder; top-level keys return the root, the root
    /// returns `None`.
    pub fn parent(&self) -> Option<PathKey> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Append a (possibly multi-segment) child path.
    pub fn join(&self, child: &str) -> AppResult<PathKey> {
        let child = Self::normalize(child)?;
        if child.is_root() {
            return Err(AppError::invalid_path("cannot join an empty child path"));
        }
        if self.is_root() {
            return Ok(child);
        }
        Ok(Self(format!("{}{}{}", self.0, SEPARATOR, child.0)))
    }

    /// Subtree membership: `self == root` or `self` starts with `root + "/"`.
    ///
    /// Every key is within the owner root.
    pub fn is_within(&self, root: &PathKey) -> bool {
        if root.is_root() || self.0 == root.0 {
            return true;
        }
        self.0.len() > root.0.len()
            && self.0.starts_with(&root.0)
            && self.0.as_bytes()[root.0.len()] == b'/'
    }

    /// The part of `self` below `root`, without a leading separator.
    ///
    /// Returns `Some("")` when `self == root` and `None` when `self` is not
    /// within `root`.
    pub fn relative_to(&self, root: &PathKey) -> Option<&str> {
        if !self.is_within(root) {
            return None;
        }
        if root.is_root() {
            return Some(&self.0);
        }
        if self.0.len() == root.0.len() {
            return Some("");
        }
        Some(&self.0[root.0.len() + 1..])
    }

    /// Replace the `old_prefix` segment span with `new_prefix`, keeping the
    /// remainder verbatim.
    pub fn rename(&self, old_prefix: &PathKey, new_prefix: &PathKey) -> AppResult<PathKey> {
        if old_prefix.is_root() || new_prefix.is_root() {
            return Err(AppError::invalid_path(
                "the owner root cannot be renamed or used as a rename target",
            ));
        }
        let Some(rest) = self.relative_to(old_prefix) else {
            return Err(AppError::invalid_path(format!(
                "'{}' is not within '{}'",
                self, old_prefix
            )));
        };
        if rest.is_empty() {
            return Ok(new_prefix.clone());
        }
        Ok(Self(format!("{}{}{}", new_prefix.0, SEPARATOR, rest)))
    }

    /// Every proper, non-root prefix, shallowest first.
    ///
    /// `a/b/c` yields `a`, `a/b`.
    pub fn ancestors(&self) -> Vec<PathKey> {
        let mut out = Vec::new();
        let mut end = 0;
        for segment in self.segments() {
            if end > 0 {
                end += 1;
            }
            end += segment.len();
            if end < self.0.len() {
                out.push(Self(self.0[..end].to_string()));
            }
        }
        out
    }
}

fn validate_segment(segment: &str, raw: &str) -> AppResult<()> {
    if segment.is_empty() {
        return Err(AppError::invalid_path(format!(
            "path '{raw}' contains an empty segment"
        )));
    }
    if segment == "." || segment == ".." {
        return Err(AppError::invalid_path(format!(
            "path '{raw}' contains a relative segment '{segment}'"
        )));
    }
    if segment.len() > MAX_SEGMENT_BYTES {
        return Err(AppError::invalid_path(format!(
            "path segment is {} bytes long; the limit is {MAX_SEGMENT_BYTES}",
            segment.len()
        )));
    }
    if segment.contains('\0') {
        return Err(AppError::invalid_path(format!(
            "path '{}' contains a NUL byte",
            raw.escape_default()
        )));
    }
    Ok(())
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PathKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for PathKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<PathKey> for String {
    fn from(key: PathKey) -> String {
        key.0
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::Type<sqlx::Sqlite> for PathKey {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

#[cfg(feature = "sqlx")]
impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for PathKey {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(feature = "sqlx")]
impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for PathKey {
    fn decode(
        value: <sqlx::Sqlite as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <String as sqlx::Decode<'r, sqlx::Sqlite>>::decode(value)?;
        Ok(Self::normalize(&raw)?)
    }
}
