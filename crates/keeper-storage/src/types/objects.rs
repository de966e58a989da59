//! Object-store keys.

use std::fmt;
use uuid::Uuid;

use super::UserId;

/// Location of a Binary payload in the object store: `<owner>/<uuid>/<file name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Fresh key for a new upload. Only the last path component of `file_name` is kept.
    pub fn for_upload(owner: &UserId, file_name: &str) -> Self {
        Self(format!(
            "{}/{}/{}",
            owner.0,
            Uuid::now_v7(),
            base_name(file_name)
        ))
    }

    /// Parse a stored location. Rejects anything that could escape the store root.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.starts_with('/') || raw.contains('\\') {
            return None;
        }
        if raw
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..")
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// Same directory, different file name. Used when a Binary record is renamed.
    pub fn with_file_name(&self, owner: &UserId, file_name: &str) -> Self {
        match self.0.rsplit_once('/') {
            Some((dir, _)) if dir.starts_with(&format!("{}/", owner.0)) => {
                Self(format!("{dir}/{}", base_name(file_name)))
            }
            _ => Self::for_upload(owner, file_name),
        }
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty() && *part != "." && *part != "..")
        .unwrap_or("blob")
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
