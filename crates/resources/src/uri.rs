//! Resource identifiers exposed to clients.
//!
//! | identifier                  | meaning                                 |
//! |-----------------------------|-----------------------------------------|
//! | `skill://`                  | every known skill                       |
//! | `skill://{name}`            | one skill's SKILL.md                    |
//! | `skill://{name}/`           | one skill's directory contents          |
//! | `skill://{name}/{relative}` | one file inside a skill directory       |

use std::fmt;

use {
    serde::{Deserialize, Serialize},
    skillport_skills::parse::validate_name,
};

pub const SCHEME: &str = "skill://";

/// Opaque identifier string. Two identifiers are equal only when byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUri(String);

/// Parsed shape of a [`ResourceUri`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind<'a> {
    AllSkills,
    Manifest { skill: &'a str },
    Collection { skill: &'a str },
    File { skill: &'a str, relative: &'a str },
}

impl ResourceUri {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn all_skills() -> Self {
        Self(SCHEME.to_string())
    }

    pub fn manifest(skill: &str) -> Self {
        Self(format!("{SCHEME}{skill}"))
    }

    pub fn collection(skill: &str) -> Self {
        Self(format!("{SCHEME}{skill}/"))
    }

    pub fn file(skill: &str, relative: &str) -> Self {
        Self(format!("{SCHEME}{skill}/{relative}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the identifier. `None` means malformed, which resolves to nothing.
    pub fn kind(&self) -> Option<ResourceKind<'_>> {
        let rest = self.0.strip_prefix(SCHEME)?;
        if rest.is_empty() {
            return Some(ResourceKind::AllSkills);
        }

        let (skill, tail) = match rest.split_once('/') {
            Some((skill, tail)) => (skill, Some(tail)),
            None => (rest, None),
        };
        if !validate_name(skill) {
            return None;
        }

        Some(match tail {
            None => ResourceKind::Manifest { skill },
            Some("") => ResourceKind::Collection { skill },
            Some(relative) => ResourceKind::File { skill, relative },
        })
    }

    /// Name of the skill this identifier belongs to, if it names one.
    pub fn skill(&self) -> Option<&str> {
        match self.kind()? {
            ResourceKind::AllSkills => None,
            ResourceKind::Manifest { skill }
            | ResourceKind::Collection { skill }
            | ResourceKind::File { skill, .. } => Some(skill),
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceUri {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ResourceUri {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
