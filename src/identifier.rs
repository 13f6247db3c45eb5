//! Package identifier parsing.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A package reference in the form `organization/name[:version]`.
///
/// An empty version means the version is not resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    organization: String,
    name: String,
    version: String,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.')
}

fn is_valid(part: &str, allowed: fn(char) -> bool) -> bool {
    !part.is_empty() && part.chars().all(allowed)
}

impl Identifier {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidIdentifierFormat {
            input: text.to_string(),
        };

        let (package, version) = match text.split_once(':') {
            Some((package, version)) => (package, version),
            None => (text, ""),
        };
        if text.contains(':') && !is_valid(version, is_version_char) {
            return Err(invalid());
        }

        let (organization, name) = package.split_once('/').ok_or_else(invalid)?;
        if !is_valid(organization, is_name_char) || !is_valid(name, is_name_char) {
            return Err(invalid());
        }

        Ok(Self {
            organization: organization.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether a version was given.
    pub fn has_version(&self) -> bool {
        !self.version.trim().is_empty()
    }

    /// The `organization-name` key used as the install directory name.
    pub fn composite_key(&self) -> String {
        format!("{}-{}", self.organization, self.name)
    }

    /// The identifier without its version, `organization/name`.
    pub fn package(&self) -> String {
        format!("{}/{}", self.organization, self.name)
    }

    pub fn with_name(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_version(&self, version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..self.clone()
        }
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}/{}", self.organization, self.name)
        } else {
            write!(f, "{}/{}:{}", self.organization, self.name, self.version)
        }
    }
}
