use serde::{Deserialize, Serialize};
use std::fmt;

/// Possible variants to identify a substance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierOption {
    Cas,
    Name,
    Formula,
}

impl fmt::Display for IdentifierOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            IdentifierOption::Cas => "CAS",
            IdentifierOption::Name => "name",
            IdentifierOption::Formula => "formula",
        };
        write!(f, "{str}")
    }
}

/// A collection of identifiers for a substance.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifier {
    /// CAS number
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cas: Option<String>,
    /// Commonly used english name
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Chemical formula
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl Identifier {
    pub fn new(cas: Option<&str>, name: Option<&str>, formula: Option<&str>) -> Self {
        Self {
            cas: cas.map(Into::into),
            name: name.map(Into::into),
            formula: formula.map(Into::into),
        }
    }

    pub fn as_str(&self, option: IdentifierOption) -> Option<&str> {
        match option {
            IdentifierOption::Cas => self.cas.as_deref(),
            IdentifierOption::Name => self.name.as_deref(),
            IdentifierOption::Formula => self.formula.as_deref(),
        }
    }

    // name first, used for component labels in reports
    pub fn as_readable_str(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.formula.as_deref())
            .or(self.cas.as_deref())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = [
            self.cas.as_ref().map(|n| format!("cas={n}")),
            self.name.as_ref().map(|n| format!("name={n}")),
            self.formula.as_ref().map(|n| format!("formula={n}")),
        ]
        .into_iter()
        .flatten()
        .collect();
        write!(f, "Identifier({})", ids.join(", "))
    }
}
