//! Decision record types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Agreement status of a decision as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Agreed")]
    Agreed,
    #[serde(rename = "Needs Clarification")]
    NeedsClarification,
    #[serde(rename = "Unresolved")]
    Unresolved,
}

impl Status {
    pub const ALL: [Status; 3] = [Self::Agreed, Self::NeedsClarification, Self::Unresolved];

    /// Inverse of [`Status::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Agreed => "Agreed",
            Self::NeedsClarification => "Needs Clarification",
            Self::Unresolved => "Unresolved",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One participant's stance on a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementValue {
    #[serde(rename = "Yes")]
    Yes,
    #[serde(rename = "Partial")]
    Partial,
    #[serde(rename = "No")]
    No,
    #[serde(rename = "Not Present")]
    NotPresent,
}

impl AgreementValue {
    pub const ALL: [AgreementValue; 4] = [Self::Yes, Self::Partial, Self::No, Self::NotPresent];

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == label)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::Partial => "Partial",
            Self::No => "No",
            Self::NotPresent => "Not Present",
        }
    }
}

impl fmt::Display for AgreementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Significance level, 1 (critical) through 5 (same page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Significance(u8);

impl Significance {
    pub const CRITICAL: Significance = Significance(1);
    pub const SAME_PAGE: Significance = Significance(5);

    pub fn new(level: u8) -> Option<Self> {
        (1..=5).contains(&level).then_some(Self(level))
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Critical",
            2 => "Extremely Important",
            3 => "Important",
            4 => "Moderate",
            _ => "Same Page",
        }
    }
}

impl TryFrom<i64> for Significance {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Significance::new)
            .ok_or_else(|| format!("significance must be between 1 and 5, got {}", value))
    }
}

impl From<Significance> for u8 {
    fn from(s: Significance) -> u8 {
        s.0
    }
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One extracted decision.
///
/// Field names follow the persisted JSON format shared by backend
/// responses and manifest cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub category: String,
    pub significance: Significance,
    pub status: Status,
    pub title: String,
    pub description: String,
    /// What was decided, or "No decision reached"
    #[serde(rename = "decision")]
    pub decision_text: String,
    /// Participant name → stance
    pub agreements: BTreeMap<String, AgreementValue>,
    #[serde(default)]
    pub notes: String,
    /// `YYYY-MM-DD` or empty
    #[serde(default)]
    pub meeting_date: String,
    /// Source transcript file name or empty
    #[serde(default)]
    pub meeting_reference: String,
}

impl Decision {
    /// Minimal decision for tests and builders; agreements start empty.
    pub fn new(
        category: impl Into<String>,
        significance: Significance,
        status: Status,
        title: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            significance,
            status,
            title: title.into(),
            description: String::new(),
            decision_text: String::new(),
            agreements: BTreeMap::new(),
            notes: String::new(),
            meeting_date: String::new(),
            meeting_reference: String::new(),
        }
    }

    pub fn with_agreement(mut self, name: impl Into<String>, value: AgreementValue) -> Self {
        self.agreements.insert(name.into(), value);
        self
    }

    /// Serialize to the JSON shape stored in the manifest.
    pub fn to_value(&self) -> serde_json::Value {
        // all fields are plain strings, integers and string maps
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
