use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category every catalog must define; used when nothing more specific
/// matches the customer's question.
pub const DEFAULT_CATEGORY: &str = "general";

/// Built-in catalog used when no policy file has been provisioned yet.
pub const STARTER_POLICIES_JSON: &str = r#"{
  "general": {
    "window": "30 days from the delivery date",
    "condition": "Items must be unused and in their original packaging",
    "refund_type": "Refund to the original payment method within 5-10 business days",
    "process": "Start a return from your account page, or contact support with your order ID",
    "exceptions": ["final sale items", "gift cards", "personalized products"]
  },
  "electronics": {
    "window": "14 days from the delivery date",
    "condition": "Devices must be unopened or in like-new condition with all accessories",
    "refund_type": "Refund to the original payment method after inspection",
    "process": "Request a prepaid shipping label from support before sending anything back",
    "exceptions": ["opened software", "activated devices"]
  },
  "clothing": {
    "window": "45 days from the delivery date",
    "condition": "Unworn, unwashed, with all tags attached",
    "refund_type": "Refund or exchange",
    "process": "Use the returns portal linked in your shipping confirmation email"
  },
  "gift cards": "Gift cards are non-refundable and cannot be exchanged for cash."
}"#;

#[derive(Debug, Error)]
pub enum PolicyCatalogError {
    #[error("failed to read policy file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse policy catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("policy catalog must define a '{DEFAULT_CATEGORY}' entry")]
    MissingDefault,
}

/// One return policy, either free text or a structured record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyEntry {
    Text(String),
    Detailed(PolicyDetail),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDetail {
    pub window: Option<String>,
    pub condition: Option<String>,
    pub refund_type: Option<String>,
    pub process: Option<String>,
    pub exceptions: Option<Exceptions>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exceptions {
    One(String),
    Many(Vec<String>),
}

impl PolicyEntry {
    pub fn render(&self) -> String {
        match self {
            PolicyEntry::Text(text) => text.clone(),
            PolicyEntry::Detailed(detail) => detail.render(),
        }
    }
}

impl PolicyDetail {
    fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(window) = &self.window {
            parts.push(format!("Return Window: {window}."));
        }
        if let Some(condition) = &self.condition {
            parts.push(format!("Condition: {condition}"));
        }
        if let Some(refund_type) = &self.refund_type {
            parts.push(format!("Refunds: {refund_type}"));
        }
        if let Some(process) = &self.process {
            parts.push(format!("Process: {process}"));
        }
        match &self.exceptions {
            Some(Exceptions::Many(items)) if !items.is_empty() => {
                parts.push(format!("Exceptions include: {}", items.join(", ")));
            }
            Some(Exceptions::One(text)) if !text.is_empty() => {
                parts.push(format!("Exceptions: {text}"));
            }
            _ => {}
        }
        parts.join("\n")
    }
}

/// The full set of return policies keyed by lowercase category name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyBook {
    entries: BTreeMap<String, PolicyEntry>,
}

impl PolicyBook {
    pub fn from_json(raw: &str) -> Result<Self, PolicyCatalogError> {
        let parsed: BTreeMap<String, PolicyEntry> = serde_json::from_str(raw)?;
        let entries: BTreeMap<String, PolicyEntry> = parsed
            .into_iter()
            .map(|(category, entry)| (category.to_lowercase(), entry))
            .collect();
        if !entries.contains_key(DEFAULT_CATEGORY) {
            return Err(PolicyCatalogError::MissingDefault);
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, PolicyCatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| PolicyCatalogError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_json(&raw)
    }

    pub fn starter() -> Result<Self, PolicyCatalogError> {
        Self::from_json(STARTER_POLICIES_JSON)
    }

    pub fn categories(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Rendered policy for `category`, falling back to the default entry.
    /// Returns `None` when even the fallback renders to nothing.
    pub fn policy_text(&self, category: Option<&str>) -> Option<String> {
        let entry = category
            .map(str::to_lowercase)
            .and_then(|key| self.entries.get(&key))
            .or_else(|| self.entries.get(DEFAULT_CATEGORY))?;
        let rendered = entry.render();
        if rendered.is_empty() {
            None
        } else {
            Some(rendered)
        }
    }
}
