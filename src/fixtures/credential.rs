//! Credential fixtures and the holder's accepted-credential collection

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::keyed::KeyedList;

/// A credential the issuer offers, as described by a fixture file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialFixture {
    pub schema_name: String,

    #[serde(default)]
    pub attributes: Vec<CredentialAttribute>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One credential attribute: a bare name, or a name with its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialAttribute {
    Named(String),
    Valued { name: String, value: String },
}

impl CredentialAttribute {
    pub fn name(&self) -> &str {
        match self {
            CredentialAttribute::Named(name) => name,
            CredentialAttribute::Valued { name, .. } => name,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            CredentialAttribute::Named(_) => None,
            CredentialAttribute::Valued { value, .. } => Some(value),
        }
    }
}

impl CredentialFixture {
    pub fn new<I, S>(schema_name: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schema_name: schema_name.to_string(),
            attributes: attributes
                .into_iter()
                .map(|a| CredentialAttribute::Named(a.into()))
                .collect(),
            extra: Map::new(),
        }
    }

    /// Whether the credential carries an attribute called `name`
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name() == name)
    }

    /// Value of an attribute, when the fixture records one
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name() == name)
            .and_then(CredentialAttribute::value)
    }
}

/// Credentials the holder has accepted so far, in acceptance order
pub type CredentialCollection = KeyedList<CredentialFixture>;
