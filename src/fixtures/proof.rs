//! Proof request documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::interval::NonRevokedInterval;
use super::keyed::KeyedList;

/// A proof request as sent to the verifier
///
/// Fields the runner does not interpret are kept in `extra` so the
/// document reaches the verifier unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProofRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub requested_attributes: KeyedList<AttributeGroup>,

    #[serde(default)]
    pub requested_predicates: KeyedList<RequestedPredicate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One requested attribute group
///
/// Either a single `name` or a list of `names` revealed together from one
/// credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl AttributeGroup {
    /// Requested attribute names in document order
    pub fn requested_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        if let Some(name) = &self.name {
            if !names.contains(&name.as_str()) {
                names.insert(0, name);
            }
        }
        names
    }
}

/// One requested predicate, e.g. `age >= 19`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedPredicate {
    pub name: String,

    #[serde(default = "default_p_type")]
    pub p_type: String,

    #[serde(default)]
    pub p_value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Value>,
}

fn default_p_type() -> String {
    ">=".to_string()
}

impl ProofRequest {
    /// Copy of this request carrying a non-revocation interval
    pub fn with_non_revoked(&self, interval: NonRevokedInterval) -> Self {
        let mut request = self.clone();
        request.non_revoked = Some(interval);
        request
    }

    /// Every requested attribute and predicate name, attributes first
    pub fn all_requested_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .requested_attributes
            .values()
            .flat_map(AttributeGroup::requested_names)
            .collect();
        names.extend(self.requested_predicates.values().map(|p| p.name.as_str()));
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CITIZENSHIP: &str = r#"{
        "name": "citizenship",
        "version": "1.0",
        "requested_attributes": {
            "g1": {"names": ["given_name", "family_name"], "restrictions": [{"schema_name": "permanent_resident"}]},
            "a0": {"name": "photo"}
        },
        "requested_predicates": {
            "p1": {"name": "age", "p_type": ">=", "p_value": 19}
        },
        "nonce": "1234"
    }"#;

    #[test]
    fn test_parse_keeps_unknown_fields_and_order() {
        let request: ProofRequest = serde_json::from_str(CITIZENSHIP).unwrap();
        let groups: Vec<&str> = request.requested_attributes.iter().map(|(k, _)| k).collect();
        assert_eq!(groups, ["g1", "a0"]);
        assert_eq!(request.extra.get("nonce"), Some(&Value::from("1234")));

        let out = serde_json::to_value(&request).unwrap();
        assert_eq!(out["nonce"], "1234");
        assert!(out.get("non_revoked").is_none());
    }

    #[test]
    fn test_requested_names_covers_name_and_names() {
        let request: ProofRequest = serde_json::from_str(CITIZENSHIP).unwrap();
        assert_eq!(
            request.all_requested_names(),
            ["given_name", "family_name", "photo", "age"]
        );
    }

    #[test]
    fn test_with_non_revoked_leaves_original_untouched() {
        let request: ProofRequest = serde_json::from_str(CITIZENSHIP).unwrap();
        let stamped = request.with_non_revoked(NonRevokedInterval { from: 1, to: 2 });
        assert!(request.non_revoked.is_none());
        assert_eq!(
            serde_json::to_value(&stamped).unwrap()["non_revoked"],
            serde_json::json!({"from": 1, "to": 2})
        );
    }
}
