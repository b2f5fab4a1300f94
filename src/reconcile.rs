//! Attribute reconciliation
//!
//! Works out which accepted credential the wallet should present for each
//! requested attribute group and predicate, and the name the wallet shows
//! for that credential.

use serde::Serialize;

use crate::fixtures::{CredentialCollection, ProofRequest};

/// A requested attribute and the credential expected to supply it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSource {
    /// Credential name as the wallet displays it
    pub credential_name: String,
    pub attribute: String,
}

/// Map each attribute group, then each predicate, to its first holder
///
/// Credentials are scanned in acceptance order and the first credential
/// holding any requested name wins. Groups nobody holds are left out, so
/// the result never exceeds one pair per group and predicate.
pub fn reconcile(request: &ProofRequest, credentials: &CredentialCollection) -> Vec<AttributeSource> {
    let mut sources = Vec::new();

    for (group_id, group) in request.requested_attributes.iter() {
        let names = group.requested_names();
        match first_holder(credentials, &names) {
            Some(source) => sources.push(source),
            None => tracing::debug!(group = group_id, "No credential holds requested group"),
        }
    }

    for (predicate_id, predicate) in request.requested_predicates.iter() {
        match first_holder(credentials, &[predicate.name.as_str()]) {
            Some(source) => sources.push(source),
            None => tracing::debug!(predicate = predicate_id, "No credential holds predicate"),
        }
    }

    sources
}

fn first_holder(credentials: &CredentialCollection, names: &[&str]) -> Option<AttributeSource> {
    credentials.values().find_map(|credential| {
        names
            .iter()
            .find(|name| credential.has_attribute(name))
            .map(|name| AttributeSource {
                credential_name: display_name(&credential.schema_name),
                attribute: name.to_string(),
            })
    })
}

/// Wallet display name for a schema: `some_schema_name` -> `Some Schema Name`
///
/// Every letter that follows a non-letter is upper-cased and every other
/// letter lower-cased.
pub fn display_name(schema_name: &str) -> String {
    let mut out = String::with_capacity(schema_name.len());
    let mut after_letter = false;
    for c in schema_name.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if after_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            after_letter = true;
        } else {
            out.push(c);
            after_letter = false;
        }
    }
    out
}
