//! Assertions against what the wallet shows
//!
//! Two styles: structured comparison of an expectation row with the
//! details scraped off the proof request screen, and raw presence checks
//! against the full page source.

use crate::common::{Error, Result};
use crate::pages::ProofRequestDetails;
use crate::reconcile::AttributeSource;
use crate::steps::DataTable;

/// Expected proof request details for one verifier implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub verifier_agent_type: String,
    pub who: String,
    pub attributes: Vec<String>,
    pub values: Vec<String>,
}

/// Pick the expectation row for the verifier type in use
///
/// Tables carry one row per verifier implementation. The first row whose
/// `verifier_agent_type` equals `agent_type` exactly is used.
pub fn expected_for_agent(table: &DataTable, agent_type: &str) -> Result<Expectation> {
    for row in table.rows() {
        if row.get("verifier_agent_type")? != agent_type {
            continue;
        }
        return Ok(Expectation {
            verifier_agent_type: agent_type.to_string(),
            who: row.get("who")?.to_string(),
            attributes: split_list(row.get("attributes")?),
            values: split_list(row.get("values")?),
        });
    }
    Err(Error::NoExpectationRow {
        agent_type: agent_type.to_string(),
    })
}

fn split_list(cell: &str) -> Vec<String> {
    cell.split(';').map(str::to_string).collect()
}

/// The screen may show a subset of what is expected, never anything else
pub fn assert_proof_request_details(
    expected: &Expectation,
    actual: &ProofRequestDetails,
) -> Result<()> {
    if !actual.who.contains(&expected.who) {
        return Err(Error::assertion(format!(
            "Proof request is from '{}', expected '{}'",
            actual.who, expected.who
        )));
    }
    if let Some(extra) = actual
        .attributes
        .iter()
        .find(|a| !expected.attributes.contains(a))
    {
        return Err(Error::assertion(format!(
            "Unexpected attribute '{}' on proof request, expected one of {:?}",
            extra, expected.attributes
        )));
    }
    if let Some(extra) = actual.values.iter().find(|v| !expected.values.contains(v)) {
        return Err(Error::assertion(format!(
            "Unexpected value '{}' on proof request, expected one of {:?}",
            extra, expected.values
        )));
    }
    Ok(())
}

/// Every credential name and attribute must appear in the page source
pub fn assert_presence(sources: &[AttributeSource], page_source: &str) -> Result<()> {
    for source in sources {
        for text in [&source.credential_name, &source.attribute] {
            if !page_source.contains(text.as_str()) {
                return Err(Error::assertion(format!(
                    "'{}' is not on the proof request screen",
                    text
                )));
            }
        }
    }
    Ok(())
}
