//! Fixture store
//!
//! Proof requests and credential offers live as JSON documents in a data
//! directory, keyed by lower-cased name: `citizenship` resolves to
//! `<data_dir>/citizenship.json`. A missing file and a file that does not
//! parse are distinct, hard failures.

mod credential;
mod interval;
mod keyed;
mod proof;

pub use credential::{CredentialAttribute, CredentialCollection, CredentialFixture};
pub use interval::NonRevokedInterval;
pub use keyed::KeyedList;
pub use proof::{AttributeGroup, ProofRequest, RequestedPredicate};

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::common::{Error, Result};

/// Loads named JSON fixtures from a directory
#[derive(Debug, Clone)]
pub struct FixtureStore {
    data_dir: PathBuf,
}

impl FixtureStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path a fixture name resolves to
    pub fn path_for(&self, name: &str) -> PathBuf {
        let name = name.trim().to_lowercase();
        let stem = name.strip_suffix(".json").unwrap_or(&name);
        self.data_dir.join(format!("{stem}.json"))
    }

    /// Load a proof request by name
    pub fn proof_request(&self, name: &str) -> Result<ProofRequest> {
        self.load(name)
    }

    /// Load a proof request and stamp it with a non-revocation interval
    pub fn proof_request_with_interval(
        &self,
        name: &str,
        interval: Option<&str>,
    ) -> Result<ProofRequest> {
        let request = self.proof_request(name)?;
        match interval {
            Some(descriptor) => {
                let interval = NonRevokedInterval::from_descriptor(descriptor)?;
                tracing::debug!(proof = name, ?interval, "Adding non-revocation interval");
                Ok(request.with_non_revoked(interval))
            }
            None => Ok(request),
        }
    }

    /// Load a credential offer fixture by name
    pub fn credential(&self, name: &str) -> Result<CredentialFixture> {
        self.load(name)
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path_for(name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FixtureMissing {
                    path: path.display().to_string(),
                }
            } else {
                Error::fixture_malformed(&path, e)
            }
        })?;

        tracing::debug!(path = %path.display(), "Loaded fixture");
        serde_json::from_str(&content).map_err(|e| Error::fixture_malformed(&path, e))
    }
}
