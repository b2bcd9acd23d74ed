//! Configuration surface for an overlay instance.

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::hashing::HashAlgo;

/// Configuration for a [`crate::HashFs`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Identifier of the backing store to wrap. Must not reference the
    /// overlay instance itself.
    pub remote: String,

    /// Digest used for directory and file keys.
    #[serde(default)]
    pub hash_algo: HashAlgo,
}

impl Config {
    /// Config for `remote` with the default algorithm (md5).
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            hash_algo: HashAlgo::default(),
        }
    }

    /// Config for `remote` with an explicit algorithm.
    pub fn with_algo(remote: impl Into<String>, hash_algo: HashAlgo) -> Self {
        Self {
            remote: remote.into(),
            hash_algo,
        }
    }

    /// Validate against the name this overlay instance is registered under.
    pub fn validate(&self, instance_name: &str) -> FsResult<()> {
        if self.remote.is_empty() {
            return Err(FsError::Config("remote is required".to_string()));
        }
        if self.remote == instance_name
            || self.remote.starts_with(&format!("{instance_name}:"))
        {
            return Err(FsError::Config(
                "can't point remote at itself - check the value of the remote setting"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
