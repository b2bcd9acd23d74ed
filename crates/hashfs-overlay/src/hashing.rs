//! Name hashing for storage keys.
//!
//! One algorithm is fixed per overlay instance from configuration and
//! applied uniformly: directory keys hash the full logical path, file keys
//! hash only the leaf name.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;

use crate::error::FsError;

/// The digest used to map names to storage keys.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgo {
    /// Keys are the names themselves. Useful for debugging; files in the
    /// root directory are unsupported under this algorithm because the
    /// root's file index key collides with the root index object.
    #[serde(alias = "none")]
    Identity,
    /// MD5, hex encoded.
    #[default]
    Md5,
    /// SHA-1, hex encoded.
    Sha1,
    /// SHA-256, hex encoded.
    Sha256,
}

impl HashAlgo {
    /// Map a name to its storage key.
    pub fn hash(&self, name: &str) -> String {
        match self {
            HashAlgo::Identity => name.to_string(),
            HashAlgo::Md5 => hex::encode(Md5::digest(name.as_bytes())),
            HashAlgo::Sha1 => hex::encode(Sha1::digest(name.as_bytes())),
            HashAlgo::Sha256 => hex::encode(Sha256::digest(name.as_bytes())),
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgo::Identity => "identity",
            HashAlgo::Md5 => "md5",
            HashAlgo::Sha1 => "sha1",
            HashAlgo::Sha256 => "sha256",
        };
        f.write_str(name)
    }
}

impl FromStr for HashAlgo {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" | "none" => Ok(HashAlgo::Identity),
            "md5" => Ok(HashAlgo::Md5),
            "sha1" => Ok(HashAlgo::Sha1),
            "sha256" => Ok(HashAlgo::Sha256),
            other => Err(FsError::Config(format!("unknown hash algorithm {other:?}"))),
        }
    }
}
