// Copyright (C) 2020-2025  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! [Subresource Integrity] of fetched documents.
//!
//! [Subresource Integrity]: https://www.w3.org/TR/SRI/

use base64::{engine::general_purpose::STANDARD, Engine as _};
use openssl::{
    error::ErrorStack,
    hash::{hash, MessageDigest},
};

/// Hash algorithms allowed in integrity metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SriAlgorithm {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl SriAlgorithm {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    fn digest(self) -> MessageDigest {
        match self {
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
        }
    }
}

/// Computes the integrity metadata `<alg>-<base64 digest>` of `data`.
pub fn integrity(data: &[u8], alg: SriAlgorithm) -> Result<String, ErrorStack> {
    let digest = hash(alg.digest(), data)?;

    Ok(format!("{}-{}", alg.prefix(), STANDARD.encode(digest)))
}

/// Checks `data` against the integrity metadata.
///
/// The metadata is a whitespace separated list of `<alg>-<base64 digest>`
/// hashes, optionally followed by `?<options>` which are ignored. The check
/// passes when any hash with a supported algorithm matches, and fails when
/// there is none.
pub fn verify_integrity(data: &[u8], metadata: &str) -> bool {
    metadata
        .split_ascii_whitespace()
        .filter_map(|token| {
            let (prefix, value) = token.split_once('-')?;
            let alg = SriAlgorithm::from_prefix(prefix)?;
            let value = value.split_once('?').map_or(value, |(digest, _)| digest);
            Some((alg, value))
        })
        .any(|(alg, expected)| {
            let Ok(expected) = STANDARD.decode(expected) else {
                return false;
            };

            hash(alg.digest(), data).is_ok_and(|digest| *digest == *expected)
        })
}
