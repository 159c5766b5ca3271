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

use bh_jws_utils::jwt::AlgorithmType;
use bherror::Error;

use crate::{utils::base64_url_digest, FormatError, Result};

/// The hash algorithm identifier for `SHA-256` as specified in the
/// "*Hash Name String*" column of the *IANA* [Named Information Hash Algorithm
/// Registry].
///
/// [Named Information Hash Algorithm Registry]: https://www.iana.org/assignments/named-information/named-information.xhtml
pub(crate) const SHA_256_ALG_NAME: &str = "sha-256";

/// The hash algorithm identifier for `SHA-512`, see [`SHA_256_ALG_NAME`].
pub(crate) const SHA_512_ALG_NAME: &str = "sha-512";

/// An identifier of the algorithm used for hashing the disclosures.
///
/// The algorithm is bound to the `alg` of the Issuer-signed JWT:
/// `ES256` credentials use `SHA-256` and `ES512` credentials use `SHA-512`.
/// The binding is only used for the disclosure digests, never for the
/// signature itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashingAlgorithm {
    /// SHA-256 algorithm for hashing.
    Sha256,
    /// SHA-512 algorithm for hashing.
    Sha512,
}

impl HashingAlgorithm {
    /// Returns the disclosure hashing algorithm bound to the signing algorithm
    /// of the Issuer-signed JWT.
    pub fn from_signing_algorithm(alg: AlgorithmType) -> Result<Self, FormatError> {
        match alg {
            AlgorithmType::Es256 => Ok(Self::Sha256),
            AlgorithmType::Es512 => Ok(Self::Sha512),
            other => Err(Error::root(FormatError::UnsupportedAlgorithm(format!(
                "{other:?}"
            )))),
        }
    }

    /// Returns the string value of the algorithm, formatted as specified in the
    /// *IANA* [Named Information Hash Algorithm Registry].
    ///
    /// [Named Information Hash Algorithm Registry]: https://www.iana.org/assignments/named-information/named-information.xhtml
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => SHA_256_ALG_NAME,
            Self::Sha512 => SHA_512_ALG_NAME,
        }
    }

    /// Computes the hash digest of the given `input`.
    pub fn digest(&self, input: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => openssl::sha::sha256(input).to_vec(),
            Self::Sha512 => openssl::sha::sha512(input).to_vec(),
        }
    }

    /// Computes the `base64url`-encoded hash digest of the given `input`.
    pub fn base64_url_digest(&self, input: &[u8]) -> String {
        base64_url_digest(self.digest(input))
    }
}

impl std::fmt::Display for HashingAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
