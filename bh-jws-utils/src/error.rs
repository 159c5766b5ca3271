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

/// Error in JWK, JWS or `base64url` format
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum FormatError {
    /// Error that occurs when JWK parsing failed
    #[strum(to_string = "JWK parsing failed: {0}")]
    JwkParsingFailed(String),
    /// Error that occurs when a compact JWS is malformed
    #[strum(to_string = "Invalid JWS: {0}")]
    InvalidJws(String),
    /// Error that occurs when the unpadded length of a `base64url` string
    /// cannot be produced by any byte sequence
    #[strum(to_string = "Invalid base64url length: {0}")]
    InvalidBase64Length(usize),
    /// Error that occurs when a `base64url` string contains invalid symbols
    #[strum(to_string = "Invalid base64url encoding")]
    InvalidBase64,
}

impl bherror::BhError for FormatError {}

/// Error in JWS signature
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum SignatureError {
    /// Error that occurs when the signing algorithm is invalid
    #[strum(to_string = "Invalid signing algorithm {0}")]
    InvalidSigningAlgorithm(String),
    /// Error that occurs when the signature does not verify
    #[strum(to_string = "Invalid signature")]
    InvalidSignature,
}

impl bherror::BhError for SignatureError {}

/// Cryptographic error
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum CryptoError {
    /// Error that occurs when the cryptographic backend
    /// unexpectedly failed
    #[strum(to_string = "Crypto backend failed")]
    CryptoBackend,
    /// Error that occurs when the x5chain is invalid
    #[strum(to_string = "Invalid x5chain")]
    InvalidX5Chain,
    /// Error that occurs when the key type or curve is unsupported
    #[strum(to_string = "Unsupported: {0}")]
    Unsupported(String),
}

impl bherror::BhError for CryptoError {}
