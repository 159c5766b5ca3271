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

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! This crate provides functions and types for verifying [JSON Web Signatures (JWS)][1] found in
//! verifiable credentials, such as the Issuer-signed JWT of an SD-JWT VC or its Key Binding JWT.
//!
//! [1]: https://datatracker.ietf.org/doc/html/rfc7515
//!
//! # Details
//!
//! The primary way to use this library is via the [`JwtVerifier`] trait, which provides
//! functionality for verifying signed JWTs. A default [`openssl`] backed implementation is
//! available through [`Es256Verifier`], [`Es384Verifier`] and [`Es512Verifier`], under the
//! default feature `openssl`. The [`ecdsa_verifier`] function selects the implementation
//! matching the `alg` header of a token.
//!
//! A custom implementation must implement the [`SignatureVerifier`] trait; the [`JwtVerifier`]
//! trait is then implemented for it automatically.
//!
//! The [`base64_url_encode`] and [`base64_url_decode`] functions implement the unpadded
//! `base64url` encoding shared by JWS, SD-JWT disclosures and `mso_mdoc` credentials.
//!
//! # Examples
//!
//! ## Verify a JWT
//!
//! ```ignore
//! use bh_jws_utils::{decode_jws_unverified, ecdsa_verifier, verify_jws, SigningAlgorithm};
//!
//! let (header, _claims) = decode_jws_unverified(jwt)?;
//! let alg = SigningAlgorithm::try_from(header.alg)?;
//!
//! let (_header, claims) = verify_jws(jwt, ecdsa_verifier(alg), &issuer_public_jwk)?;
//! ```

#[cfg(feature = "openssl")]
mod openssl_impl;

mod error;
mod header;
mod jwk;
#[cfg(any(feature = "test-utils", test))]
pub mod test_utils;
mod traits;
mod utils;

pub use error::*;
pub use header::*;
pub use jwk::*;
// Re-export the `jwt` crate
pub use jwt;
#[cfg(feature = "openssl")]
pub use openssl_impl::*;
pub use traits::*;
pub use utils::*;

/// Helper macro with the same syntax as [`serde_json::json`] specialized for
/// constructing JSON objects.
///
/// It will construct a more specific type ([`serde_json::Map<String,Value>`])
/// than just [`serde_json::Value`] when constructing an object, and panic if
/// the syntax is valid JSON but not an object.
#[macro_export]
macro_rules! json_object {
    ($stuff:tt) => {
        match ::serde_json::json!($stuff) {
            ::serde_json::Value::Object(o) => o,
            _ => unreachable!("JSON literal wasn't an object"),
        }
    };
}
