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

//! This crate parses and verifies SD-JWT Verifiable Credentials.
//!
//! It implements the holder-facing and verifier-facing parts of the IETF
//! drafts [Selective Disclosure for JWTs (SD-JWT)][1] &
//! [SD-JWT-based Verifiable Credentials (SD-JWT VC)][2].
//!
//! [1]: <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt>
//! [2]: <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-sd-jwt-vc>
//!
//! # Details
//!
//! The main components of this crate are the following.
//!
//! * [`SdJwtVcParser`] -- Reveals the disclosed claims and resolves display
//!   information from the type and issuer metadata.
//! * [`SdJwtVcVerifier`] -- Validates the issuer signature, the validity
//!   window, the disclosures, and the Key Binding JWT.
//! * [`lookup`] -- Provides different methods of retrieving an issuer’s
//!   public key.
//!
//! The parser and the verifier are meant to be registered with the
//! [`ParsingEngine`](bh_credential_core::ParsingEngine) and the
//! [`VerifyingEngine`](bh_credential_core::VerifyingEngine).
//!
//! The digests of the disclosures are computed with the algorithm bound to
//! the `alg` of the Issuer-signed JWT: `ES256` with `sha-256` and `ES512`
//! with `sha-512`. The `_sd_alg` claim is not consulted.

// Re-export the `bh-jws-utils` crate
pub use bh_jws_utils;
pub use bh_jws_utils::JsonObject;
pub use disclosure::{Digest, Disclosure, DisclosureData, Salt};
pub use error::{DecodingError, FormatError, Result};
pub use hasher::HashingAlgorithm;
pub use parser::SdJwtVcParser;
pub use sd_jwt::SdJwt;
pub use verifier::SdJwtVcVerifier;

mod decoder;
mod disclosure;
mod error;
mod hasher;
mod key_binding;
mod parser;
mod sd_jwt;
#[cfg(test)]
mod test_utils;
mod utils;
mod verifier;

pub mod lookup;
