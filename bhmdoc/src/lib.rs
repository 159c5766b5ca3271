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

//! This crate provides the functionality for parsing and verifying mobile driving licenses
//! (mDLs) and other `mso_mdoc` Credentials in compliance with the [ISO/IEC 18013-5:2021][1] &
//! [ISO/IEC TS 18013-7:2024][2] standards, as presented over OpenID for [Verifiable
//! Presentations][3].
//!
//! [1]: <https://www.iso.org/standard/69084.html>
//! [2]: <https://www.iso.org/standard/82772.html>
//! [3]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! # Details
//!
//! The crate plugs into the engines of [`bh_credential_core`] with:
//!
//!   * [`MsoMdocParser`], revealing the issuer signed data elements of a credential together
//!     with its display and validity information,
//!   * [`MsoMdocVerifier`], verifying the issuer signature, the trust in the issuer certificate
//!     chain, the value digests, the validity window and the device signature.
//!
//! Both accept a `DeviceResponse` or a bare `IssuerSigned` structure, base64url encoded or as
//! raw _CBOR_ bytes.
//!
//! The low-level data model is exposed in [`models`] for advanced users wishing to inspect the
//! `mso_mdoc` structures directly.
//!
//! # Examples
//!
//! ```ignore
//! use bh_credential_core::{
//!     Context, CredentialVerifier, ParsingEngine, ReqwestHttpClient, VerifyOptions,
//! };
//! use bhmdoc::{MsoMdocParser, MsoMdocVerifier};
//!
//! let context = Context::default();
//! let vp_token = _; // base64url encoded `DeviceResponse`
//!
//! let mut parsing_engine = ParsingEngine::new();
//! parsing_engine.register(MsoMdocParser::new(ReqwestHttpClient::new(reqwest::Client::new())));
//! let parsed = parsing_engine.parse(&vp_token.into()).await?;
//!
//! let verifier = MsoMdocVerifier::from_context(&context)?;
//! let opts = VerifyOptions {
//!     expected_nonce: Some(nonce),
//!     expected_audience: Some(client_id),
//!     holder_nonce: Some(mdoc_generated_nonce),
//!     response_uri: Some(response_uri),
//! };
//! let outcome = verifier.verify(&vp_token.into(), &opts).await?;
//! ```

mod error;
pub mod models;
mod parser;
mod utils;
mod verifier;

pub use error::{MdocError, Result};
pub use models::data_retrieval::device_retrieval::issuer_auth::DeviceKey;
pub use parser::MsoMdocParser;
pub use verifier::MsoMdocVerifier;
