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

//! This crate contains the format agnostic core of credential parsing and
//! verification.
//!
//! # Details
//!
//! * [`ParsingEngine`], [`VerifyingEngine`] and [`PublicKeyResolverEngine`] are
//!   ordered registries of format handlers implementing [`CredentialParser`],
//!   [`CredentialVerifier`] and [`PublicKeyResolver`] respectively.
//! * [`ParsedCredential`] is the canonical representation every parser
//!   produces.
//! * [`HttpClient`] is the contract of the injected HTTP client, with
//!   [`ReqwestHttpClient`] as its default implementation.
//! * [`Context`] and [`VerifyOptions`] configure parsing and verification.
//!
//! All public operations return a [`bherror::Result`] whose error is one of
//! the taxonomy enums of this crate.

// Re-export the `bh-jws-utils` crate
pub use bh_jws_utils;

mod context;
mod engine;
mod error;
mod http_client;
mod model;
#[cfg(any(feature = "test-utils", test))]
pub mod test_utils;

pub use context::*;
pub use engine::*;
pub use error::*;
pub use http_client::*;
pub use model::*;
