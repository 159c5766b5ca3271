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

//! This crate resolves [SD-JWT VC Type Metadata][1].
//!
//! [`fetch_and_merge_metadata`] fetches a `vct` document together with the
//! documents it `extends`, checks the [Subresource Integrity][2] of every one
//! of them and merges them into one effective document with [`deep_merge`].
//! [`resolve_issuer_metadata`] fetches the JWT VC Issuer Metadata of a
//! credential issuer, and the [`display`] module selects display information
//! from the resolved documents.
//!
//! Failures are reported as [`MetadataErrorCode`]s, none of which should be
//! fatal to parsing a credential.
//!
//! [1]: <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-sd-jwt-vc#name-sd-jwt-vc-type-metadata>
//! [2]: <https://www.w3.org/TR/SRI/>

pub use bh_credential_core::MetadataErrorCode;

pub mod display;
mod issuer;
mod merge;
mod resolver;
mod sri;

pub use issuer::*;
pub use merge::deep_merge;
pub use resolver::{fetch_and_merge_metadata, MAX_EXTENDS_DEPTH};
pub use sri::*;
