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

//! This crate provides functions and types for working with an ordered array of X.509 certificates
//! (`x5chain`) as defined in [RFC 9360][1], as they appear in credentials presented to a verifier.
//!
//! [1]: <https://www.rfc-editor.org/rfc/rfc9360.html#section-2-5.4.1>
//!
//! # Details
//!
//! The primary API this crate offers is the [`X5Chain`] struct, together with the
//! [`X509Trust`] collection of trust anchors it is validated against.
//!
//! SD-JWT VC credentials carry the chain in the `x5c` JOSE header as a list of base64 (**not**
//! base64url) encoded DER certificates, while `mso_mdoc` credentials carry it in the unprotected
//! COSE header as raw DER bytes. Both are covered by [`X5Chain::from_base64_ders`] and
//! [`X5Chain::from_raw_bytes`] respectively.
//!
//! # Examples
//!
//! ```ignore
//! let x5chain = bhx5chain::X5Chain::from_base64_ders(&jwt_header_x5c)
//!     .expect("valid x5chain");
//!
//! let trust = bhx5chain::X509Trust::from_base64_ders(&trusted_certificates)
//!     .expect("valid trust anchors");
//!
//! x5chain
//!     .verify_against_trusted_roots(&trust)
//!     .expect("trusted x5chain");
//!
//! println!("issued by {}", x5chain.leaf_subject().expect("printable subject"));
//!```

mod error;
#[cfg(any(feature = "test-utils", test))]
pub mod test_utils;
mod x5chain;

pub use error::*;
pub use x5chain::*;
