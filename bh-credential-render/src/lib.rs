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

//! This crate renders preview images of verifiable credentials.
//!
//! The [`CredentialRenderingService`] either fills an SVG template of the
//! credential type metadata with the credential claims, or renders a
//! built-in card template from a flat [`DisplayConfig`]. The result is always
//! a self-contained `data:image/svg+xml;utf8,` URI.
//!
//! Rendering failures are meant to be absorbed by the caller, which falls
//! back to the next display option or to no image at all.

mod display_config;
mod service;
mod template;

pub use display_config::*;
pub use service::*;
pub use template::{escape_xml, svg_data_uri};
