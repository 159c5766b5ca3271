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

//! This crate provides utilities for manipulating the path of URIs and for deriving the
//! `.well-known` metadata locations of credential issuers.
//!
//! Path manipulation is implemented with the [`UriPathExtensions`] trait for [`reqwest::Url`].
//!
//! # Example
//!
//! ```rust
//! use bh_uri_utils::UriPathExtensions;
//! use reqwest::Url;
//!
//! let url = Url::parse("https://example.com/path").unwrap();
//! let updated_url = url.add_path_suffix("/suffix").unwrap();
//! assert_eq!(updated_url.as_str(), "https://example.com/path/suffix");
//!
//! let metadata = bh_uri_utils::jwt_vc_issuer_metadata_url("https://example.com/tenant").unwrap();
//! assert_eq!(metadata.as_str(), "https://example.com/.well-known/jwt-vc-issuer");
//! ```
//!
//! # Notes
//!
//! Naive string concatenation and [`reqwest::Url::join`] both have well-documented but
//! unintuitive behaviours that lead to bugs:
//!
//! - `http://localhost:3002/ + /example` resulted in `http://localhost:3002//example`.
//!
//! - `http://localhost:3002/protocol/oid4vci/issuer + /.well-known/openid-credential-issuer`
//!   resulted in `http://localhost:3002/.well-known/openid-credential-issuer`.
//!
//! This crate standardizes such cases.

use bherror::{traits::ForeignError as _, Result};
use reqwest::Url;

/// Path of the OpenID4VCI Credential Issuer metadata, appended to the issuer identifier.
pub const CREDENTIAL_ISSUER_WELL_KNOWN: &str = "/.well-known/openid-credential-issuer";

/// Path of the SD-JWT VC issuer metadata, appended to the origin of the issuer identifier.
pub const JWT_VC_ISSUER_WELL_KNOWN: &str = "/.well-known/jwt-vc-issuer";

/// Error type returned by this crate.
#[derive(Debug, strum_macros::Display, PartialEq, Clone)]
pub enum Error {
    /// Error when we fail to parse the URI.
    #[strum(to_string = "URI parsing failed: {0}")]
    UriParsing(String),
    /// Error when we've received a URI path that doesn't start with a `/`.
    #[strum(to_string = "Path is not valid: {0}")]
    InvalidPath(String),
    /// Error when the URI cannot have path segments, e.g. `mailto:` or `data:` URIs.
    #[strum(to_string = "URI cannot be a base: {0}")]
    CannotBeABase(String),
    /// Error when the URI has an opaque origin, i.e. it is not a tuple of scheme, host and port.
    #[strum(to_string = "URI has no origin: {0}")]
    OpaqueOrigin(String),
}

impl bherror::BhError for Error {}

/// A trait for adding suffixes to the path component of a URI.
///
/// # Errors
///
/// The methods return an [`Error`] if the provided suffix does not meet the validation rules.
pub trait UriPathExtensions {
    /// Resulting type of the URI returned by the methods of this trait.
    type Output;

    /// Adds suffix to the path of the provided URI.
    ///
    /// A single trailing `/` of the URI path is dropped before the suffix is appended.
    ///
    /// The function returns an error if the suffix is empty, ends with the trailing `/`, does not
    /// start with a `/`, or starts with multiple consecutive `/`s.
    fn add_path_suffix(self, path: &str) -> Result<Self::Output, Error>;
}

impl UriPathExtensions for Url {
    type Output = Self;

    fn add_path_suffix(mut self, path: &str) -> Result<Self::Output, Error> {
        let segments = validate_path(path)?;
        let uri_as_string = self.to_string();

        // `PathSegmentsMut` only fails for cannot-be-a-base URIs, with `()` as the error.
        self.path_segments_mut()
            .map_err(|()| bherror::Error::root(Error::CannotBeABase(uri_as_string)))?
            .pop_if_empty()
            .extend(segments);

        Ok(self)
    }
}

fn validate_path(path: &str) -> Result<std::str::Split<'_, char>, Error> {
    if path.is_empty() || !path.starts_with('/') || path.starts_with("//") || path.ends_with('/') {
        return Err(bherror::Error::root(Error::InvalidPath(path.to_owned())));
    }

    Ok(path[1..].split('/'))
}

fn parse(uri: &str) -> Result<Url, Error> {
    Url::parse(uri).foreign_err(|| Error::UriParsing(uri.to_owned()))
}

/// Returns the ASCII serialization of the origin of `uri`, i.e. `scheme://host[:port]`.
pub fn origin(uri: &str) -> Result<String, Error> {
    let origin = parse(uri)?.origin();

    if !origin.is_tuple() {
        return Err(bherror::Error::root(Error::OpaqueOrigin(uri.to_owned())));
    }

    Ok(origin.ascii_serialization())
}

/// The OpenID4VCI Credential Issuer metadata location, `{iss}/.well-known/openid-credential-issuer`.
pub fn credential_issuer_metadata_url(iss: &str) -> Result<Url, Error> {
    parse(iss)?.add_path_suffix(CREDENTIAL_ISSUER_WELL_KNOWN)
}

/// The SD-JWT VC issuer metadata location, `{origin(iss)}/.well-known/jwt-vc-issuer`.
pub fn jwt_vc_issuer_metadata_url(iss: &str) -> Result<Url, Error> {
    parse(&origin(iss)?)?.add_path_suffix(JWT_VC_ISSUER_WELL_KNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_suffix(uri: &str, path: &str) -> Result<String, Error> {
        Url::parse(uri)
            .unwrap()
            .add_path_suffix(path)
            .map(|url| url.to_string())
    }

    #[test]
    fn test_add_path_suffix_issuer_identifier() {
        let new_uri = add_suffix(
            "http://localhost:3002/protocol/oid4vci/issuer/6adf766d-3b29-42d7-8a07-22b32f608a3a",
            CREDENTIAL_ISSUER_WELL_KNOWN,
        )
        .unwrap();

        assert_eq!(new_uri, "http://localhost:3002/protocol/oid4vci/issuer/6adf766d-3b29-42d7-8a07-22b32f608a3a/.well-known/openid-credential-issuer");
    }

    #[test]
    fn test_add_path_suffix_empty_path() {
        assert_eq!(
            add_suffix("http://example.com", "/a/b/c").unwrap(),
            "http://example.com/a/b/c"
        );
        assert_eq!(
            add_suffix("http://example.com/", "/a").unwrap(),
            "http://example.com/a"
        );
    }

    #[test]
    fn test_add_path_suffix_trailing_slash() {
        assert_eq!(
            add_suffix("http://example.com/p/", "/a").unwrap(),
            "http://example.com/p/a"
        );
        assert_eq!(
            add_suffix("http://example.com//////", "/a").unwrap(),
            "http://example.com//////a"
        );
    }

    #[test]
    fn test_add_path_suffix_invalid_paths() {
        for path in ["a", "//a", "", "/a/"] {
            let err = add_suffix("http://example.com/p/", path).unwrap_err();
            assert!(matches!(err.error, Error::InvalidPath(_)), "{path}");
        }
    }

    #[test]
    fn test_add_path_suffix_cannot_be_a_base() {
        let err = add_suffix("mailto:issuer@example.com", "/a").unwrap_err();
        assert!(matches!(err.error, Error::CannotBeABase(_)));
    }

    #[test]
    fn test_origin() {
        assert_eq!(
            origin("https://issuer.example.com/tenant/1?x=y").unwrap(),
            "https://issuer.example.com"
        );
        assert_eq!(
            origin("http://localhost:3002/issuer").unwrap(),
            "http://localhost:3002"
        );
        assert!(matches!(
            origin("data:text/plain,issuer").unwrap_err().error,
            Error::OpaqueOrigin(_)
        ));
        assert!(matches!(
            origin("not a uri").unwrap_err().error,
            Error::UriParsing(_)
        ));
    }

    #[test]
    fn test_well_known_urls() {
        assert_eq!(
            credential_issuer_metadata_url("https://issuer.example.com/tenant")
                .unwrap()
                .as_str(),
            "https://issuer.example.com/tenant/.well-known/openid-credential-issuer"
        );
        assert_eq!(
            jwt_vc_issuer_metadata_url("https://issuer.example.com/tenant")
                .unwrap()
                .as_str(),
            "https://issuer.example.com/.well-known/jwt-vc-issuer"
        );
    }
}
