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

//! Parsing of the compact `SD-JWT` and `SD-JWT+KB` serializations.

use bherror::Error;

use crate::{error::FormatError, Disclosure};

pub(crate) const SD_JWT_DELIMITER: char = '~';

/// A compact `SD-JWT`, optionally with a Key Binding JWT.
///
/// An `SD-JWT` is composed of the following:
/// - an Issuer-signed JWT,
/// - zero or more Disclosures,
/// - an optional Key Binding JWT (KB-JWT).
///
/// No checks are carried out on any of the parts, e.g. there is no check on
/// the `jwt` signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdJwt {
    pub(crate) jwt: String,
    pub(crate) disclosures: Vec<String>,
    pub(crate) key_binding_jwt: Option<String>,
}

impl SdJwt {
    /// The Issuer-signed JWT.
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    /// The serialized disclosures, in presentation order.
    pub fn disclosures(&self) -> &[String] {
        &self.disclosures
    }

    /// Parses the serialized disclosures.
    pub fn parse_disclosures(&self) -> Result<Vec<Disclosure>, Error<FormatError>> {
        self.disclosures
            .iter()
            .cloned()
            .map(Disclosure::try_from)
            .collect()
    }

    /// The Key Binding JWT, if present.
    pub fn key_binding_jwt(&self) -> Option<&str> {
        self.key_binding_jwt.as_deref()
    }

    /// The `SD-JWT` without the Key Binding JWT, i.e. the input of the
    /// `sd_hash` of the Key Binding JWT.
    ///
    /// `<Issuer-signed JWT>~<Disclosure 1>~<Disclosure N>~`
    pub fn without_key_binding(&self) -> String {
        let mut serialized = format!("{}{}", self.jwt, SD_JWT_DELIMITER);

        for disclosure in &self.disclosures {
            serialized.push_str(disclosure);
            serialized.push(SD_JWT_DELIMITER);
        }

        serialized
    }
}

impl std::str::FromStr for SdJwt {
    type Err = bherror::Error<FormatError>;

    /// Parses a compact `SD-JWT` or `SD-JWT+KB`.
    ///
    /// As specified in the [draft v13], the compact format is composed of
    /// the Issuer-signed `JWT`, a `~` (tilde character), zero or more
    /// Disclosures each followed by a `~`, and lastly an optional Key Binding
    /// JWT. A bare JWT without any `~` is accepted as an `SD-JWT` without
    /// Disclosures.
    ///
    /// # Examples
    ///
    /// `<Issuer-signed JWT>~<Disclosure 1>~<Disclosure N>~`
    ///
    /// `<Issuer-signed JWT>~<Disclosure 1>~<Disclosure N>~<KB-JWT>`
    ///
    /// [draft v13]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#name-sd-jwt-and-sd-jwtkb-data-fo
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = value.trim().split(SD_JWT_DELIMITER).collect();

        let key_binding_jwt = if parts.len() > 1 {
            parts.pop().filter(|kb_jwt| !kb_jwt.is_empty())
        } else {
            None
        };

        let Some((jwt, disclosures)) = parts.split_first() else {
            return Err(Error::root(FormatError::InvalidSdJwtFormat));
        };

        if jwt.is_empty() || disclosures.iter().any(|disclosure| disclosure.is_empty()) {
            return Err(Error::root(FormatError::InvalidSdJwtFormat));
        }

        Ok(Self {
            jwt: (*jwt).to_owned(),
            disclosures: disclosures.iter().map(|&s| s.to_owned()).collect(),
            key_binding_jwt: key_binding_jwt.map(str::to_owned),
        })
    }
}

impl std::fmt::Display for SdJwt {
    /// Serialize the `SD-JWT` in the compact serialization format.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            self.without_key_binding(),
            self.key_binding_jwt.as_deref().unwrap_or_default()
        )
    }
}
