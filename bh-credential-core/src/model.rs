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

//! The canonical in-memory representation of a parsed credential.

use bh_jws_utils::JsonObject;
use chrono::{DateTime, TimeZone as _, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialized credential as handed over to the engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCredential {
    /// Textual encoding, e.g. a compact SD-JWT or a base64url encoded mdoc.
    Text(String),
    /// Binary encoding, e.g. CBOR bytes of an mdoc.
    Bytes(Vec<u8>),
}

impl RawCredential {
    /// Returns the credential text, if the credential is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }
}

impl From<String> for RawCredential {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RawCredential {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for RawCredential {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Supported credential formats.
#[derive(strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialFormat {
    /// SD-JWT Verifiable Credential.
    #[strum(to_string = "vc+sd-jwt")]
    #[serde(rename = "vc+sd-jwt")]
    VcSdJwt,
    /// ISO/IEC 18013-5 mdoc.
    #[strum(to_string = "mso_mdoc")]
    #[serde(rename = "mso_mdoc")]
    MsoMdoc,
}

/// Credential parsed into its canonical form.
///
/// A fresh value is created by every parse and owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCredential {
    /// Display and type information.
    pub metadata: ParsedCredentialMetadata,
    /// The claims revealed by the credential.
    pub signed_claims: JsonObject,
    /// Validity window of the credential.
    pub validity_info: ValidityInfo,
}

/// Metadata part of a [`ParsedCredential`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCredentialMetadata {
    /// Information about the credential itself.
    pub credential: CredentialMetadata,
    /// Information about the issuer.
    pub issuer: IssuerMetadata,
}

/// Type and display information of a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialMetadata {
    /// Format of the credential.
    pub format: CredentialFormat,
    /// Human readable name of the credential.
    pub name: String,
    /// Preview image of the credential.
    pub image: CredentialImage,
    /// The `vct` of an SD-JWT VC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vct: Option<String>,
    /// The `docType` of an mdoc.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,
    /// Resolved SD-JWT VC type metadata documents; empty when resolution
    /// failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_documents: Vec<Value>,
}

/// Renderable image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialImage {
    /// A `data:` URI, or the empty string when no image could be rendered.
    pub data_uri: String,
}

/// Issuer of a credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerMetadata {
    /// Issuer identifier, e.g. the `iss` claim or the certificate subject.
    pub id: String,
    /// Human readable name of the issuer.
    pub name: String,
}

/// Validity window of a credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityInfo {
    /// Start of the validity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the validity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    /// Time of issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed: Option<DateTime<Utc>>,
}

impl ValidityInfo {
    /// Builds the validity window from JWT `nbf`, `exp` and `iat` claims.
    ///
    /// `nbf` takes precedence over `iat` for the start of the validity.
    /// Claims which are not numeric dates are ignored.
    pub fn from_jwt_claims(claims: &JsonObject) -> Self {
        let timestamp = |name: &str| claims.get(name).and_then(numeric_date);
        let signed = timestamp("iat");

        Self {
            valid_from: timestamp("nbf").or(signed),
            valid_until: timestamp("exp"),
            signed,
        }
    }
}

/// Converts a JWT numeric date (seconds since the epoch) into a date.
pub fn numeric_date(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = value.as_i64().or_else(|| value.as_f64().map(|s| s as i64))?;

    Utc.timestamp_opt(seconds, 0).single()
}
