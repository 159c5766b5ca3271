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

//! The [`CredentialParser`] of `mso_mdoc` credentials.

use async_trait::async_trait;
use bh_credential_core::{
    CredentialFormat, CredentialImage, CredentialMetadata, CredentialParser,
    CredentialParsingError, HttpClient, IssuerMetadata, ParsedCredential,
    ParsedCredentialMetadata, RawCredential, ValidityInfo,
};
use bh_credential_render::{CredentialRenderingService, DisplayConfig};
use bh_jws_utils::{base64_url_decode, JsonObject};
use bherror::traits::{ErrorContext as _, PropagateError as _};

use crate::{
    models::{data_retrieval::device_retrieval::issuer_auth::IssuerAuth, DeviceResponse, Document},
    MdocError, Result,
};

/// Name of the generic display configuration of mdoc previews.
const MDOC_DISPLAY_NAME: &str = "mdoc Verifiable Credential";

/// Parser of `mso_mdoc` credentials into their canonical form.
///
/// Two encodings are accepted, either base64url encoded or as raw bytes:
///   - a `DeviceResponse`, of which the first document is taken,
///   - a bare `IssuerSigned` structure, as issued to the wallet.
///
/// The parser does **not** verify the credential. Only the data elements of
/// the first issuer signed namespace end up in the signed claims.
#[derive(Debug, Clone)]
pub struct MsoMdocParser<C> {
    renderer: CredentialRenderingService<C>,
}

impl<C: HttpClient> MsoMdocParser<C> {
    /// Creates a parser fetching preview images with `client`.
    pub fn new(client: C) -> Self {
        Self {
            renderer: CredentialRenderingService::new(client),
        }
    }

    async fn render_image(&self, claims: &JsonObject) -> String {
        let config = DisplayConfig {
            name: Some(MDOC_DISPLAY_NAME.to_owned()),
            ..Default::default()
        };

        self.renderer
            .render_custom_svg_template(&config, claims)
            .await
            .unwrap_or_else(|error| {
                tracing::debug!(%error, "mdoc preview not rendered");
                String::new()
            })
    }
}

#[async_trait]
impl<C: HttpClient> CredentialParser for MsoMdocParser<C> {
    async fn parse(
        &self,
        raw_credential: &RawCredential,
    ) -> Result<ParsedCredential, CredentialParsingError> {
        let document =
            decode_document(raw_credential).with_err(|| CredentialParsingError::CouldNotParse)?;

        let doc_type = document.doc_type().to_string();
        let issuer_auth = document.issuer_signed().issuer_auth();
        let signed_claims = document.issuer_signed().first_name_space_claims();

        let data_uri = self.render_image(&signed_claims).await;

        Ok(ParsedCredential {
            metadata: ParsedCredentialMetadata {
                credential: CredentialMetadata {
                    format: CredentialFormat::MsoMdoc,
                    name: doc_type.clone(),
                    image: CredentialImage { data_uri },
                    vct: None,
                    doctype: Some(doc_type),
                    metadata_documents: Vec::new(),
                },
                issuer: issuer_metadata(issuer_auth),
            },
            validity_info: validity_info(issuer_auth),
            signed_claims,
        })
    }
}

/// Decodes the first [`Document`] of the credential.
///
/// A `DeviceResponse` is tried first, then a bare `IssuerSigned` structure.
pub(crate) fn decode_document(raw_credential: &RawCredential) -> Result<Document> {
    let decoded;
    let cbor = match raw_credential {
        RawCredential::Text(text) => {
            decoded = base64_url_decode(text.trim())
                .with_err(|| MdocError::DeviceResponseParse("invalid base64url".to_owned()))?;
            decoded.as_slice()
        }
        RawCredential::Bytes(bytes) => bytes.as_slice(),
    };

    match DeviceResponse::from_cbor(cbor).and_then(DeviceResponse::into_first_document) {
        Ok(document) => Ok(document),
        Err(error) => {
            tracing::debug!(%error, "not a device response, trying issuer signed");

            DeviceResponse::from_issuer_signed_cbor(cbor)
                .and_then(DeviceResponse::into_first_document)
                .ctx(|| "neither a device response nor issuer signed")
        }
    }
}

/// The issuer is identified by the subject of the signing certificate.
fn issuer_metadata(issuer_auth: &IssuerAuth) -> IssuerMetadata {
    let x5chain = match issuer_auth.x5chain() {
        Ok(x5chain) => x5chain,
        Err(error) => {
            tracing::debug!(%error, "issuer certificate not available");
            return IssuerMetadata::default();
        }
    };

    let id = x5chain.leaf_subject().unwrap_or_else(|error| {
        tracing::debug!(%error, "issuer subject not readable");
        String::new()
    });
    let name = x5chain.leaf_common_name().unwrap_or_else(|| id.clone());

    IssuerMetadata { id, name }
}

fn validity_info(issuer_auth: &IssuerAuth) -> ValidityInfo {
    match issuer_auth.mso() {
        Ok(mso) => {
            let validity_info = mso.validity_info();
            ValidityInfo {
                valid_from: Some(validity_info.valid_from.into()),
                valid_until: Some(validity_info.valid_until.into()),
                signed: Some(validity_info.signed.into()),
            }
        }
        Err(error) => {
            tracing::debug!(%error, "mobile security object not readable");
            ValidityInfo::default()
        }
    }
}
