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

//! The [`CredentialParser`] of SD-JWT Verifiable Credentials.

use async_trait::async_trait;
use bh_credential_core::{
    Context, CredentialFormat, CredentialImage, CredentialMetadata, CredentialParser,
    CredentialParsingError, HttpClient, IssuerMetadata, ParsedCredential,
    ParsedCredentialMetadata, RawCredential, RenderingError, ValidityInfo,
};
use bh_credential_render::{CredentialRenderingService, DisplayConfig};
use bh_jws_utils::decode_jws_unverified;
use bh_vct_metadata::{
    display::{
        display_name, fetch_svg_template, issuer_display_config, issuer_display_name,
        simple_display_config, svg_id_pointers, svg_template, SvgTemplateRef,
    },
    fetch_and_merge_metadata, fetch_credential_issuer_metadata,
};
use bherror::{
    traits::{ErrorContext as _, ForeignError as _, PropagateError as _},
    Error,
};
use serde_json::{Map, Value};

use crate::{decoder::decode_disclosed_claims, HashingAlgorithm, JsonObject, Result, SdJwt};

/// Parser of SD-JWT VCs into their canonical form.
///
/// The parser does **not** verify the credential. It reveals the disclosed
/// claims and enriches them with display information resolved from the
/// credential type metadata (`vct`) and the credential issuer metadata.
/// Failures to resolve any of the metadata only degrade the display
/// information.
#[derive(Debug, Clone)]
pub struct SdJwtVcParser<C> {
    client: C,
    renderer: CredentialRenderingService<C>,
    lang: String,
}

impl<C: HttpClient + Clone> SdJwtVcParser<C> {
    /// Creates a parser fetching metadata with `client` and selecting display
    /// information in the language of the `context`.
    pub fn new(client: C, context: &Context) -> Self {
        Self {
            renderer: CredentialRenderingService::new(client.clone()),
            client,
            lang: context.lang.clone(),
        }
    }
}

#[async_trait]
impl<C: HttpClient + Clone> CredentialParser for SdJwtVcParser<C> {
    async fn parse(
        &self,
        raw_credential: &RawCredential,
    ) -> Result<ParsedCredential, CredentialParsingError> {
        let Some(text) = raw_credential.as_text() else {
            return Err(Error::root(CredentialParsingError::InvalidDatatype));
        };

        let claims = reveal_claims(text)?;

        let Some(iss) = claims.get("iss").and_then(Value::as_str) else {
            return Err(Error::root(CredentialParsingError::MissingIssuerIdentifier));
        };
        let vct = claims.get("vct").and_then(Value::as_str);

        let issuer_metadata = match fetch_credential_issuer_metadata(&self.client, iss).await {
            Ok(metadata) => Some(metadata),
            Err(error) => {
                tracing::debug!(iss, %error, "credential issuer metadata not available");
                None
            }
        };

        let type_metadata = match vct {
            Some(vct) => {
                let integrity = claims.get("vct#integrity").and_then(Value::as_str);
                match fetch_and_merge_metadata(&self.client, vct, integrity).await {
                    Ok(metadata) => Some(metadata),
                    Err(error) => {
                        tracing::debug!(vct, %error, "type metadata not resolved");
                        None
                    }
                }
            }
            None => None,
        };

        let data_uri = self
            .render_image(
                &claims,
                type_metadata.as_ref(),
                issuer_metadata.as_ref(),
                vct,
            )
            .await;

        let issuer_config = issuer_metadata
            .as_ref()
            .zip(vct)
            .and_then(|(metadata, vct)| issuer_display_config(metadata, vct, &self.lang));

        let name = type_metadata
            .as_ref()
            .and_then(|metadata| display_name(metadata, &self.lang))
            .or_else(|| issuer_config.as_ref()?.get("name")?.as_str())
            .or(vct)
            .unwrap_or_default()
            .to_owned();

        let issuer_name = issuer_metadata
            .as_ref()
            .and_then(|metadata| issuer_display_name(metadata, &self.lang))
            .unwrap_or(iss)
            .to_owned();

        Ok(ParsedCredential {
            metadata: ParsedCredentialMetadata {
                credential: CredentialMetadata {
                    format: CredentialFormat::VcSdJwt,
                    name,
                    image: CredentialImage { data_uri },
                    vct: vct.map(str::to_owned),
                    doctype: None,
                    metadata_documents: type_metadata.map(Value::Object).into_iter().collect(),
                },
                issuer: IssuerMetadata {
                    id: iss.to_owned(),
                    name: issuer_name,
                },
            },
            validity_info: ValidityInfo::from_jwt_claims(&claims),
            signed_claims: claims,
        })
    }
}

impl<C: HttpClient> SdJwtVcParser<C> {
    /// Renders the preview image, trying the SVG template of the type
    /// metadata, then its `simple` rendering, and lastly the display of the
    /// credential issuer metadata.
    ///
    /// Returns an empty string if none of them can be rendered.
    async fn render_image(
        &self,
        claims: &JsonObject,
        type_metadata: Option<&Map<String, Value>>,
        issuer_metadata: Option<&Map<String, Value>>,
        vct: Option<&str>,
    ) -> String {
        if let Some(document) = type_metadata {
            if let Some(template) = svg_template(document, &self.lang) {
                match self.render_template(document, &template, claims).await {
                    Ok(data_uri) => return data_uri,
                    Err(error) => {
                        tracing::debug!(uri = template.uri, %error, "SVG template not rendered")
                    }
                }
            }

            if let Some(config) = simple_display_config(document, &self.lang) {
                match self.render_display_config(config, claims).await {
                    Ok(data_uri) => return data_uri,
                    Err(error) => tracing::debug!(%error, "simple rendering not rendered"),
                }
            }
        }

        if let Some(config) = issuer_metadata
            .zip(vct)
            .and_then(|(metadata, vct)| issuer_display_config(metadata, vct, &self.lang))
        {
            match self.render_display_config(config, claims).await {
                Ok(data_uri) => return data_uri,
                Err(error) => tracing::debug!(%error, "issuer display not rendered"),
            }
        }

        String::new()
    }

    async fn render_template(
        &self,
        document: &Map<String, Value>,
        template: &SvgTemplateRef,
        claims: &JsonObject,
    ) -> Result<String, RenderingError> {
        let svg = fetch_svg_template(&self.client, template)
            .await
            .with_err(|| RenderingError::TemplateUnavailable(template.uri.clone()))?;

        self.renderer
            .render_svg_template(&svg, claims, &svg_id_pointers(document))
    }

    async fn render_display_config(
        &self,
        config: Map<String, Value>,
        claims: &JsonObject,
    ) -> Result<String, RenderingError> {
        let config: DisplayConfig = serde_json::from_value(Value::Object(config))
            .foreign_err(|| RenderingError::MissingDisplay)?;

        self.renderer
            .render_custom_svg_template(&config, claims)
            .await
    }
}

/// Reveals the disclosed claims of the compact SD-JWT, without verifying it.
fn reveal_claims(text: &str) -> Result<JsonObject, CredentialParsingError> {
    let sd_jwt: SdJwt = text
        .parse()
        .with_err(|| CredentialParsingError::CouldNotParse)?;

    let (header, payload) = decode_jws_unverified(sd_jwt.jwt())
        .with_err(|| CredentialParsingError::CouldNotParse)?;
    let alg = HashingAlgorithm::from_signing_algorithm(header.alg)
        .with_err(|| CredentialParsingError::CouldNotParse)?;

    let disclosures = sd_jwt
        .parse_disclosures()
        .with_err(|| CredentialParsingError::CouldNotParse)?;

    decode_disclosed_claims(&payload, &disclosures, alg)
        .with_err(|| CredentialParsingError::CouldNotParse)
        .ctx(|| "disclosures cannot be revealed")
}
