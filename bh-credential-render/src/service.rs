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

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bh_credential_core::{numeric_date, FetchError, HeaderMap, HttpClient, RenderingError};
use bherror::{traits::ForeignError as _, Error, Result};
use serde_json::{Map, Value};

use crate::{
    template::{escape_xml, format_claim, format_date, lookup, substitute, svg_data_uri},
    DisplayConfig, ImageRef,
};

const DEFAULT_NAME: &str = "Verifiable Credential";
const DEFAULT_BACKGROUND_COLOR: &str = "#1e3a8a";
const DEFAULT_TEXT_COLOR: &str = "#ffffff";
const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/png";

/// Built-in card template rendering a [`DisplayConfig`].
const GENERIC_TEMPLATE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="320" height="200" viewBox="0 0 320 200">
<defs><clipPath id="card"><rect width="320" height="200" rx="12"/></clipPath></defs>
<rect width="320" height="200" rx="12" fill="{{background_color}}"/>
{{background_image}}
{{logo}}
<text x="20" y="110" fill="{{text_color}}" font-family="sans-serif" font-size="20" font-weight="bold">{{name}}</text>
<text x="20" y="134" fill="{{text_color}}" font-family="sans-serif" font-size="12">{{description}}</text>
<text x="20" y="180" fill="{{text_color}}" font-family="sans-serif" font-size="10">{{expiry}}</text>
</svg>"##;

/// Renders credential preview images as `data:image/svg+xml` URIs.
///
/// Images referenced by display configurations are fetched through the
/// injected [`HttpClient`] and embedded, so the output is self-contained.
#[derive(Debug, Clone)]
pub struct CredentialRenderingService<C> {
    client: C,
}

impl<C: HttpClient> CredentialRenderingService<C> {
    /// Creates a service fetching images with `client`.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Renders an SVG template of type metadata against the claims.
    ///
    /// Every `{{svg_id}}` placeholder is replaced with the claim at the JSON
    /// pointer `path_by_svg_id[svg_id]`. Placeholders without a pointer, or
    /// whose claim is missing or has no text form, render as `-`.
    pub fn render_svg_template(
        &self,
        template: &str,
        claims: &Map<String, Value>,
        path_by_svg_id: &HashMap<String, String>,
    ) -> Result<String, RenderingError> {
        if template.trim().is_empty() {
            return Err(Error::root(RenderingError::EmptyOutput));
        }

        let svg = substitute(template, |svg_id| {
            let pointer = path_by_svg_id.get(svg_id)?;
            let text = format_claim(lookup(claims, pointer)?)?;
            Some(escape_xml(&text).into_owned())
        });

        Ok(svg_data_uri(&svg))
    }

    /// Renders the built-in card template for the display configuration.
    ///
    /// The expiry line is taken from the `expiry_date` claim, or else from
    /// the `exp` claim. Images which cannot be fetched are left out.
    pub async fn render_custom_svg_template(
        &self,
        display_config: &DisplayConfig,
        claims: &Map<String, Value>,
    ) -> Result<String, RenderingError> {
        let background_image = match &display_config.background_image {
            Some(image) => self.embed_image(image).await.map(|href| {
                format!(
                    r#"<image href="{href}" width="320" height="200" preserveAspectRatio="xMidYMid slice" clip-path="url(#card)"/>"#
                )
            }),
            None => None,
        };
        let logo = match &display_config.logo {
            Some(image) => self.embed_image(image).await.map(|href| {
                format!(
                    r#"<image href="{href}" x="20" y="20" width="48" height="48" preserveAspectRatio="xMidYMid meet"/>"#
                )
            }),
            None => None,
        };

        let text = |value: Option<&str>, default: &str| {
            Some(escape_xml(value.unwrap_or(default)).into_owned())
        };

        let svg = substitute(GENERIC_TEMPLATE, |placeholder| match placeholder {
            "background_color" => text(
                display_config.background_color.as_deref(),
                DEFAULT_BACKGROUND_COLOR,
            ),
            "text_color" => text(display_config.text_color.as_deref(), DEFAULT_TEXT_COLOR),
            "name" => text(display_config.name.as_deref(), DEFAULT_NAME),
            "description" => text(display_config.description.as_deref(), ""),
            "expiry" => text(expiry_line(claims).as_deref(), ""),
            "background_image" => Some(background_image.clone().unwrap_or_default()),
            "logo" => Some(logo.clone().unwrap_or_default()),
            _ => None,
        });

        Ok(svg_data_uri(&svg))
    }

    /// Returns the image as an escaped `data:` URI, or `None` if it cannot
    /// be fetched.
    async fn embed_image(&self, image: &ImageRef) -> Option<String> {
        if image.uri.starts_with("data:") {
            return Some(escape_xml(&image.uri).into_owned());
        }

        match self.fetch_image(&image.uri).await {
            Ok(data_uri) => Some(escape_xml(&data_uri).into_owned()),
            Err(error) => {
                tracing::warn!(uri = image.uri, %error, "leaving out image of the credential");
                None
            }
        }
    }

    async fn fetch_image(&self, uri: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(uri, HeaderMap::new())
            .await
            .foreign_err(|| FetchError::RequestFailed(uri.to_owned()))?;

        let media_type = response
            .headers
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE)
            .to_owned();
        let data = response.into_ok_data(uri)?;

        Ok(format!("data:{media_type};base64,{}", STANDARD.encode(data)))
    }
}

fn expiry_line(claims: &Map<String, Value>) -> Option<String> {
    let expiry = match claims.get("expiry_date") {
        Some(Value::String(date)) => format_date(date).unwrap_or_else(|| date.clone()),
        _ => numeric_date(claims.get("exp")?)?
            .date_naive()
            .format("%Y-%m-%d")
            .to_string(),
    };

    Some(format!("Expires: {expiry}"))
}
