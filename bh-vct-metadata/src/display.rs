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

//! Selection of display information from resolved metadata.
//!
//! Type metadata documents tag their display entries with `lang`, while
//! credential issuer metadata uses `locale`; both are accepted everywhere.

use std::collections::HashMap;

use bh_credential_core::{fetch, HttpClient, MetadataErrorCode};
use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error, Result,
};
use serde_json::{Map, Value};

use crate::verify_integrity;

/// Reference to an SVG template of a type metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgTemplateRef {
    /// Location of the template.
    pub uri: String,
    /// Optional integrity metadata of the template.
    pub integrity: Option<String>,
}

fn entry_lang(entry: &Map<String, Value>) -> Option<&str> {
    entry
        .get("lang")
        .or_else(|| entry.get("locale"))
        .and_then(Value::as_str)
}

fn primary_subtag(lang: &str) -> &str {
    lang.split('-').next().unwrap_or(lang)
}

/// Selects the display entry for `lang` from an array of display entries.
///
/// An exact language match is preferred, then a match of the primary
/// language subtag (`en` for `en-US`), and then the first entry.
pub fn select_display<'a>(displays: &'a Value, lang: &str) -> Option<&'a Map<String, Value>> {
    let entries: Vec<&Map<String, Value>> = displays
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .collect();

    let matching = |matches: &dyn Fn(&str) -> bool| {
        entries
            .iter()
            .find(|entry| entry_lang(entry).is_some_and(matches))
            .copied()
    };

    matching(&|candidate: &str| candidate.eq_ignore_ascii_case(lang))
        .or_else(|| {
            matching(&|candidate: &str| {
                primary_subtag(candidate).eq_ignore_ascii_case(primary_subtag(lang))
            })
        })
        .or_else(|| entries.first().copied())
}

fn document_display<'a>(document: &'a Map<String, Value>, lang: &str) -> Option<&'a Map<String, Value>> {
    select_display(document.get("display")?, lang)
}

/// The display name of the credential type.
pub fn display_name<'a>(document: &'a Map<String, Value>, lang: &str) -> Option<&'a str> {
    document_display(document, lang)?.get("name")?.as_str()
}

/// The first SVG template of the selected display entry.
pub fn svg_template(document: &Map<String, Value>, lang: &str) -> Option<SvgTemplateRef> {
    let template = document_display(document, lang)?
        .get("rendering")?
        .get("svg_templates")?
        .as_array()?
        .first()?;

    Some(SvgTemplateRef {
        uri: template.get("uri")?.as_str()?.to_owned(),
        integrity: template
            .get("uri#integrity")
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}

/// The `simple` rendering of the selected display entry, flattened together
/// with the `name` and `description` of the entry.
pub fn simple_display_config(
    document: &Map<String, Value>,
    lang: &str,
) -> Option<Map<String, Value>> {
    let display = document_display(document, lang)?;
    let mut config = display.get("rendering")?.get("simple")?.as_object()?.clone();

    for field in ["name", "description"] {
        if let Some(value) = display.get(field) {
            config
                .entry(field.to_owned())
                .or_insert_with(|| value.clone());
        }
    }

    Some(config)
}

/// Maps the `svg_id` of every claim to the JSON pointer of the claim.
///
/// Claims whose `path` selects array elements (`null`) cannot be addressed
/// by a pointer and are left out.
pub fn svg_id_pointers(document: &Map<String, Value>) -> HashMap<String, String> {
    let Some(claims) = document.get("claims").and_then(Value::as_array) else {
        return HashMap::new();
    };

    claims
        .iter()
        .filter_map(|claim| {
            let svg_id = claim.get("svg_id")?.as_str()?;
            let pointer = json_pointer(claim.get("path")?.as_array()?)?;
            Some((svg_id.to_owned(), pointer))
        })
        .collect()
}

fn json_pointer(path: &[Value]) -> Option<String> {
    path.iter()
        .map(|component| match component {
            Value::String(name) => Some(name.replace('~', "~0").replace('/', "~1")),
            Value::Number(index) => index.as_u64().map(|index| index.to_string()),
            _ => None,
        })
        .try_fold(String::new(), |mut pointer, token| {
            pointer.push('/');
            pointer.push_str(&token?);
            Some(pointer)
        })
}

/// The display entry of the credential configuration with the given `vct`
/// from the credential issuer metadata.
pub fn issuer_display_config(
    issuer_metadata: &Map<String, Value>,
    vct: &str,
    lang: &str,
) -> Option<Map<String, Value>> {
    issuer_metadata
        .get("credential_configurations_supported")?
        .as_object()?
        .values()
        .filter(|configuration| configuration.get("vct").and_then(Value::as_str) == Some(vct))
        .find_map(|configuration| select_display(configuration.get("display")?, lang))
        .cloned()
}

/// The display name of the issuer from the credential issuer metadata.
pub fn issuer_display_name<'a>(
    issuer_metadata: &'a Map<String, Value>,
    lang: &str,
) -> Option<&'a str> {
    document_display(issuer_metadata, lang)?.get("name")?.as_str()
}

/// Fetches the SVG template, checking its integrity when one is given.
pub async fn fetch_svg_template<C: HttpClient>(
    client: &C,
    template: &SvgTemplateRef,
) -> Result<String, MetadataErrorCode> {
    let data = fetch(client, &template.uri)
        .await
        .with_err(|| MetadataErrorCode::NotFound)?;

    if let Some(integrity) = &template.integrity {
        if !verify_integrity(&data, integrity) {
            return Err(Error::root(MetadataErrorCode::IntegrityFail))
                .ctx(|| template.uri.clone());
        }
    }

    String::from_utf8(data)
        .map_err(|_| Error::root(MetadataErrorCode::NotFound))
        .ctx(|| format!("SVG template {} is not UTF-8", template.uri))
}

#[cfg(test)]
mod tests {
    use bh_credential_core::test_utils::StubHttpClient;
    use serde_json::json;

    use super::*;
    use crate::{integrity, SriAlgorithm};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(object) => object,
            _ => unreachable!(),
        }
    }

    fn document() -> Map<String, Value> {
        object(json!({
            "vct": "https://metadata.example.com/pid",
            "display": [
                {
                    "lang": "de-DE",
                    "name": "Personalausweis",
                },
                {
                    "lang": "en-US",
                    "name": "Identity Card",
                    "description": "Person identification data",
                    "rendering": {
                        "simple": {
                            "background_color": "#12107c",
                            "text_color": "#ffffff",
                            "logo": { "uri": "https://example.com/logo.png" },
                        },
                        "svg_templates": [
                            {
                                "uri": "https://example.com/card.svg",
                                "uri#integrity": "sha256-AAAA",
                            },
                        ],
                    },
                },
            ],
            "claims": [
                { "path": ["given_name"], "svg_id": "given_name" },
                { "path": ["address", "street/no"], "svg_id": "street" },
                { "path": ["nationalities", 0], "svg_id": "nationality" },
                { "path": ["nationalities", null], "svg_id": "all_nationalities" },
                { "path": ["birthdate"] },
            ],
        }))
    }

    #[test]
    fn display_selection_by_lang() {
        let document = document();

        assert_eq!(display_name(&document, "en-US"), Some("Identity Card"));
        assert_eq!(display_name(&document, "EN-us"), Some("Identity Card"));
        assert_eq!(display_name(&document, "de"), Some("Personalausweis"));
        assert_eq!(display_name(&document, "de-AT"), Some("Personalausweis"));
        assert_eq!(display_name(&document, "hr-HR"), Some("Personalausweis"));
    }

    #[test]
    fn display_selection_by_locale() {
        let displays = json!([
            { "locale": "en-US", "name": "Issuer" },
            { "locale": "fr-FR", "name": "Émetteur" },
        ]);

        assert_eq!(select_display(&displays, "fr-CA").unwrap()["name"], "Émetteur");
        assert!(select_display(&json!([]), "en-US").is_none());
        assert!(select_display(&json!({}), "en-US").is_none());
    }

    #[test]
    fn svg_template_of_selected_display() {
        let document = document();

        assert_eq!(
            svg_template(&document, "en-US"),
            Some(SvgTemplateRef {
                uri: "https://example.com/card.svg".to_owned(),
                integrity: Some("sha256-AAAA".to_owned()),
            })
        );
        assert_eq!(svg_template(&document, "de-DE"), None);
    }

    #[test]
    fn simple_display_is_flattened() {
        let config = simple_display_config(&document(), "en-US").unwrap();

        assert_eq!(
            Value::Object(config),
            json!({
                "background_color": "#12107c",
                "text_color": "#ffffff",
                "logo": { "uri": "https://example.com/logo.png" },
                "name": "Identity Card",
                "description": "Person identification data",
            })
        );
    }

    #[test]
    fn svg_ids_map_to_json_pointers() {
        let pointers = svg_id_pointers(&document());

        assert_eq!(
            pointers,
            HashMap::from([
                ("given_name".to_owned(), "/given_name".to_owned()),
                ("street".to_owned(), "/address/street~1no".to_owned()),
                ("nationality".to_owned(), "/nationalities/0".to_owned()),
            ])
        );
    }

    #[test]
    fn issuer_display_by_vct() {
        let issuer_metadata = object(json!({
            "credential_issuer": "https://issuer.example.com",
            "display": [{ "locale": "en-US", "name": "Example Issuer" }],
            "credential_configurations_supported": {
                "mdl": {
                    "format": "mso_mdoc",
                    "display": [{ "locale": "en-US", "name": "Driving Licence" }],
                },
                "pid": {
                    "format": "vc+sd-jwt",
                    "vct": "https://metadata.example.com/pid",
                    "display": [{ "locale": "en-US", "name": "PID", "background_color": "#000000" }],
                },
            },
        }));

        let config =
            issuer_display_config(&issuer_metadata, "https://metadata.example.com/pid", "en-US")
                .unwrap();
        assert_eq!(config["name"], "PID");
        assert_eq!(config["background_color"], "#000000");

        assert!(issuer_display_config(&issuer_metadata, "urn:unknown", "en-US").is_none());
        assert_eq!(
            issuer_display_name(&issuer_metadata, "en-US"),
            Some("Example Issuer")
        );
    }

    #[tokio::test]
    async fn svg_template_integrity() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg">{{given_name}}</svg>"#;
        let client = StubHttpClient::new().with_response(
            "https://example.com/card.svg",
            bh_credential_core::StatusCode::OK,
            svg,
        );
        let mut template = SvgTemplateRef {
            uri: "https://example.com/card.svg".to_owned(),
            integrity: None,
        };

        assert_eq!(fetch_svg_template(&client, &template).await.unwrap(), svg);

        template.integrity = Some(integrity(svg.as_bytes(), SriAlgorithm::Sha256).unwrap());
        assert_eq!(fetch_svg_template(&client, &template).await.unwrap(), svg);

        template.integrity = Some("sha256-AAAA".to_owned());
        let error = fetch_svg_template(&client, &template).await.unwrap_err();
        assert_eq!(error.error, MetadataErrorCode::IntegrityFail);

        template.uri = "https://example.com/missing.svg".to_owned();
        let error = fetch_svg_template(&client, &template).await.unwrap_err();
        assert_eq!(error.error, MetadataErrorCode::NotFound);
    }
}
