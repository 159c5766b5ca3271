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

//! Integrity checked resolution of SD-JWT VC type metadata.
//!
//! <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-sd-jwt-vc#name-sd-jwt-vc-type-metadata>

use std::collections::HashSet;

use bh_credential_core::{fetch, HttpClient, MetadataErrorCode};
use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error, Result,
};
use serde_json::{Map, Value};

use crate::{deep_merge, verify_integrity};

/// Maximum number of documents in an `extends` chain, the root included.
pub const MAX_EXTENDS_DEPTH: usize = 8;

const EXTENDS: &str = "extends";
const EXTENDS_INTEGRITY: &str = "extends#integrity";
const SCHEMA: &str = "schema";
const SCHEMA_URI: &str = "schema_uri";
const SCHEMA_URI_INTEGRITY: &str = "schema_uri#integrity";

/// Fetches the type metadata document at `url` and everything it extends,
/// and returns the effective, merged document.
///
/// Every fetched document, the root included, must match its integrity
/// metadata. The root one is given by `integrity` (the `vct#integrity`
/// claim), the others by the `extends#integrity` and `schema_uri#integrity`
/// members of the referencing document.
///
/// A document referenced twice within one resolution, i.e. an `extends`
/// cycle, yields [`MetadataErrorCode::NotFound`], as does a chain longer than
/// [`MAX_EXTENDS_DEPTH`].
pub async fn fetch_and_merge_metadata<C: HttpClient>(
    client: &C,
    url: &str,
    integrity: Option<&str>,
) -> Result<Map<String, Value>, MetadataErrorCode> {
    let mut visited = HashSet::new();
    let mut chain = Vec::new();
    let mut next = Some((url.to_owned(), integrity.map(str::to_owned)));

    while let Some((url, integrity)) = next.take() {
        if chain.len() == MAX_EXTENDS_DEPTH {
            return Err(Error::root(MetadataErrorCode::NotFound))
                .ctx(|| format!("`extends` chain longer than {MAX_EXTENDS_DEPTH}"));
        }

        if !visited.insert(url.clone()) {
            return Err(Error::root(MetadataErrorCode::NotFound))
                .ctx(|| format!("`extends` cycle at {url}"));
        }

        tracing::debug!(%url, depth = chain.len(), "fetching type metadata");
        let document = fetch_document(client, &url, integrity.as_deref()).await?;

        next = match document.get(EXTENDS) {
            None => None,
            Some(Value::String(parent)) => {
                let parent_integrity = document
                    .get(EXTENDS_INTEGRITY)
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                Some((parent.clone(), parent_integrity))
            }
            Some(_) => {
                return Err(Error::root(MetadataErrorCode::NotFound))
                    .ctx(|| format!("`extends` of {url} is not a string"));
            }
        };

        chain.push(document);
    }

    // merge from the most generic document down to the root one
    let merged = chain
        .into_iter()
        .rev()
        .map(Value::Object)
        .reduce(deep_merge);

    match merged {
        Some(Value::Object(document)) => Ok(document),
        _ => Err(Error::root(MetadataErrorCode::NotFound)),
    }
}

/// Fetches a single document, verifies it and embeds its `schema_uri`.
async fn fetch_document<C: HttpClient>(
    client: &C,
    url: &str,
    integrity: Option<&str>,
) -> Result<Map<String, Value>, MetadataErrorCode> {
    let data = fetch(client, url)
        .await
        .with_err(|| MetadataErrorCode::NotFound)?;

    let mut document = match serde_json::from_slice(&data) {
        Ok(Value::Object(document)) if document.contains_key("vct") => document,
        _ => {
            return Err(Error::root(MetadataErrorCode::NotFound))
                .ctx(|| format!("{url} is not a type metadata document"))
        }
    };

    check_integrity(&data, integrity).ctx(|| url.to_owned())?;

    if document.contains_key(SCHEMA) && document.contains_key(SCHEMA_URI) {
        return Err(Error::root(MetadataErrorCode::SchemaConflict)).ctx(|| url.to_owned());
    }

    if let Some(schema_uri) = document.get(SCHEMA_URI) {
        let schema_uri = schema_uri
            .as_str()
            .ok_or_else(|| Error::root(MetadataErrorCode::NotFound))
            .ctx(|| format!("`schema_uri` of {url} is not a string"))?;
        let schema_integrity = document.get(SCHEMA_URI_INTEGRITY).and_then(Value::as_str);

        let schema = fetch_schema(client, schema_uri, schema_integrity).await?;
        document.insert(SCHEMA.to_owned(), schema);
    }

    Ok(document)
}

async fn fetch_schema<C: HttpClient>(
    client: &C,
    url: &str,
    integrity: Option<&str>,
) -> Result<Value, MetadataErrorCode> {
    let data = fetch(client, url)
        .await
        .with_err(|| MetadataErrorCode::NotFound)?;

    check_integrity(&data, integrity).ctx(|| url.to_owned())?;

    serde_json::from_slice(&data)
        .map_err(|_| Error::root(MetadataErrorCode::NotFound))
        .ctx(|| format!("schema at {url} is not JSON"))
}

/// Checks the fetched `data` against the expected integrity metadata.
pub(crate) fn check_integrity(
    data: &[u8],
    integrity: Option<&str>,
) -> Result<(), MetadataErrorCode> {
    let integrity = match integrity {
        Some(integrity) if !integrity.trim().is_empty() => integrity,
        _ => return Err(Error::root(MetadataErrorCode::IntegrityMissing)),
    };

    if !verify_integrity(data, integrity) {
        return Err(Error::root(MetadataErrorCode::IntegrityFail));
    }

    Ok(())
}
