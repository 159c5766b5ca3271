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

//! Metadata published by credential issuers under their well-known URLs.

use bh_credential_core::{fetch_json, HttpClient, MetadataErrorCode};
use bh_uri_utils::{credential_issuer_metadata_url, jwt_vc_issuer_metadata_url, origin};
use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error, Result,
};
use serde_json::{Map, Value};

/// Fetches the JWT VC Issuer Metadata of `iss` from
/// `{origin(iss)}/.well-known/jwt-vc-issuer`.
///
/// The `issuer` member of the metadata must be exactly the origin of `iss`,
/// otherwise [`MetadataErrorCode::IssuerMismatch`] is returned.
pub async fn resolve_issuer_metadata<C: HttpClient>(
    client: &C,
    iss: &str,
) -> Result<Map<String, Value>, MetadataErrorCode> {
    let origin = origin(iss).with_err(|| MetadataErrorCode::NotFound)?;
    let url = jwt_vc_issuer_metadata_url(iss).with_err(|| MetadataErrorCode::NotFound)?;

    let metadata: Map<String, Value> = fetch_json(client, url.as_str())
        .await
        .with_err(|| MetadataErrorCode::NotFound)?;

    match metadata.get("issuer").and_then(Value::as_str) {
        Some(issuer) if issuer == origin => Ok(metadata),
        issuer => {
            let issuer = issuer.map(str::to_owned);
            Err(Error::root(MetadataErrorCode::IssuerMismatch))
                .ctx(|| format!("expected issuer {origin}, got {issuer:?}"))
        }
    }
}

/// Fetches the OpenID4VCI Credential Issuer Metadata from
/// `{iss}/.well-known/openid-credential-issuer`.
pub async fn fetch_credential_issuer_metadata<C: HttpClient>(
    client: &C,
    iss: &str,
) -> Result<Map<String, Value>, MetadataErrorCode> {
    let url = credential_issuer_metadata_url(iss).with_err(|| MetadataErrorCode::NotFound)?;

    fetch_json(client, url.as_str())
        .await
        .with_err(|| MetadataErrorCode::NotFound)
}
