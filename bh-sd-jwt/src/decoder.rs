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

use std::collections::HashSet;

use bherror::Error;
use serde_json::Value;

use crate::{
    disclosure::DisclosureByDigestTable,
    error::DecodingResult,
    utils::{is_reserved_key_name, VecDisplayWrapper, ELLIPSIS, SD, SD_ALG_FIELD_NAME},
    DecodingError, Disclosure, DisclosureData, HashingAlgorithm, JsonObject,
};

/// **Creates** a [JsonObject] from the provided claims and disclosures by decoding
/// disclosures found in the provided claims. The procedure follows the instructions
/// which can be found at [1].
///
/// The digests of the disclosures are computed with `alg`.
///
/// # Notes
///
/// - Digests found in the `claims` or recursively processed disclosures but
///   not found among the digests of the provided disclosures are skipped.
/// - Every provided disclosure must be referenced by a digest.
/// - Decoded claims do not contain any reserved claim names, the top-level
///   `_sd_alg` claim is removed.
///
/// [1]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.1
pub(crate) fn decode_disclosed_claims(
    claims: &JsonObject,
    disclosures: &[Disclosure],
    alg: HashingAlgorithm,
) -> DecodingResult<JsonObject> {
    let mut state = DecoderState::new(DisclosureByDigestTable::new(disclosures, alg)?);

    let decoded_claims = decode_object(claims, &mut state, true)?;

    state.finalize()?;

    Ok(decoded_claims)
}

struct DecoderState<'json, 'dis> {
    /// Precomputes all the disclosure digest for fast lookup afterwards
    ///
    /// <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.1.1>
    disclosures_by_digest: DisclosureByDigestTable<'dis>,

    /// Keeps track of all encountered digest in the `claims` object to check for duplicate digests
    ///
    /// <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.4>
    processed_digests: HashSet<&'json str>,
}

impl<'dis> DecoderState<'_, 'dis> {
    fn new(disclosures_by_digest: DisclosureByDigestTable<'dis>) -> Self {
        Self {
            processed_digests: HashSet::new(),
            disclosures_by_digest,
        }
    }

    fn finalize(self) -> DecodingResult<()> {
        // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.5
        if !self.disclosures_by_digest.0.is_empty() {
            let unused_disclosures = self.disclosures_by_digest.0.into_keys().collect();
            return Err(Error::root(DecodingError::UnusedDisclosures(
                VecDisplayWrapper(unused_disclosures),
            )));
        }

        Ok(())
    }
}

// https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.3.2.2.1
fn decode_object<'json, 'dis: 'json>(
    object: &'json JsonObject,
    state: &mut DecoderState<'json, 'dis>,
    top_level: bool,
) -> DecodingResult<JsonObject> {
    let mut decoded_object = JsonObject::new();

    // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.2.2.1
    if let Some(sd) = object.get(SD) {
        let sd_array = sd
            .as_array()
            .ok_or_else(|| Error::root(DecodingError::MalformedDigest(sd.to_string())))?;

        for digest in sd_array {
            let Some(disclosure) = process_digest(digest, state)? else {
                // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.3.2.1
                continue;
            };

            let DisclosureData::KeyValue { key, value, .. } = &disclosure.data else {
                // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.3.2.2.2.1
                return Err(Error::root(DecodingError::MismatchedDisclosureFormat));
            };

            process_key_value(key, value, &mut decoded_object, state)?;
        }
    }

    for (key, value) in object {
        if key.eq(SD) {
            continue;
        }
        // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.6
        if key.eq(SD_ALG_FIELD_NAME) && top_level {
            continue;
        }
        process_key_value(key, value, &mut decoded_object, state)?;
    }

    Ok(decoded_object)
}

/// Checks the `key`, recursively decodes the `value` and inserts the pair
/// into the `object`.
fn process_key_value<'json, 'dis: 'json>(
    key: &'json str,
    value: &'json Value,
    object: &mut JsonObject,
    state: &mut DecoderState<'json, 'dis>,
) -> DecodingResult<()> {
    if let Some(reserved_key) = is_reserved_key_name(key) {
        return Err(Error::root(DecodingError::ReservedKeyName(reserved_key)));
    }

    let decoded_value = decode_value(value, state)?;

    // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.3.2.2.2.3
    if object.insert(key.to_string(), decoded_value).is_some() {
        return Err(Error::root(DecodingError::DuplicateClaimName(
            key.to_string(),
        )));
    }

    Ok(())
}

// https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.3.2.3.1
fn decode_array<'json, 'dis: 'json>(
    array: &'json [Value],
    state: &mut DecoderState<'json, 'dis>,
) -> DecodingResult<Value> {
    let mut decoded_array = Vec::new();

    for value in array {
        if let Some(value) = resolve_element(value, state)? {
            decoded_array.push(decode_value(value, state)?);
        }
    }

    Ok(Value::Array(decoded_array))
}

/// Returns the array element itself, the value of the disclosure it points to,
/// or `None` for a digest without a disclosure.
fn resolve_element<'json, 'dis: 'json>(
    value: &'json Value,
    state: &mut DecoderState<'json, 'dis>,
) -> DecodingResult<Option<&'json Value>> {
    // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.2.2.2
    let Some(object) = value.as_object() else {
        return Ok(Some(value));
    };
    let Some(digest) = object.get(ELLIPSIS) else {
        return Ok(Some(value));
    };
    if object.len() != 1 {
        return Err(Error::root(DecodingError::MalformedDigest(
            value.to_string(),
        )));
    }

    let Some(disclosure) = process_digest(digest, state)? else {
        return Ok(None);
    };

    if let DisclosureData::ArrayElement { value, .. } = &disclosure.data {
        Ok(Some(value))
    } else {
        // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.3.2.3.2.1
        Err(Error::root(DecodingError::MismatchedDisclosureFormat))
    }
}

fn decode_value<'json, 'dis: 'json>(
    value: &'json Value,
    state: &mut DecoderState<'json, 'dis>,
) -> DecodingResult<Value> {
    match value {
        Value::Object(object) => Ok(Value::Object(decode_object(object, state, false)?)),
        Value::Array(array) => decode_array(array, state),
        _ => Ok(value.to_owned()),
    }
}

/// Checks if digest was already processed and finds the disclosure that matches the digest
/// and marks the disclosure as resolved
fn process_digest<'json, 'dis>(
    digest: &'json Value,
    state: &mut DecoderState<'json, 'dis>,
) -> DecodingResult<Option<&'dis Disclosure>> {
    // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.2.2.1
    let digest = digest
        .as_str()
        .ok_or_else(|| Error::root(DecodingError::MalformedDigest(digest.to_string())))?;
    // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-13#section-7.1-4.3.2.2.2.2
    if !state.processed_digests.insert(digest) {
        return Err(Error::root(DecodingError::DuplicateDigest(
            digest.to_owned(),
        )));
    }

    Ok(state.disclosures_by_digest.0.remove(digest))
}
