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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object, e.g. the claims of a JWT.
pub type JsonObject = Map<String, Value>;

/// A JSON object meant to represent a public JWK.
///
/// Since this is a type alias, no aspects of the schema are enforced; this is
/// left to any end-consumers of the public key, such as
/// [`SignatureVerifier`](crate::SignatureVerifier).
pub type JwkPublic = Map<String, Value>;

/// Models JWK Set, as published by SD-JWT VC issuers in their `jwt-vc-issuer`
/// metadata.
///
/// If any of the JWKs in the JWK Set have parameter `kid` then all of them
/// must have it, and the values must be distinct. Equality between keys is
/// checked using only the `kid` values.
///
/// For more details see [RFC7517][RFC].
///
/// [RFC]: https://datatracker.ietf.org/doc/html/rfc7517#section-5
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "JwkSetUnverified")]
pub struct JwkSet {
    keys: Vec<JwkPublic>,
}

impl JwkSet {
    /// Create empty `JwkSet`.
    pub fn empty() -> Self {
        JwkSet { keys: vec![] }
    }

    /// The keys of the set.
    pub fn keys(&self) -> &[JwkPublic] {
        &self.keys
    }

    /// Finds the key with the given `kid`.
    ///
    /// When `kid` is [`None`], the set must contain exactly one key, which is
    /// then returned.
    pub fn find(&self, kid: Option<&str>) -> Option<&JwkPublic> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|jwk| jwk.get("kid").and_then(Value::as_str) == Some(kid)),
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        }
    }
}

/// This is a "shadow" type whose sole purpose of existence is to be able to
/// verify validity of deserialized [JwkSet] without writing deserialization
/// manually. This is achieved with misuse of `TryFrom` trait. For more info see
/// this [github issue].
///
/// [github issue]: https://github.com/serde-rs/serde/issues/642
#[derive(Deserialize, Debug)]
struct JwkSetUnverified {
    keys: Vec<JwkPublic>,
}

impl TryFrom<JwkSetUnverified> for JwkSet {
    type Error = &'static str;

    fn try_from(value: JwkSetUnverified) -> std::result::Result<Self, Self::Error> {
        let keys = value.keys;
        let jwk_with_kid_cnt = keys.iter().filter(|jwk| jwk.contains_key("kid")).count();

        if jwk_with_kid_cnt == 0 {
            return Ok(JwkSet { keys });
        }
        if jwk_with_kid_cnt != keys.len() {
            return Err("Some of the provided JWKs contain kid parameter values and some don't");
        }

        let mut uniq = HashSet::new();
        for kid in keys.iter().filter_map(|key| key.get("kid")) {
            let kid = kid
                .as_str()
                .ok_or("JWK contains a `kid` parameter that is not a string")?;
            if !uniq.insert(kid) {
                return Err("Provided JWKs contain duplicate kid parameter values");
            }
        }

        Ok(JwkSet { keys })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use crate::JwkSet;

    // https://datatracker.ietf.org/doc/html/rfc7517#appendix-A.1
    #[test]
    fn jwk_set_example_serialization() {
        let jwk_set = json!({"keys":
          [
            {"kty":"EC",
             "crv":"P-256",
             "x":"MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
             "y":"4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM",
             "use":"enc",
             "kid":"1"},
            {"kty":"EC",
             "crv":"P-256",
             "x":"b28d4MwZMjw8-00CG4xfnn9SLMVMM19SlqZpVb_uNtQ",
             "y":"Xv5zWwuoaTgdS6hV43yI6gBwTnjukmFQQnJ_kCxzqk8",
             "kid":"2011-04-29"}
          ]
        });

        let deserialized: JwkSet = serde_json::from_value(jwk_set.clone()).unwrap();
        let serialized = serde_json::to_value(&deserialized).unwrap();
        assert_eq!(serialized, jwk_set);

        let second = deserialized.find(Some("2011-04-29")).unwrap();
        assert_eq!(second["x"], "b28d4MwZMjw8-00CG4xfnn9SLMVMM19SlqZpVb_uNtQ");
        assert!(deserialized.find(Some("unknown")).is_none());
        // ambiguous without a `kid`
        assert!(deserialized.find(None).is_none());
    }

    #[test]
    fn single_key_found_without_kid() {
        let jwk_set: JwkSet = serde_json::from_value(json!({"keys": [{ "key": "1" }]})).unwrap();

        assert_eq!(jwk_set.find(None).unwrap()["key"], "1");
        assert!(JwkSet::empty().find(None).is_none());
    }

    #[test]
    fn invalid_jwk_set_duplicate_kid() {
        let error =
            serde_json::from_value::<JwkSet>(json!({"keys": [{ "kid": "1" }, { "kid": "1" }]}));

        assert_eq!(
            error.unwrap_err().to_string(),
            "Provided JWKs contain duplicate kid parameter values"
        );
    }

    #[test]
    fn invalid_jwk_set_some_jwks_without_kid() {
        let error =
            serde_json::from_value::<JwkSet>(json!({"keys": [{ "kid": "1" }, { "key": "1" }]}));

        assert_eq!(
            error.unwrap_err().to_string(),
            "Some of the provided JWKs contain kid parameter values and some don't"
        );
    }
}
