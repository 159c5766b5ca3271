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

use bh_jws_utils::{openssl_ec_pub_key_to_jwk, test_utils::sign_jws, JsonObject, JwkPublic};
use bhx5chain::test_utils::{generate_ec_key, TestPki};
use openssl::{
    nid::Nid,
    pkey::{PKey, Private},
};
use serde_json::{json, Value};

use crate::{utils::current_timestamp, Disclosure, HashingAlgorithm};

pub(crate) const ISSUER: &str = "https://issuer.example.com";
pub(crate) const VCT: &str = "https://issuer.example.com/vct/pid";
pub(crate) const NONCE: &str = "n-0S6_WzA2Mj";
pub(crate) const AUDIENCE: &str = "https://verifier.example.org";

/// Issues SD-JWT VCs signed by the leaf of a freshly generated PKI.
pub(crate) struct Issuer {
    pub(crate) pki: TestPki,
    alg: &'static str,
    hashing: HashingAlgorithm,
}

impl Issuer {
    pub(crate) fn es256() -> Self {
        Self {
            pki: TestPki::p256(),
            alg: "ES256",
            hashing: HashingAlgorithm::Sha256,
        }
    }

    pub(crate) fn es512() -> Self {
        Self {
            pki: TestPki::p521(),
            alg: "ES512",
            hashing: HashingAlgorithm::Sha512,
        }
    }

    pub(crate) fn credential(&self) -> CredentialBuilder<'_> {
        let now = current_timestamp();
        let mut header = JsonObject::new();
        header.insert("alg".to_owned(), json!(self.alg));
        header.insert("typ".to_owned(), json!("vc+sd-jwt"));
        header.insert("x5c".to_owned(), json!(self.pki.x5c()));

        let claims = json!({
            "iss": ISSUER,
            "vct": VCT,
            "iat": now,
            "exp": now + 3600,
        });

        CredentialBuilder {
            issuer: self,
            header,
            claims: into_object(claims),
            disclosures: Vec::new(),
        }
    }
}

pub(crate) struct CredentialBuilder<'a> {
    issuer: &'a Issuer,
    header: JsonObject,
    claims: JsonObject,
    disclosures: Vec<Disclosure>,
}

impl CredentialBuilder<'_> {
    pub(crate) fn header(mut self, name: &str, value: Value) -> Self {
        self.header.insert(name.to_owned(), value);
        self
    }

    pub(crate) fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_owned(), value);
        self
    }

    pub(crate) fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Adds a selectively disclosable top-level claim.
    pub(crate) fn disclosed(mut self, name: &str, value: Value) -> Self {
        let salt = format!("salt-{}", self.disclosures.len());
        let disclosure = Disclosure::new(salt, Some(name.to_owned()), value);

        let digests = self
            .claims
            .entry("_sd")
            .or_insert_with(|| json!([]))
            .as_array_mut()
            .unwrap();
        digests.push(json!(disclosure.digest(self.issuer.hashing)));
        self.disclosures.push(disclosure);
        self
    }

    pub(crate) fn holder(self, holder: &Holder) -> Self {
        self.claim("cnf", json!({ "jwk": holder.jwk }))
    }

    /// The compact `SD-JWT` without a Key Binding JWT.
    pub(crate) fn issue(&self) -> String {
        let jwt = sign_jws(
            &Value::Object(self.header.clone()),
            &Value::Object(self.claims.clone()),
            &self.issuer.pki.leaf_key,
        );

        let mut sd_jwt = format!("{jwt}~");
        for disclosure in &self.disclosures {
            sd_jwt.push_str(disclosure.as_str());
            sd_jwt.push('~');
        }
        sd_jwt
    }
}

pub(crate) struct Holder {
    key: PKey<Private>,
    pub(crate) jwk: JwkPublic,
}

impl Holder {
    pub(crate) fn new() -> Self {
        let key = generate_ec_key(Nid::X9_62_PRIME256V1);
        let jwk = openssl_ec_pub_key_to_jwk(&key.ec_key().unwrap(), None).unwrap();

        Self { key, jwk }
    }

    /// Appends a Key Binding JWT with the given claims to the `sd_jwt`.
    pub(crate) fn present_with(
        &self,
        sd_jwt: &str,
        hashing: HashingAlgorithm,
        claims: impl FnOnce(&mut JsonObject),
    ) -> String {
        let mut kb_claims = into_object(json!({
            "iat": current_timestamp(),
            "nonce": NONCE,
            "aud": AUDIENCE,
            "sd_hash": hashing.base64_url_digest(sd_jwt.as_bytes()),
        }));
        claims(&mut kb_claims);

        let kb_jwt = sign_jws(
            &json!({ "alg": "ES256", "typ": "kb+jwt" }),
            &Value::Object(kb_claims),
            &self.key,
        );

        format!("{sd_jwt}{kb_jwt}")
    }

    pub(crate) fn present(&self, sd_jwt: &str, hashing: HashingAlgorithm) -> String {
        self.present_with(sd_jwt, hashing, |_| {})
    }
}

/// Panics if the argument is not a JSON object.
pub(crate) fn into_object(value: Value) -> JsonObject {
    if let Value::Object(object) = value {
        object
    } else {
        panic!("`value` is not a JSON object")
    }
}
