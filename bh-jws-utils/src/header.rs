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

use bherror::traits::{ForeignBoxed as _, ForeignError as _};
use serde::{Deserialize, Serialize};

use crate::{FormatError, JsonObject, JwkPublic, JwtVerifier as _, SignatureError, SignatureVerifier};

/// JOSE header of a compact JWS.
///
/// Unlike [`jwt::Header`], any `typ` value is accepted (e.g. `vc+sd-jwt`,
/// `dc+sd-jwt` or `kb+jwt`), and unknown parameters are kept in
/// [`JwsHeader::params`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// The `alg` header parameter.
    pub alg: jwt::AlgorithmType,
    /// The `typ` header parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// The `kid` header parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// The `x5c` header parameter, base64 (**not** base64url) encoded DER
    /// certificates, leaf first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
    /// All the other header parameters.
    #[serde(flatten)]
    pub params: JsonObject,
}

impl jwt::JoseHeader for JwsHeader {
    fn algorithm_type(&self) -> jwt::AlgorithmType {
        self.alg
    }

    fn key_id(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

/// Decodes the header and the claims of a compact JWS **without** verifying
/// its signature.
pub fn decode_jws_unverified(jws: &str) -> bherror::Result<(JwsHeader, JsonObject), FormatError> {
    let token: jwt::Token<JwsHeader, JsonObject, jwt::Unverified> =
        jwt::Token::parse_unverified(jws)
            .foreign_err(|| FormatError::InvalidJws("cannot decode compact JWS".to_owned()))?;

    Ok((token.header().clone(), token.claims().clone()))
}

/// Verifies the signature of a compact JWS against `public_key` and returns
/// its header and claims.
///
/// The `alg` header parameter must match [`SignatureVerifier::algorithm`].
pub fn verify_jws(
    jws: &str,
    verifier: &dyn SignatureVerifier,
    public_key: &JwkPublic,
) -> bherror::Result<(JwsHeader, JsonObject), SignatureError> {
    let token: jwt::Token<JwsHeader, JsonObject, jwt::Verified> = verifier
        .verify_jwt_signature(jws, public_key)
        .foreign_boxed_err(|| SignatureError::InvalidSignature)?;

    Ok((token.header().clone(), token.claims().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{json_object, Es256Verifier};

    // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#appendix-A.5-2
    fn issuer_public_jwk() -> JwkPublic {
        json_object!({
            "kty": "EC",
            "crv": "P-256",
            "x": "b28d4MwZMjw8-00CG4xfnn9SLMVMM19SlqZpVb_uNtQ",
            "y": "Xv5zWwuoaTgdS6hV43yI6gBwTnjukmFQQnJ_kCxzqk8"
        })
    }

    // Issuer-signed JWT of the SD-JWT VC example in
    // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#appendix-A.3-53
    const ISSUER_JWT: &str = "\
        eyJhbGciOiAiRVMyNTYiLCAidHlwIjogInZjK3NkLWp3dCJ9.eyJfc2QiOiBbIjBIWm1\
        uU0lQejMzN2tTV2U3QzM0bC0tODhnekppLWVCSjJWel9ISndBVGciLCAiOVpicGxDN1R\
        kRVc3cWFsNkJCWmxNdHFKZG1lRU9pWGV2ZEpsb1hWSmRSUSIsICJJMDBmY0ZVb0RYQ3V\
        jcDV5eTJ1anFQc3NEVkdhV05pVWxpTnpfYXdEMGdjIiwgIklFQllTSkdOaFhJbHJRbzU\
        4eWtYbTJaeDN5bGw5WmxUdFRvUG8xN1FRaVkiLCAiTGFpNklVNmQ3R1FhZ1hSN0F2R1R\
        yblhnU2xkM3o4RUlnX2Z2M2ZPWjFXZyIsICJodkRYaHdtR2NKUXNCQ0EyT3RqdUxBY3d\
        BTXBEc2FVMG5rb3ZjS09xV05FIiwgImlrdXVyOFE0azhxM1ZjeUE3ZEMtbU5qWkJrUmV\
        EVFUtQ0c0bmlURTdPVFUiLCAicXZ6TkxqMnZoOW80U0VYT2ZNaVlEdXZUeWtkc1dDTmc\
        wd1RkbHIwQUVJTSIsICJ3elcxNWJoQ2t2a3N4VnZ1SjhSRjN4aThpNjRsbjFqb183NkJ\
        DMm9hMXVnIiwgInpPZUJYaHh2SVM0WnptUWNMbHhLdUVBT0dHQnlqT3FhMXoySW9WeF9\
        ZRFEiXSwgImlzcyI6ICJodHRwczovL2lzc3Vlci5leGFtcGxlLmNvbSIsICJpYXQiOiA\
        xNjgzMDAwMDAwLCAiZXhwIjogMTg4MzAwMDAwMCwgInZjdCI6ICJodHRwczovL2JtaS5\
        idW5kLmV4YW1wbGUvY3JlZGVudGlhbC9waWQvMS4wIiwgImFnZV9lcXVhbF9vcl9vdmV\
        yIjogeyJfc2QiOiBbIkZjOElfMDdMT2NnUHdyREpLUXlJR085N3dWc09wbE1Makh2UkM\
        0UjQtV2ciLCAiWEx0TGphZFVXYzl6Tl85aE1KUm9xeTQ2VXNDS2IxSXNoWnV1cVVGS1N\
        DQSIsICJhb0NDenNDN3A0cWhaSUFoX2lkUkNTQ2E2NDF1eWNuYzh6UGZOV3o4bngwIiw\
        gImYxLVAwQTJkS1dhdnYxdUZuTVgyQTctRVh4dmhveHY1YUhodUVJTi1XNjQiLCAiazV\
        oeTJyMDE4dnJzSmpvLVZqZDZnNnl0N0Fhb25Lb25uaXVKOXplbDNqbyIsICJxcDdaX0t\
        5MVlpcDBzWWdETzN6VnVnMk1GdVBOakh4a3NCRG5KWjRhSS1jIl19LCAiX3NkX2FsZyI\
        6ICJzaGEtMjU2IiwgImNuZiI6IHsiandrIjogeyJrdHkiOiAiRUMiLCAiY3J2IjogIlA\
        tMjU2IiwgIngiOiAiVENBRVIxOVp2dTNPSEY0ajRXNHZmU1ZvSElQMUlMaWxEbHM3dkN\
        lR2VtYyIsICJ5IjogIlp4amlXV2JaTVFHSFZXS1ZRNGhiU0lpcnNWZnVlY0NFNnQ0alQ\
        5RjJIWlEifX19.jeF9GjGbjCr0NND0SbkV4HeSpsysixALFScJl4bYkIykXhF6cRtqni\
        64_d7X6Ef8Rx80rfsgXe0H7TdiSoIJOw";

    #[test]
    fn decode_unverified() {
        let (header, claims) = decode_jws_unverified(ISSUER_JWT).unwrap();

        assert_eq!(header.typ.as_deref(), Some("vc+sd-jwt"));
        assert!(header.x5c.is_none());
        assert_eq!(claims["iss"], "https://issuer.example.com");
        assert_eq!(claims["_sd_alg"], "sha-256");
    }

    #[test]
    fn decode_malformed() {
        let error = decode_jws_unverified("not-a-jws").unwrap_err();
        assert!(matches!(error.error, FormatError::InvalidJws(_)));
    }

    #[test]
    fn verify_example_jwt() {
        let (header, claims) = verify_jws(ISSUER_JWT, &Es256Verifier, &issuer_public_jwk()).unwrap();

        assert_eq!(header.alg, jwt::AlgorithmType::Es256);
        assert_eq!(claims["exp"], 1883000000);
    }

    #[test]
    fn verify_with_wrong_key_fails() {
        let mut wrong_jwk = issuer_public_jwk();
        // the holder key of the same example
        wrong_jwk.insert(
            "x".to_owned(),
            "TCAER19Zvu3OHF4j4W4vfSVoHIP1ILilDls7vCeGemc".into(),
        );
        wrong_jwk.insert(
            "y".to_owned(),
            "ZxjiWWbZMQGHVWKVQ4hbSIirsVfuecCE6t4jT9F2HZQ".into(),
        );

        let error = verify_jws(ISSUER_JWT, &Es256Verifier, &wrong_jwk).unwrap_err();
        assert_eq!(error.error, SignatureError::InvalidSignature);
    }

    #[test]
    fn verify_with_mismatched_algorithm_fails() {
        let error =
            verify_jws(ISSUER_JWT, &crate::Es512Verifier, &issuer_public_jwk()).unwrap_err();
        assert_eq!(error.error, SignatureError::InvalidSignature);
    }
}
