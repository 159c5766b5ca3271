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

//! Validation of the Key Binding JWT of an `SD-JWT+KB` presentation.

use bh_credential_core::CredentialVerificationError;
use bh_jws_utils::{
    decode_jws_unverified, ecdsa_verifier, verify_jws, JsonObject, JwkPublic, SigningAlgorithm,
};
use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error,
};
use serde_json::Value;

use crate::{HashingAlgorithm, Result, SdJwt};

/// The required value of the Key Binding `JWT` header `typ` element, as
/// specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#section-5.3-3.1.2.1
pub(crate) const KB_JWT_HEADER_TYP: &str = "kb+jwt";

/// A maximum difference of the time when the Key Binding `JWT` was received by
/// the Verifier and the time when it was created by the Holder, expressed in
/// seconds.
pub(crate) const KB_JWT_EXPIRATION_OFFSET: i64 = 5 * 60;

/// The values the Key Binding JWT is expected to be bound to.
///
/// A value which is not expected is not checked.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct KeyBindingChallenge<'a> {
    pub(crate) aud: Option<&'a str>,
    pub(crate) nonce: Option<&'a str>,
}

/// Validates the Key Binding JWT of the `sd_jwt` presentation.
///
/// The following validation steps are performed:
///   - the signature is verified against the `holder_public_key`,
///   - `typ`: it needs to be `kb+jwt`,
///   - `iat`: the creation time of the Key Binding `JWT` needs to be within
///     an acceptable time window,
///   - `nonce`: it needs to be the same as the one from the `challenge`,
///   - `aud`: it needs to contain the value from the `challenge`,
///   - `sd_hash`: it needs to be the digest of the presentation without the
///     Key Binding JWT.
pub(crate) fn validate_key_binding_jwt(
    sd_jwt: &SdJwt,
    holder_public_key: &JwkPublic,
    alg: HashingAlgorithm,
    challenge: KeyBindingChallenge<'_>,
    current_time: i64,
    clock_tolerance: i64,
) -> Result<(), CredentialVerificationError> {
    let Some(kb_jwt) = sd_jwt.key_binding_jwt() else {
        return Err(Error::root(
            CredentialVerificationError::KbJwtVerificationFailedMissingParameters,
        ))
        .ctx(|| "missing key binding JWT");
    };

    // The header is read before verification only to select the verifier.
    let (header, _) = decode_jws_unverified(kb_jwt)
        .with_err(|| CredentialVerificationError::InvalidFormat)
        .ctx(|| "invalid key binding JWT")?;
    let signing_algorithm = SigningAlgorithm::try_from(header.alg)
        .with_err(|| CredentialVerificationError::UnsupportedAlgorithm)?;

    let (header, claims) = verify_jws(kb_jwt, ecdsa_verifier(signing_algorithm), holder_public_key)
        .with_err(|| CredentialVerificationError::KbJwtVerificationFailedSignatureValidation)?;

    if header.typ.as_deref() != Some(KB_JWT_HEADER_TYP) {
        return Err(Error::root(
            CredentialVerificationError::KbJwtVerificationFailedMissingParameters,
        ))
        .ctx(|| format!("invalid key binding JWT type {:?}", header.typ));
    }

    let iat = required_claim(&claims, "iat", Value::as_i64)?;
    let nonce = required_claim(&claims, "nonce", Value::as_str)?;
    let aud = claims.get("aud").ok_or_else(|| {
        Error::root(CredentialVerificationError::KbJwtVerificationFailedMissingParameters)
    })?;
    let claimed_sd_hash = required_claim(&claims, "sd_hash", Value::as_str)?;

    if iat
        .saturating_add(KB_JWT_EXPIRATION_OFFSET)
        .saturating_add(clock_tolerance)
        < current_time
    {
        return Err(Error::root(CredentialVerificationError::ExpiredCredential))
            .ctx(|| format!("key binding JWT issued at {iat}, current time {current_time}"));
    }
    if iat.saturating_sub(clock_tolerance) > current_time {
        return Err(Error::root(CredentialVerificationError::NotYetValidCredential))
            .ctx(|| format!("key binding JWT issued at {iat}, current time {current_time}"));
    }

    if let Some(expected_nonce) = challenge.nonce {
        if nonce != expected_nonce {
            return Err(Error::root(
                CredentialVerificationError::KbJwtVerificationFailedUnexpectedNonce,
            ));
        }
    }

    if let Some(expected_aud) = challenge.aud {
        if !audience_contains(aud, expected_aud) {
            return Err(Error::root(
                CredentialVerificationError::KbJwtVerificationFailedUnexpectedAudience,
            ))
            .ctx(|| format!("expected audience {expected_aud}, got {aud}"));
        }
    }

    let sd_hash = alg.base64_url_digest(sd_jwt.without_key_binding().as_bytes());
    if claimed_sd_hash != sd_hash {
        return Err(Error::root(
            CredentialVerificationError::KbJwtVerificationFailedWrongSdHash,
        ));
    }

    Ok(())
}

fn required_claim<'a, T>(
    claims: &'a JsonObject,
    name: &str,
    as_type: impl FnOnce(&'a Value) -> Option<T>,
) -> Result<T, CredentialVerificationError> {
    claims
        .get(name)
        .and_then(as_type)
        .ok_or_else(|| {
            Error::root(CredentialVerificationError::KbJwtVerificationFailedMissingParameters)
        })
        .ctx(|| format!("key binding JWT claim {name} is missing"))
}

/// The `aud` claim is either a single string or an array of strings.
fn audience_contains(aud: &Value, expected: &str) -> bool {
    match aud {
        Value::String(aud) => aud == expected,
        Value::Array(auds) => auds.iter().any(|aud| aud.as_str() == Some(expected)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bh_jws_utils::{openssl_ec_pub_key_to_jwk, test_utils::sign_jws};
    use bhx5chain::test_utils::generate_ec_key;
    use openssl::{nid::Nid, pkey::PKey};
    use serde_json::json;

    use super::*;
    use crate::utils::current_timestamp;

    const NONCE: &str = "1234567890";
    const AUDIENCE: &str = "https://verifier.example.org";

    struct Holder {
        key: PKey<openssl::pkey::Private>,
        jwk: JwkPublic,
    }

    impl Holder {
        fn new() -> Self {
            let key = generate_ec_key(Nid::X9_62_PRIME256V1);
            let jwk = openssl_ec_pub_key_to_jwk(&key.ec_key().unwrap(), None).unwrap();
            Self { key, jwk }
        }

        fn present(&self, sd_jwt: &str, header: Value, claims: impl FnOnce(String) -> Value) -> SdJwt {
            let sd_hash = HashingAlgorithm::Sha256.base64_url_digest(sd_jwt.as_bytes());
            let kb_jwt = sign_jws(&header, &claims(sd_hash), &self.key);
            format!("{sd_jwt}{kb_jwt}").parse().unwrap()
        }
    }

    fn header() -> Value {
        json!({ "alg": "ES256", "typ": "kb+jwt" })
    }

    fn claims(sd_hash: String) -> Value {
        json!({
            "iat": current_timestamp(),
            "nonce": NONCE,
            "aud": AUDIENCE,
            "sd_hash": sd_hash,
        })
    }

    const SD_JWT: &str = "eyJhbGciOiJFUzI1NiJ9.eyJpc3MiOiJodHRwczovL2lzc3Vlci5leGFtcGxlLmNvbSJ9.c2ln~WyJzYWx0IiwgIkRFIl0~";

    fn challenge() -> KeyBindingChallenge<'static> {
        KeyBindingChallenge {
            aud: Some(AUDIENCE),
            nonce: Some(NONCE),
        }
    }

    fn validate(holder: &Holder, presentation: &SdJwt) -> Result<(), CredentialVerificationError> {
        validate_key_binding_jwt(
            presentation,
            &holder.jwk,
            HashingAlgorithm::Sha256,
            challenge(),
            current_timestamp(),
            0,
        )
    }

    #[test]
    fn valid_key_binding() {
        let holder = Holder::new();
        let presentation = holder.present(SD_JWT, header(), claims);

        validate(&holder, &presentation).unwrap();
    }

    #[test]
    fn audience_array() {
        let holder = Holder::new();
        let presentation = holder.present(SD_JWT, header(), |sd_hash| {
            let mut claims = claims(sd_hash);
            claims["aud"] = json!(["https://other.example.org", AUDIENCE]);
            claims
        });

        validate(&holder, &presentation).unwrap();
    }

    #[test]
    fn missing_key_binding() {
        let holder = Holder::new();
        let presentation: SdJwt = SD_JWT.parse().unwrap();

        assert_eq!(
            validate(&holder, &presentation).unwrap_err().error,
            CredentialVerificationError::KbJwtVerificationFailedMissingParameters
        );
    }

    #[test]
    fn signed_by_another_key() {
        let holder = Holder::new();
        let presentation = holder.present(SD_JWT, header(), claims);

        assert_eq!(
            validate(&Holder::new(), &presentation).unwrap_err().error,
            CredentialVerificationError::KbJwtVerificationFailedSignatureValidation
        );
    }

    #[test]
    fn invalid_type() {
        let holder = Holder::new();
        let presentation =
            holder.present(SD_JWT, json!({ "alg": "ES256", "typ": "JWT" }), claims);

        assert_eq!(
            validate(&holder, &presentation).unwrap_err().error,
            CredentialVerificationError::KbJwtVerificationFailedMissingParameters
        );
    }

    #[test]
    fn missing_claims() {
        let holder = Holder::new();

        for claim in ["iat", "nonce", "aud", "sd_hash"] {
            let presentation = holder.present(SD_JWT, header(), |sd_hash| {
                let mut claims = claims(sd_hash);
                claims.as_object_mut().unwrap().remove(claim);
                claims
            });

            assert_eq!(
                validate(&holder, &presentation).unwrap_err().error,
                CredentialVerificationError::KbJwtVerificationFailedMissingParameters,
                "{claim}"
            );
        }
    }

    #[test]
    fn unexpected_nonce_and_audience() {
        let holder = Holder::new();

        let presentation = holder.present(SD_JWT, header(), |sd_hash| {
            let mut claims = claims(sd_hash);
            claims["nonce"] = json!("another nonce");
            claims
        });
        assert_eq!(
            validate(&holder, &presentation).unwrap_err().error,
            CredentialVerificationError::KbJwtVerificationFailedUnexpectedNonce
        );

        let presentation = holder.present(SD_JWT, header(), |sd_hash| {
            let mut claims = claims(sd_hash);
            claims["aud"] = json!("https://other.example.org");
            claims
        });
        assert_eq!(
            validate(&holder, &presentation).unwrap_err().error,
            CredentialVerificationError::KbJwtVerificationFailedUnexpectedAudience
        );
    }

    #[test]
    fn unchecked_challenge() {
        let holder = Holder::new();
        let presentation = holder.present(SD_JWT, header(), |sd_hash| {
            let mut claims = claims(sd_hash);
            claims["nonce"] = json!("another nonce");
            claims["aud"] = json!("https://other.example.org");
            claims
        });

        validate_key_binding_jwt(
            &presentation,
            &holder.jwk,
            HashingAlgorithm::Sha256,
            KeyBindingChallenge::default(),
            current_timestamp(),
            0,
        )
        .unwrap();
    }

    #[test]
    fn wrong_sd_hash() {
        let holder = Holder::new();
        let presentation = holder.present(SD_JWT, header(), |_| claims("wrong".to_owned()));

        assert_eq!(
            validate(&holder, &presentation).unwrap_err().error,
            CredentialVerificationError::KbJwtVerificationFailedWrongSdHash
        );
    }

    #[test]
    fn issued_outside_of_time_window() {
        let holder = Holder::new();
        let presentation = holder.present(SD_JWT, header(), claims);
        let now = current_timestamp();

        let expired = validate_key_binding_jwt(
            &presentation,
            &holder.jwk,
            HashingAlgorithm::Sha256,
            challenge(),
            now + KB_JWT_EXPIRATION_OFFSET + 60,
            0,
        );
        assert_matches!(
            expired.unwrap_err().error,
            CredentialVerificationError::ExpiredCredential
        );

        let tolerated = validate_key_binding_jwt(
            &presentation,
            &holder.jwk,
            HashingAlgorithm::Sha256,
            challenge(),
            now + KB_JWT_EXPIRATION_OFFSET + 60,
            120,
        );
        assert!(tolerated.is_ok());

        let future = validate_key_binding_jwt(
            &presentation,
            &holder.jwk,
            HashingAlgorithm::Sha256,
            challenge(),
            now - 60,
            0,
        );
        assert_matches!(
            future.unwrap_err().error,
            CredentialVerificationError::NotYetValidCredential
        );
    }
}
