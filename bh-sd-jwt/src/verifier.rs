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

//! The [`CredentialVerifier`] of SD-JWT Verifiable Credentials and their
//! `SD-JWT+KB` presentations.

use async_trait::async_trait;
use bh_credential_core::{
    Context, CredentialVerificationError, CredentialVerifier, PublicKeyRequest,
    PublicKeyResolverEngine, RawCredential, VerificationOutcome, VerifyOptions,
};
use bh_jws_utils::{decode_jws_unverified, ecdsa_verifier, verify_jws, SigningAlgorithm};
use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error,
};
use serde_json::Value;

use crate::{
    decoder::decode_disclosed_claims,
    key_binding::{validate_key_binding_jwt, KeyBindingChallenge},
    utils::current_timestamp,
    HashingAlgorithm, JsonObject, Result, SdJwt,
};

/// Verifier of SD-JWT VCs.
///
/// The following checks are performed, in order:
///   - the Issuer-signed JWT is signed with `ES256` or `ES512`,
///   - the signature verifies against the issuer key resolved by the
///     registered [`PublicKeyResolver`](bh_credential_core::PublicKeyResolver)s,
///   - `exp` and `nbf`, if present, hold at the current time, with the clock
///     tolerance of the [`Context`],
///   - every disclosure is referenced by a digest of the credential,
///   - the credential is bound to a holder key with `cnf.jwk`,
///   - the Key Binding JWT, if present, or if a nonce is expected.
///
/// Key Binding is required whenever [`VerifyOptions::expected_nonce`] is set.
/// The audience of the Key Binding JWT is only checked against
/// [`VerifyOptions::expected_audience`] when the latter is set.
pub struct SdJwtVcVerifier {
    key_resolvers: PublicKeyResolverEngine,
    clock_tolerance: i64,
}

impl SdJwtVcVerifier {
    /// Creates a verifier resolving issuer keys with `key_resolvers`.
    pub fn new(key_resolvers: PublicKeyResolverEngine, context: &Context) -> Self {
        Self {
            key_resolvers,
            clock_tolerance: i64::try_from(context.clock_tolerance).unwrap_or(i64::MAX),
        }
    }

    fn check_validity_window(
        &self,
        claims: &JsonObject,
        current_time: i64,
    ) -> Result<(), CredentialVerificationError> {
        if let Some(exp) = numeric_claim(claims, "exp")? {
            if current_time >= exp.saturating_add(self.clock_tolerance) {
                return Err(Error::root(CredentialVerificationError::ExpiredCredential))
                    .ctx(|| format!("current time is {current_time}, expiration is {exp}"));
            }
        }

        if let Some(nbf) = numeric_claim(claims, "nbf")? {
            if current_time < nbf.saturating_sub(self.clock_tolerance) {
                return Err(Error::root(CredentialVerificationError::NotYetValidCredential))
                    .ctx(|| format!("current time is {current_time}, nbf is {nbf}"));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CredentialVerifier for SdJwtVcVerifier {
    async fn verify(
        &self,
        raw_credential: &RawCredential,
        opts: &VerifyOptions,
    ) -> Result<VerificationOutcome, CredentialVerificationError> {
        let Some(text) = raw_credential.as_text() else {
            return Err(Error::root(CredentialVerificationError::InvalidDatatype));
        };

        let sd_jwt: SdJwt = text
            .parse()
            .with_err(|| CredentialVerificationError::InvalidFormat)?;

        let (header, payload) = decode_jws_unverified(sd_jwt.jwt())
            .with_err(|| CredentialVerificationError::InvalidFormat)?;
        let hashing_algorithm = HashingAlgorithm::from_signing_algorithm(header.alg)
            .with_err(|| CredentialVerificationError::UnsupportedAlgorithm)?;
        let signing_algorithm = SigningAlgorithm::try_from(header.alg)
            .with_err(|| CredentialVerificationError::UnsupportedAlgorithm)?;

        let request = PublicKeyRequest {
            issuer: payload
                .get("iss")
                .and_then(Value::as_str)
                .map(str::to_owned),
            header,
        };
        let issuer_key = self
            .key_resolvers
            .resolve(&request)
            .await
            .with_err(|| CredentialVerificationError::CannotResolveIssuerPublicKey)?;

        let (_, claims) = verify_jws(
            sd_jwt.jwt(),
            ecdsa_verifier(signing_algorithm),
            &issuer_key.jwk,
        )
        .with_err(|| CredentialVerificationError::InvalidSignature)?;

        let current_time = current_timestamp();
        self.check_validity_window(&claims, current_time)?;

        let disclosures = sd_jwt
            .parse_disclosures()
            .with_err(|| CredentialVerificationError::InvalidDisclosures)?;
        decode_disclosed_claims(&claims, &disclosures, hashing_algorithm)
            .with_err(|| CredentialVerificationError::InvalidDisclosures)?;

        let Some(holder_public_key) = claims
            .get("cnf")
            .and_then(|cnf| cnf.get("jwk"))
            .and_then(Value::as_object)
        else {
            return Err(Error::root(
                CredentialVerificationError::CannotExtractHolderPublicKey,
            ))
            .ctx(|| "missing `cnf.jwk` claim");
        };

        if sd_jwt.key_binding_jwt().is_some() || opts.expected_nonce.is_some() {
            let challenge = KeyBindingChallenge {
                aud: opts.expected_audience.as_deref(),
                nonce: opts.expected_nonce.as_deref(),
            };

            validate_key_binding_jwt(
                &sd_jwt,
                holder_public_key,
                hashing_algorithm,
                challenge,
                current_time,
                self.clock_tolerance,
            )?;
        }

        Ok(VerificationOutcome {
            holder_public_key: holder_public_key.clone(),
        })
    }
}

/// Returns the numeric date claim, if present.
fn numeric_claim(
    claims: &JsonObject,
    name: &str,
) -> Result<Option<i64>, CredentialVerificationError> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::root(CredentialVerificationError::InvalidFormat))
            .ctx(|| format!("`{name}` is not a numeric date")),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bh_credential_core::{PublicKeyResolver, VerifyingEngine};
    use bhx5chain::test_utils::TestPki;
    use serde_json::json;

    use super::*;
    use crate::{
        lookup::X5cPublicKeyResolver,
        test_utils::{Holder, Issuer, AUDIENCE, NONCE},
        Disclosure,
    };

    fn verifier_trusting(pki: &TestPki, context: &Context) -> SdJwtVcVerifier {
        let mut key_resolvers = PublicKeyResolverEngine::new();
        key_resolvers.register(X5cPublicKeyResolver::with_trust(pki.trust()));

        SdJwtVcVerifier::new(key_resolvers, context)
    }

    fn verifier(issuer: &Issuer) -> SdJwtVcVerifier {
        verifier_trusting(&issuer.pki, &Context::default())
    }

    fn opts() -> VerifyOptions {
        VerifyOptions {
            expected_nonce: Some(NONCE.to_owned()),
            expected_audience: Some(AUDIENCE.to_owned()),
            ..Default::default()
        }
    }

    async fn verify(
        verifier: &SdJwtVcVerifier,
        presentation: &str,
        opts: &VerifyOptions,
    ) -> Result<VerificationOutcome, CredentialVerificationError> {
        verifier.verify(&presentation.into(), opts).await
    }

    #[tokio::test]
    async fn verifies_presentation_with_key_binding() {
        let issuer = Issuer::es256();
        let holder = Holder::new();
        let credential = issuer
            .credential()
            .disclosed("given_name", json!("Erika"))
            .holder(&holder)
            .issue();
        let presentation = holder.present(&credential, HashingAlgorithm::Sha256);

        let outcome = verify(&verifier(&issuer), &presentation, &opts())
            .await
            .unwrap();

        assert_eq!(outcome.holder_public_key, holder.jwk);
    }

    #[tokio::test]
    async fn verifies_es512_presentation() {
        let issuer = Issuer::es512();
        let holder = Holder::new();
        let credential = issuer
            .credential()
            .disclosed("age_over_18", json!(true))
            .holder(&holder)
            .issue();
        let presentation = holder.present(&credential, HashingAlgorithm::Sha512);

        let outcome = verify(&verifier(&issuer), &presentation, &opts())
            .await
            .unwrap();

        assert_eq!(outcome.holder_public_key, holder.jwk);
    }

    #[tokio::test]
    async fn verifies_credential_without_key_binding() {
        let issuer = Issuer::es256();
        let holder = Holder::new();
        let credential = issuer.credential().holder(&holder).issue();

        let outcome = verify(&verifier(&issuer), &credential, &VerifyOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.holder_public_key, holder.jwk);
    }

    #[tokio::test]
    async fn verifies_through_verifying_engine() {
        let issuer = Issuer::es256();
        let holder = Holder::new();
        let credential = issuer.credential().holder(&holder).issue();
        let presentation = holder.present(&credential, HashingAlgorithm::Sha256);

        let mut engine = VerifyingEngine::new();
        engine.register(verifier(&issuer));

        let outcome = engine
            .verify(&presentation.into(), &opts())
            .await
            .unwrap();

        assert_eq!(outcome.holder_public_key, holder.jwk);
    }

    #[tokio::test]
    async fn requires_key_binding_when_nonce_is_expected() {
        let issuer = Issuer::es256();
        let credential = issuer.credential().holder(&Holder::new()).issue();

        let result = verify(&verifier(&issuer), &credential, &opts()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::KbJwtVerificationFailedMissingParameters
        );
    }

    #[tokio::test]
    async fn rejects_binary_input() {
        let issuer = Issuer::es256();

        let result = verifier(&issuer)
            .verify(&RawCredential::Bytes(vec![1, 2, 3]), &opts())
            .await;

        assert_matches!(result, Err(e) if e.error == CredentialVerificationError::InvalidDatatype);
    }

    #[tokio::test]
    async fn rejects_malformed_input() {
        let issuer = Issuer::es256();

        for malformed in ["", "~", "not.a.jwt~"] {
            let result = verify(&verifier(&issuer), malformed, &opts()).await;

            assert_matches!(result, Err(e) if e.error == CredentialVerificationError::InvalidFormat);
        }
    }

    #[tokio::test]
    async fn rejects_unsupported_algorithm() {
        let issuer = Issuer::es256();
        let credential = issuer.credential().header("alg", json!("ES384")).issue();

        let result = verify(&verifier(&issuer), &credential, &opts()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::UnsupportedAlgorithm
        );
    }

    #[tokio::test]
    async fn rejects_untrusted_issuer() {
        let issuer = Issuer::es256();
        let holder = Holder::new();
        let credential = issuer.credential().holder(&holder).issue();
        let presentation = holder.present(&credential, HashingAlgorithm::Sha256);

        let verifier = verifier_trusting(&TestPki::p256(), &Context::default());
        let result = verify(&verifier, &presentation, &opts()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::CannotResolveIssuerPublicKey
        );
    }

    #[tokio::test]
    async fn rejects_tampered_signature() {
        let issuer = Issuer::es256();
        let credential = issuer.credential().holder(&Holder::new()).issue();

        // swap the payload with one the issuer never signed
        let (jwt, disclosures) = credential.split_once('~').unwrap();
        let mut parts: Vec<&str> = jwt.split('.').collect();
        let forged_payload =
            bh_jws_utils::base64_url_encode(json!({ "iss": "https://attacker.example" }).to_string());
        parts[1] = &forged_payload;
        let forged = format!("{}~{disclosures}", parts.join("."));

        let result = verify(&verifier(&issuer), &forged, &VerifyOptions::default()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::InvalidSignature
        );
    }

    #[tokio::test]
    async fn rejects_expired_credential() {
        let issuer = Issuer::es256();
        let now = current_timestamp();
        let credential = issuer
            .credential()
            .claim("exp", json!(now - 60))
            .holder(&Holder::new())
            .issue();

        let result = verify(&verifier(&issuer), &credential, &VerifyOptions::default()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::ExpiredCredential
        );
    }

    #[tokio::test]
    async fn clock_tolerance_extends_validity() {
        let issuer = Issuer::es256();
        let now = current_timestamp();
        let credential = issuer
            .credential()
            .claim("exp", json!(now - 60))
            .claim("nbf", json!(now + 60))
            .holder(&Holder::new())
            .issue();
        let context = Context {
            clock_tolerance: 600,
            ..Default::default()
        };

        let verifier = verifier_trusting(&issuer.pki, &context);
        let result = verify(&verifier, &credential, &VerifyOptions::default()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn rejects_not_yet_valid_credential() {
        let issuer = Issuer::es256();
        let credential = issuer
            .credential()
            .claim("nbf", json!(current_timestamp() + 3600))
            .holder(&Holder::new())
            .issue();

        let result = verify(&verifier(&issuer), &credential, &VerifyOptions::default()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::NotYetValidCredential
        );
    }

    #[tokio::test]
    async fn rejects_unreferenced_disclosure() {
        let issuer = Issuer::es256();
        let credential = issuer.credential().holder(&Holder::new()).issue();
        let stray = Disclosure::new("salt".to_owned(), Some("admin".to_owned()), json!(true));
        let credential = format!("{credential}{}~", stray.as_str());

        let result = verify(&verifier(&issuer), &credential, &VerifyOptions::default()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::InvalidDisclosures
        );
    }

    #[tokio::test]
    async fn rejects_credential_without_holder_key() {
        let issuer = Issuer::es256();
        let credential = issuer.credential().issue();

        let result = verify(&verifier(&issuer), &credential, &VerifyOptions::default()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::CannotExtractHolderPublicKey
        );
    }

    #[tokio::test]
    async fn rejects_key_binding_of_another_holder() {
        let issuer = Issuer::es256();
        let credential = issuer.credential().holder(&Holder::new()).issue();
        let presentation = Holder::new().present(&credential, HashingAlgorithm::Sha256);

        let result = verify(&verifier(&issuer), &presentation, &opts()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::KbJwtVerificationFailedSignatureValidation
        );
    }

    #[tokio::test]
    async fn rejects_unexpected_nonce_and_audience() {
        let issuer = Issuer::es256();
        let holder = Holder::new();
        let credential = issuer.credential().holder(&holder).issue();

        let presentation = holder.present_with(&credential, HashingAlgorithm::Sha256, |claims| {
            claims.insert("nonce".to_owned(), json!("replayed"));
        });
        let result = verify(&verifier(&issuer), &presentation, &opts()).await;
        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::KbJwtVerificationFailedUnexpectedNonce
        );

        let presentation = holder.present_with(&credential, HashingAlgorithm::Sha256, |claims| {
            claims.insert("aud".to_owned(), json!(["https://other.example.org"]));
        });
        let result = verify(&verifier(&issuer), &presentation, &opts()).await;
        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::KbJwtVerificationFailedUnexpectedAudience
        );
    }

    #[tokio::test]
    async fn rejects_key_binding_over_other_disclosures() {
        let issuer = Issuer::es256();
        let holder = Holder::new();
        let credential = issuer
            .credential()
            .disclosed("given_name", json!("Erika"))
            .disclosed("family_name", json!("Mustermann"))
            .holder(&holder)
            .issue();
        let presentation = holder.present(&credential, HashingAlgorithm::Sha256);

        // drop the last disclosure after the key binding JWT was created
        let sd_jwt: SdJwt = presentation.parse().unwrap();
        let stripped = format!(
            "{}~{}~{}",
            sd_jwt.jwt(),
            sd_jwt.disclosures()[0],
            sd_jwt.key_binding_jwt().unwrap()
        );

        let result = verify(&verifier(&issuer), &stripped, &opts()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::KbJwtVerificationFailedWrongSdHash
        );
    }

    #[tokio::test]
    async fn resolves_key_with_issuer_identifier() {
        struct ExpectIssuer(X5cPublicKeyResolver);

        #[async_trait]
        impl PublicKeyResolver for ExpectIssuer {
            async fn resolve(
                &self,
                request: &PublicKeyRequest,
            ) -> Result<bh_credential_core::ResolvedPublicKey, bh_credential_core::PublicKeyResolutionError>
            {
                assert_eq!(request.issuer.as_deref(), Some(crate::test_utils::ISSUER));
                self.0.resolve(request).await
            }
        }

        let issuer = Issuer::es256();
        let credential = issuer.credential().holder(&Holder::new()).issue();
        let mut key_resolvers = PublicKeyResolverEngine::new();
        key_resolvers.register(ExpectIssuer(X5cPublicKeyResolver::with_trust(
            issuer.pki.trust(),
        )));
        let verifier = SdJwtVcVerifier::new(key_resolvers, &Context::default());

        assert!(verify(&verifier, &credential, &VerifyOptions::default())
            .await
            .is_ok());
    }
}
