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

//! The [`CredentialVerifier`] of `mso_mdoc` credentials and their OpenID for
//! Verifiable Presentations `DeviceResponse`s.

use async_trait::async_trait;
use bh_credential_core::{
    Context, CredentialVerificationError, CredentialVerifier, RawCredential, VerificationOutcome,
    VerifyOptions,
};
use bherror::{
    traits::{ErrorContext as _, PropagateError as _},
    Error,
};
use bhx5chain::X509Trust;

use crate::{models::Document, parser::decode_document, MdocError, Result};

/// Verifier of `mso_mdoc` credentials.
///
/// Only the first document of a `DeviceResponse` is verified. The following
/// checks are performed, in order:
///   - the `IssuerAuth` is signed with `ES256`, `ES384` or `ES512`, by the
///     leaf of its `x5chain`,
///   - the `x5chain` chains up to one of the trusted roots,
///   - the Mobile Security Object is issued for the `docType` of the
///     document and holds the digest of every issuer signed data element,
///   - the current time lies in the validity window, with the clock tolerance
///     of the [`Context`],
///   - the device signature over the `DeviceAuthentication`, if the document
///     is device signed, or if a nonce is expected.
///
/// The `SessionTranscript` of the device signature is built from the OpenID
/// for Verifiable Presentations handover, so the
/// [`expected_audience`](VerifyOptions::expected_audience) (the verifier
/// `client_id`), [`response_uri`](VerifyOptions::response_uri),
/// [`expected_nonce`](VerifyOptions::expected_nonce) and
/// [`holder_nonce`](VerifyOptions::holder_nonce) are all required to verify
/// it.
#[derive(Debug, Clone)]
pub struct MsoMdocVerifier {
    trust: Option<X509Trust>,
    clock_tolerance: i64,
}

impl MsoMdocVerifier {
    /// Create a new instance of the [`MsoMdocVerifier`], that will verify the
    /// authenticity of the issuer certificate chain against the provided
    /// trusted roots.
    pub fn with_trust(trust: X509Trust, context: &Context) -> Self {
        Self {
            trust: Some(trust),
            clock_tolerance: clock_tolerance(context),
        }
    }

    /// Create a new instance trusting the certificates of the `context`, or
    /// trusting all issuers if the `context` has none.
    pub fn from_context(context: &Context) -> bhx5chain::Result<Self> {
        let trust = context.trust()?;

        if trust.is_empty() {
            tracing::warn!("Issuer's authenticity will not be verified");

            return Ok(Self {
                trust: None,
                clock_tolerance: clock_tolerance(context),
            });
        }

        Ok(Self::with_trust(trust, context))
    }

    fn verify_issuer_signed(
        &self,
        document: &Document,
        current_time: i64,
    ) -> Result<bh_jws_utils::JwkPublic, CredentialVerificationError> {
        let issuer_signed = document.issuer_signed();
        let issuer_auth = issuer_signed.issuer_auth();

        if issuer_auth.signing_algorithm().is_none() {
            return Err(Error::root(CredentialVerificationError::UnsupportedAlgorithm))
                .ctx(|| "`IssuerAuth` algorithm is missing or unsupported");
        }

        let x5chain = issuer_auth
            .x5chain()
            .with_err(|| CredentialVerificationError::InvalidCertificateChain)?;

        issuer_auth
            .verify_signature(&x5chain)
            .match_err(|error| match error {
                MdocError::InvalidPublicKey => {
                    CredentialVerificationError::CannotResolveIssuerPublicKey
                }
                _ => CredentialVerificationError::InvalidSignature,
            })?;

        if let Some(trust) = &self.trust {
            x5chain
                .verify_against_trusted_roots(trust)
                .with_err(|| CredentialVerificationError::NotTrustedIssuer)?;
        }

        let mso = issuer_auth
            .mso()
            .with_err(|| CredentialVerificationError::InvalidFormat)?;
        mso.validate_doc_type(document.doc_type())
            .with_err(|| CredentialVerificationError::InvalidFormat)?;

        if let Some(name_spaces) = issuer_signed.name_spaces() {
            mso.validate_name_spaces(name_spaces)
                .with_err(|| CredentialVerificationError::MsoMdocInvalidValueDigests)?;
        }

        mso.validity_info()
            .validate(current_time, self.clock_tolerance)
            .match_err(|error| match error {
                MdocError::DocumentNotYetValid(_) => {
                    CredentialVerificationError::NotYetValidCredential
                }
                _ => CredentialVerificationError::ExpiredCredential,
            })?;

        mso.device_key()
            .as_jwk()
            .with_err(|| CredentialVerificationError::MsoMdocMissingDeviceKeyInfo)
    }
}

#[async_trait]
impl CredentialVerifier for MsoMdocVerifier {
    async fn verify(
        &self,
        raw_credential: &RawCredential,
        opts: &VerifyOptions,
    ) -> Result<VerificationOutcome, CredentialVerificationError> {
        let document = decode_document(raw_credential)
            .with_err(|| CredentialVerificationError::InvalidFormat)?;

        let current_time = chrono::Utc::now().timestamp();
        let holder_public_key = self.verify_issuer_signed(&document, current_time)?;

        if document.has_device_signed() {
            let (Some(client_id), Some(response_uri), Some(nonce), Some(mdoc_generated_nonce)) = (
                opts.expected_audience.as_deref(),
                opts.response_uri.as_deref(),
                opts.expected_nonce.as_deref(),
                opts.holder_nonce.as_deref(),
            ) else {
                return Err(Error::root(CredentialVerificationError::MissingOpts))
                    .ctx(|| "the OpenID4VP handover of the device signature is incomplete");
            };

            document
                .verify_device_signature(
                    client_id,
                    response_uri,
                    nonce,
                    mdoc_generated_nonce,
                    &holder_public_key,
                )
                .with_err(|| CredentialVerificationError::MsoMdocInvalidDeviceSignature)?;
        } else if opts.expected_nonce.is_some() {
            return Err(Error::root(
                CredentialVerificationError::MsoMdocInvalidDeviceSignature,
            ))
            .ctx(|| "a nonce is expected, but the document is not device signed");
        }

        Ok(VerificationOutcome { holder_public_key })
    }
}

fn clock_tolerance(context: &Context) -> i64 {
    i64::try_from(context.clock_tolerance).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bh_credential_core::VerifyingEngine;
    use bh_jws_utils::{base64_url_encode, openssl_ec_pub_key_to_jwk};
    use bhx5chain::test_utils::TestPki;
    use openssl::pkey::{PKeyRef, Private};

    use super::*;
    use crate::{
        models::{
            data_retrieval::device_retrieval::{
                issuer_auth::ValidityInfo, response::IssuerSignedItem,
            },
            DeviceResponse,
        },
        utils::test::{
            device_key, issue_mdoc, issuer_signed_cbor, present_mdoc, third_party, validity_info,
            CLIENT_ID, MDOC_GENERATED_NONCE, NONCE, RESPONSE_URI,
        },
    };

    fn opts() -> VerifyOptions {
        VerifyOptions {
            expected_nonce: Some(NONCE.to_owned()),
            expected_audience: Some(CLIENT_ID.to_owned()),
            holder_nonce: Some(MDOC_GENERATED_NONCE.to_owned()),
            response_uri: Some(RESPONSE_URI.to_owned()),
        }
    }

    fn verifier(pki: &TestPki) -> MsoMdocVerifier {
        MsoMdocVerifier::with_trust(pki.trust(), &Context::default())
    }

    fn encode(device_response: &DeviceResponse) -> RawCredential {
        base64_url_encode(device_response.to_cbor()).into()
    }

    fn assert_holder_key(outcome: &VerificationOutcome, device_key: &PKeyRef<Private>) {
        let expected = openssl_ec_pub_key_to_jwk(&device_key.ec_key().unwrap(), None).unwrap();

        assert_eq!(outcome.holder_public_key["kty"], expected["kty"]);
        assert_eq!(outcome.holder_public_key["crv"], expected["crv"]);
        assert_eq!(outcome.holder_public_key["x"], expected["x"]);
        assert_eq!(outcome.holder_public_key["y"], expected["y"]);
    }

    async fn verify_presentation(
        verifier: &MsoMdocVerifier,
        pki: &TestPki,
        validity_info: ValidityInfo,
        opts: &VerifyOptions,
    ) -> Result<VerificationOutcome, CredentialVerificationError> {
        let device_key = device_key();
        let issuer_signed = issue_mdoc(pki, &device_key, validity_info);
        let device_response = present_mdoc(issuer_signed, &device_key, NONCE);

        verifier.verify(&encode(&device_response), opts).await
    }

    #[tokio::test]
    async fn verifies_presentation() {
        let pki = TestPki::p256();
        let device_key = device_key();
        let issuer_signed = issue_mdoc(&pki, &device_key, validity_info(-60, 3600));
        let device_response = present_mdoc(issuer_signed, &device_key, NONCE);

        let outcome = verifier(&pki)
            .verify(&encode(&device_response), &opts())
            .await
            .unwrap();

        assert_holder_key(&outcome, &device_key);
    }

    #[tokio::test]
    async fn verifies_presentation_issued_with_es512() {
        let pki = TestPki::p521();

        verify_presentation(&verifier(&pki), &pki, validity_info(-60, 3600), &opts())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn verifies_raw_bytes() {
        let pki = TestPki::p256();
        let device_key = device_key();
        let issuer_signed = issue_mdoc(&pki, &device_key, validity_info(-60, 3600));
        let device_response = present_mdoc(issuer_signed, &device_key, NONCE);

        verifier(&pki)
            .verify(&RawCredential::Bytes(device_response.to_cbor()), &opts())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn verifies_with_trust_from_context() {
        let pki = TestPki::p256();
        let context = Context {
            trusted_certificates: pki.trusted_certificates(),
            ..Default::default()
        };
        let verifier = MsoMdocVerifier::from_context(&context).unwrap();

        verify_presentation(&verifier, &pki, validity_info(-60, 3600), &opts())
            .await
            .unwrap();

        let other = TestPki::p256();
        let result =
            verify_presentation(&verifier, &other, validity_info(-60, 3600), &opts()).await;

        assert_matches!(result, Err(e) if e.error == CredentialVerificationError::NotTrustedIssuer);
    }

    #[tokio::test]
    async fn verifies_through_verifying_engine() {
        let pki = TestPki::p256();
        let device_key = device_key();
        let issuer_signed = issue_mdoc(&pki, &device_key, validity_info(-60, 3600));
        let device_response = present_mdoc(issuer_signed, &device_key, NONCE);

        let mut engine = VerifyingEngine::new();
        engine.register(verifier(&pki));

        let outcome = engine
            .verify(&encode(&device_response), &opts())
            .await
            .unwrap();

        assert_holder_key(&outcome, &device_key);
    }

    #[tokio::test]
    async fn rejects_untrusted_issuer() {
        let result = verify_presentation(
            &verifier(&TestPki::p256()),
            &TestPki::p256(),
            validity_info(-60, 3600),
            &opts(),
        )
        .await;

        assert_matches!(result, Err(e) if e.error == CredentialVerificationError::NotTrustedIssuer);
    }

    #[tokio::test]
    async fn rejects_tampered_data_element() {
        let pki = TestPki::p256();
        let device_key = device_key();
        let mut issuer_signed = issue_mdoc(&pki, &device_key, validity_info(-60, 3600));
        issuer_signed.name_spaces.as_mut().unwrap().0[0].1[0] =
            IssuerSignedItem::new(0, vec![0; 32], "family_name", "Roe").into();
        let device_response = present_mdoc(issuer_signed, &device_key, NONCE);

        let result = verifier(&pki).verify(&encode(&device_response), &opts()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::MsoMdocInvalidValueDigests
        );
    }

    #[tokio::test]
    async fn rejects_expired_credential() {
        let pki = TestPki::p256();

        let result =
            verify_presentation(&verifier(&pki), &pki, validity_info(-7200, -3600), &opts()).await;

        assert_matches!(result, Err(e) if e.error == CredentialVerificationError::ExpiredCredential);
    }

    #[tokio::test]
    async fn rejects_not_yet_valid_credential() {
        let pki = TestPki::p256();

        let result =
            verify_presentation(&verifier(&pki), &pki, validity_info(3600, 7200), &opts()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::NotYetValidCredential
        );
    }

    #[tokio::test]
    async fn tolerates_clock_skew() {
        let pki = TestPki::p256();
        let context = Context {
            clock_tolerance: 120,
            ..Default::default()
        };
        let verifier = MsoMdocVerifier::with_trust(pki.trust(), &context);

        verify_presentation(&verifier, &pki, validity_info(-600, -60), &opts())
            .await
            .unwrap();
        verify_presentation(&verifier, &pki, validity_info(60, 600), &opts())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn requires_complete_handover() {
        let pki = TestPki::p256();

        for opts in [
            VerifyOptions {
                expected_audience: None,
                ..opts()
            },
            VerifyOptions {
                response_uri: None,
                ..opts()
            },
            VerifyOptions {
                expected_nonce: None,
                ..opts()
            },
            VerifyOptions {
                holder_nonce: None,
                ..opts()
            },
        ] {
            let result =
                verify_presentation(&verifier(&pki), &pki, validity_info(-60, 3600), &opts).await;

            assert_matches!(result, Err(e) if e.error == CredentialVerificationError::MissingOpts);
        }
    }

    #[tokio::test]
    async fn rejects_invalid_device_signature() {
        let pki = TestPki::p256();

        for opts in [
            VerifyOptions {
                expected_nonce: Some("other-nonce".to_owned()),
                ..opts()
            },
            VerifyOptions {
                expected_audience: Some("https://other.example.com".to_owned()),
                ..opts()
            },
            VerifyOptions {
                holder_nonce: Some("other-mdoc-nonce".to_owned()),
                ..opts()
            },
        ] {
            let result =
                verify_presentation(&verifier(&pki), &pki, validity_info(-60, 3600), &opts).await;

            assert_matches!(
                result,
                Err(e) if e.error == CredentialVerificationError::MsoMdocInvalidDeviceSignature
            );
        }
    }

    fn issued_credential(pki: &TestPki) -> RawCredential {
        let issuer_signed = issue_mdoc(pki, &device_key(), validity_info(-60, 3600));

        base64_url_encode(issuer_signed_cbor(&issuer_signed)).into()
    }

    #[tokio::test]
    async fn verifies_issued_credential_without_nonce() {
        let pki = TestPki::p256();
        let raw_credential = issued_credential(&pki);

        verifier(&pki)
            .verify(&raw_credential, &VerifyOptions::default())
            .await
            .unwrap();

        let result = verifier(&pki).verify(&raw_credential, &opts()).await;

        assert_matches!(
            result,
            Err(e) if e.error == CredentialVerificationError::MsoMdocInvalidDeviceSignature
        );
    }

    fn third_party_opts() -> VerifyOptions {
        VerifyOptions {
            expected_nonce: Some(third_party::VERIFIER_NONCE.to_owned()),
            expected_audience: Some(third_party::CLIENT_ID.to_owned()),
            holder_nonce: Some(third_party::MDOC_GENERATED_NONCE.to_owned()),
            response_uri: Some(third_party::RESPONSE_URI.to_owned()),
        }
    }

    #[tokio::test]
    async fn verifies_third_party_presentation() {
        let verifier = MsoMdocVerifier::from_context(&Context::default()).unwrap();

        let result = verifier
            .verify(&third_party::VP_TOKEN.into(), &third_party_opts())
            .await;

        assert_matches!(result, Err(e) if e.error == CredentialVerificationError::ExpiredCredential);

        let context = Context {
            clock_tolerance: 100 * 365 * 24 * 60 * 60,
            ..Default::default()
        };
        let verifier = MsoMdocVerifier::from_context(&context).unwrap();

        let outcome = verifier
            .verify(&third_party::VP_TOKEN.into(), &third_party_opts())
            .await
            .unwrap();

        assert_eq!(outcome.holder_public_key["crv"], "P-256");
    }

    #[tokio::test]
    async fn rejects_malformed_input() {
        let pki = TestPki::p256();

        for malformed in ["", "not base64!", "o2d2ZXJzaW9u"] {
            let result = verifier(&pki).verify(&malformed.into(), &opts()).await;

            assert_matches!(result, Err(e) if e.error == CredentialVerificationError::InvalidFormat);
        }
    }
}
