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

use std::cell::Cell;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bherror::traits::{ErrorContext as _, ForeignError as _, PropagateError as _};

use crate::{FormatError, JwkPublic, SignatureVerifier};

/// Type alias for a boxed error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Create payload for a `JWS`, given its header and claims.
///
/// The payload is constructed by concatenating the header and claims by `.`
/// character, i.e. `<header>.<claims>`, as defined [here].
///
/// [here]: https://www.rfc-editor.org/rfc/rfc7515.html#section-5.1
pub fn construct_jws_payload(header: &str, claims: &str) -> String {
    format!("{header}.{claims}")
}

/// Returns the `base64url`-encoded string of the given `input`, **without**
/// padding.
pub fn base64_url_encode<T: AsRef<[u8]>>(input: T) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Decodes the given `base64url`-encoded `payload` into bytes.
///
/// Trailing `=` padding is tolerated and ignored. An unpadded length of `4n + 1`
/// cannot be produced by any byte sequence and is rejected with
/// [`FormatError::InvalidBase64Length`] instead of being truncated.
pub fn base64_url_decode<T: AsRef<[u8]>>(payload: T) -> bherror::Result<Vec<u8>, FormatError> {
    let payload = payload.as_ref();
    let unpadded_len = payload
        .iter()
        .rposition(|byte| *byte != b'=')
        .map_or(0, |last| last + 1);
    let unpadded = &payload[..unpadded_len];

    if unpadded.len() % 4 == 1 {
        return Err(bherror::Error::root(FormatError::InvalidBase64Length(
            unpadded.len(),
        )));
    }

    URL_SAFE_NO_PAD
        .decode(unpadded)
        .foreign_err(|| FormatError::InvalidBase64)
}

/// Utility function that delegates to [`jwt::VerifyWithKey`] while allowing
/// proper propagation of errors from both the foreign trait and the
/// [`SignatureVerifier`].
pub(crate) fn verify_jwt_signature<UnverifiedJwt, VerifiedJwt, V>(
    unverified_jwt: UnverifiedJwt,
    verifier: &V,
    public_key: &JwkPublic,
) -> Result<VerifiedJwt, BoxError>
where
    UnverifiedJwt: jwt::VerifyWithKey<VerifiedJwt>,
    V: SignatureVerifier + ?Sized,
{
    let verifier_wrapper = ErrorHolder::new(VerifierWrapper {
        verifier,
        public_key,
    });
    unverified_jwt
        .verify_with_key(&verifier_wrapper)
        .map_err(verifier_wrapper.combine_error())
}

/// Adapter for implementing [jwt::VerifyingAlgorithm], for internal use.
struct VerifierWrapper<'a, T: SignatureVerifier + ?Sized> {
    verifier: &'a T,
    public_key: &'a JwkPublic,
}

impl<T: SignatureVerifier + ?Sized> jwt::VerifyingAlgorithm
    for ErrorHolder<VerifierWrapper<'_, T>>
{
    fn algorithm_type(&self) -> jwt::AlgorithmType {
        self.inner.verifier.algorithm().into()
    }

    fn verify_bytes(
        &self,
        header: &str,
        claims: &str,
        signature: &[u8],
    ) -> Result<bool, jwt::Error> {
        let message = construct_jws_payload(header, claims);

        self.inner
            .verifier
            .verify(message.as_bytes(), signature, self.inner.public_key)
            .map_err(|error| self.store_error(error))
    }
}

/// Helper wrapper for collecting errors from verifier implementations
/// which cannot be piped through `jwt:Error`.
struct ErrorHolder<T> {
    inner: T,
    /// Interior-mutable slot for the error returned by the wrapped verifier, if any.
    error: Cell<Option<BoxError>>,
}

impl<T> ErrorHolder<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            error: Cell::new(None),
        }
    }

    fn store_error(&self, error: BoxError) -> jwt::Error {
        let previous = self.error.replace(Some(error));
        debug_assert!(previous.is_none());

        // The caller recovers the true error through `combine_error`.
        jwt::Error::InvalidSignature
    }

    /// Returns the stored underlying error if one occurred, and the
    /// [`jwt::Error`] otherwise.
    fn combine_error(self) -> impl FnOnce(jwt::Error) -> BoxError {
        |jwt_error| {
            if let Some(underlying_error) = self.error.into_inner() {
                debug_assert!(matches!(jwt_error, jwt::Error::InvalidSignature));
                underlying_error
            } else {
                Box::new(jwt_error)
            }
        }
    }
}

/// Retrieve public JWK from the provided x5chain certificate chain leaf.
///
/// The curve of the leaf key must match the curve of `alg`.
#[cfg(feature = "openssl")]
pub fn public_jwk_from_x5chain_leaf(
    x5chain: &bhx5chain::X5Chain,
    alg: &crate::SigningAlgorithm,
    kid: Option<&str>,
) -> bherror::Result<JwkPublic, crate::CryptoError> {
    use crate::CryptoError;

    let pkey = x5chain
        .leaf_certificate_key()
        .with_err(|| CryptoError::InvalidX5Chain)
        .ctx(|| "invalid public key from certificate")?;

    if pkey.id() != openssl::pkey::Id::EC {
        return Err(bherror::Error::root(CryptoError::Unsupported(
            "only EC leaf keys are supported".to_string(),
        )));
    }

    let ec_key = pkey
        .ec_key()
        .foreign_err(|| CryptoError::CryptoBackend)
        .ctx(|| "invalid EC key")?;

    let curve = crate::EcCurve::of_key(&ec_key)?;
    if curve != crate::EcCurve::from_algorithm(*alg) {
        return Err(bherror::Error::root(CryptoError::Unsupported(format!(
            "{alg} cannot be used with a {} key",
            curve.crv()
        ))));
    }

    crate::openssl_ec_pub_key_to_jwk(&ec_key, kid).ctx(|| "unable to construct JWK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_url_round_trip() {
        for len in [0usize, 1, 2, 3, 4, 31, 32] {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 37 % 256) as u8).collect();

            let encoded = base64_url_encode(&bytes);
            assert!(!encoded.contains('='));
            assert!(!encoded.contains('+') && !encoded.contains('/'));

            assert_eq!(base64_url_decode(&encoded).unwrap(), bytes, "length {len}");
        }
    }

    #[test]
    fn base64_url_decode_tolerates_padding() {
        assert_eq!(base64_url_decode("_w==").unwrap(), vec![0xff]);
        assert_eq!(base64_url_decode("_w").unwrap(), vec![0xff]);
    }

    #[test]
    fn base64_url_decode_invalid_length() {
        for input in ["A", "AAAAA", "AAAAA===", "AAAAAAAAA"] {
            let error = base64_url_decode(input).unwrap_err();
            assert!(
                matches!(error.error, FormatError::InvalidBase64Length(_)),
                "{input}"
            );
        }
    }

    #[test]
    fn base64_url_decode_rejects_standard_alphabet() {
        let error = base64_url_decode("+/8=").unwrap_err();
        assert_eq!(error.error, FormatError::InvalidBase64);
    }

    #[test]
    fn public_jwk_from_leaf_matches_curve() {
        use crate::{CryptoError, SigningAlgorithm};

        let pki = bhx5chain::test_utils::TestPki::p521();

        let jwk =
            public_jwk_from_x5chain_leaf(&pki.x5chain(), &SigningAlgorithm::Es512, Some("k"))
                .unwrap();
        assert_eq!(jwk["crv"], "P-521");
        assert_eq!(jwk["kid"], "k");

        let error = public_jwk_from_x5chain_leaf(&pki.x5chain(), &SigningAlgorithm::Es256, None)
            .unwrap_err();
        assert!(matches!(error.error, CryptoError::Unsupported(_)));
    }
}
