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

use std::str::FromStr;

use bherror::Error;
use serde::{Deserialize, Serialize};

use crate::{error::SignatureError, utils::BoxError, JwkPublic};

/// ECDSA signature algorithms accepted on credentials.
///
/// Only the NIST curves approved for use in the context of EUDI are listed, see
/// [section 3.4 of RFC7518] and [ETSI TS 119 312] sections 6 and 7.
///
/// [section 3.4 of RFC7518]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.4
/// [ETSI TS 119 312]: https://www.etsi.org/deliver/etsi_ts/119300_119399/119312/01.04.03_60/ts_119312v010403p.pdf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SigningAlgorithm {
    /// ECDSA over P-256 with SHA-256
    Es256,
    /// ECDSA over P-384 with SHA-384
    Es384,
    /// ECDSA over P-521 with SHA-512
    Es512,
}

/// JWS `"alg"` header parameter value for digital signature algorithm
/// **ECDSA using P-256 and SHA-256**, as specified in [RFC7518].
///
/// [RFC7518]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.1
pub const SIGNING_ALG_ES256: &str = "ES256";
/// JWS `"alg"` header parameter value for digital signature algorithm
/// **ECDSA using P-384 and SHA-384**, as specified in [RFC7518].
///
/// [RFC7518]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.1
pub const SIGNING_ALG_ES384: &str = "ES384";
/// JWS `"alg"` header parameter value for digital signature algorithm
/// **ECDSA using P-521 and SHA-512**, as specified in [RFC7518].
///
/// [RFC7518]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.1
pub const SIGNING_ALG_ES512: &str = "ES512";

impl FromStr for SigningAlgorithm {
    type Err = Error<SignatureError>;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            SIGNING_ALG_ES256 => Ok(SigningAlgorithm::Es256),
            SIGNING_ALG_ES384 => Ok(SigningAlgorithm::Es384),
            SIGNING_ALG_ES512 => Ok(SigningAlgorithm::Es512),
            _ => Err(Error::root(SignatureError::InvalidSigningAlgorithm(
                value.to_string(),
            ))),
        }
    }
}

impl std::fmt::Display for SigningAlgorithm {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let message = match self {
            Self::Es256 => SIGNING_ALG_ES256,
            Self::Es384 => SIGNING_ALG_ES384,
            Self::Es512 => SIGNING_ALG_ES512,
        };
        write!(f, "{}", message)
    }
}

impl From<SigningAlgorithm> for jwt::AlgorithmType {
    fn from(value: SigningAlgorithm) -> Self {
        match value {
            SigningAlgorithm::Es256 => Self::Es256,
            SigningAlgorithm::Es384 => Self::Es384,
            SigningAlgorithm::Es512 => Self::Es512,
        }
    }
}

impl TryFrom<jwt::AlgorithmType> for SigningAlgorithm {
    type Error = Error<SignatureError>;

    fn try_from(value: jwt::AlgorithmType) -> Result<Self, Self::Error> {
        match value {
            jwt::AlgorithmType::Es256 => Ok(Self::Es256),
            jwt::AlgorithmType::Es384 => Ok(Self::Es384),
            jwt::AlgorithmType::Es512 => Ok(Self::Es512),
            other => Err(Error::root(SignatureError::InvalidSigningAlgorithm(
                format!("{:?}", other),
            ))),
        }
    }
}

/// An external backend for signature verification, to be used for verifying
/// JWS signatures.
pub trait SignatureVerifier: Sync {
    /// The algorithm used for the signature verification.
    fn algorithm(&self) -> SigningAlgorithm;

    /// Verifies the signature of the message, against the provided public key.
    ///
    /// The algorithm used to verify the signature must be the one returned by
    /// [`SignatureVerifier::algorithm`].
    ///
    /// # Return
    /// Method returns `Ok(true)` if the signature if valid for the given
    /// message, `Ok(false)` if it isn't (but there was no issue with the
    /// verifier itself), and `Err(_)` when the verifier itself encounters an
    /// error for any other reason.
    fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &JwkPublic,
    ) -> Result<bool, BoxError>;
}

/// An external backend capable of verifying the signatures of JWTs.
///
/// This is an extension trait over [`SignatureVerifier`]; prefer depending on
/// this trait when writing code which handles JWTs. It is however not object
/// safe; depend on [`SignatureVerifier`] directly if you need that.
pub trait JwtVerifier: SignatureVerifier {
    /// Utility function that delegates to [`jwt::VerifyWithKey`] while allowing
    /// proper propagation of errors from both the foreign trait and the
    /// [`SignatureVerifier`].
    fn verify_jwt_signature<UnverifiedJwt, VerifiedJwt>(
        &self,
        unverified_jwt: UnverifiedJwt,
        public_key: &JwkPublic,
    ) -> Result<VerifiedJwt, BoxError>
    where
        UnverifiedJwt: jwt::VerifyWithKey<VerifiedJwt>;
}

impl<V: SignatureVerifier + ?Sized> JwtVerifier for V {
    fn verify_jwt_signature<UnverifiedJwt, VerifiedJwt>(
        &self,
        unverified_jwt: UnverifiedJwt,
        public_key: &JwkPublic,
    ) -> Result<VerifiedJwt, BoxError>
    where
        UnverifiedJwt: jwt::VerifyWithKey<VerifiedJwt>,
    {
        crate::utils::verify_jwt_signature(unverified_jwt, self, public_key)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn signing_algorithms_serialize_correctly() {
        let test_cases = [
            (SigningAlgorithm::Es256, SIGNING_ALG_ES256),
            (SigningAlgorithm::Es384, SIGNING_ALG_ES384),
            (SigningAlgorithm::Es512, SIGNING_ALG_ES512),
        ];

        for (alg, alg_str) in test_cases {
            let serialized = serde_json::to_string(&alg).unwrap();
            let expected = format!("\"{}\"", alg_str);
            assert_eq!(expected, serialized);

            let deserialized_serde: SigningAlgorithm = serde_json::from_str(&expected).unwrap();
            assert_eq!(alg, deserialized_serde);

            assert_eq!(alg, SigningAlgorithm::from_str(alg_str).unwrap());
            assert_eq!(alg, SigningAlgorithm::from_str(&alg.to_string()).unwrap());

            let jwt_alg: jwt::AlgorithmType = alg.into();
            assert_eq!(alg, SigningAlgorithm::try_from(jwt_alg).unwrap());
        }
    }

    #[test]
    fn rsa_algorithms_are_rejected() {
        let error = SigningAlgorithm::from_str("RS256").unwrap_err();
        assert_eq!(
            error.error,
            SignatureError::InvalidSigningAlgorithm("RS256".to_owned())
        );

        SigningAlgorithm::try_from(jwt::AlgorithmType::Rs256).unwrap_err();
    }
}
