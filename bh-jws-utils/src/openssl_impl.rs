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

use std::result::Result as StdResult;

use bherror::{
    traits::{ErrorContext, ForeignError},
    Error, Result,
};
use openssl::{
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcGroupRef, EcKey, EcKeyRef, EcPointRef},
    ecdsa::EcdsaSig,
    hash::{hash, MessageDigest},
    nid::Nid,
    pkey::{HasParams, HasPublic, Public},
};

use super::{utils, SignatureVerifier, SigningAlgorithm};
use crate::{
    error::{CryptoError, FormatError},
    json_object, BoxError, JwkPublic,
};

type EcPublic = EcKey<Public>;

const KTY: &str = "EC";

/// NIST curves of the supported ECDSA algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    /// `P-256`, a.k.a. `secp256r1` or `prime256v1`
    P256,
    /// `P-384`, a.k.a. `secp384r1`
    P384,
    /// `P-521`, a.k.a. `secp521r1`
    P521,
}

impl EcCurve {
    /// The curve used by the given algorithm.
    pub fn from_algorithm(alg: SigningAlgorithm) -> Self {
        match alg {
            SigningAlgorithm::Es256 => Self::P256,
            SigningAlgorithm::Es384 => Self::P384,
            SigningAlgorithm::Es512 => Self::P521,
        }
    }

    /// The curve of the given key.
    pub fn of_key<T: HasParams>(key: &EcKeyRef<T>) -> Result<Self, CryptoError> {
        match key.group().curve_name() {
            Some(Nid::X9_62_PRIME256V1) => Ok(Self::P256),
            Some(Nid::SECP384R1) => Ok(Self::P384),
            Some(Nid::SECP521R1) => Ok(Self::P521),
            other => Err(Error::root(CryptoError::Unsupported(format!(
                "EC curve {:?}",
                other
            )))),
        }
    }

    /// The JWK `crv` parameter value.
    pub fn crv(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Length in bytes of an affine coordinate, and of each of `r` and `s` in
    /// a JWS signature.
    pub fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    fn algorithm(self) -> SigningAlgorithm {
        match self {
            Self::P256 => SigningAlgorithm::Es256,
            Self::P384 => SigningAlgorithm::Es384,
            Self::P521 => SigningAlgorithm::Es512,
        }
    }

    fn nid(self) -> Nid {
        match self {
            Self::P256 => Nid::X9_62_PRIME256V1,
            Self::P384 => Nid::SECP384R1,
            Self::P521 => Nid::SECP521R1,
        }
    }

    pub(crate) fn digest(self) -> MessageDigest {
        match self {
            Self::P256 => MessageDigest::sha256(),
            Self::P384 => MessageDigest::sha384(),
            Self::P521 => MessageDigest::sha512(),
        }
    }
}

/// Returns the affine coordinates of the public key, each left-padded to
/// `len` bytes.
fn to_affine_coords(
    point: &EcPointRef,
    group: &EcGroupRef,
    len: usize,
) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let mut x = BigNum::new().foreign_err(|| CryptoError::CryptoBackend)?;
    let mut y = BigNum::new().foreign_err(|| CryptoError::CryptoBackend)?;
    let mut ctx = BigNumContext::new().foreign_err(|| CryptoError::CryptoBackend)?;
    point
        .affine_coordinates(group, &mut x, &mut y, &mut ctx)
        .foreign_err(|| CryptoError::CryptoBackend)?;

    let x = x
        .to_vec_padded(len as i32)
        .foreign_err(|| CryptoError::CryptoBackend)?;
    let y = y
        .to_vec_padded(len as i32)
        .foreign_err(|| CryptoError::CryptoBackend)?;
    Ok((x, y))
}

/// Construct a JWK JSON object for this public key.
///
/// **Note**: only ECDSA keys on the curves of [`EcCurve`] are supported!
pub fn openssl_ec_pub_key_to_jwk<T: HasPublic>(
    key: &EcKeyRef<T>,
    kid: Option<&str>,
) -> Result<JwkPublic, CryptoError> {
    let curve = EcCurve::of_key(key)?;
    let (x_bytes, y_bytes) =
        to_affine_coords(key.public_key(), key.group(), curve.coordinate_len())?;
    Ok(ec_public_affine_coords_to_jwk(
        curve, &x_bytes, &y_bytes, kid,
    ))
}

/// Constructs the JWK from the coordinates of the public ECDSA key.
///
/// **Note**: this function **DOES NOT** check that the coordinates are valid.
pub fn ec_public_affine_coords_to_jwk(
    curve: EcCurve,
    x_bytes: &[u8],
    y_bytes: &[u8],
    kid: Option<&str>,
) -> JwkPublic {
    let x = utils::base64_url_encode(x_bytes);
    let y = utils::base64_url_encode(y_bytes);

    let mut jwk = json_object!({
        "kty": KTY,
        "alg": curve.algorithm().to_string(),
        "use": "sig",
        "crv": curve.crv(),
        "x": x,
        "y": y,
    });

    if let Some(kid) = kid {
        jwk.insert("kid".to_owned(), serde_json::Value::String(kid.to_owned()));
    }

    jwk
}

/// [`SignatureVerifier`] implementation supporting the `ES256` algorithm (ECDSA
/// using the P-256 curve and the SHA-256 hash function).
#[derive(Debug, Default, Clone, Copy)]
pub struct Es256Verifier;

/// [`SignatureVerifier`] implementation supporting the `ES384` algorithm (ECDSA
/// using the P-384 curve and the SHA-384 hash function).
#[derive(Debug, Default, Clone, Copy)]
pub struct Es384Verifier;

/// [`SignatureVerifier`] implementation supporting the `ES512` algorithm (ECDSA
/// using the P-521 curve and the SHA-512 hash function).
#[derive(Debug, Default, Clone, Copy)]
pub struct Es512Verifier;

macro_rules! impl_ecdsa_verifier {
    ($verifier:ty, $alg:expr) => {
        impl SignatureVerifier for $verifier {
            fn algorithm(&self) -> SigningAlgorithm {
                $alg
            }

            fn verify(
                &self,
                message: &[u8],
                signature: &[u8],
                public_key: &JwkPublic,
            ) -> StdResult<bool, BoxError> {
                verify_ecdsa(EcCurve::from_algorithm($alg), message, signature, public_key)
            }
        }
    };
}

impl_ecdsa_verifier!(Es256Verifier, SigningAlgorithm::Es256);
impl_ecdsa_verifier!(Es384Verifier, SigningAlgorithm::Es384);
impl_ecdsa_verifier!(Es512Verifier, SigningAlgorithm::Es512);

/// Returns the [`SignatureVerifier`] for the given algorithm.
pub fn ecdsa_verifier(alg: SigningAlgorithm) -> &'static dyn SignatureVerifier {
    match alg {
        SigningAlgorithm::Es256 => &Es256Verifier,
        SigningAlgorithm::Es384 => &Es384Verifier,
        SigningAlgorithm::Es512 => &Es512Verifier,
    }
}

fn verify_ecdsa(
    curve: EcCurve,
    message: &[u8],
    signature: &[u8],
    public_key: &JwkPublic,
) -> StdResult<bool, BoxError> {
    let public_key = public_key_from_jwk(public_key, curve)?;

    // JWS signatures are the fixed-size concatenation `r || s`
    let len = curve.coordinate_len();
    if signature.len() != 2 * len {
        return Err(format!(
            "invalid {} signature length {}",
            curve.algorithm(),
            signature.len()
        )
        .into());
    }
    let (r, s) = signature.split_at(len);
    let r = BigNum::from_slice(r)?;
    let s = BigNum::from_slice(s)?;
    let ecdsa_sig = EcdsaSig::from_private_components(r, s)?;

    let digest = hash(curve.digest(), message)?;

    Ok(ecdsa_sig.verify(&digest, public_key.as_ref())?)
}

/// Parses the public JWK into an OpenSSL key on the given curve.
pub fn public_key_from_jwk(public_key: &JwkPublic, curve: EcCurve) -> Result<EcPublic, FormatError> {
    check_jwk_field(public_key, "kty", KTY)?;
    check_jwk_field(public_key, "crv", curve.crv())?;

    let x = parse_coord(public_key, "x", curve)?;
    let x = BigNum::from_slice(&x)
        .foreign_err(|| FormatError::JwkParsingFailed("Failed to construct BigNum".to_string()))?;
    let y = parse_coord(public_key, "y", curve)?;
    let y = BigNum::from_slice(&y)
        .foreign_err(|| FormatError::JwkParsingFailed("Failed to construct BigNum".to_string()))?;

    let group = EcGroup::from_curve_name(curve.nid())
        .foreign_err(|| FormatError::JwkParsingFailed("unknown curve".to_string()))?;
    EcPublic::from_public_key_affine_coordinates(group.as_ref(), x.as_ref(), y.as_ref())
        .foreign_err(|| FormatError::JwkParsingFailed("coordinate construction failed".to_string()))
}

fn check_jwk_field(
    public_key: &JwkPublic,
    field: &str,
    expected_value: &str,
) -> Result<(), FormatError> {
    let error = |message| Error::root(FormatError::JwkParsingFailed(message));

    let value = public_key
        .get(field)
        .ok_or_else(|| error(format!("missing \"{}\" field", field)))?;

    if value == expected_value {
        return Ok(());
    }

    Err(error(format!("incorrect value on \"{}\" field", field))).ctx(|| {
        format!(
            "value on field \"{}\" was {}, expected {}",
            field, value, expected_value
        )
    })
}

fn parse_coord(public_key: &JwkPublic, coord: &str, curve: EcCurve) -> Result<Vec<u8>, FormatError> {
    let error = |message| Error::root(FormatError::JwkParsingFailed(message));

    let base64_coord = public_key
        .get(coord)
        .ok_or_else(|| error(format!("fetching coordinate {} failed", coord)))?
        .as_str()
        .ok_or_else(|| error("coord not str".to_string()))
        .ctx(|| format!("coord {0} as str failed", coord))?;

    let bytes = utils::base64_url_decode(base64_coord)
        .map_err(|_| error("decoding coord failed".to_string()))
        .ctx(|| format!("decoding coord {0} failed", base64_coord))?;

    if bytes.len() != curve.coordinate_len() {
        return Err(error("parsing coord failed".to_string())).ctx(|| {
            format!(
                "coord {} has {} bytes, expected {}",
                coord,
                bytes.len(),
                curve.coordinate_len()
            )
        });
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use bhx5chain::test_utils::{generate_ec_key, TestPki};
    use serde_json::Value;

    use super::*;
    use crate::test_utils::sign_ecdsa;

    fn simple_verify_setup(alg: SigningAlgorithm) -> (JwkPublic, [u8; 25], Vec<u8>) {
        let nid = EcCurve::from_algorithm(alg).nid();
        let key = generate_ec_key(nid);
        let public_jwk = openssl_ec_pub_key_to_jwk(&key.ec_key().unwrap(), Some("kid")).unwrap();

        let message = b"Test message to be signed";
        let signature = sign_ecdsa(&key, message);

        (public_jwk, *message, signature)
    }

    #[test]
    fn sign_verify_bytes() {
        for alg in [
            SigningAlgorithm::Es256,
            SigningAlgorithm::Es384,
            SigningAlgorithm::Es512,
        ] {
            let (public_jwk, message, signature) = simple_verify_setup(alg);
            let verifier = ecdsa_verifier(alg);

            assert_eq!(verifier.algorithm(), alg);
            assert!(verifier.verify(&message, &signature, &public_jwk).unwrap());
            assert!(!verifier
                .verify(b"Some other message", &signature, &public_jwk)
                .unwrap());
        }
    }

    #[test]
    fn es512_uses_66_byte_coordinates() {
        let (public_jwk, _, signature) = simple_verify_setup(SigningAlgorithm::Es512);

        assert_eq!(public_jwk["crv"], "P-521");
        assert_eq!(public_jwk["alg"], "ES512");
        let x = utils::base64_url_decode(public_jwk["x"].as_str().unwrap()).unwrap();
        assert_eq!(x.len(), 66);
        assert_eq!(signature.len(), 132);
    }

    #[test]
    fn verifier_rejects_key_on_other_curve() {
        let (public_jwk, message, signature) = simple_verify_setup(SigningAlgorithm::Es256);

        let error = Es512Verifier
            .verify(&message, &signature, &public_jwk)
            .unwrap_err();

        assert_eq!(
            error.downcast::<Error<FormatError>>().unwrap().error,
            FormatError::JwkParsingFailed("incorrect value on \"crv\" field".to_string())
        );
    }

    #[test]
    fn verifier_rejects_truncated_signature() {
        let (public_jwk, message, signature) = simple_verify_setup(SigningAlgorithm::Es256);

        Es256Verifier
            .verify(&message, &signature[..63], &public_jwk)
            .unwrap_err();
    }

    #[test]
    fn es256_verifier_invalid_jwk_missing_kty_field() {
        let (mut public_jwk, message, signature) = simple_verify_setup(SigningAlgorithm::Es256);

        public_jwk.remove("kty");

        let error = Es256Verifier
            .verify(&message, &signature, &public_jwk)
            .unwrap_err();

        assert_eq!(
            error.downcast::<Error<FormatError>>().unwrap().error,
            FormatError::JwkParsingFailed("missing \"kty\" field".to_string())
        );
    }

    #[test]
    fn es256_verifier_invalid_jwk_invalid_kty_field() {
        let (mut public_jwk, message, signature) = simple_verify_setup(SigningAlgorithm::Es256);

        public_jwk.insert("kty".to_string(), Value::String("bla".to_string()));

        let error = Es256Verifier
            .verify(&message, &signature, &public_jwk)
            .unwrap_err();

        assert_eq!(
            error.downcast::<Error<FormatError>>().unwrap().error,
            FormatError::JwkParsingFailed("incorrect value on \"kty\" field".to_string())
        );
    }

    #[test]
    fn curve_of_certificate_key() {
        let pki = TestPki::p521();
        let key = pki.leaf.public_key().unwrap().ec_key().unwrap();

        assert_eq!(EcCurve::of_key(&key).unwrap(), EcCurve::P521);
    }

    #[test]
    fn curve_of_private_key() {
        let key = generate_ec_key(Nid::SECP384R1);

        assert_eq!(EcCurve::of_key(&key.ec_key().unwrap()).unwrap(), EcCurve::P384);

        let key = generate_ec_key(Nid::SECP256K1);
        assert!(EcCurve::of_key(&key.ec_key().unwrap()).is_err());
    }
}
