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

//! Util code over `coset` crate

use bh_jws_utils::{
    base64_url_decode, ec_public_affine_coords_to_jwk, ecdsa_verifier, EcCurve, JwkPublic,
    SigningAlgorithm,
};
use bherror::traits::{
    ErrorContext as _, ForeignBoxed as _, ForeignError as _, PropagateError as _,
};
use coset::{
    iana::{Algorithm, Ec2KeyParameter, EllipticCurve},
    AsCborValue, Header, KeyType, Label, RegisteredLabelWithPrivate,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MdocError, Result};

/// The default `kid` value of the Device's public key.
const DEFAULT_DEVICE_KID: &str = "device_kid";

pub(crate) fn serialize_coset<T, S>(
    cose_value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    T: AsCborValue + Clone,
    S: Serializer,
{
    let cbor_value = cose_value
        .clone()
        .to_cbor_value()
        .map_err(serde::ser::Error::custom)?;

    cbor_value.serialize(serializer)
}

pub(crate) fn deserialize_coset<'de, T, D>(deserializer: D) -> std::result::Result<T, D::Error>
where
    T: AsCborValue,
    D: Deserializer<'de>,
{
    let cbor_value = ciborium::Value::deserialize(deserializer)?;

    T::from_cbor_value(cbor_value).map_err(serde::de::Error::custom)
}

/// Converts the EC JWK to the `COSE_Key`.
///
/// For more details on `COSE_Key` look at the section 13.1.1 of the [RFC 8152][1].
///
/// [1]: <https://datatracker.ietf.org/doc/html/rfc8152#section-13.1.1>
pub fn cose_key_from_jwk(jwk: &JwkPublic) -> Result<coset::CoseKey> {
    if jwk.get("kty").and_then(|kty| kty.as_str()) != Some("EC") {
        return Err(bherror::Error::root(MdocError::JwkToCoseKey(
            "Expected key kty with value EC".to_owned(),
        )));
    }

    let curve = match jwk.get("crv").and_then(|crv| crv.as_str()) {
        Some("P-256") => EllipticCurve::P_256,
        Some("P-384") => EllipticCurve::P_384,
        Some("P-521") => EllipticCurve::P_521,
        other => {
            return Err(bherror::Error::root(MdocError::JwkToCoseKey(format!(
                "unsupported curve {other:?}"
            ))))
        }
    };

    let x = extract_coord(jwk, "x")?;
    let y = extract_coord(jwk, "y")?;

    Ok(coset::CoseKeyBuilder::new_ec2_pub_key(curve, x, y).build())
}

/// Extract coordinates from JWK.
fn extract_coord(jwk: &JwkPublic, coord_key: &'static str) -> Result<Vec<u8>> {
    let coord = jwk
        .get(coord_key)
        .and_then(|coord| coord.as_str())
        .ok_or_else(|| {
            bherror::Error::root(MdocError::JwkToCoseKey(format!(
                "Missing coordinate {coord_key} of type String"
            )))
        })?;

    base64_url_decode(coord)
        .with_err(|| MdocError::JwkToCoseKey(format!("Failed to decode coordinate {coord_key}")))
}

/// Converts the `COSE_Key` to JWK.
///
/// Only the `EC2` keys on the `P-256`, `P-384` and `P-521` curves are
/// supported.
pub fn cose_key_to_jwk(cose_key: &coset::CoseKey) -> Result<JwkPublic> {
    if cose_key.kty != KeyType::Assigned(coset::iana::KeyType::EC2) {
        return Err(bherror::Error::root(MdocError::CoseKeyToJwk(
            "only EC keys are supported".to_owned(),
        )));
    }

    let crv = get_cose_key_param(cose_key, &Label::Int(Ec2KeyParameter::Crv as i64))?
        .as_integer()
        .and_then(|crv| i64::try_from(crv).ok());

    let curve = match crv {
        Some(crv) if crv == EllipticCurve::P_256 as i64 => EcCurve::P256,
        Some(crv) if crv == EllipticCurve::P_384 as i64 => EcCurve::P384,
        Some(crv) if crv == EllipticCurve::P_521 as i64 => EcCurve::P521,
        _ => {
            return Err(bherror::Error::root(MdocError::CoseKeyToJwk(format!(
                "unsupported curve {crv:?}"
            ))))
        }
    };

    let x = get_ec_key_param(cose_key, Ec2KeyParameter::X, curve)?;
    let y = get_ec_key_param(cose_key, Ec2KeyParameter::Y, curve)?;

    Ok(ec_public_affine_coords_to_jwk(
        curve,
        &x,
        &y,
        Some(DEFAULT_DEVICE_KID),
    ))
}

/// Returns the `EC` coordinate from the `params` attribute of the provided
/// `COSE_Key`, left-padded to the coordinate length of the `curve`.
///
/// Some encoders strip the leading zero bytes of the coordinates.
fn get_ec_key_param(
    cose_key: &coset::CoseKey,
    param: Ec2KeyParameter,
    curve: EcCurve,
) -> Result<Vec<u8>> {
    let ciborium::Value::Bytes(value) = get_cose_key_param(cose_key, &Label::Int(param as i64))?
    else {
        return Err(bherror::Error::root(MdocError::CoseKeyToJwk(format!(
            "{:?} parameter MUST BE bytes",
            param
        ))));
    };

    let len = curve.coordinate_len();
    if value.len() > len {
        return Err(bherror::Error::root(MdocError::CoseKeyToJwk(format!(
            "{:?} MUST HAVE at most {len} bytes",
            param
        ))));
    }

    let mut coordinate = vec![0; len - value.len()];
    coordinate.extend_from_slice(value);

    Ok(coordinate)
}

/// Returns the param with the given [`Label`] from the `params` attribute of
/// the provided `COSE_Key`.
///
/// If there are multiple entries with the given [`Label`], only the first-one
/// is returned.
fn get_cose_key_param<'a>(
    cose_key: &'a coset::CoseKey,
    label: &Label,
) -> Result<&'a ciborium::Value> {
    cose_key
        .params
        .iter()
        .find_map(|(l, v)| (l == label).then_some(v))
        .ok_or_else(|| {
            bherror::Error::root(MdocError::CoseKeyToJwk(format!(
                "key param {:?} not found",
                label
            )))
        })
}

/// Maps the [`coset::Algorithm`] to the [`SigningAlgorithm`].
///
/// If the [`coset::Algorithm`] is not supported, [`None`] is returned.
pub(crate) fn coset_alg_to_jws_alg(alg: &Algorithm) -> Option<SigningAlgorithm> {
    Some(match alg {
        Algorithm::ES256 => SigningAlgorithm::Es256,
        Algorithm::ES384 => SigningAlgorithm::Es384,
        Algorithm::ES512 => SigningAlgorithm::Es512,
        _ => return None,
    })
}

/// Returns the supported signing algorithm of the `alg` element of a
/// protected header.
pub(crate) fn header_signing_algorithm(header: &Header) -> Option<SigningAlgorithm> {
    let RegisteredLabelWithPrivate::Assigned(alg) = header.alg.as_ref()? else {
        return None;
    };

    coset_alg_to_jws_alg(alg)
}

/// Verifies the `COSE` `signature` of the to-be-signed `data`.
///
/// `COSE` uses the same fixed-size `r || s` encoding of ECDSA signatures as
/// JWS, so the JWS verifiers apply.
pub(crate) fn verify_cose_signature(
    alg: SigningAlgorithm,
    signature: &[u8],
    data: &[u8],
    public_key: &JwkPublic,
) -> Result<()> {
    let verified = ecdsa_verifier(alg)
        .verify(data, signature, public_key)
        .foreign_boxed_err(|| MdocError::InvalidSignature)
        .ctx(|| "error while verifying signature")?;

    if !verified {
        return Err(bherror::Error::root(MdocError::InvalidSignature)
            .ctx("the signature is not valid"));
    }

    Ok(())
}
