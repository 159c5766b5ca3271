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

//! This module implements the data model based on the findings from [ISO/IEC 18013-5:2021][1],
//! [RFC 8152][2], [RFC 9052][3], [RFC 9360][4].
//!
//! Only the verification side of the `issuerAuth` is implemented.
//!
//! [1]: <https://www.iso.org/standard/69084.html>
//! [2]: <https://datatracker.ietf.org/doc/rfc8152/>
//! [3]: <https://datatracker.ietf.org/doc/rfc9052/>
//! [4]: <https://datatracker.ietf.org/doc/rfc9360/>

use std::collections::HashMap;

use bh_jws_utils::{public_jwk_from_x5chain_leaf, JwkPublic, SigningAlgorithm};
use bherror::traits::{ErrorContext as _, ForeignError as _, PropagateError as _};
use bhx5chain::X5Chain;
use coset::{
    iana::{EnumI64 as _, HeaderParameter},
    CoseKey, Label,
};

use super::response::{DigestID, IssuerNameSpaces};
use crate::{
    error::MdocError,
    models::{data_retrieval::common::DocType, Bytes, BytesCbor, DateTime, NameSpace},
    utils::coset::{
        cose_key_from_jwk, cose_key_to_jwk, deserialize_coset, header_signing_algorithm,
        serialize_coset, verify_cose_signature,
    },
    Result,
};

/// The default `kid` value of the Issuer's public key.
const DEFAULT_ISSUER_KID: &str = "issuer_kid";

/// [`IssuerAuth`] as defined in the section `9.1.2.4` of the [ISO/IEC 18013-5:2021][1] standard.
///
/// This is just a wrapper around [`coset::CoseSign1`].  More information about `COSE_Sign1`
/// structure can be found in [RFC 8152][2].
///
/// [1]: <https://www.iso.org/standard/69084.html>
/// [2]: <https://datatracker.ietf.org/doc/html/rfc8152>
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IssuerAuth(
    #[serde(
        serialize_with = "serialize_coset",
        deserialize_with = "deserialize_coset"
    )]
    pub(crate) coset::CoseSign1,
);

impl IssuerAuth {
    /// Signs the provided [`MobileSecurityObject`] with the `sign` function,
    /// placing the `x5chain` into the unprotected header.
    #[cfg(test)]
    pub(crate) fn new(
        mso: MobileSecurityObject,
        x5chain: &X5Chain,
        alg: coset::iana::Algorithm,
        sign: impl FnOnce(&[u8]) -> Vec<u8>,
    ) -> Result<Self> {
        let protected = coset::HeaderBuilder::new().algorithm(alg).build();

        let unprotected = coset::Header {
            rest: vec![(
                Label::Int(HeaderParameter::X5Chain.to_i64()),
                x5chain_to_cbor_value(x5chain)?,
            )],
            ..Default::default()
        };

        let mso: MobileSecurityObjectBytes = mso.into();
        let mut mso_bytes = vec![];
        ciborium::into_writer(&mso, &mut mso_bytes).foreign_err(|| MdocError::IssuerAuth)?;

        let cose_sign1 = coset::CoseSign1Builder::new()
            .protected(protected)
            .unprotected(unprotected)
            .payload(mso_bytes)
            .create_signature(&[], sign)
            .build();

        Ok(Self(cose_sign1))
    }

    /// Verifies the issuer's signature of the [`IssuerAuth`] with the leaf key
    /// of the provided `x5chain`.
    ///
    /// The signing algorithm is read from the protected header of the
    /// underlying `COSE_Sign1` structure. The chain itself is **not** checked
    /// against any trust anchors here.
    pub(crate) fn verify_signature(&self, x5chain: &X5Chain) -> Result<()> {
        let alg = self
            .signing_algorithm()
            .ok_or_else(|| bherror::Error::root(MdocError::MissingSigningAlgorithm))
            .ctx(|| "issuer authentication")?;

        let jwk = public_jwk(x5chain, &alg)?;

        self.0.verify_signature(&[], |signature, data| {
            verify_cose_signature(alg, signature, data, &jwk)
        })
    }

    /// Return the [`MobileSecurityObject`] from the payload of the underlying
    /// `COSE_Sign1` structure.
    pub(crate) fn mso(&self) -> Result<MobileSecurityObject> {
        let Some(payload) = &self.0.payload else {
            return Err(bherror::Error::root(MdocError::IssuerAuth).ctx("MSO is missing"));
        };

        let mso: MobileSecurityObjectBytes = ciborium::from_reader(payload.as_slice())
            .foreign_err(|| MdocError::IssuerAuth)
            .ctx(|| "Invalid Mobile Security Object")?;

        Ok(mso.into())
    }

    /// Return the `alg` element from the protected header of the underlying
    /// `COSE_Sign1` structure.
    ///
    /// [`None`] is returned when the algorithm is missing or unsupported.
    pub fn signing_algorithm(&self) -> Option<SigningAlgorithm> {
        header_signing_algorithm(&self.0.protected.header)
    }

    /// Return the `x5chain` from the unprotected header of the underlying
    /// `COSE_Sign1` structure.
    pub fn x5chain(&self) -> Result<X5Chain> {
        let x5chain = self
            .0
            .unprotected
            .rest
            .iter()
            .find_map(|(l, v)| (l == &Label::Int(HeaderParameter::X5Chain.to_i64())).then_some(v))
            .ok_or_else(|| bherror::Error::root(MdocError::X5Chain).ctx("missing `x5chain`"))?;

        cbor_value_to_x5chain(x5chain.clone())
    }
}

/// Extract the Issuer's public key in the JWK format from the leaf of the
/// `x5chain`.
///
/// Currently, only `ECDSA` keys are supported.
fn public_jwk(x5chain: &X5Chain, alg: &SigningAlgorithm) -> Result<JwkPublic> {
    public_jwk_from_x5chain_leaf(x5chain, alg, Some(DEFAULT_ISSUER_KID))
        .with_err(|| MdocError::InvalidPublicKey)
}

/// Based on [RFC 9360][1], x5chain should be serialized based on number of certificates in chain,
/// as it states:
///
/// > *  If a single certificate is conveyed, it is placed in a CBOR byte string.
/// >
/// > *  If multiple certificates are conveyed, a CBOR array of byte strings is used, with each
/// >    certificate being in its own byte string.
///
/// [1]: <https://www.rfc-editor.org/rfc/rfc9360.html#section-2-5.4.4>
#[cfg(test)]
fn x5chain_to_cbor_value(x5chain: &X5Chain) -> Result<ciborium::Value> {
    let mut certs = x5chain
        .as_bytes()
        .with_err(|| MdocError::X5Chain)
        .ctx(|| "X.509 certificate to DER error")?
        .into_iter()
        .map(ciborium::Value::from)
        .collect::<Vec<_>>();

    Ok(if certs.len() == 1 {
        certs.remove(0)
    } else {
        certs.into()
    })
}

/// Converts the [`ciborium::Value`] to the [`X5Chain`].
///
/// If the [`ciborium::Value`] contains [`Bytes`][ciborium::Value::Bytes], they
/// are representing a single certificate. If it contains
/// [`Array`][ciborium::Value::Array] of [`Bytes`][ciborium::Value::Bytes], it
/// represents the chain of certificates. Otherwise, [`MdocError::X5Chain`] is
/// returned.
fn cbor_value_to_x5chain(value: ciborium::Value) -> Result<X5Chain> {
    let chain = match value {
        ciborium::Value::Bytes(bytes) => vec![bytes],
        ciborium::Value::Array(arr) => arr
            .into_iter()
            .map(ciborium::Value::into_bytes)
            .collect::<std::result::Result<_, _>>()
            // `map_err` must be used because underlying error is not `StdErr`
            .map_err(|_| {
                bherror::Error::root(MdocError::X5Chain).ctx("`x5chain` must only contain bytes")
            })?,
        _ => {
            return Err(
                bherror::Error::root(MdocError::X5Chain).ctx("`x5chain` must only contain bytes")
            )
        }
    };

    X5Chain::from_raw_bytes(&chain)
        .with_err(|| MdocError::X5Chain)
        .ctx(|| "invalid `x5chain`")
}

/// [`MobileSecurityObjectBytes`] as defined in the section `9.1.2.4` of the [ISO/IEC
/// 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct MobileSecurityObjectBytes(BytesCbor<MobileSecurityObject>);

impl From<MobileSecurityObject> for MobileSecurityObjectBytes {
    fn from(value: MobileSecurityObject) -> Self {
        Self(value.into())
    }
}

impl From<MobileSecurityObjectBytes> for MobileSecurityObject {
    fn from(value: MobileSecurityObjectBytes) -> Self {
        value.0.inner
    }
}

/// [`MobileSecurityObject`] as defined in the section `9.1.2.4` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// Elements outside of the standard, such as the Token Status List `status`, are ignored.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileSecurityObject {
    version: String,
    digest_algorithm: DigestAlgorithm,
    value_digests: ValueDigests,
    device_key_info: DeviceKeyInfo,
    doc_type: DocType,
    validity_info: ValidityInfo,
}

impl MobileSecurityObject {
    /// Creates the [`MobileSecurityObject`] with the `SHA-256` digests of all
    /// the provided [`IssuerNameSpaces`].
    #[cfg(test)]
    pub(crate) fn new(
        doc_type: DocType,
        name_spaces: &IssuerNameSpaces,
        device_key: DeviceKey,
        validity_info: ValidityInfo,
    ) -> Result<Self> {
        let digest_algorithm = DigestAlgorithm::Sha256;

        let value_digests = name_spaces
            .0
            .iter()
            .map(|(name_space, items)| {
                let digests = items
                    .iter()
                    .map(|item| -> Result<(DigestID, Bytes)> {
                        Ok((item.0.inner.digest_id, item.digest(&digest_algorithm)?.into()))
                    })
                    .collect::<Result<_>>()?;

                Ok((name_space.clone(), DigestIDs(digests)))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            version: "1.0".to_owned(),
            digest_algorithm,
            value_digests: ValueDigests(value_digests),
            device_key_info: DeviceKeyInfo {
                device_key,
                key_authorizations: None,
                key_info: None,
            },
            doc_type,
            validity_info,
        })
    }

    /// Returns the [`DocType`] the issuer signed.
    pub fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    /// Returns the time-validity information.
    pub fn validity_info(&self) -> &ValidityInfo {
        &self.validity_info
    }

    /// Returns the signed [`DeviceKey`] of the respective `mdoc` Device the
    /// credential is issued to.
    pub fn device_key(&self) -> &DeviceKey {
        &self.device_key_info.device_key
    }

    /// Checks that the [`DocType`] of the document matches the signed one.
    pub(crate) fn validate_doc_type(&self, doc_type: &DocType) -> Result<()> {
        if &self.doc_type != doc_type {
            return Err(bherror::Error::root(MdocError::InvalidDocType(
                doc_type.clone(),
                self.doc_type.clone(),
            )));
        }

        Ok(())
    }

    /// Validates only the digests of the provided [`IssuerNameSpaces`].
    ///
    /// The digests of data elements from the [`IssuerNameSpaces`] are
    /// calculated and their presence is checked with respect to this
    /// [`MobileSecurityObject`].
    pub(crate) fn validate_name_spaces(&self, name_spaces: &IssuerNameSpaces) -> Result<()> {
        for (name_space, items) in &name_spaces.0 {
            if items.is_empty() {
                continue;
            }

            let mso_digests = self.value_digests.0.get(name_space).ok_or_else(|| {
                bherror::Error::root(MdocError::MissingDigestNamespace(name_space.clone()))
            })?;

            for item in items {
                let digest_id = &item.0.inner.digest_id;

                let mso_digest = mso_digests.0.get(digest_id).ok_or_else(|| {
                    bherror::Error::root(MdocError::MissingOrInvalidDigest(
                        name_space.clone(),
                        *digest_id,
                    ))
                    .ctx("the digest is missing")
                })?;
                let target_digest = item.digest(&self.digest_algorithm)?;

                if mso_digest.0 != target_digest {
                    return Err(bherror::Error::root(MdocError::MissingOrInvalidDigest(
                        name_space.clone(),
                        *digest_id,
                    ))
                    .ctx("the digest is not valid"));
                }
            }
        }

        Ok(())
    }
}

/// Supported digest algorithms as defined by the table 21 of the section `9.1.2.5` in the [ISO/IEC
/// 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DigestAlgorithm {
    /// Designates the SHA-256 digest algorithm as specified in [ISO/IEC 10118-3][1].
    ///
    /// [1]: <https://www.iso.org/standard/67116.html>
    #[serde(rename = "SHA-256")]
    Sha256,
    /// Designates the SHA-384 digest algorithm as specified in [ISO/IEC 10118-3][1].
    ///
    /// [1]: <https://www.iso.org/standard/67116.html>
    #[serde(rename = "SHA-384")]
    Sha384,
    /// Designates the SHA-512 digest algorithm as specified in [ISO/IEC 10118-3][1].
    ///
    /// [1]: <https://www.iso.org/standard/67116.html>
    #[serde(rename = "SHA-512")]
    Sha512,
}

/// [`ValueDigests`] as defined in the section `9.1.2.4` of the [ISO/IEC 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValueDigests(HashMap<NameSpace, DigestIDs>);

/// [`DigestIDs`] as defined in the section `9.1.2.4` of the [ISO/IEC 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DigestIDs(HashMap<DigestID, Bytes>);

/// [`DeviceKeyInfo`] as defined in the section `9.1.2.4` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// The key authorizations and the key info are kept as raw _CBOR_, since
/// nothing here enforces them.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceKeyInfo {
    device_key: DeviceKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_authorizations: Option<ciborium::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_info: Option<ciborium::Value>,
}

/// User's device public key.
///
/// For more details on COSE_Key specifications look
/// [here](https://datatracker.ietf.org/doc/html/rfc8152)
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeviceKey(
    #[serde(
        serialize_with = "serialize_coset",
        deserialize_with = "deserialize_coset"
    )]
    pub(crate) CoseKey,
);

impl DeviceKey {
    /// Method for creating `DeviceKey` out of `JWK`.
    pub fn from_jwk(jwk: &JwkPublic) -> Result<Self> {
        Ok(Self(
            cose_key_from_jwk(jwk).ctx(|| "Failed to create DeviceKey")?,
        ))
    }

    /// Returns a JWK representation of the underlying `COSE_Key`.
    pub fn as_jwk(&self) -> Result<JwkPublic> {
        cose_key_to_jwk(&self.0)
    }
}

/// [`ValidityInfo`] as defined in the section `9.1.2.4` of the [ISO/IEC 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(
    deny_unknown_fields,
    rename_all = "camelCase",
    try_from = "ValidityInfoDeserializeHelper"
)]
#[non_exhaustive]
pub struct ValidityInfo {
    /// The timestamp at which the signature was created.
    pub signed: DateTime,

    /// The timestamp before which the credential is not yet valid.
    pub valid_from: DateTime,

    /// The timestamp after which the credential is no longer valid.
    pub valid_until: DateTime,

    /// The timestamp at which the issuing authority infrastructure expects to
    /// re-sign the credential (and potentially update data elements).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_update: Option<DateTime>,
}

/// A helper struct to [`Deserialize`][serde::Deserialize] [`ValidityInfo`] with
/// custom invariants.
///
/// **NEVER** use this `struct` for anything else.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ValidityInfoDeserializeHelper {
    signed: DateTime,
    valid_from: DateTime,
    valid_until: DateTime,
    expected_update: Option<DateTime>,
}

impl TryFrom<ValidityInfoDeserializeHelper> for ValidityInfo {
    type Error = bherror::Error<MdocError>;

    fn try_from(value: ValidityInfoDeserializeHelper) -> std::result::Result<Self, Self::Error> {
        Self::new(
            value.signed,
            value.valid_from,
            value.valid_until,
            value.expected_update,
        )
    }
}

impl ValidityInfo {
    /// Creates new [`ValidityInfo`], checking the provided data along the way.
    ///
    /// The data is validated as per `Section 9.1.2.4` of
    /// [ISO/IEC 18013-5:2021][1].
    ///
    /// - The timestamp of `valid_from` shall be equal or later than the
    ///   `signed` element.
    /// - The value of the `valid_until` timestamp shall be later than the
    ///   `valid_from` element.
    ///
    /// [1]: <https://www.iso.org/standard/69084.html>
    pub fn new(
        signed: DateTime,
        valid_from: DateTime,
        valid_until: DateTime,
        expected_update: Option<DateTime>,
    ) -> Result<Self> {
        if valid_from < signed {
            return Err(bherror::Error::root(MdocError::InvalidValidityInfo)
                .ctx("`valid_from` must be equal or later than `signed`"));
        }

        if valid_until <= valid_from {
            return Err(bherror::Error::root(MdocError::InvalidValidityInfo)
                .ctx("`valid_until` must be later than `valid_from`"));
        }

        Ok(Self {
            signed,
            valid_from,
            valid_until,
            expected_update,
        })
    }

    /// Validates the expiration and the not-valid-before claim at
    /// `current_time`, both relaxed by `clock_tolerance` seconds.
    ///
    /// The document is valid from `valid_from` inclusive until `valid_until`
    /// exclusive, the same window used for the `nbf` and `exp` claims of an
    /// SD-JWT VC.
    pub(crate) fn validate(&self, current_time: i64, clock_tolerance: i64) -> Result<()> {
        let valid_from = self.valid_from.timestamp();
        if current_time < valid_from.saturating_sub(clock_tolerance) {
            return Err(bherror::Error::root(MdocError::DocumentNotYetValid(
                valid_from,
            )));
        }

        let valid_until = self.valid_until.timestamp();
        if current_time >= valid_until.saturating_add(clock_tolerance) {
            return Err(bherror::Error::root(MdocError::DocumentExpired(
                valid_until,
            )));
        }

        Ok(())
    }
}
