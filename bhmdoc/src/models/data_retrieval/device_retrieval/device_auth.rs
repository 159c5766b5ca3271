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

//! This module defines the device authentication data model of the section `9.1.3` of the
//! [ISO/IEC 18013-5:2021][1] standard, with the session transcript of the OpenID for Verifiable
//! Presentations profile from the Annex B of the [ISO/IEC TS 18013-7:2024][2].
//!
//! [1]: <https://www.iso.org/standard/69084.html>
//! [2]: <https://www.iso.org/standard/82772.html>

use bh_jws_utils::JwkPublic;
use bherror::traits::{ErrorContext as _, ForeignError as _};
use ciborium::Value;
use serde::{Deserialize, Serialize};

use super::response::DeviceNameSpacesBytes;
use crate::{
    models::{data_retrieval::common::DocType, Bytes, BytesCbor},
    utils::{
        coset::{deserialize_coset, header_signing_algorithm, serialize_coset, verify_cose_signature},
        digest::sha256,
    },
    MdocError, Result,
};

/// The context string of the [`DeviceAuthentication`] structure.
const DEVICE_AUTHENTICATION_CONTEXT: &str = "DeviceAuthentication";

/// [`DeviceAuth`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceAuth {
    /// The device authentication signature.
    DeviceSignature(DeviceSignature),
    /// The device authentication MAC.
    DeviceMac(DeviceMac),
}

impl DeviceAuth {
    /// Creates a new [`DeviceAuth::DeviceSignature`] over the serialized
    /// [`DeviceAuthenticationBytes`] with a detached payload.
    #[cfg(test)]
    pub(crate) fn new_signature(
        device_authentication: DeviceAuthentication,
        alg: coset::iana::Algorithm,
        sign: impl FnOnce(&[u8]) -> Vec<u8>,
    ) -> Result<Self> {
        let payload = device_authentication.into_payload()?;

        let protected = coset::HeaderBuilder::new().algorithm(alg).build();

        let cose_sign1 = coset::CoseSign1Builder::new()
            .protected(protected)
            .create_detached_signature(&payload, &[], sign)
            .build();

        Ok(Self::DeviceSignature(DeviceSignature(cose_sign1)))
    }

    /// Verifies the device signature against the detached payload constructed
    /// from the [`DeviceAuthentication`].
    ///
    /// **Note**: the MAC is not supported and results in the
    /// [`DeviceMac`][MdocError::DeviceMac] error.
    pub(crate) fn verify_signature(
        &self,
        device_authentication: DeviceAuthentication,
        device_key: &JwkPublic,
    ) -> Result<()> {
        let cose_sign1 = match self {
            Self::DeviceSignature(DeviceSignature(cose_sign1)) => cose_sign1,
            Self::DeviceMac(_) => return Err(bherror::Error::root(MdocError::DeviceMac)),
        };

        let alg = header_signing_algorithm(&cose_sign1.protected.header)
            .ok_or_else(|| bherror::Error::root(MdocError::MissingSigningAlgorithm))
            .ctx(|| "device authentication")?;

        let payload = device_authentication.into_payload()?;

        cose_sign1.verify_detached_signature(&payload, &[], |signature, data| {
            verify_cose_signature(alg, signature, data, device_key)
        })
    }

    #[cfg(test)]
    pub(crate) fn device_signature_inner_mut(&mut self) -> &mut coset::CoseSign1 {
        match self {
            Self::DeviceSignature(DeviceSignature(cose_sign1)) => cose_sign1,
            Self::DeviceMac(_) => panic!("not a device signature"),
        }
    }
}

/// [`DeviceSignature`] as defined in the section `9.1.3.6` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSignature(
    #[serde(
        serialize_with = "serialize_coset",
        deserialize_with = "deserialize_coset"
    )]
    pub(crate) coset::CoseSign1,
);

/// [`DeviceMac`] as defined in the section `9.1.3.5` of the [ISO/IEC 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMac(
    #[serde(
        serialize_with = "serialize_coset",
        deserialize_with = "deserialize_coset"
    )]
    pub(crate) coset::CoseMac0,
);

/// [`DeviceAuthentication`] as defined in the section `9.1.3.4` of the [ISO/IEC
/// 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAuthentication(
    &'static str,
    SessionTranscript,
    DocType,
    DeviceNameSpacesBytes,
);

impl DeviceAuthentication {
    /// Creates the [`DeviceAuthentication`] of a presentation made over
    /// OpenID for Verifiable Presentations.
    pub(crate) fn new(
        client_id: &str,
        response_uri: &str,
        nonce: &str,
        mdoc_generated_nonce: &str,
        doc_type: &DocType,
        name_spaces: &DeviceNameSpacesBytes,
    ) -> Result<Self> {
        let handover =
            OpenId4VpHandover::new(client_id, response_uri, nonce, mdoc_generated_nonce)?;

        Ok(Self(
            DEVICE_AUTHENTICATION_CONTEXT,
            SessionTranscript(Value::Null, Value::Null, handover),
            doc_type.clone(),
            name_spaces.clone(),
        ))
    }

    /// Serializes the [`DeviceAuthenticationBytes`] which are the detached
    /// payload of the device signature.
    fn into_payload(self) -> Result<Vec<u8>> {
        let bytes = DeviceAuthenticationBytes(self.into());

        let mut payload = Vec::new();
        ciborium::into_writer(&bytes, &mut payload)
            .foreign_err(|| MdocError::DeviceAuthentication)?;

        Ok(payload)
    }
}

/// [`DeviceAuthenticationBytes`] as defined in the section `9.1.3.4` of the [ISO/IEC
/// 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAuthenticationBytes(BytesCbor<DeviceAuthentication>);

/// `SessionTranscript` of the section `9.1.5.1` of the [ISO/IEC 18013-5:2021][1] standard.
///
/// Both `DeviceEngagementBytes` and `EReaderKeyBytes` are `null` for presentations made over
/// OpenID for Verifiable Presentations.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionTranscript(Value, Value, OpenId4VpHandover);

/// `OID4VPHandover` from the section `B.4.4` of the [ISO/IEC TS 18013-7:2024][1].
///
/// [1]: <https://www.iso.org/standard/82772.html>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenId4VpHandover(Bytes, Bytes, String);

impl OpenId4VpHandover {
    fn new(
        client_id: &str,
        response_uri: &str,
        nonce: &str,
        mdoc_generated_nonce: &str,
    ) -> Result<Self> {
        Ok(Self(
            hash_with_nonce(client_id, mdoc_generated_nonce)?,
            hash_with_nonce(response_uri, mdoc_generated_nonce)?,
            nonce.to_owned(),
        ))
    }
}

/// Computes `SHA-256` of the _CBOR_ array `[value, mdoc_generated_nonce]`.
fn hash_with_nonce(value: &str, mdoc_generated_nonce: &str) -> Result<Bytes> {
    let mut payload = Vec::new();
    ciborium::into_writer(&[value, mdoc_generated_nonce], &mut payload)
        .foreign_err(|| MdocError::DeviceAuthentication)
        .ctx(|| "unable to serialize handover input")?;

    Ok(sha256(payload).to_vec().into())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bh_jws_utils::{openssl_ec_pub_key_to_jwk, test_utils::sign_ecdsa};
    use bhx5chain::test_utils::generate_ec_key;
    use openssl::nid::Nid;

    use super::*;
    use crate::models::data_retrieval::device_retrieval::response::DeviceNameSpaces;

    fn device_authentication(nonce: &str) -> DeviceAuthentication {
        DeviceAuthentication::new(
            "client-id",
            "https://verifier.example.com/response",
            nonce,
            "mdoc-nonce",
            &"org.iso.18013.5.1.mDL".into(),
            &DeviceNameSpaces::default().into(),
        )
        .unwrap()
    }

    #[test]
    fn handover_hashes_client_id_and_response_uri_with_mdoc_nonce() {
        let handover =
            OpenId4VpHandover::new("client", "https://rp.example.com/cb", "nonce", "mdoc-nonce")
                .unwrap();

        let mut client_id_input = Vec::new();
        ciborium::into_writer(
            &Value::Array(vec!["client".into(), "mdoc-nonce".into()]),
            &mut client_id_input,
        )
        .unwrap();

        assert_eq!(handover.0 .0, sha256(client_id_input).to_vec());
        assert_ne!(handover.0, handover.1);
        assert_eq!(handover.2, "nonce");
    }

    #[test]
    fn device_signature_round_trip() {
        let key = generate_ec_key(Nid::X9_62_PRIME256V1);
        let jwk = openssl_ec_pub_key_to_jwk(&key.ec_key().unwrap(), None).unwrap();

        let device_auth = DeviceAuth::new_signature(
            device_authentication("nonce"),
            coset::iana::Algorithm::ES256,
            |data| sign_ecdsa(&key, data),
        )
        .unwrap();

        assert_matches!(
            device_auth.verify_signature(device_authentication("nonce"), &jwk),
            Ok(())
        );
        assert_matches!(
            device_auth
                .verify_signature(device_authentication("other nonce"), &jwk)
                .unwrap_err()
                .error,
            MdocError::InvalidSignature
        );
    }

    #[test]
    fn device_mac_is_not_supported() {
        let device_auth = DeviceAuth::DeviceMac(DeviceMac(coset::CoseMac0Builder::new().build()));
        let key = generate_ec_key(Nid::X9_62_PRIME256V1);
        let jwk = openssl_ec_pub_key_to_jwk(&key.ec_key().unwrap(), None).unwrap();

        assert_matches!(
            device_auth
                .verify_signature(device_authentication("nonce"), &jwk)
                .unwrap_err()
                .error,
            MdocError::DeviceMac
        );
    }

    #[test]
    fn device_signature_without_algorithm_fails() {
        let device_auth = DeviceAuth::DeviceSignature(DeviceSignature(
            coset::CoseSign1Builder::new().signature(vec![0; 64]).build(),
        ));
        let key = generate_ec_key(Nid::X9_62_PRIME256V1);
        let jwk = openssl_ec_pub_key_to_jwk(&key.ec_key().unwrap(), None).unwrap();

        assert_matches!(
            device_auth
                .verify_signature(device_authentication("nonce"), &jwk)
                .unwrap_err()
                .error,
            MdocError::MissingSigningAlgorithm
        );
    }
}
