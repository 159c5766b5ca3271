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

//! This module defines the data model described in the section "8.3.2.1.2.2 Device retrieval mdoc
//! response" of the [ISO/IEC 18013-5:2021][1] standard.
//!
//! [1]: <https://www.iso.org/standard/69084.html>
use std::{collections::HashMap, fmt};

use bh_jws_utils::{base64_url_decode, JsonObject, JwkPublic};
use bherror::traits::{ErrorContext as _, ForeignError as _, PropagateError as _};
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use super::{
    device_auth::{DeviceAuth, DeviceAuthentication},
    issuer_auth::{DigestAlgorithm, IssuerAuth},
};
use crate::{
    models::{
        data_retrieval::common::{DataElementIdentifier, DataElementValue, DocType, NameSpace},
        Bytes, BytesCbor,
    },
    utils::{
        digest::{sha256, sha384, sha512},
        json::cbor_to_json,
    },
    MdocError, Result,
};

/// The version of the [`DeviceResponse`] structure.
///
/// The value is currently specified in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1].
///
/// [1]: <https://www.iso.org/standard/69084.html>
const DEVICE_RESPONSE_VERSION: &str = "1.0";

/// The `issuerAuth` key of the [`IssuerSigned`] structure.
const ISSUER_AUTH_KEY: &str = "issuerAuth";

/// [`DeviceResponse`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    documents: Option<Vec<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_errors: Option<ciborium::Value>,
    status: u64,
}

impl DeviceResponse {
    #[cfg(test)]
    pub(crate) fn new(documents: Vec<Document>) -> Self {
        Self {
            version: DEVICE_RESPONSE_VERSION.to_owned(),
            // set to `None` if no `Document`s are present
            documents: (!documents.is_empty()).then_some(documents),
            document_errors: None,
            status: 0,
        }
    }

    /// Parses the provided _CBOR_ data into [`DeviceResponse`].
    pub fn from_cbor(cbor: &[u8]) -> Result<Self> {
        ciborium::from_reader(cbor)
            .foreign_err(|| MdocError::DeviceResponseParse("invalid CBOR".to_owned()))
    }

    /// Parses the provided `base64url`-encoded `string` of _CBOR_ data into
    /// [`DeviceResponse`].
    ///
    /// Padded input is accepted as well.
    pub fn from_base64_cbor(value: &str) -> Result<Self> {
        let decoded = base64_url_decode(value)
            .with_err(|| MdocError::DeviceResponseParse("invalid base64".to_owned()))?;

        Self::from_cbor(&decoded)
    }

    /// Wraps a bare _CBOR_-encoded [`IssuerSigned`] structure into a
    /// [`DeviceResponse`] with a single [`Document`] without device signed
    /// data.
    ///
    /// The [`DocType`] of the [`Document`] is taken from the Mobile Security
    /// Object signed by the issuer. The wrapping is done on the _CBOR_ level so
    /// that the received encoding of every signed structure is kept.
    pub fn from_issuer_signed_cbor(cbor: &[u8]) -> Result<Self> {
        let issuer_signed: ciborium::Value = ciborium::from_reader(cbor)
            .foreign_err(|| MdocError::IssuerSignedParse)
            .ctx(|| "invalid CBOR payload")?;

        let issuer_auth = issuer_signed
            .as_map()
            .and_then(|map| {
                map.iter()
                    .find_map(|(key, value)| (key.as_text() == Some(ISSUER_AUTH_KEY)).then_some(value))
            })
            .ok_or_else(|| bherror::Error::root(MdocError::IssuerSignedParse))
            .ctx(|| "missing `issuerAuth`")?;

        let issuer_auth: IssuerAuth = issuer_auth
            .deserialized()
            .foreign_err(|| MdocError::IssuerSignedParse)
            .ctx(|| "invalid `issuerAuth`")?;

        let doc_type = issuer_auth.mso()?.doc_type().clone();

        let document = ciborium::Value::Map(vec![
            ("docType".into(), doc_type.0.into()),
            ("issuerSigned".into(), issuer_signed),
        ]);
        let device_response = ciborium::Value::Map(vec![
            ("version".into(), DEVICE_RESPONSE_VERSION.into()),
            ("documents".into(), ciborium::Value::Array(vec![document])),
            ("status".into(), 0.into()),
        ]);

        let mut encoded = Vec::new();
        ciborium::into_writer(&device_response, &mut encoded)
            .foreign_err(|| MdocError::IssuerSignedParse)
            .ctx(|| "unable to wrap `IssuerSigned`")?;

        Self::from_cbor(&encoded)
    }

    /// Serializes the [`DeviceResponse`] to _CBOR_ data.
    #[cfg(test)]
    pub(crate) fn to_cbor(&self) -> Vec<u8> {
        let mut cbor = Vec::new();
        ciborium::into_writer(self, &mut cbor).unwrap();
        cbor
    }

    /// Returns the status code of the response.
    pub fn status(&self) -> u64 {
        self.status
    }

    /// Consumes the [`DeviceResponse`] and returns the first [`Document`].
    pub fn into_first_document(self) -> Result<Document> {
        self.documents
            .and_then(|documents| documents.into_iter().next())
            .ok_or_else(|| bherror::Error::root(MdocError::EmptyDeviceResponse))
    }

}

/// [`Document`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    doc_type: DocType,
    pub(crate) issuer_signed: IssuerSigned,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) device_signed: Option<DeviceSigned>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ciborium::Value>,
}

impl Document {
    #[cfg(test)]
    pub(crate) fn new(
        doc_type: DocType,
        issuer_signed: IssuerSigned,
        device_signed: Option<DeviceSigned>,
    ) -> Self {
        Self {
            doc_type,
            issuer_signed,
            device_signed,
            errors: None,
        }
    }

    /// Returns the [`DocType`] of the [`Document`].
    pub fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    /// Returns the issuer signed part of the [`Document`].
    pub fn issuer_signed(&self) -> &IssuerSigned {
        &self.issuer_signed
    }

    /// Returns whether the [`Document`] carries device signed data.
    pub fn has_device_signed(&self) -> bool {
        self.device_signed.is_some()
    }

    /// Verifies the device signature of this [`Document`] with the provided
    /// public `device_key`.
    ///
    /// The signed payload is the `DeviceAuthentication` structure built from
    /// the OpenID for Verifiable Presentations handover values.
    ///
    /// **Note**: currently, only the signature is supported for the `DeviceAuth`. Verifying the
    /// MAC results in the [DeviceMac][MdocError::DeviceMac] error.
    pub(crate) fn verify_device_signature(
        &self,
        client_id: &str,
        response_uri: &str,
        nonce: &str,
        mdoc_generated_nonce: &str,
        device_key: &JwkPublic,
    ) -> Result<()> {
        let device_signed = self
            .device_signed
            .as_ref()
            .ok_or_else(|| bherror::Error::root(MdocError::MissingDeviceSigned))?;

        let device_authentication = DeviceAuthentication::new(
            client_id,
            response_uri,
            nonce,
            mdoc_generated_nonce,
            &self.doc_type,
            &device_signed.name_spaces,
        )?;

        device_signed
            .device_auth
            .verify_signature(device_authentication, device_key)
            .ctx(|| "device signature")
    }
}

/// [`IssuerSigned`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSigned {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name_spaces: Option<IssuerNameSpaces>,
    issuer_auth: IssuerAuth,
}

impl IssuerSigned {
    #[cfg(test)]
    pub(crate) fn new(name_spaces: IssuerNameSpaces, issuer_auth: IssuerAuth) -> Self {
        Self {
            name_spaces: Some(name_spaces),
            issuer_auth,
        }
    }

    /// Returns the underlying [`IssuerAuth`].
    pub fn issuer_auth(&self) -> &IssuerAuth {
        &self.issuer_auth
    }

    /// Returns the underlying [`IssuerNameSpaces`], if any.
    pub fn name_spaces(&self) -> Option<&IssuerNameSpaces> {
        self.name_spaces.as_ref()
    }

    /// Returns the data elements of the first namespace as a JSON object.
    ///
    /// Data elements with values that have no JSON representation are left
    /// out. An empty object is returned if there are no namespaces.
    pub fn first_name_space_claims(&self) -> JsonObject {
        let Some((_, items)) = self.name_spaces.as_ref().and_then(|ns| ns.0.first()) else {
            return JsonObject::new();
        };

        items
            .iter()
            .filter_map(|item| {
                let item = &item.0.inner;
                let value = cbor_to_json(item.element_value.0.clone());

                if value.is_none() {
                    tracing::debug!(
                        "data element {} has no JSON representation",
                        item.element_identifier
                    );
                }

                Some((item.element_identifier.0.clone(), value?))
            })
            .collect()
    }
}

/// [`IssuerNameSpaces`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// The namespaces are kept in the order they were received in.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq)]
pub struct IssuerNameSpaces(pub(crate) Vec<(NameSpace, Vec<IssuerSignedItemBytes>)>);

impl Serialize for IssuerNameSpaces {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter().map(|(name_space, items)| (name_space, items)))
    }
}

impl<'de> Deserialize<'de> for IssuerNameSpaces {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IssuerNameSpacesVisitor;

        impl<'de> Visitor<'de> for IssuerNameSpacesVisitor {
            type Value = IssuerNameSpaces;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of namespaces to issuer signed items")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut name_spaces = Vec::with_capacity(map.size_hint().unwrap_or_default());
                while let Some(entry) = map.next_entry()? {
                    name_spaces.push(entry);
                }

                Ok(IssuerNameSpaces(name_spaces))
            }
        }

        deserializer.deserialize_map(IssuerNameSpacesVisitor)
    }
}

/// [`IssuerSignedItemBytes`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC
/// 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerSignedItemBytes(pub(crate) BytesCbor<IssuerSignedItem>);

impl IssuerSignedItemBytes {
    /// Computes the digest of the serialized `self`.
    ///
    /// The received encoding is digested when there is one, since the issuer
    /// digested exactly those bytes.
    pub fn digest(&self, alg: &DigestAlgorithm) -> Result<Vec<u8>> {
        let serialize = || -> Result<Vec<u8>> {
            let mut payload = Vec::new();
            ciborium::into_writer(self, &mut payload)
                .foreign_err(|| MdocError::IssuerAuth)
                .ctx(|| "unable to serialize `IssuerSignedItemBytes`")?;

            Ok(payload)
        };

        let payload = match self.0.original_data {
            Some(ref original_data) => original_data,
            None => &serialize()?,
        };

        Ok(match alg {
            DigestAlgorithm::Sha256 => sha256(payload).to_vec(),
            DigestAlgorithm::Sha384 => sha384(payload).to_vec(),
            DigestAlgorithm::Sha512 => sha512(payload).to_vec(),
        })
    }
}

impl From<IssuerSignedItem> for IssuerSignedItemBytes {
    fn from(value: IssuerSignedItem) -> Self {
        Self(value.into())
    }
}

impl From<IssuerSignedItemBytes> for IssuerSignedItem {
    fn from(value: IssuerSignedItemBytes) -> Self {
        value.0.inner
    }
}

/// [`IssuerSignedItem`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSignedItem {
    pub(crate) random: Bytes,
    #[serde(rename = "digestID")]
    pub(crate) digest_id: DigestID,
    pub(crate) element_value: DataElementValue,
    pub(crate) element_identifier: DataElementIdentifier,
}

impl IssuerSignedItem {
    #[cfg(test)]
    pub(crate) fn new(
        digest_id: u64,
        random: Vec<u8>,
        element_identifier: &str,
        element_value: impl Into<ciborium::Value>,
    ) -> Self {
        Self {
            random: random.into(),
            digest_id: digest_id.into(),
            element_value: DataElementValue(element_value.into()),
            element_identifier: element_identifier.into(),
        }
    }
}

/// Digest ID for issuer data authentication.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct DigestID(u64);

impl std::fmt::Display for DigestID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DigestID {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// [`DeviceSigned`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSigned {
    pub(crate) name_spaces: DeviceNameSpacesBytes,
    pub(crate) device_auth: DeviceAuth,
}

impl DeviceSigned {
    /// Creates a new [`DeviceSigned`] object with no device signed data
    /// elements, signing the `DeviceAuthentication` with the `sign` function.
    #[cfg(test)]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client_id: &str,
        response_uri: &str,
        nonce: &str,
        mdoc_generated_nonce: &str,
        doc_type: &DocType,
        alg: coset::iana::Algorithm,
        sign: impl FnOnce(&[u8]) -> Vec<u8>,
    ) -> Result<Self> {
        let name_spaces = DeviceNameSpaces::default().into();

        let device_authentication = DeviceAuthentication::new(
            client_id,
            response_uri,
            nonce,
            mdoc_generated_nonce,
            doc_type,
            &name_spaces,
        )?;

        let device_auth = DeviceAuth::new_signature(device_authentication, alg, sign)?;

        Ok(Self {
            name_spaces,
            device_auth,
        })
    }
}

/// [`DeviceNameSpacesBytes`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC
/// 18013-5:2021][1] standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceNameSpacesBytes(pub(crate) BytesCbor<DeviceNameSpaces>);

impl From<DeviceNameSpaces> for DeviceNameSpacesBytes {
    fn from(value: DeviceNameSpaces) -> Self {
        Self(value.into())
    }
}

/// [`DeviceNameSpaces`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceNameSpaces(HashMap<NameSpace, DeviceSignedItems>);

/// [`DeviceSignedItems`] as defined in the section `8.3.2.1.2.2` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSignedItems(HashMap<DataElementIdentifier, DataElementValue>);
