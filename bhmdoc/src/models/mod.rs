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

//! This module defines the core data types & functions used in the crate to implement the
//! presentation side of the [ISO/IEC 18013-5:2021][1] standard.
//!
//! Submodules roughly correspond to sections of the [ISO/IEC 18013-5:2021][1] standard, as
//! profiled by [ISO/IEC TS 18013-7:2024][2] for OpenID for [Verifiable Presentations][3].
//!
//! [1]: <https://www.iso.org/standard/69084.html>
//! [2]: <https://www.iso.org/standard/82772.html>
//! [3]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>

pub mod data_retrieval;

use std::str::FromStr;

use bherror::traits::{ErrorContext as _, ForeignError as _};
use chrono::{SubsecRound as _, Utc};
use ciborium::{from_reader, into_writer, value::Value};
pub use data_retrieval::{
    common::{DocType, NameSpace},
    device_retrieval::response::{DeviceResponse, Document, IssuerSigned},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::MdocError;

/// A _CBOR_ tag value for date-time as specified in [RFC 8949][1] which is used by [ISO/IEC
/// 18013-5:2021][2].
///
/// [1]: <https://datatracker.ietf.org/doc/html/rfc8949#name-standard-date-time-string>
/// [2]: <https://www.iso.org/standard/69084.html>
const MDOC_TDATE_CBOR_TAG: u64 = 0;

/// A _CBOR_ tag value for the _CBOR_ byte-string as specified by the section `8.1` of the [ISO/IEC
/// 18013-5:2021][1].
///
/// [1]: <https://www.iso.org/standard/69084.html>
const MDOC_BYTES_CBOR_TAG: u64 = 24;

/// A _CBOR_ _byte string_.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value")]
pub struct Bytes(pub(crate) Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<Bytes> for Value {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes.0)
    }
}

/// A _CBOR_ _byte string_ where the bytes represent a _CBOR_ representation of the underlying
/// type.
///
/// It is assigned a _CBOR_ tag value of `24` as specified in section `8.1` of [ISO/IEC
/// 18013-5:2021][1].
///
/// The received bytes are kept next to the decoded value, because digests and signatures are
/// computed over the exact encoding of the sender.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Clone, Debug, PartialEq)]
pub struct BytesCbor<T> {
    pub(crate) inner: T,

    pub(crate) original_data: Option<Vec<u8>>,
}

impl<T> BytesCbor<T> {
    /// Try to create a [`BytesCbor`] from a CBOR [`Value`].
    ///
    /// If the [`Value`] isn't valid, an error message is returned.
    pub fn try_from_cbor(value: &Value) -> Result<Self, String>
    where
        T: serde::de::DeserializeOwned,
    {
        let tagged_value @ Value::Tag(MDOC_BYTES_CBOR_TAG, ref value) = value else {
            return Err(format!(
                "`bstr .cbor` MUST be tagged with `{}`",
                MDOC_BYTES_CBOR_TAG
            ));
        };

        let bytes = value
            .as_bytes()
            .ok_or_else(|| "`bstr .cbor` MUST be `Bytes`".to_owned())?;

        let inner = from_reader(bytes.as_slice()).map_err(|err| err.to_string())?;

        let mut original_data = Vec::new();
        // we can serialize Value again because it preserves the ordering
        into_writer(tagged_value, &mut original_data).map_err(|err| err.to_string())?;

        Ok(Self {
            inner,
            original_data: Some(original_data),
        })
    }

    /// Convert the [`BytesCbor`] into a CBOR [`Value`].
    ///
    /// The received encoding is reused when there is one.
    pub fn try_into_cbor(&self) -> Result<Value, String>
    where
        T: Serialize,
    {
        if let Some(ref bytes) = self.original_data {
            return from_reader(bytes.as_slice()).map_err(|err| err.to_string());
        }

        let mut bytes = vec![];
        into_writer(&self.inner, &mut bytes).map_err(|err| err.to_string())?;

        Ok(Value::Tag(MDOC_BYTES_CBOR_TAG, Box::new(Value::Bytes(bytes))))
    }
}

impl<T> From<T> for BytesCbor<T> {
    fn from(value: T) -> Self {
        Self {
            inner: value,
            original_data: None,
        }
    }
}

impl<T> Serialize for BytesCbor<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let value = self.try_into_cbor().map_err(serde::ser::Error::custom)?;

        value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for BytesCbor<T>
where
    T: serde::de::DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        Self::try_from_cbor(&value).map_err(serde::de::Error::custom)
    }
}

/// A `tdate` _CBOR_ type, as defined in the section `7.2.1` of the [ISO/IEC 18013-5:2021][1].
///
/// The timestamp MUST use the UTC offset `"Z"` of [RFC 3339][2]. The standard forbids fractions
/// of seconds as well, but some issuers emit them anyway, so they are accepted and truncated.
/// Encoding never produces them.
///
/// [1]: <https://www.iso.org/standard/69084.html>
/// [2]: <https://datatracker.ietf.org/doc/html/rfc3339>
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct DateTime(chrono::DateTime<Utc>);

impl DateTime {
    /// Returns the number of seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl FromStr for DateTime {
    type Err = bherror::Error<MdocError>;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let date_time = chrono::DateTime::parse_from_rfc3339(value)
            .foreign_err(|| MdocError::InvalidDateTime)
            .ctx(|| format!("{value} not a valid Date Time string"))?;

        if date_time.offset().utc_minus_local() != 0 {
            return Err(bherror::Error::root(MdocError::InvalidDateTime)
                .ctx("Date Time is not in UTC (offset must be Z)"));
        }

        Ok(date_time.with_timezone(&Utc).into())
    }
}

impl TryFrom<i64> for DateTime {
    type Error = bherror::Error<MdocError>;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let date_time = chrono::DateTime::from_timestamp(value, 0).ok_or_else(|| {
            bherror::Error::root(MdocError::InvalidDateTime)
                .ctx(format!("{value} seconds out of range"))
        })?;

        Ok(date_time.into())
    }
}

impl From<DateTime> for Value {
    fn from(date_time: DateTime) -> Self {
        let date_time = date_time
            .0
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        Self::Tag(MDOC_TDATE_CBOR_TAG, Box::new(Self::Text(date_time)))
    }
}

impl TryFrom<Value> for DateTime {
    type Error = bherror::Error<MdocError>;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Tag(MDOC_TDATE_CBOR_TAG, value) = value else {
            return Err(
                bherror::Error::root(MdocError::InvalidDateTime).ctx(format!(
                    "`tdate` MUST be tagged with `{}`",
                    MDOC_TDATE_CBOR_TAG
                )),
            );
        };

        let value = value.as_text().ok_or_else(|| {
            bherror::Error::root(MdocError::InvalidDateTime).ctx("`tdate` MUST be `String`")
        })?;

        value.parse::<DateTime>()
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(value: chrono::DateTime<Utc>) -> Self {
        Self(value.trunc_subsecs(0))
    }
}

impl From<DateTime> for chrono::DateTime<Utc> {
    fn from(date_time: DateTime) -> Self {
        date_time.0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ciborium::{from_reader, into_writer};

    use super::*;

    #[test]
    fn test_datetime_success() {
        const EXPECTED_CBOR: &str = "c074323032302d31302d30315431333a33303a30325a";

        let date_time: DateTime = "2020-10-01T13:30:02Z".parse().unwrap();

        let mut encoded = Vec::new();
        into_writer(&date_time, &mut encoded).unwrap();

        let encoded_hex = hex::encode(&encoded);

        assert_eq!(EXPECTED_CBOR, encoded_hex);

        let decoded: DateTime = from_reader(encoded.as_slice()).unwrap();

        assert_eq!(date_time, decoded);
    }

    #[test]
    fn test_datetime_sub_secs_truncated() {
        let whole: DateTime = "1985-04-12T23:20:50Z".parse().unwrap();

        let fraction: DateTime = "1985-04-12T23:20:50.52Z".parse().unwrap();
        assert_eq!(whole, fraction);

        let fraction: DateTime = Value::Tag(
            MDOC_TDATE_CBOR_TAG,
            Box::new(Value::Text("1985-04-12T23:20:50.957298677Z".to_owned())),
        )
        .try_into()
        .unwrap();
        assert_eq!(whole, fraction);

        // fractions are never written back
        assert_eq!(
            Value::from(fraction),
            Value::Tag(
                MDOC_TDATE_CBOR_TAG,
                Box::new(Value::Text("1985-04-12T23:20:50Z".to_owned()))
            )
        );
    }

    #[test]
    fn test_datetime_non_utc_fails() {
        // UTC (Z) success
        let dt = "1996-12-19T16:39:57Z";

        let _date_time: DateTime = dt.parse().unwrap();

        // -08:00 from UTC (Pacific Standard Time) should fail
        let dt = "1996-12-19T16:39:57-08:00";

        let err = dt.parse::<DateTime>().unwrap_err();
        assert_matches!(err.error, MdocError::InvalidDateTime);

        let err = DateTime::try_from(Value::Tag(
            MDOC_TDATE_CBOR_TAG,
            Box::new(Value::Text(dt.to_owned())),
        ))
        .unwrap_err();
        assert_matches!(err.error, MdocError::InvalidDateTime);
    }

    #[test]
    fn test_value_tdate_untagged_fails() {
        let data = Value::Text("2020-10-01T13:30:02Z".to_owned());

        let err = DateTime::try_from(data).unwrap_err();

        assert_matches!(err.error, MdocError::InvalidDateTime);
    }

    #[test]
    fn test_bytes_cbor_keeps_received_encoding() {
        // tag 24 over the non-preferred encoding of the integer `1` (`0x18 0x01`)
        let value = Value::Tag(MDOC_BYTES_CBOR_TAG, Box::new(Value::Bytes(vec![0x18, 0x01])));

        let bytes_cbor = BytesCbor::<u64>::try_from_cbor(&value).unwrap();
        assert_eq!(bytes_cbor.inner, 1);

        let mut encoded = Vec::new();
        into_writer(&bytes_cbor, &mut encoded).unwrap();
        assert_eq!(hex::encode(encoded), "d818421801");

        // a fresh value is encoded on its own
        let mut encoded = Vec::new();
        into_writer(&BytesCbor::from(1u64), &mut encoded).unwrap();
        assert_eq!(hex::encode(encoded), "d8184101");
    }

    #[test]
    fn test_bytes_cbor_untagged_fails() {
        let value = Value::Bytes(vec![0x01]);

        assert_matches!(BytesCbor::<u64>::try_from_cbor(&value), Err(_));
    }
}
