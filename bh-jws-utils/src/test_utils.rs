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

//! Signing helpers for producing test fixtures.
//!
//! The crate itself only verifies signatures, these helpers exist so that
//! dependent crates can issue credentials in their tests.
use openssl::{
    ecdsa::EcdsaSig,
    hash::hash,
    pkey::{PKeyRef, Private},
};
use serde_json::Value;

use crate::{base64_url_encode, construct_jws_payload, EcCurve};

/// Signs the `message` with the ECDSA `key`, returning the JWS signature
/// encoding `r || s` with each half left-padded to the coordinate length of
/// the key curve.
///
/// # Panics
///
/// Panics if `key` is not an EC key on one of the supported curves.
pub fn sign_ecdsa(key: &PKeyRef<Private>, message: &[u8]) -> Vec<u8> {
    let ec_key = key.ec_key().expect("not an EC key");
    let curve = EcCurve::of_key(&ec_key).expect("unsupported curve");

    let digest = hash(curve.digest(), message).unwrap();
    let signature = EcdsaSig::sign(&digest, &ec_key).unwrap();

    let len = curve.coordinate_len() as i32;
    let mut bytes = signature.r().to_vec_padded(len).unwrap();
    bytes.extend(signature.s().to_vec_padded(len).unwrap());
    bytes
}

/// Produces a compact JWS `<header>.<payload>.<signature>` over the given
/// JSON header and payload.
pub fn sign_jws(header: &Value, payload: &Value, key: &PKeyRef<Private>) -> String {
    let header = base64_url_encode(serde_json::to_vec(header).unwrap());
    let payload = base64_url_encode(serde_json::to_vec(payload).unwrap());

    let message = construct_jws_payload(&header, &payload);
    let signature = base64_url_encode(sign_ecdsa(key, message.as_bytes()));

    format!("{message}.{signature}")
}
