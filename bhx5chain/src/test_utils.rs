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

//! Runtime generation of certificate hierarchies for tests.
//!
//! Certificates are generated on every call so their validity windows are
//! always anchored to the current time. Do NOT use any of this outside tests.

use openssl::{
    asn1::Asn1Time,
    base64,
    bn::{BigNum, MsbOption},
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkey::{PKey, PKeyRef, Private},
    x509::{
        extension::{AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectKeyIdentifier},
        X509Name, X509NameBuilder, X509NameRef, X509Ref, X509,
    },
};

use crate::{X509Trust, X5Chain};

/// Subject of the leaf certificate generated by [`TestPki`].
pub const LEAF_SUBJECT: &[(&str, &str)] = &[("C", "HR"), ("O", "TBTL"), ("CN", "Test Issuer")];

const ROOT_SUBJECT: &[(&str, &str)] = &[("C", "HR"), ("O", "TBTL"), ("CN", "Test Root")];

const VALIDITY_PERIOD_IN_DAYS: u32 = 30;

/// Generate a fresh EC private key on the given named curve.
pub fn generate_ec_key(curve: Nid) -> PKey<Private> {
    let group = EcGroup::from_curve_name(curve).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn build_name(attributes: &[(&str, &str)]) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    for (field, value) in attributes {
        builder.append_entry_by_text(field, value).unwrap();
    }
    builder.build()
}

/// Issue a certificate for `subject_key`.
///
/// When `issuer` is [`None`] the certificate is self-signed.
pub fn issue_certificate(
    subject: &[(&str, &str)],
    subject_key: &PKeyRef<Private>,
    issuer: Option<(&X509Ref, &PKeyRef<Private>)>,
    is_ca: bool,
) -> X509 {
    let subject_name = build_name(subject);

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();

    let mut serial_number = BigNum::new().unwrap();
    serial_number
        .rand(128, MsbOption::MAYBE_ZERO, false)
        .unwrap();
    builder
        .set_serial_number(&serial_number.to_asn1_integer().unwrap())
        .unwrap();

    builder.set_subject_name(&subject_name).unwrap();
    let issuer_name: &X509NameRef = match issuer {
        Some((issuer_cert, _)) => issuer_cert.subject_name(),
        None => &subject_name,
    };
    builder.set_issuer_name(issuer_name).unwrap();
    builder.set_pubkey(subject_key).unwrap();

    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(VALIDITY_PERIOD_IN_DAYS).unwrap())
        .unwrap();

    let mut basic_constraints = BasicConstraints::new();
    basic_constraints.critical();
    if is_ca {
        basic_constraints.ca();
    }
    builder
        .append_extension(basic_constraints.build().unwrap())
        .unwrap();

    let mut key_usage = KeyUsage::new();
    key_usage.critical();
    if is_ca {
        key_usage.key_cert_sign().crl_sign();
    } else {
        key_usage.digital_signature();
    }
    builder.append_extension(key_usage.build().unwrap()).unwrap();

    let issuer_cert = issuer.map(|(cert, _)| cert);
    let subject_key_identifier = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(issuer_cert, None))
        .unwrap();
    builder.append_extension(subject_key_identifier).unwrap();

    if let Some(issuer_cert) = issuer_cert {
        let authority_key_identifier = AuthorityKeyIdentifier::new()
            .keyid(false)
            .issuer(false)
            .build(&builder.x509v3_context(Some(issuer_cert), None))
            .unwrap();
        builder.append_extension(authority_key_identifier).unwrap();
    }

    let signing_key = issuer.map_or(subject_key, |(_, key)| key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();

    builder.build()
}

/// A self-signed root with a single leaf issued directly by it.
pub struct TestPki {
    /// Private key of the root.
    pub root_key: PKey<Private>,
    /// Self-signed root certificate.
    pub root: X509,
    /// Private key of the leaf, used to sign test credentials.
    pub leaf_key: PKey<Private>,
    /// Leaf certificate with [`LEAF_SUBJECT`].
    pub leaf: X509,
}

impl TestPki {
    /// Generate a hierarchy whose leaf key is on the given curve.
    pub fn generate(leaf_curve: Nid) -> Self {
        let root_key = generate_ec_key(Nid::X9_62_PRIME256V1);
        let root = issue_certificate(ROOT_SUBJECT, &root_key, None, true);

        let leaf_key = generate_ec_key(leaf_curve);
        let leaf = issue_certificate(LEAF_SUBJECT, &leaf_key, Some((&*root, &*root_key)), false);

        Self {
            root_key,
            root,
            leaf_key,
            leaf,
        }
    }

    /// Leaf key on P-256, for `ES256`.
    pub fn p256() -> Self {
        Self::generate(Nid::X9_62_PRIME256V1)
    }

    /// Leaf key on P-521, for `ES512`.
    pub fn p521() -> Self {
        Self::generate(Nid::SECP521R1)
    }

    /// The chain containing only the leaf.
    pub fn x5chain(&self) -> X5Chain {
        X5Chain::new(vec![self.leaf.clone()]).unwrap()
    }

    /// The `x5c` JOSE header value for the leaf.
    pub fn x5c(&self) -> Vec<String> {
        vec![base64::encode_block(&self.leaf.to_der().unwrap())]
    }

    /// The root as a trust anchor.
    pub fn trust(&self) -> X509Trust {
        X509Trust::new(vec![self.root.clone()])
    }

    /// The root as a base64 _DER_ string list, the way verifiers are configured.
    pub fn trusted_certificates(&self) -> Vec<String> {
        vec![base64::encode_block(&self.root.to_der().unwrap())]
    }
}
