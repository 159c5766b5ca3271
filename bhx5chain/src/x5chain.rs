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

use bherror::traits::{ErrorContext as _, ForeignError as _};
use openssl::{
    base64,
    error::ErrorStack,
    nid::Nid,
    pkey::{PKey, Public},
    stack::Stack,
    x509::{
        store::{X509Store, X509StoreBuilder},
        verify::X509VerifyFlags,
        X509StoreContext, X509,
    },
};

use crate::{Error, Result};

/// The `x5chain` as defined in [RFC 9360][1].
///
/// The certificates are ordered starting with the certificate containing the end-entity key
/// followed by the certificate that signed it, and so on, as stated in [RFC 9360][1].
///
/// All methods of this type that return an [`Error`] do so in case the `x5chain` is invalid.
///
/// [1]: <https://www.rfc-editor.org/rfc/rfc9360.html#section-2-5.4.1>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct X5Chain {
    leaf: X509,
    intermediates: Vec<X509>,
}

impl X5Chain {
    /// Create a new [`X5Chain`].
    ///
    /// The chain **MUST BE** ordered in such a way that the leaf certificate is at first place,
    /// then goes its parent, and so on.
    ///
    /// # Warning
    ///
    /// The chain is at this point **NOT VALIDATED** against any trusted root certificate. In order
    /// to validate the chain against a trusted root certificate, use the
    /// [`X5Chain::verify_against_trusted_roots`] method.
    pub fn new(chain: Vec<X509>) -> Result<Self> {
        validate_chain_order(&chain)?;

        let mut chain = chain.into_iter();
        let Some(leaf) = chain.next() else {
            return Err(bherror::Error::root(Error::X5Chain).ctx("chain is empty"));
        };
        let intermediates = chain.collect();

        Ok(Self {
            leaf,
            intermediates,
        })
    }

    /// Constructs a [`X5Chain`] from raw bytes, as found in the `x5chain` COSE header.
    ///
    /// Each certificate **MUST BE** represented as a [`Vec`] of bytes of the respective certificate
    /// in the _DER_ format, ordered from the leaf upwards.
    pub fn from_raw_bytes(bytes: &[Vec<u8>]) -> Result<Self> {
        let certs = bytes
            .iter()
            .enumerate()
            .map(|(i, der)| X509::from_der(der).foreign_err(|| Error::X5Chain).ctx(|| i))
            .collect::<Result<_>>()
            .ctx(|| "invalid X509 certificate")?;

        Self::new(certs)
    }

    /// Constructs a [`X5Chain`] from base64 (**not** base64url) encoded _DER_ certificates, as
    /// found in the `x5c` JOSE header.
    pub fn from_base64_ders<S: AsRef<str>>(base64_ders: &[S]) -> Result<Self> {
        let der_certs: Vec<Vec<u8>> = base64_ders
            .iter()
            .enumerate()
            .map(|(i, base64_der)| {
                base64::decode_block(base64_der.as_ref())
                    .foreign_err(|| Error::X5Chain)
                    .ctx(|| i)
            })
            .collect::<Result<_>>()
            .ctx(|| "invalid base64 string")?;

        Self::from_raw_bytes(&der_certs)
    }

    /// Verify the [`X5Chain`] against trusted root certificates.
    ///
    /// The root certificate may be in chain, but it **MUST BE** found in `trust` as well.
    pub fn verify_against_trusted_roots(&self, trust: &X509Trust) -> Result<()> {
        let intermediates = chain_to_stack(self.intermediates.clone())?;
        let trust = certs_to_store(trust.0.clone())?;

        // `X509StoreContext` treats the chain as untrusted helpers for building the path to the
        // target; the leaf being present in it or not makes no difference.
        let mut context = X509StoreContext::new().foreign_err(|| Error::X5Chain)?;
        let is_valid = context
            .init(&trust, &self.leaf, &intermediates, |ctx| {
                clean_up_after_openssl(|| ctx.verify_cert())
            })
            .foreign_err(|| Error::X5Chain)?;

        if !is_valid {
            return Err(bherror::Error::root(Error::X5Chain)
                .ctx("Chain validation against trusted root certificates failed")
                .ctx(format!(
                    "OpenSSL error on depth {}: {}",
                    context.error_depth(),
                    context.error()
                )));
        };

        Ok(())
    }

    /// Convert the chain into a list of DER encoded certificates.
    pub fn as_bytes(&self) -> Result<Vec<Vec<u8>>> {
        std::iter::once(&self.leaf)
            .chain(&self.intermediates)
            .map(|cert| cert.to_der().foreign_err(|| Error::X5Chain))
            .collect()
    }

    /// Returns the public key from the leaf certificate.
    pub fn leaf_certificate_key(&self) -> Result<PKey<Public>> {
        self.leaf_certificate()
            .public_key()
            .foreign_err(|| Error::X5Chain)
            .ctx(|| "Failed to access X509 public key")
    }

    /// Returns the leaf certificate.
    pub fn leaf_certificate(&self) -> &X509 {
        &self.leaf
    }

    /// Returns the subject distinguished name of the leaf certificate in the
    /// [RFC 4514][1] string form, e.g. `CN=PID DS - 003, O=Example, C=UT`.
    ///
    /// [1]: <https://www.rfc-editor.org/rfc/rfc4514#section-2.1>
    pub fn leaf_subject(&self) -> Result<String> {
        let attributes = self
            .leaf
            .subject_name()
            .entries()
            .map(|entry| {
                let key = entry
                    .object()
                    .nid()
                    .short_name()
                    .map(str::to_owned)
                    .unwrap_or_else(|_| entry.object().to_string());
                let value = std::str::from_utf8(entry.data().as_slice())
                    .foreign_err(|| Error::X5Chain)
                    .ctx(|| format!("subject attribute {key} is not a string"))?;
                Ok(format!("{key}={value}"))
            })
            .collect::<Result<Vec<_>>>()?;

        // RFC 4514 lists the most specific attribute first
        Ok(attributes.into_iter().rev().collect::<Vec<_>>().join(", "))
    }

    /// Returns the `commonName` of the leaf certificate subject, if there is one.
    pub fn leaf_common_name(&self) -> Option<String> {
        self.leaf
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| std::str::from_utf8(entry.data().as_slice()).ok())
            .map(str::to_owned)
    }
}

/// A collection of [`X509`] trusted root certificates.
///
/// This is used to verify the authenticity of the [`X5Chain`].
#[derive(Debug, Clone, Default)]
pub struct X509Trust(Vec<X509>);

impl X509Trust {
    /// Create a new [`X509Trust`].
    pub fn new(trust: Vec<X509>) -> Self {
        Self(trust)
    }

    /// Load the trust anchors from base64 encoded _DER_ certificates without
    /// PEM armour.
    pub fn from_base64_ders<S: AsRef<str>>(base64_ders: &[S]) -> Result<Self> {
        let certs = base64_ders
            .iter()
            .enumerate()
            .map(|(i, base64_der)| {
                let der = base64::decode_block(base64_der.as_ref().trim())
                    .foreign_err(|| Error::TrustAnchor)
                    .ctx(|| i)?;
                X509::from_der(&der)
                    .foreign_err(|| Error::TrustAnchor)
                    .ctx(|| i)
            })
            .collect::<Result<_>>()?;

        Ok(Self(certs))
    }

    /// Returns `true` if there are no trust anchors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Helper method for converting certificates to `Stack<x509>`.
fn chain_to_stack(chain: impl IntoIterator<Item = X509>) -> Result<Stack<X509>> {
    let mut intermediates = Stack::new().foreign_err(|| Error::X5Chain)?;

    for cert in chain {
        intermediates.push(cert).foreign_err(|| Error::X5Chain)?;
    }

    Ok(intermediates)
}

/// Helper method for converting certificates to `X509Store`.
fn certs_to_store(certificates: impl IntoIterator<Item = X509>) -> Result<X509Store> {
    let mut builder = X509StoreBuilder::new().foreign_err(|| Error::X5Chain)?;
    builder
        .set_flags(X509VerifyFlags::X509_STRICT | X509VerifyFlags::CHECK_SS_SIGNATURE)
        .foreign_err(|| Error::X5Chain)?;

    for cert in certificates {
        builder.add_cert(cert).foreign_err(|| Error::X5Chain)?;
    }

    Ok(builder.build())
}

/// Validates that the certificates in a chain are in order, leaf first.
///
/// [`X509StoreContext`] does not check this, so a reversed chain would
/// otherwise pass verification.
fn validate_chain_order(chain: &[X509]) -> Result<()> {
    if chain.is_empty() {
        return Err(bherror::Error::root(Error::X5Chain).ctx("chain is empty"));
    }

    let is_ordered = chain
        .windows(2)
        .try_fold(true, |acc, cert_pair| {
            let child = &cert_pair[0];
            let parent = &cert_pair[1];

            let is_child = clean_up_after_openssl(|| child.verify(parent.public_key()?.as_ref()))?;

            Ok::<_, ErrorStack>(acc && is_child)
        })
        .foreign_err(|| Error::X5Chain)?;

    if !is_ordered {
        return Err(bherror::Error::root(Error::X5Chain).ctx("invalid chain order"));
    }

    Ok(())
}

/// Wrap a closure calling OpenSSL with low-level cleanup to make it safer in an async context.
///
/// Keep the closure as small as possible.
fn clean_up_after_openssl<T>(
    f: impl FnOnce() -> std::result::Result<T, ErrorStack>,
) -> std::result::Result<T, ErrorStack> {
    let return_value = f()?;

    // The call succeeded, so anything left on the error stack is stale.
    drop(ErrorStack::get());

    Ok(return_value)
}
