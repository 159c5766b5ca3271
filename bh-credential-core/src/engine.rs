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

//! Ordered registries of format handlers.
//!
//! Every engine tries its handlers sequentially in registration order and
//! stops at the first success. Handlers are never raced, since they may
//! perform network requests which must not be issued once an earlier handler
//! has succeeded. The engines perform no format detection of their own, so
//! handlers which reject foreign input cheaply should be registered first.

use async_trait::async_trait;
use bh_jws_utils::{JwkPublic, JwsHeader};
use bherror::{Error, Result};

use crate::{
    CredentialParsingError, CredentialVerificationError, ParsedCredential,
    PublicKeyResolutionError, RawCredential, VerifyOptions,
};

/// Parser of a single credential format.
#[async_trait]
pub trait CredentialParser: Send + Sync {
    /// Parses the raw credential into its canonical form.
    async fn parse(
        &self,
        raw_credential: &RawCredential,
    ) -> Result<ParsedCredential, CredentialParsingError>;
}

/// Successful outcome of a credential verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    /// Public key the holder proved possession of, or is bound to.
    pub holder_public_key: JwkPublic,
}

/// Verifier of a single credential format.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verifies the raw credential presentation.
    async fn verify(
        &self,
        raw_credential: &RawCredential,
        opts: &VerifyOptions,
    ) -> Result<VerificationOutcome, CredentialVerificationError>;
}

/// Input of a [`PublicKeyResolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublicKeyRequest {
    /// The issuer identifier (`iss`) of the signed object, if any.
    pub issuer: Option<String>,
    /// The JOSE header of the signed object.
    pub header: JwsHeader,
}

/// Public key returned by a [`PublicKeyResolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPublicKey {
    /// The resolved key.
    pub jwk: JwkPublic,
}

/// Strategy for resolving the public key of an issuer.
#[async_trait]
pub trait PublicKeyResolver: Send + Sync {
    /// Resolves the key which the object described by `request` is signed
    /// with.
    async fn resolve(
        &self,
        request: &PublicKeyRequest,
    ) -> Result<ResolvedPublicKey, PublicKeyResolutionError>;
}

/// Ordered registry of [`CredentialParser`]s.
#[derive(Default)]
pub struct ParsingEngine {
    parsers: Vec<Box<dyn CredentialParser>>,
}

impl ParsingEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the parser to the registry.
    pub fn register<P: CredentialParser + 'static>(&mut self, parser: P) -> &mut Self {
        self.parsers.push(Box::new(parser));
        self
    }

    /// Returns the result of the first parser that succeeds, or
    /// [`CredentialParsingError::CouldNotParse`] if none does.
    pub async fn parse(
        &self,
        raw_credential: &RawCredential,
    ) -> Result<ParsedCredential, CredentialParsingError> {
        for (index, parser) in self.parsers.iter().enumerate() {
            match parser.parse(raw_credential).await {
                Ok(parsed) => return Ok(parsed),
                Err(error) => tracing::debug!(index, %error, "parser rejected the credential"),
            }
        }

        Err(Error::root(CredentialParsingError::CouldNotParse))
    }
}

/// Ordered registry of [`CredentialVerifier`]s.
#[derive(Default)]
pub struct VerifyingEngine {
    verifiers: Vec<Box<dyn CredentialVerifier>>,
}

impl VerifyingEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the verifier to the registry.
    pub fn register<V: CredentialVerifier + 'static>(&mut self, verifier: V) -> &mut Self {
        self.verifiers.push(Box::new(verifier));
        self
    }

    /// Returns the outcome of the first verifier that succeeds.
    ///
    /// When all of them fail, the error of the **last** one is returned, as
    /// later verifiers are the more specific ones. An empty registry yields
    /// [`CredentialVerificationError::UnknownProblem`].
    pub async fn verify(
        &self,
        raw_credential: &RawCredential,
        opts: &VerifyOptions,
    ) -> Result<VerificationOutcome, CredentialVerificationError> {
        let mut last_error = None;

        for (index, verifier) in self.verifiers.iter().enumerate() {
            match verifier.verify(raw_credential, opts).await {
                Ok(outcome) => return Ok(outcome),
                Err(error) => {
                    tracing::debug!(index, %error, "verifier rejected the credential");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::root(CredentialVerificationError::UnknownProblem)))
    }
}

/// Ordered registry of [`PublicKeyResolver`]s.
#[derive(Default)]
pub struct PublicKeyResolverEngine {
    resolvers: Vec<Box<dyn PublicKeyResolver>>,
}

impl PublicKeyResolverEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the resolver to the registry.
    pub fn register<R: PublicKeyResolver + 'static>(&mut self, resolver: R) -> &mut Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Returns the key of the first resolver that succeeds, or
    /// [`PublicKeyResolutionError::CannotResolvePublicKey`] if none does.
    pub async fn resolve(
        &self,
        request: &PublicKeyRequest,
    ) -> Result<ResolvedPublicKey, PublicKeyResolutionError> {
        for (index, resolver) in self.resolvers.iter().enumerate() {
            match resolver.resolve(request).await {
                Ok(resolved) => return Ok(resolved),
                Err(error) => tracing::debug!(index, %error, "resolver could not resolve the key"),
            }
        }

        Err(Error::root(PublicKeyResolutionError::CannotResolvePublicKey))
    }
}
