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

//! Issuer public key resolution strategies.
//!
//! * [`X5cPublicKeyResolver`] for lookup from the `x5c` X.509 certificate chain.
//! * [`JwtVcIssuerPublicKeyResolver`] for lookup via the JWT VC Issuer Metadata.
//!
//! Both are meant to be registered in a [`PublicKeyResolverEngine`].
//!
//! <https://datatracker.ietf.org/doc/html/draft-ietf-oauth-sd-jwt-vc-09#name-issuer-signed-jwt-verificat>
//!
//! [`PublicKeyResolverEngine`]: bh_credential_core::PublicKeyResolverEngine

use async_trait::async_trait;
use bh_credential_core::{
    fetch_json, Context, HttpClient, PublicKeyRequest, PublicKeyResolutionError, PublicKeyResolver,
    ResolvedPublicKey,
};
use bh_jws_utils::{public_jwk_from_x5chain_leaf, JwkSet, SigningAlgorithm};
use bh_vct_metadata::resolve_issuer_metadata;
use bherror::{
    traits::{ErrorContext as _, ForeignError as _, PropagateError as _},
    Error, Result,
};
use bhx5chain::{X509Trust, X5Chain};
use serde_json::Value;

/// The [`PublicKeyResolver`] that retrieves the Issuer's public key from the
/// leaf of the X.509 certificate chain in the `x5c` header.
///
/// It can be configured with trusted root certificates, in which case the
/// authenticity of the X.509 certificate chain will be verified against those
/// certificates, failing the resolution if the verification fails.
#[derive(Debug, Clone)]
pub struct X5cPublicKeyResolver {
    trust: Option<X509Trust>,
}

impl X5cPublicKeyResolver {
    /// Create a new instance of the [`X5cPublicKeyResolver`], that will
    /// **TRUST ALL** Issuers, i.e. the authenticity of the X.509 certificate
    /// chain will not be verified.
    pub fn trust_all() -> Self {
        tracing::warn!("Issuer's authenticity will not be verified");

        Self { trust: None }
    }

    /// Create a new instance of the [`X5cPublicKeyResolver`], that will
    /// verify the authenticity of the X.509 certificate chain against the
    /// provided trusted roots.
    pub fn with_trust(trust: X509Trust) -> Self {
        Self { trust: Some(trust) }
    }

    /// Create a new instance trusting the certificates of the `context`, or
    /// trusting all Issuers if the `context` has none.
    pub fn from_context(context: &Context) -> bhx5chain::Result<Self> {
        let trust = context.trust()?;

        Ok(if trust.is_empty() {
            Self::trust_all()
        } else {
            Self::with_trust(trust)
        })
    }
}

#[async_trait]
impl PublicKeyResolver for X5cPublicKeyResolver {
    async fn resolve(
        &self,
        request: &PublicKeyRequest,
    ) -> Result<ResolvedPublicKey, PublicKeyResolutionError> {
        let header = &request.header;
        let Some(x5c) = &header.x5c else {
            return Err(Error::root(PublicKeyResolutionError::CannotResolvePublicKey))
                .ctx(|| "missing `x5c` header");
        };

        let x5chain = X5Chain::from_base64_ders(x5c)
            .with_err(|| PublicKeyResolutionError::CannotResolvePublicKey)
            .ctx(|| "invalid `x5c` header")?;

        if let Some(trust) = &self.trust {
            x5chain
                .verify_against_trusted_roots(trust)
                .with_err(|| PublicKeyResolutionError::CannotResolvePublicKey)
                .ctx(|| "x5chain does not verify against trusted roots")?;
        }

        let alg = SigningAlgorithm::try_from(header.alg)
            .with_err(|| PublicKeyResolutionError::CannotResolvePublicKey)?;
        let jwk = public_jwk_from_x5chain_leaf(&x5chain, &alg, header.kid.as_deref())
            .with_err(|| PublicKeyResolutionError::CannotResolvePublicKey)
            .ctx(|| "failed to get jwk from x5chain leaf")?;

        Ok(ResolvedPublicKey { jwk })
    }
}

/// The [`PublicKeyResolver`] that retrieves the Issuer's public key from its
/// [JWT VC Issuer Metadata], selecting the key by the `kid` header.
///
/// The keys are taken either from the inline `jwks` or from the `jwks_uri` of
/// the metadata.
///
/// [JWT VC Issuer Metadata]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-sd-jwt-vc-03#name-jwt-vc-issuer-metadata
#[derive(Debug, Clone)]
pub struct JwtVcIssuerPublicKeyResolver<C> {
    client: C,
}

impl<C: HttpClient> JwtVcIssuerPublicKeyResolver<C> {
    /// Construct [`JwtVcIssuerPublicKeyResolver`] from a [`HttpClient`].
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn jwks(&self, iss: &str) -> Result<JwkSet, PublicKeyResolutionError> {
        let metadata = resolve_issuer_metadata(&self.client, iss)
            .await
            .with_err(|| PublicKeyResolutionError::CannotResolvePublicKey)?;

        // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-sd-jwt-vc-03#section-5.2-11
        match (metadata.get("jwks"), metadata.get("jwks_uri")) {
            (Some(jwks), None) => serde_json::from_value(jwks.clone())
                .foreign_err(|| PublicKeyResolutionError::CannotResolvePublicKey)
                .ctx(|| "invalid `jwks`"),
            (None, Some(Value::String(jwks_uri))) => fetch_json(&self.client, jwks_uri)
                .await
                .with_err(|| PublicKeyResolutionError::CannotResolvePublicKey)
                .ctx(|| format!("failed to resolve `jwks_uri`: {jwks_uri}")),
            _ => Err(Error::root(PublicKeyResolutionError::CannotResolvePublicKey))
                .ctx(|| "exactly one of `jwks` and `jwks_uri` must be present"),
        }
    }
}

#[async_trait]
impl<C: HttpClient> PublicKeyResolver for JwtVcIssuerPublicKeyResolver<C> {
    async fn resolve(
        &self,
        request: &PublicKeyRequest,
    ) -> Result<ResolvedPublicKey, PublicKeyResolutionError> {
        let Some(iss) = &request.issuer else {
            return Err(Error::root(PublicKeyResolutionError::CannotResolvePublicKey))
                .ctx(|| "missing `iss`");
        };

        let jwks = self.jwks(iss).await?;

        // https://datatracker.ietf.org/doc/html/draft-ietf-oauth-sd-jwt-vc-03#section-5.2-6
        let jwk = jwks
            .find(request.header.kid.as_deref())
            .cloned()
            .ok_or_else(|| Error::root(PublicKeyResolutionError::CannotResolvePublicKey))
            .ctx(|| format!("no JWK with kid {:?}", request.header.kid))?;

        Ok(ResolvedPublicKey { jwk })
    }
}
