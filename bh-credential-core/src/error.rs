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

//! Error taxonomy shared by all the credential formats.
//!
//! Parsing errors are intentionally coarse, since a parsing failure mostly
//! means "try the next format", while verification errors distinguish every
//! step of the trust decision.

/// Error returned by a [`CredentialParser`](crate::CredentialParser).
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Clone, Copy)]
pub enum CredentialParsingError {
    /// The credential does not carry a string `iss` claim.
    #[strum(to_string = "Missing issuer identifier")]
    MissingIssuerIdentifier,

    /// None of the parsers was able to parse the credential.
    #[strum(to_string = "Could not parse credential")]
    CouldNotParse,

    /// The raw credential is not of the data type expected by the parser.
    #[strum(to_string = "Invalid credential data type")]
    InvalidDatatype,
}

impl bherror::BhError for CredentialParsingError {}

/// Error returned by a [`CredentialVerifier`](crate::CredentialVerifier).
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Clone, Copy)]
pub enum CredentialVerificationError {
    /// The raw credential is not of the data type expected by the verifier.
    #[strum(to_string = "Invalid credential data type")]
    InvalidDatatype,

    /// The credential is malformed.
    #[strum(to_string = "Invalid credential format")]
    InvalidFormat,

    /// A verification option required by the verifier is missing.
    #[strum(to_string = "Missing verification options")]
    MissingOpts,

    /// The issuer signature is not valid.
    #[strum(to_string = "Invalid issuer signature")]
    InvalidSignature,

    /// The public key of the issuer could not be resolved.
    #[strum(to_string = "Cannot resolve issuer public key")]
    CannotResolveIssuerPublicKey,

    /// The credential does not contain a usable holder public key.
    #[strum(to_string = "Cannot extract holder public key")]
    CannotExtractHolderPublicKey,

    /// The issuer certificate chain does not lead to a trusted certificate.
    #[strum(to_string = "Issuer is not trusted")]
    NotTrustedIssuer,

    /// The credential is expired.
    #[strum(to_string = "Credential expired")]
    ExpiredCredential,

    /// The credential is not valid yet.
    #[strum(to_string = "Credential not yet valid")]
    NotYetValidCredential,

    /// The issuer certificate chain is malformed.
    #[strum(to_string = "Invalid certificate chain")]
    InvalidCertificateChain,

    /// The credential is signed with an algorithm which is not supported.
    #[strum(to_string = "Unsupported algorithm")]
    UnsupportedAlgorithm,

    /// A disclosure does not match any digest of the credential.
    #[strum(to_string = "Invalid disclosures")]
    InvalidDisclosures,

    /// The key binding JWT lacks a required claim.
    #[strum(to_string = "Key binding JWT verification failed: missing parameters")]
    KbJwtVerificationFailedMissingParameters,

    /// The `sd_hash` of the key binding JWT does not match the presentation.
    #[strum(to_string = "Key binding JWT verification failed: wrong sd_hash")]
    KbJwtVerificationFailedWrongSdHash,

    /// The `aud` of the key binding JWT is not the expected audience.
    #[strum(to_string = "Key binding JWT verification failed: unexpected audience")]
    KbJwtVerificationFailedUnexpectedAudience,

    /// The `nonce` of the key binding JWT is not the expected nonce.
    #[strum(to_string = "Key binding JWT verification failed: unexpected nonce")]
    KbJwtVerificationFailedUnexpectedNonce,

    /// The key binding JWT is not signed by the holder key.
    #[strum(to_string = "Key binding JWT verification failed: invalid signature")]
    KbJwtVerificationFailedSignatureValidation,

    /// The mdoc MSO does not contain the device key.
    #[strum(to_string = "mdoc is missing device key info")]
    MsoMdocMissingDeviceKeyInfo,

    /// The mdoc device signature is not valid.
    #[strum(to_string = "Invalid mdoc device signature")]
    MsoMdocInvalidDeviceSignature,

    /// An mdoc issuer-signed item does not match its value digest.
    #[strum(to_string = "Invalid mdoc value digests")]
    MsoMdocInvalidValueDigests,

    /// Verification failed for an unknown reason, e.g. no verifier is
    /// registered.
    #[strum(to_string = "Unknown verification problem")]
    UnknownProblem,
}

impl bherror::BhError for CredentialVerificationError {}

/// Error returned by a [`PublicKeyResolver`](crate::PublicKeyResolver).
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Clone, Copy)]
pub enum PublicKeyResolutionError {
    /// The public key could not be resolved.
    #[strum(to_string = "Cannot resolve public key")]
    CannotResolvePublicKey,
}

impl bherror::BhError for PublicKeyResolutionError {}

/// Error codes of the SD-JWT VC type metadata resolution.
///
/// None of these is fatal to parsing, they only disable display enrichment.
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Clone, Copy)]
pub enum MetadataErrorCode {
    /// The document could not be fetched, is not a JSON object with a `vct`,
    /// or was already visited during the resolution.
    #[strum(to_string = "NOT_FOUND")]
    NotFound,

    /// The document does not match the expected integrity.
    #[strum(to_string = "INTEGRITY_FAIL")]
    IntegrityFail,

    /// No integrity is provided for the document.
    #[strum(to_string = "INTEGRITY_MISSING")]
    IntegrityMissing,

    /// The issuer metadata names a different issuer.
    #[strum(to_string = "ISSUER_MISMATCH")]
    IssuerMismatch,

    /// The document declares both `schema` and `schema_uri`.
    #[strum(to_string = "SCHEMA_CONFLICT")]
    SchemaConflict,
}

impl bherror::BhError for MetadataErrorCode {}

/// Error of the credential rendering.
///
/// Rendering errors never escalate, the owning parser falls back to the next
/// display option or to an empty image.
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Clone)]
pub enum RenderingError {
    /// The SVG template could not be retrieved.
    #[strum(to_string = "SVG template not available: {0}")]
    TemplateUnavailable(String),

    /// No display configuration is applicable to the credential.
    #[strum(to_string = "No display configuration")]
    MissingDisplay,

    /// The rendered output is empty.
    #[strum(to_string = "Rendered SVG is empty")]
    EmptyOutput,
}

impl bherror::BhError for RenderingError {}

/// Error of a request made through an [`HttpClient`](crate::HttpClient).
#[derive(strum_macros::Display, Debug, PartialEq, Eq, Clone)]
pub enum FetchError {
    /// The request could not be sent or the response could not be read.
    #[strum(to_string = "Request to {0} failed")]
    RequestFailed(String),

    /// The response status is not `200 OK`.
    #[strum(to_string = "Unexpected status {0} from {1}")]
    UnexpectedStatus(u16, String),

    /// The response body is empty or not of the expected shape.
    #[strum(to_string = "Invalid response body from {0}")]
    InvalidBody(String),
}

impl bherror::BhError for FetchError {}
