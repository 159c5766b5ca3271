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

use bhx5chain::X509Trust;
use serde::{Deserialize, Serialize};

/// Default language used for selecting display information.
pub const DEFAULT_LANG: &str = "en-US";

/// Environment in which credentials are parsed and verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Context {
    /// Tolerated clock skew, in seconds, applied to all validity checks.
    pub clock_tolerance: u64,
    /// Preferred language (BCP 47 tag) of display information.
    pub lang: String,
    /// Trust anchors as base64 encoded DER certificates, without PEM armour.
    pub trusted_certificates: Vec<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            clock_tolerance: 0,
            lang: DEFAULT_LANG.to_owned(),
            trusted_certificates: Vec::new(),
        }
    }
}

impl Context {
    /// Loads the trusted certificates.
    pub fn trust(&self) -> bhx5chain::Result<X509Trust> {
        X509Trust::from_base64_ders(&self.trusted_certificates)
    }
}

/// Verifier inputs which are specific to a single presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyOptions {
    /// The nonce the presentation must be bound to.
    pub expected_nonce: Option<String>,
    /// The audience (the verifier `client_id`) of the presentation.
    pub expected_audience: Option<String>,
    /// Nonce generated by the holder, e.g. the `mdoc_generated_nonce` of the
    /// OpenID4VP handover.
    pub holder_nonce: Option<String>,
    /// The `response_uri` of the OpenID4VP authorization request.
    pub response_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use bhx5chain::test_utils::TestPki;
    use serde_json::json;

    use super::*;

    #[test]
    fn context_defaults() {
        let context: Context = serde_json::from_value(json!({})).unwrap();

        assert_eq!(context, Context::default());
        assert_eq!(context.lang, "en-US");
        assert!(context.trust().unwrap().is_empty());
    }

    #[test]
    fn context_from_camel_case() {
        let pki = TestPki::p256();
        let context: Context = serde_json::from_value(json!({
            "clockTolerance": 30,
            "lang": "hr-HR",
            "trustedCertificates": pki.trusted_certificates(),
        }))
        .unwrap();

        assert_eq!(context.clock_tolerance, 30);
        assert_eq!(context.lang, "hr-HR");
        assert!(!context.trust().unwrap().is_empty());
    }

    #[test]
    fn context_rejects_pem_armour() {
        let context = Context {
            trusted_certificates: vec!["-----BEGIN CERTIFICATE-----".to_owned()],
            ..Default::default()
        };

        assert_eq!(
            context.trust().unwrap_err().error,
            bhx5chain::Error::TrustAnchor
        );
    }

    #[test]
    fn verify_options_from_camel_case() {
        let options: VerifyOptions = serde_json::from_value(json!({
            "expectedNonce": "n",
            "responseUri": "https://verifier.example.com/response",
        }))
        .unwrap();

        assert_eq!(options.expected_nonce.as_deref(), Some("n"));
        assert_eq!(options.expected_audience, None);
        assert_eq!(
            options.response_uri.as_deref(),
            Some("https://verifier.example.com/response")
        );
    }
}
