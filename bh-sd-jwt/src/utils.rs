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

use std::fmt::{self, Display};

use bh_jws_utils::base64_url_encode;

/// The field name of the hash algorithm used to hide the claims, as specified [here].
///
/// [here]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt-07#name-hash-function-claim
pub(crate) const SD_ALG_FIELD_NAME: &str = "_sd_alg";

/// The field name of the digests of concealed object properties.
pub(crate) const SD: &str = "_sd";

/// The field name of the digest of a concealed array element.
pub(crate) const ELLIPSIS: &str = "...";

pub(crate) static RESERVED_CLAIM_NAMES: &[&str] = &[SD, SD_ALG_FIELD_NAME, ELLIPSIS];

#[derive(Debug, PartialEq, Clone)]
pub struct VecDisplayWrapper<T>(pub Vec<T>);

impl<T: Display> Display for VecDisplayWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((last, without_last)) = self.0.split_last() {
            for element in without_last {
                write!(f, "{}, ", element)?;
            }
            write!(f, "{}", last)?;
        }
        Ok(())
    }
}

/// Returns the `base64url`-encoded `digest`.
pub(crate) fn base64_url_digest(digest: Vec<u8>) -> String {
    base64_url_encode(digest)
}

/// Checks if provided argument `key` is one of [RESERVED_CLAIM_NAMES] according to [1], [2] and [3]
///
/// [1]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#section-5.1.1-1
/// [2]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#section-5.1-3.7
/// [3]: https://datatracker.ietf.org/doc/html/draft-ietf-oauth-selective-disclosure-jwt#section-8.1-4.3.2.3.2.2.2.2
pub(crate) fn is_reserved_key_name(key: &str) -> Option<&'static str> {
    RESERVED_CLAIM_NAMES
        .iter()
        .find(|&name| key.eq(*name))
        .copied()
}

/// Current time as seconds since the epoch.
pub(crate) fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_display() {
        assert_eq!(VecDisplayWrapper::<String>(vec![]).to_string(), "");
        assert_eq!(
            VecDisplayWrapper(vec!["a".to_owned(), "b".to_owned()]).to_string(),
            "a, b"
        );
    }

    #[test]
    fn reserved_key_names() {
        assert_eq!(is_reserved_key_name("_sd"), Some(SD));
        assert_eq!(is_reserved_key_name("..."), Some(ELLIPSIS));
        assert_eq!(is_reserved_key_name("given_name"), None);
    }
}
