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

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

const DATA_URI_PREFIX: &str = "data:image/svg+xml;utf8,";

/// Rendered in place of placeholders which cannot be resolved.
pub(crate) const UNRESOLVED: &str = "-";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wraps the SVG into a `data:` URI.
pub fn svg_data_uri(svg: &str) -> String {
    format!("{DATA_URI_PREFIX}{}", urlencoding::encode(svg))
}

/// Escapes the text for use in XML content and attribute values.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Replaces every `{{ name }}` placeholder of the template with the result
/// of `resolve`, or with [`UNRESOLVED`].
///
/// The resolved text is inserted verbatim.
pub(crate) fn substitute(template: &str, resolve: impl Fn(&str) -> Option<String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(length) = rest[start + 2..].find("}}") else {
            break;
        };

        output.push_str(&rest[..start]);
        let name = rest[start + 2..start + 2 + length].trim();
        match resolve(name) {
            Some(text) => output.push_str(&text),
            None => output.push_str(UNRESOLVED),
        }
        rest = &rest[start + 2 + length + 2..];
    }

    output.push_str(rest);
    output
}

/// Looks up the claim the JSON `pointer` points to.
pub(crate) fn lookup<'a>(claims: &'a Map<String, Value>, pointer: &str) -> Option<&'a Value> {
    let pointer = pointer.strip_prefix('/')?;
    let (first, rest) = pointer.split_once('/').unwrap_or((pointer, ""));
    let first = first.replace("~1", "/").replace("~0", "~");

    let value = claims.get(&first)?;
    if rest.is_empty() && !pointer.ends_with('/') {
        Some(value)
    } else {
        value.pointer(&format!("/{rest}"))
    }
}

/// Formats a claim value as text.
///
/// Dates and date-times are formatted as dates, other strings, numbers and
/// booleans as they are. Objects, arrays and `null` have no text form.
pub(crate) fn format_claim(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(format_date(text).unwrap_or_else(|| text.clone())),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(boolean) => Some(boolean.to_string()),
        _ => None,
    }
}

/// Formats a `full-date` or RFC 3339 `date-time` string, if it is one.
pub(crate) fn format_date(text: &str) -> Option<String> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|date_time| date_time.date_naive())
        })
        .map(|date| date.format(DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn escaping() {
        assert_eq!(escape_xml("plain"), "plain");
        assert_eq!(
            escape_xml(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &apos;Jerry&apos;&lt;/b&gt;"
        );
    }

    #[test]
    fn substitution() {
        let resolve = |name: &str| (name == "known").then(|| "value".to_owned());

        assert_eq!(
            substitute("<t>{{known}}</t><t>{{ known }}</t><t>{{unknown}}</t>", resolve),
            "<t>value</t><t>value</t><t>-</t>"
        );
        assert_eq!(substitute("no placeholders", resolve), "no placeholders");
        assert_eq!(substitute("dangling {{known", resolve), "dangling {{known");
    }

    #[test]
    fn pointer_lookup() {
        let claims = match json!({
            "given_name": "Erika",
            "address": { "street/no": "Heidestraße 17" },
            "nationalities": ["DE", "AT"],
        }) {
            Value::Object(claims) => claims,
            _ => unreachable!(),
        };

        assert_eq!(lookup(&claims, "/given_name"), Some(&json!("Erika")));
        assert_eq!(
            lookup(&claims, "/address/street~1no"),
            Some(&json!("Heidestraße 17"))
        );
        assert_eq!(lookup(&claims, "/nationalities/1"), Some(&json!("AT")));
        assert_eq!(lookup(&claims, "/nationalities/2"), None);
        assert_eq!(lookup(&claims, "/missing"), None);
        assert_eq!(lookup(&claims, "given_name"), None);
        assert_eq!(lookup(&claims, ""), None);
    }

    #[test]
    fn claim_formatting() {
        assert_eq!(format_claim(&json!("Erika")).as_deref(), Some("Erika"));
        assert_eq!(format_claim(&json!("1964-08-12")).as_deref(), Some("1964-08-12"));
        assert_eq!(
            format_claim(&json!("2025-02-12T10:27:03.5Z")).as_deref(),
            Some("2025-02-12")
        );
        assert_eq!(format_claim(&json!(42)).as_deref(), Some("42"));
        assert_eq!(format_claim(&json!(true)).as_deref(), Some("true"));
        assert_eq!(format_claim(&json!(null)), None);
        assert_eq!(format_claim(&json!({ "a": 1 })), None);
    }

    #[test]
    fn data_uri() {
        assert_eq!(
            svg_data_uri(r#"<svg a="1"/>"#),
            "data:image/svg+xml;utf8,%3Csvg%20a%3D%221%22%2F%3E"
        );
    }
}
