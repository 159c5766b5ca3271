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

use serde::{Deserialize, Serialize};

/// Flat display configuration rendered by the generic credential template.
///
/// Deserializes from the display entries of both the credential issuer
/// metadata and the `simple` rendering of type metadata. Unknown members are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Name of the credential.
    #[serde(default)]
    pub name: Option<String>,
    /// Description of the credential.
    #[serde(default)]
    pub description: Option<String>,
    /// Background color, as a CSS color value.
    #[serde(default, alias = "backgroundColor")]
    pub background_color: Option<String>,
    /// Text color, as a CSS color value.
    #[serde(default, alias = "textColor")]
    pub text_color: Option<String>,
    /// Background image of the card.
    #[serde(default, alias = "backgroundImage")]
    pub background_image: Option<ImageRef>,
    /// Logo shown on the card.
    #[serde(default)]
    pub logo: Option<ImageRef>,
}

/// Reference to a remote or inline image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ImageRefRepr")]
pub struct ImageRef {
    /// Location of the image; a `data:` URI is embedded as it is.
    pub uri: String,
    /// Alternative text of the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// Images are given either as a bare URI or as an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImageRefRepr {
    Uri(String),
    Object {
        uri: String,
        #[serde(default)]
        alt_text: Option<String>,
    },
}

impl From<ImageRefRepr> for ImageRef {
    fn from(value: ImageRefRepr) -> Self {
        match value {
            ImageRefRepr::Uri(uri) => Self {
                uri,
                alt_text: None,
            },
            ImageRefRepr::Object { uri, alt_text } => Self { uri, alt_text },
        }
    }
}
