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

//! This module defines the data model that is shared across different data retrieval methods as
//! described in the section "8.3.1 Data model" of the [ISO/IEC 18013-5:2021][1] standard.
//!
//! [1]: <https://www.iso.org/standard/69084.html>

use ciborium::Value;
use serde::{Deserialize, Serialize};

/// Defines a text identifier of the data model, convertible from string types.
macro_rules! text_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                value.to_owned().into()
            }
        }
    };
}

text_identifier!(
    /// [`DocType`] as defined in the section `8.3.1` of the [ISO/IEC 18013-5:2021][1] standard,
    /// e.g. `org.iso.18013.5.1.mDL`.
    ///
    /// [1]: <https://www.iso.org/standard/69084.html>
    DocType
);

text_identifier!(
    /// [`NameSpace`] as defined in the section `8.3.1` of the [ISO/IEC 18013-5:2021][1] standard.
    ///
    /// [1]: <https://www.iso.org/standard/69084.html>
    NameSpace
);

text_identifier!(
    /// [`DataElementIdentifier`] as defined in the section `8.3.1` of the [ISO/IEC
    /// 18013-5:2021][1] standard.
    ///
    /// [1]: <https://www.iso.org/standard/69084.html>
    DataElementIdentifier
);

/// [`DataElementValue`] as defined in the section `8.3.1` of the [ISO/IEC 18013-5:2021][1]
/// standard.
///
/// [1]: <https://www.iso.org/standard/69084.html>
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataElementValue(pub Value);

impl<T: Into<Value>> From<T> for DataElementValue {
    fn from(value: T) -> Self {
        Self(value.into())
    }
}
