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

//! Merging of a type metadata document into the document it extends.

use serde_json::Value;

/// Array entry key by which entries of the parent and the child are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKey {
    Lang,
    Path,
}

impl EntryKey {
    fn field(self) -> &'static str {
        match self {
            Self::Lang => "lang",
            Self::Path => "path",
        }
    }

    /// Returns the key all the `entries` are keyed by, if any.
    fn of(entries: &[Value]) -> Option<Self> {
        [Self::Lang, Self::Path].into_iter().find(|key| {
            !entries.is_empty()
                && entries.iter().all(|entry| {
                    entry
                        .as_object()
                        .is_some_and(|entry| entry.contains_key(key.field()))
                })
        })
    }

    /// The comparable form of the key of `entry`.
    fn value_of(self, entry: &Value) -> String {
        // `path` arrays are compared by their JSON serialization
        match &entry[self.field()] {
            Value::String(lang) if self == Self::Lang => lang.clone(),
            other => other.to_string(),
        }
    }
}

/// Deep-merges the `child` document over the `parent` one.
///
/// * Objects are merged key by key, recursively.
/// * Arrays whose entries are all objects with a `lang` key are merged by
///   `lang`, and those with a `path` key are merged by the serialized `path`;
///   a child entry recursively overrides the parent entry with the same key,
///   other entries are appended.
/// * Any other pair of arrays is concatenated, parent first.
/// * Otherwise the child value wins.
pub fn deep_merge(parent: Value, child: Value) -> Value {
    match (parent, child) {
        (Value::Object(mut parent), Value::Object(child)) => {
            for (name, child_value) in child {
                match parent.get_mut(&name) {
                    Some(parent_value) => {
                        let merged = deep_merge(std::mem::take(parent_value), child_value);
                        *parent_value = merged;
                    }
                    None => {
                        parent.insert(name, child_value);
                    }
                }
            }
            Value::Object(parent)
        }
        (Value::Array(parent), Value::Array(child)) => Value::Array(merge_arrays(parent, child)),
        (_, child) => child,
    }
}

fn merge_arrays(mut parent: Vec<Value>, child: Vec<Value>) -> Vec<Value> {
    let key = match (EntryKey::of(&parent), EntryKey::of(&child)) {
        (Some(parent_key), Some(child_key)) if parent_key == child_key => parent_key,
        _ => {
            parent.extend(child);
            return parent;
        }
    };

    for child_entry in child {
        let child_key = key.value_of(&child_entry);

        match parent
            .iter()
            .position(|parent_entry| key.value_of(parent_entry) == child_key)
        {
            Some(index) => {
                let key_value = child_entry[key.field()].clone();
                let parent_entry = std::mem::take(&mut parent[index]);
                let mut merged = deep_merge(parent_entry, child_entry);
                // the matched keys are equal, so a `path` must not be concatenated
                merged[key.field()] = key_value;
                parent[index] = merged;
            }
            None => parent.push(child_entry),
        }
    }

    parent
}
