//! Document payloads - the decoded per-path contents of a storage file
//!
//! A document holds every range of one source file together with the
//! result sets, results, monikers and package information those ranges
//! link to. Documents are decoded once and shared immutably.

use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::position::{Bounded, Range};
use crate::{Error, Result};

/// An LSIF element identifier.
///
/// Identifiers may be written as JSON strings or integers; both are
/// normalized to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id(value.to_string())
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Id(value.to_string())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl serde::de::Visitor<'_> for IdVisitor {
            type Value = Id;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer identifier")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Id, E> {
                Ok(Id(v.to_string()))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<Id, E> {
                Ok(Id(v.to_string()))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<Id, E> {
                Ok(Id(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// A range of the document with its outgoing links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeData {
    pub start_line: u32,
    pub start_character: u32,
    pub end_line: u32,
    pub end_character: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_result: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_result: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover_result: Option<Id>,
    #[serde(default)]
    pub monikers: Vec<Id>,
}

impl Bounded for RangeData {
    fn bounds(&self) -> Range {
        Range::new(self.start_line, self.start_character, self.end_line, self.end_character)
    }
}

/// A shared resolution node that several ranges can point at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_result: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_result: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover_result: Option<Id>,
    #[serde(default)]
    pub monikers: Vec<Id>,
}

/// How a moniker relates its symbol to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonikerKind {
    Import,
    Export,
    Local,
    /// Any kind this engine does not know about.
    #[serde(other)]
    Other,
}

impl MonikerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonikerKind::Import => "import",
            MonikerKind::Export => "export",
            MonikerKind::Local => "local",
            MonikerKind::Other => "other",
        }
    }
}

impl fmt::Display for MonikerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A portable symbol name. Two monikers name the same symbol when their
/// scheme and identifier are equal; the kind only steers resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonikerData {
    pub kind: MonikerKind,
    pub scheme: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_information: Option<Id>,
}

/// The package a moniker was imported from or exported by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInformationData {
    pub name: String,
    pub version: String,
}

/// One entry of a definition or reference result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRangeRef {
    pub document_path: String,
    pub id: Id,
}

/// The decoded contents of one path in a storage file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// range id -> index into `ordered_ranges`
    pub ranges: HashMap<Id, usize>,
    /// Sorted by start line, then start character; never overlapping.
    pub ordered_ranges: Vec<RangeData>,
    #[serde(default)]
    pub result_sets: HashMap<Id, ResultSetData>,
    #[serde(default)]
    pub definition_results: HashMap<Id, Vec<DocumentRangeRef>>,
    #[serde(default)]
    pub reference_results: HashMap<Id, Vec<DocumentRangeRef>>,
    /// LSP hover contents (markup, marked string or a list of them),
    /// carried through as written
    #[serde(default)]
    pub hovers: HashMap<Id, serde_json::Value>,
    #[serde(default)]
    pub monikers: HashMap<Id, MonikerData>,
    #[serde(default)]
    pub package_information: HashMap<Id, PackageInformationData>,
}

impl Document {
    /// Decode a raw payload loaded for `path`.
    ///
    /// The range map and range ordering are validated here; everything that
    /// indexes `ordered_ranges` afterwards relies on it.
    pub fn decode(path: &str, payload: &[u8]) -> Result<Self> {
        let document: Document = serde_json::from_slice(payload).map_err(|e| Error::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        document.validate(path)?;
        Ok(document)
    }

    /// Encode the document into the payload format read by [`Document::decode`].
    #[cfg(test)]
    pub(crate) fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn validate(&self, path: &str) -> Result<()> {
        let invalid = |reason: String| Error::Decode {
            path: path.to_string(),
            reason,
        };

        for (id, &index) in &self.ranges {
            if index >= self.ordered_ranges.len() {
                return Err(invalid(format!(
                    "range {} points at index {} of {} ranges",
                    id,
                    index,
                    self.ordered_ranges.len()
                )));
            }
        }

        let sorted = self.ordered_ranges.windows(2).all(|pair| {
            (pair[0].start_line, pair[0].start_character) <= (pair[1].start_line, pair[1].start_character)
        });
        if !sorted {
            return Err(invalid("ordered ranges are not sorted".to_string()));
        }

        Ok(())
    }

    /// Look up a range by its identifier.
    pub fn range(&self, id: &Id) -> Option<&RangeData> {
        self.ranges.get(id).map(|&index| &self.ordered_ranges[index])
    }

    /// Package information attached to a moniker, if any.
    pub fn package_information_for(&self, moniker: &MonikerData) -> Option<&PackageInformationData> {
        moniker
            .package_information
            .as_ref()
            .and_then(|id| self.package_information.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Vec<u8> {
        json!({
            "ranges": { "1": 0, "2": 1 },
            "orderedRanges": [
                { "startLine": 0, "startCharacter": 0, "endLine": 0, "endCharacter": 5, "next": 10, "monikers": [] },
                { "startLine": 1, "startCharacter": 0, "endLine": 1, "endCharacter": 5, "monikers": ["m1"] }
            ],
            "resultSets": { "10": { "hoverResult": "h1", "monikers": [] } },
            "hovers": { "h1": "```ts\nconst x: number\n```" },
            "monikers": {
                "m1": { "kind": "import", "scheme": "npm", "identifier": "left-pad#leftPad", "packageInformation": "p1" }
            },
            "packageInformation": { "p1": { "name": "left-pad", "version": "1.0.0" } }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_decode_normalizes_ids() {
        let document = Document::decode("a.ts", &payload()).unwrap();

        let first = document.range(&Id::from("1")).unwrap();
        assert_eq!(first.next, Some(Id::from(10)));
        assert!(document.result_sets.contains_key(&Id::from("10")));
        assert_eq!(document.range(&Id::from("3")), None);
    }

    #[test]
    fn test_package_information_for() {
        let document = Document::decode("a.ts", &payload()).unwrap();
        let moniker = &document.monikers[&Id::from("m1")];

        assert_eq!(moniker.kind, MonikerKind::Import);
        let info = document.package_information_for(moniker).unwrap();
        assert_eq!(info.name, "left-pad");
        assert_eq!(info.version, "1.0.0");
    }

    #[test]
    fn test_unknown_moniker_kind() {
        let moniker: MonikerData =
            serde_json::from_value(json!({ "kind": "both", "scheme": "x", "identifier": "y" })).unwrap();
        assert_eq!(moniker.kind, MonikerKind::Other);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Document::decode("a.ts", b"\x1f\x8b not json").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_decode_rejects_dangling_range_index() {
        let payload = json!({
            "ranges": { "1": 4 },
            "orderedRanges": [
                { "startLine": 0, "startCharacter": 0, "endLine": 0, "endCharacter": 5 }
            ]
        })
        .to_string();

        let err = Document::decode("a.ts", payload.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("range 1"));
    }

    #[test]
    fn test_decode_rejects_unsorted_ranges() {
        let payload = json!({
            "ranges": {},
            "orderedRanges": [
                { "startLine": 3, "startCharacter": 0, "endLine": 3, "endCharacter": 5 },
                { "startLine": 1, "startCharacter": 0, "endLine": 1, "endCharacter": 5 }
            ]
        })
        .to_string();

        assert!(Document::decode("a.ts", payload.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_structured_hover_contents() {
        let payload = json!({
            "ranges": {},
            "orderedRanges": [],
            "hovers": {
                "h1": [{ "language": "typescript", "value": "const x: number" }, "docs"],
                "h2": { "kind": "markdown", "value": "**x**" }
            }
        })
        .to_string();

        let document = Document::decode("a.ts", payload.as_bytes()).unwrap();
        assert_eq!(
            document.hovers[&Id::from("h1")],
            json!([{ "language": "typescript", "value": "const x: number" }, "docs"])
        );
        assert_eq!(document.hovers[&Id::from("h2")]["kind"], "markdown");
    }

    #[test]
    fn test_encode_decode() {
        let document = Document::decode("a.ts", &payload()).unwrap();
        let again = Document::decode("a.ts", &document.encode().unwrap()).unwrap();
        assert_eq!(again.ordered_ranges, document.ordered_ranges);
        assert_eq!(again.monikers, document.monikers);
    }
}
