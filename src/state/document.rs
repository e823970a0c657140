// Pattern document.
//
// The only durable representation of a pattern: a small tree of typed
// nodes with attributes. The mapping between `Pattern` and `Document` is
// pure in both directions, and the text form is JSON.
//
// Layout:
//
//   pattern { timebase, loopLength }
//     notes
//       note { startPoint, endPoint, noteNumber, velocity }
//       ...

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_TIMEBASE, Note, Pattern};

pub const NODE_PATTERN: &str = "pattern";
pub const NODE_NOTES: &str = "notes";
pub const NODE_NOTE: &str = "note";

pub const ATTR_TIMEBASE: &str = "timebase";
pub const ATTR_LOOP_LENGTH: &str = "loopLength";
pub const ATTR_START_POINT: &str = "startPoint";
pub const ATTR_END_POINT: &str = "endPoint";
pub const ATTR_NOTE_NUMBER: &str = "noteNumber";
pub const ATTR_VELOCITY: &str = "velocity";

/// A document that does not describe a valid pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityError {
    /// The text could not be parsed into a document tree.
    Malformed(String),

    /// A node has the wrong type for its position in the tree.
    UnexpectedNode { expected: &'static str, found: String },

    /// A required attribute is absent.
    MissingAttribute { node: &'static str, name: &'static str },

    /// An attribute holds a value of the wrong kind or range.
    InvalidAttribute { node: &'static str, name: &'static str },
}

impl std::fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityError::Malformed(reason) => write!(f, "Malformed document: {}", reason),
            IntegrityError::UnexpectedNode { expected, found } => {
                write!(f, "Expected node '{}', found '{}'", expected, found)
            }
            IntegrityError::MissingAttribute { node, name } => {
                write!(f, "Node '{}' is missing attribute '{}'", node, name)
            }
            IntegrityError::InvalidAttribute { node, name } => {
                write!(f, "Node '{}' has an invalid '{}' attribute", node, name)
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

// ═══════════════════════════════════════════════════════════════════════════
// Document tree
// ═══════════════════════════════════════════════════════════════════════════

/// An attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attribute {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Attribute {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Attribute::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Floats accept integer values too (`1` reads as `1.0`).
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Attribute::Int(v) => Some(*v as f64),
            Attribute::Float(v) => Some(*v),
            Attribute::Text(_) => None,
        }
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Document>,
}

impl Document {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set an attribute.
    pub fn with_attribute(mut self, name: &str, value: Attribute) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Builder: append a child node.
    pub fn with_child(mut self, child: Document) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_type(&self, node_type: &str) -> bool {
        self.node_type == node_type
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// First child of the given type.
    pub fn child(&self, node_type: &str) -> Option<&Document> {
        self.children.iter().find(|c| c.has_type(node_type))
    }

    /// Render as JSON text.
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Parse JSON text into a document.
    pub fn from_text(text: &str) -> Result<Self, IntegrityError> {
        serde_json::from_str(text).map_err(|e| IntegrityError::Malformed(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Pattern <-> Document
// ═══════════════════════════════════════════════════════════════════════════

/// Describe a pattern as a document.
pub fn serialize(pattern: &Pattern) -> Document {
    let notes = pattern
        .notes
        .iter()
        .fold(Document::new(NODE_NOTES), |tree, note| {
            tree.with_child(note_to_document(note))
        });

    Document::new(NODE_PATTERN)
        .with_attribute(ATTR_TIMEBASE, Attribute::Int(pattern.timebase))
        .with_attribute(ATTR_LOOP_LENGTH, Attribute::Int(pattern.loop_length))
        .with_child(notes)
}

/// Read a pattern back from a document.
///
/// Either the whole document is valid and a pattern is returned, or an
/// error is; a pattern is never partially populated.
pub fn deserialize(doc: &Document) -> Result<Pattern, IntegrityError> {
    if !doc.has_type(NODE_PATTERN) {
        return Err(IntegrityError::UnexpectedNode {
            expected: NODE_PATTERN,
            found: doc.node_type.clone(),
        });
    }

    let timebase = optional_int(doc, NODE_PATTERN, ATTR_TIMEBASE)?.unwrap_or(DEFAULT_TIMEBASE);
    let mut pattern = Pattern::new(timebase);

    if let Some(loop_length) = optional_int(doc, NODE_PATTERN, ATTR_LOOP_LENGTH)? {
        pattern.loop_length = loop_length;
    }

    if let Some(notes) = doc.child(NODE_NOTES) {
        pattern.notes = notes
            .children
            .iter()
            .map(note_from_document)
            .collect::<Result<Vec<_>, _>>()?;
    }

    Ok(pattern)
}

/// Render a pattern straight to text.
pub fn pattern_to_text(pattern: &Pattern) -> String {
    serialize(pattern).to_text()
}

/// Parse a pattern straight from text.
pub fn pattern_from_text(text: &str) -> Result<Pattern, IntegrityError> {
    deserialize(&Document::from_text(text)?)
}

fn note_to_document(note: &Note) -> Document {
    Document::new(NODE_NOTE)
        .with_attribute(ATTR_START_POINT, Attribute::Int(note.start_point))
        .with_attribute(ATTR_END_POINT, Attribute::Int(note.end_point))
        .with_attribute(ATTR_NOTE_NUMBER, Attribute::Int(note.note_number as i64))
        .with_attribute(ATTR_VELOCITY, Attribute::Float(note.velocity))
}

fn note_from_document(doc: &Document) -> Result<Note, IntegrityError> {
    if !doc.has_type(NODE_NOTE) {
        return Err(IntegrityError::UnexpectedNode {
            expected: NODE_NOTE,
            found: doc.node_type.clone(),
        });
    }

    let note_number = required_int(doc, NODE_NOTE, ATTR_NOTE_NUMBER)?;
    let note_number = i32::try_from(note_number).map_err(|_| IntegrityError::InvalidAttribute {
        node: NODE_NOTE,
        name: ATTR_NOTE_NUMBER,
    })?;

    let velocity = doc
        .attribute(ATTR_VELOCITY)
        .ok_or(IntegrityError::MissingAttribute {
            node: NODE_NOTE,
            name: ATTR_VELOCITY,
        })?
        .as_float()
        .filter(|v| v.is_finite())
        .ok_or(IntegrityError::InvalidAttribute {
            node: NODE_NOTE,
            name: ATTR_VELOCITY,
        })?;

    Ok(Note {
        start_point: required_int(doc, NODE_NOTE, ATTR_START_POINT)?,
        end_point: required_int(doc, NODE_NOTE, ATTR_END_POINT)?,
        note_number,
        velocity,
    })
}

fn optional_int(
    doc: &Document,
    node: &'static str,
    name: &'static str,
) -> Result<Option<i64>, IntegrityError> {
    match doc.attribute(name) {
        None => Ok(None),
        Some(value) => value
            .as_int()
            .map(Some)
            .ok_or(IntegrityError::InvalidAttribute { node, name }),
    }
}

fn required_int(doc: &Document, node: &'static str, name: &'static str) -> Result<i64, IntegrityError> {
    optional_int(doc, node, name)?.ok_or(IntegrityError::MissingAttribute { node, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pattern() -> Pattern {
        let mut pattern = Pattern::new(48);
        pattern.loop_length = 96;
        pattern.add_note(Note::new(0, 12, 0, 1.0));
        pattern.add_note(Note::new(24, 60, -1, 0.5));
        pattern.add_note(Note::new(90, 110, 5, 0.25));
        pattern
    }

    #[test]
    fn test_round_trip() {
        let pattern = sample_pattern();
        assert_eq!(deserialize(&serialize(&pattern)).unwrap(), pattern);
        assert_eq!(pattern_from_text(&pattern_to_text(&pattern)).unwrap(), pattern);

        let basic = Pattern::basic();
        assert_eq!(pattern_from_text(&pattern_to_text(&basic)).unwrap(), basic);
    }

    #[test]
    fn test_defaults_when_attributes_absent() {
        let pattern = deserialize(&Document::new(NODE_PATTERN)).unwrap();
        assert_eq!(pattern.timebase, DEFAULT_TIMEBASE);
        assert_eq!(pattern.loop_length, DEFAULT_TIMEBASE);
        assert!(pattern.notes.is_empty());

        let doc = Document::new(NODE_PATTERN).with_attribute(ATTR_TIMEBASE, Attribute::Int(96));
        let pattern = deserialize(&doc).unwrap();
        assert_eq!(pattern.loop_length, 96);
    }

    #[test]
    fn test_integer_velocity_accepted() {
        let text = r#"{
            "type": "pattern",
            "children": [{ "type": "notes", "children": [
                { "type": "note", "attributes": {
                    "startPoint": 0, "endPoint": 6, "noteNumber": 1, "velocity": 1
                } }
            ] }]
        }"#;
        let pattern = pattern_from_text(text).unwrap();
        assert_eq!(pattern.notes, vec![Note::new(0, 6, 1, 1.0)]);
    }

    #[test]
    fn test_wrong_root_type() {
        let err = deserialize(&Document::new("libreArpPlugin")).unwrap_err();
        assert!(matches!(err, IntegrityError::UnexpectedNode { expected: NODE_PATTERN, .. }));
    }

    #[test]
    fn test_unparseable_text() {
        let err = pattern_from_text("<pattern timebase=\"24\"/>").unwrap_err();
        assert!(matches!(err, IntegrityError::Malformed(_)));
    }

    #[test]
    fn test_missing_note_attribute() {
        let doc = serialize(&sample_pattern());
        let mut broken = doc.clone();
        broken.children[0].children[1]
            .attributes
            .remove(ATTR_END_POINT);

        let err = deserialize(&broken).unwrap_err();
        assert_eq!(
            err,
            IntegrityError::MissingAttribute {
                node: NODE_NOTE,
                name: ATTR_END_POINT
            }
        );
    }

    #[test]
    fn test_mistyped_attribute() {
        let doc = Document::new(NODE_PATTERN)
            .with_attribute(ATTR_TIMEBASE, Attribute::Text("fast".to_string()));
        assert!(matches!(
            deserialize(&doc),
            Err(IntegrityError::InvalidAttribute { name: ATTR_TIMEBASE, .. })
        ));
    }

    #[test]
    fn test_foreign_child_in_notes() {
        let doc = Document::new(NODE_PATTERN)
            .with_child(Document::new(NODE_NOTES).with_child(Document::new("chord")));
        assert!(matches!(
            deserialize(&doc),
            Err(IntegrityError::UnexpectedNode { expected: NODE_NOTE, .. })
        ));
    }
}
