//! Segment and element types for X12 data

use serde::{Deserialize, Serialize};

use crate::metadata::Position;

/// A data element within a segment.
///
/// Empty elements are preserved as `Primitive("")` so element positions stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    /// Simple element (single value)
    Primitive(String),
    /// Composite element (sub-elements separated by the sub-element separator)
    Composite(Vec<String>),
    /// Repeated element (occurrences separated by the repetition separator)
    Repeated { repeats: Vec<Element> },
}

impl Element {
    /// Create a primitive element.
    pub fn primitive(value: impl Into<String>) -> Self {
        Self::Primitive(value.into())
    }

    /// Primary value: the primitive itself, the first component of a composite,
    /// or the primary value of the first repetition.
    pub fn as_str(&self) -> &str {
        match self {
            Element::Primitive(value) => value,
            Element::Composite(components) => components.first().map_or("", String::as_str),
            Element::Repeated { repeats } => repeats.first().map_or("", Element::as_str),
        }
    }

    /// Component by 1-based index. A primitive behaves like a one-component composite.
    pub fn component(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        match self {
            Element::Primitive(value) => (index == 1).then_some(value.as_str()),
            Element::Composite(components) => components.get(index - 1).map(String::as_str),
            Element::Repeated { repeats } => repeats.first().and_then(|e| e.component(index)),
        }
    }

    /// Whether the element carries no data at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Element::Primitive(value) => value.is_empty(),
            Element::Composite(components) => components.iter().all(String::is_empty),
            Element::Repeated { repeats } => repeats.iter().all(Element::is_empty),
        }
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::Primitive(value.to_string())
    }
}

/// A parsed X12 segment: a tag plus its ordered elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Segment identifier (e.g. `ST`, `B2`, `N1`)
    pub tag: String,
    /// Data elements; index 0 is the X12 element `01`
    pub elements: Vec<Element>,
    /// Position in source
    #[serde(skip)]
    pub position: Position,
}

// Positions are source bookkeeping, not content.
impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.elements == other.elements
    }
}

impl Eq for Segment {}

impl Segment {
    /// Create a new segment without position information
    pub fn new(tag: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            tag: tag.into(),
            elements,
            position: Position::default(),
        }
    }

    /// Convenience constructor for segments made only of primitive elements.
    pub fn from_values<I, S>(tag: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            tag,
            values
                .into_iter()
                .map(|v| Element::Primitive(v.into()))
                .collect(),
        )
    }

    /// Attach a source position
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Element by X12 position (1-based, so `element(4)` of a B2 is B204).
    pub fn element(&self, position: usize) -> Option<&Element> {
        if position == 0 {
            return None;
        }
        self.elements.get(position - 1)
    }

    /// Primary value of an element, `None` when absent or empty.
    pub fn value(&self, position: usize) -> Option<&str> {
        self.element(position)
            .map(Element::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Primary value of an element, trimmed, `None` when absent or blank.
    pub fn trimmed(&self, position: usize) -> Option<&str> {
        self.value(position).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Primary value of an element, empty string when absent.
    pub fn raw(&self, position: usize) -> &str {
        self.element(position).map_or("", Element::as_str)
    }

    /// Sub-element value using X12 notation (`component(1, 2)` is XX01-2).
    pub fn component(&self, position: usize, component: usize) -> Option<&str> {
        self.element(position)
            .and_then(|e| e.component(component))
            .filter(|v| !v.is_empty())
    }

    /// Check the segment tag.
    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b2() -> Segment {
        Segment::from_values("B2", ["", "ACME", "", "SHIP123", "", "PP"])
    }

    #[test]
    fn test_element_positions_are_one_based() {
        let seg = b2();
        assert_eq!(seg.raw(2), "ACME");
        assert_eq!(seg.value(4), Some("SHIP123"));
        assert!(seg.element(0).is_none());
    }

    #[test]
    fn test_empty_elements_are_preserved() {
        let seg = b2();
        assert_eq!(seg.elements.len(), 6);
        assert_eq!(seg.element(1), Some(&Element::Primitive(String::new())));
        assert_eq!(seg.value(1), None);
        assert_eq!(seg.raw(1), "");
    }

    #[test]
    fn test_composite_components() {
        let seg = Segment::new(
            "AK4",
            vec![Element::Composite(vec!["2".into(), "1".into()]), "66".into()],
        );
        assert_eq!(seg.raw(1), "2");
        assert_eq!(seg.component(1, 2), Some("1"));
        assert_eq!(seg.component(1, 3), None);
        assert_eq!(seg.component(2, 1), Some("66"));
    }

    #[test]
    fn test_repeated_element_primary_value() {
        let element = Element::Repeated {
            repeats: vec!["A".into(), "B".into()],
        };
        assert_eq!(element.as_str(), "A");
        assert!(!element.is_empty());
    }

    #[test]
    fn test_equality_ignores_position() {
        let a = b2().with_position(Position::new(1, 1, 0, 10));
        let b = b2();
        assert_eq!(a, b);
    }

    #[test]
    fn test_element_json_shape() {
        let seg = Segment::new(
            "X",
            vec![
                "A".into(),
                Element::Composite(vec!["B".into(), "C".into()]),
                Element::Repeated {
                    repeats: vec!["D".into(), "E".into()],
                },
            ],
        );
        let json = serde_json::to_value(&seg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tag": "X",
                "elements": ["A", ["B", "C"], {"repeats": ["D", "E"]}]
            })
        );
        let back: Segment = serde_json::from_value(json).unwrap();
        assert_eq!(back, seg);
    }
}
