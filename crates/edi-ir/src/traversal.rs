//! Cursor for walking segment loops

use crate::segment::Segment;

/// Forward-only cursor over a slice of segments.
///
/// X12 loops are implicit: a loop starts at its leading tag and runs until the next
/// occurrence of that tag or of any tag that closes it. The cursor exposes exactly the
/// primitives needed to split such loops.
#[derive(Debug, Clone)]
pub struct SegmentCursor<'a> {
    segments: &'a [Segment],
    index: usize,
}

impl<'a> SegmentCursor<'a> {
    pub fn new(segments: &'a [Segment]) -> Self {
        Self { segments, index: 0 }
    }

    /// Index of the next segment to be returned.
    pub fn offset(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.index >= self.segments.len()
    }

    pub fn peek(&self) -> Option<&'a Segment> {
        self.segments.get(self.index)
    }

    /// Tag of the next segment.
    pub fn peek_tag(&self) -> Option<&'a str> {
        self.peek().map(|s| s.tag.as_str())
    }

    /// Consume the next segment only if it carries `tag`.
    pub fn next_if_tag(&mut self, tag: &str) -> Option<&'a Segment> {
        match self.peek() {
            Some(segment) if segment.is(tag) => {
                self.index += 1;
                Some(segment)
            }
            _ => None,
        }
    }

    /// Consume segments up to (not including) the next one whose tag is in `stop_tags`.
    pub fn take_until(&mut self, stop_tags: &[&str]) -> &'a [Segment] {
        let start = self.index;
        while let Some(segment) = self.peek() {
            if stop_tags.contains(&segment.tag.as_str()) {
                break;
            }
            self.index += 1;
        }
        &self.segments[start..self.index]
    }

    /// Consume one loop: the current segment plus everything up to the next
    /// segment whose tag is in `boundary_tags`.
    pub fn take_loop(&mut self, boundary_tags: &[&str]) -> Option<&'a [Segment]> {
        let start = self.index;
        self.peek()?;
        self.index += 1;
        self.take_until(boundary_tags);
        Some(&self.segments[start..self.index])
    }
}

impl<'a> Iterator for SegmentCursor<'a> {
    type Item = &'a Segment;

    fn next(&mut self) -> Option<Self::Item> {
        let segment = self.segments.get(self.index)?;
        self.index += 1;
        Some(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> Vec<Segment> {
        vec![
            Segment::from_values("B2", ["", "ACME"]),
            Segment::from_values("S5", ["1", "CL"]),
            Segment::from_values("N1", ["SH", "Origin"]),
            Segment::from_values("G62", ["37", "20240101"]),
            Segment::from_values("S5", ["2", "CU"]),
            Segment::from_values("N1", ["CN", "Destination"]),
            Segment::from_values("L3", ["1000", "G"]),
        ]
    }

    #[test]
    fn test_cursor_splits_loops() {
        let segments = body();
        let mut cursor = SegmentCursor::new(&segments);

        let header = cursor.take_until(&["S5"]);
        assert_eq!(header.len(), 1);
        assert_eq!(cursor.offset(), 1);

        let first = cursor.take_loop(&["S5", "L3"]).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].raw(1), "1");

        let second = cursor.take_loop(&["S5", "L3"]).unwrap();
        assert_eq!(second.len(), 2);

        assert_eq!(cursor.peek_tag(), Some("L3"));
        assert!(cursor.next_if_tag("N1").is_none());
        assert!(cursor.next_if_tag("L3").is_some());
        assert!(cursor.is_empty());
        assert_eq!(cursor.offset(), segments.len());
        assert!(cursor.take_loop(&["S5"]).is_none());
    }

    #[test]
    fn test_cursor_iterates() {
        let segments = body();
        let tags: Vec<&str> = SegmentCursor::new(&segments)
            .map(|s| s.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["B2", "S5", "N1", "G62", "S5", "N1", "L3"]);
    }

    #[test]
    fn test_offset_through_mut_reference() {
        fn skip_header(cursor: &mut SegmentCursor<'_>) -> usize {
            cursor.take_until(&["S5"]);
            cursor.offset()
        }
        let segments = body();
        let mut cursor = SegmentCursor::new(&segments);
        assert_eq!(skip_header(&mut cursor), 1);
    }
}
