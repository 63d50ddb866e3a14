//! X12 serializer

use edi_ir::{Delimiters, Element, Interchange, Segment};

use crate::{Error, Result};

/// Serializer for X12 interchanges
#[derive(Debug, Clone, Default)]
pub struct X12Serializer {
    /// Write a newline after every segment terminator
    line_breaks: bool,
}

impl X12Serializer {
    /// Create a new X12 serializer
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a newline after each segment terminator.
    pub fn with_line_breaks(mut self, line_breaks: bool) -> Self {
        self.line_breaks = line_breaks;
        self
    }

    /// Render a whole interchange with its own delimiters.
    pub fn serialize(&self, interchange: &Interchange) -> Result<Vec<u8>> {
        let delimiters = &interchange.delimiters;
        let mut out = Vec::new();
        self.write_segment(&mut out, &interchange.isa, delimiters)?;
        for group in &interchange.groups {
            self.write_segment(&mut out, &group.gs, delimiters)?;
            for transaction in &group.transactions {
                self.write_segment(&mut out, &transaction.st, delimiters)?;
                for segment in &transaction.segments {
                    self.write_segment(&mut out, segment, delimiters)?;
                }
                self.write_segment(&mut out, &transaction.se, delimiters)?;
            }
            self.write_segment(&mut out, &group.ge, delimiters)?;
        }
        self.write_segment(&mut out, &interchange.iea, delimiters)?;
        Ok(out)
    }

    /// Render an interchange as text.
    pub fn serialize_to_string(&self, interchange: &Interchange) -> Result<String> {
        String::from_utf8(self.serialize(interchange)?)
            .map_err(|e| Error::Serialize(format!("output is not UTF-8: {e}")))
    }

    /// Render a single segment, terminator included.
    pub fn segment_bytes(&self, segment: &Segment, delimiters: &Delimiters) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_segment(&mut out, segment, delimiters)?;
        Ok(out)
    }

    fn write_segment(&self, out: &mut Vec<u8>, segment: &Segment, delimiters: &Delimiters) -> Result<()> {
        out.extend_from_slice(segment.tag.as_bytes());
        // ISA11 and ISA16 carry delimiters as values.
        let is_isa = segment.is("ISA");
        for (index, element) in segment.elements.iter().enumerate() {
            out.push(delimiters.element);
            write_element(out, element, delimiters, is_isa)
                .map_err(|message| Error::Serialize(format!("{}{:02}: {message}", segment.tag, index + 1)))?;
        }
        out.push(delimiters.segment);
        if self.line_breaks && delimiters.segment != b'\n' {
            out.push(b'\n');
        }
        Ok(())
    }
}

fn write_element(
    out: &mut Vec<u8>,
    element: &Element,
    delimiters: &Delimiters,
    verbatim: bool,
) -> std::result::Result<(), String> {
    match element {
        Element::Primitive(value) => write_value(out, value, delimiters, verbatim),
        Element::Composite(components) => {
            for (index, component) in components.iter().enumerate() {
                if index > 0 {
                    out.push(delimiters.sub_element);
                }
                write_value(out, component, delimiters, verbatim)?;
            }
            Ok(())
        }
        Element::Repeated { repeats } => {
            let repetition = delimiters
                .repetition
                .ok_or_else(|| "repeated element without a repetition separator".to_string())?;
            for (index, occurrence) in repeats.iter().enumerate() {
                if index > 0 {
                    out.push(repetition);
                }
                write_element(out, occurrence, delimiters, verbatim)?;
            }
            Ok(())
        }
    }
}

fn write_value(
    out: &mut Vec<u8>,
    value: &str,
    delimiters: &Delimiters,
    verbatim: bool,
) -> std::result::Result<(), String> {
    if !verbatim {
        if let Some(c) = value.bytes().find(|&b| delimiters.is_separator(b)) {
            return Err(format!(
                "value '{value}' contains delimiter '{}'",
                char::from(c)
            ));
        }
    }
    out.extend_from_slice(value.as_bytes());
    Ok(())
}
