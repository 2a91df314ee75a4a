//! Chain and caps description parser using winnow.
//!
//! Chains use the familiar `!`-separated syntax, for branch recipes, skeleton
//! entries and static launch lines:
//!
//! ```text
//! queue ! audioconvert ! vorbisenc quality=0.4 ! queue
//! decodebin streams="audio/x-vorbis; video/x-vp8"
//! ```
//!
//! Caps descriptions are `;`-separated structures with `,`-separated fields:
//!
//! ```text
//! audio/x-raw, rate=44100, channels=2; audio/x-vorbis
//! ```
//!
//! # Syntax
//!
//! - Elements are separated by `!`
//! - Properties are specified as `name=value` after the element kind
//! - Values can be quoted strings, numbers, booleans or bare words
//! - Whitespace is optional around `!`, `=`, `,` and `;`
//! - The caps description `ANY` is the empty (unrestricted) set

use crate::error::ParseError;
use crate::format::{Caps, CapsStructure};
use std::fmt;
use winnow::Parser;
use winnow::ascii::{alpha1, digit1, multispace0};
use winnow::combinator::{alt, delimited, opt, repeat, separated};
use winnow::error::ContextError;
use winnow::token::{take_till, take_while};

type WResult<T> = std::result::Result<T, ContextError>;

/// A parsed element with its kind and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElement {
    /// The element kind (e.g., "queue", "vorbisenc").
    pub kind: String,
    /// Properties as key-value pairs, in the order written.
    pub properties: Vec<(String, PropertyValue)>,
}

impl ParsedElement {
    /// An element with no properties.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: Vec::new(),
        }
    }

    /// Add a property.
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push((name.into(), value));
        self
    }
}

impl fmt::Display for ParsedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)?;
        for (key, value) in &self.properties {
            match value {
                PropertyValue::String(s)
                    if s.is_empty() || s.contains(|c: char| c.is_whitespace() || c == '!' || c == '=') =>
                {
                    write!(f, " {}=\"{}\"", key, s)?
                }
                other => write!(f, " {}={}", key, other.as_string())?,
            }
        }
        Ok(())
    }
}

/// A property value in a description.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A string value (quoted or unquoted).
    String(String),
    /// An integer value.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl PropertyValue {
    /// Get as a string, converting if necessary.
    pub fn as_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
        }
    }

    /// Try to get as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            PropertyValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get as a u64.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }

    /// Try to get as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Integer(i) => Some(*i as f64),
            PropertyValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            PropertyValue::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// A parsed chain description.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedChain {
    /// The elements in order from head to tail.
    pub elements: Vec<ParsedElement>,
}

impl ParsedChain {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the chain has no elements. Parsed chains never are.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element kinds in order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|e| e.kind.as_str())
    }
}

impl fmt::Display for ParsedChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(" ! ")?;
            }
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}

/// Parse a chain description.
///
/// # Example
///
/// ```rust
/// use padweave::pipeline::parser::parse_chain;
///
/// let chain = parse_chain("queue ! audioconvert ! vorbisenc ! queue").unwrap();
/// assert_eq!(chain.elements.len(), 4);
/// assert_eq!(chain.elements[2].kind, "vorbisenc");
/// ```
pub fn parse_chain(input: &str) -> Result<ParsedChain, ParseError> {
    chain.parse(input.trim()).map_err(|_| ParseError {
        what: "chain",
        input: input.to_string(),
    })
}

/// Parse a caps description.
///
/// # Example
///
/// ```rust
/// use padweave::pipeline::parser::parse_caps;
///
/// let caps = parse_caps("audio/x-raw, rate=44100; audio/x-vorbis").unwrap();
/// assert_eq!(caps.len(), 2);
/// assert!(parse_caps("ANY").unwrap().is_any());
/// ```
pub fn parse_caps(input: &str) -> Result<Caps, ParseError> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("any") {
        return Ok(Caps::any());
    }
    caps.parse(trimmed).map_err(|_| ParseError {
        what: "caps",
        input: input.to_string(),
    })
}

/// Parse a complete chain.
fn chain(input: &mut &str) -> WResult<ParsedChain> {
    let elements = separated(1.., element, link_separator).parse_next(input)?;

    // Ensure we consumed all input
    multispace0.parse_next(input)?;
    if !input.is_empty() {
        return Err(ContextError::new());
    }

    Ok(ParsedChain { elements })
}

/// Parse an element (kind + optional properties).
fn element(input: &mut &str) -> WResult<ParsedElement> {
    let _ = multispace0.parse_next(input)?;
    let kind: &str = identifier.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;

    let properties: Vec<(String, PropertyValue)> = repeat(0.., property).parse_next(input)?;

    Ok(ParsedElement {
        kind: kind.to_string(),
        properties,
    })
}

/// Parse the link separator `!`.
fn link_separator(input: &mut &str) -> WResult<()> {
    let _ = multispace0.parse_next(input)?;
    let _ = '!'.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    Ok(())
}

/// Parse an identifier (element kind, property or field name).
fn identifier<'a>(input: &mut &'a str) -> WResult<&'a str> {
    (
        alt((alpha1::<_, ContextError>, "_")),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_' || c == '-'),
    )
        .take()
        .parse_next(input)
}

/// Parse a property (key=value).
fn property(input: &mut &str) -> WResult<(String, PropertyValue)> {
    let _ = multispace0.parse_next(input)?;

    // Only commit once we have seen `identifier =`.
    let checkpoint = *input;

    let key: &str = match identifier.parse_next(input) {
        Ok(k) => k,
        Err(_) => {
            *input = checkpoint;
            return Err(ContextError::new());
        }
    };

    let _ = multispace0.parse_next(input)?;

    if input.starts_with('=') {
        let _ = '='.parse_next(input)?;
    } else {
        *input = checkpoint;
        return Err(ContextError::new());
    }

    let _ = multispace0.parse_next(input)?;
    let value = property_value.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;

    Ok((key.to_string(), value))
}

/// Parse a property value.
fn property_value(input: &mut &str) -> WResult<PropertyValue> {
    alt((
        quoted_string.map(PropertyValue::String),
        boolean.map(PropertyValue::Bool),
        float.map(PropertyValue::Float),
        integer.map(PropertyValue::Integer),
        bare_string.map(PropertyValue::String),
    ))
    .parse_next(input)
}

/// Parse a quoted string.
fn quoted_string(input: &mut &str) -> WResult<String> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .map(|s: &str| s.to_string())
    .parse_next(input)
}

/// Parse a boolean, only as a whole word.
fn boolean(input: &mut &str) -> WResult<bool> {
    let checkpoint = *input;
    let value = alt((
        "true".map(|_| true),
        "false".map(|_| false),
        "yes".map(|_| true),
        "no".map(|_| false),
    ))
    .parse_next(input)?;

    if input.starts_with(|c: char| !c.is_whitespace() && c != '!') {
        *input = checkpoint;
        return Err(ContextError::new());
    }
    Ok(value)
}

/// Parse an integer.
fn integer(input: &mut &str) -> WResult<i64> {
    let negative = opt('-').parse_next(input)?;
    let digits: &str = digit1.parse_next(input)?;

    // Make sure this isn't a float (no decimal point follows)
    if input.starts_with('.') {
        return Err(ContextError::new());
    }

    let value: i64 = digits.parse().map_err(|_| ContextError::new())?;

    Ok(if negative.is_some() { -value } else { value })
}

/// Parse a float.
fn float(input: &mut &str) -> WResult<f64> {
    let negative = opt('-').parse_next(input)?;
    let int_part: &str = digit1.parse_next(input)?;
    let _ = '.'.parse_next(input)?;
    let frac_part: &str = digit1.parse_next(input)?;

    let s = format!(
        "{}{}.{}",
        if negative.is_some() { "-" } else { "" },
        int_part,
        frac_part
    );
    s.parse().map_err(|_| ContextError::new())
}

/// Parse a bare (unquoted) string value.
/// Stops at whitespace or `!`.
fn bare_string(input: &mut &str) -> WResult<String> {
    take_while(1.., |c: char| !c.is_whitespace() && c != '!' && c != '=')
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

// ============================================================================
// Caps
// ============================================================================

/// Parse a complete caps description.
fn caps(input: &mut &str) -> WResult<Caps> {
    let structures: Vec<CapsStructure> =
        separated(1.., caps_structure, structure_separator).parse_next(input)?;

    multispace0.parse_next(input)?;
    if !input.is_empty() {
        return Err(ContextError::new());
    }

    Ok(Caps::many(structures))
}

/// Parse the structure separator `;`.
fn structure_separator(input: &mut &str) -> WResult<()> {
    let _ = multispace0.parse_next(input)?;
    let _ = ';'.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    Ok(())
}

/// Parse one structure: media type plus fields.
fn caps_structure(input: &mut &str) -> WResult<CapsStructure> {
    let _ = multispace0.parse_next(input)?;
    let name: &str = media_type.parse_next(input)?;
    let fields: Vec<(&str, String)> = repeat(0.., caps_field).parse_next(input)?;

    Ok(fields
        .into_iter()
        .fold(CapsStructure::new(name), |s, (key, value)| {
            s.with_field(key, value)
        }))
}

/// Parse a media type name such as `audio/x-raw` or `video/*`.
fn media_type<'a>(input: &mut &'a str) -> WResult<&'a str> {
    (
        alpha1::<_, ContextError>,
        '/',
        take_while(1.., |c: char| {
            c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '*')
        }),
    )
        .take()
        .parse_next(input)
}

/// Parse `, key=value`, consuming nothing on failure.
fn caps_field<'a>(input: &mut &'a str) -> WResult<(&'a str, String)> {
    let checkpoint = *input;
    field_pair(input).inspect_err(|_| *input = checkpoint)
}

fn field_pair<'a>(input: &mut &'a str) -> WResult<(&'a str, String)> {
    let _ = multispace0.parse_next(input)?;
    let _ = ','.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let key: &str = identifier.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let _ = '='.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let value = field_value.parse_next(input)?;
    Ok((key, value))
}

/// Parse a field value, quoted or up to the next separator.
fn field_value(input: &mut &str) -> WResult<String> {
    alt((
        quoted_string,
        take_while(1.., |c: char| !c.is_whitespace() && c != ',' && c != ';')
            .map(|s: &str| s.to_string()),
    ))
    .parse_next(input)
}
