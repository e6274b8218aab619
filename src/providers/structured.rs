//! Incremental parsing of schema-constrained model output
//!
//! Structured generations stream their JSON a few characters at a time. This
//! module repairs a truncated JSON prefix into the closest valid document so
//! callers can observe partial values while the model is still writing:
//!
//! - [`parse_partial_json`] repairs and parses a prefix
//! - [`StringFieldStream`] reports every change of one string field
//! - [`ElementStream`] yields array elements once they can no longer change

use crate::error::{QuireError, Result};
use serde_json::Value;

/// A parsed, possibly repaired, JSON prefix
#[derive(Debug, Clone, PartialEq)]
pub struct PartialJson {
    /// The parsed value
    pub value: Value,
    /// `true` when the input parsed without repair
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Root,
    Finish,
    InsideString,
    InsideStringEscape,
    InsideLiteral,
    InsideNumber,
    ObjectStart,
    ObjectKey,
    ObjectAfterKey,
    ObjectBeforeValue,
    ObjectAfterValue,
    ObjectAfterComma,
    ArrayStart,
    ArrayAfterValue,
    ArrayAfterComma,
}

const LITERALS: [&str; 3] = ["true", "false", "null"];

struct Repairer<'a> {
    input: &'a str,
    stack: Vec<State>,
    valid_end: usize,
    literal_start: usize,
}

impl<'a> Repairer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            stack: vec![State::Root],
            valid_end: 0,
            literal_start: 0,
        }
    }

    fn top(&self) -> Option<State> {
        self.stack.last().copied()
    }

    fn swap(&mut self, next: State) {
        self.stack.pop();
        self.stack.push(next);
    }

    fn value_start(&mut self, c: char, start: usize, end: usize, after: State) {
        let inner = match c {
            '"' => State::InsideString,
            't' | 'f' | 'n' => {
                self.literal_start = start;
                State::InsideLiteral
            }
            '-' => {
                self.swap(after);
                self.stack.push(State::InsideNumber);
                return;
            }
            '0'..='9' => State::InsideNumber,
            '{' => State::ObjectStart,
            '[' => State::ArrayStart,
            _ => return,
        };
        self.valid_end = end;
        self.swap(after);
        self.stack.push(inner);
    }

    fn after_object_value(&mut self, c: char, end: usize) {
        match c {
            ',' => self.swap(State::ObjectAfterComma),
            '}' => {
                self.valid_end = end;
                self.stack.pop();
            }
            _ => {}
        }
    }

    fn after_array_value(&mut self, c: char, end: usize) {
        match c {
            ',' => self.swap(State::ArrayAfterComma),
            ']' => {
                self.valid_end = end;
                self.stack.pop();
            }
            _ => {}
        }
    }

    fn close_scalar(&mut self, c: char, end: usize) {
        self.stack.pop();
        match self.top() {
            Some(State::ObjectAfterValue) => self.after_object_value(c, end),
            Some(State::ArrayAfterValue) => self.after_array_value(c, end),
            _ => {}
        }
    }

    fn step(&mut self, start: usize, c: char) {
        let end = start + c.len_utf8();
        let Some(state) = self.top() else {
            return;
        };

        match state {
            State::Root => self.value_start(c, start, end, State::Finish),
            State::Finish => {}
            State::ObjectStart => match c {
                '"' => self.swap(State::ObjectKey),
                '}' => {
                    self.valid_end = end;
                    self.stack.pop();
                }
                _ => {}
            },
            State::ObjectAfterComma => {
                if c == '"' {
                    self.swap(State::ObjectKey);
                }
            }
            State::ObjectKey => {
                if c == '"' {
                    self.swap(State::ObjectAfterKey);
                }
            }
            State::ObjectAfterKey => {
                if c == ':' {
                    self.swap(State::ObjectBeforeValue);
                }
            }
            State::ObjectBeforeValue => self.value_start(c, start, end, State::ObjectAfterValue),
            State::ObjectAfterValue => self.after_object_value(c, end),
            State::InsideString => match c {
                '"' => {
                    self.stack.pop();
                    self.valid_end = end;
                }
                '\\' => self.stack.push(State::InsideStringEscape),
                _ => self.valid_end = end,
            },
            State::InsideStringEscape => {
                self.stack.pop();
                self.valid_end = end;
            }
            State::ArrayStart => match c {
                ']' => {
                    self.valid_end = end;
                    self.stack.pop();
                }
                _ => self.value_start(c, start, end, State::ArrayAfterValue),
            },
            State::ArrayAfterValue => self.after_array_value(c, end),
            State::ArrayAfterComma => self.value_start(c, start, end, State::ArrayAfterValue),
            State::InsideNumber => match c {
                '0'..='9' => self.valid_end = end,
                'e' | 'E' | '-' | '+' | '.' => {}
                _ => self.close_scalar(c, end),
            },
            State::InsideLiteral => {
                let partial = &self.input[self.literal_start..end];
                if LITERALS.iter().any(|lit| lit.starts_with(partial)) {
                    self.valid_end = end;
                } else {
                    self.close_scalar(c, end);
                }
            }
        }
    }

    fn finish(mut self) -> String {
        for (start, c) in self.input.char_indices() {
            self.step(start, c);
        }

        let mut result = self.input[..self.valid_end].to_string();
        for state in self.stack.iter().rev() {
            match state {
                State::InsideString => result.push('"'),
                State::ObjectStart
                | State::ObjectKey
                | State::ObjectAfterKey
                | State::ObjectBeforeValue
                | State::ObjectAfterValue
                | State::ObjectAfterComma => result.push('}'),
                State::ArrayStart | State::ArrayAfterValue | State::ArrayAfterComma => {
                    result.push(']')
                }
                State::InsideLiteral => {
                    let partial = &self.input[self.literal_start..];
                    if let Some(lit) = LITERALS.iter().find(|lit| lit.starts_with(partial)) {
                        result.push_str(&lit[partial.len()..]);
                    }
                }
                State::Root | State::Finish | State::InsideStringEscape | State::InsideNumber => {}
            }
        }
        result
    }
}

/// Close a truncated JSON prefix
///
/// Trailing tokens that cannot be completed (a half-written key, a dangling
/// comma or colon, an exponent without digits) are dropped; open strings,
/// literals, arrays and objects are closed.
///
/// # Examples
///
/// ```
/// use quire::providers::structured::repair_json;
///
/// assert_eq!(repair_json(r#"{"code": "print("#), r#"{"code": "print("}"#);
/// assert_eq!(repair_json(r#"{"a": 1, "b"#), r#"{"a": 1}"#);
/// assert_eq!(repair_json("[tr"), "[true]");
/// ```
pub fn repair_json(input: &str) -> String {
    Repairer::new(input).finish()
}

/// Parse a JSON prefix, repairing it if needed
///
/// Returns `None` when the input is empty or cannot be repaired into a
/// JSON value.
pub fn parse_partial_json(input: &str) -> Option<PartialJson> {
    if input.trim().is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(input) {
        return Some(PartialJson {
            value,
            complete: true,
        });
    }

    serde_json::from_str(&repair_json(input))
        .ok()
        .map(|value| PartialJson {
            value,
            complete: false,
        })
}

/// Tracks one string field of a streamed JSON object
///
/// Every time the partial value of the field changes, [`push`](Self::push)
/// returns the whole current value.
#[derive(Debug)]
pub struct StringFieldStream {
    field: String,
    buffer: String,
    last: Option<String>,
}

impl StringFieldStream {
    /// Track `field` of the top-level object
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            buffer: String::new(),
            last: None,
        }
    }

    /// Append a raw text delta
    ///
    /// # Returns
    ///
    /// Returns the full field value if it changed since the last call
    pub fn push(&mut self, delta: &str) -> Option<String> {
        self.buffer.push_str(delta);
        let parsed = parse_partial_json(&self.buffer)?;
        let current = parsed.value.get(&self.field)?.as_str()?;

        if self.last.as_deref() == Some(current) {
            return None;
        }
        self.last = Some(current.to_string());
        self.last.clone()
    }

    /// Most recent observed value
    pub fn value(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Raw text received so far
    pub fn raw(&self) -> &str {
        &self.buffer
    }
}

/// Streams the elements of a `{"<field>": [...]}` structured output
///
/// Elements are yielded in order, each exactly once, as soon as a later
/// element has started (so the earlier one is final). The last element is
/// yielded by [`finish`](Self::finish).
#[derive(Debug)]
pub struct ElementStream {
    field: String,
    buffer: String,
    emitted: usize,
}

impl ElementStream {
    /// Stream elements of the array under `field`
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            buffer: String::new(),
            emitted: 0,
        }
    }

    fn elements(value: &Value, field: &str) -> Vec<Value> {
        value
            .get(field)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Append a raw text delta
    ///
    /// # Returns
    ///
    /// Returns the elements that became final with this delta
    pub fn push(&mut self, delta: &str) -> Vec<Value> {
        self.buffer.push_str(delta);
        let Some(parsed) = parse_partial_json(&self.buffer) else {
            return Vec::new();
        };

        let elements = Self::elements(&parsed.value, &self.field);
        let ready = if parsed.complete {
            elements.len()
        } else {
            elements.len().saturating_sub(1)
        };
        self.take(elements, ready)
    }

    /// End of output: yield the remaining elements
    ///
    /// # Errors
    ///
    /// Returns a provider error if the accumulated text is not valid JSON
    pub fn finish(&mut self) -> Result<Vec<Value>> {
        if self.buffer.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: Value = serde_json::from_str(&self.buffer).map_err(|e| {
            QuireError::Provider(format!("Structured output was not valid JSON: {}", e))
        })?;
        let elements = Self::elements(&value, &self.field);
        let ready = elements.len();
        Ok(self.take(elements, ready))
    }

    fn take(&mut self, elements: Vec<Value>, ready: usize) -> Vec<Value> {
        if ready <= self.emitted {
            return Vec::new();
        }
        let out = elements
            .into_iter()
            .skip(self.emitted)
            .take(ready - self.emitted)
            .collect();
        self.emitted = ready;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repair_open_string_value() {
        assert_eq!(repair_json(r#"{"code": "fn ma"#), r#"{"code": "fn ma"}"#);
    }

    #[test]
    fn test_repair_drops_partial_key() {
        assert_eq!(repair_json(r#"{"a": "x", "co"#), r#"{"a": "x"}"#);
        assert_eq!(repair_json(r#"{"a": "x","#), r#"{"a": "x"}"#);
    }

    #[test]
    fn test_repair_drops_key_without_value() {
        assert_eq!(repair_json(r#"{"a":"#), "{}");
        assert_eq!(repair_json(r#"{"a""#), "{}");
    }

    #[test]
    fn test_repair_dangling_escape() {
        assert_eq!(repair_json(r#"{"a": "line\"#), r#"{"a": "line"}"#);
    }

    #[test]
    fn test_repair_numbers() {
        assert_eq!(repair_json(r#"{"n": 12"#), r#"{"n": 12}"#);
        assert_eq!(repair_json(r#"{"n": 1."#), r#"{"n": 1}"#);
        assert_eq!(repair_json("[1, 2, -"), "[1, 2]");
    }

    #[test]
    fn test_repair_literals() {
        assert_eq!(repair_json(r#"{"ok": fa"#), r#"{"ok": false}"#);
        assert_eq!(repair_json("[nu"), "[null]");
    }

    #[test]
    fn test_repair_nested() {
        assert_eq!(
            repair_json(r#"{"elements": [{"originalSentence": "a", "sugg"#),
            r#"{"elements": [{"originalSentence": "a"}]}"#
        );
    }

    #[test]
    fn test_repair_multibyte_text() {
        assert_eq!(repair_json(r#"{"t": "héllo wörl"#), r#"{"t": "héllo wörl"}"#);
    }

    #[test]
    fn test_parse_partial_json_complete_and_repaired() {
        let complete = parse_partial_json(r#"{"a": 1}"#).unwrap();
        assert!(complete.complete);

        let repaired = parse_partial_json(r#"{"a": [1, 2"#).unwrap();
        assert!(!repaired.complete);
        assert_eq!(repaired.value, json!({"a": [1, 2]}));

        assert!(parse_partial_json("").is_none());
    }

    #[test]
    fn test_string_field_stream_reports_changes_only() {
        let mut stream = StringFieldStream::new("code");
        assert_eq!(stream.push(r#"{"co"#), None);
        assert_eq!(stream.push(r#"de": "pri"#).as_deref(), Some("pri"));
        assert_eq!(stream.push(r#"nt(1)"#).as_deref(), Some("print(1)"));
        assert_eq!(stream.push(r#"""#), None);
        assert_eq!(stream.push("}"), None);
        assert_eq!(stream.value(), Some("print(1)"));
    }

    #[test]
    fn test_element_stream_yields_final_elements_in_order() {
        let mut stream = ElementStream::new("elements");
        assert!(stream.push(r#"{"elements": [{"a": 1}"#).is_empty());
        assert_eq!(stream.push(r#", {"a""#), vec![json!({"a": 1})]);
        assert!(stream.push(r#": 2}"#).is_empty());
        assert_eq!(stream.push("]}"), vec![json!({"a": 2})]);
        assert!(stream.finish().unwrap().is_empty());
    }

    #[test]
    fn test_element_stream_finish_yields_last() {
        let mut stream = ElementStream::new("elements");
        assert!(stream.push(r#"{"elements": [{"a": 1}]"#).is_empty());
        assert!(stream.finish().is_err());

        let mut stream = ElementStream::new("elements");
        assert!(stream.push(r#"{"elements": [{"a": 1}"#).is_empty());
        stream.buffer.push_str("]}");
        assert_eq!(stream.finish().unwrap(), vec![json!({"a": 1})]);
    }
}
