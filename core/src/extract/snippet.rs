use serde::Serialize;

use crate::lang::{self, FaultKind, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    /// 1-based position in extraction order
    pub id: usize,
    /// 1-based document line of the first source line
    pub line: usize,
    /// Code of the same example block preceding this snippet.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub setup: Vec<String>,
    pub source: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_return: Option<ExpectedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_fault: Option<ExpectedFault>,
}

impl Snippet {
    /// No expectation to check against.
    pub fn is_informational(&self) -> bool {
        self.expected_output.is_none()
            && self.expected_return.is_none()
            && self.expected_fault.is_none()
    }

    pub fn source_text(&self) -> String {
        self.source.join("\n")
    }

    pub fn setup_text(&self) -> String {
        self.setup.join("\n")
    }

    /// First meaningful source line, for one-line listings.
    pub fn headline(&self) -> &str {
        self.source
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedValue {
    /// As written after the marker.
    pub text: String,
    /// `inspect` rendering of `text` if it is a literal, else `text` itself.
    pub canonical: String,
    #[serde(skip)]
    pub literal: Option<Value>,
}

impl ExpectedValue {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let literal = lang::parse_literal(text);
        Self {
            text: text.to_owned(),
            canonical: literal
                .as_ref()
                .map(Value::inspect)
                .unwrap_or_else(|| text.to_owned()),
            literal,
        }
    }

    /// The string the value denotes, if it is a string literal.
    pub fn as_str_literal(&self) -> Option<&str> {
        match &self.literal {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedFault {
    pub kind: FaultKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExpectedFault {
    /// `Kind` or `Kind: message`
    pub fn parse(text: &str) -> Self {
        let (kind, message) = match text.split_once(':') {
            Some((kind, msg)) => (kind, Some(msg.trim().to_owned()).filter(|m| !m.is_empty())),
            None => (text, None),
        };
        let kind = kind.parse::<FaultKind>().unwrap_or_else(|never| match never {});
        Self { kind, message }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expected_value_canonical_form() {
        let v = ExpectedValue::parse(" 'Bob Ross' ");
        assert_eq!(v.text, "'Bob Ross'");
        assert_eq!(v.canonical, "\"Bob Ross\"");
        assert_eq!(v.as_str_literal(), Some("Bob Ross"));

        let v = ExpectedValue::parse("#<Enumerator: ...>");
        assert_eq!(v.canonical, "#<Enumerator: ...>");
        assert_eq!(v.literal, None);
    }

    #[test]
    fn expected_fault_parse() {
        assert_eq!(
            ExpectedFault::parse("NameError: undefined local variable"),
            ExpectedFault {
                kind: FaultKind::NameError,
                message: Some("undefined local variable".into())
            }
        );
        assert_eq!(
            ExpectedFault::parse("ZeroDivisionError"),
            ExpectedFault {
                kind: FaultKind::ZeroDivisionError,
                message: None
            }
        );
    }
}
