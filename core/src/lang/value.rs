//! Runtime values.

use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Also the "no value" sentinel.
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    Array(Vec<Value>),
    Class(&'static str),
    /// The top-level `self` of a snippet.
    Main,
    /// A value reported as text by an external interpreter.
    Opaque(String),
}

/// Built-in class names resolvable as constants.
pub const CLASS_NAMES: &[&str] = &[
    "Object",
    "NilClass",
    "TrueClass",
    "FalseClass",
    "Integer",
    "Float",
    "String",
    "Symbol",
    "Array",
    "Class",
    "StandardError",
    "NameError",
    "NoMethodError",
    "ArgumentError",
    "TypeError",
    "ZeroDivisionError",
    "RuntimeError",
    "SystemStackError",
    "LocalJumpError",
];

pub fn lookup_class(name: &str) -> Option<&'static str> {
    CLASS_NAMES.iter().copied().find(|&c| c == name)
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Value::Nil => "NilClass",
            Value::Bool(true) => "TrueClass",
            Value::Bool(false) => "FalseClass",
            Value::Int(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Array(_) => "Array",
            Value::Class(_) => "Class",
            Value::Main | Value::Opaque(_) => "Object",
        }
    }

    /// What `puts`/interpolation shows.
    pub fn to_s(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Str(s) => s.clone(),
            Value::Symbol(s) => s.clone(),
            Value::Class(name) => (*name).to_owned(),
            other => other.inspect(),
        }
    }

    /// What `p` shows, and the canonical form used to compare expectations.
    pub fn inspect(&self) -> String {
        match self {
            Value::Nil => "nil".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => inspect_str(s),
            Value::Symbol(s) => format!(":{}", s),
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(Value::inspect).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Class(name) => (*name).to_owned(),
            Value::Main => "main".to_owned(),
            Value::Opaque(s) => s.clone(),
        }
    }

    /// `==` as the snippet language sees it: numbers compare across Integer/Float.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (a, b) => a == b,
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_owned()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else {
        // Debug keeps the trailing ".0" that Ruby prints
        format!("{:?}", f)
    }
}

fn inspect_str(s: &str) -> String {
    let mut res = String::with_capacity(s.len() + 2);
    res.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => res.push_str("\\\""),
            '\\' => res.push_str("\\\\"),
            '\n' => res.push_str("\\n"),
            '\t' => res.push_str("\\t"),
            '\r' => res.push_str("\\r"),
            '\x1b' => res.push_str("\\e"),
            '\0' => res.push_str("\\0"),
            '#' if matches!(chars.peek(), Some('{')) => res.push_str("\\#"),
            c => res.push(c),
        }
    }
    res.push('"');
    res
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inspect())
    }
}
