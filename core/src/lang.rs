//! The snippet language: a Ruby-tutorial subset run by the builtin harness.

pub mod analysis;
pub mod ast;
pub mod eval;
pub mod fault;
pub mod lexer;
pub mod parser;
pub mod value;

pub use self::eval::Context;
pub use self::fault::{Fault, FaultKind};
pub use self::value::Value;

use self::ast::{ExprKind, StrPart};

/// Parse `text` as a literal value: nil, booleans, numbers, plain strings,
/// symbols, class names and arrays of those.
///
/// Anything that would need evaluation (calls, interpolation, variables) is
/// rejected with `None`.
pub fn parse_literal(text: &str) -> Option<Value> {
    let program = parser::parse_program(text).ok()?;
    let [expr] = program.body.as_slice() else {
        return None;
    };
    if !is_literal(&expr.kind) {
        return None;
    }
    Context::new().run(&program).ok()
}

fn is_literal(kind: &ExprKind) -> bool {
    match kind {
        ExprKind::Nil
        | ExprKind::True
        | ExprKind::False
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Symbol(_) => true,
        ExprKind::Str(parts) => parts.iter().all(|p| matches!(p, StrPart::Text(_))),
        ExprKind::Const(name) => value::lookup_class(name).is_some(),
        ExprKind::Array(items) => items.iter().all(|e| is_literal(&e.kind)),
        ExprKind::Neg(inner) => matches!(inner.kind, ExprKind::Int(_) | ExprKind::Float(_)),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(parse_literal("nil"), Some(Value::Nil));
        assert_eq!(parse_literal("4"), Some(Value::Int(4)));
        assert_eq!(parse_literal("-1.5"), Some(Value::Float(-1.5)));
        assert_eq!(parse_literal("'Bob Ross'"), Some(Value::Str("Bob Ross".into())));
        assert_eq!(parse_literal(":say_hi"), Some(Value::Symbol("say_hi".into())));
        assert_eq!(parse_literal("String"), Some(Value::Class("String")));
        assert_eq!(
            parse_literal("[nil, 4]"),
            Some(Value::Array(vec![Value::Nil, Value::Int(4)]))
        );
    }

    #[test]
    fn non_literals() {
        assert_eq!(parse_literal("Index: 0, Value: 1"), None);
        assert_eq!(parse_literal("\"#{x}\""), None);
        assert_eq!(parse_literal("foo"), None);
        assert_eq!(parse_literal("1 + 1"), None);
        assert_eq!(parse_literal("Hi there, Rubyist!"), None);
    }
}
