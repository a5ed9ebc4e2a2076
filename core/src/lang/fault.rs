use std::{fmt, str::FromStr, time::Duration};

use serde::{Serialize, Serializer};

/// The exception class a snippet raised, or a harness-level condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultKind {
    NameError,
    NoMethodError,
    ArgumentError,
    TypeError,
    ZeroDivisionError,
    RuntimeError,
    SystemStackError,
    LocalJumpError,
    SyntaxError,
    Timeout,
    /// The harness itself could not run the snippet (e.g. failed to spawn).
    HarnessError,
    /// Any other exception class reported by an external interpreter.
    Other(String),
}

impl FaultKind {
    pub fn as_str(&self) -> &str {
        use FaultKind::*;
        match self {
            NameError => "NameError",
            NoMethodError => "NoMethodError",
            ArgumentError => "ArgumentError",
            TypeError => "TypeError",
            ZeroDivisionError => "ZeroDivisionError",
            RuntimeError => "RuntimeError",
            SystemStackError => "SystemStackError",
            LocalJumpError => "LocalJumpError",
            SyntaxError => "SyntaxError",
            Timeout => "Timeout",
            HarnessError => "HarnessError",
            Other(name) => name,
        }
    }

    /// `NoMethodError` is a `NameError` in the subject language; an expectation
    /// naming the parent class accepts the child.
    pub fn satisfies(&self, expected: &FaultKind) -> bool {
        self == expected
            || (*self == FaultKind::NoMethodError && *expected == FaultKind::NameError)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use FaultKind::*;
        Ok(match s.trim() {
            "NameError" => NameError,
            "NoMethodError" => NoMethodError,
            "ArgumentError" => ArgumentError,
            "TypeError" => TypeError,
            "ZeroDivisionError" => ZeroDivisionError,
            "RuntimeError" => RuntimeError,
            "SystemStackError" => SystemStackError,
            "LocalJumpError" => LocalJumpError,
            "SyntaxError" => SyntaxError,
            "Timeout" | "TimeoutError" => Timeout,
            "HarnessError" => HarnessError,
            other => Other(other.to_owned()),
        })
    }
}

impl Serialize for FaultKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    /// 1-indexed line within the snippet source, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn at(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            FaultKind::Timeout,
            format!("execution exceeded {}ms", limit.as_millis()),
        )
    }

    pub fn name_error(name: &str) -> Self {
        Self::new(
            FaultKind::NameError,
            format!("undefined local variable or method '{}' for main:Object", name),
        )
    }

    pub fn no_method(name: &str, receiver: &str) -> Self {
        Self::new(
            FaultKind::NoMethodError,
            format!("undefined method '{}' for {}", name, receiver),
        )
    }

    pub fn argument_count(given: usize, min: usize, max: usize) -> Self {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}..{}", min, max)
        };
        Self::new(
            FaultKind::ArgumentError,
            format!(
                "wrong number of arguments (given {}, expected {})",
                given, expected
            ),
        )
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::TypeError, message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_round_trips_through_text() {
        for kind in [
            FaultKind::NameError,
            FaultKind::ZeroDivisionError,
            FaultKind::Timeout,
            FaultKind::Other("KeyError".into()),
        ] {
            assert_eq!(kind.as_str().parse::<FaultKind>().unwrap(), kind);
        }
    }

    #[test]
    fn no_method_error_is_a_name_error() {
        assert!(FaultKind::NoMethodError.satisfies(&FaultKind::NameError));
        assert!(!FaultKind::NameError.satisfies(&FaultKind::NoMethodError));
    }

    #[test]
    fn messages() {
        assert_eq!(
            Fault::name_error("my_var").to_string(),
            "NameError: undefined local variable or method 'my_var' for main:Object"
        );
        assert_eq!(
            Fault::argument_count(3, 0, 1).message,
            "wrong number of arguments (given 3, expected 0..1)"
        );
        assert_eq!(Fault::name_error("x").at(3).at(7).line, Some(3));
    }
}
