//! Error codes for all compiler diagnostics.
//!
//! Each code is a unique identifier (e.g. `E1002`) whose first digit names
//! the phase that reports it. All codes are declared in one
//! [`define_error_codes!`] invocation; the macro generates the `ErrorCode`
//! enum, `ALL`, `as_str()`, `description()`, and `Display`.

use std::fmt;

/// Declare all error codes in a single location.
///
/// Each entry is `$variant, $description`. Generates:
/// - `ErrorCode` enum with doc comments from descriptions
/// - `ALL: &[ErrorCode]` for exhaustive iteration
/// - `as_str()` — the code as `&'static str` (e.g. `"E1002"`)
/// - `description()` — the one-line summary
macro_rules! define_error_codes {
    ($( $variant:ident, $desc:literal );+ $(;)?) => {
        /// Error codes for all compiler diagnostics.
        ///
        /// Format: E#### where the first digit names the phase:
        /// - E0xxx: lexer
        /// - E1xxx: parser
        /// - E2xxx: symbol resolution
        /// - E3xxx: type checking
        /// - E4xxx: flow analysis
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
        pub enum ErrorCode {
            $(
                #[doc = $desc]
                $variant,
            )+
        }

        impl ErrorCode {
            /// All error code variants, for exhaustive iteration and testing.
            pub const ALL: &'static [ErrorCode] = &[ $( ErrorCode::$variant, )+ ];

            /// The code as a string (e.g. `"E1002"`).
            pub fn as_str(self) -> &'static str {
                match self {
                    $( ErrorCode::$variant => stringify!($variant), )+
                }
            }

            /// One-line description of this error code.
            pub fn description(self) -> &'static str {
                match self {
                    $( ErrorCode::$variant => $desc, )+
                }
            }
        }
    };
}

define_error_codes! {
    // Lexer (E0xxx)
    E0001, "Unexpected character in source";
    E0002, "Invalid escape sequence";
    E0003, "Unterminated string literal";
    E0004, "Invalid literal";

    // Parser (E1xxx)
    E1001, "Unexpected input";
    E1002, "Expected token";
    E1003, "Element not legal in this context";
    E1004, "Insufficient indentation in multi-line string";
    E1005, "Closing quotes of multi-line string not on a new line";
    E1006, "Extra tokens inline with opening quotes of multi-line string";

    // Symbol resolution (E2xxx)
    E2001, "Undefined reference";
    E2002, "Ambiguous reference";
    E2003, "Reference not legal in this context";
    E2004, "Illegal shadowing";

    // Type checking (E3xxx)
    E3001, "Type mismatch";
    E3002, "Called value is not a function";
    E3003, "Ambiguous overload";
    E3004, "No matching overload";
    E3005, "Wrong number of generic arguments";
    E3006, "Assignment to immutable binding";
    E3007, "Type could not be inferred";

    // Flow analysis (E4xxx)
    E4001, "Unreachable code";
    E4002, "Not all code paths return a value";
}

impl ErrorCode {
    /// Phase digit of the code (`0` lexer .. `4` flow).
    pub fn phase(self) -> u8 {
        // as_str() is always "E" followed by four ASCII digits
        self.as_str().as_bytes()[1] - b'0'
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in ErrorCode::ALL.iter().enumerate() {
            for b in &ErrorCode::ALL[i + 1..] {
                assert_ne!(a.as_str(), b.as_str());
            }
        }
    }

    #[test]
    fn test_code_format() {
        for code in ErrorCode::ALL {
            let s = code.as_str();
            assert_eq!(s.len(), 5);
            assert!(s.starts_with('E'));
            assert!(s[1..].bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_phase_digit() {
        assert_eq!(ErrorCode::E0001.phase(), 0);
        assert_eq!(ErrorCode::E1002.phase(), 1);
        assert_eq!(ErrorCode::E3004.phase(), 3);
        assert_eq!(ErrorCode::E4002.phase(), 4);
    }

    #[test]
    fn test_descriptions_nonempty() {
        for code in ErrorCode::ALL {
            assert!(!code.description().is_empty());
        }
    }
}
