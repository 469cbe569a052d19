//! Engine option schemas and values.

use std::collections::HashMap;
use std::fmt;

/// Byte-wise ASCII lowercasing; option names and combo choices compare
/// case-insensitively.
pub(crate) fn case_fold(s: &str) -> String {
    s.chars().map(|c| c.to_ascii_lowercase()).collect()
}

/// Options controlling how strings from and to the engine are validated.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CoderOptions {
    /// Reject all lines containing non-ASCII characters, both directions.
    pub sanitize_utf8: bool,
    /// Allow `name` and `value` substrings in option string values.
    pub allow_bad_substrings: bool,
}

pub(crate) fn is_space(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r' | b' ')
}

pub(crate) fn is_good_untrimmed_string(s: &str, o: CoderOptions) -> bool {
    for &b in s.as_bytes() {
        if b == b'\n' || b == b'\r' {
            return false;
        }
        if is_space(b) {
            continue;
        }
        if b < 0x20 || b == 0x7f {
            return false;
        }
        if o.sanitize_utf8 && b >= 0x80 {
            return false;
        }
    }
    true
}

pub(crate) fn is_good_string(s: &str, o: CoderOptions) -> bool {
    if s.is_empty() {
        return true;
    }
    if !is_good_untrimmed_string(s, o) {
        return false;
    }
    let bytes = s.as_bytes();
    !is_space(bytes[0]) && !is_space(bytes[bytes.len() - 1])
}

/// A value assigned to an engine option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptValue {
    Bool(bool),
    Int(i64),
    String(String),
    Button,
}

impl OptValue {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            OptValue::Bool(_) => "bool",
            OptValue::Int(_) => "int",
            OptValue::String(_) => "string",
            OptValue::Button => "button",
        }
    }

    /// The wire form after `setoption ... value`.
    pub(crate) fn serialize(&self) -> String {
        match self {
            OptValue::Bool(true) => "true".to_string(),
            OptValue::Bool(false) => "false".to_string(),
            OptValue::Int(v) => v.to_string(),
            OptValue::String(s) if s.is_empty() => "<empty>".to_string(),
            OptValue::String(s) => s.clone(),
            OptValue::Button => unreachable!("buttons carry no value"),
        }
    }
}

/// Error type for option assignment failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    /// The value's type does not match the option's schema.
    BadType { given: &'static str },
    /// A spin value outside its declared range.
    OutOfRange { val: i64, min: i64, max: i64 },
    /// A combo value not among the declared choices.
    BadChoice { choice: String },
    /// A string value failing the wire-safety checks.
    BadString { value: String },
    /// A string value containing `name`/`value`, which the setoption
    /// grammar cannot carry.
    ForbiddenSubstring { value: String },
}

impl fmt::Display for OptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionError::BadType { given } => write!(f, "bad option value type {given}"),
            OptionError::OutOfRange { val, min, max } => {
                write!(f, "out of range: {val} not in [{min}; {max}]")
            }
            OptionError::BadChoice { choice } => write!(f, "bad choice {choice:?}"),
            OptionError::BadString { value } => write!(f, "bad option string {value:?}"),
            OptionError::ForbiddenSubstring { value } => {
                write!(f, "option string {value:?} contains forbidden substrings")
            }
        }
    }
}

impl std::error::Error for OptionError {}

/// A declared engine option: its typed schema plus the current value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineOption {
    Check {
        value: bool,
    },
    Spin {
        value: i64,
        min: i64,
        max: i64,
    },
    Combo {
        value: String,
        choices: Vec<String>,
        /// Case-folded choice to canonical casing.
        choice_map: HashMap<String, String>,
    },
    Button,
    String {
        value: String,
    },
}

impl EngineOption {
    /// The current value.
    #[must_use]
    pub fn value(&self) -> OptValue {
        match self {
            EngineOption::Check { value } => OptValue::Bool(*value),
            EngineOption::Spin { value, .. } => OptValue::Int(*value),
            EngineOption::Combo { value, .. } | EngineOption::String { value } => {
                OptValue::String(value.clone())
            }
            EngineOption::Button => OptValue::Button,
        }
    }

    /// Validate `v` against the schema and store it, normalizing combo
    /// choices to their canonical casing.
    pub fn set_value(&mut self, v: &OptValue, o: CoderOptions) -> Result<(), OptionError> {
        match self {
            EngineOption::Check { value } => match v {
                OptValue::Bool(b) => {
                    *value = *b;
                    Ok(())
                }
                _ => Err(OptionError::BadType {
                    given: v.type_name(),
                }),
            },
            EngineOption::Spin { value, min, max } => match v {
                OptValue::Int(i) => {
                    if !(*min <= *i && *i <= *max) {
                        return Err(OptionError::OutOfRange {
                            val: *i,
                            min: *min,
                            max: *max,
                        });
                    }
                    *value = *i;
                    Ok(())
                }
                _ => Err(OptionError::BadType {
                    given: v.type_name(),
                }),
            },
            EngineOption::Combo {
                value, choice_map, ..
            } => match v {
                OptValue::String(s) => {
                    let canonical =
                        choice_map
                            .get(&case_fold(s))
                            .ok_or_else(|| OptionError::BadChoice {
                                choice: s.clone(),
                            })?;
                    *value = canonical.clone();
                    Ok(())
                }
                _ => Err(OptionError::BadType {
                    given: v.type_name(),
                }),
            },
            EngineOption::Button => match v {
                OptValue::Button => Ok(()),
                _ => Err(OptionError::BadType {
                    given: v.type_name(),
                }),
            },
            EngineOption::String { value } => match v {
                OptValue::String(s) => {
                    if !is_good_string(s, o) || s == "<empty>" {
                        return Err(OptionError::BadString { value: s.clone() });
                    }
                    if !o.allow_bad_substrings
                        && (s.contains("name") || s.contains("value"))
                    {
                        return Err(OptionError::ForbiddenSubstring { value: s.clone() });
                    }
                    *value = s.clone();
                    Ok(())
                }
                _ => Err(OptionError::BadType {
                    given: v.type_name(),
                }),
            },
        }
    }
}

/// An option paired with its canonical (engine-declared) name.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OptPair {
    pub name: String,
    pub option: EngineOption,
}

pub(crate) const PONDER_OPT_NAME: &str = "ponder";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_option() {
        let mut opt = EngineOption::Check { value: false };
        opt.set_value(&OptValue::Bool(true), CoderOptions::default())
            .unwrap();
        assert_eq!(opt.value(), OptValue::Bool(true));
        assert!(matches!(
            opt.set_value(&OptValue::Int(1), CoderOptions::default()),
            Err(OptionError::BadType { given: "int" })
        ));
    }

    #[test]
    fn test_spin_range() {
        let mut opt = EngineOption::Spin {
            value: 16,
            min: 1,
            max: 128,
        };
        opt.set_value(&OptValue::Int(64), CoderOptions::default())
            .unwrap();
        assert_eq!(opt.value(), OptValue::Int(64));
        assert!(matches!(
            opt.set_value(&OptValue::Int(0), CoderOptions::default()),
            Err(OptionError::OutOfRange { .. })
        ));
        assert!(matches!(
            opt.set_value(&OptValue::Int(129), CoderOptions::default()),
            Err(OptionError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_combo_case_insensitive() {
        let mut opt = EngineOption::Combo {
            value: "Normal".to_string(),
            choices: vec!["Normal".to_string(), "Aggressive".to_string()],
            choice_map: HashMap::from([
                ("normal".to_string(), "Normal".to_string()),
                ("aggressive".to_string(), "Aggressive".to_string()),
            ]),
        };
        opt.set_value(
            &OptValue::String("AGGRESSIVE".to_string()),
            CoderOptions::default(),
        )
        .unwrap();
        // Normalized to the canonical casing.
        assert_eq!(opt.value(), OptValue::String("Aggressive".to_string()));
        assert!(matches!(
            opt.set_value(&OptValue::String("bogus".to_string()), CoderOptions::default()),
            Err(OptionError::BadChoice { .. })
        ));
    }

    #[test]
    fn test_string_option_rejects_sentinel() {
        let mut opt = EngineOption::String {
            value: String::new(),
        };
        assert!(matches!(
            opt.set_value(
                &OptValue::String("<empty>".to_string()),
                CoderOptions::default()
            ),
            Err(OptionError::BadString { .. })
        ));
        assert!(matches!(
            opt.set_value(
                &OptValue::String("my value here".to_string()),
                CoderOptions::default()
            ),
            Err(OptionError::ForbiddenSubstring { .. })
        ));
        opt.set_value(
            &OptValue::String("books/main.bin".to_string()),
            CoderOptions::default(),
        )
        .unwrap();
    }

    #[test]
    fn test_string_goodness() {
        let o = CoderOptions::default();
        assert!(is_good_string("", o));
        assert!(is_good_string("hello world", o));
        assert!(!is_good_string(" leading", o));
        assert!(!is_good_string("trailing ", o));
        assert!(!is_good_string("line\nbreak", o));
        assert!(!is_good_string("ctrl\x01char", o));
        let sanitize = CoderOptions {
            sanitize_utf8: true,
            ..o
        };
        assert!(!is_good_string("caf\u{e9}", sanitize));
        assert!(is_good_string("caf\u{e9}", o));
    }

    #[test]
    fn test_value_serialization() {
        assert_eq!(OptValue::Bool(true).serialize(), "true");
        assert_eq!(OptValue::Int(-3).serialize(), "-3");
        assert_eq!(OptValue::String("abc".to_string()).serialize(), "abc");
        assert_eq!(OptValue::String(String::new()).serialize(), "<empty>");
    }
}
