//! Scalar Strategies
//!
//! Leaf fragments. Strings are a single regex covering both quotes, so a
//! generated string is always a double-quoted YAML scalar.

use crate::error::{ExtractError, Result};
use crate::grammar::Fragment;
use crate::schema::ScalarKind;

/// Non-negative integers
pub const INTEGER_PATTERN: &str = r"\d+";

/// Decimal point required, no exponent
pub const FLOAT_PATTERN: &str = r"-?\d+\.\d+";

/// Regex for a double-quoted string whose unescaped characters come from
/// `alphabet`. `\"` and `\\` are always allowed.
pub fn string_pattern(alphabet: &str) -> String {
    let mut class = String::new();
    let mut seen = Vec::new();
    for c in alphabet.chars() {
        if c == '"' || c == '\\' || c.is_control() || seen.contains(&c) {
            continue;
        }
        seen.push(c);
        class.push_str(&regex::escape(&c.to_string()));
    }

    if class.is_empty() {
        r#""(?:\\["\\])*""#.to_string()
    } else {
        format!(r#""(?:[{}]|\\["\\])*""#, class)
    }
}

pub fn compile_scalar(kind: ScalarKind, string_pattern: &str) -> Fragment {
    match kind {
        ScalarKind::String => Fragment::regex(string_pattern),
        ScalarKind::Integer => Fragment::regex(INTEGER_PATTERN),
        ScalarKind::Float => Fragment::regex(FLOAT_PATTERN),
        ScalarKind::Boolean => Fragment::select([Fragment::literal("true"), Fragment::literal("false")]),
    }
}

/// Choice among already escaped enumeration values
pub fn compile_enumeration(choices: &[String]) -> Result<Fragment> {
    if choices.is_empty() {
        return Err(ExtractError::unsupported("enum", "enumeration declares no values"));
    }
    Ok(Fragment::select(choices.iter().map(Fragment::literal)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALPHABET;
    use regex::Regex;

    fn anchored(pattern: &str) -> Regex {
        Regex::new(&format!("^(?:{})$", pattern)).unwrap()
    }

    #[test]
    fn test_string_pattern_default_alphabet() {
        let re = anchored(&string_pattern(DEFAULT_ALPHABET));
        assert!(re.is_match(r#""Jack""#));
        assert!(re.is_match(r#""""#));
        assert!(re.is_match(r#""a: b # [c], {d}""#));
        assert!(re.is_match(r#""say \"hi\" \\ ok""#));
        assert!(!re.is_match("Jack"));
        assert!(!re.is_match("\"two\nlines\""));
        assert!(!re.is_match(r#""unescaped " quote""#));
    }

    #[test]
    fn test_string_pattern_restricted_alphabet() {
        let re = anchored(&string_pattern("ab-]"));
        assert!(re.is_match(r#""ab-]a""#));
        assert!(!re.is_match(r#""abc""#));
    }

    #[test]
    fn test_string_pattern_ignores_quote_and_backslash() {
        assert_eq!(string_pattern("a\"\\"), string_pattern("a"));
        let re = anchored(&string_pattern(""));
        assert!(re.is_match(r#""\"\\""#));
        assert!(!re.is_match(r#""a""#));
    }

    #[test]
    fn test_number_patterns() {
        let integer = anchored(INTEGER_PATTERN);
        assert!(integer.is_match("30"));
        assert!(integer.is_match("007"));
        assert!(!integer.is_match("-3"));

        let float = anchored(FLOAT_PATTERN);
        assert!(float.is_match("-1.5"));
        assert!(float.is_match("0.25"));
        assert!(!float.is_match("1"));
        assert!(!float.is_match("1e5"));
        assert!(!float.is_match(".5"));
    }

    #[test]
    fn test_boolean_choice() {
        match compile_scalar(ScalarKind::Boolean, "") {
            Fragment::Select(alternatives) => {
                assert_eq!(alternatives[0], Fragment::literal("true"));
                assert_eq!(alternatives[1], Fragment::literal("false"));
            }
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_enumeration() {
        let choices = vec!["pear".to_string(), "'two words'".to_string()];
        let fragment = compile_enumeration(&choices).unwrap();
        assert_eq!(fragment.to_string(), r#"( "pear" | "'two words'" )"#);
        assert!(compile_enumeration(&[]).is_err());
    }
}
