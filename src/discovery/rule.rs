//! Parser for the device rule strings USBGuard reports for present devices, e.g.
//!
//! ```text
//! allow id 1d6b:0002 serial "0000:00:14.0" name "xHCI Host Controller" with-interface 09:00:00
//! ```
//!
//! Grammar:
//!
//! ```text
//! rule      := [target] { attribute }
//! target    := "allow" | "block" | "reject" | "match"
//! attribute := key [operator] value
//! operator  := "all-of" | "one-of" | "none-of" | "equals" | "equals-ordered" | "match-all"
//! value     := quoted | bare | "{" { quoted | bare } "}"
//! ```

use std::iter::Peekable;
use std::str::Chars;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static DEVICE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-fA-F]{4}):([0-9a-fA-F]{4})$").expect("valid regex"));

const SET_OPERATORS: [&str; 6] = [
    "all-of",
    "one-of",
    "none-of",
    "equals",
    "equals-ordered",
    "match-all",
];

/// Failure to parse a rule string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("unterminated quoted string")]
    UnterminatedString,

    #[error("unterminated attribute set")]
    UnterminatedSet,

    #[error("attribute {0} has no value")]
    MissingValue(String),

    #[error("expected an attribute name, found {0:?}")]
    UnexpectedToken(String),

    #[error("invalid escape sequence in quoted string")]
    InvalidEscape,

    #[error("invalid device id {0:?}, expected VVVV:PPPP")]
    InvalidId(String),
}

/// The policy target a rule starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Allow,
    Block,
    Reject,
    Match,
}

impl RuleTarget {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "allow" => Some(RuleTarget::Allow),
            "block" => Some(RuleTarget::Block),
            "reject" => Some(RuleTarget::Reject),
            "match" => Some(RuleTarget::Match),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleTarget::Allow => "allow",
            RuleTarget::Block => "block",
            RuleTarget::Reject => "reject",
            RuleTarget::Match => "match",
        }
    }
}

/// Structured content of one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRule {
    pub target: Option<RuleTarget>,
    /// Vendor and product id.
    pub id: Option<(String, String)>,
    pub name: Option<String>,
    pub serial: Option<String>,
    /// Every other attribute, in rule order. Sets are rendered as `{ a b }`.
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, RuleParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push(Token::Open);
            }
            '}' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' => {
                chars.next();
                tokens.push(Token::Quoted(quoted(&mut chars)?));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '}' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

/// Reads the rest of a quoted string; the opening quote is already consumed.
fn quoted(chars: &mut Peekable<Chars<'_>>) -> Result<String, RuleParseError> {
    let mut bytes = Vec::new();
    loop {
        match chars.next() {
            None => return Err(RuleParseError::UnterminatedString),
            Some('"') => break,
            Some('\\') => match chars.next() {
                None => return Err(RuleParseError::UnterminatedString),
                Some(c @ ('"' | '\\')) => bytes.push(c as u8),
                Some('n') => bytes.push(b'\n'),
                Some('t') => bytes.push(b'\t'),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let byte = (hex.len() == 2)
                        .then(|| u8::from_str_radix(&hex, 16).ok())
                        .flatten()
                        .ok_or(RuleParseError::InvalidEscape)?;
                    bytes.push(byte);
                }
                Some(_) => return Err(RuleParseError::InvalidEscape),
            },
            Some(c) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses a rule string into its target, identity fields and remaining attributes.
pub fn parse_rule(input: &str) -> Result<ParsedRule, RuleParseError> {
    let mut tokens = tokenize(input)?.into_iter().peekable();
    let mut rule = ParsedRule::default();

    if let Some(Token::Word(word)) = tokens.peek() {
        if let Some(target) = RuleTarget::from_keyword(word) {
            rule.target = Some(target);
            tokens.next();
        }
    }

    while let Some(token) = tokens.next() {
        let key = match token {
            Token::Word(key) => key,
            Token::Quoted(s) => return Err(RuleParseError::UnexpectedToken(s)),
            Token::Open => return Err(RuleParseError::UnexpectedToken("{".to_string())),
            Token::Close => return Err(RuleParseError::UnexpectedToken("}".to_string())),
        };

        if let Some(Token::Word(op)) = tokens.peek() {
            if SET_OPERATORS.contains(&op.as_str()) {
                tokens.next();
            }
        }

        let value = match tokens.next() {
            Some(Token::Word(v) | Token::Quoted(v)) => v,
            Some(Token::Open) => {
                let mut items = Vec::new();
                loop {
                    match tokens.next() {
                        Some(Token::Word(v) | Token::Quoted(v)) => items.push(v),
                        Some(Token::Close) => break,
                        Some(Token::Open) | None => return Err(RuleParseError::UnterminatedSet),
                    }
                }
                format!("{{ {} }}", items.join(" "))
            }
            Some(Token::Close) | None => return Err(RuleParseError::MissingValue(key)),
        };

        match key.as_str() {
            "id" => {
                let captures = DEVICE_ID
                    .captures(&value)
                    .ok_or_else(|| RuleParseError::InvalidId(value.clone()))?;
                rule.id = Some((captures[1].to_string(), captures[2].to_string()));
            }
            "name" => rule.name = Some(value),
            "serial" => rule.serial = Some(value),
            _ => rule.attributes.push((key, value)),
        }
    }

    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usbguard_device_rule() {
        let rule = parse_rule(
            r#"allow id 1d6b:0002 serial "0000:00:14.0" name "xHCI Host Controller" hash "jEP/6WzviqdJ5VSeTUY8PatCNBKeaREvo2OqdplND/o=" parent-hash "rV9bfLq7c2eA4tYjVjwO4bxhm+y6GgZpl9J60L0fBkY=" with-interface 09:00:00 with-connect-type """#,
        )
        .unwrap();

        assert_eq!(rule.target, Some(RuleTarget::Allow));
        assert_eq!(rule.id, Some(("1d6b".to_string(), "0002".to_string())));
        assert_eq!(rule.serial.as_deref(), Some("0000:00:14.0"));
        assert_eq!(rule.name.as_deref(), Some("xHCI Host Controller"));
        assert_eq!(
            rule.attributes,
            vec![
                ("hash".to_string(), "jEP/6WzviqdJ5VSeTUY8PatCNBKeaREvo2OqdplND/o=".to_string()),
                ("parent-hash".to_string(), "rV9bfLq7c2eA4tYjVjwO4bxhm+y6GgZpl9J60L0fBkY=".to_string()),
                ("with-interface".to_string(), "09:00:00".to_string()),
                ("with-connect-type".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_interface_sets() {
        let rule =
            parse_rule("block id 048d:1234 with-interface one-of { 08:06:50 08:06:62 }").unwrap();
        assert_eq!(rule.target, Some(RuleTarget::Block));
        assert_eq!(
            rule.attributes,
            vec![("with-interface".to_string(), "{ 08:06:50 08:06:62 }".to_string())]
        );
    }

    #[test]
    fn test_escapes_in_quoted_strings() {
        let rule = parse_rule(r#"name "Say \"hi\" \\ \x41\x42" serial "a\x0ab""#).unwrap();
        assert_eq!(rule.target, None);
        assert_eq!(rule.name.as_deref(), Some(r#"Say "hi" \ AB"#));
        assert_eq!(rule.serial.as_deref(), Some("a\nb"));
    }

    #[test]
    fn test_rule_without_identity() {
        let rule = parse_rule("allow").unwrap();
        assert_eq!(rule.target, Some(RuleTarget::Allow));
        assert_eq!(rule.id, None);
        assert_eq!(parse_rule("").unwrap(), ParsedRule::default());
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(
            parse_rule(r#"allow name "open"#),
            Err(RuleParseError::UnterminatedString)
        );
        assert_eq!(
            parse_rule("allow with-interface { 08:06:50"),
            Err(RuleParseError::UnterminatedSet)
        );
        assert_eq!(
            parse_rule("allow serial"),
            Err(RuleParseError::MissingValue("serial".to_string()))
        );
        assert_eq!(
            parse_rule("allow id 1d6b:*"),
            Err(RuleParseError::InvalidId("1d6b:*".to_string()))
        );
        assert_eq!(
            parse_rule(r#"name "bad \q escape""#),
            Err(RuleParseError::InvalidEscape)
        );
        assert_eq!(
            parse_rule(r#"name "bad \xZZ""#),
            Err(RuleParseError::InvalidEscape)
        );
        assert_eq!(
            parse_rule(r#"allow "floating""#),
            Err(RuleParseError::UnexpectedToken("floating".to_string()))
        );
    }
}
