use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

/// Value kinds a field can be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownType {
    String,
    Number,
    Boolean,
    Object,
    /// A string that is removed from the environment once read
    #[serde(alias = "hash")]
    Secret,
}

/// Reason a value was rejected by [`KnownType::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub expected: KnownType,
    pub found: &'static str,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = match self.expected {
            KnownType::Secret => KnownType::String,
            other => other,
        };
        write!(f, "Expected {} but got {}", expected, self.found)
    }
}

/// Name of the runtime type of a value, as used in mismatch reasons
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Object(_) | Value::Array(_) => "object",
        Value::Null => "null",
    }
}

impl KnownType {
    /// Value assigned to optional fields that are absent from the environment
    pub fn default_value(self) -> Value {
        match self {
            Self::String | Self::Secret => Value::String(String::new()),
            Self::Number => Value::from(0),
            Self::Boolean => Value::Bool(false),
            Self::Object => Value::Object(Map::new()),
        }
    }

    /// Check that a value has the runtime type this kind expects
    pub fn validate(self, value: &Value) -> Result<(), TypeMismatch> {
        let ok = match self {
            Self::String | Self::Secret => value.is_string(),
            // serde_json cannot hold NaN, so any number is acceptable
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object() || value.is_array(),
        };

        if ok {
            Ok(())
        } else {
            Err(TypeMismatch {
                expected: self,
                found: type_name(value),
            })
        }
    }

    /// Convert one element of a separator-delimited value.
    ///
    /// Numbers that fail to parse are kept as strings so that validation can
    /// report them. Only object parsing can fail here; the error is the JSON
    /// parser's message.
    pub fn coerce(self, raw: &str) -> Result<Value, String> {
        match self {
            Self::String | Self::Secret => Ok(Value::String(raw.to_string())),
            Self::Number => Ok(parse_int_prefix(raw).unwrap_or_else(|| Value::String(raw.to_string()))),
            Self::Boolean => Ok(Value::Bool(raw.eq_ignore_ascii_case("true"))),
            Self::Object => serde_json::from_str(raw).map_err(|e| e.to_string()),
        }
    }

    /// Whether reading this kind always removes the variable afterwards
    pub fn forces_unset(self) -> bool {
        matches!(self, Self::Secret)
    }
}

/// Base-10 integer parse of the longest `[+-]digits` prefix, `None` without digits
fn parse_int_prefix(raw: &str) -> Option<Value> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let digits = &rest[..digits_len];

    let value = match digits.parse::<i64>() {
        Ok(n) => Value::from(if negative { -n } else { n }),
        // Too large for i64, fall back to a float like an arbitrary-precision parse would round
        Err(_) => {
            let n: f64 = digits.parse().ok()?;
            Value::from(if negative { -n } else { n })
        }
    };
    Some(value)
}

impl FromStr for KnownType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "object" => Ok(Self::Object),
            "secret" | "hash" => Ok(Self::Secret),
            _ => Err(ConfigError::InvalidKind {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for KnownType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Object => write!(f, "object"),
            Self::Secret => write!(f, "secret"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kinds() {
        assert_eq!("string".parse::<KnownType>().unwrap(), KnownType::String);
        assert_eq!("number".parse::<KnownType>().unwrap(), KnownType::Number);
        assert_eq!("boolean".parse::<KnownType>().unwrap(), KnownType::Boolean);
        assert_eq!("object".parse::<KnownType>().unwrap(), KnownType::Object);
        assert_eq!("secret".parse::<KnownType>().unwrap(), KnownType::Secret);
    }

    #[test]
    fn test_parse_hash_alias() {
        let kind: KnownType = "hash".parse().unwrap();
        assert_eq!(kind, KnownType::Secret);
    }

    #[test]
    fn test_parse_invalid() {
        let result: Result<KnownType, ConfigError> = "date".parse();

        match result {
            Err(ConfigError::InvalidKind { name }) => assert_eq!(name, "date"),
            other => panic!("Expected InvalidKind error, got {:?}", other),
        }
        assert_eq!(
            "date".parse::<KnownType>().unwrap_err().to_string(),
            "Invalid type date"
        );
    }

    #[test]
    fn test_display_roundtrips_names() {
        for kind in [
            KnownType::String,
            KnownType::Number,
            KnownType::Boolean,
            KnownType::Object,
            KnownType::Secret,
        ] {
            assert_eq!(kind.to_string().parse::<KnownType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_default_values() {
        assert_eq!(KnownType::String.default_value(), json!(""));
        assert_eq!(KnownType::Secret.default_value(), json!(""));
        assert_eq!(KnownType::Number.default_value(), json!(0));
        assert_eq!(KnownType::Boolean.default_value(), json!(false));
        assert_eq!(KnownType::Object.default_value(), json!({}));
    }

    #[test]
    fn test_validate_accepts_matching_values() {
        assert!(KnownType::String.validate(&json!("x")).is_ok());
        assert!(KnownType::Secret.validate(&json!("x")).is_ok());
        assert!(KnownType::Number.validate(&json!(1.5)).is_ok());
        assert!(KnownType::Boolean.validate(&json!(true)).is_ok());
        assert!(KnownType::Object.validate(&json!({"a": 1})).is_ok());
        assert!(KnownType::Object.validate(&json!([1, 2])).is_ok());
    }

    #[test]
    fn test_validate_reports_runtime_type() {
        let err = KnownType::Number.validate(&json!("two")).unwrap_err();
        assert_eq!(err.to_string(), "Expected number but got string");

        let err = KnownType::Boolean.validate(&json!(1)).unwrap_err();
        assert_eq!(err.to_string(), "Expected boolean but got number");

        let err = KnownType::Object.validate(&json!(null)).unwrap_err();
        assert_eq!(err.to_string(), "Expected object but got null");

        let err = KnownType::String.validate(&json!({"a": 1})).unwrap_err();
        assert_eq!(err.to_string(), "Expected string but got object");
    }

    #[test]
    fn test_secret_mismatch_reads_as_string() {
        let err = KnownType::Secret.validate(&json!(42)).unwrap_err();
        assert_eq!(err.to_string(), "Expected string but got number");
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(KnownType::Number.coerce("42").unwrap(), json!(42));
        assert_eq!(KnownType::Number.coerce("-7").unwrap(), json!(-7));
        assert_eq!(KnownType::Number.coerce("12abc").unwrap(), json!(12));
        assert_eq!(KnownType::Number.coerce("3.9").unwrap(), json!(3));
        assert_eq!(KnownType::Number.coerce("two").unwrap(), json!("two"));
        assert_eq!(KnownType::Number.coerce("").unwrap(), json!(""));
        assert_eq!(KnownType::Number.coerce("-").unwrap(), json!("-"));
    }

    #[test]
    fn test_coerce_boolean_is_case_insensitive() {
        assert_eq!(KnownType::Boolean.coerce("TRUE").unwrap(), json!(true));
        assert_eq!(KnownType::Boolean.coerce("True").unwrap(), json!(true));
        assert_eq!(KnownType::Boolean.coerce("yes").unwrap(), json!(false));
        assert_eq!(KnownType::Boolean.coerce("1").unwrap(), json!(false));
    }

    #[test]
    fn test_coerce_string_keeps_raw() {
        assert_eq!(KnownType::String.coerce("123").unwrap(), json!("123"));
        assert_eq!(KnownType::Secret.coerce("s3cr3t").unwrap(), json!("s3cr3t"));
    }

    #[test]
    fn test_coerce_object() {
        assert_eq!(
            KnownType::Object.coerce(r#"{"a":1}"#).unwrap(),
            json!({"a": 1})
        );
        assert!(KnownType::Object.coerce("{oops").is_err());
    }

    #[test]
    fn test_forces_unset() {
        assert!(KnownType::Secret.forces_unset());
        assert!(!KnownType::String.forces_unset());
    }
}
