//! Primitive setting value types

use serde_json::Value;

/// The primitive type a textual setting value parses into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    String,
    Json,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Json => "json",
        }
    }
}

/// A type a setting can hold.
///
/// Overrides travel as text; `parse_value` and `render_value` convert between
/// the text form and the typed value. `to_json` feeds constraint validation.
pub trait SettingValue: Sized + Send + Sync + 'static {
    const KIND: ValueKind;

    fn parse_value(text: &str) -> Result<Self, String>;

    fn render_value(&self) -> String;

    fn to_json(&self) -> Value;
}

impl SettingValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn parse_value(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if text.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(format!("expected true or false, got '{}'", text))
        }
    }

    fn render_value(&self) -> String {
        self.to_string()
    }

    fn to_json(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! integer_setting_value {
    ($($ty:ty),+) => {
        $(
            impl SettingValue for $ty {
                const KIND: ValueKind = ValueKind::Integer;

                fn parse_value(text: &str) -> Result<Self, String> {
                    text.trim().parse::<$ty>().map_err(|e| e.to_string())
                }

                fn render_value(&self) -> String {
                    self.to_string()
                }

                fn to_json(&self) -> Value {
                    Value::from(*self)
                }
            }
        )+
    };
}

integer_setting_value!(i32, i64, u16, u32, u64, usize);

impl SettingValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn parse_value(text: &str) -> Result<Self, String> {
        let value = text.trim().parse::<f64>().map_err(|e| e.to_string())?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("'{}' is not a finite number", text.trim()))
        }
    }

    fn render_value(&self) -> String {
        self.to_string()
    }

    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl SettingValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn parse_value(text: &str) -> Result<Self, String> {
        Ok(text.to_string())
    }

    fn render_value(&self) -> String {
        self.clone()
    }

    fn to_json(&self) -> Value {
        Value::String(self.clone())
    }
}

impl SettingValue for Value {
    const KIND: ValueKind = ValueKind::Json;

    fn parse_value(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    fn render_value(&self) -> String {
        self.to_string()
    }

    fn to_json(&self) -> Value {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_accepts_any_case() {
        assert_eq!(bool::parse_value("True"), Ok(true));
        assert_eq!(bool::parse_value("FALSE"), Ok(false));
        assert!(bool::parse_value("yes").is_err());
    }

    #[test]
    fn test_integers_reject_garbage_and_overflow() {
        assert_eq!(u16::parse_value(" 8080 "), Ok(8080));
        assert!(u16::parse_value("70000").is_err());
        assert!(i64::parse_value("12abc").is_err());
    }

    #[test]
    fn test_float_rejects_non_finite() {
        assert_eq!(f64::parse_value("0.25"), Ok(0.25));
        assert!(f64::parse_value("NaN").is_err());
        assert!(f64::parse_value("inf").is_err());
    }

    #[test]
    fn test_json_values_parse_documents() {
        let value = Value::parse_value(r#"{"retries": 3}"#).unwrap();
        assert_eq!(value["retries"], 3);
        assert!(Value::parse_value("{oops").is_err());
        assert_eq!(Value::KIND.as_str(), "json");
    }
}
