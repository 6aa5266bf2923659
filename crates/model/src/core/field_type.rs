//! Parses the source resource's field-type notation, e.g.
//! `"string|required|maxlength:50"`, into a dialect-agnostic [`FieldType`].
//!
//! Base types are forward-compatible: an unrecognised base token is kept as
//! [`BaseType::Unknown`] rather than rejected, per spec (§4.2 edge cases).

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseType {
    String,
    Number,
    Boolean,
    Object,
    Json,
    Array,
    Embedding,
    Ip4,
    Ip6,
    Secret,
    Uuid,
    Date,
    DateTime,
    Unknown(String),
}

impl BaseType {
    fn parse(token: &str) -> BaseType {
        match token {
            "string" => BaseType::String,
            "number" => BaseType::Number,
            "boolean" => BaseType::Boolean,
            "object" => BaseType::Object,
            "json" => BaseType::Json,
            "array" => BaseType::Array,
            "embedding" => BaseType::Embedding,
            "ip4" => BaseType::Ip4,
            "ip6" => BaseType::Ip6,
            "secret" => BaseType::Secret,
            "uuid" => BaseType::Uuid,
            "date" => BaseType::Date,
            "datetime" => BaseType::DateTime,
            other => BaseType::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    pub base: BaseType,
    pub required: bool,
    pub max_length: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub length: Option<u64>,
}

impl FieldType {
    /// Parse pipe-separated notation: `base|flag|key:value...`.
    /// Unknown tokens (neither a recognised flag nor a `key:value` pair) are
    /// ignored, keeping the parser forward-compatible with future flags.
    pub fn parse(notation: &str) -> FieldType {
        let mut parts = notation.split('|');
        let base = parts.next().map(str::trim).unwrap_or("").to_ascii_lowercase();
        let base = BaseType::parse(&base);

        let mut field = FieldType {
            base,
            required: false,
            max_length: None,
            min: None,
            max: None,
            length: None,
        };

        for token in parts {
            let token = token.trim();
            if token.eq_ignore_ascii_case("required") {
                field.required = true;
                continue;
            }
            if let Some((key, value)) = token.split_once(':') {
                let key = key.trim().to_ascii_lowercase();
                match key.as_str() {
                    "maxlength" => field.max_length = value.trim().parse().ok(),
                    "min" => field.min = value.trim().parse().ok(),
                    "max" => field.max = value.trim().parse().ok(),
                    "length" => field.length = value.trim().parse().ok(),
                    _ => {} // forward-compatible: unknown key:value ignored
                }
            }
            // unrecognised bare token: ignored
        }

        field
    }

    /// Accepts the structured-config form `{"type": "string", "required":
    /// true, "maxlength": 50}` as an alternative to the pipe notation.
    pub fn from_json(value: &Json) -> Option<FieldType> {
        if let Json::String(s) = value {
            return Some(FieldType::parse(s));
        }

        let obj = value.as_object()?;
        let base = obj.get("type")?.as_str()?;
        let base = BaseType::parse(&base.to_ascii_lowercase());

        Some(FieldType {
            base,
            required: obj.get("required").and_then(Json::as_bool).unwrap_or(false),
            max_length: obj.get("maxlength").and_then(Json::as_u64),
            min: obj.get("min").and_then(Json::as_f64),
            max: obj.get("max").and_then(Json::as_f64),
            length: obj.get("length").and_then(Json::as_u64),
        })
    }

    /// `true` when both bounds are present and fall within a 32-bit signed
    /// integer range (spec: "number (bounded 0..2^31-1)").
    pub fn is_bounded_integer(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => {
                min >= 0.0 && max <= i32::MAX as f64 && min.fract() == 0.0 && max.fract() == 0.0
            }
            _ => false,
        }
    }

    /// Round-trips back to pipe notation, used by tests and by drivers that
    /// persist the resolved type alongside diagnostics.
    pub fn format(&self) -> String {
        let base = match &self.base {
            BaseType::String => "string",
            BaseType::Number => "number",
            BaseType::Boolean => "boolean",
            BaseType::Object => "object",
            BaseType::Json => "json",
            BaseType::Array => "array",
            BaseType::Embedding => "embedding",
            BaseType::Ip4 => "ip4",
            BaseType::Ip6 => "ip6",
            BaseType::Secret => "secret",
            BaseType::Uuid => "uuid",
            BaseType::Date => "date",
            BaseType::DateTime => "datetime",
            BaseType::Unknown(s) => s.as_str(),
        };
        let mut out = base.to_string();
        if self.required {
            out.push_str("|required");
        }
        if let Some(v) = self.max_length {
            out.push_str(&format!("|maxlength:{v}"));
        }
        if let Some(v) = self.min {
            out.push_str(&format!("|min:{v}"));
        }
        if let Some(v) = self.max {
            out.push_str(&format!("|max:{v}"));
        }
        if let Some(v) = self.length {
            out.push_str(&format!("|length:{v}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_with_maxlength() {
        let ft = FieldType::parse("string|required|maxlength:200");
        assert_eq!(ft.base, BaseType::String);
        assert!(ft.required);
        assert_eq!(ft.max_length, Some(200));
    }

    #[test]
    fn parses_bounded_number() {
        let ft = FieldType::parse("number|min:0|max:100");
        assert_eq!(ft.base, BaseType::Number);
        assert!(ft.is_bounded_integer());
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let ft = FieldType::parse("string|something-future:yes");
        assert_eq!(ft.base, BaseType::String);
        assert!(!ft.required);
    }

    #[test]
    fn unknown_base_type_is_kept_forward_compatible() {
        let ft = FieldType::parse("vectorblob|required");
        assert_eq!(ft.base, BaseType::Unknown("vectorblob".into()));
        assert!(ft.required);
    }

    #[test]
    fn round_trip_parse_then_format() {
        let original = "string|required|maxlength:50";
        let ft = FieldType::parse(original);
        let reparsed = FieldType::parse(&ft.format());
        assert_eq!(ft, reparsed);
    }

    #[test]
    fn structured_json_form_is_equivalent_to_notation() {
        let json = serde_json::json!({"type": "number", "min": 0, "max": 120});
        let from_struct = FieldType::from_json(&json).unwrap();
        let from_notation = FieldType::parse("number|min:0|max:120");
        assert_eq!(from_struct, from_notation);
    }
}
