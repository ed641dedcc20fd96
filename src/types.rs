use std::fmt;

use crate::syntax::NULL_ARGUMENT;

/// Value produced by an action. Templates only ever see its text form,
/// except for lists, which expand into arrays.
#[derive(Clone, Debug, PartialEq)]
pub enum TemplateValue {
    String(String),
    Boolean(bool),
    Number(Number),
    List(Vec<TemplateValue>),
    Null,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

impl TemplateValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TemplateValue::Null)
    }

    /// Flattens the value into array elements: lists yield their items, every
    /// other value yields itself.
    pub fn into_elements(self) -> Vec<String> {
        match self {
            TemplateValue::List(items) => items.into_iter().map(|item| item.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::String(s) => write!(f, "{}", s),
            TemplateValue::Boolean(b) => write!(f, "{}", b),
            TemplateValue::Number(n) => write!(f, "{}", n),
            TemplateValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "{}", parts.join(";"))
            }
            TemplateValue::Null => write!(f, "{}", NULL_ARGUMENT),
        }
    }
}

// Generates `From` impls for plain Rust values
macro_rules! impl_template_value_conversion {
    ($variant:ident, $type:ty) => {
        impl From<$type> for TemplateValue {
            fn from(value: $type) -> Self {
                TemplateValue::$variant(value.into())
            }
        }
    };
}

macro_rules! impl_template_number_conversion {
    ($variant:ident, $type:ty) => {
        impl From<$type> for TemplateValue {
            fn from(value: $type) -> Self {
                TemplateValue::Number(Number::$variant(value.into()))
            }
        }
    };
}

impl_template_value_conversion!(String, String);
impl_template_value_conversion!(String, &str);
impl_template_value_conversion!(Boolean, bool);
impl_template_number_conversion!(Int, i64);
impl_template_number_conversion!(Int, i32);
impl_template_number_conversion!(Int, u32);
impl_template_number_conversion!(Float, f64);
impl_template_number_conversion!(Float, f32);

impl<T: Into<TemplateValue>> From<Vec<T>> for TemplateValue {
    fn from(values: Vec<T>) -> Self {
        TemplateValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TemplateValue>> From<Option<T>> for TemplateValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(TemplateValue::Null)
    }
}

impl From<serde_json::Value> for TemplateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TemplateValue::Null,
            serde_json::Value::Bool(b) => TemplateValue::Boolean(b),
            serde_json::Value::Number(number) => TemplateValue::Number(number.into()),
            serde_json::Value::String(s) => TemplateValue::String(s),
            serde_json::Value::Array(values) => {
                TemplateValue::List(values.into_iter().map(Into::into).collect())
            }
            // Objects have no template representation beyond their JSON text
            object @ serde_json::Value::Object(_) => TemplateValue::String(object.to_string()),
        }
    }
}

impl From<serde_json::Number> for Number {
    fn from(number: serde_json::Number) -> Self {
        match number.as_i64() {
            Some(i) => Number::Int(i),
            None => Number::Float(number.as_f64().unwrap_or(f64::NAN)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_convert() {
        let value: TemplateValue = json!(["a", 1, 2.5, null, true]).into();
        assert_eq!(value.into_elements(), vec!["a", "1", "2.5", "null", "true"]);
    }

    #[test]
    fn null_prints_as_null_argument() {
        assert_eq!(TemplateValue::from(None::<String>).to_string(), NULL_ARGUMENT);
    }
}
