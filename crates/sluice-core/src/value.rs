//! Dynamically typed port values.
//!
//! Cables carry either an event alone or an event together with a
//! [`PortValue`]. Values are deliberately small and self-describing so they can
//! be set from the control interface as JSON, stored as constants in
//! composition files, and summarized for telemetry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value held by a data-carrying port.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    /// No value. Event-only ports always hold this.
    #[default]
    None,
    /// Boolean value.
    Boolean(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Ordered list of values.
    List(Vec<PortValue>),
}

impl PortValue {
    /// Returns `true` for [`PortValue::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the boolean, if this is a [`PortValue::Boolean`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is a [`PortValue::Integer`].
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a real number; integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(r) => Some(*r),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the text, if this is a [`PortValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items, if this is a [`PortValue::List`].
    pub fn as_list(&self) -> Option<&[PortValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }

    /// Human-readable description, truncated to at most `max_len` characters.
    ///
    /// Used for the `summary` field of port telemetry.
    pub fn summary(&self, max_len: usize) -> String {
        let full = match self {
            Self::List(items) => match items.len() {
                0 => "empty list".to_string(),
                1 => format!("list containing 1 item: {}", self_description(&items[0])),
                n => {
                    let shown: Vec<String> = items.iter().take(4).map(self_description).collect();
                    let more = if n > 4 { ", …" } else { "" };
                    format!("list containing {n} items: {}{more}", shown.join(", "))
                }
            },
            other => self_description(other),
        };
        truncate(full, max_len)
    }
}

fn self_description(value: &PortValue) -> String {
    match value {
        PortValue::None => "(none)".to_string(),
        PortValue::Text(s) => format!("\"{s}\""),
        PortValue::List(items) => format!("list of {}", items.len()),
        other => other.to_string(),
    }
}

fn truncate(s: String, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s;
    }
    let mut out: String = s.chars().take(max_len.saturating_sub(1)).collect();
    out.push('…');
    out
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for PortValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PortValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for PortValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for PortValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for PortValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PortValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<PortValue>> for PortValue {
    fn from(value: Vec<PortValue>) -> Self {
        Self::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(PortValue::from(3).as_integer(), Some(3));
        assert_eq!(PortValue::from(3).as_real(), Some(3.0));
        assert_eq!(PortValue::from(2.5).as_integer(), None);
        assert_eq!(PortValue::from(true).as_bool(), Some(true));
        assert_eq!(PortValue::from("hi").as_text(), Some("hi"));
        assert!(PortValue::default().is_none());
    }

    #[test]
    fn test_json_untagged() {
        let v: PortValue = serde_json::from_str("[1, 2.5, \"x\", true, null]").unwrap();
        assert_eq!(
            v,
            PortValue::List(vec![
                PortValue::Integer(1),
                PortValue::Real(2.5),
                PortValue::Text("x".into()),
                PortValue::Boolean(true),
                PortValue::None,
            ])
        );
        assert_eq!(serde_json::to_string(&PortValue::Integer(7)).unwrap(), "7");
    }

    #[test]
    fn test_summary_scalars() {
        assert_eq!(PortValue::Integer(42).summary(64), "42");
        assert_eq!(PortValue::Text("hello".into()).summary(64), "\"hello\"");
        assert_eq!(PortValue::None.summary(64), "(none)");
    }

    #[test]
    fn test_summary_list() {
        let list = PortValue::List((1..=6).map(PortValue::Integer).collect());
        assert_eq!(list.summary(100), "list containing 6 items: 1, 2, 3, 4, …");
        assert_eq!(PortValue::List(vec![]).summary(100), "empty list");
    }

    #[test]
    fn test_summary_truncates() {
        let long = PortValue::Text("abcdefghijklmnopqrstuvwxyz".into());
        let s = long.summary(10);
        assert_eq!(s.chars().count(), 10);
        assert!(s.ends_with('…'));
    }
}
