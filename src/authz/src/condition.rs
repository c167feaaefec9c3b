//! Attribute conditions and their matcher
//!
//! A condition compares one field of a [`ResourceContext`] against a typed
//! value. Values are a closed set (null, bool, number, string, or a list of
//! those); anything else is rejected when parsed from the wire, and a context
//! field that cannot be represented makes the condition fail.
//!
//! | op         | holds when                                         |
//! |------------|----------------------------------------------------|
//! | `eq`       | context scalar equals value                        |
//! | `neq`      | context scalar differs from value                  |
//! | `in`       | value is a list containing the context scalar      |
//! | `nin`      | value is a list not containing the context scalar  |
//! | `includes` | context is a list containing the value scalar      |
//! | `excludes` | context is a list not containing the value scalar  |
//!
//! A missing field reads as `null`. A shape mismatch (list where a scalar is
//! expected or the reverse) fails every operator, negated ones included.

use crate::error::{AuthzError, Result};
use crate::types::ResourceContext;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Scalar condition operand
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Absent marker (JSON `null`, or a missing context field)
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Number(a), Scalar::Number(b)) => numbers_equal(a, b),
            (Scalar::String(a), Scalar::String(b)) => a == b,
            _ => false,
        }
    }
}

// 1 and 1.0 are the same number; integers compare exactly before falling back to f64.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

impl Scalar {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(Scalar::Number(n.clone())),
            Value::String(s) => Some(Scalar::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Compare against a context value in place
    fn matches_json(&self, value: &Value) -> bool {
        match (self, value) {
            (Scalar::Null, Value::Null) => true,
            (Scalar::Bool(a), Value::Bool(b)) => a == b,
            (Scalar::Number(a), Value::Number(b)) => numbers_equal(a, b),
            (Scalar::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.into())
    }
}

/// NaN and the infinities have no JSON form and are rejected
impl TryFrom<f64> for Scalar {
    type Error = AuthzError;

    fn try_from(value: f64) -> Result<Self> {
        Number::from_f64(value).map(Scalar::Number).ok_or_else(|| {
            AuthzError::InvalidInput(format!("condition value must be a finite number, got {}", value))
        })
    }
}

/// Typed condition value: a scalar or a flat list of scalars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl ConditionValue {
    /// The absent marker
    pub const NULL: ConditionValue = ConditionValue::Scalar(Scalar::Null);

    /// Build a list value
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        ConditionValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Convert a JSON value; objects and nested lists are not representable
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(Scalar::from_json)
                .collect::<Option<Vec<_>>>()
                .map(ConditionValue::List),
            other => Scalar::from_json(other).map(ConditionValue::Scalar),
        }
    }
}

impl From<Scalar> for ConditionValue {
    fn from(value: Scalar) -> Self {
        ConditionValue::Scalar(value)
    }
}

impl From<Vec<Scalar>> for ConditionValue {
    fn from(items: Vec<Scalar>) -> Self {
        ConditionValue::List(items)
    }
}

macro_rules! scalar_condition_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ConditionValue {
                fn from(value: $ty) -> Self {
                    ConditionValue::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_condition_value!(&str, String, bool, i32, i64);

impl TryFrom<f64> for ConditionValue {
    type Error = AuthzError;

    fn try_from(value: f64) -> Result<Self> {
        Scalar::try_from(value).map(ConditionValue::Scalar)
    }
}

/// Condition operator
///
/// Unknown operator strings are preserved so they survive a round trip, and
/// always evaluate to false.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionOp {
    Eq,
    Neq,
    In,
    Nin,
    Includes,
    Excludes,
    Unsupported(String),
}

impl From<String> for ConditionOp {
    fn from(value: String) -> Self {
        match value.as_str() {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "in" => Self::In,
            "nin" => Self::Nin,
            "includes" => Self::Includes,
            "excludes" => Self::Excludes,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<ConditionOp> for String {
    fn from(op: ConditionOp) -> Self {
        match op {
            ConditionOp::Eq => "eq".to_string(),
            ConditionOp::Neq => "neq".to_string(),
            ConditionOp::In => "in".to_string(),
            ConditionOp::Nin => "nin".to_string(),
            ConditionOp::Includes => "includes".to_string(),
            ConditionOp::Excludes => "excludes".to_string(),
            ConditionOp::Unsupported(raw) => raw,
        }
    }
}

/// Attribute predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: ConditionOp, value: impl Into<ConditionValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Self::new(field, ConditionOp::Eq, value)
    }

    /// Evaluate against a context record
    pub fn matches(&self, context: &ResourceContext) -> bool {
        match_condition(context, self)
    }
}

/// Evaluate one condition against a context record
pub fn match_condition(context: &ResourceContext, condition: &Condition) -> bool {
    let Some(actual) = Field::read(context.get(&condition.field)) else {
        return false;
    };
    let expected = &condition.value;

    match &condition.op {
        ConditionOp::Eq => compare(actual, expected).is_some_and(|same| same),
        ConditionOp::Neq => compare(actual, expected).is_some_and(|same| !same),
        ConditionOp::In => member_of(actual, expected) == Some(true),
        ConditionOp::Nin => member_of(actual, expected) == Some(false),
        ConditionOp::Includes => contains(actual, expected) == Some(true),
        ConditionOp::Excludes => contains(actual, expected) == Some(false),
        ConditionOp::Unsupported(_) => false,
    }
}

static ABSENT: Value = Value::Null;

/// Borrowed view of a context field
#[derive(Clone, Copy)]
enum Field<'a> {
    Scalar(&'a Value),
    List(&'a [Value]),
}

impl<'a> Field<'a> {
    /// `None` for objects and nested lists
    fn read(value: Option<&'a Value>) -> Option<Self> {
        match value {
            None => Some(Field::Scalar(&ABSENT)),
            Some(Value::Object(_)) => None,
            Some(Value::Array(items)) => items
                .iter()
                .all(|item| !matches!(item, Value::Array(_) | Value::Object(_)))
                .then_some(Field::List(items)),
            Some(scalar) => Some(Field::Scalar(scalar)),
        }
    }
}

/// `None` unless both sides are scalars
fn compare(actual: Field<'_>, expected: &ConditionValue) -> Option<bool> {
    match (actual, expected) {
        (Field::Scalar(value), ConditionValue::Scalar(s)) => Some(s.matches_json(value)),
        _ => None,
    }
}

/// Context scalar in a value list; `None` on any other shape
fn member_of(actual: Field<'_>, expected: &ConditionValue) -> Option<bool> {
    match (actual, expected) {
        (Field::Scalar(value), ConditionValue::List(items)) => Some(items.iter().any(|s| s.matches_json(value))),
        _ => None,
    }
}

/// Value scalar in a context list; `None` on any other shape
fn contains(actual: Field<'_>, expected: &ConditionValue) -> Option<bool> {
    match (actual, expected) {
        (Field::List(values), ConditionValue::Scalar(s)) => Some(values.iter().any(|v| s.matches_json(v))),
        _ => None,
    }
}
