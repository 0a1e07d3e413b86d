//! Runtime values of the predicate language.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::Arc;

use super::budget::Meter;
use super::error::Fault;

/// A predicate-language value. Strings and lists are reference counted so
/// that binding `content` or a loop variable never copies the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<[Value]>),
}

/// Numeric view of a value; `bool` participates as 0/1.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(x) => x,
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::from(items))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    pub(crate) fn as_num(&self) -> Option<Num> {
        match self {
            Value::Bool(b) => Some(Num::Int(*b as i64)),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(x) => Some(Num::Float(*x)),
            _ => None,
        }
    }

    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Approximate bytes a freshly built value of this shape occupies.
    pub(crate) fn footprint(&self) -> u64 {
        match self {
            Value::Str(s) => 16 + s.len() as u64,
            Value::List(items) => 16 + 16 * items.len() as u64,
            _ => 16,
        }
    }

    /// `str(value)`.
    pub fn to_display(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.repr(),
        }
    }

    /// `repr(value)`.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => float_repr(*x),
            Value::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                push_str_repr(&mut out, s);
                out
            }
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }

    /// [`to_display`](Self::to_display) under the meter. Each chunk is
    /// accounted for before it is written, so a rendering that would
    /// outgrow the ceiling stops there instead of being built first.
    pub(crate) fn to_display_metered(&self, meter: &mut Meter) -> Result<String, Fault> {
        match self {
            Value::Str(s) => {
                meter.allocate(s.len() as u64)?;
                Ok(s.to_string())
            }
            other => {
                let mut out = String::new();
                other.write_repr(&mut out, meter)?;
                Ok(out)
            }
        }
    }

    fn write_repr(&self, out: &mut String, meter: &mut Meter) -> Result<(), Fault> {
        match self {
            Value::Str(s) => {
                let quoted = s.len() + 2;
                meter.allocate(quoted as u64)?;
                let before = out.len();
                push_str_repr(out, s);
                // Escapes can widen the text past the up-front charge.
                let escaped = (out.len() - before).saturating_sub(quoted);
                if escaped > 0 {
                    meter.allocate(escaped as u64)?;
                }
            }
            Value::List(items) => {
                meter.allocate(2)?;
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    meter.step()?;
                    if i > 0 {
                        meter.allocate(2)?;
                        out.push_str(", ");
                    }
                    item.write_repr(out, meter)?;
                }
                out.push(']');
            }
            scalar => {
                let text = scalar.repr();
                meter.allocate(text.len() as u64)?;
                out.push_str(&text);
            }
        }
        Ok(())
    }
}

/// Quoted, escaped rendering of a string for error messages, cut after
/// `max_chars` characters.
pub(crate) fn short_repr(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + 5);
            push_str_repr(&mut out, &s[..cut]);
            out.push_str("...");
            out
        }
        None => {
            let mut out = String::with_capacity(s.len() + 2);
            push_str_repr(&mut out, s);
            out
        }
    }
}

fn push_str_repr(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn float_repr(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// `a == b` with numeric cross-type equality; mismatched types are unequal.
pub(crate) fn py_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| py_eq(p, q))
        }
        _ => match (a.as_num(), b.as_num()) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => false,
        },
    }
}

/// Ordering for `<`, `min`, `sorted`. `Ok(None)` means unordered (NaN);
/// mismatched types are a runtime fault.
pub(crate) fn py_order(a: &Value, b: &Value) -> Result<Option<Ordering>, Fault> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
        (Value::List(x), Value::List(y)) => {
            for (p, q) in x.iter().zip(y.iter()) {
                if !py_eq(p, q) {
                    return py_order(p, q);
                }
            }
            Ok(Some(x.len().cmp(&y.len())))
        }
        _ => match (a.as_num(), b.as_num()) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(Some(x.cmp(&y))),
            (Some(x), Some(y)) => Ok(x.as_f64().partial_cmp(&y.as_f64())),
            _ => Err(Fault::runtime(format!(
                "ordering not supported between '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}
