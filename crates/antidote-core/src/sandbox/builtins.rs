//! Allow-listed operators, functions, string methods and regex entry points.
//!
//! Every operation charges the meter for the work it does, and accounts
//! for derived allocations before making them.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::predicate::ast::{BinOp, Builtin, CmpOp, Method, RegexLiteral, RegexOp, UnaryOp};

use super::budget::Meter;
use super::error::Fault;
use super::value::{py_eq, py_order, short_repr, Num, Value};

pub(crate) type EvalResult = Result<Value, Fault>;

/// Characters of an offending string quoted in conversion errors.
const ERROR_EXCERPT_CHARS: usize = 40;

fn overflow() -> Fault {
    Fault::runtime("integer overflow")
}

fn division_by_zero() -> Fault {
    Fault::runtime("division by zero")
}

fn not_iterable(v: &Value) -> Fault {
    Fault::runtime(format!("'{}' object is not iterable", v.type_name()))
}

// ---- operators ----

pub(crate) fn unary(op: UnaryOp, v: Value) -> EvalResult {
    if op == UnaryOp::Not {
        return Ok(Value::Bool(!v.truthy()));
    }
    match (op, v.as_num()) {
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Some(Num::Float(x))) => Ok(Value::Float(-x)),
        (_, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (_, Some(Num::Float(x))) => Ok(Value::Float(x)),
        (_, None) => Err(Fault::runtime(format!(
            "bad operand type for unary operator: '{}'",
            v.type_name()
        ))),
    }
}

pub(crate) fn binary(op: BinOp, a: Value, b: Value, meter: &mut Meter) -> EvalResult {
    match (op, &a, &b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            meter.allocate((x.len() + y.len()) as u64)?;
            let mut out = String::with_capacity(x.len() + y.len());
            out.push_str(x);
            out.push_str(y);
            return Ok(Value::Str(out.into()));
        }
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            meter.allocate(16 * (x.len() + y.len()) as u64)?;
            return Ok(Value::list(x.iter().chain(y.iter()).cloned().collect()));
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_int().is_some() => {
            let times = n.as_int().unwrap_or(0).max(0) as u64;
            if s.is_empty() || times == 0 {
                return Ok(Value::str(""));
            }
            meter.allocate((s.len() as u64).saturating_mul(times))?;
            return Ok(Value::Str(s.repeat(times as usize).into()));
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items))
            if n.as_int().is_some() =>
        {
            let times = n.as_int().unwrap_or(0).max(0) as u64;
            // An empty list repeated any number of times is empty; the
            // ceiling alone would let a huge count through here.
            if items.is_empty() || times == 0 {
                return Ok(Value::list(Vec::new()));
            }
            meter.allocate((16 * items.len() as u64).saturating_mul(times))?;
            meter.charge(times)?;
            let mut out = Vec::with_capacity(items.len() * times as usize);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            return Ok(Value::list(out));
        }
        _ => {}
    }
    match (a.as_num(), b.as_num()) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => int_arith(op, x, y),
        (Some(x), Some(y)) => float_arith(op, x.as_f64(), y.as_f64()),
        _ => Err(Fault::runtime(format!(
            "unsupported operand types for {}: '{}' and '{}'",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn int_arith(op: BinOp, x: i64, y: i64) -> EvalResult {
    let result = match op {
        BinOp::Add => x.checked_add(y),
        BinOp::Sub => x.checked_sub(y),
        BinOp::Mul => x.checked_mul(y),
        BinOp::Div => {
            if y == 0 {
                return Err(division_by_zero());
            }
            return Ok(Value::Float(x as f64 / y as f64));
        }
        // Python floors toward negative infinity.
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(division_by_zero());
            }
            x.checked_div(y)
                .map(|q| if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q })
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(division_by_zero());
            }
            x.checked_rem(y)
                .map(|r| if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        }
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn float_arith(op: BinOp, x: f64, y: f64) -> EvalResult {
    if y == 0.0 && matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod) {
        return Err(division_by_zero());
    }
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::FloorDiv => (x / y).floor(),
        BinOp::Mod => {
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
    };
    Ok(Value::Float(result))
}

pub(crate) fn compare(op: CmpOp, a: &Value, b: &Value, meter: &mut Meter) -> Result<bool, Fault> {
    Ok(match op {
        CmpOp::Eq => py_eq(a, b),
        CmpOp::NotEq => !py_eq(a, b),
        CmpOp::Lt => py_order(a, b)? == Some(Ordering::Less),
        CmpOp::Le => matches!(py_order(a, b)?, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => py_order(a, b)? == Some(Ordering::Greater),
        CmpOp::Ge => matches!(py_order(a, b)?, Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::In => contains(b, a, meter)?,
        CmpOp::NotIn => !contains(b, a, meter)?,
        CmpOp::Is => same_singleton(a, b),
        CmpOp::IsNot => !same_singleton(a, b),
    })
}

/// Identity for the only operands `is` accepts: None and the two bools.
fn same_singleton(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => false,
    }
}

fn contains(container: &Value, item: &Value, meter: &mut Meter) -> Result<bool, Fault> {
    match container {
        Value::Str(hay) => match item {
            Value::Str(needle) => {
                meter.scan(hay.len())?;
                Ok(hay.contains(&**needle))
            }
            other => Err(Fault::runtime(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => {
            meter.charge(items.len() as u64)?;
            Ok(items.iter().any(|v| py_eq(v, item)))
        }
        other => Err(Fault::runtime(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

// ---- indexing ----

fn char_len(s: &str) -> usize {
    if s.is_ascii() {
        s.len()
    } else {
        s.chars().count()
    }
}

pub(crate) fn char_value(c: char) -> Value {
    let mut buf = [0u8; 4];
    Value::str(c.encode_utf8(&mut buf))
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let j = if i < 0 { i + len } else { i };
    (0..len).contains(&j).then_some(j as usize)
}

pub(crate) fn index(target: &Value, index: &Value, meter: &mut Meter) -> EvalResult {
    let i = index.as_int().ok_or_else(|| {
        Fault::runtime(format!("indices must be integers, not {}", index.type_name()))
    })?;
    match target {
        Value::Str(s) => {
            meter.scan(s.len())?;
            let idx = normalize_index(i, char_len(s))
                .ok_or_else(|| Fault::runtime("string index out of range"))?;
            let c = if s.is_ascii() {
                s.as_bytes().get(idx).map(|b| *b as char)
            } else {
                s.chars().nth(idx)
            };
            c.map(char_value)
                .ok_or_else(|| Fault::runtime("string index out of range"))
        }
        Value::List(items) => {
            let idx = normalize_index(i, items.len())
                .ok_or_else(|| Fault::runtime("list index out of range"))?;
            Ok(items[idx].clone())
        }
        other => Err(Fault::runtime(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn slice_bound(v: Option<&Value>) -> Result<Option<i64>, Fault> {
    match v {
        None | Some(Value::None) => Ok(None),
        Some(v) => v
            .as_int()
            .map(Some)
            .ok_or_else(|| Fault::runtime("slice indices must be integers or None")),
    }
}

fn slice_range(len: usize, start: Option<i64>, stop: Option<i64>) -> (usize, usize) {
    let len_i = len as i64;
    let clamp = |v: i64| -> usize {
        let v = if v < 0 { v + len_i } else { v };
        v.clamp(0, len_i) as usize
    };
    let lo = start.map(clamp).unwrap_or(0);
    let hi = stop.map(clamp).unwrap_or(len);
    (lo, hi.max(lo))
}

/// Substring by character positions.
fn char_slice(s: &str, lo: usize, hi: usize) -> &str {
    if s.is_ascii() {
        return &s[lo..hi];
    }
    let mut offsets = s
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()));
    let start = offsets.nth(lo).unwrap_or(s.len());
    let end = if hi > lo {
        offsets.nth(hi - lo - 1).unwrap_or(s.len())
    } else {
        start
    };
    &s[start..end]
}

pub(crate) fn slice(
    target: &Value,
    start: Option<&Value>,
    stop: Option<&Value>,
    meter: &mut Meter,
) -> EvalResult {
    let (start, stop) = (slice_bound(start)?, slice_bound(stop)?);
    match target {
        Value::Str(s) => {
            meter.scan(s.len())?;
            let (lo, hi) = slice_range(char_len(s), start, stop);
            let piece = char_slice(s, lo, hi);
            meter.allocate(piece.len() as u64)?;
            Ok(Value::str(piece))
        }
        Value::List(items) => {
            let (lo, hi) = slice_range(items.len(), start, stop);
            meter.allocate(16 * (hi - lo) as u64)?;
            Ok(Value::list(items[lo..hi].to_vec()))
        }
        other => Err(Fault::runtime(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

// ---- functions ----

/// Materialize an iterable. Strings yield their characters.
pub(crate) fn elements(v: &Value, meter: &mut Meter) -> Result<Arc<[Value]>, Fault> {
    match v {
        Value::List(items) => Ok(items.clone()),
        Value::Str(s) => {
            meter.allocate((char_len(s) as u64).saturating_mul(24))?;
            Ok(s.chars().map(char_value).collect())
        }
        other => Err(not_iterable(other)),
    }
}

pub(crate) fn call(func: Builtin, args: Vec<Value>, meter: &mut Meter) -> EvalResult {
    match (func, args.as_slice()) {
        (Builtin::Len, [v]) => match v {
            Value::Str(s) => {
                meter.scan(s.len())?;
                Ok(Value::Int(char_len(s) as i64))
            }
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            other => Err(Fault::runtime(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        },
        (Builtin::Any, [v]) => {
            let items = elements(v, meter)?;
            Ok(Value::Bool(items.iter().any(Value::truthy)))
        }
        (Builtin::All, [v]) => {
            let items = elements(v, meter)?;
            Ok(Value::Bool(items.iter().all(Value::truthy)))
        }
        (Builtin::Sum, [v]) => sum(&elements(v, meter)?, Value::Int(0), meter),
        (Builtin::Sum, [v, start]) => sum(&elements(v, meter)?, start.clone(), meter),
        (Builtin::Min | Builtin::Max, [v]) => {
            let items = elements(v, meter)?;
            extreme(&items, func, meter)
        }
        (Builtin::Min | Builtin::Max, many) if many.len() > 1 => extreme(many, func, meter),
        (Builtin::Abs, [v]) => match v.as_num() {
            Some(Num::Int(i)) => i.checked_abs().map(Value::Int).ok_or_else(overflow),
            Some(Num::Float(x)) => Ok(Value::Float(x.abs())),
            None => Err(Fault::runtime(format!(
                "bad operand type for abs(): '{}'",
                v.type_name()
            ))),
        },
        (Builtin::Int, [v]) => to_int(v, meter),
        (Builtin::Float, [v]) => to_float(v, meter),
        (Builtin::Str, [Value::Str(s)]) => Ok(Value::Str(s.clone())),
        (Builtin::Str, [v]) => Ok(Value::Str(v.to_display_metered(meter)?.into())),
        (Builtin::Bool, [v]) => Ok(Value::Bool(v.truthy())),
        (Builtin::Ord, [Value::Str(s)]) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(c as i64)),
                _ => Err(Fault::runtime(format!(
                    "ord() expected a character, but string of length {} found",
                    char_len(s)
                ))),
            }
        }
        (Builtin::Set, [v]) => unique(&elements(v, meter)?, meter),
        (Builtin::Sorted, [v]) => sorted(&elements(v, meter)?, meter),
        (Builtin::List, [v]) => Ok(Value::List(elements(v, meter)?)),
        (Builtin::Count, [haystack, needle]) => match (haystack, needle) {
            (Value::Str(h), Value::Str(n)) => {
                meter.scan(h.len())?;
                Ok(Value::Int(count_occurrences(h, n) as i64))
            }
            (Value::List(items), n) => {
                meter.charge(items.len() as u64)?;
                Ok(Value::Int(items.iter().filter(|v| py_eq(v, n)).count() as i64))
            }
            (h, n) => Err(Fault::runtime(format!(
                "count() expects (str, str) or (list, value), got ('{}', '{}')",
                h.type_name(),
                n.type_name()
            ))),
        },
        (func, args) => Err(Fault::runtime(format!(
            "{}() cannot be applied to ({})",
            func.name(),
            args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
        ))),
    }
}

fn sum(items: &[Value], start: Value, meter: &mut Meter) -> EvalResult {
    meter.charge(items.len() as u64)?;
    for item in std::iter::once(&start).chain(items.iter()) {
        if item.as_num().is_none() {
            return Err(Fault::runtime(format!(
                "unsupported operand type for sum(): '{}'",
                item.type_name()
            )));
        }
    }
    let mut acc = start;
    for item in items {
        acc = binary(BinOp::Add, acc, item.clone(), meter)?;
    }
    Ok(acc)
}

fn extreme(items: &[Value], func: Builtin, meter: &mut Meter) -> EvalResult {
    meter.charge(items.len() as u64)?;
    let want = if func == Builtin::Max {
        Ordering::Greater
    } else {
        Ordering::Less
    };
    let mut iter = items.iter();
    let mut best = iter.next().ok_or_else(|| {
        Fault::runtime(format!("{}() arg is an empty sequence", func.name()))
    })?;
    for item in iter {
        if py_order(item, best)? == Some(want) {
            best = item;
        }
    }
    Ok(best.clone())
}

fn to_int(v: &Value, meter: &mut Meter) -> EvalResult {
    match v {
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(x) => {
            if !x.is_finite() {
                return Err(Fault::runtime("cannot convert non-finite float to integer"));
            }
            let t = x.trunc();
            if t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(overflow());
            }
            Ok(Value::Int(t as i64))
        }
        Value::Str(s) => {
            meter.allocate(s.len() as u64)?;
            s.trim()
                .replace('_', "")
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| {
                    Fault::runtime(format!(
                        "invalid literal for int(): {}",
                        short_repr(s, ERROR_EXCERPT_CHARS)
                    ))
                })
        }
        other => Err(Fault::runtime(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(v: &Value, meter: &mut Meter) -> EvalResult {
    match v {
        Value::Str(s) => {
            meter.scan(s.len())?;
            s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                Fault::runtime(format!(
                    "could not convert string to float: {}",
                    short_repr(s, ERROR_EXCERPT_CHARS)
                ))
            })
        }
        other => other.as_num().map(|n| Value::Float(n.as_f64())).ok_or_else(|| {
            Fault::runtime(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

#[derive(Hash, PartialEq, Eq)]
enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Arc<str>),
}

fn hash_key(v: &Value) -> Result<HashKey, Fault> {
    Ok(match v {
        Value::None => HashKey::None,
        Value::Bool(b) => HashKey::Int(*b as i64),
        Value::Int(i) => HashKey::Int(*i),
        Value::Float(x) if x.fract() == 0.0 && x.abs() < 9.0e18 => HashKey::Int(*x as i64),
        Value::Float(x) => HashKey::Float(x.to_bits()),
        Value::Str(s) => HashKey::Str(s.clone()),
        Value::List(_) => return Err(Fault::runtime("unhashable type: 'list'")),
    })
}

/// `set(...)`, materialized as a list in first-occurrence order.
fn unique(items: &[Value], meter: &mut Meter) -> EvalResult {
    meter.charge(items.len() as u64)?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(hash_key(item)?) {
            out.push(item.clone());
        }
    }
    Ok(Value::list(out))
}

fn sorted(items: &[Value], meter: &mut Meter) -> EvalResult {
    let n = items.len() as u64;
    meter.charge(n.saturating_mul(64 - n.leading_zeros() as u64))?;
    let mut out = items.to_vec();
    let mut failure = None;
    out.sort_by(|a, b| match py_order(a, b) {
        Ok(ord) => ord.unwrap_or(Ordering::Equal),
        Err(fault) => {
            failure.get_or_insert(fault);
            Ordering::Equal
        }
    });
    match failure {
        Some(fault) => Err(fault),
        None => Ok(Value::list(out)),
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        char_len(haystack) + 1
    } else {
        haystack.matches(needle).count()
    }
}

// ---- string methods ----

pub(crate) fn method(
    method: Method,
    receiver: &Value,
    args: &[Value],
    meter: &mut Meter,
) -> EvalResult {
    if let (Method::Count, Value::List(items), [needle]) = (method, receiver, args) {
        meter.charge(items.len() as u64)?;
        return Ok(Value::Int(
            items.iter().filter(|v| py_eq(v, needle)).count() as i64,
        ));
    }
    let Value::Str(s) = receiver else {
        return Err(Fault::runtime(format!(
            "'{}' object has no attribute '{}'",
            receiver.type_name(),
            method.name()
        )));
    };
    meter.scan(s.len())?;

    match (method, args) {
        (Method::Lower | Method::Casefold, []) => {
            meter.allocate(s.len() as u64)?;
            Ok(Value::Str(s.to_lowercase().into()))
        }
        (Method::Upper, []) => {
            meter.allocate(s.len() as u64)?;
            Ok(Value::Str(s.to_uppercase().into()))
        }
        (Method::Strip | Method::Lstrip | Method::Rstrip, [] | [Value::None]) => {
            let trimmed = match method {
                Method::Lstrip => s.trim_start(),
                Method::Rstrip => s.trim_end(),
                _ => s.trim(),
            };
            meter.allocate(trimmed.len() as u64)?;
            Ok(Value::str(trimmed))
        }
        (Method::Strip | Method::Lstrip | Method::Rstrip, [Value::Str(set)]) => {
            let strip = |c: char| set.contains(c);
            let trimmed = match method {
                Method::Lstrip => s.trim_start_matches(strip),
                Method::Rstrip => s.trim_end_matches(strip),
                _ => s.trim_matches(strip),
            };
            meter.allocate(trimmed.len() as u64)?;
            Ok(Value::str(trimmed))
        }
        (Method::Startswith, [affix]) => has_affix(s, affix, true).map(Value::Bool),
        (Method::Endswith, [affix]) => has_affix(s, affix, false).map(Value::Bool),
        (Method::Count, [Value::Str(sub)]) => Ok(Value::Int(count_occurrences(s, sub) as i64)),
        (Method::Find, [Value::Str(sub)]) => Ok(Value::Int(
            s.find(&**sub)
                .map(|b| s[..b].chars().count() as i64)
                .unwrap_or(-1),
        )),
        (Method::Split, [] | [Value::None]) => {
            meter.allocate(s.len() as u64)?;
            let parts: Vec<Value> = s.split_whitespace().map(Value::str).collect();
            meter.allocate(16 * parts.len() as u64)?;
            Ok(Value::list(parts))
        }
        (Method::Split, [Value::Str(sep)]) => {
            if sep.is_empty() {
                return Err(Fault::runtime("empty separator"));
            }
            meter.allocate(s.len() as u64)?;
            let parts: Vec<Value> = s.split(&**sep).map(Value::str).collect();
            meter.allocate(16 * parts.len() as u64)?;
            Ok(Value::list(parts))
        }
        (Method::Splitlines, []) => {
            meter.allocate(s.len() as u64)?;
            let lines = splitlines(s);
            meter.allocate(16 * lines.len() as u64)?;
            Ok(Value::list(lines))
        }
        (Method::Replace, [Value::Str(old), Value::Str(new)]) => replace(s, old, new, meter),
        (Method::Isdigit, []) => Ok(Value::Bool(
            !s.is_empty() && s.chars().all(char::is_numeric),
        )),
        (Method::Isalpha, []) => Ok(Value::Bool(
            !s.is_empty() && s.chars().all(char::is_alphabetic),
        )),
        (Method::Isalnum, []) => Ok(Value::Bool(
            !s.is_empty() && s.chars().all(char::is_alphanumeric),
        )),
        (Method::Isspace, []) => Ok(Value::Bool(
            !s.is_empty() && s.chars().all(char::is_whitespace),
        )),
        (Method::Isupper, []) => Ok(Value::Bool(cased_all(s, true))),
        (Method::Islower, []) => Ok(Value::Bool(cased_all(s, false))),
        (Method::Istitle, []) => Ok(Value::Bool(is_title(s))),
        (Method::Isascii, []) => Ok(Value::Bool(s.is_ascii())),
        (method, args) => Err(Fault::runtime(format!(
            "str.{}() cannot be applied to ({})",
            method.name(),
            args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
        ))),
    }
}

fn has_affix(s: &str, affix: &Value, prefix: bool) -> Result<bool, Fault> {
    let test = |p: &str| {
        if prefix {
            s.starts_with(p)
        } else {
            s.ends_with(p)
        }
    };
    match affix {
        Value::Str(p) => Ok(test(&**p)),
        Value::List(items) => {
            for item in items.iter() {
                match item {
                    Value::Str(p) if test(&**p) => return Ok(true),
                    Value::Str(_) => {}
                    other => {
                        return Err(Fault::runtime(format!(
                            "tuple for startswith/endswith must only contain str, not {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(false)
        }
        other => Err(Fault::runtime(format!(
            "startswith/endswith arg must be str or a tuple of str, not {}",
            other.type_name()
        ))),
    }
}

fn replace(s: &str, old: &str, new: &str, meter: &mut Meter) -> EvalResult {
    let hits = count_occurrences(s, old) as u64;
    let size = (s.len() as u64).saturating_add(hits.saturating_mul(new.len() as u64));
    meter.allocate(size)?;
    if old.is_empty() {
        let mut out = String::with_capacity(size as usize);
        out.push_str(new);
        for c in s.chars() {
            out.push(c);
            out.push_str(new);
        }
        return Ok(Value::Str(out.into()));
    }
    Ok(Value::Str(s.replace(old, new).into()))
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

fn splitlines(s: &str) -> Vec<Value> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(Value::str(&s[start..i]));
        start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }
    if start < s.len() {
        lines.push(Value::str(&s[start..]));
    }
    lines
}

/// `isupper` / `islower`: at least one cased character, none of the other case.
fn cased_all(s: &str, upper: bool) -> bool {
    let mut cased = false;
    for c in s.chars() {
        if (upper && c.is_lowercase()) || (!upper && c.is_uppercase()) {
            return false;
        }
        cased |= c.is_uppercase() || c.is_lowercase();
    }
    cased
}

fn is_title(s: &str) -> bool {
    let mut cased = false;
    let mut after_cased = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if after_cased {
                return false;
            }
            after_cased = true;
            cased = true;
        } else if c.is_lowercase() {
            if !after_cased {
                return false;
            }
            after_cased = true;
            cased = true;
        } else {
            after_cased = false;
        }
    }
    cased
}

// ---- regex ----

pub(crate) fn regex(
    op: RegexOp,
    pattern: &RegexLiteral,
    subject: &Value,
    meter: &mut Meter,
) -> EvalResult {
    let Value::Str(s) = subject else {
        return Err(Fault::runtime(format!(
            "{}() expected a string, got '{}'",
            op.name(),
            subject.type_name()
        )));
    };
    meter.scan(s.len())?;
    let re = &pattern.regex;
    match op {
        RegexOp::Matches => Ok(Value::Bool(re.is_match(s))),
        RegexOp::Search | RegexOp::Match | RegexOp::Fullmatch => Ok(if re.is_match(s) {
            Value::Bool(true)
        } else {
            Value::None
        }),
        RegexOp::Findall => {
            let groups = re.captures_len().saturating_sub(1);
            let mut out = Vec::new();
            if groups == 0 {
                for m in re.find_iter(s) {
                    meter.allocate(16 + m.len() as u64)?;
                    out.push(Value::str(m.as_str()));
                }
            } else {
                for caps in re.captures_iter(s) {
                    let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());
                    let item = if groups == 1 {
                        Value::str(group(1))
                    } else {
                        Value::list((1..=groups).map(|i| Value::str(group(i))).collect())
                    };
                    meter.allocate(item.footprint())?;
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
    }
}
