//! Runtime helper ABI.
//!
//! Generated code only reaches the runtime through the four helpers listed in
//! [`HELPER_ABI`]. The table is versioned; a change in name, arity or
//! semantics bumps [`HELPER_ABI_VERSION`]. The functions below are reference
//! implementations over `serde_json::Value`, used by the evaluator and tests.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const HELPER_ABI_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Helper {
    Display,
    ForEach,
    ResolveOutlet,
    MergeBranches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Condition/record pairs, at least one pair.
    Pairs,
}

#[derive(Debug, Clone, Copy)]
pub struct HelperAbi {
    pub helper: Helper,
    pub name: &'static str,
    pub alias: &'static str,
    pub arity: Arity,
    pub semantics: &'static str,
}

pub const HELPER_ABI: [HelperAbi; 4] = [
    HelperAbi {
        helper: Helper::Display,
        name: "display",
        alias: "_d",
        arity: Arity::Exact(1),
        semantics: "display(x) -> text; null renders empty, records and lists as indented JSON",
    },
    HelperAbi {
        helper: Helper::ForEach,
        name: "forEach",
        alias: "_f",
        arity: Arity::Exact(2),
        semantics: "forEach(seq, producer) -> list<record>; producer(item, index, flatIndex); numbers iterate 1..=n, negatives and null yield []",
    },
    HelperAbi {
        helper: Helper::ResolveOutlet,
        name: "resolveOutlet",
        alias: "_r",
        arity: Arity::Exact(3),
        semantics: "resolveOutlet(name, extraProps, path) -> node|null; identity is name, or name-path inside loops",
    },
    HelperAbi {
        helper: Helper::MergeBranches,
        name: "mergeBranches",
        alias: "_m",
        arity: Arity::Pairs,
        semantics: "mergeBranches(cond1, record1, ...) -> record of the first truthy condition, else {}; every argument is a zero-arg producer, evaluated lazily in order",
    },
];

impl Helper {
    pub fn abi(self) -> &'static HelperAbi {
        match self {
            Helper::Display => &HELPER_ABI[0],
            Helper::ForEach => &HELPER_ABI[1],
            Helper::ResolveOutlet => &HELPER_ABI[2],
            Helper::MergeBranches => &HELPER_ABI[3],
        }
    }

    pub fn name(self) -> &'static str {
        self.abi().name
    }

    pub fn alias(self) -> &'static str {
        self.abi().alias
    }

    pub fn accepts(self, argc: usize) -> bool {
        match self.abi().arity {
            Arity::Exact(n) => argc == n,
            Arity::Pairs => argc >= 2 && argc % 2 == 0,
        }
    }
}

/// `import { display as _d, ... } from "<module>";` for the given helpers.
pub fn import_statement<'a>(
    helpers: impl IntoIterator<Item = &'a Helper>,
    module: &str,
) -> Option<String> {
    let specifiers: Vec<String> = helpers
        .into_iter()
        .map(|h| format!("{} as {}", h.name(), h.alias()))
        .collect();
    if specifiers.is_empty() {
        return None;
    }
    Some(format!(
        "import {{ {} }} from {};",
        specifiers.join(", "),
        js_string(module)
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE COERCIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON string literal, valid as a JS string literal.
pub fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Integral values become JSON integers so results compare cleanly.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [only] => to_number(only),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

/// `String(x)` coercion.
pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| if v.is_null() { String::new() } else { to_js_string(v) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFERENCE IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_default()
        }
        other => to_js_string(other),
    }
}

/// Producer receives `(item, index, flatIndex)`; for records `index` is the
/// key and `flatIndex` the position.
pub fn for_each<F, E>(source: &Value, mut producer: F) -> Result<Vec<Value>, E>
where
    F: FnMut(Value, Value, usize) -> Result<Value, E>,
{
    let mut out = Vec::new();
    match source {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                out.push(producer(item.clone(), Value::from(i), i)?);
            }
        }
        Value::String(s) => {
            for (i, ch) in s.chars().enumerate() {
                out.push(producer(Value::String(ch.to_string()), Value::from(i), i)?);
            }
        }
        Value::Number(n) => {
            let n = n.as_f64().unwrap_or(0.0);
            if n.is_finite() && n > 0.0 {
                let count = n.ceil() as usize;
                for i in 0..count {
                    out.push(producer(Value::from(i + 1), Value::from(i), i)?);
                }
            }
        }
        Value::Object(entries) => {
            for (i, (key, item)) in entries.iter().enumerate() {
                out.push(producer(item.clone(), Value::String(key.clone()), i)?);
            }
        }
        Value::Null | Value::Bool(_) => {}
    }
    Ok(out)
}

/// Outlet identity: the base name, joined with the flattened loop index
/// path, innermost last.
pub fn outlet_identity(base: &str, path: &[usize]) -> String {
    let mut identity = base.to_string();
    for index in path {
        identity.push('-');
        identity.push_str(&index.to_string());
    }
    identity
}

/// `slots` is the outlet registry (`$slots` of the rendering context).
/// `path` is the already joined index path, if any.
pub fn resolve_outlet(slots: &Value, name: &str, extra_props: &Value, path: Option<&str>) -> Value {
    let identity = match path {
        Some(p) if !p.is_empty() => format!("{}-{}", name, p),
        _ => name.to_string(),
    };
    let provided = |key: &str| slots.get(key).map(is_truthy).unwrap_or(false);
    if !provided(name) && !provided(&identity) {
        return Value::Null;
    }
    json!({ "name": identity, "props": extra_props })
}

/// Conditions and records are producers; only conditions up to the first
/// truthy one and only that branch's record are evaluated.
pub fn merge_branches<C, R, E>(branches: impl IntoIterator<Item = (C, R)>) -> Result<Value, E>
where
    C: FnOnce() -> Result<Value, E>,
    R: FnOnce() -> Result<Value, E>,
{
    for (condition, record) in branches {
        if is_truthy(&condition()?) {
            return record();
        }
    }
    Ok(Value::Object(Map::new()))
}
