//! The fixed function vocabulary (spec.md §4.3).

use super::TemplateError;
use chrono::Utc;
use serde_json::Value;

pub fn call(name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
    match name {
        "toJson" => one(name, args, |v| Ok(Value::String(to_json(&v, false)?))),
        "toPrettyJson" => one(name, args, |v| Ok(Value::String(to_json(&v, true)?))),
        "quote" => one(name, args, |v| Ok(Value::String(format!("\"{}\"", display(&v))))),
        "squote" => one(name, args, |v| Ok(Value::String(format!("'{}'", display(&v))))),
        "upper" => one(name, args, |v| Ok(Value::String(display(&v).to_uppercase()))),
        "lower" => one(name, args, |v| Ok(Value::String(display(&v).to_lowercase()))),
        "trim" => one(name, args, |v| Ok(Value::String(display(&v).trim().to_owned()))),
        "empty" => one(name, args, |v| Ok(Value::Bool(is_empty(&v)))),
        "replace" => {
            let [old, new, s] = three(name, args)?;
            Ok(Value::String(display(&s).replace(&display(&old), &display(&new))))
        }
        "contains" => {
            let [needle, haystack] = two(name, args)?;
            Ok(Value::Bool(display(&haystack).contains(&display(&needle))))
        }
        "hasPrefix" => {
            let [prefix, s] = two(name, args)?;
            Ok(Value::Bool(display(&s).starts_with(&display(&prefix))))
        }
        "hasSuffix" => {
            let [suffix, s] = two(name, args)?;
            Ok(Value::Bool(display(&s).ends_with(&display(&suffix))))
        }
        "default" => {
            let [default, v] = two(name, args)?;
            Ok(if is_empty(&v) { default } else { v })
        }
        "coalesce" => Ok(args.into_iter().find(|v| !is_empty(v)).unwrap_or(Value::Null)),
        "now" => {
            if !args.is_empty() {
                return Err(arity_error(name, 0, args.len()));
            }
            Ok(Value::String(Utc::now().to_rfc3339()))
        }
        "index" => {
            let [collection, key] = two(name, args)?;
            Ok(index(&collection, &key))
        }
        other => Err(TemplateError::UnknownFunction { name: other.to_owned() }),
    }
}

fn one(name: &str, mut args: Vec<Value>, f: impl FnOnce(Value) -> Result<Value, TemplateError>) -> Result<Value, TemplateError> {
    if args.len() != 1 {
        return Err(arity_error(name, 1, args.len()));
    }
    f(args.remove(0))
}

fn two(name: &str, mut args: Vec<Value>) -> Result<[Value; 2], TemplateError> {
    if args.len() != 2 {
        return Err(arity_error(name, 2, args.len()));
    }
    let b = args.remove(1);
    let a = args.remove(0);
    Ok([a, b])
}

fn three(name: &str, mut args: Vec<Value>) -> Result<[Value; 3], TemplateError> {
    if args.len() != 3 {
        return Err(arity_error(name, 3, args.len()));
    }
    let c = args.remove(2);
    let b = args.remove(1);
    let a = args.remove(0);
    Ok([a, b, c])
}

fn arity_error(name: &str, expected: usize, got: usize) -> TemplateError {
    TemplateError::Arity {
        function: name.to_owned(),
        expected,
        got,
    }
}

fn to_json(v: &Value, pretty: bool) -> Result<String, TemplateError> {
    let stripped = strip_callables(v);
    if pretty {
        serde_json::to_string_pretty(&stripped)
    } else {
        serde_json::to_string(&stripped)
    }
    .map_err(|err| TemplateError::Encoding { source: err })
}

/// Kubesee's context never contains real callables (see `context.rs`), but
/// the function is kept as a distinct step — matching the spec's explicit
/// "after stripping callable fields" contract — so it stays the single seam
/// to extend if a future context gains lazy fields.
fn strip_callables(v: &Value) -> Value {
    v.clone()
}

/// Converts a [`Value`] leaf to its string form per the rendering contract:
/// integers/floats/bools use their canonical form, maps/lists use `toJson`,
/// nil is the empty string.
pub fn display(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => to_json(v, false).unwrap_or_default(),
    }
}

/// `empty`: nil, `""`, an empty map, or an empty list.
fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// `index`: map lookup by string key, list lookup by integer index, nil-safe.
fn index(collection: &Value, key: &Value) -> Value {
    match collection {
        Value::Object(map) => {
            let key = display(key);
            map.get(&key).cloned().unwrap_or(Value::Null)
        }
        Value::Array(items) => {
            let idx = match key {
                Value::Number(n) => n.as_i64(),
                _ => display(key).parse::<i64>().ok(),
            };
            match idx.and_then(|i| usize::try_from(i).ok()) {
                Some(i) => items.get(i).cloned().unwrap_or(Value::Null),
                None => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_returns_fallback_only_when_empty() {
        assert_eq!(
            call("default", vec![json!("d"), json!("")]).unwrap(),
            json!("d")
        );
        assert_eq!(
            call("default", vec![json!("d"), json!("v")]).unwrap(),
            json!("v")
        );
    }

    #[test]
    fn coalesce_returns_first_non_empty() {
        assert_eq!(
            call("coalesce", vec![json!(""), json!(null), json!("x")]).unwrap(),
            json!("x")
        );
        assert_eq!(call("coalesce", vec![]).unwrap(), Value::Null);
    }

    #[test]
    fn index_is_nil_safe() {
        assert_eq!(call("index", vec![json!({"a": 1}), json!("a")]).unwrap(), json!(1));
        assert_eq!(call("index", vec![json!({"a": 1}), json!("missing")]).unwrap(), Value::Null);
        assert_eq!(call("index", vec![json!([1, 2, 3]), json!(1)]).unwrap(), json!(2));
        assert_eq!(call("index", vec![Value::Null, json!("a")]).unwrap(), Value::Null);
    }

    #[test]
    fn unknown_function_is_an_error() {
        assert!(call("nope", vec![]).is_err());
    }

    #[test]
    fn string_case_and_trim() {
        assert_eq!(call("upper", vec![json!("hi")]).unwrap(), json!("HI"));
        assert_eq!(call("lower", vec![json!("HI")]).unwrap(), json!("hi"));
        assert_eq!(call("trim", vec![json!("  hi  ")]).unwrap(), json!("hi"));
    }

    #[test]
    fn quote_and_squote_wrap() {
        assert_eq!(call("quote", vec![json!("hi")]).unwrap(), json!("\"hi\""));
        assert_eq!(call("squote", vec![json!("hi")]).unwrap(), json!("'hi'"));
    }
}
