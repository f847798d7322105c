//! A Go-template-compatible subset of `{{ ... }}` expressions, sufficient
//! for rendering sink layouts and per-request header values (spec.md §4.3).

mod ast;
mod context;
mod functions;
mod lexer;

use ast::Expr;
use serde_json::Value;
use snafu::Snafu;

/// Errors raised while parsing or evaluating a template. Parsing happens
/// lazily, per `render()` call, since layouts are static but the regex
/// engine backing rule matching is the only thing cached at config-load
/// time; callers that render the same template repeatedly (sink workers)
/// may cache the parsed form themselves if it becomes a hot path.
#[derive(Debug, Snafu)]
pub enum TemplateError {
    #[snafu(display("template syntax error: {detail}"))]
    Syntax { detail: String },
    #[snafu(display("unknown template function `{name}`"))]
    UnknownFunction { name: String },
    #[snafu(display("function `{function}` expects {expected} argument(s), got {got}"))]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },
    #[snafu(display("failed to JSON-encode template value: {source}"))]
    Encoding { source: serde_json::Error },
}

/// Builds the render context for an event. Exposed so sinks can render
/// header templates and layouts against the same context.
pub fn context_for(event: &crate::event::Event) -> Value {
    context::build(event)
}

/// Renders a single template string (plain text with embedded `{{ ... }}`
/// blocks) against `context`.
pub fn render(template: &str, context: &Value) -> Result<String, TemplateError> {
    let mut out = String::new();
    let mut rest = template;

    loop {
        match rest.find("{{") {
            None => {
                out.push_str(rest);
                break;
            }
            Some(start) => {
                out.push_str(&rest[..start]);
                let after_open = &rest[start + 2..];
                let end = after_open.find("}}").ok_or_else(|| TemplateError::Syntax {
                    detail: format!("unterminated `{{{{` in `{template}`"),
                })?;
                let expr_src = &after_open[..end];
                let expr = ast::parse(expr_src)?;
                let value = eval(&expr, context)?;
                out.push_str(&functions::display(&value));
                rest = &after_open[end + 2..];
            }
        }
    }

    Ok(out)
}

fn eval(expr: &Expr, context: &Value) -> Result<Value, TemplateError> {
    match expr {
        Expr::StringLit(s) => Ok(Value::String(s.clone())),
        Expr::IntLit(n) => Ok(Value::from(*n)),
        Expr::Field(segments) => Ok(traverse(context, segments)),
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, context))
                .collect::<Result<Vec<_>, _>>()?;
            functions::call(name, values)
        }
    }
}

/// Field traversal: missing keys at any point yield `Null` rather than an
/// error, per spec.
fn traverse<'a>(context: &'a Value, segments: &[String]) -> Value {
    let mut current = context;
    for segment in segments {
        match current.get(segment) {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Walks a nested map/list `layout`, rendering every string leaf as a
/// template and recursing into maps/lists; non-string scalars pass through
/// unchanged. An error from any leaf aborts the whole walk.
pub fn render_layout(layout: &Value, context: &Value) -> Result<Value, TemplateError> {
    match layout {
        Value::String(s) => Ok(Value::String(render(s, context)?)),
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|item| render_layout(item, context))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(rendered))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), render_layout(value, context)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;
    use serde_json::json;

    fn ctx() -> Value {
        context_for(&sample_event())
    }

    #[test]
    fn renders_plain_text_untouched() {
        assert_eq!(render("hello world", &ctx()).unwrap(), "hello world");
    }

    #[test]
    fn renders_field_access() {
        assert_eq!(render("{{.Message}}", &ctx()).unwrap(), "Created container");
    }

    #[test]
    fn renders_nested_field_access() {
        assert_eq!(render("kind={{.InvolvedObject.Kind}}", &ctx()).unwrap(), "kind=Pod");
    }

    #[test]
    fn missing_field_renders_empty() {
        assert_eq!(render("[{{.NoSuchField}}]", &ctx()).unwrap(), "[]");
    }

    #[test]
    fn renders_pipeline() {
        assert_eq!(render("{{.Reason | upper}}", &ctx()).unwrap(), "CREATED");
    }

    #[test]
    fn renders_default_for_empty_field() {
        let mut event = sample_event();
        event.action = String::new();
        let context = context_for(&event);
        assert_eq!(render(r#"{{.Action | default "none"}}"#, &context).unwrap(), "none");
    }

    #[test]
    fn piped_default_passes_through_non_empty_value() {
        let mut event = sample_event();
        event.action = "Binding".to_owned();
        let context = context_for(&event);
        assert_eq!(render(r#"{{.Action | default "none"}}"#, &context).unwrap(), "Binding");
    }

    #[test]
    fn unknown_function_surfaces_as_error() {
        assert!(render("{{.Message | bogus}}", &ctx()).is_err());
    }

    /// End-to-end scenario 6 (spec.md §8): template layout.
    #[test]
    fn render_layout_matches_scenario_six() {
        let layout = json!({
            "msg": "{{.Message}}",
            "kind": "{{.InvolvedObject.Kind}}",
        });
        let rendered = render_layout(&layout, &ctx()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "msg": "Created container",
                "kind": "Pod",
            })
        );
    }

    #[test]
    fn render_layout_preserves_non_string_scalars_and_structure() {
        let layout = json!({
            "count": 3,
            "enabled": true,
            "nested": {"a": ["{{.Reason}}", 2]},
        });
        let rendered = render_layout(&layout, &ctx()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "count": 3,
                "enabled": true,
                "nested": {"a": ["Created", 2]},
            })
        );
    }

    #[test]
    fn render_layout_aborts_on_first_error() {
        let layout = json!({"a": "{{.Message}}", "b": "{{.Message | bogus}}"});
        assert!(render_layout(&layout, &ctx()).is_err());
    }
}
