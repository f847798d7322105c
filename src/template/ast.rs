//! AST for the `{{ ... }}` mini-language: field paths, literals, calls, and
//! pipelines.

use super::lexer::{tokenize, Token};
use super::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(Vec<String>),
    StringLit(String),
    IntLit(i64),
    Call(String, Vec<Expr>),
}

/// Parses the body of a `{{ ... }}` block (without the braces) into an
/// [`Expr`], resolving pipelines into nested [`Expr::Call`]s where each
/// stage's previous value becomes the *first* argument of the next call.
pub fn parse(expr: &str) -> Result<Expr, TemplateError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(TemplateError::Syntax {
            detail: "empty expression".to_owned(),
        });
    }

    let mut stages: Vec<Vec<Token>> = vec![Vec::new()];
    for token in tokens {
        if token == Token::Pipe {
            stages.push(Vec::new());
        } else {
            stages.last_mut().expect("always has at least one stage").push(token);
        }
    }

    let mut stages = stages.into_iter();
    let mut expr = parse_stage(stages.next().unwrap(), None)?;
    for stage in stages {
        expr = parse_stage(stage, Some(expr))?;
    }
    Ok(expr)
}

fn token_to_leaf(token: Token) -> Result<Expr, TemplateError> {
    match token {
        Token::Field(segments) => Ok(Expr::Field(segments)),
        Token::StringLit(s) => Ok(Expr::StringLit(s)),
        Token::IntLit(n) => Ok(Expr::IntLit(n)),
        Token::Ident(name) => Ok(Expr::Call(name, Vec::new())),
        Token::Pipe => unreachable!("pipes are split out before stage parsing"),
    }
}

/// Parses one pipeline stage. `prev` is `None` for the base stage and
/// `Some(previous_stage_value)` for every stage after a `|`; when present it
/// is prepended as the first argument of the resulting call, per spec.
fn parse_stage(mut tokens: Vec<Token>, prev: Option<Expr>) -> Result<Expr, TemplateError> {
    if tokens.is_empty() {
        return Err(TemplateError::Syntax {
            detail: "empty pipeline stage".to_owned(),
        });
    }

    if prev.is_none() && tokens.len() == 1 {
        return token_to_leaf(tokens.remove(0));
    }

    let first = tokens.remove(0);
    let name = match first {
        Token::Ident(name) => name,
        other => {
            return Err(TemplateError::Syntax {
                detail: format!("expected a function name, found {other:?}"),
            })
        }
    };

    let mut args = Vec::new();
    for token in tokens {
        args.push(token_to_leaf(token)?);
    }

    // Every function reads the piped value as its first argument, except
    // `default`, whose signature is `default(defaultValue, value)` — a pipe
    // feeds `value`, not `defaultValue`, so it's appended last to match the
    // same argument order `default "x" .Field` produces directly.
    if let Some(prev) = prev {
        if name == "default" {
            args.push(prev);
        } else {
            args.insert(0, prev);
        }
    }

    Ok(Expr::Call(name, args))
}
