//! Regex-aided splitting of a `{{ ... }}` expression body into tokens.
//!
//! The grammar is small enough that a proper lexer would be overkill: split
//! on whitespace while respecting double-quoted strings, then classify each
//! token by its leading character.

use super::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Pipe,
    /// A dot-prefixed field path, already split on `.`, e.g. `.A.B` -> ["A", "B"].
    Field(Vec<String>),
    StringLit(String),
    IntLit(i64),
    /// A function name or (for the base stage) the literal `.` meaning "the whole context".
    Ident(String),
}

pub fn tokenize(expr: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = expr.trim().chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '|' {
            chars.next();
            tokens.push(Token::Pipe);
            continue;
        }
        if c == '"' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                s.push(c);
            }
            if !closed {
                return Err(TemplateError::Syntax {
                    detail: format!("unterminated string literal in `{expr}`"),
                });
            }
            tokens.push(Token::StringLit(s));
            continue;
        }
        if c == '.' {
            let mut path = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '|' || c == '"' {
                    break;
                }
                path.push(c);
                chars.next();
            }
            let segments: Vec<String> = path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
            tokens.push(Token::Field(segments));
            continue;
        }
        if c == '-' || c.is_ascii_digit() {
            let mut num = String::new();
            if c == '-' {
                num.push(c);
                chars.next();
            }
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() {
                    num.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            match num.parse::<i64>() {
                Ok(n) => {
                    tokens.push(Token::IntLit(n));
                    continue;
                }
                Err(_) => {
                    return Err(TemplateError::Syntax {
                        detail: format!("invalid integer literal `{num}` in `{expr}`"),
                    })
                }
            }
        }

        let mut ident = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '|' || c == '"' {
                break;
            }
            ident.push(c);
            chars.next();
        }
        if ident.is_empty() {
            return Err(TemplateError::Syntax {
                detail: format!("unexpected character `{c}` in `{expr}`"),
            });
        }
        tokens.push(Token::Ident(ident));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_field_literal_pipe_and_call() {
        let tokens = tokenize(r#".Message | default "none""#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Field(vec!["Message".to_owned()]),
                Token::Pipe,
                Token::Ident("default".to_owned()),
                Token::StringLit("none".to_owned()),
            ]
        );
    }

    #[test]
    fn tokenizes_nested_field_path() {
        let tokens = tokenize(".InvolvedObject.Kind").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Field(vec!["InvolvedObject".to_owned(), "Kind".to_owned()])]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(tokenize(r#"quote "unterminated"#).is_err());
    }
}
