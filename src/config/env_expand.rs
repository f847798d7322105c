//! Environment-variable expansion applied to the raw config text before it
//! is handed to the YAML parser (spec.md §6): `$$` -> literal `$`;
//! `${NAME}` and `$NAME` -> the environment variable's value, or `""` if
//! unset.

use std::env;

pub fn expand(input: &str) -> String {
    expand_with(input, |name| env::var(name).unwrap_or_default())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed {
                    out.push_str(&lookup(&name));
                } else {
                    // No closing brace: emit verbatim rather than silently
                    // dropping what looked like a reference.
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some(&next) if is_var_start(next) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if is_var_continue(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&lookup(&name));
            }
            _ => out.push('$'),
        }
    }

    out
}

fn is_var_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_var_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
