//! Argument and path templates
//!
//! Templates may reference a closed set of placeholders: `{target}`,
//! `{version}`, `{task}` and `{stage}`. `{{` and `}}` produce literal braces.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("unclosed '{{' at offset {0}")]
    Unclosed(usize),

    #[error("unmatched '}}' at offset {0}")]
    Unmatched(usize),
}

/// Values substituted into a template
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub target: &'a str,
    pub version: &'a str,
    pub task: &'a str,
    pub stage: &'a str,
}

impl<'a> TemplateVars<'a> {
    fn lookup(&self, name: &str) -> Option<&'a str> {
        match name {
            "target" => Some(self.target),
            "version" => Some(self.version),
            "task" => Some(self.task),
            "stage" => Some(self.stage),
            _ => None,
        }
    }
}

enum Piece<'t> {
    Literal(&'t str),
    Placeholder(&'t str),
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let mut pieces = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                pieces.push(Piece::Literal(&template[literal_start..=i]));
                i += 2;
                literal_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                pieces.push(Piece::Literal(&template[literal_start..=i]));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                let close = template[i + 1..]
                    .find('}')
                    .map(|off| i + 1 + off)
                    .ok_or(TemplateError::Unclosed(i))?;
                pieces.push(Piece::Literal(&template[literal_start..i]));
                pieces.push(Piece::Placeholder(&template[i + 1..close]));
                i = close + 1;
                literal_start = i;
            }
            b'}' => return Err(TemplateError::Unmatched(i)),
            _ => i += 1,
        }
    }
    pieces.push(Piece::Literal(&template[literal_start..]));
    Ok(pieces)
}

/// Checks that a template only uses known placeholders
pub fn check(template: &str) -> Result<(), TemplateError> {
    const KNOWN: [&str; 4] = ["target", "version", "task", "stage"];

    for piece in parse(template)? {
        if let Piece::Placeholder(name) = piece {
            if !KNOWN.contains(&name) {
                return Err(TemplateError::UnknownPlaceholder(name.to_string()));
            }
        }
    }
    Ok(())
}

pub fn render(template: &str, vars: &TemplateVars<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for piece in parse(template)? {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Placeholder(name) => {
                let value = vars
                    .lookup(name)
                    .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars<'static> {
        TemplateVars {
            target: "x86_64-unknown-linux-musl",
            version: "v0.48.0",
            task: "linux",
            stage: "build",
        }
    }

    #[test]
    fn test_render_placeholders() {
        assert_eq!(
            render("target/{target}/release/app", &vars()).unwrap(),
            "target/x86_64-unknown-linux-musl/release/app"
        );
        assert_eq!(
            render("{stage}:{task}@{version}", &vars()).unwrap(),
            "build:linux@v0.48.0"
        );
        assert_eq!(render("plain", &vars()).unwrap(), "plain");
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(
            render("{{\"v\": \"{version}\"}}", &vars()).unwrap(),
            "{\"v\": \"v0.48.0\"}"
        );
    }

    #[test]
    fn test_rejects_unknown_and_malformed() {
        assert_eq!(
            check("{GITHUB_REF}"),
            Err(TemplateError::UnknownPlaceholder("GITHUB_REF".into()))
        );
        assert_eq!(check("abc{target"), Err(TemplateError::Unclosed(3)));
        assert_eq!(check("abc}"), Err(TemplateError::Unmatched(3)));
        assert!(check("--target={target}").is_ok());
    }
}
