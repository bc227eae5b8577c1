//! Builds Alfresco Full Text Search (AFTS) query strings from structured
//! tokens, so callers never concatenate user input into the DSL themselves.

use crate::error::DeskError;
use crate::types::node_ref::{NodeRef, node_id};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    fn keyword(self) -> &'static str {
        match self {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueryToken {
    /// Full-text term or phrase. `*` and `?` wildcards survive in single words.
    Text { value: String },
    /// `prefix:name:term`
    Field { field: String, value: String },
    /// `=prefix:name:"value"`
    Exact { field: String, value: String },
    Type { value: String },
    Aspect { value: String },
    Path { value: String },
    /// Accepts a bare node id or a NodeRef.
    Ancestor { value: String },
    Range {
        field: String,
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        to: Option<String>,
        #[serde(default = "inclusive_default")]
        inclusive: bool,
    },
    Not { token: Box<QueryToken> },
    Group {
        tokens: Vec<QueryToken>,
        #[serde(default)]
        combinator: Combinator,
    },
}

fn inclusive_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub tokens: Vec<QueryToken>,
    #[serde(default)]
    pub combinator: Combinator,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuiltQuery {
    pub query: String,
    pub language: String,
}

pub fn build(request: &QueryRequest) -> Result<BuiltQuery, DeskError> {
    Ok(BuiltQuery {
        query: build_query(&request.tokens, request.combinator)?,
        language: "afts".to_string(),
    })
}

pub fn build_query(tokens: &[QueryToken], combinator: Combinator) -> Result<String, DeskError> {
    if tokens.is_empty() {
        return Err(DeskError::validation("query has no tokens"));
    }
    let parts = tokens
        .iter()
        .map(render)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(combinator.keyword()))
}

fn render(token: &QueryToken) -> Result<String, DeskError> {
    match token {
        QueryToken::Text { value } => term(non_empty("text", value)?),
        QueryToken::Field { field, value } => {
            Ok(format!("{}:{}", field_name(field)?, term(non_empty(field, value)?)?))
        }
        QueryToken::Exact { field, value } => Ok(format!(
            "={}:{}",
            field_name(field)?,
            quoted(non_empty(field, value)?)
        )),
        QueryToken::Type { value } => Ok(format!("TYPE:{}", quoted(qname(value)?))),
        QueryToken::Aspect { value } => Ok(format!("ASPECT:{}", quoted(qname(value)?))),
        QueryToken::Path { value } => Ok(format!("PATH:{}", quoted(non_empty("path", value)?))),
        QueryToken::Ancestor { value } => {
            let id = node_id(value)?;
            Ok(format!("ANCESTOR:{}", quoted(&NodeRef::workspace(id).to_string())))
        }
        QueryToken::Range {
            field,
            from,
            to,
            inclusive,
        } => {
            if from.is_none() && to.is_none() {
                return Err(DeskError::validation(format!(
                    "range on {field} needs a lower or upper bound"
                )));
            }
            let (open, close) = if *inclusive { ('[', ']') } else { ('<', '>') };
            Ok(format!(
                "{}:{open}{} TO {}{close}",
                field_name(field)?,
                bound(from.as_deref(), "MIN"),
                bound(to.as_deref(), "MAX"),
            ))
        }
        QueryToken::Not { token } => Ok(format!("NOT {}", wrap(token)?)),
        QueryToken::Group { tokens, combinator } => {
            let inner = build_query(tokens, *combinator)?;
            Ok(if tokens.len() > 1 {
                format!("({inner})")
            } else {
                inner
            })
        }
    }
}

/// Render a token so it binds tightly under `NOT`.
fn wrap(token: &QueryToken) -> Result<String, DeskError> {
    let rendered = render(token)?;
    Ok(match token {
        QueryToken::Group { .. } if !rendered.starts_with('(') => format!("({rendered})"),
        _ => rendered,
    })
}

const SPECIAL: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', ':', '\\', '/', '=',
    '<', '>',
];

/// Words the parser reads as operators when they appear bare.
const RESERVED: &[&str] = &["AND", "OR", "NOT", "TO"];

fn needs_quotes(value: &str) -> bool {
    value.chars().any(|c| c.is_whitespace() || SPECIAL.contains(&c))
        || RESERVED.iter().any(|w| value.eq_ignore_ascii_case(w))
}

fn term(value: &str) -> Result<String, DeskError> {
    Ok(if needs_quotes(value) {
        quoted(value)
    } else {
        value.to_string()
    })
}

fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Range bounds go out bare only when they are numbers, plain dates or an
/// open end; anything else is quoted.
fn bound(value: Option<&str>, open_end: &str) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => open_end.to_string(),
        Some(v) if v == "MIN" || v == "MAX" || is_number(v) || is_plain_date(v) => {
            v.to_string()
        }
        Some(v) => quoted(v),
    }
}

fn is_number(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let frac = parts.next();
    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

/// `YYYY-MM-DD`
fn is_plain_date(value: &str) -> bool {
    let b = value.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

fn non_empty<'a>(what: &str, value: &'a str) -> Result<&'a str, DeskError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeskError::validation(format!("empty value for {what}")));
    }
    Ok(value)
}

/// Property names: `cm:name`, `TEXT`, `@cm:title`.
fn field_name(field: &str) -> Result<&str, DeskError> {
    let field = field.trim();
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-' | '.' | '@'))
        && !field.ends_with(':');
    if !valid {
        return Err(DeskError::validation(format!("invalid field name: {field}")));
    }
    Ok(field)
}

/// Qualified names such as `cm:content`.
fn qname(value: &str) -> Result<&str, DeskError> {
    let value = non_empty("qname", value)?;
    match value.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => Ok(value),
        _ => Err(DeskError::validation(format!(
            "expected a prefixed name like cm:content, got {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(v: &str) -> QueryToken {
        QueryToken::Text { value: v.into() }
    }

    #[test]
    fn joins_tokens_with_combinator() {
        let q = build_query(
            &[
                text("budget*"),
                QueryToken::Type {
                    value: "cm:content".into(),
                },
                QueryToken::Field {
                    field: "cm:creator".into(),
                    value: "admin".into(),
                },
            ],
            Combinator::And,
        )
        .unwrap();
        assert_eq!(q, r#"budget* AND TYPE:"cm:content" AND cm:creator:admin"#);
    }

    #[test]
    fn phrases_and_special_characters_are_quoted_and_escaped() {
        assert_eq!(render(&text("annual report")).unwrap(), r#""annual report""#);
        assert_eq!(render(&text(r#"say "hi""#)).unwrap(), r#""say \"hi\"""#);
        assert_eq!(render(&text("a:b")).unwrap(), r#""a:b""#);
        assert_eq!(
            render(&QueryToken::Exact {
                field: "cm:name".into(),
                value: "plan.docx".into()
            })
            .unwrap(),
            r#"=cm:name:"plan.docx""#
        );
    }

    #[test]
    fn ranges_use_open_ends_and_quote_timestamps() {
        let q = render(&QueryToken::Range {
            field: "cm:created".into(),
            from: Some("2024-01-01T00:00:00".into()),
            to: None,
            inclusive: true,
        })
        .unwrap();
        assert_eq!(q, r#"cm:created:["2024-01-01T00:00:00" TO MAX]"#);

        let q = render(&QueryToken::Range {
            field: "cm:content.size".into(),
            from: Some("10".into()),
            to: Some("20".into()),
            inclusive: false,
        })
        .unwrap();
        assert_eq!(q, "cm:content.size:<10 TO 20>");
    }

    #[test]
    fn range_bounds_cannot_break_out_of_the_range() {
        let q = render(&QueryToken::Range {
            field: "cm:content.size".into(),
            from: Some("0".into()),
            to: Some("10]||(secret".into()),
            inclusive: true,
        })
        .unwrap();
        assert_eq!(q, r#"cm:content.size:[0 TO "10]||(secret"]"#);

        let q = render(&QueryToken::Range {
            field: "cm:content.size".into(),
            from: Some("-1.5".into()),
            to: Some(r#"9"> OR x"#.into()),
            inclusive: false,
        })
        .unwrap();
        assert_eq!(q, r#"cm:content.size:<-1.5 TO "9\"> OR x">"#);
    }

    #[test]
    fn operator_words_are_quoted_as_terms() {
        let q = build_query(&[text("cats"), text("OR")], Combinator::And).unwrap();
        assert_eq!(q, r#"cats AND "OR""#);
        assert_eq!(render(&text("not")).unwrap(), r#""not""#);
        assert_eq!(render(&text("notes")).unwrap(), "notes");
        assert_eq!(
            render(&QueryToken::Field {
                field: "cm:name".into(),
                value: "AND".into()
            })
            .unwrap(),
            r#"cm:name:"AND""#
        );
    }

    #[test]
    fn groups_and_negation_nest() {
        let tokens = vec![
            QueryToken::Group {
                tokens: vec![text("alpha"), text("beta")],
                combinator: Combinator::Or,
            },
            QueryToken::Not {
                token: Box::new(QueryToken::Aspect {
                    value: "cm:workingcopy".into(),
                }),
            },
            QueryToken::Ancestor {
                value: "workspace://SpacesStore/abc".into(),
            },
        ];
        let q = build_query(&tokens, Combinator::And).unwrap();
        assert_eq!(
            q,
            r#"(alpha OR beta) AND NOT ASPECT:"cm:workingcopy" AND ANCESTOR:"workspace://SpacesStore/abc""#
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(build_query(&[], Combinator::And).is_err());
        assert!(render(&text("  ")).is_err());
        assert!(
            render(&QueryToken::Type {
                value: "content".into()
            })
            .is_err()
        );
        assert!(
            render(&QueryToken::Field {
                field: "cm:name) OR (x".into(),
                value: "y".into()
            })
            .is_err()
        );
        assert!(
            render(&QueryToken::Range {
                field: "cm:created".into(),
                from: None,
                to: None,
                inclusive: true
            })
            .is_err()
        );
    }

    #[test]
    fn tokens_deserialize_from_tagged_json() {
        let req: QueryRequest = serde_json::from_value(serde_json::json!({
            "tokens": [
                {"kind": "text", "value": "hello"},
                {"kind": "range", "field": "cm:modified", "to": "2024-12-31"}
            ],
            "combinator": "OR"
        }))
        .unwrap();
        let built = build(&req).unwrap();
        assert_eq!(built.query, "hello OR cm:modified:[MIN TO 2024-12-31]");
        assert_eq!(built.language, "afts");
    }
}
