//! URI helpers: path templates, percent-encoding with skipped characters,
//! query and matrix rendering, and rebasing relative endpoints.

use indexmap::IndexMap;
use std::fmt;
use url::Url;

/// Problems found while reading or expanding a `{token}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    Unbalanced { template: String },
    EmptyToken { template: String },
    Unresolved { template: String, token: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbalanced { template } => write!(f, "unbalanced braces in template '{template}'"),
            Self::EmptyToken { template } => write!(f, "empty token in template '{template}'"),
            Self::Unresolved { template, token } => {
                write!(f, "no value bound for token '{{{token}}}' in template '{template}'")
            }
        }
    }
}

enum Piece<'a> {
    Literal(&'a str),
    /// `{name}` or `{name:default}`
    Token {
        name: &'a str,
        default: Option<&'a str>,
    },
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let mut pieces = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find(['{', '}']) {
        if rest.as_bytes()[open] == b'}' {
            return Err(TemplateError::Unbalanced {
                template: template.to_string(),
            });
        }
        let close = rest[open..].find('}').ok_or_else(|| TemplateError::Unbalanced {
            template: template.to_string(),
        })? + open;
        let token = &rest[open + 1..close];
        if token.is_empty() {
            return Err(TemplateError::EmptyToken {
                template: template.to_string(),
            });
        }
        if token.contains('{') {
            return Err(TemplateError::Unbalanced {
                template: template.to_string(),
            });
        }
        let (name, default) = match token.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (token, None),
        };
        if name.is_empty() {
            return Err(TemplateError::EmptyToken {
                template: template.to_string(),
            });
        }
        if open > 0 {
            pieces.push(Piece::Literal(&rest[..open]));
        }
        pieces.push(Piece::Token { name, default });
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    Ok(pieces)
}

/// Names of the tokens a template needs a value for, in order of
/// appearance. Tokens declaring a static default are left out.
///
/// # Errors
///
/// Fails on unbalanced braces or empty `{}` tokens.
pub fn template_tokens(template: &str) -> Result<Vec<String>, TemplateError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Token {
                name,
                default: None,
            } => Some(name.to_string()),
            Piece::Token { .. } | Piece::Literal(_) => None,
        })
        .collect())
}

/// Expands a path template, percent-encoding every substituted value except
/// for the characters in `skip`. An unbound `{name:default}` takes its
/// default verbatim.
///
/// # Errors
///
/// Fails when the template is malformed or a token has no value.
pub fn expand_path(
    template: &str,
    tokens: &IndexMap<String, String>,
    skip: &[char],
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for piece in parse(template)? {
        match piece {
            Piece::Literal(text) => out.push_str(text),
            Piece::Token { name, default } => match (tokens.get(name), default) {
                (Some(value), _) => out.push_str(&encode_skipping(value, skip)),
                (None, Some(default)) => out.push_str(default),
                (None, None) => {
                    return Err(TemplateError::Unresolved {
                        template: template.to_string(),
                        token: name.to_string(),
                    })
                }
            },
        }
    }
    Ok(out)
}

/// Replaces the tokens that have a value and leaves the others verbatim.
///
/// Values are inserted as-is; encoding happens where the result is placed.
#[must_use]
pub fn replace_tokens(value: &str, tokens: &IndexMap<String, String>) -> String {
    let Ok(pieces) = parse(value) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(value.len());
    for piece in pieces {
        match piece {
            Piece::Literal(text) => out.push_str(text),
            Piece::Token { name, default } => match (tokens.get(name), default) {
                (Some(replacement), _) => out.push_str(replacement),
                (None, Some(default)) => out.push_str(default),
                (None, None) => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            },
        }
    }
    out
}

/// Percent-encodes `value`, letting the characters in `skip` through literally.
#[must_use]
pub fn encode_skipping(value: &str, skip: &[char]) -> String {
    if skip.is_empty() {
        return urlencoding::encode(value).into_owned();
    }
    let mut out = String::with_capacity(value.len());
    let mut segment = String::new();
    for c in value.chars() {
        if skip.contains(&c) {
            out.push_str(&urlencoding::encode(&segment));
            segment.clear();
            out.push(c);
        } else {
            segment.push(c);
        }
    }
    out.push_str(&urlencoding::encode(&segment));
    out
}

/// Renders `k=v&k2` with both sides percent-encoded; `None` values emit the
/// bare key.
#[must_use]
pub fn encode_query(params: &[(String, Option<String>)]) -> String {
    params
        .iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)),
            None => urlencoding::encode(key).into_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Renders `;k=v;k2`, encoding values with the same skip set as the path.
#[must_use]
pub fn encode_matrix(params: &[(String, Option<String>)], skip: &[char]) -> String {
    params
        .iter()
        .map(|(key, value)| match value {
            Some(value) => format!(";{}={}", encode_skipping(key, skip), encode_skipping(value, skip)),
            None => format!(";{}", encode_skipping(key, skip)),
        })
        .collect()
}

/// Joins path fragments with exactly one `/` between them.
#[must_use]
pub fn join_paths<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        match (joined.ends_with('/'), part.starts_with('/')) {
            (true, true) => joined.push_str(&part[1..]),
            (false, false) if !joined.is_empty() => {
                joined.push('/');
                joined.push_str(part);
            }
            _ => joined.push_str(part),
        }
    }
    joined
}

/// Appends an already-encoded path, matrix and query onto a base endpoint.
///
/// # Errors
///
/// Returns the parse error if the assembled string is not a valid URL.
pub fn assemble(
    base: &Url,
    path: &str,
    matrix: &str,
    query: &str,
) -> Result<Url, url::ParseError> {
    let mut root = base.clone();
    let existing_query = root.query().map(str::to_string);
    root.set_query(None);
    root.set_fragment(None);

    let mut assembled = if path.is_empty() {
        root.as_str().to_string()
    } else {
        let trimmed = root.as_str().trim_end_matches('/').to_string();
        if path.starts_with('/') {
            format!("{trimmed}{path}")
        } else {
            format!("{trimmed}/{path}")
        }
    };
    assembled.push_str(matrix);

    let queries: Vec<&str> = [existing_query.as_deref().unwrap_or(""), query]
        .into_iter()
        .filter(|q| !q.is_empty())
        .collect();
    if !queries.is_empty() {
        assembled.push('?');
        assembled.push_str(&queries.join("&"));
    }
    Url::parse(&assembled)
}

/// Uses `original` verbatim when it has a host; otherwise takes scheme, host
/// and port from `default` and keeps the path, query and fragment of
/// `original`. The default's own path is not a base: `tenant` against
/// `http://h/v1/` is `http://h/tenant`.
///
/// Returns `None` when `original` is relative and there is no default.
#[must_use]
pub fn add_host_if_missing(original: &str, default: Option<&Url>) -> Option<Url> {
    if let Ok(url) = Url::parse(original) {
        if url.has_host() {
            return Some(url);
        }
    }
    let mut url = default?.clone();
    let (rest, fragment) = match original.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (original, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    url.set_path(&format!("/{}", path.trim_start_matches('/')));
    url.set_query(query);
    url.set_fragment(fragment);
    Some(url)
}

/// `host[:port]`, the port only when it is explicit.
#[must_use]
pub fn host_and_port(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn expand_encodes_reserved_characters() {
        let expanded = expand_path("/{p}", &tokens(&[("p", "/")]), &[]).unwrap();
        assert_eq!(expanded, "/%2F");
    }

    #[test]
    fn expand_lets_skipped_characters_through() {
        let expanded = expand_path("/{p}", &tokens(&[("p", "/")]), &['/']).unwrap();
        assert_eq!(expanded, "//");
        let expanded = expand_path("/{p}", &tokens(&[("p", "a b/c:d")]), &['/', ':']).unwrap();
        assert_eq!(expanded, "/a%20b/c:d");
    }

    #[test]
    fn expand_reports_unresolved_and_malformed_templates() {
        assert_eq!(
            expand_path("/{missing}", &IndexMap::new(), &[]),
            Err(TemplateError::Unresolved {
                template: "/{missing}".into(),
                token: "missing".into(),
            })
        );
        assert!(matches!(
            template_tokens("/{open"),
            Err(TemplateError::Unbalanced { .. })
        ));
        assert!(matches!(
            template_tokens("/{}"),
            Err(TemplateError::EmptyToken { .. })
        ));
    }

    #[test]
    fn unbound_tokens_fall_back_to_their_default() {
        let template = "/{version:v1}/items/{id:latest}";
        assert_eq!(template_tokens(template).unwrap(), Vec::<String>::new());
        assert_eq!(
            expand_path(template, &tokens(&[("id", "a b")]), &[]).unwrap(),
            "/v1/items/a%20b"
        );
        assert_eq!(template_tokens("/{id}/{rev:0}").unwrap(), vec!["id"]);
        assert_eq!(replace_tokens("{region:eu}-{zone}", &IndexMap::new()), "eu-{zone}");
        assert!(matches!(
            template_tokens("/{:v1}"),
            Err(TemplateError::EmptyToken { .. })
        ));
    }

    #[test]
    fn replace_tokens_keeps_unknown_tokens() {
        let replaced = replace_tokens("{a}-{b}", &tokens(&[("a", "1")]));
        assert_eq!(replaced, "1-{b}");
    }

    #[test]
    fn query_and_matrix_rendering() {
        let params = vec![
            ("x-ms-version".to_string(), Some("2009-07-17".to_string())),
            ("acl".to_string(), None),
            ("q".to_string(), Some("a b".to_string())),
        ];
        assert_eq!(encode_query(&params), "x-ms-version=2009-07-17&acl&q=a%20b");
        assert_eq!(encode_matrix(&params[..2], &[]), ";x-ms-version=2009-07-17;acl");
    }

    #[test]
    fn join_paths_normalizes_slashes() {
        assert_eq!(join_paths(["/client/", "/item"]), "/client/item");
        assert_eq!(join_paths(["/client", "item"]), "/client/item");
        assert_eq!(join_paths(["", "/{foo}"]), "/{foo}");
    }

    #[test]
    fn assemble_keeps_existing_path_and_query() {
        let base = Url::parse("http://localhost:9999/v1?sig=1").unwrap();
        let url = assemble(&base, "/items", ";a=b", "q=1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9999/v1/items;a=b?sig=1&q=1");

        let base = Url::parse("http://localhost:9999").unwrap();
        assert_eq!(assemble(&base, "//", "", "").unwrap().as_str(), "http://localhost:9999//");
    }

    #[test]
    fn add_host_if_missing_rebases_relative_references() {
        let default = Url::parse("http://foo/bar").unwrap();
        assert_eq!(
            add_host_if_missing("/mypath", Some(&default)).unwrap().as_str(),
            "http://foo/mypath"
        );
        assert_eq!(
            add_host_if_missing("http://bar/baz", Some(&default)).unwrap().as_str(),
            "http://bar/baz"
        );
        assert!(add_host_if_missing("/mypath", None).is_none());
    }

    #[test]
    fn add_host_if_missing_copies_only_the_authority() {
        let default = Url::parse("https://h:8443/v1/?sig=1").unwrap();
        assert_eq!(
            add_host_if_missing("tenant", Some(&default)).unwrap().as_str(),
            "https://h:8443/tenant"
        );
        assert_eq!(
            add_host_if_missing("/a/b?x=1#top", Some(&default)).unwrap().as_str(),
            "https://h:8443/a/b?x=1#top"
        );
    }

    #[test]
    fn host_and_port_only_shows_explicit_port() {
        assert_eq!(
            host_and_port(&Url::parse("http://localhost:9999/").unwrap()).as_deref(),
            Some("localhost:9999")
        );
        assert_eq!(
            host_and_port(&Url::parse("https://example.com/").unwrap()).as_deref(),
            Some("example.com")
        );
    }
}
