use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

const URL_PATTERN: &str = r#"(?x)
    (?P<full>https?://[^\s<>"'`]+)
    |
    (?P<bare>
        \b[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?
        (?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*
        \.[a-z]{2,}\b
        (?:/[^\s<>"'`]*)?
    )
"#;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(URL_PATTERN).expect("Invalid URL regex"));

/// Drop sentence punctuation and unbalanced closing brackets from the end.
fn trim_candidate(raw: &str) -> &str {
    let mut s = raw;
    while let Some(last) = s.chars().last() {
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '*' => true,
            ')' => s.matches('(').count() < s.matches(')').count(),
            ']' => s.matches('[').count() < s.matches(']').count(),
            '}' => s.matches('{').count() < s.matches('}').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        s = &s[..s.len() - last.len_utf8()];
    }
    s
}

fn preceded_by_at(text: &str, start: usize) -> bool {
    text[..start].ends_with('@')
}

fn with_scheme(candidate: &str) -> String {
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        candidate.to_string()
    } else {
        format!("https://{candidate}")
    }
}

/// One recognised URL: its byte span in the source text (after trimming)
/// and the scheme-normalised form.
struct UrlToken {
    start: usize,
    end: usize,
    url: String,
}

fn url_tokens(text: &str) -> impl Iterator<Item = UrlToken> + '_ {
    URL_RE.find_iter(text).filter_map(move |m| {
        if preceded_by_at(text, m.start()) {
            return None;
        }
        let trimmed = trim_candidate(m.as_str());
        if trimmed.is_empty() {
            return None;
        }
        let url = with_scheme(trimmed);
        let has_dotted_host = Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.contains('.')))
            .unwrap_or(false);
        has_dotted_host.then(|| UrlToken {
            start: m.start(),
            end: m.start() + trimmed.len(),
            url,
        })
    })
}

/// Every URL-looking token in `text`, normalised to carry a scheme.
///
/// Recognises `http(s)://` URLs, `www.` hosts and bare `label.tld[/path]`
/// domains. E-mail addresses are ignored. Order of first appearance is kept
/// and duplicates are dropped.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    url_tokens(text)
        .filter(|t| seen.insert(t.url.clone()))
        .map(|t| t.url)
        .collect()
}

/// Copy of `text` without the URL tokens `keep` rejects.
///
/// `keep` sees the same normalised form [`extract_urls`] returns. Only whole
/// tokens are cut, so a rejected URL never truncates a longer one it
/// prefixes; punctuation trimmed off a token stays in place.
pub fn retain_urls<F>(text: &str, mut keep: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for token in url_tokens(text) {
        if !keep(&token.url) {
            out.push_str(&text[last..token.start]);
            last = token.end;
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Rewrite bare domains in free text to `https://` form. URLs that already
/// carry a scheme and e-mail addresses are left alone.
pub fn ensure_urls_have_protocol(text: &str) -> String {
    URL_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let Some(bare) = caps.name("bare") else {
                return caps[0].to_string();
            };
            if preceded_by_at(text, bare.start()) {
                bare.as_str().to_string()
            } else {
                format!("https://{}", bare.as_str())
            }
        })
        .into_owned()
}
