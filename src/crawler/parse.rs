//! HTML reduction: a fetched page becomes (title, text, crawlable links).

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// File extensions that are never worth fetching as pages.
const SKIP_EXT: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".mp4", ".mp3", ".wav",
    ".zip", ".rar", ".7z", ".gz", ".css", ".js", ".json", ".xml", ".txt", ".ppt", ".pptx",
    ".doc", ".docx", ".xls", ".xlsx",
];

#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
}

fn script_style_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")
            .expect("static regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"))
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"))
}

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#).expect("static regex")
    })
}

pub fn parse(html: &str, base: &Url) -> ParsedPage {
    let title = title_regex()
        .captures(html)
        .map(|cap| collapse_whitespace(&decode_entities(&cap[1])))
        .unwrap_or_default();

    let without_blocks = script_style_regex().replace_all(html, " ");
    let without_tags = tag_regex().replace_all(&without_blocks, " ");
    let text = collapse_whitespace(&decode_entities(&without_tags));

    let links = href_regex()
        .captures_iter(html)
        .filter_map(|cap| norm_link(&cap[1], base))
        .collect();

    ParsedPage { title, text, links }
}

/// Resolve a raw href against the page base; `None` for fragments,
/// javascript links, non-http(s) schemes and static-file extensions.
pub fn norm_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_lowercase().starts_with("javascript:") {
        return None;
    }

    let absolute = base.join(href).ok()?;
    if !matches!(absolute.scheme(), "http" | "https") {
        return None;
    }

    let path = absolute.path().to_lowercase();
    if SKIP_EXT.iter().any(|ext| path.ends_with(ext)) {
        return None;
    }

    Some(absolute.to_string())
}

pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.test/docs/").unwrap()
    }

    #[test]
    fn parse_extracts_title_text_and_links() {
        let html = r#"
            <html>
            <head><title>  Acme &amp; Co  </title><script>var x = 1;</script></head>
            <body>
                <style>.h { color: red }</style>
                <h1>Hello</h1>
                <p>World</p>
                <a href="/about">About</a>
                <a href="https://other.test/page">Other</a>
            </body>
            </html>
        "#;

        let page = parse(html, &base());
        assert_eq!(page.title, "Acme & Co");
        assert!(page.text.contains("Hello"));
        assert!(page.text.contains("World"));
        assert!(!page.text.contains("var x"));
        assert!(!page.text.contains('<'));
        assert!(page.links.contains(&"https://example.test/about".to_string()));
        assert!(page.links.contains(&"https://other.test/page".to_string()));
    }

    #[test]
    fn norm_link_resolves_relative_urls() {
        assert_eq!(
            norm_link("guide.html", &base()),
            Some("https://example.test/docs/guide.html".to_string())
        );
        assert_eq!(
            norm_link("/pricing", &base()),
            Some("https://example.test/pricing".to_string())
        );
    }

    #[test]
    fn norm_link_rejects_fragments_scripts_and_static_files() {
        assert_eq!(norm_link("#section", &base()), None);
        assert_eq!(norm_link("javascript:void(0)", &base()), None);
        assert_eq!(norm_link("mailto:hi@example.test", &base()), None);
        assert_eq!(norm_link("/brochure.pdf", &base()), None);
        assert_eq!(norm_link("/logo.PNG", &base()), None);
    }

    #[test]
    fn same_host_compares_hosts_only() {
        let a = Url::parse("https://example.test/a").unwrap();
        let b = Url::parse("https://example.test:8443/b").unwrap();
        let c = Url::parse("https://sub.example.test/").unwrap();
        assert!(same_host(&a, &b));
        assert!(!same_host(&a, &c));
    }
}
