//! Link extraction from fetched HTML documents.

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Extract absolute http(s) links from `<a href>` and `<link href>`
/// elements, resolved against `base_url`.  Fragments are dropped so the
/// same page is not crawled once per anchor.
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href], link[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut absolute) = base_url.join(href) else {
            debug!(href, "unresolvable href");
            continue;
        };
        absolute.set_fragment(None);
        if absolute.scheme() == "http" || absolute.scheme() == "https" {
            links.push(absolute.into());
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://tunes.example.com/books/index.html").unwrap()
    }

    #[test]
    fn relative_and_absolute_hrefs_are_resolved() {
        let html = r#"<html><body>
            <a href="session.abc">Session</a>
            <a href="/top-level.html">Top</a>
            <a href="http://other.example.com/x.abc">Other</a>
        </body></html>"#;
        let links = extract_links(html, &base());
        assert_eq!(
            links,
            vec![
                "http://tunes.example.com/books/session.abc",
                "http://tunes.example.com/top-level.html",
                "http://other.example.com/x.abc",
            ]
        );
    }

    #[test]
    fn non_http_schemes_are_filtered() {
        let html = r#"<a href="mailto:x@example.com">m</a>
                      <a href="ftp://files.example.com/a">f</a>
                      <a href="javascript:void(0)">j</a>
                      <a href="https://ok.example.com/">ok</a>"#;
        let links = extract_links(html, &base());
        assert_eq!(links, vec!["https://ok.example.com/"]);
    }

    #[test]
    fn link_elements_are_included() {
        let html = r#"<head><link rel="alternate" href="feed.abc"></head>"#;
        let links = extract_links(html, &base());
        assert_eq!(links, vec!["http://tunes.example.com/books/feed.abc"]);
    }

    #[test]
    fn fragments_are_stripped() {
        let html = r##"<a href="page.html#part2">p</a>"##;
        let links = extract_links(html, &base());
        assert_eq!(links, vec!["http://tunes.example.com/books/page.html"]);
    }

    #[test]
    fn documents_without_links_yield_nothing() {
        assert!(extract_links("<p>plain text</p>", &base()).is_empty());
    }
}
