//! # Response Module
//!
//! The immutable result of a successful fetch: the final URL (after
//! redirects) paired with the response body, plus the URL joining helper
//! that parse callbacks use to resolve links found in a page.
//!
//! ## URL joining
//!
//! `url_join` is deliberately naïve path concatenation, not RFC 3986
//! resolution. Absolute URLs pass through, a leading `/` is resolved
//! against the scheme and authority, and everything else is appended to
//! the full response URL with a `/` separator. Callers depend on these
//! exact semantics; do not substitute `Url::join`.

use url::Url;

/// An immutable `{url, body}` pair produced by a completed fetch.
#[derive(Debug, Clone)]
pub struct Response {
    /// The final URL after redirect following.
    pub url: Url,
    /// The response body, decoded as text.
    pub body: String,
}

impl Response {
    /// Creates a response from a final URL and its body.
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Response {
            url,
            body: body.into(),
        }
    }

    /// Joins `path` against this response's URL using naïve concatenation.
    ///
    /// - `"http…"` is returned as-is,
    /// - `"/p"` becomes `scheme://authority/p`,
    /// - anything else becomes `<response url>/<path>`.
    pub fn url_join(&self, path: &str) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        if let Some(rest) = path.strip_prefix('/') {
            return format!("{}://{}/{}", self.url.scheme(), self.authority(), rest);
        }
        // `Url` renders a bare authority as `host/`; strip only that
        // artifact so the base matches the raw string form. A genuine
        // directory path keeps its slash and concatenates literally.
        let rendered = self.url.as_str();
        let base = if self.url.path() == "/" {
            rendered.strip_suffix('/').unwrap_or(rendered)
        } else {
            rendered
        };
        format!("{}/{}", base, path)
    }

    /// The `host[:port]` component of the response URL.
    fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str) -> Response {
        Response::new(Url::parse(url).unwrap(), "")
    }

    #[test]
    fn absolute_urls_pass_through() {
        let r = response("http://example.com/a/b");
        assert_eq!(r.url_join("https://other.net/x"), "https://other.net/x");
        assert_eq!(r.url_join("http://other.net"), "http://other.net");
    }

    #[test]
    fn rooted_paths_resolve_against_authority() {
        let r = response("http://example.com/a/b");
        assert_eq!(r.url_join("/c/d"), "http://example.com/c/d");

        let r = response("http://localhost:9090/pages/index.html");
        assert_eq!(r.url_join("/top.html"), "http://localhost:9090/top.html");
    }

    #[test]
    fn relative_paths_append_to_the_full_url() {
        let r = response("http://example.com/a/b");
        assert_eq!(r.url_join("c.html"), "http://example.com/a/b/c.html");
    }

    #[test]
    fn bare_authority_slash_collapses() {
        let r = response("http://example.com");
        assert_eq!(r.url_join("c.html"), "http://example.com/c.html");
    }

    #[test]
    fn directory_paths_concatenate_literally() {
        let r = response("http://example.com/a/");
        assert_eq!(r.url_join("c.html"), "http://example.com/a//c.html");
    }
}
