//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Last non-empty path segment of a URL, without query or fragment.
pub fn file_name_from_url(url_str: &str) -> Option<String> {
    let segment = match Url::parse(url_str) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(_) => url_str
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').find(|s| !s.is_empty()))
            .map(str::to_string),
    };
    segment.filter(|s| s != "." && s != "..")
}

/// Value of a query parameter, if present and non-empty.
pub fn query_param(url_str: &str, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    let url = Url::parse(url_str).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Guess an image content type from a file name, defaulting to JPEG.
pub fn guess_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.jpg"),
            "https://example.com/path/page.jpg"
        );
        assert_eq!(
            resolve_url(&base, "//cdn.example.com/x.jpg"),
            "https://cdn.example.com/x.jpg"
        );
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://akimages.shoplocal.com/a/b/1200.0.90.0/p1.jpg?x=1"),
            Some("p1.jpg".to_string())
        );
        assert_eq!(
            file_name_from_url("https://example.com/dir/"),
            Some("dir".to_string())
        );
        assert_eq!(file_name_from_url("https://example.com/"), None);
        assert_eq!(file_name_from_url("not a url/x.png?y"), Some("x.png".to_string()));
    }

    #[test]
    fn test_query_param() {
        let url = "https://aldi.us/weekly-specials/our-weekly-ads/?storeref=4821&lang=en";
        assert_eq!(query_param(url, "storeref"), Some("4821".to_string()));
        assert_eq!(query_param(url, "missing"), None);
        assert_eq!(query_param("store-7", "storeref"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a.PNG"), "image/png");
        assert_eq!(guess_content_type("a.webp"), "image/webp");
        assert_eq!(guess_content_type("noext"), "image/jpeg");
    }
}
