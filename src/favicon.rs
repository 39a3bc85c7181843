use url::Url;

const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons?sz=64&domain=";

/// Builds the favicon-service URL for the host of `website_url`.
///
/// Returns an empty string when the URL cannot be parsed. Nothing is fetched.
pub fn favicon_url(website_url: &str) -> String {
    let parsed = match Url::parse(website_url.trim()) {
        Ok(url) => url,
        Err(_) => return String::new(),
    };

    let host = parsed.host_str().unwrap_or_default();
    let domain = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    format!("{}{}", FAVICON_SERVICE, domain)
}
