/// Circuit key for a URL: its lowercase host, so every path on one site
/// shares a breaker. Unparsable or host-less inputs key on the raw string.
pub fn circuit_key_for_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}
