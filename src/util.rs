use reqwest::Url;

/// Parse "true"/"false"/"1"/"0" style flags.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Reads a boolean environment flag, falling back to `default` when unset or unparseable.
pub fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|value| parse_bool_str(&value))
        .unwrap_or(default)
}

/// Returns true for localhost, loopback IPv4/IPv6, and 0.0.0.0 URLs.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };

    match parsed.host_str() {
        Some(host) => {
            let host = host.trim().to_ascii_lowercase();
            host == "localhost"
                || host == "[::1]"
                || host == "::1"
                || host == "0.0.0.0"
                || host.starts_with("127.")
        }
        None => false,
    }
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_str_variants() {
        assert_eq!(parse_bool_str("true"), Some(true));
        assert_eq!(parse_bool_str(" ON "), Some(true));
        assert_eq!(parse_bool_str("0"), Some(false));
        assert_eq!(parse_bool_str("off"), Some(false));
        assert_eq!(parse_bool_str("maybe"), None);
    }

    #[test]
    fn test_is_local_endpoint_url_normalizes_case_and_space() {
        assert!(is_local_endpoint_url(" HTTP://LOCALHOST:3000/api/chat/stream "));
        assert!(is_local_endpoint_url("https://127.0.0.1/api/chat/stream"));
        assert!(is_local_endpoint_url("http://0.0.0.0:3000/api/chat/stream"));
        assert!(!is_local_endpoint_url("https://evil-localhost.com/api"));
        assert!(!is_local_endpoint_url("https://shop.example.com/api/chat/stream"));
        assert!(!is_local_endpoint_url("not a url"));
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("hello", 10), "hello");
        assert_eq!(excerpt("hello", 3), "hel");
        assert_eq!(excerpt("héllo wörld", 2), "hé");
        assert_eq!(excerpt("", 5), "");
    }
}
