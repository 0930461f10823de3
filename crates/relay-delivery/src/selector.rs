//! Selection of the endpoints one dispatch delivers to.
//!
//! Configured workflow lists are treated as noisy input: blanks, relative
//! paths and other non-URLs are skipped rather than reported, and the result
//! is capped so a misconfigured list cannot fan out without bound.

use url::Url;

/// Hard ceiling on endpoints per dispatch.
pub const MAX_WORKFLOWS: usize = 10;

/// Returns the working set for one dispatch.
///
/// Keeps the first [`MAX_WORKFLOWS`] entries that parse as absolute URLs
/// with a host, in configured order. Duplicates are kept; each becomes its
/// own delivery.
pub fn select_endpoints<S: AsRef<str>>(workflows: &[S]) -> Vec<Url> {
    workflows
        .iter()
        .filter_map(|raw| {
            let endpoint = parse_endpoint(raw.as_ref());
            if endpoint.is_none() {
                tracing::debug!("skipping malformed workflow url");
            }
            endpoint
        })
        .take(MAX_WORKFLOWS)
        .collect()
}

/// Parses one configured entry, returning `None` unless it is an absolute
/// URL with both a scheme and a host.
pub fn parse_endpoint(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let url = Url::parse(trimmed).ok()?;
    match url.host_str() {
        Some(host) if !host.is_empty() && !url.scheme().is_empty() => Some(url),
        _ => None,
    }
}

/// Returns the configured entries [`select_endpoints`] would skip.
///
/// Dispatch never reports these; configuration loading uses this to warn
/// about them once.
pub fn invalid_endpoints<S: AsRef<str>>(workflows: &[S]) -> Vec<&str> {
    workflows
        .iter()
        .map(|raw| raw.as_ref())
        .filter(|raw| parse_endpoint(raw).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_absolute_urls_in_order() {
        let selected = select_endpoints(&[
            "https://a.example.com/hook",
            "not a url",
            "http://localhost:4000/track",
        ]);

        let urls: Vec<&str> = selected.iter().map(Url::as_str).collect();
        assert_eq!(urls, vec!["https://a.example.com/hook", "http://localhost:4000/track"]);
    }

    #[test]
    fn drops_relative_blank_and_hostless_entries() {
        let selected = select_endpoints(&[
            "",
            "   ",
            "/relative/path",
            "example.com/no-scheme",
            "localhost:4000",
            "mailto:ops@example.com",
            "http://",
        ]);

        assert!(selected.is_empty());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let selected = select_endpoints(&["  https://a.example.com/hook \n"]);
        assert_eq!(selected[0].as_str(), "https://a.example.com/hook");
    }

    #[test]
    fn caps_at_ten_after_filtering() {
        let mut workflows = vec!["garbage".to_string(), "".to_string()];
        workflows.extend((0..12).map(|i| format!("https://hooks.example.com/{i}")));

        let selected = select_endpoints(&workflows);

        assert_eq!(selected.len(), MAX_WORKFLOWS);
        assert_eq!(selected[0].path(), "/0");
        assert_eq!(selected[9].path(), "/9");
    }

    #[test]
    fn duplicates_are_kept() {
        let route = "http://localhost:4000/track/success";
        let selected = select_endpoints(&[route, "http://localhost:4000/track/error", route]);

        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0], selected[2]);
    }

    #[test]
    fn empty_list_selects_nothing() {
        let workflows: Vec<String> = Vec::new();
        assert!(select_endpoints(&workflows).is_empty());
    }

    #[test]
    fn invalid_entries_reported_for_configuration() {
        let invalid = invalid_endpoints(&["https://ok.example.com", "nope", ""]);
        assert_eq!(invalid, vec!["nope", ""]);
    }
}
