//! Upstream URL builders

use crate::error::{IngestError, Result};
use url::Url;

/// Placeholder substituted in the profile URL template
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Fixed directory query parameters
pub const DIRECTORY_QUERY_SOURCE: &str = "w";
pub const DIRECTORY_SLUG: &str = "usa";

fn parse(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| IngestError::config(format!("invalid URL '{}': {}", raw, e)))
}

/// Build listing URL for one subject page
pub fn listing_url(
    base_url: &str,
    subject_id: i64,
    page: u32,
    page_size: u32,
    filters: &[(String, String)],
) -> Result<Url> {
    let mut url = parse(base_url)?;
    url.query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("items", &page_size.to_string())
        .append_pair("university_id", &subject_id.to_string())
        .extend_pairs(filters.iter());
    Ok(url)
}

/// Percent-encode `segment` as a single path segment
fn encode_segment(segment: &str) -> Result<String> {
    let mut scratch = parse("http://localhost/")?;
    scratch
        .path_segments_mut()
        .map_err(|_| IngestError::config("cannot build a path segment"))?
        .pop_if_empty()
        .push(segment);
    Ok(scratch.path().trim_start_matches('/').to_string())
}

/// Build profile URL for a username
///
/// The username always lands in one path segment, whatever it contains.
pub fn profile_url(template: &str, username: &str) -> Result<Url> {
    let segment = encode_segment(username.trim())?;
    parse(&template.replace(USERNAME_PLACEHOLDER, &segment))
}

/// Build directory URL for one page
pub fn directory_url(base_url: &str, page: u32, page_size: u32) -> Result<Url> {
    let mut url = parse(base_url)?;
    url.query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("items", &page_size.to_string())
        .append_pair("query_source", DIRECTORY_QUERY_SOURCE)
        .append_pair("slug", DIRECTORY_SLUG);
    Ok(url)
}

/// Build rankings URL for one page, keeping the base query
pub fn rankings_url(base_url: &str, page: u32) -> Result<Url> {
    let mut url = parse(base_url)?;
    url.query_pairs_mut().append_pair("_page", &page.to_string());
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_url() {
        let filters = vec![
            ("application_status".to_string(), "6,7".to_string()),
            ("level".to_string(), "2".to_string()),
        ];
        let url = listing_url("http://localhost:9000/connect/filter", 42, 3, 9, &filters).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/connect/filter");
        assert_eq!(pairs[0], ("page".to_string(), "3".to_string()));
        assert_eq!(pairs[1], ("items".to_string(), "9".to_string()));
        assert_eq!(pairs[2], ("university_id".to_string(), "42".to_string()));
        assert_eq!(pairs[3], ("application_status".to_string(), "6,7".to_string()));
        assert_eq!(pairs.len(), 5);
    }

    #[test]
    fn test_profile_url() {
        let url = profile_url("http://localhost:9000/users/profile/{username}/1", "ana_k").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/users/profile/ana_k/1");
    }

    #[test]
    fn test_profile_url_encodes_reserved_characters() {
        let url = profile_url("http://localhost:9000/users/profile/{username}/1", "a/b?c#d e").unwrap();
        assert_eq!(url.path(), "/users/profile/a%2Fb%3Fc%23d%20e/1");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn test_directory_url() {
        let url = directory_url("http://localhost:9000/explore/list", 2, 21).unwrap();
        assert_eq!(
            url.query(),
            Some("page=2&items=21&query_source=w&slug=usa")
        );
    }

    #[test]
    fn test_rankings_url_keeps_program_filter() {
        let url = rankings_url("http://localhost:9000/api/search?format=json&program=cs", 4).unwrap();
        assert_eq!(url.query(), Some("format=json&program=cs&_page=4"));
    }

    #[test]
    fn test_invalid_base_is_config_error() {
        assert!(matches!(
            listing_url("not a url", 1, 0, 9, &[]),
            Err(IngestError::Config(_))
        ));
    }
}
