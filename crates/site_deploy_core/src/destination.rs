//! Destination key layout inside the published bucket.

pub const DEPLOYMENT_MARKER_PREFIX: &str = "deploy-";

pub fn normalize_prefix(raw: &str) -> String {
    raw.trim_matches('/').to_string()
}

/// Prefix used for listing, so that `site` never matches `site-old/...`.
pub fn listing_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

pub fn object_key(prefix: &str, relative_path: &str) -> String {
    let relative = relative_path.trim_start_matches('/');
    format!("{}{relative}", listing_prefix(prefix))
}

pub fn relative_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(listing_prefix(prefix).as_str())
}

pub fn default_distribution_path(raw_prefix: &str) -> String {
    format!("/{}*", listing_prefix(raw_prefix))
}

pub fn s3_url(bucket: &str, prefix: &str) -> String {
    format!("s3://{bucket}/{}", listing_prefix(prefix))
}

/// Name of a top-level folder as returned by a delimiter listing (`deploy-1/`).
pub fn top_level_name(common_prefix: &str) -> &str {
    common_prefix.trim_end_matches('/')
}

pub fn is_deployment_marker(name: &str) -> bool {
    name.len() > DEPLOYMENT_MARKER_PREFIX.len() && name.starts_with(DEPLOYMENT_MARKER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_trimmed_of_slashes() {
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/site/"), "site");
        assert_eq!(normalize_prefix("a/b"), "a/b");
    }

    #[test]
    fn keys_join_prefix_and_relative_path() {
        assert_eq!(object_key("", "index.html"), "index.html");
        assert_eq!(object_key("deploy-1", "css/app.css"), "deploy-1/css/app.css");
        assert_eq!(object_key("deploy-1/", "/index.html"), "deploy-1/index.html");
    }

    #[test]
    fn relative_key_strips_only_own_prefix() {
        assert_eq!(relative_key("site", "site/a.txt"), Some("a.txt"));
        assert_eq!(relative_key("site", "site-old/a.txt"), None);
        assert_eq!(relative_key("", "a.txt"), Some("a.txt"));
    }

    #[test]
    fn default_distribution_path_wraps_prefix() {
        assert_eq!(default_distribution_path(""), "/*");
        assert_eq!(default_distribution_path("/"), "/*");
        assert_eq!(default_distribution_path("deploy-1"), "/deploy-1/*");
        assert_eq!(default_distribution_path("/deploy-1/"), "/deploy-1/*");
    }

    #[test]
    fn recognizes_deployment_markers() {
        assert!(is_deployment_marker("deploy-abc"));
        assert!(!is_deployment_marker("deploy-"));
        assert!(!is_deployment_marker("assets"));
        assert_eq!(top_level_name("deploy-1/"), "deploy-1");
    }
}
