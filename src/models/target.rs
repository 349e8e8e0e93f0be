use std::fmt;

/// Namespace used by Docker Hub for official images
pub const OFFICIAL_NAMESPACE: &str = "library";

/// Placeholder namespace Docker uses for official images (`_/debian`)
const OFFICIAL_SENTINEL: &str = "_";

/// The (namespace, repository, tag) triple a watcher polls.
///
/// Only the first and last `/`-separated segments of the image string are
/// significant: `a/b/c` resolves to namespace `a` and repository `c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    namespace: String,
    repository: String,
    tag: String,
}

impl WatchTarget {
    pub fn parse(image: &str, tag: &str) -> Self {
        let parts: Vec<&str> = image.split('/').collect();

        let namespace = if parts.len() == 1 || parts[0] == OFFICIAL_SENTINEL {
            OFFICIAL_NAMESPACE
        } else {
            parts[0]
        };

        // split() always yields at least one segment
        let repository = parts.last().copied().unwrap_or(image);

        Self {
            namespace: namespace.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `{namespace}/{repository}` as used in registry API paths
    pub fn image_path(&self) -> String {
        format!("{}/{}", self.namespace, self.repository)
    }

    /// Tag metadata endpoint under the given registry base URL
    pub fn endpoint(&self, registry_url: &str) -> String {
        format!(
            "{}/v2/repositories/{}/tags/{}",
            registry_url.trim_end_matches('/'),
            self.image_path(),
            self.tag
        )
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.repository, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_official_image_without_namespace() {
        let target = WatchTarget::parse("debian", "10");
        assert_eq!(target.namespace(), "library");
        assert_eq!(target.repository(), "debian");
        assert_eq!(target.image_path(), "library/debian");
    }

    #[test]
    fn test_official_image_sentinel_namespace() {
        let target = WatchTarget::parse("_/nginx", "latest");
        assert_eq!(target.namespace(), "library");
        assert_eq!(target.repository(), "nginx");
    }

    #[test]
    fn test_user_image() {
        let target = WatchTarget::parse("containrrr/watchtower", "latest");
        assert_eq!(target.image_path(), "containrrr/watchtower");
    }

    #[test]
    fn test_middle_segments_are_dropped() {
        let target = WatchTarget::parse("a/b/c", "v1");
        assert_eq!(target.namespace(), "a");
        assert_eq!(target.repository(), "c");
        assert_eq!(target.image_path(), "a/c");
    }

    #[test]
    fn test_endpoint() {
        let target = WatchTarget::parse("debian", "10");
        assert_eq!(
            target.endpoint("https://hub.docker.com"),
            "https://hub.docker.com/v2/repositories/library/debian/tags/10"
        );
        assert_eq!(
            target.endpoint("http://localhost:8080/"),
            "http://localhost:8080/v2/repositories/library/debian/tags/10"
        );
    }

    #[test]
    fn test_display() {
        let target = WatchTarget::parse("containrrr/watchtower", "latest");
        assert_eq!(target.to_string(), "containrrr/watchtower:latest");
    }
}
