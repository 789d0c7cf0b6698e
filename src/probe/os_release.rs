//! `/etc/os-release` parsing.

use std::collections::BTreeMap;
use std::path::Path;

/// Locations searched for the release file, in order.
pub const OS_RELEASE_PATHS: &[&str] = &["/etc/os-release", "/usr/lib/os-release"];

/// Parsed `KEY=value` pairs from an os-release file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    fields: BTreeMap<String, String>,
}

impl OsRelease {
    /// Parse os-release content.
    ///
    /// Blank lines and comments are ignored, surrounding single or double
    /// quotes are stripped from values.
    pub fn parse(content: &str) -> Self {
        let fields = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), unquote(value.trim()).to_string()))
            .collect();
        Self { fields }
    }

    /// Read the first release file that exists.
    pub fn read() -> Option<Self> {
        OS_RELEASE_PATHS
            .iter()
            .find_map(|path| Self::read_from(Path::new(path)))
    }

    /// Read a specific release file.
    pub fn read_from(path: &Path) -> Option<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Some(Self::parse(&content)),
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get("ID")
    }

    pub fn version_id(&self) -> Option<&str> {
        self.get("VERSION_ID")
    }

    pub fn version(&self) -> Option<&str> {
        self.get("VERSION")
    }

    /// `PRETTY_NAME`, falling back to `NAME VERSION`.
    pub fn pretty_name(&self) -> Option<String> {
        if let Some(pretty) = self.get("PRETTY_NAME") {
            return Some(pretty.to_string());
        }
        match (self.get("NAME"), self.version()) {
            (Some(name), Some(version)) => Some(format!("{} {}", name, version)),
            (Some(name), None) => Some(name.to_string()),
            _ => None,
        }
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOBLE: &str = r#"PRETTY_NAME="Ubuntu 24.04.1 LTS"
NAME="Ubuntu"
VERSION_ID="24.04"
VERSION="24.04.1 LTS (Noble Numbat)"
VERSION_CODENAME=noble
ID=ubuntu
ID_LIKE=debian
"#;

    #[test]
    fn parses_ubuntu_release() {
        let release = OsRelease::parse(NOBLE);
        assert_eq!(release.id(), Some("ubuntu"));
        assert_eq!(release.version_id(), Some("24.04"));
        assert_eq!(release.version(), Some("24.04.1 LTS (Noble Numbat)"));
        assert_eq!(release.get("VERSION_CODENAME"), Some("noble"));
        assert_eq!(release.pretty_name().as_deref(), Some("Ubuntu 24.04.1 LTS"));
    }

    #[test]
    fn ignores_comments_and_junk() {
        let release = OsRelease::parse("# comment\n\nnot a pair\nID='debian'\n");
        assert_eq!(release.id(), Some("debian"));
        assert_eq!(release.get("not a pair"), None);
    }

    #[test]
    fn value_may_contain_equals() {
        let release = OsRelease::parse("HOME_URL=\"https://example.com/?a=b\"");
        assert_eq!(release.get("HOME_URL"), Some("https://example.com/?a=b"));
    }

    #[test]
    fn pretty_name_falls_back_to_name_and_version() {
        let release = OsRelease::parse("NAME=Ubuntu\nVERSION=\"24.04 LTS\"");
        assert_eq!(release.pretty_name().as_deref(), Some("Ubuntu 24.04 LTS"));
        assert_eq!(OsRelease::default().pretty_name(), None);
    }

    #[test]
    fn read_from_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(OsRelease::read_from(&dir.path().join("os-release")).is_none());
    }

    #[test]
    fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, NOBLE).unwrap();
        let release = OsRelease::read_from(&path).unwrap();
        assert_eq!(release.version_id(), Some("24.04"));
    }
}
