use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// Largest value any version component may hold.
pub const MAX_COMPONENT: u32 = 65535;

/// A dotted version number of one to four components
/// (`major[.minor[.build[.revision]]]`).
///
/// Components are populated contiguously from the left: `build` is only ever
/// set when `minor` is, and `revision` only when `build` is. Ordering treats an
/// absent component as `0`, so `1.2` and `1.2.0` compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub major: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,
    /// Tag text this version was parsed from, cleared once incremented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?$")
            .unwrap_or_else(|e| panic!("invalid version pattern: {}", e))
    })
}

fn parse_component(text: &str) -> Option<u32> {
    let value = text.parse::<u32>().ok()?;
    (value <= MAX_COMPONENT).then_some(value)
}

impl Version {
    /// Create a three-component version (`major.minor.build`).
    pub fn new(major: u32, minor: u32, build: u32) -> Self {
        Version {
            major,
            minor: Some(minor),
            build: Some(build),
            revision: None,
            original: None,
        }
    }

    /// Version used when nothing in the history says otherwise: `0.0.1`.
    pub fn initial() -> Self {
        Version::new(0, 0, 1)
    }

    /// Parse a tag name such as `v1.2.3` or `2.0.0.17`.
    ///
    /// An optional leading `v`/`V` is stripped, then the rest must consist of
    /// one to four dot-separated unsigned integers, each at most 65535.
    /// Anything else (`release`, `v1.2-beta`, `1.70000`) is not a version and
    /// yields `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        let numeral = tag
            .strip_prefix('v')
            .or_else(|| tag.strip_prefix('V'))
            .unwrap_or(tag);

        let captures = version_regex().captures(numeral)?;
        let component = |index: usize| -> Option<Option<u32>> {
            match captures.get(index) {
                Some(m) => parse_component(m.as_str()).map(Some),
                None => Some(None),
            }
        };

        Some(Version {
            major: component(1)??,
            minor: component(2)?,
            build: component(3)?,
            revision: component(4)?,
            original: Some(tag.to_string()),
        })
    }

    /// Whether the version carries at least `major.minor`.
    ///
    /// Only such versions may anchor a lineage during resolution.
    pub fn has_minor(&self) -> bool {
        self.minor.is_some()
    }

    /// Number of populated components (1 to 4).
    pub fn component_count(&self) -> usize {
        1 + [self.minor, self.build, self.revision]
            .iter()
            .filter(|c| c.is_some())
            .count()
    }

    /// Bump the right-most populated component by one.
    ///
    /// `1.2.3` becomes `1.2.4`, `1.2` becomes `1.3` and a bare `4` becomes `5`.
    /// Components saturate at 65535.
    pub fn increment(&self) -> Self {
        let bump = |c: u32| c.saturating_add(1).min(MAX_COMPONENT);
        let mut next = self.clone();
        next.original = None;

        if let Some(revision) = next.revision {
            next.revision = Some(bump(revision));
        } else if let Some(build) = next.build {
            next.build = Some(bump(build));
        } else if let Some(minor) = next.minor {
            next.minor = Some(bump(minor));
        } else {
            next.major = bump(next.major);
        }
        next
    }

    /// Tag text the version came from, if it was parsed from one.
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// Convert to a SemVer version.
    ///
    /// `major.minor.build` map onto `major.minor.patch`; a revision is carried
    /// as build metadata (`1.2.3+7`).
    pub fn to_semver(&self) -> semver::Version {
        let mut version = semver::Version::new(
            u64::from(self.major),
            u64::from(self.minor.unwrap_or(0)),
            u64::from(self.build.unwrap_or(0)),
        );
        if let Some(revision) = self.revision {
            if let Ok(metadata) = semver::BuildMetadata::new(&revision.to_string()) {
                version.build = metadata;
            }
        }
        version
    }

    fn key(&self) -> (u32, u32, u32, u32) {
        (
            self.major,
            self.minor.unwrap_or(0),
            self.build.unwrap_or(0),
            self.revision.unwrap_or(0),
        )
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::initial()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        for component in [self.minor, self.build, self.revision]
            .into_iter()
            .map_while(|c| c)
        {
            write!(f, ".{}", component)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = Version::parse("v1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, Some(2));
        assert_eq!(v.build, Some(3));
        assert_eq!(v.revision, None);
        assert_eq!(v.original(), Some("v1.2.3"));
    }

    #[test]
    fn test_version_parse_uppercase_v() {
        let v = Version::parse("V1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
    }

    #[test]
    fn test_version_parse_component_counts() {
        assert_eq!(Version::parse("7").unwrap().component_count(), 1);
        assert_eq!(Version::parse("7.1").unwrap().component_count(), 2);
        assert_eq!(Version::parse("7.1.0").unwrap().component_count(), 3);
        assert_eq!(Version::parse("v7.1.0.9").unwrap().component_count(), 4);
    }

    #[test]
    fn test_version_parse_invalid() {
        for tag in [
            "",
            "v",
            "release",
            "1.2.3.4.5",
            "v1.2-beta",
            "1..2",
            ".1",
            "1.",
            "vv1.2",
            "x1.2",
            " 1.2",
            "1.2 ",
            "-1.2",
        ] {
            assert!(Version::parse(tag).is_none(), "{:?} should not parse", tag);
        }
    }

    #[test]
    fn test_version_parse_component_range() {
        assert!(Version::parse("65535.65535.65535.65535").is_some());
        assert!(Version::parse("1.65536").is_none());
        assert!(Version::parse("99999999999").is_none());
    }

    #[test]
    fn test_version_format_keeps_populated_prefix() {
        for (tag, formatted) in [
            ("v3", "3"),
            ("V3.1", "3.1"),
            ("3.1.4", "3.1.4"),
            ("v3.1.4.1", "3.1.4.1"),
            ("v01.002", "1.2"),
        ] {
            assert_eq!(Version::parse(tag).unwrap().to_string(), formatted);
        }
    }

    #[test]
    fn test_version_compare_absent_as_zero() {
        let short = Version::parse("1.2").unwrap();
        let long = Version::parse("1.2.0.0").unwrap();
        assert_eq!(short.cmp(&long), Ordering::Equal);
        assert!(Version::parse("1.2.0.1").unwrap() > short);
        assert!(Version::parse("2").unwrap() > Version::parse("1.9.9.9").unwrap());
        assert!(Version::parse("1.10").unwrap() > Version::parse("1.9").unwrap());
    }

    #[test]
    fn test_version_increment_rightmost_component() {
        assert_eq!(Version::parse("1.2.3.4").unwrap().increment().to_string(), "1.2.3.5");
        assert_eq!(Version::parse("1.2.3").unwrap().increment().to_string(), "1.2.4");
        assert_eq!(Version::parse("1.2").unwrap().increment().to_string(), "1.3");
        assert_eq!(Version::parse("1").unwrap().increment().to_string(), "2");
    }

    #[test]
    fn test_version_increment_clears_original() {
        let v = Version::parse("v1.2.3").unwrap().increment();
        assert_eq!(v.original(), None);
        let major_only = Version::parse("v4").unwrap().increment();
        assert_eq!(major_only.original(), None);
    }

    #[test]
    fn test_version_increment_saturates() {
        let v = Version::parse("1.65535").unwrap().increment();
        assert_eq!(v.to_string(), "1.65535");
    }

    #[test]
    fn test_version_initial() {
        assert_eq!(Version::initial().to_string(), "0.0.1");
        assert_eq!(Version::default(), Version::new(0, 0, 1));
    }

    #[test]
    fn test_version_has_minor() {
        assert!(!Version::parse("v5").unwrap().has_minor());
        assert!(Version::parse("v5.0").unwrap().has_minor());
    }

    #[test]
    fn test_version_to_semver() {
        assert_eq!(Version::parse("1.2").unwrap().to_semver().to_string(), "1.2.0");
        assert_eq!(
            Version::parse("1.2.3.7").unwrap().to_semver().to_string(),
            "1.2.3+7"
        );
    }

    #[test]
    fn test_version_serde_shape() {
        let v = Version::parse("v2.1").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"major":2,"minor":1,"original":"v2.1"}"#);
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), "2.1");
        assert_eq!(back.original(), Some("v2.1"));
    }
}
