//! Reader for the `packed-refs` flat file
//!
//! ```text
//! # pack-refs with: peeled fully-peeled sorted
//! 3f9c0e2f... refs/heads/main
//! 8a1b77d0... refs/tags/v1.0.0
//! ^c41d9e55...
//! ```
//!
//! A `^` line carries the commit an annotated tag peels to and belongs to the
//! ref on the line before it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Prefix under which tag refs live.
pub const TAGS_PREFIX: &str = "refs/tags/";

/// One entry of the packed-refs file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRef {
    /// Object the ref names directly (a commit, or a tag object)
    pub hash: String,
    /// Commit an annotated tag peels to, when recorded
    pub peeled: Option<String>,
}

/// Parsed contents of a packed-refs file, keyed by full ref name
#[derive(Debug, Clone, Default)]
pub struct PackedRefs {
    refs: BTreeMap<String, PackedRef>,
    peeled_trait: bool,
}

pub(crate) fn is_object_hash(text: &str) -> bool {
    matches!(text.len(), 40 | 64) && text.bytes().all(|b| b.is_ascii_hexdigit())
}

impl PackedRefs {
    /// Parse packed-refs content; malformed lines are skipped
    pub fn parse(content: &str) -> Self {
        let mut packed = PackedRefs::default();
        let mut last: Option<String> = None;

        for line in content.lines() {
            let line = line.trim_end();
            if let Some(header) = line.strip_prefix('#') {
                if let Some(traits) = header.trim().strip_prefix("pack-refs with:") {
                    packed.peeled_trait = traits
                        .split_whitespace()
                        .any(|t| t == "peeled" || t == "fully-peeled");
                }
                continue;
            }

            if let Some(peeled) = line.strip_prefix('^') {
                if is_object_hash(peeled) {
                    if let Some(entry) = last.as_ref().and_then(|name| packed.refs.get_mut(name)) {
                        entry.peeled = Some(peeled.to_ascii_lowercase());
                    }
                }
                last = None;
                continue;
            }

            last = None;
            let Some((hash, name)) = line.split_once(' ') else {
                continue;
            };
            if !is_object_hash(hash) || name.is_empty() {
                continue;
            }
            packed.refs.insert(
                name.to_string(),
                PackedRef {
                    hash: hash.to_ascii_lowercase(),
                    peeled: None,
                },
            );
            last = Some(name.to_string());
        }

        packed
    }

    /// Read and parse a packed-refs file; a missing file is an empty set
    pub fn read(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Look up a ref by its full name (`refs/tags/v1.0.0`)
    pub fn get(&self, refname: &str) -> Option<&PackedRef> {
        self.refs.get(refname)
    }

    /// Look up a tag by its short name (`v1.0.0`)
    pub fn tag(&self, name: &str) -> Option<&PackedRef> {
        self.refs.get(&format!("{}{}", TAGS_PREFIX, name))
    }

    /// Short names of every packed tag, in sorted order
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.refs
            .keys()
            .filter_map(|name| name.strip_prefix(TAGS_PREFIX))
    }

    /// Whether the file records peel lines for every annotated tag.
    ///
    /// When it does, a tag without a `^` line names its commit directly.
    pub fn peel_complete(&self) -> bool {
        self.peeled_trait
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";
    const C: &str = "3333333333333333333333333333333333333333";

    #[test]
    fn test_parse_tags_and_peel_lines() {
        let content = format!(
            "# pack-refs with: peeled fully-peeled sorted \n\
             {A} refs/heads/main\n\
             {B} refs/tags/v1.0.0\n\
             ^{C}\n\
             {A} refs/tags/release/2024\n"
        );
        let packed = PackedRefs::parse(&content);

        assert!(packed.peel_complete());
        assert_eq!(packed.len(), 3);
        assert_eq!(
            packed.tag_names().collect::<Vec<_>>(),
            vec!["release/2024", "v1.0.0"]
        );
        let annotated = packed.tag("v1.0.0").unwrap();
        assert_eq!(annotated.hash, B);
        assert_eq!(annotated.peeled.as_deref(), Some(C));
        assert_eq!(packed.tag("release/2024").unwrap().peeled, None);
        assert_eq!(packed.get("refs/heads/main").unwrap().hash, A);
    }

    #[test]
    fn test_parse_without_header_is_not_peel_complete() {
        let packed = PackedRefs::parse(&format!("{A} refs/tags/v1\n"));
        assert!(!packed.peel_complete());
        assert_eq!(packed.tag("v1").unwrap().hash, A);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let content = format!(
            "garbage\n\
             nothex refs/tags/bad\n\
             ^{C}\n\
             {A}\n\
             {A} refs/tags/good\n"
        );
        let packed = PackedRefs::parse(&content);
        assert_eq!(packed.tag_names().collect::<Vec<_>>(), vec!["good"]);
        assert_eq!(packed.tag("good").unwrap().peeled, None);
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let packed = PackedRefs::read(&dir.path().join("packed-refs")).unwrap();
        assert!(packed.is_empty());
    }

    #[test]
    fn test_is_object_hash() {
        assert!(is_object_hash(A));
        assert!(is_object_hash(&"ab".repeat(32)));
        assert!(!is_object_hash("abc"));
        assert!(!is_object_hash(&"zz".repeat(20)));
    }
}
