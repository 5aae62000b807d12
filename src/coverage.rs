//! Coverage loader: read per-test coverage files into identifier sets.
//!
//! Each discovered test owns one `<stem>.coverage` file in the coverage
//! directory. A missing or empty file means the test covered nothing we can
//! attribute; the test still keeps its pass/fail entry so it contributes to
//! the `n_p`/`n_f` counts of every statement.

use crate::types::{CoverageMap, TestCase};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Filename of a test's coverage file.
pub fn coverage_file_name(stem: &str) -> String {
    format!("{stem}.coverage")
}

/// Parse coverage file contents: one sid per line, trimmed, blanks dropped,
/// duplicates ignored. Sids are lowercased on insert so set membership is
/// case-insensitive and consistent with the lowercase emitter. A torn final
/// line from a killed test is tolerated the same way as any junk line: it
/// simply becomes a sid no probe ever wrote, attributed to nothing.
pub fn parse_coverage(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Load the coverage set for every discovered test.
pub fn load_coverage(dir: &Path, tests: &[TestCase]) -> CoverageMap {
    let mut map = CoverageMap::new();
    for test in tests {
        let stem = test.stem();
        let path = dir.join(coverage_file_name(&stem));
        let set = match fs::read_to_string(&path) {
            Ok(content) => parse_coverage(&content),
            Err(_) => {
                warn!("no coverage recorded for {stem}; treating as empty");
                BTreeSet::new()
            }
        };
        map.insert(stem, set);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TestCase;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn case(type_name: &str, method: &str) -> TestCase {
        TestCase {
            file: PathBuf::from("tests/t.rs"),
            type_name: type_name.into(),
            method: method.into(),
            qualified: method.into(),
        }
    }

    #[test]
    fn test_parse_trims_and_dedups() {
        let set = parse_coverage("  abc  \n\nabc\ndef\n");
        assert_eq!(set.len(), 2);
        assert!(set.contains("abc"));
        assert!(set.contains("def"));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let set = parse_coverage("ABC-DEF\nabc-def\n");
        assert_eq!(set.len(), 1);
        assert!(set.contains("abc-def"));
    }

    #[test]
    fn test_parse_tolerates_torn_final_line() {
        // A killed test may leave a partial last line with no terminator.
        let set = parse_coverage("aaaa\nbbbb\ncc");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_missing_file_is_empty_set() {
        let dir = TempDir::new().unwrap();
        let map = load_coverage(dir.path(), &[case("t", "test_gone")]);
        assert_eq!(map.len(), 1);
        assert!(map["t.test_gone"].is_empty());
    }

    #[test]
    fn test_load_reads_each_stem() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("t.test_one.coverage"), "x\ny\n").unwrap();
        std::fs::write(dir.path().join("t.test_two.coverage"), "y\n").unwrap();

        let map = load_coverage(
            dir.path(),
            &[case("t", "test_one"), case("t", "test_two")],
        );
        assert_eq!(map["t.test_one"].len(), 2);
        assert_eq!(map["t.test_two"].len(), 1);
    }
}
