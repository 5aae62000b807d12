//! Test discovery: enumerate test functions by attribute markers.
//!
//! Walks the test project tree, parses each source file, and collects every
//! function carrying a recognised test attribute. Results are deduplicated
//! by qualified name and returned in ordinal byte-wise order, which is also
//! the execution order of the runner.

use crate::types::TestCase;
use crate::walk;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use syn::{Attribute, ImplItem, Item, Type};
use tracing::{debug, warn};

/// Recognised test markers, matched case-insensitively against the final
/// segment of an attribute path (`#[test]`, `#[tokio::test]`, `#[Fact]`).
/// A data table, so supporting another framework is a one-entry change.
pub const TEST_MARKERS: &[&str] = &["fact", "theory", "testmethod", "test", "datatestmethod"];

fn is_test_marker(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path()
            .segments
            .last()
            .map(|seg| {
                let name = seg.ident.to_string().to_ascii_lowercase();
                TEST_MARKERS.contains(&name.as_str())
            })
            .unwrap_or(false)
    })
}

/// Module path contributed by the file's location: `src/a/b.rs` compiles as
/// module `a::b`, while files under `tests/` are each their own target root.
fn module_prefix(root: &Path, file: &Path) -> Vec<String> {
    let rel = file.strip_prefix(root).unwrap_or(file);
    let mut parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let Some(name) = parts.pop() else {
        return Vec::new();
    };
    let stem = name.trim_end_matches(".rs").to_string();
    if parts.first().map(String::as_str) == Some("src") {
        parts.remove(0);
        if !matches!(stem.as_str(), "lib" | "main" | "mod") {
            parts.push(stem);
        }
        parts
    } else {
        Vec::new()
    }
}

fn impl_type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

struct FileScan<'a> {
    file: &'a Path,
    file_stem: String,
    prefix: Vec<String>,
    out: &'a mut Vec<TestCase>,
}

impl FileScan<'_> {
    fn push(&mut self, method: String, mods: &[String], impl_ty: Option<&str>) {
        let type_name = impl_ty
            .map(str::to_string)
            .or_else(|| mods.last().cloned())
            .unwrap_or_else(|| self.file_stem.clone());
        let mut path: Vec<&str> = self.prefix.iter().map(String::as_str).collect();
        path.extend(mods.iter().map(String::as_str));
        path.push(&method);
        let qualified = path.join("::");
        self.out.push(TestCase {
            file: self.file.to_path_buf(),
            type_name,
            method,
            qualified,
        });
    }

    fn scan(&mut self, items: &[Item], mods: &mut Vec<String>) {
        for item in items {
            match item {
                Item::Fn(f) if is_test_marker(&f.attrs) => {
                    self.push(f.sig.ident.to_string(), mods, None);
                }
                Item::Mod(m) => {
                    if let Some((_, content)) = &m.content {
                        mods.push(m.ident.to_string());
                        self.scan(content, mods);
                        mods.pop();
                    }
                }
                Item::Impl(imp) => {
                    let ty = impl_type_name(&imp.self_ty);
                    for it in &imp.items {
                        if let ImplItem::Fn(f) = it {
                            if is_test_marker(&f.attrs) {
                                self.push(f.sig.ident.to_string(), mods, ty.as_deref());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Discover every marked test under `root`, deduplicated by qualified name
/// and sorted byte-wise. Files that fail to parse are warned about and
/// skipped.
pub fn discover_tests(root: &Path) -> Vec<TestCase> {
    let mut found = Vec::new();
    for path in walk::rust_sources(root) {
        let src = match fs::read_to_string(&path) {
            Ok(src) => src,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        let ast = match syn::parse_file(&src) {
            Ok(ast) => ast,
            Err(e) => {
                warn!("parse error in {}: {e}", path.display());
                continue;
            }
        };
        let file_stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut scan = FileScan {
            file: &path,
            file_stem,
            prefix: module_prefix(root, &path),
            out: &mut found,
        };
        scan.scan(&ast.items, &mut Vec::new());
    }
    debug!("discovered {} test candidates", found.len());
    let dedup: BTreeMap<String, TestCase> = found
        .into_iter()
        .map(|t| (t.qualified.clone(), t))
        .collect();
    dedup.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, src: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, src).unwrap();
    }

    #[test]
    fn test_marker_table_is_case_insensitive() {
        let src = r#"
#[test]
fn plain() {}

#[Test]
fn pascal() {}

#[Fact]
fn xunit_fact() {}

#[Theory]
fn xunit_theory() {}

#[TestMethod]
fn mstest() {}

#[DataTestMethod]
fn mstest_data() {}

#[bench]
fn not_a_test() {}
"#;
        let ast = syn::parse_file(src).unwrap();
        let hits: Vec<bool> = ast
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Fn(f) => Some(is_test_marker(&f.attrs)),
                _ => None,
            })
            .collect();
        assert_eq!(hits, vec![true, true, true, true, true, true, false]);
    }

    #[test]
    fn test_qualified_attribute_paths_match_on_last_segment() {
        let src = r#"
#[tokio::test]
fn async_case() {}

#[custom::framework::fact]
fn wrapped() {}
"#;
        let ast = syn::parse_file(src).unwrap();
        for item in &ast.items {
            if let Item::Fn(f) = item {
                assert!(is_test_marker(&f.attrs), "missed {:?}", f.sig.ident);
            }
        }
    }

    #[test]
    fn test_module_prefix_rules() {
        let root = Path::new("/work/calc-tests");
        let prefix = |rel: &str| module_prefix(root, &root.join(rel));
        assert_eq!(prefix("src/lib.rs"), Vec::<String>::new());
        assert_eq!(prefix("src/math.rs"), vec!["math"]);
        assert_eq!(prefix("src/math/mod.rs"), vec!["math"]);
        assert_eq!(prefix("src/math/trig.rs"), vec!["math", "trig"]);
        assert_eq!(prefix("tests/integration.rs"), Vec::<String>::new());
    }

    #[test]
    fn test_discovery_collects_and_sorts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "tests/zeta.rs",
            "#[test]\nfn test_z() {}\n",
        );
        write(
            root,
            "tests/alpha.rs",
            r#"
#[test]
fn test_b() {}

mod grouped {
    #[test]
    fn test_a() {}
}
"#,
        );

        let tests = discover_tests(root);
        let qualified: Vec<&str> = tests.iter().map(|t| t.qualified.as_str()).collect();
        assert_eq!(qualified, vec!["grouped::test_a", "test_b", "test_z"]);

        let grouped = &tests[0];
        assert_eq!(grouped.type_name, "grouped");
        assert_eq!(grouped.stem(), "grouped.test_a");
        // Top-level test in a file takes the file stem as its type name.
        let top = tests.iter().find(|t| t.method == "test_b").unwrap();
        assert_eq!(top.type_name, "alpha");
    }

    #[test]
    fn test_discovery_dedups_double_marked_fn() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "tests/t.rs",
            "#[test]\n#[fact]\nfn test_once() {}\n",
        );
        let tests = discover_tests(dir.path());
        assert_eq!(tests.len(), 1);
    }

    #[test]
    fn test_discovery_skips_generated_and_build_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "tests/real.rs", "#[test]\nfn test_real() {}\n");
        write(root, "tests/gen.g.rs", "#[test]\nfn test_generated() {}\n");
        write(root, "obj/cache.rs", "#[test]\nfn test_cached() {}\n");
        write(root, "Coverage/old.rs", "#[test]\nfn test_stale() {}\n");

        let tests = discover_tests(root);
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].method, "test_real");
    }

    #[test]
    fn test_discovery_impl_methods() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "tests/suite.rs",
            r#"
struct Harness;

impl Harness {
    #[TestMethod]
    fn test_in_impl(&self) {}
}
"#,
        );
        let tests = discover_tests(dir.path());
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].type_name, "Harness");
        assert_eq!(tests[0].stem(), "Harness.test_in_impl");
    }

    #[test]
    fn test_discovery_tolerates_parse_errors() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tests/ok.rs", "#[test]\nfn test_fine() {}\n");
        write(dir.path(), "tests/broken.rs", "fn broken( {\n");
        let tests = discover_tests(dir.path());
        assert_eq!(tests.len(), 1);
    }

    #[test]
    fn test_src_module_prefix_flows_into_qualified_name() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "src/math.rs",
            "#[test]\nfn test_add() {}\n",
        );
        let tests = discover_tests(dir.path());
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].qualified, "math::test_add");
        assert_eq!(tests[0].file, PathBuf::from(dir.path().join("src/math.rs")));
    }
}
