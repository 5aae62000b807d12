//! AST rewriter: inject, retarget, strip, and collect probes.
//!
//! Each operation parses one file with `syn::parse_file`, mutates statement
//! lists, and renders with `prettyplease::unparse`, so a single normalising
//! parse/render pass makes the idempotence laws hold byte-for-byte:
//! instrumenting twice is a no-op (instrumented files are skipped), strip
//! after instrument restores the normalised original, and a second retarget
//! to the same sink changes nothing.
//!
//! Write-back goes through a sibling temp file and a rename, so a crash
//! mid-write never leaves a half-written source file.

use crate::error::CulparError;
use crate::probe;
use crate::types::{IdentifierMap, Sid, StatementSite};
use crate::walk;
use std::fs;
use std::mem;
use std::path::Path;
use syn::spanned::Spanned;
use syn::visit_mut::{self, VisitMut};
use syn::{Block, Expr, ImplItem, Item, Stmt, TraitItem};
use tracing::{debug, warn};

/// Statements that receive a probe: bindings with an initialiser and
/// anything executed as a statement (expressions, macros, control headers).
/// Declarations, nested items, and existing probes do not.
fn is_instrumentable(stmt: &Stmt) -> bool {
    if probe::is_probe(stmt) {
        return false;
    }
    match stmt {
        Stmt::Local(local) => local.init.is_some(),
        Stmt::Item(_) => false,
        Stmt::Expr(expr, _) => !matches!(expr, Expr::Verbatim(_)),
        Stmt::Macro(_) => true,
    }
}

fn has_cfg_test(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|a| {
        a.path().is_ident("cfg")
            && match &a.meta {
                syn::Meta::List(list) => {
                    // Drop quoted segments so `feature = "test-utils"` does
                    // not count as a bare `test` predicate.
                    let tokens = list.tokens.to_string();
                    tokens
                        .split('"')
                        .step_by(2)
                        .flat_map(|s| s.split(|c: char| !c.is_alphanumeric() && c != '_'))
                        .any(|t| t == "test")
                }
                _ => false,
            }
    })
}

/// Injects a probe before every instrumentable statement.
struct Instrumenter<'a> {
    sink: &'a Path,
    added: usize,
}

impl VisitMut for Instrumenter<'_> {
    fn visit_item_mut(&mut self, item: &mut Item) {
        // Only items with runtime bodies are entered; const/static/type
        // positions would not compile with a probe in them.
        match item {
            Item::Fn(f) if !has_cfg_test(&f.attrs) => visit_mut::visit_item_fn_mut(self, f),
            Item::Mod(m) if !has_cfg_test(&m.attrs) => visit_mut::visit_item_mod_mut(self, m),
            Item::Impl(i) if !has_cfg_test(&i.attrs) => visit_mut::visit_item_impl_mut(self, i),
            Item::Trait(t) if !has_cfg_test(&t.attrs) => visit_mut::visit_item_trait_mut(self, t),
            _ => {}
        }
    }

    fn visit_impl_item_mut(&mut self, item: &mut ImplItem) {
        if let ImplItem::Fn(f) = item {
            if !has_cfg_test(&f.attrs) {
                visit_mut::visit_impl_item_fn_mut(self, f);
            }
        }
    }

    fn visit_trait_item_mut(&mut self, item: &mut TraitItem) {
        if let TraitItem::Fn(f) = item {
            visit_mut::visit_trait_item_fn_mut(self, f);
        }
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        match expr {
            // Const blocks and array lengths are const contexts.
            Expr::Const(_) => {}
            Expr::Repeat(repeat) => self.visit_expr_mut(&mut repeat.expr),
            _ => visit_mut::visit_expr_mut(self, expr),
        }
    }

    fn visit_expr_match_mut(&mut self, m: &mut syn::ExprMatch) {
        visit_mut::visit_expr_match_mut(self, m);
        // One probe at the head of each block-bodied arm, the analogue of a
        // probe before each case body. Expression arms have no statement
        // position and stay covered by the probe on the match itself.
        for arm in &mut m.arms {
            if let Expr::Block(body) = arm.body.as_mut() {
                body.block
                    .stmts
                    .insert(0, probe::encode_stmt(&probe::new_sid(), self.sink));
                self.added += 1;
            }
        }
    }

    fn visit_block_mut(&mut self, block: &mut Block) {
        // Children first, so this splice sees the original statement kinds.
        visit_mut::visit_block_mut(self, block);
        let old = mem::take(&mut block.stmts);
        let mut stmts = Vec::with_capacity(old.len() * 2);
        for stmt in old {
            if is_instrumentable(&stmt) {
                stmts.push(probe::encode_stmt(&probe::new_sid(), self.sink));
                self.added += 1;
            }
            stmts.push(stmt);
        }
        block.stmts = stmts;
    }
}

/// Removes every recognised probe.
struct Stripper {
    removed: usize,
}

impl VisitMut for Stripper {
    fn visit_block_mut(&mut self, block: &mut Block) {
        visit_mut::visit_block_mut(self, block);
        let before = block.stmts.len();
        block.stmts.retain(|s| !probe::is_probe(s));
        self.removed += before - block.stmts.len();
    }
}

/// Rewrites the sink literal of every probe that points elsewhere.
struct Retargeter<'a> {
    sink: &'a Path,
    changed: usize,
}

impl VisitMut for Retargeter<'_> {
    fn visit_block_mut(&mut self, block: &mut Block) {
        visit_mut::visit_block_mut(self, block);
        for stmt in &mut block.stmts {
            if let Some(parts) = probe::parse_parts(stmt) {
                if parts.sink != self.sink {
                    *stmt = probe::encode_stmt(&parts.sid, self.sink);
                    self.changed += 1;
                }
            }
        }
    }
}

/// Gathers `(sid, site)` pairs from the probes of an instrumented file.
struct Collector<'a> {
    file: &'a Path,
    lines: Vec<&'a str>,
    entries: Vec<(Sid, StatementSite)>,
}

impl Collector<'_> {
    fn site_for(&self, stmt: &Stmt) -> StatementSite {
        let line = stmt.span().start().line;
        let snippet = self
            .lines
            .get(line.saturating_sub(1))
            .map(|l| l.trim().to_string())
            .unwrap_or_default();
        StatementSite {
            file: self.file.to_path_buf(),
            line,
            snippet,
        }
    }
}

impl VisitMut for Collector<'_> {
    fn visit_block_mut(&mut self, block: &mut Block) {
        visit_mut::visit_block_mut(self, block);
        for (i, stmt) in block.stmts.iter().enumerate() {
            let Some(parts) = probe::parse_parts(stmt) else {
                continue;
            };
            // The annotated statement is the next non-probe statement in
            // the block (an arm-head probe may be followed by another
            // probe); a trailing probe falls back to its own span.
            let target = block.stmts[i + 1..]
                .iter()
                .find(|s| !probe::is_probe(s))
                .unwrap_or(stmt);
            self.entries.push((parts.sid, self.site_for(target)));
        }
    }
}

/// Instrument `src`, or `None` when the file already contains a probe (a
/// previously instrumented file belongs to retarget). Returns the rendered
/// source and the number of probes added.
pub fn instrument_source(src: &str, sink: &Path) -> Result<Option<(String, usize)>, syn::Error> {
    if probe::looks_like_probe(src) {
        return Ok(None);
    }
    let mut file = syn::parse_file(src)?;
    let mut pass = Instrumenter { sink, added: 0 };
    pass.visit_file_mut(&mut file);
    Ok(Some((prettyplease::unparse(&file), pass.added)))
}

/// Retarget every probe in `src` to `sink`, or `None` when nothing changed.
pub fn retarget_source(src: &str, sink: &Path) -> Result<Option<(String, usize)>, syn::Error> {
    if !probe::looks_like_probe(src) {
        return Ok(None);
    }
    let mut file = syn::parse_file(src)?;
    let mut pass = Retargeter { sink, changed: 0 };
    pass.visit_file_mut(&mut file);
    if pass.changed == 0 {
        return Ok(None);
    }
    Ok(Some((prettyplease::unparse(&file), pass.changed)))
}

/// Remove every probe from `src`. Returns the rendered source and the
/// number of probes removed.
pub fn strip_source(src: &str) -> Result<(String, usize), syn::Error> {
    let mut file = syn::parse_file(src)?;
    let mut pass = Stripper { removed: 0 };
    pass.visit_file_mut(&mut file);
    Ok((prettyplease::unparse(&file), pass.removed))
}

/// Read the identifier-map entries back out of an instrumented file's text.
pub fn collect_source(src: &str, file: &Path) -> Result<Vec<(Sid, StatementSite)>, syn::Error> {
    if !probe::looks_like_probe(src) {
        return Ok(Vec::new());
    }
    let mut ast = syn::parse_file(src)?;
    let mut pass = Collector {
        file,
        lines: src.lines().collect(),
        entries: Vec::new(),
    };
    pass.visit_file_mut(&mut ast);
    Ok(pass.entries)
}

/// Write `content` next to `path` then rename over it, so the file is never
/// observed half-written.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source.rs".to_string());
    let tmp = path.with_file_name(format!("{name}.tmp"));
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

/// Per-tree rewrite statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub files_visited: usize,
    pub files_changed: usize,
    pub probes: usize,
    pub failures: usize,
}

fn rewrite_tree<F>(root: &Path, mut rewrite: F) -> TreeStats
where
    F: FnMut(&str) -> Result<Option<(String, usize)>, syn::Error>,
{
    let mut stats = TreeStats::default();
    for path in walk::rust_sources(root) {
        stats.files_visited += 1;
        let src = match fs::read_to_string(&path) {
            Ok(src) => src,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                stats.failures += 1;
                continue;
            }
        };
        match rewrite(&src) {
            Ok(Some((rendered, probes))) => {
                if let Err(e) = write_atomic(&path, &rendered) {
                    warn!("failed to write {}: {e}", path.display());
                    stats.failures += 1;
                    continue;
                }
                debug!("rewrote {} ({probes} probes)", path.display());
                stats.files_changed += 1;
                stats.probes += probes;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("parse error in {}: {e}; file left untouched", path.display());
                stats.failures += 1;
            }
        }
    }
    stats
}

/// Instrument every uninstrumented source file under `root`.
pub fn instrument_tree(root: &Path, sink: &Path) -> TreeStats {
    rewrite_tree(root, |src| instrument_source(src, sink))
}

/// Retarget every probe under `root` to `sink`.
pub fn retarget_tree(root: &Path, sink: &Path) -> TreeStats {
    rewrite_tree(root, |src| retarget_source(src, sink))
}

/// Strip every probe under `root`.
pub fn strip_tree(root: &Path) -> TreeStats {
    rewrite_tree(root, |src| {
        if !probe::looks_like_probe(src) {
            return Ok(None);
        }
        let (rendered, removed) = strip_source(src)?;
        Ok(if removed > 0 {
            Some((rendered, removed))
        } else {
            None
        })
    })
}

/// Rebuild the identifier map from the probes surviving under `root`.
/// A duplicate sid is catastrophic and aborts.
pub fn collect_tree(root: &Path) -> Result<IdentifierMap, CulparError> {
    let mut map = IdentifierMap::new();
    for path in walk::rust_sources(root) {
        let src = match fs::read_to_string(&path) {
            Ok(src) => src,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        let entries = match collect_source(&src, &path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("parse error in {}: {e}", path.display());
                continue;
            }
        };
        for (sid, site) in entries {
            if map.insert(sid.clone(), site).is_some() {
                return Err(CulparError::DuplicateSid { sid, file: path });
            }
        }
    }
    Ok(map)
}
