//! Probe codec: generate and recognise the statements the rewriter injects.
//!
//! A probe is a single best-effort statement that appends its owning sid and
//! a newline to the sink path baked into it as a string literal:
//!
//! ```text
//! let _ = std::fs::OpenOptions::new().create(true).append(true)
//!     .open("<sink>")
//!     .and_then(|mut __covlog| std::io::Write::write_all(&mut __covlog, b"<sid>\n"));
//! ```
//!
//! The closure binding `__covlog` is the sentinel token: recognition is a
//! plain substring test for it, so it stays O(1) and independent of how the
//! append API might be renamed or wrapped. Paths are fully qualified so the
//! probe compiles in any module without imports, and the `Result` is
//! discarded so a failed append never changes program behaviour.

use crate::types::Sid;
use std::path::{Path, PathBuf};
use syn::{Expr, ExprLit, Lit, Pat, Stmt};

/// Sentinel identifier embedded in every probe.
pub const PROBE_MARKER: &str = "__covlog";

/// The sid and sink path carried by a recognised probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeParts {
    pub sid: Sid,
    pub sink: PathBuf,
}

/// Draw a fresh statement identifier.
pub fn new_sid() -> Sid {
    uuid::Uuid::new_v4().to_string()
}

/// Canonical probe statement text for `sid` writing to `sink`.
pub fn encode(sid: &str, sink: &Path) -> String {
    // `{:?}` on the path text produces a correctly escaped string literal.
    let sink_lit = format!("{:?}", sink.to_string_lossy());
    format!(
        "let _ = std::fs::OpenOptions::new().create(true).append(true).open({sink_lit})\
         .and_then(|mut {PROBE_MARKER}| std::io::Write::write_all(&mut {PROBE_MARKER}, b\"{sid}\\n\"));"
    )
}

/// Probe statement as a parsed AST node, ready for splicing into a block.
pub fn encode_stmt(sid: &str, sink: &Path) -> Stmt {
    let block: syn::Block = syn::parse_str(&format!("{{ {} }}", encode(sid, sink)))
        .expect("probe template parses");
    block
        .stmts
        .into_iter()
        .next()
        .expect("probe template is one statement")
}

/// Fast textual predicate matching any previously emitted probe form.
pub fn looks_like_probe(text: &str) -> bool {
    text.contains(PROBE_MARKER)
}

/// Structural recognition: extract the sid and sink path if `stmt` is a
/// probe. Literal unescaping is delegated to `syn`.
pub fn parse_parts(stmt: &Stmt) -> Option<ProbeParts> {
    let Stmt::Local(local) = stmt else {
        return None;
    };
    if !matches!(local.pat, Pat::Wild(_)) {
        return None;
    }
    let init = local.init.as_ref()?;
    let Expr::MethodCall(and_then) = init.expr.as_ref() else {
        return None;
    };
    if and_then.method != "and_then" {
        return None;
    }
    let Expr::MethodCall(open) = and_then.receiver.as_ref() else {
        return None;
    };
    if open.method != "open" {
        return None;
    }
    let sink = match open.args.first()? {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => PathBuf::from(s.value()),
        _ => return None,
    };
    let Expr::Closure(closure) = and_then.args.first()? else {
        return None;
    };
    match closure.inputs.first()? {
        Pat::Ident(p) if p.ident == PROBE_MARKER => {}
        _ => return None,
    }
    let Expr::Call(write) = closure.body.as_ref() else {
        return None;
    };
    let bytes = match write.args.last()? {
        Expr::Lit(ExprLit {
            lit: Lit::ByteStr(b),
            ..
        }) => b.value(),
        _ => return None,
    };
    let text = String::from_utf8(bytes).ok()?;
    let sid = text.trim_end_matches('\n').to_string();
    if sid.is_empty() {
        return None;
    }
    Some(ProbeParts { sid, sink })
}

/// True when `stmt` is a recognised probe.
pub fn is_probe(stmt: &Stmt) -> bool {
    parse_parts(stmt).is_some()
}

/// Sink path of a recognised probe.
pub fn extract_sink(stmt: &Stmt) -> Option<PathBuf> {
    parse_parts(stmt).map(|p| p.sink)
}

/// Same sid, new sink literal. Returns `None` when `stmt` is not a probe.
pub fn retarget(stmt: &Stmt, new_sink: &Path) -> Option<Stmt> {
    parse_parts(stmt).map(|parts| encode_stmt(&parts.sid, new_sink))
}
