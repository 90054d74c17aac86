#![forbid(unsafe_code)]

//! Retargeting of embedded foreign-code fragments.
//!
//! Every native sort, expression and action records where it was written. A [`RemapTable`]
//! maps that `(file, line)` to the template the target backend should emit instead.

use std::collections::BTreeMap;

use porter_ast::{Action, ActionKind, Expr, ExprKind, Position, Program, Sort};
use tracing::{debug, warn};

use crate::error::{PassError, PassResult};
use crate::visit::{Context, Rewrite, SortVisitor, TermVisitor, rewrite_program};

/// Splice templates for one target, keyed by the file name and line a fragment was
/// originally written at. Templates refer to the fragment's arguments as `` `0` ``, `` `1` ``...
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemapTable {
    target: String,
    lang: String,
    entries: BTreeMap<(String, u32), String>,
}

const JAVA_SPLICES: &[(&str, u32, &str)] = &[
    ("collections.ivy", 923, "HashSet<`0`>"),
    ("collections.ivy", 939, "`0`.add(`1`)"),
    ("collections.ivy", 945, "`0`.contains(`1`)"),
    ("collections_impl.ivy", 6, "ArrayList<`0`>"),
    (
        "collections_impl.ivy",
        17,
        concat!(
            "`2`.ensureCapacity(`0`);\n",
            "for (int _internal_i = 0; _internal_i < `0`; _internal_i++) {\n",
            "    `2`.set(_internal_i, `1`);\n",
            "}",
        ),
    ),
    ("collections_impl.ivy", 25, "/* */"),
    (
        "collections_impl.ivy",
        37,
        "if (0 <= `1` && `1` < `0`.size()) {\n    `2` = `0`.get(`1`);\n}",
    ),
    ("collections_impl.ivy", 44, "`1` = `0`.size();"),
    (
        "collections_impl.ivy",
        50,
        concat!(
            "int _old_size = `0`.size();\n",
            "for (int _internal_i = _old_size; _internal_i < `1`; _internal_i++) {\n",
            "    `0`.set(_internal_i, `2`);\n",
            "}",
        ),
    ),
    ("collections_impl.ivy", 75, "`0`.add(`1`)"),
    ("tcp_serdes.ivy", 506, "HashMap<Integer, Object>"),
];

/// Targets that ship a remap table without any configuration.
pub const BUILTIN_TARGETS: &[&str] = &["java"];

impl RemapTable {
    pub fn new(target: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            lang: lang.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn builtin(target: &str) -> Option<Self> {
        match target {
            "java" => {
                let mut table = Self::new("java", "java");
                for (file, line, template) in JAVA_SPLICES {
                    table.insert(*file, *line, *template);
                }
                Some(table)
            }
            _ => None,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn set_lang(&mut self, lang: impl Into<String>) {
        self.lang = lang.into();
    }

    /// Adds or replaces the template for `file:line`.
    pub fn insert(&mut self, file: impl Into<String>, line: u32, template: impl Into<String>) {
        self.entries.insert((file.into(), line), template.into());
    }

    pub fn get(&self, file: &str, line: u32) -> Option<&str> {
        self.entries
            .get(&(file.to_string(), line))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The template for a fragment written at `pos`, following instantiation references
    /// back to the original text.
    pub fn lookup(&self, pos: &Position) -> PassResult<&str> {
        let origin = pos.origin();
        let file = origin.file_name();
        self.get(file, origin.line)
            .ok_or_else(|| PassError::MissingSplice {
                target: self.target.clone(),
                file: file.to_string(),
                line: origin.line,
            })
    }
}

/// Where a rewriter gets its table from. A target without a table only fails once a native
/// node actually needs one.
type TableSource<'a> = Result<&'a RemapTable, &'a PassError>;

/// Rewrites the template of every native sort, recursing into its type arguments.
pub struct NativeSortRewriter<'a> {
    table: TableSource<'a>,
    rewritten: usize,
}

impl<'a> NativeSortRewriter<'a> {
    pub fn new(table: &'a RemapTable) -> Self {
        Self::from_source(Ok(table))
    }

    fn from_source(table: TableSource<'a>) -> Self {
        Self {
            table,
            rewritten: 0,
        }
    }
}

impl SortVisitor for NativeSortRewriter<'_> {
    type Mode = Rewrite;

    fn finish_native(&mut self, node: &Sort, args: Vec<Sort>) -> PassResult<Sort> {
        let Sort::Native { position, fmt, .. } = node else {
            return Err(PassError::invariant("native hook reached for a non-native sort"));
        };
        let table = self.table.map_err(PassError::clone)?;
        let template = table.lookup(position)?;
        if template == fmt {
            warn!(%position, "native sort template is unchanged by the remap table");
        }
        debug!(%position, template, "remapped native sort");
        self.rewritten += 1;
        Ok(Sort::Native {
            position: position.clone(),
            fmt: template.to_string(),
            args,
        })
    }
}

/// Rewrites every native expression and action, and every sort mentioned anywhere, through
/// a [`RemapTable`].
pub struct NativeRewriter<'a> {
    table: TableSource<'a>,
    sorts: NativeSortRewriter<'a>,
    rewritten: usize,
}

impl<'a> NativeRewriter<'a> {
    pub fn new(table: &'a RemapTable) -> Self {
        Self::from_source(Ok(table))
    }

    /// A rewriter for a table that may not exist; the lookup error is raised by the first
    /// native node reached.
    pub fn lazy(table: &'a PassResult<RemapTable>) -> Self {
        Self::from_source(table.as_ref())
    }

    fn from_source(table: TableSource<'a>) -> Self {
        Self {
            table,
            sorts: NativeSortRewriter::from_source(table),
            rewritten: 0,
        }
    }

    /// Native expressions, actions and sort occurrences rewritten so far.
    pub fn rewritten(&self) -> usize {
        self.rewritten + self.sorts.rewritten
    }

    /// The target template for a fragment, and the language it is written in.
    fn splice(
        &mut self,
        pos: Option<&Position>,
        kind: &'static str,
        fmt: &str,
    ) -> PassResult<(String, String)> {
        let table = self.table.map_err(PassError::clone)?;
        let pos = pos.ok_or_else(|| {
            PassError::invariant(format!("{kind} has no source position to remap"))
        })?;
        let template = table.lookup(pos)?;
        if template == fmt {
            warn!(%pos, "{kind} template is unchanged by the remap table");
        }
        debug!(%pos, template, "remapped {kind}");
        self.rewritten += 1;
        Ok((template.to_string(), table.lang().to_string()))
    }
}

impl TermVisitor for NativeRewriter<'_> {
    type Mode = Rewrite;

    fn rewrite_sort(&mut self, _cx: &mut Context, sort: &Sort) -> PassResult<Sort> {
        self.sorts.visit_sort(sort)
    }

    fn finish_native_expr(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        args: Vec<Expr>,
    ) -> PassResult<Expr> {
        let ExprKind::Native { fmt, .. } = &node.kind else {
            return Err(PassError::invariant(
                "native hook reached for a non-native expression",
            ));
        };
        let (fmt, lang) = self.splice(node.pos.as_ref(), "native expression", fmt)?;
        let sort = node
            .sort
            .as_ref()
            .map(|s| self.rewrite_sort(cx, s))
            .transpose()?;
        Ok(Expr {
            pos: node.pos.clone(),
            sort,
            kind: ExprKind::Native { lang, fmt, args },
        })
    }

    fn finish_native_action(
        &mut self,
        cx: &mut Context,
        node: &Action,
        args: Vec<Expr>,
    ) -> PassResult<Action> {
        let ActionKind::Native { fmt, .. } = &node.kind else {
            return Err(PassError::invariant("native hook reached for a non-native action"));
        };
        let (fmt, lang) = self.splice(node.pos.as_ref(), "native action", fmt)?;
        let sort = node
            .sort
            .as_ref()
            .map(|s| self.rewrite_sort(cx, s))
            .transpose()?;
        Ok(Action {
            pos: node.pos.clone(),
            sort,
            kind: ActionKind::Native { lang, fmt, args },
        })
    }
}

fn rewrite_with(
    prog: &Program,
    mut rewriter: NativeRewriter<'_>,
    max_depth: usize,
) -> PassResult<(Program, usize)> {
    let mut cx = Context::with_max_depth(max_depth);
    let out = rewrite_program(&mut rewriter, &mut cx, prog)?;
    debug!(rewritten = rewriter.rewritten(), "rewrote native splices");
    Ok((out, rewriter.rewritten()))
}

/// Rewrites every splice in `prog` for the table's target.
pub fn rewrite_natives(
    prog: &Program,
    table: &RemapTable,
    max_depth: usize,
) -> PassResult<Program> {
    rewrite_with(prog, NativeRewriter::new(table), max_depth).map(|(prog, _)| prog)
}

/// Like [`rewrite_natives`], for a table lookup that may have failed. A program without
/// native nodes or native sorts never consults the table. Returns the rewritten program
/// and the number of native occurrences rewritten.
pub fn retarget_natives(
    prog: &Program,
    table: &PassResult<RemapTable>,
    max_depth: usize,
) -> PassResult<(Program, usize)> {
    rewrite_with(prog, NativeRewriter::lazy(table), max_depth)
}
