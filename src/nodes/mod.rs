//! The canonical syntax-tree node model.
//!
//! Every element of a built tree is a [`Node`]: a closed sum of variants
//! covering the statement, expression and auxiliary constructs of the
//! supported grammar. Nodes are immutable once built and shared through
//! `Arc`; child sequences are shared slices so sibling runs keep their
//! identity across cursors. Absent optional children are represented by
//! the [`Empty`](NodeKind::Empty) singleton, never by `Option`, so generic
//! walkers need no null checks.

// ============================================================================
// IMPORTS
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::errors::{ArborError, ErrorKind};

pub mod display;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A source position: 1-based line, 0-based column. Modules sit on line 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A shared, immutable run of sibling nodes.
pub type NodeSeq = Arc<[Arc<Node>]>;

/// Builds a [`NodeSeq`] from an owned vector.
pub fn seq(nodes: Vec<Arc<Node>>) -> NodeSeq {
    Arc::from(nodes)
}

/// One declared child field of a node: either a single child or an
/// ordered sequence of children.
#[derive(Debug, Clone)]
pub enum Field {
    Node(Arc<Node>),
    Seq(NodeSeq),
}

impl Field {
    /// Empty nodes and empty sequences count as absent.
    pub fn is_present(&self) -> bool {
        match self {
            Field::Node(n) => !n.is_empty(),
            Field::Seq(s) => !s.is_empty(),
        }
    }
}

/// Grammar generation the tree was built for. It decides the historical
/// raw shapes the rebuilder accepts and whether list comprehensions
/// introduce their own scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    Python2,
    #[default]
    Python3,
}

/// Syntactic context of a load/store/delete-capable expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Load,
    Store,
    Del,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Load => write!(f, "Load"),
            Context::Store => write!(f, "Store"),
            Context::Del => write!(f, "Del"),
        }
    }
}

/// A literal constant carried by `Const` and `NameConstant` nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Imaginary literal; only the imaginary part is representable.
    Complex(f64),
    Str(String),
    Bytes(Vec<u8>),
    NotImplemented,
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::None => write!(f, "None"),
            LiteralValue::Bool(true) => write!(f, "True"),
            LiteralValue::Bool(false) => write!(f, "False"),
            LiteralValue::Int(v) => write!(f, "{}", v),
            LiteralValue::Float(v) => write!(f, "{}", v),
            LiteralValue::Complex(v) => write!(f, "{}j", v),
            LiteralValue::Str(v) => write!(f, "{:?}", v),
            LiteralValue::Bytes(v) => write!(f, "b{:?}", String::from_utf8_lossy(v)),
            LiteralValue::NotImplemented => write!(f, "NotImplemented"),
        }
    }
}

/// An imported name and its optional alias.
pub type ImportName = (String, Option<String>);

/// One typed element of the canonical tree.
///
/// Structural equality compares the variant and all declared fields,
/// recursively; positions are identity metadata and never participate.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub position: Option<Position>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Node {}

impl Node {
    pub fn new(kind: NodeKind, position: Option<Position>) -> Arc<Node> {
        Arc::new(Node { kind, position })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, NodeKind::Empty)
    }

    pub fn line(&self) -> Option<u32> {
        if let NodeKind::Module(_) = self.kind {
            return Some(0);
        }
        self.position.map(|p| p.line)
    }

    pub fn column(&self) -> Option<u32> {
        self.position.map(|p| p.column)
    }
}

/// The Empty sentinel: a process-wide singleton standing for "this child
/// position holds nothing". It equals only itself and satisfies the same
/// traversal interface as every other node.
pub fn empty() -> Arc<Node> {
    static EMPTY: Lazy<Arc<Node>> = Lazy::new(|| {
        Arc::new(Node {
            kind: NodeKind::Empty,
            position: None,
        })
    });
    EMPTY.clone()
}

// ============================================================================
// NODE VARIANTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // --- root ---
    Module(ModuleNode),

    // --- statements ---
    FunctionDef {
        name: String,
        doc: Option<String>,
        decorators: Arc<Node>,
        args: Arc<Node>,
        body: NodeSeq,
        returns: Arc<Node>,
    },
    AsyncFunctionDef {
        name: String,
        doc: Option<String>,
        decorators: Arc<Node>,
        args: Arc<Node>,
        body: NodeSeq,
        returns: Arc<Node>,
    },
    ClassDef {
        name: String,
        doc: Option<String>,
        decorators: Arc<Node>,
        bases: NodeSeq,
        body: NodeSeq,
        keywords: NodeSeq,
    },
    Return {
        value: Arc<Node>,
    },
    Delete {
        targets: NodeSeq,
    },
    Assign {
        targets: NodeSeq,
        value: Arc<Node>,
    },
    AugAssign {
        op: String,
        target: Arc<Node>,
        value: Arc<Node>,
    },
    For {
        target: Arc<Node>,
        iter: Arc<Node>,
        body: NodeSeq,
        orelse: NodeSeq,
    },
    AsyncFor {
        target: Arc<Node>,
        iter: Arc<Node>,
        body: NodeSeq,
        orelse: NodeSeq,
    },
    While {
        test: Arc<Node>,
        body: NodeSeq,
        orelse: NodeSeq,
    },
    If {
        test: Arc<Node>,
        body: NodeSeq,
        orelse: NodeSeq,
    },
    With {
        items: NodeSeq,
        body: NodeSeq,
    },
    AsyncWith {
        items: NodeSeq,
        body: NodeSeq,
    },
    Raise {
        exc: Arc<Node>,
        cause: Arc<Node>,
        traceback: Arc<Node>,
    },
    TryExcept {
        body: NodeSeq,
        handlers: NodeSeq,
        orelse: NodeSeq,
    },
    TryFinally {
        body: NodeSeq,
        finalbody: NodeSeq,
    },
    Assert {
        test: Arc<Node>,
        fail: Arc<Node>,
    },
    Import {
        names: Vec<ImportName>,
    },
    ImportFrom {
        modname: String,
        names: Vec<ImportName>,
        level: Option<u32>,
    },
    Global {
        names: Vec<String>,
    },
    Nonlocal {
        names: Vec<String>,
    },
    Expr {
        value: Arc<Node>,
    },
    Pass,
    Break,
    Continue,
    /// Historical print statement.
    Print {
        nl: bool,
        dest: Arc<Node>,
        values: NodeSeq,
    },
    /// Historical exec statement.
    Exec {
        expr: Arc<Node>,
        globals: Arc<Node>,
        locals: Arc<Node>,
    },

    // --- expressions ---
    BoolOp {
        op: String,
        values: NodeSeq,
    },
    BinOp {
        op: String,
        left: Arc<Node>,
        right: Arc<Node>,
    },
    UnaryOp {
        op: String,
        operand: Arc<Node>,
    },
    Lambda {
        name: String,
        args: Arc<Node>,
        body: Arc<Node>,
    },
    IfExp {
        test: Arc<Node>,
        body: Arc<Node>,
        orelse: Arc<Node>,
    },
    Dict {
        keys: NodeSeq,
        values: NodeSeq,
    },
    Set {
        elts: NodeSeq,
    },
    ListComp {
        generators: NodeSeq,
        elt: Arc<Node>,
    },
    SetComp {
        generators: NodeSeq,
        elt: Arc<Node>,
    },
    DictComp {
        generators: NodeSeq,
        key: Arc<Node>,
        value: Arc<Node>,
    },
    GeneratorExp {
        generators: NodeSeq,
        elt: Arc<Node>,
    },
    Await {
        value: Arc<Node>,
    },
    Yield {
        value: Arc<Node>,
    },
    YieldFrom {
        value: Arc<Node>,
    },
    Compare {
        ops: Vec<String>,
        left: Arc<Node>,
        comparators: NodeSeq,
    },
    Call {
        func: Arc<Node>,
        args: NodeSeq,
        keywords: NodeSeq,
    },
    /// Historical backquote expression.
    Repr {
        value: Arc<Node>,
    },
    Const {
        value: LiteralValue,
    },
    /// A reserved singleton spelled as a name in load context.
    NameConstant {
        value: LiteralValue,
    },
    Ellipsis,
    Attribute {
        attrname: String,
        expr: Arc<Node>,
    },
    AssignAttr {
        attrname: String,
        expr: Arc<Node>,
    },
    DelAttr {
        attrname: String,
        expr: Arc<Node>,
    },
    Subscript {
        ctx: Context,
        value: Arc<Node>,
        slice: Arc<Node>,
    },
    Starred {
        ctx: Context,
        value: Arc<Node>,
    },
    Name {
        name: String,
    },
    AssignName {
        name: String,
    },
    DelName {
        name: String,
    },
    List {
        ctx: Context,
        elts: NodeSeq,
    },
    Tuple {
        ctx: Context,
        elts: NodeSeq,
    },
    Slice {
        lower: Arc<Node>,
        upper: Arc<Node>,
        step: Arc<Node>,
    },
    Index {
        value: Arc<Node>,
    },
    ExtSlice {
        dims: NodeSeq,
    },

    // --- auxiliary ---
    Arguments(ArgumentsNode),
    Parameter {
        name: String,
        default: Arc<Node>,
        annotation: Arc<Node>,
    },
    Keyword {
        /// `None` marks a double-star unpacking keyword.
        arg: Option<String>,
        value: Arc<Node>,
    },
    Comprehension {
        target: Arc<Node>,
        iter: Arc<Node>,
        ifs: NodeSeq,
    },
    Decorators {
        nodes: NodeSeq,
    },
    ExceptHandler {
        etype: Arc<Node>,
        name: Arc<Node>,
        body: NodeSeq,
    },
    WithItem {
        context_expr: Arc<Node>,
        optional_vars: Arc<Node>,
    },
    /// Marks a double-star entry in a dict display.
    DictUnpack,
    Empty,
}

// ============================================================================
// MODULE
// ============================================================================

/// The root node of a built tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleNode {
    pub name: String,
    pub doc: Option<String>,
    pub package: bool,
    pub pure_python: bool,
    pub file_encoding: Option<String>,
    pub source_code: Option<Vec<u8>>,
    pub source_file: Option<PathBuf>,
    pub body: NodeSeq,
}

impl ModuleNode {
    /// The set of `__future__` compatibility imports active for this file,
    /// computed structurally: an optional leading docstring followed by any
    /// number of `from __future__ import ...` statements.
    pub fn future_imports(&self) -> BTreeSet<String> {
        let mut imports = BTreeSet::new();
        for (index, stmt) in self.body.iter().enumerate() {
            match &stmt.kind {
                NodeKind::ImportFrom { modname, names, .. } if modname == "__future__" => {
                    imports.extend(names.iter().map(|(name, _)| name.clone()));
                }
                // A docstring may precede the future imports.
                NodeKind::Expr { .. } if index == 0 => {}
                _ => break,
            }
        }
        imports
    }

    /// Opens a byte stream over the underlying source. The handle is
    /// released when the returned reader is dropped, on every exit path.
    pub fn source_stream(&self) -> io::Result<Box<dyn Read>> {
        if let Some(code) = &self.source_code {
            return Ok(Box::new(io::Cursor::new(code.clone())));
        }
        if let Some(path) = &self.source_file {
            let file = fs::File::open(path)?;
            return Ok(Box::new(file));
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            "module has neither source text nor a source path",
        ))
    }

    pub fn absolute_import_activated(&self, dialect: Dialect) -> bool {
        match dialect {
            Dialect::Python3 => true,
            Dialect::Python2 => self.future_imports().contains("absolute_import"),
        }
    }

    /// Resolves a possibly-relative import to an absolute module name.
    pub fn relative_to_absolute_name(
        &self,
        modname: &str,
        level: Option<u32>,
        dialect: Dialect,
    ) -> Result<String, ArborError> {
        if self.absolute_import_activated(dialect) && level.is_none() {
            return Ok(modname.to_string());
        }
        let package_name = if let Some(requested) = level {
            let mut level = requested;
            if self.package {
                level = level.saturating_sub(1);
            }
            if level > 0 && (self.name.matches('.').count() as u32) < level {
                return Err(ArborError::bare(ErrorKind::TooManyLevels {
                    level,
                    name: self.name.clone(),
                })
                .with_module(self.name.clone()));
            }
            drop_last_components(&self.name, level as usize)
        } else if self.package {
            self.name.clone()
        } else {
            drop_last_components(&self.name, 1)
        };
        if package_name.is_empty() {
            return Ok(modname.to_string());
        }
        if modname.is_empty() {
            return Ok(package_name);
        }
        Ok(format!("{}.{}", package_name, modname))
    }
}

fn drop_last_components(name: &str, count: usize) -> String {
    if count == 0 {
        return name.to_string();
    }
    let parts: Vec<&str> = name.split('.').collect();
    let keep = parts.len().saturating_sub(count).max(1);
    parts[..keep].join(".")
}

// ============================================================================
// ARGUMENTS
// ============================================================================

/// The parameter list of a function, lambda or historical construct.
/// All entries are `Parameter` nodes (or Empty for absent variadics).
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentsNode {
    pub args: NodeSeq,
    pub vararg: Arc<Node>,
    pub kwarg: Arc<Node>,
    pub keyword_only: NodeSeq,
    pub positional_only: NodeSeq,
}

impl ArgumentsNode {
    /// Plain and positional-only parameters, concatenated.
    pub fn positional_and_keyword(&self) -> Vec<Arc<Node>> {
        self.args
            .iter()
            .chain(self.positional_only.iter())
            .cloned()
            .collect()
    }

    /// Looks up the default value for `argname`.
    ///
    /// `owner` names the function or lambda holding this parameter list and
    /// is only used to build the error.
    pub fn default_value(&self, argname: &str, owner: &str) -> Result<Arc<Node>, ArborError> {
        let places = [self.positional_and_keyword(), self.keyword_only.to_vec()];
        for place in &places {
            if let Some((index, _)) = find_argument(place, argname, false) {
                if let NodeKind::Parameter { default, .. } = &place[index].kind {
                    if !default.is_empty() {
                        return Ok(default.clone());
                    }
                }
            }
        }
        Err(ArborError::bare(ErrorKind::NoDefault {
            function: owner.to_string(),
            argument: argname.to_string(),
        }))
    }

    /// True if `name` is bound by this parameter list.
    pub fn is_argument(&self, name: &str) -> bool {
        if parameter_name(&self.vararg) == Some(name) {
            return true;
        }
        if parameter_name(&self.kwarg) == Some(name) {
            return true;
        }
        if find_argument(&self.keyword_only.to_vec(), name, true).is_some() {
            return true;
        }
        self.find_argname(name, true).is_some()
    }

    /// Index and node of the named positional parameter, recursing into
    /// legacy tuple parameters when `rec` is set.
    pub fn find_argname(&self, argname: &str, rec: bool) -> Option<(usize, Arc<Node>)> {
        find_argument(&self.positional_and_keyword(), argname, rec)
    }

    /// All parameter names, in declaration order.
    pub fn argnames(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_names(&self.positional_and_keyword(), &mut names);
        if let Some(name) = parameter_name(&self.vararg) {
            names.push(name.to_string());
        }
        if let Some(name) = parameter_name(&self.kwarg) {
            names.push(name.to_string());
        }
        collect_names(&self.keyword_only.to_vec(), &mut names);
        names
    }

    /// Renders the parameter list the way a signature would show it.
    pub fn format_args(&self) -> String {
        let mut result = Vec::new();
        let positional = self.positional_and_keyword();
        if !positional.is_empty() {
            result.push(format_parameters(&positional));
        }
        if !self.vararg.is_empty() {
            result.push(format!("*{}", format_parameters(&[self.vararg.clone()])));
        }
        if !self.keyword_only.is_empty() {
            if self.vararg.is_empty() {
                result.push("*".to_string());
            }
            result.push(format_parameters(&self.keyword_only.to_vec()));
        }
        if !self.kwarg.is_empty() {
            result.push(format!("**{}", format_parameters(&[self.kwarg.clone()])));
        }
        result.join(", ")
    }
}

fn parameter_name(node: &Arc<Node>) -> Option<&str> {
    match &node.kind {
        NodeKind::Parameter { name, .. } => Some(name),
        _ => None,
    }
}

fn find_argument(params: &[Arc<Node>], argname: &str, rec: bool) -> Option<(usize, Arc<Node>)> {
    for (index, param) in params.iter().enumerate() {
        match &param.kind {
            NodeKind::Tuple { elts, .. } if rec => {
                if let Some(found) = find_argument(&elts.to_vec(), argname, rec) {
                    return Some(found);
                }
            }
            NodeKind::Parameter { name, .. } | NodeKind::AssignName { name } if name == argname => {
                return Some((index, param.clone()));
            }
            _ => {}
        }
    }
    None
}

fn collect_names(params: &[Arc<Node>], names: &mut Vec<String>) {
    for param in params {
        match &param.kind {
            NodeKind::Tuple { elts, .. } => collect_names(&elts.to_vec(), names),
            NodeKind::Parameter { name, .. } | NodeKind::AssignName { name } => {
                names.push(name.clone())
            }
            _ => {}
        }
    }
}

fn format_parameters(params: &[Arc<Node>]) -> String {
    let mut values = Vec::new();
    for param in params {
        match &param.kind {
            NodeKind::Tuple { elts, .. } => {
                values.push(format!("({})", format_parameters(&elts.to_vec())));
            }
            NodeKind::Parameter {
                name,
                default,
                annotation,
            } => {
                let mut rendered = name.clone();
                if !annotation.is_empty() {
                    rendered.push_str(&format!(":{}", annotation.kind_name()));
                }
                if !default.is_empty() {
                    rendered.push_str(&format!("={}", display::brief(default)));
                }
                values.push(rendered);
            }
            _ => {}
        }
    }
    values.join(", ")
}

// ============================================================================
// FIELD INTROSPECTION
// ============================================================================

impl Node {
    /// The variant name, as the display dump and diagnostics show it.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Module(_) => "Module",
            NodeKind::FunctionDef { .. } => "FunctionDef",
            NodeKind::AsyncFunctionDef { .. } => "AsyncFunctionDef",
            NodeKind::ClassDef { .. } => "ClassDef",
            NodeKind::Return { .. } => "Return",
            NodeKind::Delete { .. } => "Delete",
            NodeKind::Assign { .. } => "Assign",
            NodeKind::AugAssign { .. } => "AugAssign",
            NodeKind::For { .. } => "For",
            NodeKind::AsyncFor { .. } => "AsyncFor",
            NodeKind::While { .. } => "While",
            NodeKind::If { .. } => "If",
            NodeKind::With { .. } => "With",
            NodeKind::AsyncWith { .. } => "AsyncWith",
            NodeKind::Raise { .. } => "Raise",
            NodeKind::TryExcept { .. } => "TryExcept",
            NodeKind::TryFinally { .. } => "TryFinally",
            NodeKind::Assert { .. } => "Assert",
            NodeKind::Import { .. } => "Import",
            NodeKind::ImportFrom { .. } => "ImportFrom",
            NodeKind::Global { .. } => "Global",
            NodeKind::Nonlocal { .. } => "Nonlocal",
            NodeKind::Expr { .. } => "Expr",
            NodeKind::Pass => "Pass",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
            NodeKind::Print { .. } => "Print",
            NodeKind::Exec { .. } => "Exec",
            NodeKind::BoolOp { .. } => "BoolOp",
            NodeKind::BinOp { .. } => "BinOp",
            NodeKind::UnaryOp { .. } => "UnaryOp",
            NodeKind::Lambda { .. } => "Lambda",
            NodeKind::IfExp { .. } => "IfExp",
            NodeKind::Dict { .. } => "Dict",
            NodeKind::Set { .. } => "Set",
            NodeKind::ListComp { .. } => "ListComp",
            NodeKind::SetComp { .. } => "SetComp",
            NodeKind::DictComp { .. } => "DictComp",
            NodeKind::GeneratorExp { .. } => "GeneratorExp",
            NodeKind::Await { .. } => "Await",
            NodeKind::Yield { .. } => "Yield",
            NodeKind::YieldFrom { .. } => "YieldFrom",
            NodeKind::Compare { .. } => "Compare",
            NodeKind::Call { .. } => "Call",
            NodeKind::Repr { .. } => "Repr",
            NodeKind::Const { .. } => "Const",
            NodeKind::NameConstant { .. } => "NameConstant",
            NodeKind::Ellipsis => "Ellipsis",
            NodeKind::Attribute { .. } => "Attribute",
            NodeKind::AssignAttr { .. } => "AssignAttr",
            NodeKind::DelAttr { .. } => "DelAttr",
            NodeKind::Subscript { .. } => "Subscript",
            NodeKind::Starred { .. } => "Starred",
            NodeKind::Name { .. } => "Name",
            NodeKind::AssignName { .. } => "AssignName",
            NodeKind::DelName { .. } => "DelName",
            NodeKind::List { .. } => "List",
            NodeKind::Tuple { .. } => "Tuple",
            NodeKind::Slice { .. } => "Slice",
            NodeKind::Index { .. } => "Index",
            NodeKind::ExtSlice { .. } => "ExtSlice",
            NodeKind::Arguments(_) => "Arguments",
            NodeKind::Parameter { .. } => "Parameter",
            NodeKind::Keyword { .. } => "Keyword",
            NodeKind::Comprehension { .. } => "Comprehension",
            NodeKind::Decorators { .. } => "Decorators",
            NodeKind::ExceptHandler { .. } => "ExceptHandler",
            NodeKind::WithItem { .. } => "WithItem",
            NodeKind::DictUnpack => "DictUnpack",
            NodeKind::Empty => "Empty",
        }
    }

    /// Names of the declared child fields, in declaration order.
    pub fn child_field_names(&self) -> &'static [&'static str] {
        match &self.kind {
            NodeKind::Module(_) => &["body"],
            NodeKind::FunctionDef { .. } | NodeKind::AsyncFunctionDef { .. } => {
                &["decorators", "args", "body", "returns"]
            }
            NodeKind::ClassDef { .. } => &["decorators", "bases", "body", "keywords"],
            NodeKind::Return { .. } => &["value"],
            NodeKind::Delete { .. } => &["targets"],
            NodeKind::Assign { .. } => &["targets", "value"],
            NodeKind::AugAssign { .. } => &["target", "value"],
            NodeKind::For { .. } | NodeKind::AsyncFor { .. } => {
                &["target", "iter", "body", "orelse"]
            }
            NodeKind::While { .. } | NodeKind::If { .. } => &["test", "body", "orelse"],
            NodeKind::With { .. } | NodeKind::AsyncWith { .. } => &["items", "body"],
            NodeKind::Raise { .. } => &["exc", "cause", "traceback"],
            NodeKind::TryExcept { .. } => &["body", "handlers", "orelse"],
            NodeKind::TryFinally { .. } => &["body", "finalbody"],
            NodeKind::Assert { .. } => &["test", "fail"],
            NodeKind::Expr { .. } => &["value"],
            NodeKind::Print { .. } => &["dest", "values"],
            NodeKind::Exec { .. } => &["expr", "globals", "locals"],
            NodeKind::BoolOp { .. } => &["values"],
            NodeKind::BinOp { .. } => &["left", "right"],
            NodeKind::UnaryOp { .. } => &["operand"],
            NodeKind::Lambda { .. } => &["args", "body"],
            NodeKind::IfExp { .. } => &["test", "body", "orelse"],
            NodeKind::Dict { .. } => &["keys", "values"],
            NodeKind::Set { .. } => &["elts"],
            NodeKind::ListComp { .. } | NodeKind::SetComp { .. } | NodeKind::GeneratorExp { .. } => {
                &["generators", "elt"]
            }
            NodeKind::DictComp { .. } => &["generators", "key", "value"],
            NodeKind::Await { .. } | NodeKind::Yield { .. } | NodeKind::YieldFrom { .. } => {
                &["value"]
            }
            NodeKind::Compare { .. } => &["left", "comparators"],
            NodeKind::Call { .. } => &["func", "args", "keywords"],
            NodeKind::Repr { .. } => &["value"],
            NodeKind::Attribute { .. } | NodeKind::AssignAttr { .. } | NodeKind::DelAttr { .. } => {
                &["expr"]
            }
            NodeKind::Subscript { .. } => &["value", "slice"],
            NodeKind::Starred { .. } => &["value"],
            NodeKind::List { .. } | NodeKind::Tuple { .. } => &["elts"],
            NodeKind::Slice { .. } => &["lower", "upper", "step"],
            NodeKind::Index { .. } => &["value"],
            NodeKind::ExtSlice { .. } => &["dims"],
            NodeKind::Arguments(_) => {
                &["args", "vararg", "kwarg", "keyword_only", "positional_only"]
            }
            NodeKind::Parameter { .. } => &["default", "annotation"],
            NodeKind::Keyword { .. } => &["value"],
            NodeKind::Comprehension { .. } => &["target", "iter", "ifs"],
            NodeKind::Decorators { .. } => &["nodes"],
            NodeKind::ExceptHandler { .. } => &["type", "name", "body"],
            NodeKind::WithItem { .. } => &["context_expr", "optional_vars"],
            _ => &[],
        }
    }

    /// The declared child fields, in declaration order. This is the one
    /// traversal primitive every generic walker builds on.
    pub fn children(&self) -> Vec<Field> {
        use Field::{Node as N, Seq as S};
        match &self.kind {
            NodeKind::Module(m) => vec![S(m.body.clone())],
            NodeKind::FunctionDef {
                decorators,
                args,
                body,
                returns,
                ..
            }
            | NodeKind::AsyncFunctionDef {
                decorators,
                args,
                body,
                returns,
                ..
            } => vec![
                N(decorators.clone()),
                N(args.clone()),
                S(body.clone()),
                N(returns.clone()),
            ],
            NodeKind::ClassDef {
                decorators,
                bases,
                body,
                keywords,
                ..
            } => vec![
                N(decorators.clone()),
                S(bases.clone()),
                S(body.clone()),
                S(keywords.clone()),
            ],
            NodeKind::Return { value } => vec![N(value.clone())],
            NodeKind::Delete { targets } => vec![S(targets.clone())],
            NodeKind::Assign { targets, value } => vec![S(targets.clone()), N(value.clone())],
            NodeKind::AugAssign { target, value, .. } => {
                vec![N(target.clone()), N(value.clone())]
            }
            NodeKind::For {
                target,
                iter,
                body,
                orelse,
            }
            | NodeKind::AsyncFor {
                target,
                iter,
                body,
                orelse,
            } => vec![
                N(target.clone()),
                N(iter.clone()),
                S(body.clone()),
                S(orelse.clone()),
            ],
            NodeKind::While { test, body, orelse } | NodeKind::If { test, body, orelse } => {
                vec![N(test.clone()), S(body.clone()), S(orelse.clone())]
            }
            NodeKind::With { items, body } | NodeKind::AsyncWith { items, body } => {
                vec![S(items.clone()), S(body.clone())]
            }
            NodeKind::Raise {
                exc,
                cause,
                traceback,
            } => vec![N(exc.clone()), N(cause.clone()), N(traceback.clone())],
            NodeKind::TryExcept {
                body,
                handlers,
                orelse,
            } => vec![S(body.clone()), S(handlers.clone()), S(orelse.clone())],
            NodeKind::TryFinally { body, finalbody } => {
                vec![S(body.clone()), S(finalbody.clone())]
            }
            NodeKind::Assert { test, fail } => vec![N(test.clone()), N(fail.clone())],
            NodeKind::Expr { value } => vec![N(value.clone())],
            NodeKind::Print { dest, values, .. } => vec![N(dest.clone()), S(values.clone())],
            NodeKind::Exec {
                expr,
                globals,
                locals,
            } => vec![N(expr.clone()), N(globals.clone()), N(locals.clone())],
            NodeKind::BoolOp { values, .. } => vec![S(values.clone())],
            NodeKind::BinOp { left, right, .. } => vec![N(left.clone()), N(right.clone())],
            NodeKind::UnaryOp { operand, .. } => vec![N(operand.clone())],
            NodeKind::Lambda { args, body, .. } => vec![N(args.clone()), N(body.clone())],
            NodeKind::IfExp { test, body, orelse } => {
                vec![N(test.clone()), N(body.clone()), N(orelse.clone())]
            }
            NodeKind::Dict { keys, values } => vec![S(keys.clone()), S(values.clone())],
            NodeKind::Set { elts } => vec![S(elts.clone())],
            NodeKind::ListComp { generators, elt }
            | NodeKind::SetComp { generators, elt }
            | NodeKind::GeneratorExp { generators, elt } => {
                vec![S(generators.clone()), N(elt.clone())]
            }
            NodeKind::DictComp {
                generators,
                key,
                value,
            } => vec![S(generators.clone()), N(key.clone()), N(value.clone())],
            NodeKind::Await { value }
            | NodeKind::Yield { value }
            | NodeKind::YieldFrom { value } => vec![N(value.clone())],
            NodeKind::Compare {
                left, comparators, ..
            } => vec![N(left.clone()), S(comparators.clone())],
            NodeKind::Call {
                func,
                args,
                keywords,
            } => vec![N(func.clone()), S(args.clone()), S(keywords.clone())],
            NodeKind::Repr { value } => vec![N(value.clone())],
            NodeKind::Attribute { expr, .. }
            | NodeKind::AssignAttr { expr, .. }
            | NodeKind::DelAttr { expr, .. } => vec![N(expr.clone())],
            NodeKind::Subscript { value, slice, .. } => {
                vec![N(value.clone()), N(slice.clone())]
            }
            NodeKind::Starred { value, .. } => vec![N(value.clone())],
            NodeKind::List { elts, .. } | NodeKind::Tuple { elts, .. } => vec![S(elts.clone())],
            NodeKind::Slice { lower, upper, step } => {
                vec![N(lower.clone()), N(upper.clone()), N(step.clone())]
            }
            NodeKind::Index { value } => vec![N(value.clone())],
            NodeKind::ExtSlice { dims } => vec![S(dims.clone())],
            NodeKind::Arguments(a) => vec![
                S(a.args.clone()),
                N(a.vararg.clone()),
                N(a.kwarg.clone()),
                S(a.keyword_only.clone()),
                S(a.positional_only.clone()),
            ],
            NodeKind::Parameter {
                default,
                annotation,
                ..
            } => vec![N(default.clone()), N(annotation.clone())],
            NodeKind::Keyword { value, .. } => vec![N(value.clone())],
            NodeKind::Comprehension { target, iter, ifs } => {
                vec![N(target.clone()), N(iter.clone()), S(ifs.clone())]
            }
            NodeKind::Decorators { nodes } => vec![S(nodes.clone())],
            NodeKind::ExceptHandler { etype, name, body } => {
                vec![N(etype.clone()), N(name.clone()), S(body.clone())]
            }
            NodeKind::WithItem {
                context_expr,
                optional_vars,
            } => vec![N(context_expr.clone()), N(optional_vars.clone())],
            NodeKind::Import { .. }
            | NodeKind::ImportFrom { .. }
            | NodeKind::Global { .. }
            | NodeKind::Nonlocal { .. }
            | NodeKind::Pass
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Const { .. }
            | NodeKind::NameConstant { .. }
            | NodeKind::Ellipsis
            | NodeKind::Name { .. }
            | NodeKind::AssignName { .. }
            | NodeKind::DelName { .. }
            | NodeKind::DictUnpack
            | NodeKind::Empty => vec![],
        }
    }

    /// The last non-empty child entry, scanned in reverse declaration
    /// order; the cheap way to reach a node's textual end.
    pub fn last_child(&self) -> Option<Arc<Node>> {
        for field in self.children().into_iter().rev() {
            match field {
                Field::Node(n) if !n.is_empty() => return Some(n),
                Field::Seq(s) if !s.is_empty() => return Some(s[s.len() - 1].clone()),
                _ => {}
            }
        }
        None
    }

    /// Non-child fields as printable name/value pairs, declaration order.
    pub fn scalar_fields(&self) -> Vec<(&'static str, String)> {
        fn opt_str(value: &Option<String>) -> String {
            match value {
                Some(v) => format!("{:?}", v),
                None => "None".to_string(),
            }
        }
        match &self.kind {
            NodeKind::Module(m) => vec![
                ("name", format!("{:?}", m.name)),
                ("doc", opt_str(&m.doc)),
                ("package", m.package.to_string()),
                ("pure_python", m.pure_python.to_string()),
                (
                    "source_code",
                    match &m.source_code {
                        Some(code) => format!("<{} bytes>", code.len()),
                        None => "None".to_string(),
                    },
                ),
                (
                    "source_file",
                    match &m.source_file {
                        Some(path) => format!("{:?}", path),
                        None => "None".to_string(),
                    },
                ),
                (
                    "file_encoding",
                    opt_str(&m.file_encoding),
                ),
            ],
            NodeKind::FunctionDef { name, doc, .. }
            | NodeKind::AsyncFunctionDef { name, doc, .. }
            | NodeKind::ClassDef { name, doc, .. } => vec![
                ("name", format!("{:?}", name)),
                ("doc", opt_str(doc)),
            ],
            NodeKind::AugAssign { op, .. }
            | NodeKind::BoolOp { op, .. }
            | NodeKind::BinOp { op, .. }
            | NodeKind::UnaryOp { op, .. } => vec![("op", format!("{:?}", op))],
            NodeKind::Import { names } => vec![("names", format!("{:?}", names))],
            NodeKind::ImportFrom {
                modname,
                names,
                level,
            } => vec![
                ("modname", format!("{:?}", modname)),
                ("names", format!("{:?}", names)),
                (
                    "level",
                    match level {
                        Some(l) => l.to_string(),
                        None => "None".to_string(),
                    },
                ),
            ],
            NodeKind::Global { names } | NodeKind::Nonlocal { names } => {
                vec![("names", format!("{:?}", names))]
            }
            NodeKind::Print { nl, .. } => vec![("nl", nl.to_string())],
            NodeKind::Lambda { name, .. } => vec![("name", format!("{:?}", name))],
            NodeKind::Compare { ops, .. } => vec![("ops", format!("{:?}", ops))],
            NodeKind::Const { value } | NodeKind::NameConstant { value } => {
                vec![("value", value.to_string())]
            }
            NodeKind::Attribute { attrname, .. }
            | NodeKind::AssignAttr { attrname, .. }
            | NodeKind::DelAttr { attrname, .. } => {
                vec![("attrname", format!("{:?}", attrname))]
            }
            NodeKind::Subscript { ctx, .. }
            | NodeKind::Starred { ctx, .. }
            | NodeKind::List { ctx, .. }
            | NodeKind::Tuple { ctx, .. } => vec![("ctx", ctx.to_string())],
            NodeKind::Name { name }
            | NodeKind::AssignName { name }
            | NodeKind::DelName { name }
            | NodeKind::Parameter { name, .. } => vec![("name", format!("{:?}", name))],
            NodeKind::Keyword { arg, .. } => vec![("arg", opt_str(arg))],
            _ => vec![],
        }
    }

    /// Rebuilds this variant with `fields` as its child fields. The field
    /// list must match the declared shape exactly; a mismatch is a
    /// structural contract violation and panics.
    pub fn with_children(&self, fields: Vec<Field>) -> Node {
        let declared = self.child_field_names().len();
        if fields.len() != declared {
            panic!(
                "child field shape mismatch on {}: expected {} fields, got {}",
                self.kind_name(),
                declared,
                fields.len()
            );
        }
        let mut it = fields.into_iter();
        let kind_name = self.kind_name();
        let node = |it: &mut std::vec::IntoIter<Field>| -> Arc<Node> {
            match it.next() {
                Some(Field::Node(n)) => n,
                _ => panic!("child field shape mismatch on {}: expected a node", kind_name),
            }
        };
        let sequence = |it: &mut std::vec::IntoIter<Field>| -> NodeSeq {
            match it.next() {
                Some(Field::Seq(s)) => s,
                _ => panic!(
                    "child field shape mismatch on {}: expected a sequence",
                    kind_name
                ),
            }
        };
        let kind = match &self.kind {
            NodeKind::Module(m) => NodeKind::Module(ModuleNode {
                body: sequence(&mut it),
                ..m.clone()
            }),
            NodeKind::FunctionDef { name, doc, .. } => NodeKind::FunctionDef {
                name: name.clone(),
                doc: doc.clone(),
                decorators: node(&mut it),
                args: node(&mut it),
                body: sequence(&mut it),
                returns: node(&mut it),
            },
            NodeKind::AsyncFunctionDef { name, doc, .. } => NodeKind::AsyncFunctionDef {
                name: name.clone(),
                doc: doc.clone(),
                decorators: node(&mut it),
                args: node(&mut it),
                body: sequence(&mut it),
                returns: node(&mut it),
            },
            NodeKind::ClassDef { name, doc, .. } => NodeKind::ClassDef {
                name: name.clone(),
                doc: doc.clone(),
                decorators: node(&mut it),
                bases: sequence(&mut it),
                body: sequence(&mut it),
                keywords: sequence(&mut it),
            },
            NodeKind::Return { .. } => NodeKind::Return {
                value: node(&mut it),
            },
            NodeKind::Delete { .. } => NodeKind::Delete {
                targets: sequence(&mut it),
            },
            NodeKind::Assign { .. } => NodeKind::Assign {
                targets: sequence(&mut it),
                value: node(&mut it),
            },
            NodeKind::AugAssign { op, .. } => NodeKind::AugAssign {
                op: op.clone(),
                target: node(&mut it),
                value: node(&mut it),
            },
            NodeKind::For { .. } => NodeKind::For {
                target: node(&mut it),
                iter: node(&mut it),
                body: sequence(&mut it),
                orelse: sequence(&mut it),
            },
            NodeKind::AsyncFor { .. } => NodeKind::AsyncFor {
                target: node(&mut it),
                iter: node(&mut it),
                body: sequence(&mut it),
                orelse: sequence(&mut it),
            },
            NodeKind::While { .. } => NodeKind::While {
                test: node(&mut it),
                body: sequence(&mut it),
                orelse: sequence(&mut it),
            },
            NodeKind::If { .. } => NodeKind::If {
                test: node(&mut it),
                body: sequence(&mut it),
                orelse: sequence(&mut it),
            },
            NodeKind::With { .. } => NodeKind::With {
                items: sequence(&mut it),
                body: sequence(&mut it),
            },
            NodeKind::AsyncWith { .. } => NodeKind::AsyncWith {
                items: sequence(&mut it),
                body: sequence(&mut it),
            },
            NodeKind::Raise { .. } => NodeKind::Raise {
                exc: node(&mut it),
                cause: node(&mut it),
                traceback: node(&mut it),
            },
            NodeKind::TryExcept { .. } => NodeKind::TryExcept {
                body: sequence(&mut it),
                handlers: sequence(&mut it),
                orelse: sequence(&mut it),
            },
            NodeKind::TryFinally { .. } => NodeKind::TryFinally {
                body: sequence(&mut it),
                finalbody: sequence(&mut it),
            },
            NodeKind::Assert { .. } => NodeKind::Assert {
                test: node(&mut it),
                fail: node(&mut it),
            },
            NodeKind::Expr { .. } => NodeKind::Expr {
                value: node(&mut it),
            },
            NodeKind::Print { nl, .. } => NodeKind::Print {
                nl: *nl,
                dest: node(&mut it),
                values: sequence(&mut it),
            },
            NodeKind::Exec { .. } => NodeKind::Exec {
                expr: node(&mut it),
                globals: node(&mut it),
                locals: node(&mut it),
            },
            NodeKind::BoolOp { op, .. } => NodeKind::BoolOp {
                op: op.clone(),
                values: sequence(&mut it),
            },
            NodeKind::BinOp { op, .. } => NodeKind::BinOp {
                op: op.clone(),
                left: node(&mut it),
                right: node(&mut it),
            },
            NodeKind::UnaryOp { op, .. } => NodeKind::UnaryOp {
                op: op.clone(),
                operand: node(&mut it),
            },
            NodeKind::Lambda { name, .. } => NodeKind::Lambda {
                name: name.clone(),
                args: node(&mut it),
                body: node(&mut it),
            },
            NodeKind::IfExp { .. } => NodeKind::IfExp {
                test: node(&mut it),
                body: node(&mut it),
                orelse: node(&mut it),
            },
            NodeKind::Dict { .. } => NodeKind::Dict {
                keys: sequence(&mut it),
                values: sequence(&mut it),
            },
            NodeKind::Set { .. } => NodeKind::Set {
                elts: sequence(&mut it),
            },
            NodeKind::ListComp { .. } => NodeKind::ListComp {
                generators: sequence(&mut it),
                elt: node(&mut it),
            },
            NodeKind::SetComp { .. } => NodeKind::SetComp {
                generators: sequence(&mut it),
                elt: node(&mut it),
            },
            NodeKind::DictComp { .. } => NodeKind::DictComp {
                generators: sequence(&mut it),
                key: node(&mut it),
                value: node(&mut it),
            },
            NodeKind::GeneratorExp { .. } => NodeKind::GeneratorExp {
                generators: sequence(&mut it),
                elt: node(&mut it),
            },
            NodeKind::Await { .. } => NodeKind::Await {
                value: node(&mut it),
            },
            NodeKind::Yield { .. } => NodeKind::Yield {
                value: node(&mut it),
            },
            NodeKind::YieldFrom { .. } => NodeKind::YieldFrom {
                value: node(&mut it),
            },
            NodeKind::Compare { ops, .. } => NodeKind::Compare {
                ops: ops.clone(),
                left: node(&mut it),
                comparators: sequence(&mut it),
            },
            NodeKind::Call { .. } => NodeKind::Call {
                func: node(&mut it),
                args: sequence(&mut it),
                keywords: sequence(&mut it),
            },
            NodeKind::Repr { .. } => NodeKind::Repr {
                value: node(&mut it),
            },
            NodeKind::Attribute { attrname, .. } => NodeKind::Attribute {
                attrname: attrname.clone(),
                expr: node(&mut it),
            },
            NodeKind::AssignAttr { attrname, .. } => NodeKind::AssignAttr {
                attrname: attrname.clone(),
                expr: node(&mut it),
            },
            NodeKind::DelAttr { attrname, .. } => NodeKind::DelAttr {
                attrname: attrname.clone(),
                expr: node(&mut it),
            },
            NodeKind::Subscript { ctx, .. } => NodeKind::Subscript {
                ctx: *ctx,
                value: node(&mut it),
                slice: node(&mut it),
            },
            NodeKind::Starred { ctx, .. } => NodeKind::Starred {
                ctx: *ctx,
                value: node(&mut it),
            },
            NodeKind::List { ctx, .. } => NodeKind::List {
                ctx: *ctx,
                elts: sequence(&mut it),
            },
            NodeKind::Tuple { ctx, .. } => NodeKind::Tuple {
                ctx: *ctx,
                elts: sequence(&mut it),
            },
            NodeKind::Slice { .. } => NodeKind::Slice {
                lower: node(&mut it),
                upper: node(&mut it),
                step: node(&mut it),
            },
            NodeKind::Index { .. } => NodeKind::Index {
                value: node(&mut it),
            },
            NodeKind::ExtSlice { .. } => NodeKind::ExtSlice {
                dims: sequence(&mut it),
            },
            NodeKind::Arguments(_) => NodeKind::Arguments(ArgumentsNode {
                args: sequence(&mut it),
                vararg: node(&mut it),
                kwarg: node(&mut it),
                keyword_only: sequence(&mut it),
                positional_only: sequence(&mut it),
            }),
            NodeKind::Parameter { name, .. } => NodeKind::Parameter {
                name: name.clone(),
                default: node(&mut it),
                annotation: node(&mut it),
            },
            NodeKind::Keyword { arg, .. } => NodeKind::Keyword {
                arg: arg.clone(),
                value: node(&mut it),
            },
            NodeKind::Comprehension { .. } => NodeKind::Comprehension {
                target: node(&mut it),
                iter: node(&mut it),
                ifs: sequence(&mut it),
            },
            NodeKind::Decorators { .. } => NodeKind::Decorators {
                nodes: sequence(&mut it),
            },
            NodeKind::ExceptHandler { .. } => NodeKind::ExceptHandler {
                etype: node(&mut it),
                name: node(&mut it),
                body: sequence(&mut it),
            },
            NodeKind::WithItem { .. } => NodeKind::WithItem {
                context_expr: node(&mut it),
                optional_vars: node(&mut it),
            },
            other => other.clone(),
        };
        Node {
            kind,
            position: self.position,
        }
    }

    /// True for nodes that occupy a statement position.
    pub fn is_statement(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::FunctionDef { .. }
                | NodeKind::AsyncFunctionDef { .. }
                | NodeKind::ClassDef { .. }
                | NodeKind::Return { .. }
                | NodeKind::Delete { .. }
                | NodeKind::Assign { .. }
                | NodeKind::AugAssign { .. }
                | NodeKind::For { .. }
                | NodeKind::AsyncFor { .. }
                | NodeKind::While { .. }
                | NodeKind::If { .. }
                | NodeKind::With { .. }
                | NodeKind::AsyncWith { .. }
                | NodeKind::Raise { .. }
                | NodeKind::TryExcept { .. }
                | NodeKind::TryFinally { .. }
                | NodeKind::Assert { .. }
                | NodeKind::Import { .. }
                | NodeKind::ImportFrom { .. }
                | NodeKind::Global { .. }
                | NodeKind::Nonlocal { .. }
                | NodeKind::Expr { .. }
                | NodeKind::Pass
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Print { .. }
                | NodeKind::Exec { .. }
                | NodeKind::ExceptHandler { .. }
        )
    }

    /// The name or attribute name, when the variant carries one.
    pub fn repr_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Module(m) => Some(&m.name),
            NodeKind::FunctionDef { name, .. }
            | NodeKind::AsyncFunctionDef { name, .. }
            | NodeKind::ClassDef { name, .. }
            | NodeKind::Lambda { name, .. }
            | NodeKind::Name { name }
            | NodeKind::AssignName { name }
            | NodeKind::DelName { name }
            | NodeKind::Parameter { name, .. } => Some(name),
            NodeKind::Attribute { attrname, .. }
            | NodeKind::AssignAttr { attrname, .. }
            | NodeKind::DelAttr { attrname, .. } => Some(attrname),
            _ => None,
        }
    }
}
