//! The rebuilder: raw parse trees to canonical nodes.
//!
//! One [`Rebuilder`] instance owns one pass over one raw tree. Dispatch is
//! by raw kind name; a kind with no conversion routine is a grammar or
//! version mismatch and fails the build, never a silent drop. The
//! historical 2.x raw shapes (separate try forms, print/exec statements,
//! name parameters, `starargs`/`kwargs` call fields) are normalized here so
//! every downstream consumer sees a single representation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::errors::{ArborError, ErrorKind};
use crate::nodes::{
    empty, seq, ArgumentsNode, Context, Dialect, LiteralValue, ModuleNode, Node, NodeKind, NodeSeq,
    Position,
};
use crate::raw::RawNode;

static BIN_OP_SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Add", "+"),
        ("Sub", "-"),
        ("Mult", "*"),
        ("Div", "/"),
        ("FloorDiv", "//"),
        ("Mod", "%"),
        ("Pow", "**"),
        ("LShift", "<<"),
        ("RShift", ">>"),
        ("BitAnd", "&"),
        ("BitOr", "|"),
        ("BitXor", "^"),
        ("MatMult", "@"),
    ])
});

static BOOL_OP_SYMBOLS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("And", "and"), ("Or", "or")]));

static UNARY_OP_SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([("UAdd", "+"), ("USub", "-"), ("Not", "not"), ("Invert", "~")])
});

static COMPARE_OP_SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Eq", "=="),
        ("NotEq", "!="),
        ("Lt", "<"),
        ("LtE", "<="),
        ("Gt", ">"),
        ("GtE", ">="),
        ("Is", "is"),
        ("IsNot", "is not"),
        ("In", "in"),
        ("NotIn", "not in"),
    ])
});

/// Reserved singleton spellings; reclassified only in load context, since
/// binding or deleting them must stay visible as a name operation.
fn builtin_singleton(name: &str) -> Option<LiteralValue> {
    match name {
        "True" => Some(LiteralValue::Bool(true)),
        "False" => Some(LiteralValue::Bool(false)),
        "None" => Some(LiteralValue::None),
        "NotImplemented" => Some(LiteralValue::NotImplemented),
        _ => None,
    }
}

/// Rebuilds one raw tree into canonical nodes. Stateful per invocation:
/// the per-function global-name bookkeeping must not be shared across
/// concurrent rebuilds.
pub struct Rebuilder {
    dialect: Dialect,
    global_names: Vec<HashMap<String, Vec<Arc<Node>>>>,
}

impl Rebuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            global_names: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Converts a raw `Module` into the canonical root node.
    #[allow(clippy::too_many_arguments)]
    pub fn module(
        &mut self,
        raw: &RawNode,
        name: &str,
        path: Option<PathBuf>,
        package: bool,
        source_code: Option<Vec<u8>>,
        file_encoding: Option<String>,
    ) -> Result<Arc<Node>, ArborError> {
        if raw.kind != "Module" {
            return Err(no_conversion(&raw.kind));
        }
        let body_raw = raw.seq("body")?;
        let (doc, rest) = split_docstring(body_raw);
        let body = self.visit_seq(rest)?;
        Ok(Node::new(
            NodeKind::Module(ModuleNode {
                name: name.to_string(),
                doc,
                package,
                pure_python: true,
                file_encoding,
                source_code,
                source_file: path,
                body,
            }),
            Some(Position::new(0, 0)),
        ))
    }

    /// Converts one raw node, dispatching on its kind name.
    pub fn visit(&mut self, raw: &RawNode) -> Result<Arc<Node>, ArborError> {
        let pos = raw.position;
        let kind = match raw.kind.as_str() {
            "Empty" => return Ok(empty()),
            "Pass" => NodeKind::Pass,
            "Break" => NodeKind::Break,
            "Continue" => NodeKind::Continue,
            "Ellipsis" => NodeKind::Ellipsis,
            "Assert" => NodeKind::Assert {
                test: self.visit(raw.child("test")?)?,
                fail: self.opt(raw, "msg")?,
            },
            "Assign" => NodeKind::Assign {
                targets: self.visit_seq(raw.seq("targets")?)?,
                value: self.visit(raw.child("value")?)?,
            },
            "AugAssign" => NodeKind::AugAssign {
                op: format!("{}=", bin_symbol(raw.text("op")?)?),
                target: self.visit(raw.child("target")?)?,
                value: self.visit(raw.child("value")?)?,
            },
            "Repr" => NodeKind::Repr {
                value: self.visit(raw.child("value")?)?,
            },
            "BinOp" => NodeKind::BinOp {
                op: bin_symbol(raw.text("op")?)?.to_string(),
                left: self.visit(raw.child("left")?)?,
                right: self.visit(raw.child("right")?)?,
            },
            "BoolOp" => NodeKind::BoolOp {
                op: table_symbol(&BOOL_OP_SYMBOLS, raw.text("op")?)?.to_string(),
                values: self.visit_seq(raw.seq("values")?)?,
            },
            "UnaryOp" => NodeKind::UnaryOp {
                op: table_symbol(&UNARY_OP_SYMBOLS, raw.text("op")?)?.to_string(),
                operand: self.visit(raw.child("operand")?)?,
            },
            "Compare" => NodeKind::Compare {
                ops: raw
                    .seq("ops")?
                    .iter()
                    .map(|op| table_symbol(&COMPARE_OP_SYMBOLS, &op.kind).map(str::to_string))
                    .collect::<Result<Vec<_>, _>>()?,
                left: self.visit(raw.child("left")?)?,
                comparators: self.visit_seq(raw.seq("comparators")?)?,
            },
            "Call" => self.build_call(raw)?,
            "keyword" => NodeKind::Keyword {
                arg: raw.opt_text("arg").map(str::to_string),
                value: self.visit(raw.child("value")?)?,
            },
            "Num" => NodeKind::Const {
                value: if let Some(value) = raw.opt_int("i") {
                    LiteralValue::Int(value)
                } else if let Some(value) = raw.opt_float("f") {
                    LiteralValue::Float(value)
                } else if let Some(value) = raw.opt_float("j") {
                    LiteralValue::Complex(value)
                } else {
                    return Err(malformed("Num node carries no numeric field"));
                },
            },
            "Str" => NodeKind::Const {
                value: LiteralValue::Str(raw.text("s")?.to_string()),
            },
            "Bytes" => NodeKind::Const {
                value: LiteralValue::Bytes(raw.text("s")?.as_bytes().to_vec()),
            },
            "NameConstant" => NodeKind::NameConstant {
                value: builtin_singleton(raw.text("value")?)
                    .ok_or_else(|| malformed("NameConstant with an unknown value"))?,
            },
            "Name" => self.build_name(raw)?,
            "Attribute" => {
                let expr = self.visit(raw.child("value")?)?;
                let attrname = raw.text("attr")?.to_string();
                match context_of(raw) {
                    Context::Del => NodeKind::DelAttr { attrname, expr },
                    Context::Store => NodeKind::AssignAttr { attrname, expr },
                    Context::Load => NodeKind::Attribute { attrname, expr },
                }
            }
            "Subscript" => NodeKind::Subscript {
                ctx: context_of(raw),
                value: self.visit(raw.child("value")?)?,
                slice: self.visit(raw.child("slice")?)?,
            },
            "Starred" => NodeKind::Starred {
                ctx: context_of(raw),
                value: self.visit(raw.child("value")?)?,
            },
            "List" => NodeKind::List {
                ctx: context_of(raw),
                elts: self.visit_seq(raw.seq("elts")?)?,
            },
            "Tuple" => NodeKind::Tuple {
                ctx: context_of(raw),
                elts: self.visit_seq(raw.seq("elts")?)?,
            },
            "Set" => NodeKind::Set {
                elts: self.visit_seq(raw.seq("elts")?)?,
            },
            "Dict" => self.build_dict(raw)?,
            "Slice" => NodeKind::Slice {
                lower: self.opt(raw, "lower")?,
                upper: self.opt(raw, "upper")?,
                step: self.opt(raw, "step")?,
            },
            "Index" => NodeKind::Index {
                value: self.visit(raw.child("value")?)?,
            },
            "ExtSlice" => NodeKind::ExtSlice {
                dims: self.visit_seq(raw.seq("dims")?)?,
            },
            "Delete" => NodeKind::Delete {
                targets: self.visit_seq(raw.seq("targets")?)?,
            },
            "Expr" => NodeKind::Expr {
                value: self.visit(raw.child("value")?)?,
            },
            "Return" => NodeKind::Return {
                value: self.opt(raw, "value")?,
            },
            "Raise" => self.build_raise(raw)?,
            "Exec" => NodeKind::Exec {
                expr: self.visit(raw.child("body")?)?,
                globals: self.opt(raw, "globals")?,
                locals: self.opt(raw, "locals")?,
            },
            "Print" => NodeKind::Print {
                nl: raw.flag("nl"),
                dest: self.opt(raw, "dest")?,
                values: self.visit_seq(raw.seq("values")?)?,
            },
            "Import" => NodeKind::Import {
                names: import_names(raw)?,
            },
            "ImportFrom" => NodeKind::ImportFrom {
                modname: raw.opt_text("module").unwrap_or("").to_string(),
                names: import_names(raw)?,
                level: match raw.opt_int("level").unwrap_or(0) {
                    0 => None,
                    level => Some(level as u32),
                },
            },
            "Global" => {
                let names: Vec<String> = raw.texts("names")?.to_vec();
                let node = Node::new(
                    NodeKind::Global {
                        names: names.clone(),
                    },
                    pos,
                );
                // A global statement at module level has no effect.
                if let Some(scope) = self.global_names.last_mut() {
                    for name in names {
                        scope.entry(name).or_default().push(node.clone());
                    }
                }
                return Ok(node);
            }
            "Nonlocal" => NodeKind::Nonlocal {
                names: raw.texts("names")?.to_vec(),
            },
            "If" => NodeKind::If {
                test: self.visit(raw.child("test")?)?,
                body: self.visit_seq(raw.seq("body")?)?,
                orelse: self.visit_seq(raw.opt_seq("orelse"))?,
            },
            "IfExp" => NodeKind::IfExp {
                test: self.visit(raw.child("test")?)?,
                body: self.visit(raw.child("body")?)?,
                orelse: self.visit(raw.child("orelse")?)?,
            },
            "While" => NodeKind::While {
                test: self.visit(raw.child("test")?)?,
                body: self.visit_seq(raw.seq("body")?)?,
                orelse: self.visit_seq(raw.opt_seq("orelse"))?,
            },
            "For" | "AsyncFor" => {
                let target = self.visit(raw.child("target")?)?;
                let iter = self.visit(raw.child("iter")?)?;
                let body = self.visit_seq(raw.seq("body")?)?;
                let orelse = self.visit_seq(raw.opt_seq("orelse"))?;
                if raw.kind == "AsyncFor" {
                    NodeKind::AsyncFor {
                        target,
                        iter,
                        body,
                        orelse,
                    }
                } else {
                    NodeKind::For {
                        target,
                        iter,
                        body,
                        orelse,
                    }
                }
            }
            "With" | "AsyncWith" => self.build_with(raw)?,
            "withitem" => NodeKind::WithItem {
                context_expr: self.visit(raw.child("context_expr")?)?,
                optional_vars: self.opt(raw, "optional_vars")?,
            },
            "Try" => return self.build_try(raw),
            "TryExcept" => NodeKind::TryExcept {
                body: self.visit_seq(raw.seq("body")?)?,
                handlers: self.visit_seq(raw.opt_seq("handlers"))?,
                orelse: self.visit_seq(raw.opt_seq("orelse"))?,
            },
            "TryFinally" => NodeKind::TryFinally {
                body: self.visit_seq(raw.seq("body")?)?,
                finalbody: self.visit_seq(raw.opt_seq("finalbody"))?,
            },
            "excepthandler" => self.build_excepthandler(raw)?,
            "FunctionDef" | "AsyncFunctionDef" => return self.build_functiondef(raw),
            "Lambda" => NodeKind::Lambda {
                name: "<lambda>".to_string(),
                args: self.visit(raw.child("args")?)?,
                body: self.visit(raw.child("body")?)?,
            },
            "ClassDef" => return self.build_classdef(raw),
            "arguments" => return self.build_arguments(raw),
            "comprehension" => NodeKind::Comprehension {
                target: self.visit(raw.child("target")?)?,
                iter: self.visit(raw.child("iter")?)?,
                ifs: self.visit_seq(raw.opt_seq("ifs"))?,
            },
            "ListComp" => NodeKind::ListComp {
                generators: self.visit_seq(raw.seq("generators")?)?,
                elt: self.visit(raw.child("elt")?)?,
            },
            "SetComp" => NodeKind::SetComp {
                generators: self.visit_seq(raw.seq("generators")?)?,
                elt: self.visit(raw.child("elt")?)?,
            },
            "GeneratorExp" => NodeKind::GeneratorExp {
                generators: self.visit_seq(raw.seq("generators")?)?,
                elt: self.visit(raw.child("elt")?)?,
            },
            "DictComp" => NodeKind::DictComp {
                generators: self.visit_seq(raw.seq("generators")?)?,
                key: self.visit(raw.child("key")?)?,
                value: self.visit(raw.child("value")?)?,
            },
            "Await" => NodeKind::Await {
                value: self.visit(raw.child("value")?)?,
            },
            "Yield" => NodeKind::Yield {
                value: self.opt(raw, "value")?,
            },
            "YieldFrom" => NodeKind::YieldFrom {
                value: self.opt(raw, "value")?,
            },
            other => return Err(no_conversion(other)),
        };
        Ok(Node::new(kind, pos))
    }

    fn visit_seq(&mut self, raws: &[RawNode]) -> Result<NodeSeq, ArborError> {
        let nodes = raws
            .iter()
            .map(|raw| self.visit(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(seq(nodes))
    }

    fn opt(&mut self, raw: &RawNode, name: &str) -> Result<Arc<Node>, ArborError> {
        match raw.opt_child(name) {
            Some(child) => self.visit(child),
            None => Ok(empty()),
        }
    }

    fn build_name(&mut self, raw: &RawNode) -> Result<NodeKind, ArborError> {
        let id = raw.text("id")?.to_string();
        Ok(match context_of(raw) {
            Context::Del => NodeKind::DelName { name: id },
            Context::Store => NodeKind::AssignName { name: id },
            Context::Load => match builtin_singleton(&id) {
                Some(value) => NodeKind::NameConstant { value },
                None => NodeKind::Name { name: id },
            },
        })
    }

    // The historical call shape keeps unpacking in separate fields; fold
    // them into the argument lists so all call sites look alike.
    fn build_call(&mut self, raw: &RawNode) -> Result<NodeKind, ArborError> {
        let func = self.visit(raw.child("func")?)?;
        let mut args = self
            .visit_seq(raw.opt_seq("args"))?
            .to_vec();
        let mut keywords = self.visit_seq(raw.opt_seq("keywords"))?.to_vec();
        if let Some(star) = raw.opt_child("starargs") {
            let value = self.visit(star)?;
            let donor = value.position;
            args.push(Node::new(
                NodeKind::Starred {
                    ctx: Context::Load,
                    value,
                },
                donor,
            ));
        }
        if let Some(double_star) = raw.opt_child("kwargs") {
            let value = self.visit(double_star)?;
            let donor = value.position;
            keywords.push(Node::new(NodeKind::Keyword { arg: None, value }, donor));
        }
        Ok(NodeKind::Call {
            func,
            args: seq(args),
            keywords: seq(keywords),
        })
    }

    fn build_dict(&mut self, raw: &RawNode) -> Result<NodeKind, ArborError> {
        let raw_keys = raw.seq("keys")?;
        let raw_values = raw.seq("values")?;
        if raw_keys.len() != raw_values.len() {
            return Err(malformed("dict keys and values differ in length"));
        }
        let mut keys = Vec::with_capacity(raw_keys.len());
        let mut values = Vec::with_capacity(raw_values.len());
        for (key, value) in raw_keys.iter().zip(raw_values) {
            let value = self.visit(value)?;
            // A missing key marks a double-star unpacking entry.
            if key.kind == "Empty" {
                keys.push(Node::new(NodeKind::DictUnpack, value.position));
            } else {
                keys.push(self.visit(key)?);
            }
            values.push(value);
        }
        Ok(NodeKind::Dict {
            keys: seq(keys),
            values: seq(values),
        })
    }

    fn build_raise(&mut self, raw: &RawNode) -> Result<NodeKind, ArborError> {
        let historical = ["type", "inst", "tback"]
            .iter()
            .any(|field| raw.field(field).is_some());
        if historical {
            return Ok(NodeKind::Raise {
                exc: self.opt(raw, "type")?,
                cause: self.opt(raw, "inst")?,
                traceback: self.opt(raw, "tback")?,
            });
        }
        Ok(NodeKind::Raise {
            exc: self.opt(raw, "exc")?,
            cause: self.opt(raw, "cause")?,
            traceback: empty(),
        })
    }

    fn build_with(&mut self, raw: &RawNode) -> Result<NodeKind, ArborError> {
        let items = if raw.field("items").is_some() {
            self.visit_seq(raw.seq("items")?)?
        } else {
            // Historical shape: one context expression per statement.
            let context_expr = self.visit(raw.child("context_expr")?)?;
            let optional_vars = self.opt(raw, "optional_vars")?;
            let item_pos = context_expr.position;
            seq(vec![Node::new(
                NodeKind::WithItem {
                    context_expr,
                    optional_vars,
                },
                item_pos,
            )])
        };
        let body = self.visit_seq(raw.seq("body")?)?;
        Ok(if raw.kind == "AsyncWith" {
            NodeKind::AsyncWith { items, body }
        } else {
            NodeKind::With { items, body }
        })
    }

    // The unified try construct decomposes into nested try-except and
    // try-finally wrappers, so line ranges and scopes only ever see the
    // two canonical shapes.
    fn build_try(&mut self, raw: &RawNode) -> Result<Arc<Node>, ArborError> {
        let pos = raw.position;
        let handlers = raw.opt_seq("handlers");
        let finalbody = raw.opt_seq("finalbody");
        if !finalbody.is_empty() {
            let body = if !handlers.is_empty() {
                seq(vec![self.build_try_except(raw)?])
            } else {
                self.visit_seq(raw.seq("body")?)?
            };
            return Ok(Node::new(
                NodeKind::TryFinally {
                    body,
                    finalbody: self.visit_seq(finalbody)?,
                },
                pos,
            ));
        }
        if !handlers.is_empty() {
            return self.build_try_except(raw);
        }
        Err(malformed("try without except or finally clauses"))
    }

    fn build_try_except(&mut self, raw: &RawNode) -> Result<Arc<Node>, ArborError> {
        Ok(Node::new(
            NodeKind::TryExcept {
                body: self.visit_seq(raw.seq("body")?)?,
                handlers: self.visit_seq(raw.opt_seq("handlers"))?,
                orelse: self.visit_seq(raw.opt_seq("orelse"))?,
            },
            raw.position,
        ))
    }

    fn build_excepthandler(&mut self, raw: &RawNode) -> Result<NodeKind, ArborError> {
        let etype = self.opt(raw, "type")?;
        let name = match raw.opt_text("name") {
            Some(bound) => Node::new(
                NodeKind::AssignName {
                    name: bound.to_string(),
                },
                raw.position,
            ),
            None => match raw.opt_child("name") {
                // Historical shape: the bound name is an expression, and
                // may even be a tuple.
                Some(child) => self.visit(child)?,
                None => empty(),
            },
        };
        Ok(NodeKind::ExceptHandler {
            etype,
            name,
            body: self.visit_seq(raw.seq("body")?)?,
        })
    }

    fn build_functiondef(&mut self, raw: &RawNode) -> Result<Arc<Node>, ArborError> {
        self.global_names.push(HashMap::new());
        let result = self.build_functiondef_inner(raw);
        self.global_names.pop();
        result
    }

    fn build_functiondef_inner(&mut self, raw: &RawNode) -> Result<Arc<Node>, ArborError> {
        let (doc, rest) = split_docstring(raw.seq("body")?);
        let decorators = self.build_decorators(raw)?;
        let returns = match self.dialect {
            Dialect::Python3 => self.opt(raw, "returns")?,
            Dialect::Python2 => empty(),
        };
        let args = self.visit(raw.child("args")?)?;
        let body = self.visit_seq(rest)?;
        let name = raw.text("name")?.to_string();
        let kind = if raw.kind == "AsyncFunctionDef" {
            NodeKind::AsyncFunctionDef {
                name,
                doc,
                decorators,
                args,
                body,
                returns,
            }
        } else {
            NodeKind::FunctionDef {
                name,
                doc,
                decorators,
                args,
                body,
                returns,
            }
        };
        Ok(Node::new(kind, raw.position))
    }

    fn build_classdef(&mut self, raw: &RawNode) -> Result<Arc<Node>, ArborError> {
        let (doc, rest) = split_docstring(raw.seq("body")?);
        let keywords = match self.dialect {
            Dialect::Python3 => self.visit_seq(raw.opt_seq("keywords"))?,
            Dialect::Python2 => seq(Vec::new()),
        };
        Ok(Node::new(
            NodeKind::ClassDef {
                name: raw.text("name")?.to_string(),
                doc,
                decorators: self.build_decorators(raw)?,
                bases: self.visit_seq(raw.opt_seq("bases"))?,
                body: self.visit_seq(rest)?,
                keywords,
            },
            raw.position,
        ))
    }

    fn build_decorators(&mut self, raw: &RawNode) -> Result<Arc<Node>, ArborError> {
        let list = raw.opt_seq("decorator_list");
        if list.is_empty() {
            return Ok(empty());
        }
        let nodes = self.visit_seq(list)?;
        Ok(Node::new(NodeKind::Decorators { nodes }, raw.position))
    }

    fn build_arguments(&mut self, raw: &RawNode) -> Result<Arc<Node>, ArborError> {
        let args = self.build_parameters(raw.opt_seq("args"), raw.opt_seq("defaults"))?;
        let keyword_only =
            self.build_parameters(raw.opt_seq("kwonlyargs"), raw.opt_seq("kw_defaults"))?;
        let vararg = self.build_variadic(raw, "vararg")?;
        let kwarg = self.build_variadic(raw, "kwarg")?;
        Ok(Node::new(
            NodeKind::Arguments(ArgumentsNode {
                args: seq(args),
                vararg,
                kwarg,
                keyword_only: seq(keyword_only),
                positional_only: seq(Vec::new()),
            }),
            raw.position,
        ))
    }

    // Defaults are right-aligned against the parameter list: parameters
    // without a default are padded from the left with Empty before the
    // two lists are zipped.
    fn build_parameters(
        &mut self,
        params: &[RawNode],
        defaults: &[RawNode],
    ) -> Result<Vec<Arc<Node>>, ArborError> {
        if defaults.len() > params.len() {
            return Err(malformed("more defaults than parameters"));
        }
        let padding = params.len() - defaults.len();
        let mut out = Vec::with_capacity(params.len());
        for (index, param) in params.iter().enumerate() {
            let default = if index < padding {
                empty()
            } else {
                let raw_default = &defaults[index - padding];
                if raw_default.kind == "Empty" {
                    empty()
                } else {
                    self.visit(raw_default)?
                }
            };
            self.build_parameter(param, default, &mut out)?;
        }
        Ok(out)
    }

    fn build_parameter(
        &mut self,
        param: &RawNode,
        default: Arc<Node>,
        out: &mut Vec<Arc<Node>>,
    ) -> Result<(), ArborError> {
        match param.kind.as_str() {
            "arg" => {
                let annotation = self.opt(param, "annotation")?;
                out.push(Node::new(
                    NodeKind::Parameter {
                        name: param.text("arg")?.to_string(),
                        default,
                        annotation,
                    },
                    param.position,
                ));
            }
            "Name" => {
                out.push(Node::new(
                    NodeKind::Parameter {
                        name: param.text("id")?.to_string(),
                        default,
                        annotation: empty(),
                    },
                    param.position,
                ));
            }
            // Nested tuple parameters are unpacked element-wise;
            // best-effort, the legacy semantics are not reconstructed.
            "Tuple" => {
                let converted = self.visit(param)?;
                if let NodeKind::Tuple { elts, .. } = &converted.kind {
                    for elt in elts.iter() {
                        if let NodeKind::AssignName { name } = &elt.kind {
                            out.push(Node::new(
                                NodeKind::Parameter {
                                    name: name.clone(),
                                    default: default.clone(),
                                    annotation: empty(),
                                },
                                param.position,
                            ));
                        }
                    }
                }
            }
            other => {
                return Err(malformed(&format!(
                    "unexpected parameter kind {:?}",
                    other
                )))
            }
        }
        Ok(())
    }

    fn build_variadic(&mut self, raw: &RawNode, field: &str) -> Result<Arc<Node>, ArborError> {
        if let Some(node) = raw.opt_child(field) {
            let (name, annotation) = match node.kind.as_str() {
                "arg" => (node.text("arg")?.to_string(), self.opt(node, "annotation")?),
                "Name" => (node.text("id")?.to_string(), empty()),
                other => {
                    return Err(malformed(&format!(
                        "unexpected variadic parameter kind {:?}",
                        other
                    )))
                }
            };
            return Ok(Node::new(
                NodeKind::Parameter {
                    name,
                    default: empty(),
                    annotation,
                },
                node.position,
            ));
        }
        // The historical shape stores a bare name.
        if let Some(name) = raw.opt_text(field) {
            return Ok(Node::new(
                NodeKind::Parameter {
                    name: name.to_string(),
                    default: empty(),
                    annotation: empty(),
                },
                None,
            ));
        }
        Ok(empty())
    }
}

fn context_of(raw: &RawNode) -> Context {
    match raw.opt_text("ctx") {
        Some("Store") | Some("Param") => Context::Store,
        Some("Del") => Context::Del,
        _ => Context::Load,
    }
}

fn import_names(raw: &RawNode) -> Result<Vec<(String, Option<String>)>, ArborError> {
    raw.seq("names")?
        .iter()
        .map(|alias| {
            Ok((
                alias.text("name")?.to_string(),
                alias.opt_text("asname").map(str::to_string),
            ))
        })
        .collect()
}

/// A bare string literal leading a body is the docstring; it moves to the
/// `doc` field and out of the body sequence.
fn split_docstring(body: &[RawNode]) -> (Option<String>, &[RawNode]) {
    if let Some(first) = body.first() {
        if first.kind == "Expr" {
            if let Ok(value) = first.child("value") {
                if value.kind == "Str" {
                    if let Ok(text) = value.text("s") {
                        return (Some(text.to_string()), &body[1..]);
                    }
                }
            }
        }
    }
    (None, body)
}

fn bin_symbol(name: &str) -> Result<&'static str, ArborError> {
    table_symbol(&BIN_OP_SYMBOLS, name)
}

fn table_symbol(
    table: &'static Lazy<HashMap<&'static str, &'static str>>,
    name: &str,
) -> Result<&'static str, ArborError> {
    table
        .get(name)
        .copied()
        .ok_or_else(|| no_conversion(name))
}

fn no_conversion(kind: &str) -> ArborError {
    ArborError::bare(ErrorKind::NoConversion {
        kind: kind.to_string(),
    })
}

fn malformed(detail: &str) -> ArborError {
    ArborError::bare(ErrorKind::MalformedTree {
        detail: detail.to_string(),
    })
}
