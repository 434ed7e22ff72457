//! The upstream parser.
//!
//! A recursive-descent pass over the logical token stream that produces
//! the generic raw tree consumed by the rebuilder. The grammar covered is
//! the Python-3.5-era statement and expression set of the canonical node
//! model; everything here is purely syntactic.

use thiserror::Error;

use crate::nodes::Position;
use crate::raw::{RawField, RawNode};

pub mod tokens;

use tokens::{tokenize, LexError, Tok, Token};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{message} at line {line}, column {column}")]
    Unexpected {
        message: String,
        line: u32,
        column: u32,
    },
}

impl ParseError {
    /// Line/column the failure points at.
    pub fn position(&self) -> (u32, u32) {
        match self {
            ParseError::Lex(LexError::Unexpected { line, column }) => (*line, *column),
            ParseError::Lex(LexError::InconsistentDedent { line }) => (*line, 0),
            ParseError::Unexpected { line, column, .. } => (*line, *column),
        }
    }
}

/// Parses a complete module, producing a raw `Module` node.
pub fn parse_module(source: &str) -> Result<RawNode, ParseError> {
    let toks = tokenize(source)?;
    let mut parser = Parser {
        tokens: &toks,
        pos: 0,
    };
    let mut body = Vec::new();
    while !parser.check(Tok::EndMarker) {
        if parser.eat(Tok::Newline) {
            continue;
        }
        parser.parse_statement_into(&mut body)?;
    }
    Ok(RawNode::new("Module", Some(Position::new(0, 0)))
        .with_field("body", RawField::Nodes(body)))
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

fn describe(tok: &Token) -> String {
    if tok.text.is_empty() {
        format!("{:?}", tok.tok)
    } else {
        format!("{:?}", tok.text)
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_tok(&self) -> Tok {
        self.peek().tok
    }

    fn here(&self) -> Option<Position> {
        let tok = self.peek();
        Some(Position::new(tok.line, tok.column))
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tok: Tok) -> bool {
        self.peek_tok() == tok
    }

    fn eat(&mut self, tok: Tok) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<Token, ParseError> {
        if self.check(tok) {
            Ok(self.advance())
        } else {
            self.unexpected(&format!("expected {}", what))
        }
    }

    fn unexpected<T>(&self, message: &str) -> Result<T, ParseError> {
        let tok = self.peek();
        Err(ParseError::Unexpected {
            message: format!("{}, found {}", message, describe(tok)),
            line: tok.line,
            column: tok.column,
        })
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek_tok(), Tok::Newline | Tok::Semi | Tok::EndMarker)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement_into(&mut self, out: &mut Vec<RawNode>) -> Result<(), ParseError> {
        match self.peek_tok() {
            Tok::KwIf => out.push(self.parse_if()?),
            Tok::KwWhile => out.push(self.parse_while()?),
            Tok::KwFor => out.push(self.parse_for(false, None)?),
            Tok::KwTry => out.push(self.parse_try()?),
            Tok::KwWith => out.push(self.parse_with(false, None)?),
            Tok::KwDef => out.push(self.parse_funcdef(Vec::new(), false, None)?),
            Tok::KwClass => out.push(self.parse_classdef(Vec::new(), None)?),
            Tok::At => out.push(self.parse_decorated()?),
            Tok::KwAsync => out.push(self.parse_async(Vec::new(), None)?),
            _ => self.parse_simple_line(out)?,
        }
        Ok(())
    }

    fn parse_async(
        &mut self,
        decorators: Vec<RawNode>,
        start: Option<Position>,
    ) -> Result<RawNode, ParseError> {
        let pos = start.or_else(|| self.here());
        self.expect(Tok::KwAsync, "`async`")?;
        match self.peek_tok() {
            Tok::KwDef => self.parse_funcdef(decorators, true, pos),
            Tok::KwFor => self.parse_for(true, pos),
            Tok::KwWith => self.parse_with(true, pos),
            _ => self.unexpected("expected `def`, `for` or `with` after `async`"),
        }
    }

    fn parse_decorated(&mut self) -> Result<RawNode, ParseError> {
        let start = self.here();
        let mut decorators = Vec::new();
        while self.check(Tok::At) {
            self.advance();
            decorators.push(self.parse_test()?);
            self.expect(Tok::Newline, "end of line after decorator")?;
        }
        match self.peek_tok() {
            Tok::KwDef => self.parse_funcdef(decorators, false, start),
            Tok::KwClass => self.parse_classdef(decorators, start),
            Tok::KwAsync => self.parse_async(decorators, start),
            _ => self.unexpected("expected `def` or `class` after decorators"),
        }
    }

    fn parse_funcdef(
        &mut self,
        decorators: Vec<RawNode>,
        is_async: bool,
        start: Option<Position>,
    ) -> Result<RawNode, ParseError> {
        let pos = start.or_else(|| self.here());
        self.expect(Tok::KwDef, "`def`")?;
        let name = self.expect(Tok::Name, "a function name")?;
        let args = self.parse_parameters()?;
        let returns = if self.eat(Tok::Arrow) {
            RawField::Node(Box::new(self.parse_test()?))
        } else {
            RawField::Absent
        };
        self.expect(Tok::Colon, "`:`")?;
        let body = self.parse_suite()?;
        let kind = if is_async {
            "AsyncFunctionDef"
        } else {
            "FunctionDef"
        };
        Ok(RawNode::new(kind, pos)
            .with_field("name", RawField::Text(name.text))
            .with_field("args", RawField::Node(Box::new(args)))
            .with_field("body", RawField::Nodes(body))
            .with_field("decorator_list", RawField::Nodes(decorators))
            .with_field("returns", returns))
    }

    fn parse_classdef(
        &mut self,
        decorators: Vec<RawNode>,
        start: Option<Position>,
    ) -> Result<RawNode, ParseError> {
        let pos = start.or_else(|| self.here());
        self.expect(Tok::KwClass, "`class`")?;
        let name = self.expect(Tok::Name, "a class name")?;
        let (bases, keywords) = if self.eat(Tok::LParen) {
            let result = self.parse_call_arguments()?;
            self.expect(Tok::RParen, "`)`")?;
            result
        } else {
            (Vec::new(), Vec::new())
        };
        self.expect(Tok::Colon, "`:`")?;
        let body = self.parse_suite()?;
        Ok(RawNode::new("ClassDef", pos)
            .with_field("name", RawField::Text(name.text))
            .with_field("bases", RawField::Nodes(bases))
            .with_field("keywords", RawField::Nodes(keywords))
            .with_field("body", RawField::Nodes(body))
            .with_field("decorator_list", RawField::Nodes(decorators)))
    }

    fn parse_parameters(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        self.expect(Tok::LParen, "`(`")?;
        let args = self.parse_parameter_list(true, Tok::RParen)?;
        self.expect(Tok::RParen, "`)`")?;
        Ok(args_node(args, pos))
    }

    fn parse_lambda_parameters(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let args = self.parse_parameter_list(false, Tok::Colon)?;
        Ok(args_node(args, pos))
    }

    fn parse_parameter_list(
        &mut self,
        annotations: bool,
        terminator: Tok,
    ) -> Result<ParamAccum, ParseError> {
        let mut accum = ParamAccum::default();
        let mut seen_star = false;
        while !self.check(terminator) {
            if self.eat(Tok::Star) {
                if seen_star {
                    return self.unexpected("expected at most one `*` in a parameter list");
                }
                seen_star = true;
                if !self.check(Tok::Comma) && !self.check(terminator) {
                    accum.vararg = Some(self.parse_parameter(annotations)?);
                }
            } else if self.eat(Tok::StarStar) {
                accum.kwarg = Some(self.parse_parameter(annotations)?);
            } else {
                let param = self.parse_parameter(annotations)?;
                let default = if self.eat(Tok::Eq) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                if seen_star {
                    accum.kw_defaults.push(match default {
                        Some(node) => node,
                        None => RawNode::new("Empty", None),
                    });
                    accum.kwonlyargs.push(param);
                } else {
                    match default {
                        Some(node) => accum.defaults.push(node),
                        None if !accum.defaults.is_empty() => {
                            return self
                                .unexpected("expected a default value after defaulted parameters");
                        }
                        None => {}
                    }
                    accum.args.push(param);
                }
            }
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        Ok(accum)
    }

    fn parse_parameter(&mut self, annotations: bool) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let name = self.expect(Tok::Name, "a parameter name")?;
        let annotation = if annotations && self.eat(Tok::Colon) {
            RawField::Node(Box::new(self.parse_test()?))
        } else {
            RawField::Absent
        };
        Ok(RawNode::new("arg", pos)
            .with_field("arg", RawField::Text(name.text))
            .with_field("annotation", annotation))
    }

    fn parse_if(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        self.advance(); // `if` or `elif`
        let test = self.parse_test()?;
        self.expect(Tok::Colon, "`:`")?;
        let body = self.parse_suite()?;
        let orelse = if self.check(Tok::KwElif) {
            vec![self.parse_if()?]
        } else if self.eat(Tok::KwElse) {
            self.expect(Tok::Colon, "`:`")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(RawNode::new("If", pos)
            .with_field("test", RawField::Node(Box::new(test)))
            .with_field("body", RawField::Nodes(body))
            .with_field("orelse", RawField::Nodes(orelse)))
    }

    fn parse_while(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        self.expect(Tok::KwWhile, "`while`")?;
        let test = self.parse_test()?;
        self.expect(Tok::Colon, "`:`")?;
        let body = self.parse_suite()?;
        let orelse = if self.eat(Tok::KwElse) {
            self.expect(Tok::Colon, "`:`")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(RawNode::new("While", pos)
            .with_field("test", RawField::Node(Box::new(test)))
            .with_field("body", RawField::Nodes(body))
            .with_field("orelse", RawField::Nodes(orelse)))
    }

    fn parse_for(
        &mut self,
        is_async: bool,
        start: Option<Position>,
    ) -> Result<RawNode, ParseError> {
        let pos = start.or_else(|| self.here());
        self.expect(Tok::KwFor, "`for`")?;
        let mut target = self.parse_exprlist()?;
        set_context(&mut target, "Store");
        self.expect(Tok::KwIn, "`in`")?;
        let iter = self.parse_testlist()?;
        self.expect(Tok::Colon, "`:`")?;
        let body = self.parse_suite()?;
        let orelse = if self.eat(Tok::KwElse) {
            self.expect(Tok::Colon, "`:`")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        let kind = if is_async { "AsyncFor" } else { "For" };
        Ok(RawNode::new(kind, pos)
            .with_field("target", RawField::Node(Box::new(target)))
            .with_field("iter", RawField::Node(Box::new(iter)))
            .with_field("body", RawField::Nodes(body))
            .with_field("orelse", RawField::Nodes(orelse)))
    }

    fn parse_try(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        self.expect(Tok::KwTry, "`try`")?;
        self.expect(Tok::Colon, "`:`")?;
        let body = self.parse_suite()?;
        let mut handlers = Vec::new();
        while self.check(Tok::KwExcept) {
            let hpos = self.here();
            self.advance();
            let (etype, name) = if self.check(Tok::Colon) {
                (RawField::Absent, RawField::Absent)
            } else {
                let etype = self.parse_test()?;
                let name = if self.eat(Tok::KwAs) {
                    let bound = self.expect(Tok::Name, "a name after `as`")?;
                    RawField::Text(bound.text)
                } else {
                    RawField::Absent
                };
                (RawField::Node(Box::new(etype)), name)
            };
            self.expect(Tok::Colon, "`:`")?;
            let hbody = self.parse_suite()?;
            handlers.push(
                RawNode::new("excepthandler", hpos)
                    .with_field("type", etype)
                    .with_field("name", name)
                    .with_field("body", RawField::Nodes(hbody)),
            );
        }
        let orelse = if self.eat(Tok::KwElse) {
            self.expect(Tok::Colon, "`:`")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        let finalbody = if self.eat(Tok::KwFinally) {
            self.expect(Tok::Colon, "`:`")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return self.unexpected("expected `except` or `finally` after a try block");
        }
        if handlers.is_empty() && !orelse.is_empty() {
            return self.unexpected("expected `except` before `else` in a try block");
        }
        Ok(RawNode::new("Try", pos)
            .with_field("body", RawField::Nodes(body))
            .with_field("handlers", RawField::Nodes(handlers))
            .with_field("orelse", RawField::Nodes(orelse))
            .with_field("finalbody", RawField::Nodes(finalbody)))
    }

    fn parse_with(
        &mut self,
        is_async: bool,
        start: Option<Position>,
    ) -> Result<RawNode, ParseError> {
        let pos = start.or_else(|| self.here());
        self.expect(Tok::KwWith, "`with`")?;
        let mut items = Vec::new();
        loop {
            let ipos = self.here();
            let context_expr = self.parse_test()?;
            let optional_vars = if self.eat(Tok::KwAs) {
                let mut target = self.parse_expr()?;
                set_context(&mut target, "Store");
                RawField::Node(Box::new(target))
            } else {
                RawField::Absent
            };
            items.push(
                RawNode::new("withitem", ipos)
                    .with_field("context_expr", RawField::Node(Box::new(context_expr)))
                    .with_field("optional_vars", optional_vars),
            );
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::Colon, "`:`")?;
        let body = self.parse_suite()?;
        let kind = if is_async { "AsyncWith" } else { "With" };
        Ok(RawNode::new(kind, pos)
            .with_field("items", RawField::Nodes(items))
            .with_field("body", RawField::Nodes(body)))
    }

    fn parse_suite(&mut self) -> Result<Vec<RawNode>, ParseError> {
        if self.eat(Tok::Newline) {
            self.expect(Tok::Indent, "an indented block")?;
            let mut body = Vec::new();
            while !self.check(Tok::Dedent) && !self.check(Tok::EndMarker) {
                if self.eat(Tok::Newline) {
                    continue;
                }
                self.parse_statement_into(&mut body)?;
            }
            self.expect(Tok::Dedent, "the end of an indented block")?;
            Ok(body)
        } else {
            let mut body = Vec::new();
            self.parse_simple_line(&mut body)?;
            Ok(body)
        }
    }

    fn parse_simple_line(&mut self, out: &mut Vec<RawNode>) -> Result<(), ParseError> {
        loop {
            out.push(self.parse_small_statement()?);
            if self.eat(Tok::Semi) {
                if self.check(Tok::Newline) || self.check(Tok::EndMarker) {
                    break;
                }
                continue;
            }
            break;
        }
        if !self.eat(Tok::Newline) && !self.check(Tok::EndMarker) {
            return self.unexpected("expected the end of the statement");
        }
        Ok(())
    }

    fn parse_small_statement(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        match self.peek_tok() {
            Tok::KwPass => {
                self.advance();
                Ok(RawNode::new("Pass", pos))
            }
            Tok::KwBreak => {
                self.advance();
                Ok(RawNode::new("Break", pos))
            }
            Tok::KwContinue => {
                self.advance();
                Ok(RawNode::new("Continue", pos))
            }
            Tok::KwDel => {
                self.advance();
                let mut targets = vec![self.parse_expr()?];
                while self.eat(Tok::Comma) {
                    if self.at_statement_end() {
                        break;
                    }
                    targets.push(self.parse_expr()?);
                }
                for target in &mut targets {
                    set_context(target, "Del");
                }
                Ok(RawNode::new("Delete", pos).with_field("targets", RawField::Nodes(targets)))
            }
            Tok::KwReturn => {
                self.advance();
                let value = if self.at_statement_end() {
                    RawField::Absent
                } else {
                    RawField::Node(Box::new(self.parse_testlist()?))
                };
                Ok(RawNode::new("Return", pos).with_field("value", value))
            }
            Tok::KwRaise => {
                self.advance();
                let (exc, cause) = if self.at_statement_end() {
                    (RawField::Absent, RawField::Absent)
                } else {
                    let exc = self.parse_test()?;
                    let cause = if self.eat(Tok::KwFrom) {
                        RawField::Node(Box::new(self.parse_test()?))
                    } else {
                        RawField::Absent
                    };
                    (RawField::Node(Box::new(exc)), cause)
                };
                Ok(RawNode::new("Raise", pos)
                    .with_field("exc", exc)
                    .with_field("cause", cause))
            }
            Tok::KwImport => self.parse_import(pos),
            Tok::KwFrom => self.parse_import_from(pos),
            Tok::KwGlobal | Tok::KwNonlocal => {
                let kind = if self.check(Tok::KwGlobal) {
                    "Global"
                } else {
                    "Nonlocal"
                };
                self.advance();
                let mut names = vec![self.expect(Tok::Name, "a name")?.text];
                while self.eat(Tok::Comma) {
                    names.push(self.expect(Tok::Name, "a name")?.text);
                }
                Ok(RawNode::new(kind, pos).with_field("names", RawField::Texts(names)))
            }
            Tok::KwAssert => {
                self.advance();
                let test = self.parse_test()?;
                let msg = if self.eat(Tok::Comma) {
                    RawField::Node(Box::new(self.parse_test()?))
                } else {
                    RawField::Absent
                };
                Ok(RawNode::new("Assert", pos)
                    .with_field("test", RawField::Node(Box::new(test)))
                    .with_field("msg", msg))
            }
            Tok::KwYield => {
                let value = self.parse_yield_expr()?;
                Ok(RawNode::new("Expr", pos).with_field("value", RawField::Node(Box::new(value))))
            }
            _ => self.parse_expr_statement(pos),
        }
    }

    fn parse_import(&mut self, pos: Option<Position>) -> Result<RawNode, ParseError> {
        self.expect(Tok::KwImport, "`import`")?;
        let mut names = Vec::new();
        loop {
            let apos = self.here();
            let name = self.parse_dotted_name()?;
            let asname = if self.eat(Tok::KwAs) {
                RawField::OptText(Some(self.expect(Tok::Name, "a name after `as`")?.text))
            } else {
                RawField::OptText(None)
            };
            names.push(
                RawNode::new("alias", apos)
                    .with_field("name", RawField::Text(name))
                    .with_field("asname", asname),
            );
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        Ok(RawNode::new("Import", pos).with_field("names", RawField::Nodes(names)))
    }

    fn parse_import_from(&mut self, pos: Option<Position>) -> Result<RawNode, ParseError> {
        self.expect(Tok::KwFrom, "`from`")?;
        let mut level: i64 = 0;
        loop {
            if self.eat(Tok::Dot) {
                level += 1;
            } else if self.eat(Tok::EllipsisLit) {
                level += 3;
            } else {
                break;
            }
        }
        let module = if self.check(Tok::KwImport) {
            if level == 0 {
                return self.unexpected("expected a module name after `from`");
            }
            RawField::OptText(None)
        } else {
            RawField::OptText(Some(self.parse_dotted_name()?))
        };
        self.expect(Tok::KwImport, "`import`")?;
        let mut names = Vec::new();
        if self.eat(Tok::Star) {
            names.push(
                RawNode::new("alias", pos)
                    .with_field("name", RawField::Text("*".to_string()))
                    .with_field("asname", RawField::OptText(None)),
            );
        } else {
            let parenthesized = self.eat(Tok::LParen);
            loop {
                let apos = self.here();
                let name = self.expect(Tok::Name, "an imported name")?.text;
                let asname = if self.eat(Tok::KwAs) {
                    RawField::OptText(Some(self.expect(Tok::Name, "a name after `as`")?.text))
                } else {
                    RawField::OptText(None)
                };
                names.push(
                    RawNode::new("alias", apos)
                        .with_field("name", RawField::Text(name))
                        .with_field("asname", asname),
                );
                if !self.eat(Tok::Comma) {
                    break;
                }
                if parenthesized && self.check(Tok::RParen) {
                    break;
                }
            }
            if parenthesized {
                self.expect(Tok::RParen, "`)`")?;
            }
        }
        Ok(RawNode::new("ImportFrom", pos)
            .with_field("module", module)
            .with_field("names", RawField::Nodes(names))
            .with_field("level", RawField::Int(level)))
    }

    fn parse_dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect(Tok::Name, "a module name")?.text;
        while self.eat(Tok::Dot) {
            name.push('.');
            name.push_str(&self.expect(Tok::Name, "a name after `.`")?.text);
        }
        Ok(name)
    }

    fn parse_expr_statement(&mut self, pos: Option<Position>) -> Result<RawNode, ParseError> {
        let first = self.parse_testlist_star_expr()?;
        if let Some(op) = aug_op(self.peek_tok()) {
            self.advance();
            let value = if self.check(Tok::KwYield) {
                self.parse_yield_expr()?
            } else {
                self.parse_testlist()?
            };
            let mut target = first;
            set_context(&mut target, "Store");
            return Ok(RawNode::new("AugAssign", pos)
                .with_field("target", RawField::Node(Box::new(target)))
                .with_field("op", RawField::Text(op.to_string()))
                .with_field("value", RawField::Node(Box::new(value))));
        }
        if self.check(Tok::Eq) {
            let mut chain = vec![first];
            while self.eat(Tok::Eq) {
                let value = if self.check(Tok::KwYield) {
                    self.parse_yield_expr()?
                } else {
                    self.parse_testlist_star_expr()?
                };
                chain.push(value);
            }
            let value = chain.pop().expect("assignment chain has a value");
            for target in &mut chain {
                set_context(target, "Store");
            }
            return Ok(RawNode::new("Assign", pos)
                .with_field("targets", RawField::Nodes(chain))
                .with_field("value", RawField::Node(Box::new(value))));
        }
        Ok(RawNode::new("Expr", pos).with_field("value", RawField::Node(Box::new(first))))
    }

    fn parse_yield_expr(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        self.expect(Tok::KwYield, "`yield`")?;
        if self.eat(Tok::KwFrom) {
            let value = self.parse_test()?;
            return Ok(RawNode::new("YieldFrom", pos)
                .with_field("value", RawField::Node(Box::new(value))));
        }
        if self.at_statement_end() || !starts_expression(self.peek_tok()) {
            return Ok(RawNode::new("Yield", pos).with_field("value", RawField::Absent));
        }
        let value = self.parse_testlist()?;
        Ok(RawNode::new("Yield", pos).with_field("value", RawField::Node(Box::new(value))))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_testlist_star_expr(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let first = self.parse_star_or_test()?;
        if !self.check(Tok::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(Tok::Comma) {
            if !starts_expression(self.peek_tok()) {
                break;
            }
            elts.push(self.parse_star_or_test()?);
        }
        Ok(tuple_node(elts, pos))
    }

    fn parse_testlist(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let first = self.parse_test()?;
        if !self.check(Tok::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(Tok::Comma) {
            if !starts_expression(self.peek_tok()) {
                break;
            }
            elts.push(self.parse_test()?);
        }
        Ok(tuple_node(elts, pos))
    }

    fn parse_exprlist(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let first = self.parse_star_or_expr()?;
        if !self.check(Tok::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(Tok::Comma) {
            if !starts_expression(self.peek_tok()) {
                break;
            }
            elts.push(self.parse_star_or_expr()?);
        }
        Ok(tuple_node(elts, pos))
    }

    fn parse_star_or_test(&mut self) -> Result<RawNode, ParseError> {
        if self.check(Tok::Star) {
            self.parse_star_expr()
        } else {
            self.parse_test()
        }
    }

    fn parse_star_or_expr(&mut self) -> Result<RawNode, ParseError> {
        if self.check(Tok::Star) {
            self.parse_star_expr()
        } else {
            self.parse_expr()
        }
    }

    fn parse_star_expr(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        self.expect(Tok::Star, "`*`")?;
        let value = self.parse_expr()?;
        Ok(RawNode::new("Starred", pos)
            .with_field("value", RawField::Node(Box::new(value)))
            .with_field("ctx", RawField::Text("Load".to_string())))
    }

    fn parse_test(&mut self) -> Result<RawNode, ParseError> {
        if self.check(Tok::KwLambda) {
            return self.parse_lambda();
        }
        let pos = self.here();
        let body = self.parse_or_test()?;
        if self.eat(Tok::KwIf) {
            let test = self.parse_or_test()?;
            self.expect(Tok::KwElse, "`else` in a conditional expression")?;
            let orelse = self.parse_test()?;
            return Ok(RawNode::new("IfExp", pos)
                .with_field("test", RawField::Node(Box::new(test)))
                .with_field("body", RawField::Node(Box::new(body)))
                .with_field("orelse", RawField::Node(Box::new(orelse))));
        }
        Ok(body)
    }

    fn parse_lambda(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        self.expect(Tok::KwLambda, "`lambda`")?;
        let args = self.parse_lambda_parameters()?;
        self.expect(Tok::Colon, "`:`")?;
        let body = self.parse_test()?;
        Ok(RawNode::new("Lambda", pos)
            .with_field("args", RawField::Node(Box::new(args)))
            .with_field("body", RawField::Node(Box::new(body))))
    }

    fn parse_or_test(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let first = self.parse_and_test()?;
        if !self.check(Tok::KwOr) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(Tok::KwOr) {
            values.push(self.parse_and_test()?);
        }
        Ok(RawNode::new("BoolOp", pos)
            .with_field("op", RawField::Text("Or".to_string()))
            .with_field("values", RawField::Nodes(values)))
    }

    fn parse_and_test(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let first = self.parse_not_test()?;
        if !self.check(Tok::KwAnd) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(Tok::KwAnd) {
            values.push(self.parse_not_test()?);
        }
        Ok(RawNode::new("BoolOp", pos)
            .with_field("op", RawField::Text("And".to_string()))
            .with_field("values", RawField::Nodes(values)))
    }

    fn parse_not_test(&mut self) -> Result<RawNode, ParseError> {
        if self.check(Tok::KwNot) {
            let pos = self.here();
            self.advance();
            let operand = self.parse_not_test()?;
            return Ok(RawNode::new("UnaryOp", pos)
                .with_field("op", RawField::Text("Not".to_string()))
                .with_field("operand", RawField::Node(Box::new(operand))));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let left = self.parse_expr()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match self.peek_tok() {
                Tok::EqEq => "Eq",
                Tok::Ne => "NotEq",
                Tok::Lt => "Lt",
                Tok::Le => "LtE",
                Tok::Gt => "Gt",
                Tok::Ge => "GtE",
                Tok::KwIn => "In",
                Tok::KwIs => {
                    self.advance();
                    let op = if self.eat(Tok::KwNot) { "IsNot" } else { "Is" };
                    ops.push(RawNode::new(op, None));
                    comparators.push(self.parse_expr()?);
                    continue;
                }
                Tok::KwNot => {
                    self.advance();
                    self.expect(Tok::KwIn, "`in` after `not`")?;
                    ops.push(RawNode::new("NotIn", None));
                    comparators.push(self.parse_expr()?);
                    continue;
                }
                _ => break,
            };
            self.advance();
            ops.push(RawNode::new(op, None));
            comparators.push(self.parse_expr()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(RawNode::new("Compare", pos)
            .with_field("left", RawField::Node(Box::new(left)))
            .with_field("ops", RawField::Nodes(ops))
            .with_field("comparators", RawField::Nodes(comparators)))
    }

    fn parse_expr(&mut self) -> Result<RawNode, ParseError> {
        self.parse_binop_level(0)
    }

    fn parse_binop_level(&mut self, level: usize) -> Result<RawNode, ParseError> {
        const LEVELS: &[&[(Tok, &str)]] = &[
            &[(Tok::Pipe, "BitOr")],
            &[(Tok::Caret, "BitXor")],
            &[(Tok::Amp, "BitAnd")],
            &[(Tok::Shl, "LShift"), (Tok::Shr, "RShift")],
            &[(Tok::Plus, "Add"), (Tok::Minus, "Sub")],
            &[
                (Tok::Star, "Mult"),
                (Tok::At, "MatMult"),
                (Tok::Slash, "Div"),
                (Tok::Percent, "Mod"),
                (Tok::SlashSlash, "FloorDiv"),
            ],
        ];
        if level == LEVELS.len() {
            return self.parse_factor();
        }
        let pos = self.here();
        let mut left = self.parse_binop_level(level + 1)?;
        loop {
            let mut matched = None;
            for (tok, name) in LEVELS[level] {
                if self.check(*tok) {
                    matched = Some(*name);
                    break;
                }
            }
            let Some(op) = matched else { break };
            self.advance();
            let right = self.parse_binop_level(level + 1)?;
            left = RawNode::new("BinOp", pos)
                .with_field("op", RawField::Text(op.to_string()))
                .with_field("left", RawField::Node(Box::new(left)))
                .with_field("right", RawField::Node(Box::new(right)));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<RawNode, ParseError> {
        let op = match self.peek_tok() {
            Tok::Plus => Some("UAdd"),
            Tok::Minus => Some("USub"),
            Tok::Tilde => Some("Invert"),
            _ => None,
        };
        if let Some(op) = op {
            let pos = self.here();
            self.advance();
            let operand = self.parse_factor()?;
            return Ok(RawNode::new("UnaryOp", pos)
                .with_field("op", RawField::Text(op.to_string()))
                .with_field("operand", RawField::Node(Box::new(operand))));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let base = self.parse_atom_expr()?;
        if self.eat(Tok::StarStar) {
            let right = self.parse_factor()?;
            return Ok(RawNode::new("BinOp", pos)
                .with_field("op", RawField::Text("Pow".to_string()))
                .with_field("left", RawField::Node(Box::new(base)))
                .with_field("right", RawField::Node(Box::new(right))));
        }
        Ok(base)
    }

    fn parse_atom_expr(&mut self) -> Result<RawNode, ParseError> {
        if self.check(Tok::KwAwait) {
            let pos = self.here();
            self.advance();
            let value = self.parse_atom_expr()?;
            return Ok(
                RawNode::new("Await", pos).with_field("value", RawField::Node(Box::new(value)))
            );
        }
        let pos = self.here();
        let mut node = self.parse_atom()?;
        loop {
            if self.eat(Tok::Dot) {
                let attr = self.expect(Tok::Name, "an attribute name")?;
                node = RawNode::new("Attribute", pos)
                    .with_field("value", RawField::Node(Box::new(node)))
                    .with_field("attr", RawField::Text(attr.text))
                    .with_field("ctx", RawField::Text("Load".to_string()));
            } else if self.check(Tok::LParen) {
                self.advance();
                let (args, keywords) = self.parse_call_arguments()?;
                self.expect(Tok::RParen, "`)`")?;
                node = RawNode::new("Call", pos)
                    .with_field("func", RawField::Node(Box::new(node)))
                    .with_field("args", RawField::Nodes(args))
                    .with_field("keywords", RawField::Nodes(keywords));
            } else if self.eat(Tok::LBracket) {
                let slice = self.parse_subscript_list()?;
                self.expect(Tok::RBracket, "`]`")?;
                node = RawNode::new("Subscript", pos)
                    .with_field("value", RawField::Node(Box::new(node)))
                    .with_field("slice", RawField::Node(Box::new(slice)))
                    .with_field("ctx", RawField::Text("Load".to_string()));
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_call_arguments(&mut self) -> Result<(Vec<RawNode>, Vec<RawNode>), ParseError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.check(Tok::RParen) {
            if self.check(Tok::StarStar) {
                let pos = self.here();
                self.advance();
                let value = self.parse_test()?;
                keywords.push(
                    RawNode::new("keyword", pos)
                        .with_field("arg", RawField::OptText(None))
                        .with_field("value", RawField::Node(Box::new(value))),
                );
            } else if self.check(Tok::Star) {
                args.push(self.parse_star_expr()?);
            } else {
                let pos = self.here();
                let value = self.parse_test()?;
                if self.eat(Tok::Eq) {
                    let name = match value.opt_text("id") {
                        Some(name) if value.kind == "Name" => name.to_string(),
                        _ => return self.unexpected("expected a name before `=`"),
                    };
                    let kw_value = self.parse_test()?;
                    keywords.push(
                        RawNode::new("keyword", pos)
                            .with_field("arg", RawField::OptText(Some(name)))
                            .with_field("value", RawField::Node(Box::new(kw_value))),
                    );
                } else if self.check(Tok::KwFor) {
                    let generators = self.parse_comp_clauses()?;
                    args.push(
                        RawNode::new("GeneratorExp", pos)
                            .with_field("elt", RawField::Node(Box::new(value)))
                            .with_field("generators", RawField::Nodes(generators)),
                    );
                } else {
                    args.push(value);
                }
            }
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn parse_subscript_list(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let mut items = vec![self.parse_subscript_item()?];
        let mut saw_comma = false;
        while self.eat(Tok::Comma) {
            saw_comma = true;
            if self.check(Tok::RBracket) {
                break;
            }
            items.push(self.parse_subscript_item()?);
        }
        let any_slice = items.iter().any(|item| item.kind == "Slice");
        if items.len() == 1 && !saw_comma {
            let item = items.pop().expect("one subscript item");
            if item.kind == "Slice" {
                return Ok(item);
            }
            return Ok(
                RawNode::new("Index", pos).with_field("value", RawField::Node(Box::new(item)))
            );
        }
        if any_slice {
            let dims = items
                .into_iter()
                .map(|item| {
                    if item.kind == "Slice" {
                        item
                    } else {
                        let item_pos = item.position;
                        RawNode::new("Index", item_pos)
                            .with_field("value", RawField::Node(Box::new(item)))
                    }
                })
                .collect();
            return Ok(RawNode::new("ExtSlice", pos).with_field("dims", RawField::Nodes(dims)));
        }
        let tuple = tuple_node(items, pos);
        Ok(RawNode::new("Index", pos).with_field("value", RawField::Node(Box::new(tuple))))
    }

    fn parse_subscript_item(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        let lower = if self.check(Tok::Colon) {
            None
        } else {
            Some(self.parse_test()?)
        };
        if !self.eat(Tok::Colon) {
            return Ok(lower.expect("subscript item has an expression"));
        }
        let upper = if matches!(self.peek_tok(), Tok::Colon | Tok::Comma | Tok::RBracket) {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.eat(Tok::Colon) {
            if matches!(self.peek_tok(), Tok::Comma | Tok::RBracket) {
                None
            } else {
                Some(self.parse_test()?)
            }
        } else {
            None
        };
        let as_field = |value: Option<RawNode>| match value {
            Some(node) => RawField::Node(Box::new(node)),
            None => RawField::Absent,
        };
        Ok(RawNode::new("Slice", pos)
            .with_field("lower", as_field(lower))
            .with_field("upper", as_field(upper))
            .with_field("step", as_field(step)))
    }

    fn parse_comp_clauses(&mut self) -> Result<Vec<RawNode>, ParseError> {
        let mut generators = Vec::new();
        while self.check(Tok::KwFor) {
            let pos = self.here();
            self.advance();
            let mut target = self.parse_exprlist()?;
            set_context(&mut target, "Store");
            self.expect(Tok::KwIn, "`in`")?;
            let iter = self.parse_or_test()?;
            let mut ifs = Vec::new();
            while self.eat(Tok::KwIf) {
                ifs.push(self.parse_or_test()?);
            }
            generators.push(
                RawNode::new("comprehension", pos)
                    .with_field("target", RawField::Node(Box::new(target)))
                    .with_field("iter", RawField::Node(Box::new(iter)))
                    .with_field("ifs", RawField::Nodes(ifs)),
            );
        }
        Ok(generators)
    }

    fn parse_atom(&mut self) -> Result<RawNode, ParseError> {
        let pos = self.here();
        match self.peek_tok() {
            Tok::LParen => {
                self.advance();
                if self.eat(Tok::RParen) {
                    return Ok(tuple_node(Vec::new(), pos));
                }
                if self.check(Tok::KwYield) {
                    let value = self.parse_yield_expr()?;
                    self.expect(Tok::RParen, "`)`")?;
                    return Ok(value);
                }
                let first = self.parse_star_or_test()?;
                if self.check(Tok::KwFor) {
                    let generators = self.parse_comp_clauses()?;
                    self.expect(Tok::RParen, "`)`")?;
                    return Ok(RawNode::new("GeneratorExp", pos)
                        .with_field("elt", RawField::Node(Box::new(first)))
                        .with_field("generators", RawField::Nodes(generators)));
                }
                if self.check(Tok::Comma) {
                    let mut elts = vec![first];
                    while self.eat(Tok::Comma) {
                        if self.check(Tok::RParen) {
                            break;
                        }
                        elts.push(self.parse_star_or_test()?);
                    }
                    self.expect(Tok::RParen, "`)`")?;
                    return Ok(tuple_node(elts, pos));
                }
                self.expect(Tok::RParen, "`)`")?;
                Ok(first)
            }
            Tok::LBracket => {
                self.advance();
                if self.eat(Tok::RBracket) {
                    return Ok(RawNode::new("List", pos)
                        .with_field("elts", RawField::Nodes(Vec::new()))
                        .with_field("ctx", RawField::Text("Load".to_string())));
                }
                let first = self.parse_star_or_test()?;
                if self.check(Tok::KwFor) {
                    let generators = self.parse_comp_clauses()?;
                    self.expect(Tok::RBracket, "`]`")?;
                    return Ok(RawNode::new("ListComp", pos)
                        .with_field("elt", RawField::Node(Box::new(first)))
                        .with_field("generators", RawField::Nodes(generators)));
                }
                let mut elts = vec![first];
                while self.eat(Tok::Comma) {
                    if self.check(Tok::RBracket) {
                        break;
                    }
                    elts.push(self.parse_star_or_test()?);
                }
                self.expect(Tok::RBracket, "`]`")?;
                Ok(RawNode::new("List", pos)
                    .with_field("elts", RawField::Nodes(elts))
                    .with_field("ctx", RawField::Text("Load".to_string())))
            }
            Tok::LBrace => {
                self.advance();
                self.parse_brace_display(pos)
            }
            Tok::Name => {
                let name = self.advance();
                Ok(RawNode::new("Name", pos)
                    .with_field("id", RawField::Text(name.text))
                    .with_field("ctx", RawField::Text("Load".to_string())))
            }
            Tok::Int => {
                let tok = self.advance();
                Ok(RawNode::new("Num", pos).with_field("i", RawField::Int(parse_int(&tok.text))))
            }
            Tok::Float => {
                let tok = self.advance();
                let value: f64 = tok.text.replace('_', "").parse().unwrap_or(f64::NAN);
                Ok(RawNode::new("Num", pos).with_field("f", RawField::Float(value)))
            }
            Tok::Imaginary => {
                let tok = self.advance();
                let digits = tok.text.trim_end_matches(['j', 'J']).replace('_', "");
                let value: f64 = digits.parse().unwrap_or(f64::NAN);
                Ok(RawNode::new("Num", pos).with_field("j", RawField::Float(value)))
            }
            Tok::Str => self.parse_string_literal(pos),
            Tok::EllipsisLit => {
                self.advance();
                Ok(RawNode::new("Ellipsis", pos))
            }
            Tok::KwTrue | Tok::KwFalse | Tok::KwNone => {
                let value = match self.advance().tok {
                    Tok::KwTrue => "True",
                    Tok::KwFalse => "False",
                    _ => "None",
                };
                Ok(RawNode::new("NameConstant", pos)
                    .with_field("value", RawField::Text(value.to_string())))
            }
            _ => self.unexpected("expected an expression"),
        }
    }

    fn parse_brace_display(&mut self, pos: Option<Position>) -> Result<RawNode, ParseError> {
        if self.eat(Tok::RBrace) {
            return Ok(RawNode::new("Dict", pos)
                .with_field("keys", RawField::Nodes(Vec::new()))
                .with_field("values", RawField::Nodes(Vec::new())));
        }
        let mut keys = Vec::new();
        let mut values = Vec::new();
        if self.check(Tok::StarStar) {
            self.advance();
            keys.push(RawNode::new("Empty", None));
            values.push(self.parse_test()?);
            return self.parse_dict_rest(pos, keys, values);
        }
        let first = self.parse_star_or_test()?;
        if self.eat(Tok::Colon) {
            let value = self.parse_test()?;
            if self.check(Tok::KwFor) {
                let generators = self.parse_comp_clauses()?;
                self.expect(Tok::RBrace, "`}`")?;
                return Ok(RawNode::new("DictComp", pos)
                    .with_field("key", RawField::Node(Box::new(first)))
                    .with_field("value", RawField::Node(Box::new(value)))
                    .with_field("generators", RawField::Nodes(generators)));
            }
            keys.push(first);
            values.push(value);
            return self.parse_dict_rest(pos, keys, values);
        }
        if self.check(Tok::KwFor) {
            let generators = self.parse_comp_clauses()?;
            self.expect(Tok::RBrace, "`}`")?;
            return Ok(RawNode::new("SetComp", pos)
                .with_field("elt", RawField::Node(Box::new(first)))
                .with_field("generators", RawField::Nodes(generators)));
        }
        let mut elts = vec![first];
        while self.eat(Tok::Comma) {
            if self.check(Tok::RBrace) {
                break;
            }
            elts.push(self.parse_star_or_test()?);
        }
        self.expect(Tok::RBrace, "`}`")?;
        Ok(RawNode::new("Set", pos).with_field("elts", RawField::Nodes(elts)))
    }

    fn parse_dict_rest(
        &mut self,
        pos: Option<Position>,
        mut keys: Vec<RawNode>,
        mut values: Vec<RawNode>,
    ) -> Result<RawNode, ParseError> {
        while self.eat(Tok::Comma) {
            if self.check(Tok::RBrace) {
                break;
            }
            if self.eat(Tok::StarStar) {
                keys.push(RawNode::new("Empty", None));
                values.push(self.parse_test()?);
                continue;
            }
            let key = self.parse_test()?;
            self.expect(Tok::Colon, "`:` in a dict entry")?;
            let value = self.parse_test()?;
            keys.push(key);
            values.push(value);
        }
        self.expect(Tok::RBrace, "`}`")?;
        Ok(RawNode::new("Dict", pos)
            .with_field("keys", RawField::Nodes(keys))
            .with_field("values", RawField::Nodes(values)))
    }

    fn parse_string_literal(&mut self, pos: Option<Position>) -> Result<RawNode, ParseError> {
        let mut is_bytes = None;
        let mut content = String::new();
        while self.check(Tok::Str) {
            let tok = self.advance();
            let (bytes, text) = decode_string(&tok)?;
            match is_bytes {
                None => is_bytes = Some(bytes),
                Some(previous) if previous != bytes => {
                    return Err(ParseError::Unexpected {
                        message: "cannot mix bytes and string literals".to_string(),
                        line: tok.line,
                        column: tok.column,
                    });
                }
                _ => {}
            }
            content.push_str(&text);
        }
        let kind = if is_bytes == Some(true) { "Bytes" } else { "Str" };
        Ok(RawNode::new(kind, pos).with_field("s", RawField::Text(content)))
    }
}

#[derive(Default)]
struct ParamAccum {
    args: Vec<RawNode>,
    defaults: Vec<RawNode>,
    vararg: Option<RawNode>,
    kwonlyargs: Vec<RawNode>,
    kw_defaults: Vec<RawNode>,
    kwarg: Option<RawNode>,
}

fn args_node(accum: ParamAccum, pos: Option<Position>) -> RawNode {
    let opt = |value: Option<RawNode>| match value {
        Some(node) => RawField::Node(Box::new(node)),
        None => RawField::Absent,
    };
    RawNode::new("arguments", pos)
        .with_field("args", RawField::Nodes(accum.args))
        .with_field("defaults", RawField::Nodes(accum.defaults))
        .with_field("vararg", opt(accum.vararg))
        .with_field("kwonlyargs", RawField::Nodes(accum.kwonlyargs))
        .with_field("kw_defaults", RawField::Nodes(accum.kw_defaults))
        .with_field("kwarg", opt(accum.kwarg))
}

fn tuple_node(elts: Vec<RawNode>, pos: Option<Position>) -> RawNode {
    RawNode::new("Tuple", pos)
        .with_field("elts", RawField::Nodes(elts))
        .with_field("ctx", RawField::Text("Load".to_string()))
}

fn aug_op(tok: Tok) -> Option<&'static str> {
    Some(match tok {
        Tok::PlusEq => "Add",
        Tok::MinusEq => "Sub",
        Tok::StarEq => "Mult",
        Tok::AtEq => "MatMult",
        Tok::SlashEq => "Div",
        Tok::SlashSlashEq => "FloorDiv",
        Tok::PercentEq => "Mod",
        Tok::AmpEq => "BitAnd",
        Tok::PipeEq => "BitOr",
        Tok::CaretEq => "BitXor",
        Tok::ShrEq => "RShift",
        Tok::ShlEq => "LShift",
        Tok::StarStarEq => "Pow",
        _ => return None,
    })
}

fn starts_expression(tok: Tok) -> bool {
    matches!(
        tok,
        Tok::Name
            | Tok::Int
            | Tok::Float
            | Tok::Imaginary
            | Tok::Str
            | Tok::LParen
            | Tok::LBracket
            | Tok::LBrace
            | Tok::Plus
            | Tok::Minus
            | Tok::Tilde
            | Tok::Star
            | Tok::KwNot
            | Tok::KwLambda
            | Tok::KwNone
            | Tok::KwTrue
            | Tok::KwFalse
            | Tok::KwAwait
            | Tok::EllipsisLit
    )
}

/// Switches the syntactic context of a target expression, recursing into
/// the positions the grammar allows targets to nest in.
fn set_context(node: &mut RawNode, ctx: &str) {
    match node.kind.as_str() {
        "Name" | "Attribute" | "Subscript" => {
            replace_ctx(node, ctx);
        }
        "Starred" => {
            replace_ctx(node, ctx);
            for (name, field) in &mut node.fields {
                if name == "value" {
                    if let RawField::Node(value) = field {
                        set_context(value, ctx);
                    }
                }
            }
        }
        "Tuple" | "List" => {
            replace_ctx(node, ctx);
            for (name, field) in &mut node.fields {
                if name == "elts" {
                    if let RawField::Nodes(elts) = field {
                        for elt in elts {
                            set_context(elt, ctx);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn replace_ctx(node: &mut RawNode, ctx: &str) {
    for (name, field) in &mut node.fields {
        if name == "ctx" {
            *field = RawField::Text(ctx.to_string());
            return;
        }
    }
    node.fields
        .push(("ctx".to_string(), RawField::Text(ctx.to_string())));
}

fn parse_int(text: &str) -> i64 {
    let cleaned = text.replace('_', "");
    let result = if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if let Some(oct) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8)
    } else if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else {
        cleaned.parse()
    };
    result.unwrap_or(i64::MAX)
}

fn decode_string(tok: &Token) -> Result<(bool, String), ParseError> {
    let text = &tok.text;
    let prefix_len = text
        .find(['"', '\''])
        .ok_or_else(|| ParseError::Unexpected {
            message: "malformed string literal".to_string(),
            line: tok.line,
            column: tok.column,
        })?;
    let prefix = text[..prefix_len].to_ascii_lowercase();
    let is_raw = prefix.contains('r');
    let is_bytes = prefix.contains('b');
    let rest = &text[prefix_len..];
    let quote_len = if rest.starts_with("\"\"\"") || rest.starts_with("'''") {
        3
    } else {
        1
    };
    let body = &rest[quote_len..rest.len() - quote_len];
    let content = if is_raw {
        body.to_string()
    } else {
        unescape(body)
    };
    Ok((is_bytes, content))
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\x");
                        out.push_str(&hex);
                    }
                }
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            // Unknown escapes keep the backslash, like the host language.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
