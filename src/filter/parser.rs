use super::ast::{Expr, Literal, LogicOp, MatchOp};
use super::error::{ParseError, ParseErrorKind};
use super::scanner::Scanner;
use super::token::{Token, TokenKind};

enum ArenaNode {
    Match { attribute: String, op: MatchOp, literal: Literal },
    Logic { op: LogicOp, left: Option<usize>, right: Option<usize> },
}

/// Builds the AST the way the original code generator does: a running
/// `root`/`curpos` pair where `add_logop` pivots the tree (the new logic
/// node takes the current tree as its left child) and an open block marks
/// the next leaf to descend into the right child instead of replacing it.
/// Implemented over an index arena rather than raw parent pointers.
struct TreeBuilder {
    nodes: Vec<ArenaNode>,
    parents: Vec<Option<usize>>,
    root: Option<usize>,
    curpos: Option<usize>,
    next_must_descend_right: bool,
}

impl TreeBuilder {
    fn new() -> Self {
        Self { nodes: Vec::new(), parents: Vec::new(), root: None, curpos: None, next_must_descend_right: false }
    }

    fn push(&mut self, node: ArenaNode) -> usize {
        self.nodes.push(node);
        self.parents.push(None);
        self.nodes.len() - 1
    }

    fn set_right(&mut self, parent: usize, child: usize) {
        if let ArenaNode::Logic { right, .. } = &mut self.nodes[parent] {
            *right = Some(child);
        }
    }

    fn set_left(&mut self, parent: usize, child: usize) {
        if let ArenaNode::Logic { left, .. } = &mut self.nodes[parent] {
            *left = Some(child);
        }
    }

    fn add_matchexpr(&mut self, attribute: String, op: MatchOp, literal: Literal) {
        let idx = self.push(ArenaNode::Match { attribute, op, literal });
        if self.next_must_descend_right {
            self.next_must_descend_right = false;
            match self.curpos {
                None => {
                    self.curpos = Some(idx);
                    self.root = Some(idx);
                }
                Some(cp) => {
                    self.parents[idx] = Some(cp);
                    self.set_right(cp, idx);
                    self.curpos = Some(idx);
                }
            }
        } else {
            match self.curpos {
                None => {
                    self.curpos = Some(idx);
                    self.root = Some(idx);
                }
                Some(cp) => {
                    self.parents[idx] = Some(cp);
                    self.set_right(cp, idx);
                }
            }
        }
    }

    fn add_logop(&mut self, op: LogicOp) {
        let idx = self.push(ArenaNode::Logic { op, left: None, right: None });
        match self.curpos {
            None => {
                // Grammar guarantees a MatchExpr/BlockExpr precedes any LogOp.
                self.curpos = Some(idx);
                self.root = Some(idx);
            }
            Some(cp) if self.root != Some(cp) => {
                self.set_left(idx, cp);
                let grandparent = self.parents[cp];
                if let Some(gp) = grandparent {
                    self.set_right(gp, idx);
                }
                self.parents[idx] = grandparent;
                self.curpos = Some(idx);
            }
            Some(cp) => {
                self.set_left(idx, cp);
                self.curpos = Some(idx);
                self.root = Some(idx);
            }
        }
    }

    fn open_block(&mut self) {
        self.next_must_descend_right = true;
    }

    fn close_block(&mut self) {
        if let Some(cp) = self.curpos {
            if self.root != Some(cp) {
                self.curpos = self.parents[cp];
            }
        }
    }

    fn build(mut self) -> Option<Expr> {
        let root = self.root?;
        Some(Self::build_r(&mut self.nodes, root))
    }

    fn build_r(nodes: &mut [ArenaNode], idx: usize) -> Expr {
        match std::mem::replace(&mut nodes[idx], ArenaNode::Logic { op: LogicOp::And, left: None, right: None }) {
            ArenaNode::Match { attribute, op, literal } => Expr::matches(attribute, op, literal),
            ArenaNode::Logic { op, left, right } => {
                let left = left.map(|i| Self::build_r(nodes, i)).expect("logic node missing left child");
                let right = right.map(|i| Self::build_r(nodes, i)).expect("logic node missing right child");
                match op {
                    LogicOp::And => Expr::and(left, right),
                    LogicOp::Or => Expr::or(left, right),
                }
            }
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    builder: TreeBuilder,
}

impl Parser {
    pub fn parse(src: &str) -> Result<Expr, ParseError> {
        let tokens = Scanner::new(src).tokenize()?;
        let mut parser = Parser { tokens, pos: 0, builder: TreeBuilder::new() };
        parser.filter()?;
        parser.expect_eof()?;
        parser
            .builder
            .build()
            .ok_or_else(|| ParseError { offset: 0, kind: ParseErrorKind::InvalidExpr })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError { offset: self.peek().offset, kind }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.err(ParseErrorKind::EofExpected))
        }
    }

    fn filter(&mut self) -> Result<(), ParseError> {
        self.expr()
    }

    fn expr(&mut self) -> Result<(), ParseError> {
        self.match_or_block()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::And => LogicOp::And,
                TokenKind::Or => LogicOp::Or,
                _ => break,
            };
            self.bump();
            self.builder.add_logop(op);
            self.match_or_block()?;
        }
        Ok(())
    }

    fn match_or_block(&mut self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Ident(_) => self.match_expr(),
            TokenKind::OpenBlock => self.block_expr(),
            _ => Err(self.err(ParseErrorKind::InvalidExpr)),
        }
    }

    fn block_expr(&mut self) -> Result<(), ParseError> {
        self.bump(); // '('
        self.builder.open_block();
        self.expr()?;
        if self.peek().kind != TokenKind::CloseBlock {
            return Err(self.err(ParseErrorKind::CloseBlockExpected));
        }
        self.bump();
        self.builder.close_block();
        Ok(())
    }

    fn match_expr(&mut self) -> Result<(), ParseError> {
        let attribute = match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.bump();
                name
            }
            _ => return Err(self.err(ParseErrorKind::IdentExpected)),
        };
        let op = self.match_op()?;
        let literal = self.literal()?;
        self.builder.add_matchexpr(attribute, op, literal);
        Ok(())
    }

    fn match_op(&mut self) -> Result<MatchOp, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Eq => MatchOp::Eq,
            TokenKind::Ne => MatchOp::Ne,
            TokenKind::RegexMatch => MatchOp::RegexMatch,
            TokenKind::RegexNoMatch => MatchOp::RegexNoMatch,
            TokenKind::Lt => MatchOp::Lt,
            TokenKind::Gt => MatchOp::Gt,
            TokenKind::Le => MatchOp::Le,
            TokenKind::Ge => MatchOp::Ge,
            TokenKind::Contains => MatchOp::Contains,
            TokenKind::ContainsNot => MatchOp::ContainsNot,
            TokenKind::Between => MatchOp::Between,
            _ => return Err(self.err(ParseErrorKind::MatchOpExpected)),
        };
        self.bump();
        Ok(op)
    }

    fn literal(&mut self) -> Result<Literal, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::StringLit(s) => {
                self.bump();
                Ok(Literal::Text(s))
            }
            TokenKind::NumLit(s) => {
                self.bump();
                Ok(Literal::Text(s))
            }
            TokenKind::RangeLit(lo, hi) => {
                self.bump();
                let lo: i64 = lo.parse().map_err(|_| self.err(ParseErrorKind::RangeLiteralExpected))?;
                let hi: i64 = hi.parse().map_err(|_| self.err(ParseErrorKind::RangeLiteralExpected))?;
                Ok(Literal::Range(lo, hi))
            }
            _ => Err(self.err(ParseErrorKind::StringLiteralExpected)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_matchexpr() {
        let expr = Parser::parse(r#"title = "foo""#).unwrap();
        match expr {
            Expr::Match(m) => {
                assert_eq!(m.attribute, "title");
                assert_eq!(m.op, MatchOp::Eq);
            }
            _ => panic!("expected Match"),
        }
    }

    #[test]
    fn left_associative_and_chain_nests_left() {
        // a and b and c should parse as (a and b) and c: the rightmost
        // matchexpr sits at the root's right child, matching the pivot
        // algorithm's behavior of re-rooting on every logop.
        let expr = Parser::parse(r#"a = "1" and b = "2" and c = "3""#).unwrap();
        match expr {
            Expr::Logic(top) => {
                assert_eq!(top.op, LogicOp::And);
                match *top.right {
                    Expr::Match(ref m) => assert_eq!(m.attribute, "c"),
                    _ => panic!("expected c on the right"),
                }
                match *top.left {
                    Expr::Logic(ref inner) => {
                        assert_eq!(inner.op, LogicOp::And);
                        match *inner.left {
                            Expr::Match(ref m) => assert_eq!(m.attribute, "a"),
                            _ => panic!("expected a"),
                        }
                        match *inner.right {
                            Expr::Match(ref m) => assert_eq!(m.attribute, "b"),
                            _ => panic!("expected b"),
                        }
                    }
                    _ => panic!("expected nested Logic on the left"),
                }
            }
            _ => panic!("expected Logic"),
        }
    }

    #[test]
    fn parenthesized_group_attaches_as_whole_node() {
        let expr = Parser::parse(r#"a = "1" and (b = "2" or c = "3")"#).unwrap();
        match expr {
            Expr::Logic(top) => {
                assert_eq!(top.op, LogicOp::And);
                match *top.left {
                    Expr::Match(ref m) => assert_eq!(m.attribute, "a"),
                    _ => panic!("expected a on the left"),
                }
                match *top.right {
                    Expr::Logic(ref inner) => assert_eq!(inner.op, LogicOp::Or),
                    _ => panic!("expected grouped or on the right"),
                }
            }
            _ => panic!("expected Logic"),
        }
    }

    #[test]
    fn between_literal_parses_as_range() {
        let expr = Parser::parse("age between 1:10").unwrap();
        match expr {
            Expr::Match(m) => assert_eq!(m.literal, Literal::Range(1, 10)),
            _ => panic!("expected Match"),
        }
    }

    #[test]
    fn missing_closeblock_is_reported() {
        let err = Parser::parse(r#"(a = "1""#).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::CloseBlockExpected);
    }

    #[test]
    fn missing_matchop_is_reported() {
        let err = Parser::parse(r#"a "1""#).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MatchOpExpected);
    }

    #[test]
    fn empty_input_is_invalid_expr() {
        let err = Parser::parse("").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidExpr);
    }
}
