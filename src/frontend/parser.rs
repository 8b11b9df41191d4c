//! Parser for the set/map notation.
//!
//! This module implements a recursive descent parser for the isl-style
//! notation used in SCoP descriptions:
//!
//! ```text
//! [N, M] -> { S1[i, j] -> A[i + 1, 2j] : 0 <= i < N and 0 <= j < M; S2[i] -> A[i, 0] }
//! ```
//!
//! A tuple element that is a fresh identifier names a new dimension. Any
//! other element (a constant, an already bound name, an expression) creates
//! an unnamed dimension constrained to equal it. Comparisons may be chained
//! and `or` splits a piece into several basic maps.

use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::polyhedral::{AffineExpr, BasicMap, Constraint, Space, Tuple, UnionMap};
use crate::utils::errors::{ParseError, ParseErrorKind};
use std::collections::BTreeMap;

/// A variable reference inside a linear form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Ref {
    Param(usize),
    Var(usize),
}

/// A linear form collected while parsing, before the number of variables
/// is known.
#[derive(Debug, Clone, Default)]
struct Linear {
    terms: BTreeMap<Ref, i64>,
    constant: i64,
}

impl Linear {
    fn constant(value: i64) -> Self {
        Self { terms: BTreeMap::new(), constant: value }
    }

    fn term(r: Ref) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(r, 1);
        Self { terms, constant: 0 }
    }

    fn as_constant(&self) -> Option<i64> {
        if self.terms.values().all(|&c| c == 0) { Some(self.constant) } else { None }
    }

    fn scaled(mut self, factor: i64) -> Self {
        self.terms.values_mut().for_each(|c| *c *= factor);
        self.constant *= factor;
        self
    }

    fn plus(mut self, other: Linear, sign: i64) -> Self {
        for (r, c) in other.terms {
            *self.terms.entry(r).or_insert(0) += sign * c;
        }
        self.constant += sign * other.constant;
        self
    }

    fn to_expr(&self, n_var: usize, n_param: usize) -> AffineExpr {
        let mut expr = AffineExpr::constant(self.constant, n_var, n_param);
        for (&r, &c) in &self.terms {
            match r {
                Ref::Param(p) => expr.param_coeffs[p] += c,
                Ref::Var(v) => expr.coeffs[v] += c,
            }
        }
        expr
    }
}

/// A constraint in linear form: `lin >= 0` or `lin = 0`.
#[derive(Debug, Clone)]
struct LinearConstraint {
    lin: Linear,
    eq: bool,
}

/// A parser for the set/map notation.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    params: Vec<String>,
    /// Names bound in the piece being parsed, with their variable index
    vars: Vec<(String, usize)>,
    n_var: usize,
}

impl Parser {
    /// Create a parser over the tokens of `source`.
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self { tokens, pos: 0, params: Vec::new(), vars: Vec::new(), n_var: 0 })
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, kind: ParseErrorKind, message: impl Into<String>) -> ParseError {
        ParseError::new(kind, self.current().span, message)
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.check(TokenKind::Eof) {
            Err(self.error(ParseErrorKind::UnexpectedEof, format!("{}: unexpected end of input", message)))
        } else {
            Err(self.error(
                ParseErrorKind::UnexpectedToken,
                format!("{}: expected {:?}, found '{}'", message, kind, self.current().lexeme),
            ))
        }
    }

    /// Parse a complete union map or union set.
    pub fn parse_union(&mut self) -> Result<UnionMap, ParseError> {
        if self.check(TokenKind::LeftBracket) {
            self.advance();
            if !self.check(TokenKind::RightBracket) {
                loop {
                    let name = self.consume(TokenKind::Identifier, "Expected parameter name")?;
                    if !self.params.contains(&name.lexeme) {
                        self.params.push(name.lexeme);
                    }
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightBracket, "Expected ']' after parameters")?;
            self.consume(TokenKind::Arrow, "Expected '->' after parameters")?;
        }

        self.consume(TokenKind::LeftBrace, "Expected '{'")?;
        let mut pieces = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                pieces.extend(self.parse_piece()?);
                if !self.match_token(TokenKind::Semicolon) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expected '}'")?;
        self.consume(TokenKind::Eof, "Expected end of input")?;
        Ok(UnionMap::from_pieces(self.params.clone(), pieces))
    }

    /// Parse `tuple [-> tuple] [: formula]`, or `: formula` for a
    /// parameter-only set.
    fn parse_piece(&mut self) -> Result<Vec<BasicMap>, ParseError> {
        self.vars.clear();
        self.n_var = 0;
        let mut tuple_constraints = Vec::new();

        let (domain, range) = if self.check(TokenKind::Colon) {
            (None, Tuple::anonymous(0, "i"))
        } else {
            let first = self.parse_tuple(&mut tuple_constraints)?;
            if self.match_token(TokenKind::Arrow) {
                let second = self.parse_tuple(&mut tuple_constraints)?;
                (Some(first), second)
            } else {
                (None, first)
            }
        };

        let has_formula = self.match_token(TokenKind::Colon)
            && !self.check(TokenKind::RightBrace)
            && !self.check(TokenKind::Semicolon);
        let disjuncts = if has_formula {
            self.parse_formula()?
        } else {
            vec![Vec::new()]
        };

        let space = Space { params: self.params.clone(), domain, range };
        let n_param = self.params.len();
        let n_var = self.n_var;
        let pieces = disjuncts
            .into_iter()
            .map(|conj| {
                let mut piece = BasicMap::universe(space.clone());
                for c in tuple_constraints.iter().chain(conj.iter()) {
                    let expr = c.lin.to_expr(n_var, n_param);
                    piece.add_constraint(if c.eq {
                        Constraint::eq_zero(expr)
                    } else {
                        Constraint::ge_zero(expr)
                    });
                }
                piece
            })
            .collect();
        Ok(pieces)
    }

    /// Parse `Name[e0, e1, ...]` or `[e0, ...]`.
    fn parse_tuple(&mut self, constraints: &mut Vec<LinearConstraint>) -> Result<Tuple, ParseError> {
        let name = if self.check(TokenKind::Identifier) {
            Some(self.advance().lexeme)
        } else {
            None
        };
        self.consume(TokenKind::LeftBracket, "Expected '[' to open a tuple")?;
        let mut dims = Vec::new();
        if !self.check(TokenKind::RightBracket) {
            loop {
                let index = self.n_var;
                let fresh = self.check(TokenKind::Identifier)
                    && matches!(self.peek_kind(1), TokenKind::Comma | TokenKind::RightBracket)
                    && self.lookup(&self.current().lexeme).is_none();
                if fresh {
                    let ident = self.advance().lexeme;
                    self.vars.push((ident.clone(), index));
                    dims.push(ident);
                } else {
                    let value = self.parse_affine()?;
                    let dim = Linear::term(Ref::Var(index));
                    constraints.push(LinearConstraint { lin: dim.plus(value, -1), eq: true });
                    dims.push(format!("o{}", index));
                }
                self.n_var += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, "Expected ']' to close a tuple")?;
        Ok(Tuple::new(name, dims))
    }

    fn lookup(&self, name: &str) -> Option<Ref> {
        if let Some(&(_, v)) = self.vars.iter().rev().find(|(n, _)| n == name) {
            return Some(Ref::Var(v));
        }
        self.params.iter().position(|p| p == name).map(Ref::Param)
    }

    /// Parse a disjunction of conjunctions of comparison chains.
    fn parse_formula(&mut self) -> Result<Vec<Vec<LinearConstraint>>, ParseError> {
        let mut disjuncts = vec![self.parse_conjunction()?];
        while self.match_token(TokenKind::Or) {
            disjuncts.push(self.parse_conjunction()?);
        }
        Ok(disjuncts)
    }

    fn parse_conjunction(&mut self) -> Result<Vec<LinearConstraint>, ParseError> {
        let mut constraints = self.parse_chain()?;
        while self.match_token(TokenKind::And) {
            constraints.extend(self.parse_chain()?);
        }
        Ok(constraints)
    }

    /// Parse `a op b op c ...`, producing one constraint per comparison.
    fn parse_chain(&mut self) -> Result<Vec<LinearConstraint>, ParseError> {
        let mut lhs = self.parse_affine()?;
        if !self.current().kind.is_comparison() {
            return Err(self.error(
                ParseErrorKind::UnexpectedToken,
                format!("Expected a comparison, found '{}'", self.current().lexeme),
            ));
        }
        let mut constraints = Vec::new();
        while self.current().kind.is_comparison() {
            let op = self.advance().kind;
            let rhs = self.parse_affine()?;
            let c = match op {
                TokenKind::LessEqual => LinearConstraint { lin: rhs.clone().plus(lhs, -1), eq: false },
                TokenKind::Less => LinearConstraint { lin: rhs.clone().plus(lhs, -1).plus(Linear::constant(1), -1), eq: false },
                TokenKind::GreaterEqual => LinearConstraint { lin: lhs.plus(rhs.clone(), -1), eq: false },
                TokenKind::Greater => LinearConstraint { lin: lhs.plus(rhs.clone(), -1).plus(Linear::constant(1), -1), eq: false },
                _ => LinearConstraint { lin: lhs.plus(rhs.clone(), -1), eq: true },
            };
            constraints.push(c);
            lhs = rhs;
        }
        Ok(constraints)
    }

    /// Parse `term (('+' | '-') term)*`.
    fn parse_affine(&mut self) -> Result<Linear, ParseError> {
        let mut lin = self.parse_term()?;
        loop {
            if self.match_token(TokenKind::Plus) {
                lin = lin.plus(self.parse_term()?, 1);
            } else if self.match_token(TokenKind::Minus) {
                lin = lin.plus(self.parse_term()?, -1);
            } else {
                return Ok(lin);
            }
        }
    }

    /// Parse a product of factors; `2i` is read as `2 * i`.
    fn parse_term(&mut self) -> Result<Linear, ParseError> {
        if self.match_token(TokenKind::Minus) {
            return Ok(self.parse_term()?.scaled(-1));
        }
        let mut lin = self.parse_factor()?;
        loop {
            let juxtaposed = lin.as_constant().is_some()
                && matches!(self.current().kind, TokenKind::Identifier | TokenKind::LeftParen);
            if !(juxtaposed || self.match_token(TokenKind::Star)) {
                return Ok(lin);
            }
            let rhs = self.parse_factor()?;
            lin = match (lin.as_constant(), rhs.as_constant()) {
                (Some(c), _) => rhs.scaled(c),
                (_, Some(c)) => lin.scaled(c),
                _ => {
                    return Err(self.error(
                        ParseErrorKind::NonAffine,
                        "Product of two non-constant expressions",
                    ))
                }
            };
        }
    }

    fn parse_factor(&mut self) -> Result<Linear, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Integer => {
                self.advance();
                token
                    .lexeme
                    .parse::<i64>()
                    .map(Linear::constant)
                    .map_err(|_| ParseError::new(ParseErrorKind::InvalidNumber, token.span, "Integer literal out of range"))
            }
            TokenKind::Identifier => {
                self.advance();
                self.lookup(&token.lexeme).map(Linear::term).ok_or_else(|| {
                    ParseError::new(
                        ParseErrorKind::UnknownIdentifier,
                        token.span,
                        format!("Unknown identifier '{}'", token.lexeme),
                    )
                })
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_affine()?;
                self.consume(TokenKind::RightParen, "Expected ')'")?;
                Ok(inner)
            }
            TokenKind::Eof => Err(self.error(ParseErrorKind::UnexpectedEof, "Unexpected end of input")),
            _ => Err(self.error(
                ParseErrorKind::UnexpectedToken,
                format!("Expected an expression, found '{}'", token.lexeme),
            )),
        }
    }
}

/// Parse a union map (or union set) in isl notation.
pub fn parse_union_map(source: &str) -> Result<UnionMap, ParseError> {
    Parser::new(source)?.parse_union()
}

/// Parse a union set; identical to [`parse_union_map`] but rejects maps.
pub fn parse_union_set(source: &str) -> Result<UnionMap, ParseError> {
    let union = parse_union_map(source)?;
    if !union.is_set() {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            Default::default(),
            format!("Expected a set, found a map: {}", source),
        ));
    }
    Ok(union)
}
