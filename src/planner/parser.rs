//! Filter expression parser
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr      := and_expr ( OR and_expr )*
//! and_expr  := unary ( AND unary )*
//! unary     := NOT unary | primary
//! primary   := '(' expr ')' | predicate
//! predicate := operand cmp operand
//!            | operand [NOT] LIKE operand
//!            | ident [NOT] IN '(' literal ( ',' literal )* ')'
//!            | operand IS [NOT] NULL
//! operand   := ident | literal
//! literal   := string | number | TRUE | FALSE | NULL
//! ```
//!
//! Identifiers are handed to the resolve callback the moment they are read.
//! The first unknown identifier aborts the parse; no partial tree is kept.

use crate::errors::{QueryError, QueryResult};

use super::ast::{CompareOp, Literal, Node, Operand};
use super::lexer::{tokenize, Token, TokenKind};
use super::resolver::ResolvedIdent;

/// Longest accepted filter text in bytes
pub const MAX_FILTER_LENGTH: usize = 4096;

/// Deepest accepted nesting of parentheses and NOT
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parses filter text, resolving identifiers through `resolve`.
///
/// Blank input yields `None` (no condition).
pub fn parse_filter<F>(input: &str, resolve: F) -> QueryResult<Option<Node>>
where
    F: FnMut(&str) -> QueryResult<ResolvedIdent>,
{
    if input.len() > MAX_FILTER_LENGTH {
        return Err(QueryError::syntax(
            MAX_FILTER_LENGTH,
            format!("filter exceeds {} bytes", MAX_FILTER_LENGTH),
        ));
    }

    if input.trim().is_empty() {
        return Ok(None);
    }

    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        resolve,
    };

    let node = parser.expr()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(QueryError::syntax(
            trailing.position,
            format!("unexpected {}", describe(&trailing.kind)),
        ));
    }

    Ok(Some(node))
}

struct Parser<F> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    resolve: F,
}

impl<F> Parser<F>
where
    F: FnMut(&str) -> QueryResult<ResolvedIdent>,
{
    fn peek(&self) -> &Token {
        // tokens always end with Eof and pos never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> QueryResult<()> {
        let t = self.advance();
        if t.kind == kind {
            Ok(())
        } else {
            Err(QueryError::syntax(
                t.position,
                format!("expected {}, found {}", describe(&kind), describe(&t.kind)),
            ))
        }
    }

    fn enter(&mut self) -> QueryResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(QueryError::syntax(
                self.peek().position,
                format!("expression nested deeper than {}", MAX_NESTING_DEPTH),
            ));
        }
        Ok(())
    }

    fn expr(&mut self) -> QueryResult<Node> {
        let mut node = self.and_expr()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.and_expr()?;
            node = Node::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn and_expr(&mut self) -> QueryResult<Node> {
        let mut node = self.unary()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.unary()?;
            node = Node::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn unary(&mut self) -> QueryResult<Node> {
        if self.eat(&TokenKind::Not) {
            self.enter()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> QueryResult<Node> {
        if self.eat(&TokenKind::LParen) {
            self.enter()?;
            let node = self.expr()?;
            self.expect(TokenKind::RParen)?;
            self.depth -= 1;
            return Ok(node);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> QueryResult<Node> {
        let left = self.operand()?;
        let t = self.advance();

        let op = match t.kind {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Like => CompareOp::Like,
            TokenKind::Is => {
                let negated = self.eat(&TokenKind::Not);
                self.expect(TokenKind::Null)?;
                return Ok(Node::IsNull {
                    operand: left,
                    negated,
                });
            }
            TokenKind::In => return self.in_list(left, false, t.position),
            TokenKind::Not => {
                let next = self.advance();
                match next.kind {
                    TokenKind::Like => CompareOp::NotLike,
                    TokenKind::In => return self.in_list(left, true, next.position),
                    other => {
                        return Err(QueryError::syntax(
                            next.position,
                            format!("expected LIKE or IN after NOT, found {}", describe(&other)),
                        ))
                    }
                }
            }
            other => {
                return Err(QueryError::syntax(
                    t.position,
                    format!("expected comparison operator, found {}", describe(&other)),
                ))
            }
        };

        let right = self.operand()?;

        // `x = null` and `x != null` mean IS [NOT] NULL
        if matches!(op, CompareOp::Eq | CompareOp::Ne) {
            let negated = op == CompareOp::Ne;
            match (&left, &right) {
                (_, Operand::Literal(Literal::Null)) => {
                    return Ok(Node::IsNull {
                        operand: left,
                        negated,
                    })
                }
                (Operand::Literal(Literal::Null), _) => {
                    return Ok(Node::IsNull {
                        operand: right,
                        negated,
                    })
                }
                _ => {}
            }
        }

        Ok(Node::Compare { left, op, right })
    }

    fn in_list(&mut self, left: Operand, negated: bool, position: usize) -> QueryResult<Node> {
        let column = match left {
            Operand::Column(c) => c,
            Operand::Literal(_) => {
                return Err(QueryError::syntax(position, "IN needs a field on the left side"))
            }
        };

        self.expect(TokenKind::LParen)?;
        let mut values = Vec::new();
        loop {
            let t = self.advance();
            let lit = literal(&t.kind).ok_or_else(|| {
                QueryError::syntax(
                    t.position,
                    format!("expected literal in IN list, found {}", describe(&t.kind)),
                )
            })?;
            if lit == Literal::Null {
                return Err(QueryError::syntax(t.position, "null is not allowed in IN list"));
            }
            values.push(lit);

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(Node::In {
            column,
            values,
            negated,
        })
    }

    fn operand(&mut self) -> QueryResult<Operand> {
        let t = self.advance();
        if let TokenKind::Ident(name) = &t.kind {
            let ident = (self.resolve)(name)?;
            return Ok(Operand::Column(ident));
        }

        literal(&t.kind).map(Operand::Literal).ok_or_else(|| {
            QueryError::syntax(
                t.position,
                format!("expected field or literal, found {}", describe(&t.kind)),
            )
        })
    }
}

fn literal(kind: &TokenKind) -> Option<Literal> {
    match kind {
        TokenKind::Str(s) => Some(Literal::String(s.clone())),
        TokenKind::Int(i) => Some(Literal::Integer(*i)),
        TokenKind::Float(f) => Some(Literal::Float(*f)),
        TokenKind::True => Some(Literal::Bool(true)),
        TokenKind::False => Some(Literal::Bool(false)),
        TokenKind::Null => Some(Literal::Null),
        _ => None,
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("identifier {:?}", name),
        TokenKind::Str(s) => format!("string '{}'", s),
        TokenKind::Int(i) => format!("number {}", i),
        TokenKind::Float(f) => format!("number {}", f),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Eq => "'='".to_string(),
        TokenKind::Ne => "'!='".to_string(),
        TokenKind::Gt => "'>'".to_string(),
        TokenKind::Ge => "'>='".to_string(),
        TokenKind::Lt => "'<'".to_string(),
        TokenKind::Le => "'<='".to_string(),
        TokenKind::And => "AND".to_string(),
        TokenKind::Or => "OR".to_string(),
        TokenKind::Not => "NOT".to_string(),
        TokenKind::Like => "LIKE".to_string(),
        TokenKind::In => "IN".to_string(),
        TokenKind::Is => "IS".to_string(),
        TokenKind::Null => "NULL".to_string(),
        TokenKind::True => "TRUE".to_string(),
        TokenKind::False => "FALSE".to_string(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::caster::SqliteCaster;
    use super::super::resolver::IdentResolver;
    use super::*;
    use crate::schema::{Field, Module};

    fn module() -> Module {
        Module::new(
            1,
            1,
            vec![
                Field::number("score", 0),
                Field::string("status"),
                Field::bool("done"),
            ],
        )
    }

    fn parse(input: &str) -> QueryResult<Option<Node>> {
        let m = module();
        let mut r = IdentResolver::new(&m, &SqliteCaster);
        parse_filter(input, |name| r.resolve(name))
    }

    fn compile(input: &str) -> String {
        parse(input).unwrap().unwrap().to_sql().unwrap().sql
    }

    #[test]
    fn test_blank_is_no_condition() {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            compile("status = 'a' OR score > 1 AND done = true"),
            "(rv_status.value = ? OR (CAST(rv_score.value AS INTEGER) > CAST(? AS INTEGER) \
             AND CAST(rv_done.value AS INTEGER) = CAST(? AS INTEGER)))"
        );
    }

    #[test]
    fn test_parentheses_and_not() {
        assert_eq!(
            compile("NOT (status = 'a' OR status = 'b')"),
            "NOT ((rv_status.value = ? OR rv_status.value = ?))"
        );
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(compile("status = null"), "rv_status.value IS NULL");
        assert_eq!(compile("status != NULL"), "rv_status.value IS NOT NULL");
        assert_eq!(compile("score is not null"), "CAST(rv_score.value AS INTEGER) IS NOT NULL");
    }

    #[test]
    fn test_like_and_in() {
        assert_eq!(compile("status NOT LIKE 'x%'"), "rv_status.value NOT LIKE ?");
        assert_eq!(
            compile("score IN (1, 2, 3)"),
            "CAST(rv_score.value AS INTEGER) IN (CAST(? AS INTEGER), CAST(? AS INTEGER), CAST(? AS INTEGER))"
        );
    }

    #[test]
    fn test_system_columns() {
        assert_eq!(compile("createdAt >= '2024-01-01'"), "crd.created_at >= ?");
    }

    #[test]
    fn test_unknown_field_fails_fast() {
        let m = module();
        let mut r = IdentResolver::new(&m, &SqliteCaster);
        let err = parse_filter("missing = 1 AND score > 1", |name| r.resolve(name)).unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(_)));
        assert!(r.joins().is_empty());
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        let cases = [
            ("score >", 7),
            ("score > 1 AND", 13),
            ("(score > 1", 10),
            ("score 1", 6),
            ("score > 1 status", 10),
            ("score IN ()", 10),
            ("score NOT BETWEEN 1", 10),
        ];
        for (input, position) in cases {
            match parse(input) {
                Err(QueryError::SyntaxError { position: p, .. }) => assert_eq!(p, position, "{input}"),
                other => panic!("{input}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_length_and_depth_limits() {
        let long = format!("status = '{}'", "x".repeat(MAX_FILTER_LENGTH));
        assert!(matches!(parse(&long), Err(QueryError::SyntaxError { .. })));

        let deep = format!("{}score = 1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(parse(&deep), Err(QueryError::SyntaxError { .. })));

        let nested = format!("{}score = 1{}", "(".repeat(10), ")".repeat(10));
        assert!(parse(&nested).is_ok());
    }
}
