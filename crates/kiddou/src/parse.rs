//! Recursive-descent parser: tokens into a list of statements.
//!
//! Every statement begins with a header keyword. `run` parses an expression
//! first and reinterprets it as the assignment receiver if an `=` or `:=`
//! follows. Errors are reported to the handler and recovery skips to the
//! next statement header or constructor boundary, parsing balanced groups
//! recursively so a brace inside skipped code does not derail the scan.

use std::rc::Rc;

use crate::ast::{BinaryOp, BlockBody, Constant, Expr, ExprKind, Stmt, StmtKind, UnaryOp};
use crate::error::{ErrorHandler, KiddouError};
use crate::scan::{Token, TokenType};

/// Raised (as an `Err`) when the parser encounters an unrecoverable error
/// within a statement; the message has already been reported.
struct ParseError;

type ParseResult<T> = Result<T, ParseError>;

/// Which bracket opened the constructor currently being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opening {
    Brace,
    Bracket,
}

const MAX_CALL_ARGS: usize = 255;

pub(crate) struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    handler: &'a mut ErrorHandler,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, handler: &'a mut ErrorHandler) -> Self {
        Self {
            tokens,
            current: 0,
            handler,
        }
    }

    /// Parses statements until EOF. Statements that fail to parse are
    /// dropped after synchronization; their errors are in the handler.
    pub fn parse(mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
        }
        statements
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.try_statement() {
            Ok(stmt) => Some(stmt),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn try_statement(&mut self) -> ParseResult<Stmt> {
        let token = self.advance().clone();
        match token.token_type {
            TokenType::Con => self.parse_con(),
            TokenType::Run => self.parse_run(),
            _ => Err(self.error(&token, "Expected a statement header keyword.")),
        }
    }

    fn parse_con(&mut self) -> ParseResult<Stmt> {
        let line_start = self.previous().line;
        let identifier = self.consume(TokenType::Identifier, "Expected identifier.")?;
        let name = identifier.lexeme.clone();

        let assignment = self.peek().clone();
        if !matches!(assignment.token_type, TokenType::Assign | TokenType::ReAssign) {
            return Err(self.error(&assignment, "Expected assignment."));
        }
        self.advance();

        // forbid reassignment for con statements
        if assignment.token_type != TokenType::Assign {
            self.report(&assignment, "Reassignment not allowed.");
        }

        let expr = self.expression()?;
        let line_end = self.previous().line;
        Ok(Stmt {
            line_start,
            line_end,
            kind: StmtKind::Con { name, expr },
        })
    }

    fn parse_run(&mut self) -> ParseResult<Stmt> {
        let line_start = self.previous().line;
        let mut receiver = None;
        let mut reassign = false;
        let mut expr = self.expression()?;

        // if this is an assignment, reinterpret the LHS as the receiver
        if self.match_any(&[TokenType::Assign, TokenType::ReAssign]) {
            let assignment = self.previous().clone();
            if is_valid_receiver(&expr) {
                receiver = Some(expr);
                reassign = assignment.token_type == TokenType::ReAssign;
                expr = self.expression()?;
            } else {
                self.report(&assignment, "Invalid assignment target.");
                // consume the right-hand side for recovery
                let _ = self.expression()?;
            }
        }

        let line_end = self.previous().line;
        Ok(Stmt {
            line_start,
            line_end,
            kind: StmtKind::Run {
                receiver,
                expr,
                reassign,
            },
        })
    }

    /// Skips forward to the next statement header, constructor boundary, or
    /// EOF. Balanced groups encountered along the way are parsed recursively
    /// so their closers are not mistaken for the boundary.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            match self.peek().token_type {
                TokenType::Def
                | TokenType::Typ
                | TokenType::Con
                | TokenType::Arg
                | TokenType::Run
                | TokenType::Use
                | TokenType::Arrow
                | TokenType::RBrace
                | TokenType::RBracket => return,
                TokenType::LBrace => {
                    self.advance();
                    let _ = self.finish_constructor(Opening::Brace);
                }
                TokenType::LBracket => {
                    self.advance();
                    let _ = self.finish_constructor(Opening::Bracket);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    //// Expressions, loosest binding first.

    fn expression(&mut self) -> ParseResult<Expr> {
        self.left_assoc_binary(Self::domain, &[TokenType::Semi])
    }

    fn domain(&mut self) -> ParseResult<Expr> {
        self.left_assoc_binary(Self::logical_or, &[TokenType::Question])
    }

    fn logical_or(&mut self) -> ParseResult<Expr> {
        self.left_assoc_binary(Self::logical_and, &[TokenType::Or])
    }

    fn logical_and(&mut self) -> ParseResult<Expr> {
        self.left_assoc_binary(Self::equality, &[TokenType::And])
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.left_assoc_binary(Self::comparison, &[TokenType::Equal, TokenType::BangEqual])
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.left_assoc_binary(
            Self::sum,
            &[
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
            ],
        )
    }

    fn sum(&mut self) -> ParseResult<Expr> {
        self.left_assoc_binary(Self::term, &[TokenType::Plus, TokenType::Minus])
    }

    fn term(&mut self) -> ParseResult<Expr> {
        self.left_assoc_binary(
            Self::factor,
            &[
                TokenType::Star,
                TokenType::Slash,
                TokenType::DblSlash,
                TokenType::Percent,
            ],
        )
    }

    /// Unary `!` and `-`, then right-associative `^`.
    fn factor(&mut self) -> ParseResult<Expr> {
        if self.match_any(&[TokenType::Bang, TokenType::Minus]) {
            let token = self.previous().clone();
            let op = if token.token_type == TokenType::Bang {
                UnaryOp::Not
            } else {
                UnaryOp::Negate
            };
            let operand = self.factor()?;
            return Ok(Expr {
                line: token.line,
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            });
        }

        let expr = self.call()?;

        if self.match_any(&[TokenType::Caret]) {
            let token = self.previous().clone();
            let right = self.factor()?;
            return Ok(Expr {
                line: token.line,
                kind: ExprKind::Binary {
                    op: BinaryOp::Power,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
            });
        }

        Ok(expr)
    }

    /// Postfix chains: calls, index accesses, attribute accesses.
    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_any(&[TokenType::LParen]) {
                let mut args = Vec::new();
                if !self.check(TokenType::RParen) {
                    args = self.arguments()?;
                }
                let rparen = self.consume(TokenType::RParen, "Expected closing ')' after arguments.")?;
                expr = Expr {
                    line: rparen.line,
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.match_any(&[TokenType::LBracket]) {
                let index = self.expression()?;
                let rbracket = self.consume(TokenType::RBracket, "Expected closing ']'.")?;
                expr = Expr {
                    line: rbracket.line,
                    kind: ExprKind::Index {
                        container: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.match_any(&[TokenType::Dot]) {
                let name = self.consume(TokenType::Identifier, "Expected identifier.")?;
                expr = Expr {
                    line: name.line,
                    kind: ExprKind::Attribute {
                        object: Box::new(expr),
                        name: name.lexeme.clone(),
                    },
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match token.token_type {
            TokenType::Undef => {
                self.advance();
                Ok(literal(&token, Constant::Undef))
            }
            TokenType::True => {
                self.advance();
                Ok(literal(&token, Constant::Bool(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(literal(&token, Constant::Bool(false)))
            }
            TokenType::IntLit | TokenType::FloatLit | TokenType::StringLit => {
                self.advance();
                let constant = token.literal.clone().unwrap_or(Constant::Undef);
                Ok(literal(&token, constant))
            }
            TokenType::Identifier => {
                self.advance();
                Ok(Expr {
                    line: token.line,
                    kind: ExprKind::Variable(token.lexeme.clone()),
                })
            }
            TokenType::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RParen, "Expected closing ')'.")?;
                Ok(expr)
            }
            TokenType::LBrace => {
                self.advance();
                self.finish_constructor(Opening::Brace)
            }
            TokenType::LBracket => {
                self.advance();
                self.finish_constructor(Opening::Bracket)
            }
            _ => Err(self.error(&token, "Expected expression.")),
        }
    }

    /// Parses the inside of a `{...}` or `[...]` group and its closer.
    fn finish_constructor(&mut self, opening: Opening) -> ParseResult<Expr> {
        let line = self.previous().line;
        let expr = self.constructor_body(line, opening)?;
        self.close_constructor(opening)?;
        Ok(expr)
    }

    /// Disambiguates a constructor by its first non-trivial token: a
    /// statement keyword or `->` opens a block, anything else is a single
    /// expression that a following comma turns into a sequence.
    fn constructor_body(&mut self, line: u32, opening: Opening) -> ParseResult<Expr> {
        let is_eager = opening == Opening::Bracket;

        if self.check_closer() || self.is_at_end() {
            // empty constructor: `[]` is an empty sequence, `{}` an empty block
            return Ok(if is_eager {
                Expr {
                    line,
                    kind: ExprKind::Sequence {
                        elements: Vec::new(),
                        is_eager,
                    },
                }
            } else {
                block_expr(line, Vec::new(), None, is_eager)
            });
        }

        if matches!(
            self.peek().token_type,
            TokenType::Con
                | TokenType::Run
                | TokenType::Def
                | TokenType::Arg
                | TokenType::Use
                | TokenType::Typ
                | TokenType::Arrow
        ) {
            let stmts = self.block_statements();
            let tail = if self.check_closer() || self.is_at_end() {
                None
            } else {
                let has_arrow = self.match_any(&[TokenType::Arrow]);
                let token = self.peek().clone();
                let expr = self.expression()?;
                // forbid statements then an expression with no separating arrow
                if !has_arrow && !stmts.is_empty() {
                    self.report(&token, "Expected '->' before expression.");
                }
                Some(expr)
            };
            return Ok(block_expr(line, stmts, tail, is_eager));
        }

        let first = self.expression()?;
        if self.match_any(&[TokenType::Comma]) {
            let mut elements = vec![first];
            loop {
                if self.check_closer() || self.is_at_end() {
                    break; // trailing comma
                }
                elements.push(self.expression()?);
                if !self.match_any(&[TokenType::Comma]) {
                    break;
                }
            }
            Ok(Expr {
                line,
                kind: ExprKind::Sequence { elements, is_eager },
            })
        } else {
            // a zero-statement block with the expression as its tail
            Ok(block_expr(line, Vec::new(), Some(first), is_eager))
        }
    }

    /// Parses statements while the next token is a statement keyword. A
    /// token that starts an expression ends the loop so the caller can
    /// diagnose a missing `->` before the tail.
    fn block_statements(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while matches!(
            self.peek().token_type,
            TokenType::Con
                | TokenType::Run
                | TokenType::Def
                | TokenType::Arg
                | TokenType::Use
                | TokenType::Typ
        ) {
            if let Some(stmt) = self.parse_statement() {
                stmts.push(stmt);
            }
        }
        stmts
    }

    fn close_constructor(&mut self, opening: Opening) -> ParseResult<()> {
        let (expected, mismatch, message) = match opening {
            Opening::Brace => (
                TokenType::RBrace,
                TokenType::RBracket,
                "Expected closing '}'.",
            ),
            Opening::Bracket => (
                TokenType::RBracket,
                TokenType::RBrace,
                "Expected closing ']'.",
            ),
        };

        if self.check(expected) {
            self.advance();
            return Ok(());
        }
        if self.check(mismatch) {
            let token = self.peek().clone();
            let text = match opening {
                Opening::Brace => "Closing ']' does not match opening '{'.",
                Opening::Bracket => "Closing '}' does not match opening '['.",
            };
            self.report(&token, text);
            self.advance();
            return Ok(());
        }
        let token = self.peek().clone();
        Err(self.error(&token, message))
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut result = vec![self.expression()?];
        let mut reported = false;

        while self.match_any(&[TokenType::Comma]) {
            if result.len() > MAX_CALL_ARGS && !reported {
                let token = self.peek().clone();
                self.report(&token, "Can't pass more than 255 arguments.");
                reported = true;
            }
            result.push(self.expression()?);
        }

        Ok(result)
    }

    fn left_assoc_binary(
        &mut self,
        element: fn(&mut Self) -> ParseResult<Expr>,
        token_types: &[TokenType],
    ) -> ParseResult<Expr> {
        let mut expr = element(self)?;

        while self.match_any(token_types) {
            let token = self.previous().clone();
            let Some(op) = binary_op(token.token_type) else {
                break;
            };
            let right = element(self)?;
            expr = Expr {
                line: token.line,
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
            };
        }

        Ok(expr)
    }

    //// Token-stream plumbing.

    fn match_any(&mut self, token_types: &[TokenType]) -> bool {
        for token_type in token_types {
            if self.check(*token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(token_type) {
            return Ok(self.advance().clone());
        }
        let token = self.peek().clone();
        Err(self.error(&token, message))
    }

    fn check(&self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    fn check_closer(&self) -> bool {
        self.check(TokenType::RBrace) || self.check(TokenType::RBracket)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.report(token, message);
        ParseError
    }

    fn report(&mut self, token: &Token, message: &str) {
        self.handler.error(KiddouError::new(message, token.line, None));
    }
}

fn literal(token: &Token, constant: Constant) -> Expr {
    Expr {
        line: token.line,
        kind: ExprKind::Literal(constant),
    }
}

fn block_expr(line: u32, stmts: Vec<Stmt>, tail: Option<Expr>, is_eager: bool) -> Expr {
    Expr {
        line,
        kind: ExprKind::Block {
            body: Rc::new(BlockBody::new(stmts, tail)),
            is_eager,
        },
    }
}

fn is_valid_receiver(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Variable(_) | ExprKind::Index { .. } | ExprKind::Attribute { .. }
    )
}

fn binary_op(token_type: TokenType) -> Option<BinaryOp> {
    match token_type {
        TokenType::Semi => Some(BinaryOp::Piece),
        TokenType::Question => Some(BinaryOp::Domain),
        TokenType::Or => Some(BinaryOp::Or),
        TokenType::And => Some(BinaryOp::And),
        TokenType::Equal => Some(BinaryOp::Equal),
        TokenType::BangEqual => Some(BinaryOp::NotEqual),
        TokenType::Less => Some(BinaryOp::Less),
        TokenType::LessEqual => Some(BinaryOp::LessEqual),
        TokenType::Greater => Some(BinaryOp::Greater),
        TokenType::GreaterEqual => Some(BinaryOp::GreaterEqual),
        TokenType::Plus => Some(BinaryOp::Add),
        TokenType::Minus => Some(BinaryOp::Subtract),
        TokenType::Star => Some(BinaryOp::Multiply),
        TokenType::Slash => Some(BinaryOp::Divide),
        TokenType::DblSlash => Some(BinaryOp::IDivide),
        TokenType::Percent => Some(BinaryOp::Modulus),
        TokenType::Caret => Some(BinaryOp::Power),
        _ => None,
    }
}
