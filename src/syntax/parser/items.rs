use crate::syntax::ast::*;
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::Spanned;

use super::Parser;

impl Parser {
    /// `kind<arg, ...> name, name, ...;`
    pub(super) fn parse_declaration(&mut self) -> Declaration {
        let start = self.current_span();
        let kind = match self.peek() {
            Lexeme::Vector => DeclKind::Vector,
            Lexeme::Matrix => DeclKind::Matrix,
            Lexeme::Scalar => DeclKind::Scalar,
            _ => DeclKind::Host,
        };
        self.advance();

        let mut args = Vec::new();
        if self.eat(&Lexeme::Lt) {
            while !self.at(&Lexeme::Gt) && !self.at(&Lexeme::Eof) {
                args.push(self.parse_type_arg());
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
            self.expect(&Lexeme::Gt);
        }
        let ty = Spanned::new(TypeExpr { kind, args }, start.merge(self.prev_span()));

        let mut names = vec![self.expect_ident()];
        while self.eat(&Lexeme::Comma) {
            names.push(self.expect_ident());
        }
        self.expect(&Lexeme::Semicolon);

        Declaration { ty, names }
    }

    fn parse_type_arg(&mut self) -> Spanned<TypeArg> {
        let key = self.expect_ident();
        if !self.eat(&Lexeme::Eq) {
            return key.map(TypeArg::Flag);
        }
        let value = match self.peek() {
            Lexeme::Integer(n) => {
                let n = *n;
                self.advance();
                n
            }
            _ => {
                self.error_with_help(
                    &format!("expected integer, found {}", self.peek().description()),
                    "view parameters take integer values, e.g. `stride=2`",
                );
                0
            }
        };
        let span = key.span.merge(self.prev_span());
        Spanned::new(TypeArg::Param(key.node, value), span)
    }

    /// `target = expr;`, `target += expr;` or `target -= expr;`
    pub(super) fn parse_statement(&mut self) -> Statement {
        let target = self.expect_ident();
        let op_span = self.current_span();
        let op = match self.peek() {
            Lexeme::Eq => AssignOp::Assign,
            Lexeme::PlusEq => AssignOp::AddAssign,
            Lexeme::MinusEq => AssignOp::SubAssign,
            _ => {
                self.error_with_help(
                    &format!("expected assignment, found {}", self.peek().description()),
                    "statements have the form `x = expr;`, `x += expr;` or `x -= expr;`",
                );
                return Statement {
                    value: Spanned::new(Expr::Error, target.span),
                    op: Spanned::new(AssignOp::Assign, op_span),
                    target,
                };
            }
        };
        self.advance();
        let value = self.parse_expr();
        self.expect(&Lexeme::Semicolon);

        Statement {
            target,
            op: Spanned::new(op, op_span),
            value,
        }
    }
}
