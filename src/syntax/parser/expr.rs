use crate::syntax::ast::*;
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::Spanned;

use super::Parser;

impl Parser {
    pub(super) fn parse_expr(&mut self) -> Spanned<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Spanned<Expr> {
        if !self.enter_nesting() {
            let span = self.current_span();
            self.exit_nesting();
            return Spanned::new(Expr::Error, span);
        }

        let mut lhs = self.parse_prefix();
        // Every wrap of `lhs` deepens the left spine by one level.
        let mut wrapped = 0;

        loop {
            let op = match self.peek() {
                Lexeme::Plus => BinOp::Add,
                Lexeme::Minus => BinOp::Sub,
                Lexeme::Star => BinOp::Mul,
                Lexeme::Slash => BinOp::Div,
                Lexeme::DotStar => BinOp::ElemMul,
                Lexeme::DotSlash => BinOp::ElemDiv,
                _ => break,
            };

            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }

            wrapped += 1;
            if !self.enter_nesting() {
                lhs = Spanned::new(Expr::Error, lhs.span);
                break;
            }

            self.advance(); // consume operator
            let rhs = self.parse_expr_bp(r_bp);
            let span = lhs.span.merge(rhs.span);
            lhs = Spanned::new(
                Expr::BinOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }

        for _ in 0..=wrapped {
            self.exit_nesting();
        }
        lhs
    }

    fn parse_prefix(&mut self) -> Spanned<Expr> {
        if self.at(&Lexeme::Minus) {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_expr_bp(PREFIX_NEG_BP);
            let span = start.merge(operand.span);
            return Spanned::new(Expr::Neg(Box::new(operand)), span);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Spanned<Expr> {
        let start = self.current_span();

        match self.peek().clone() {
            Lexeme::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(&Lexeme::RParen);
                Spanned::new(inner.node, start.merge(self.prev_span()))
            }
            Lexeme::Ident(name) => {
                self.advance();
                if self.at(&Lexeme::LParen) {
                    self.advance();
                    let args = self.parse_call_args();
                    self.expect(&Lexeme::RParen);
                    let span = start.merge(self.prev_span());
                    Spanned::new(
                        Expr::Call {
                            name: Spanned::new(name, start),
                            args,
                        },
                        span,
                    )
                } else {
                    Spanned::new(Expr::Var(name), start)
                }
            }
            Lexeme::Integer(_) => {
                self.error_with_help(
                    "numeric constants are not supported in expressions",
                    "declare a host scalar (`host<float> c;`) and pass the value at launch",
                );
                self.advance();
                Spanned::new(Expr::Error, start)
            }
            _ => {
                self.error_with_help(
                    &format!("expected expression, found {}", self.peek().description()),
                    "expressions are built from declared names, operators and function calls",
                );
                Spanned::new(Expr::Error, start)
            }
        }
    }

    fn parse_call_args(&mut self) -> Vec<Spanned<Expr>> {
        let mut args = Vec::new();
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            args.push(self.parse_expr());
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        args
    }
}
