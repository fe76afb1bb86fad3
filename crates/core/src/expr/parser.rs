//! A minimal infix front end for the expression builder.
//!
//! Grammar: C-like precedence over the operator surface of the builder,
//! plus `expr[index]` subscripts and `ref.column` dereference. This is a
//! convenience layer, not SQL.

use tabula_primitives::TableId;
use tabula_types::{Datum, Text};

use crate::db::Db;
use crate::error::{ExprError, Result};
use crate::expr::{Expression, ExpressionBuilder, Operator};

/// Compiles an infix expression string against a table.
pub fn parse(db: &Db, table: TableId, input: &str) -> Result<Expression> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        at: 0,
        builder: ExpressionBuilder::new(db, table)?,
    };
    parser.expression(0)?;
    if let Some(token) = parser.peek() {
        return Err(parse_error(token.at, "trailing input"));
    }
    parser.builder.release()
}

fn parse_error(at: usize, message: impl Into<String>) -> crate::error::Error {
    ExprError::Parse {
        at,
        message: message.into(),
    }
    .into()
}

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    True,
    False,
    Punct(&'static str),
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    at: usize,
}

const PUNCTS: &[&str] = &[
    "&&", "||", "==", "!=", "<=", ">=", "<", ">", "&", "|", "^", "+", "-", "*", "/", "%", "!",
    "~", "(", ")", "[", "]", ".",
];

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut at = 0;
    'outer: while at < bytes.len() {
        let b = bytes[at];
        if b.is_ascii_whitespace() {
            at += 1;
            continue;
        }
        if b.is_ascii_digit() {
            let start = at;
            let mut is_float = false;
            while at < bytes.len()
                && (bytes[at].is_ascii_alphanumeric()
                    || bytes[at] == b'.'
                    || ((bytes[at] == b'+' || bytes[at] == b'-')
                        && matches!(bytes[at - 1], b'e' | b'E')))
            {
                if bytes[at] == b'.' || bytes[at] == b'e' || bytes[at] == b'E' {
                    is_float = true;
                }
                at += 1;
            }
            let text = &input[start..at];
            let kind = if is_float {
                TokenKind::Float(
                    text.parse()
                        .map_err(|_| parse_error(start, format!("bad float literal `{text}`")))?,
                )
            } else {
                TokenKind::Int(
                    text.parse()
                        .map_err(|_| parse_error(start, format!("bad integer literal `{text}`")))?,
                )
            };
            tokens.push(Token { kind, at: start });
            continue;
        }
        if b == b'_' || b.is_ascii_alphabetic() {
            let start = at;
            while at < bytes.len() && (bytes[at] == b'_' || bytes[at].is_ascii_alphanumeric()) {
                at += 1;
            }
            let kind = match &input[start..at] {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                name => TokenKind::Name(name.into()),
            };
            tokens.push(Token { kind, at: start });
            continue;
        }
        if b == b'"' {
            let start = at;
            at += 1;
            let mut value = Vec::new();
            while at < bytes.len() {
                match bytes[at] {
                    b'"' => {
                        at += 1;
                        tokens.push(Token {
                            kind: TokenKind::Str(value),
                            at: start,
                        });
                        continue 'outer;
                    }
                    b'\\' if at + 1 < bytes.len() => {
                        value.push(match bytes[at + 1] {
                            b'n' => b'\n',
                            b't' => b'\t',
                            other => other,
                        });
                        at += 2;
                    }
                    other => {
                        value.push(other);
                        at += 1;
                    }
                }
            }
            return Err(parse_error(start, "unterminated string literal"));
        }
        for &punct in PUNCTS {
            if input[at..].starts_with(punct) {
                tokens.push(Token {
                    kind: TokenKind::Punct(punct),
                    at,
                });
                at += punct.len();
                continue 'outer;
            }
        }
        return Err(parse_error(at, format!("unexpected byte 0x{b:02X}")));
    }
    Ok(tokens)
}

/// Binding powers; higher binds tighter.
fn precedence(punct: &str) -> Option<(u8, Operator)> {
    Some(match punct {
        "||" => (1, Operator::LogicalOr),
        "&&" => (2, Operator::LogicalAnd),
        "|" => (3, Operator::BitwiseOr),
        "^" => (4, Operator::BitwiseXor),
        "&" => (5, Operator::BitwiseAnd),
        "==" => (6, Operator::Equal),
        "!=" => (6, Operator::NotEqual),
        "<" => (7, Operator::Less),
        "<=" => (7, Operator::LessEqual),
        ">" => (7, Operator::Greater),
        ">=" => (7, Operator::GreaterEqual),
        "+" => (8, Operator::Plus),
        "-" => (8, Operator::Minus),
        "*" => (9, Operator::Multiplication),
        "/" => (9, Operator::Division),
        "%" => (9, Operator::Modulus),
        _ => return None,
    })
}

struct Parser<'db> {
    tokens: Vec<Token>,
    at: usize,
    builder: ExpressionBuilder<'db>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.at)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.at).cloned();
        if token.is_some() {
            self.at += 1;
        }
        token
    }

    fn expect_punct(&mut self, punct: &'static str) -> Result<()> {
        match self.bump() {
            Some(token) if token.kind == TokenKind::Punct(punct) => Ok(()),
            Some(token) => Err(parse_error(token.at, format!("expected `{punct}`"))),
            None => Err(parse_error(usize::MAX, format!("expected `{punct}`"))),
        }
    }

    /// Precedence climbing: parse a primary, then fold in binary
    /// operators of at least `min_precedence`.
    fn expression(&mut self, min_precedence: u8) -> Result<()> {
        self.primary()?;
        while let Some(Token {
            kind: TokenKind::Punct(punct),
            ..
        }) = self.peek()
        {
            let Some((precedence, op)) = precedence(punct) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.bump();
            self.expression(precedence + 1)?;
            self.builder.push_operator(op)?;
        }
        Ok(())
    }

    fn primary(&mut self) -> Result<()> {
        let Some(token) = self.bump() else {
            return Err(parse_error(usize::MAX, "expected an expression"));
        };
        match token.kind {
            TokenKind::Int(v) => self.builder.push_constant(Datum::from(v))?,
            TokenKind::Float(v) => self.builder.push_constant(Datum::from(v))?,
            TokenKind::Str(v) => self.builder.push_constant(Datum::Text(Text::from(v)))?,
            TokenKind::True => self.builder.push_constant(Datum::from(true))?,
            TokenKind::False => self.builder.push_constant(Datum::from(false))?,
            TokenKind::Name(name) => self.builder.push_column(&name)?,
            TokenKind::Punct("(") => {
                self.expression(0)?;
                self.expect_punct(")")?;
            }
            TokenKind::Punct("!") => {
                self.primary()?;
                self.builder.push_operator(Operator::LogicalNot)?;
            }
            TokenKind::Punct("~") => {
                self.primary()?;
                self.builder.push_operator(Operator::BitwiseNot)?;
            }
            TokenKind::Punct("+") => {
                self.primary()?;
                self.builder.push_operator(Operator::Positive)?;
            }
            TokenKind::Punct("-") => {
                self.primary()?;
                self.builder.push_operator(Operator::Negative)?;
            }
            TokenKind::Punct(other) => {
                return Err(parse_error(token.at, format!("unexpected `{other}`")));
            }
        }
        self.postfix()
    }

    /// Subscripts and dereferences bind tighter than any operator.
    fn postfix(&mut self) -> Result<()> {
        loop {
            match self.peek().map(|t| t.kind.clone()) {
                Some(TokenKind::Punct("[")) => {
                    self.bump();
                    self.expression(0)?;
                    self.expect_punct("]")?;
                    self.builder.push_operator(Operator::Subscript)?;
                }
                Some(TokenKind::Punct(".")) => {
                    self.bump();
                    let Some(token) = self.bump() else {
                        return Err(parse_error(usize::MAX, "expected a column name after `.`"));
                    };
                    let TokenKind::Name(name) = token.kind else {
                        return Err(parse_error(token.at, "expected a column name after `.`"));
                    };
                    self.builder.begin_subexpression()?;
                    self.builder.push_column(&name)?;
                    self.builder.end_subexpression()?;
                }
                _ => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_handles_the_surface() {
        let tokens = tokenize(r#"x >= 1.5 && name == "a\"b" || !flag"#).unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Name("x".into()),
                TokenKind::Punct(">="),
                TokenKind::Float(1.5),
                TokenKind::Punct("&&"),
                TokenKind::Name("name".into()),
                TokenKind::Punct("=="),
                TokenKind::Str(b"a\"b".to_vec()),
                TokenKind::Punct("||"),
                TokenKind::Punct("!"),
                TokenKind::Name("flag".into()),
            ]
        );
    }

    #[test]
    fn tokenizer_rejects_garbage() {
        assert!(tokenize("x @ 1").is_err());
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("12abc").is_err());
    }
}
