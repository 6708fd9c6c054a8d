use super::UnevaluableExpression;
use crate::core::variable::Variable;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    Number(f64),
    Variable(Variable),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Eof,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Variable(v) => write!(f, "{v}"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Eof => write!(f, "end of expression"),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Splits an expression into tokens. Identifiers are maximal runs of letters
/// and underscores and must name a vocabulary variable exactly.
pub fn tokenize(input: &str) -> Result<Vec<Token>, UnevaluableExpression> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Decimal literals: 12, 12.5, 12. and .5
        if c.is_ascii_digit()
            || (c == '.' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit())
        {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < chars.len() && chars[i] == '.' {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value: f64 = literal
                .parse()
                .map_err(|_| UnevaluableExpression::InvalidNumber(literal.clone()))?;
            tokens.push(Token::Number(value));
            continue;
        }

        if is_ident_char(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            let variable = ident
                .parse::<Variable>()
                .map_err(|_| UnevaluableExpression::UnknownVariable(ident))?;
            tokens.push(Token::Variable(variable));
            continue;
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => return Err(UnevaluableExpression::UnexpectedChar(c, i)),
        };
        tokens.push(token);
        i += 1;
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}
