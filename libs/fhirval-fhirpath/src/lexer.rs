use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    String(String),
    Number(f64),
    True,
    False,
    And,
    Or,
    Implies,
    Dot,
    Comma,
    LParen,
    RParen,
    Eq,
    Neq,
    Eof,
}

/// Splits a FHIRPath expression into tokens. Only the subset of the grammar this
/// crate evaluates is recognized — no unions (`|`), indexers, or string escapes
/// beyond a plain backslash-quote.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            input,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(idx, c)) = self.chars.peek() else {
                tokens.push(Token::Eof);
                break;
            };
            match c {
                '.' => {
                    self.chars.next();
                    tokens.push(Token::Dot);
                }
                ',' => {
                    self.chars.next();
                    tokens.push(Token::Comma);
                }
                '(' => {
                    self.chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    self.chars.next();
                    tokens.push(Token::RParen);
                }
                '=' => {
                    self.chars.next();
                    tokens.push(Token::Eq);
                }
                '!' => {
                    self.chars.next();
                    match self.chars.next() {
                        Some((_, '=')) => tokens.push(Token::Neq),
                        _ => return Err(Error::UnexpectedChar('!', idx)),
                    }
                }
                '\'' => tokens.push(self.read_string()?),
                c if c.is_ascii_digit() => tokens.push(self.read_number()),
                c if c.is_alphabetic() || c == '_' || c == '$' => tokens.push(self.read_word()),
                other => return Err(Error::UnexpectedChar(other, idx)),
            }
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self) -> Result<Token> {
        self.chars.next(); // opening quote
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\'')) => return Ok(Token::String(s)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c)) => s.push(c),
                    None => return Err(Error::UnterminatedString),
                },
                Some((_, c)) => s.push(c),
                None => return Err(Error::UnterminatedString),
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.chars.peek().map(|(i, _)| *i).unwrap_or(0);
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let text = &self.input[start..end];
        Token::Number(text.parse().unwrap_or(0.0))
    }

    fn read_word(&mut self) -> Token {
        let start = self.chars.peek().map(|(i, _)| *i).unwrap_or(0);
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        match &self.input[start..end] {
            "and" => Token::And,
            "or" => Token::Or,
            "implies" => Token::Implies,
            "true" => Token::True,
            "false" => Token::False,
            other => Token::Ident(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_path_and_call() {
        let tokens = Lexer::new("name.exists()").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("name".into()),
                Token::Dot,
                Token::Ident("exists".into()),
                Token::LParen,
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_implies_and_string_literal() {
        let tokens = Lexer::new("status = 'final'").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("status".into()),
                Token::Eq,
                Token::String("final".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn rejects_unknown_character() {
        assert!(Lexer::new("name @ 1").tokenize().is_err());
    }
}
