use super::error::{ParseError, ParseErrorKind};
use super::token::{Token, TokenKind};

/// Hand-rolled scanner for the filter-expression grammar. Whitespace between
/// tokens is insignificant; everything else is matched greedily.
pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
            self.pos += 1;
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_ws();
            let offset = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, offset });
                break;
            };
            let kind = match c {
                b'(' => {
                    self.bump();
                    TokenKind::OpenBlock
                }
                b')' => {
                    self.bump();
                    TokenKind::CloseBlock
                }
                b'"' => self.scan_string(offset)?,
                b'0'..=b'9' => self.scan_number(offset),
                b'=' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::Eq
                    } else if self.peek() == Some(b'~') {
                        self.bump();
                        TokenKind::RegexMatch
                    } else {
                        TokenKind::Eq
                    }
                }
                b'!' => {
                    self.bump();
                    match self.peek() {
                        Some(b'=') => {
                            self.bump();
                            TokenKind::Ne
                        }
                        Some(b'~') => {
                            self.bump();
                            TokenKind::RegexNoMatch
                        }
                        Some(b'#') => {
                            self.bump();
                            TokenKind::ContainsNot
                        }
                        _ => {
                            return Err(ParseError { offset, kind: ParseErrorKind::MatchOpExpected });
                        }
                    }
                }
                b'<' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                b'>' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                b'#' => {
                    self.bump();
                    TokenKind::Contains
                }
                c if c == b'_' || c.is_ascii_alphabetic() => self.scan_word(offset),
                _ => {
                    return Err(ParseError { offset, kind: ParseErrorKind::InvalidExpr });
                }
            };
            tokens.push(Token { kind, offset });
        }
        Ok(tokens)
    }

    fn scan_string(&mut self, offset: usize) -> Result<TokenKind, ParseError> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError { offset, kind: ParseErrorKind::StringLiteralExpected }),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'r') => out.push('\r'),
                    Some(other) => out.push(other as char),
                    None => return Err(ParseError { offset, kind: ParseErrorKind::StringLiteralExpected }),
                },
                Some(other) => out.push(other as char),
            }
        }
        Ok(TokenKind::StringLit(out))
    }

    fn scan_number(&mut self, offset: usize) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        let first = std::str::from_utf8(&self.src[start..self.pos]).unwrap().to_string();
        if self.peek() == Some(b':') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.bump();
            let second_start = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
            let second = std::str::from_utf8(&self.src[second_start..self.pos]).unwrap().to_string();
            return TokenKind::RangeLit(first, second);
        }
        let _ = offset;
        TokenKind::NumLit(first)
    }

    fn scan_word(&mut self, _offset: usize) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'_' || c == b'-' || c == b'.' || c.is_ascii_alphanumeric())
        {
            self.bump();
        }
        let word = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        match word {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "between" => TokenKind::Between,
            _ => TokenKind::Ident(word.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Scanner::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_simple_matchexpr() {
        let ks = kinds(r#"title =~ "foo""#);
        assert_eq!(
            ks,
            vec![
                TokenKind::Ident("title".into()),
                TokenKind::RegexMatch,
                TokenKind::StringLit("foo".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn tokenizes_range_literal() {
        let ks = kinds("age between 1:10");
        assert_eq!(
            ks,
            vec![
                TokenKind::Ident("age".into()),
                TokenKind::Between,
                TokenKind::RangeLit("1".into(), "10".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn tokenizes_blocks_and_logops() {
        let ks = kinds(r#"(a = "1" and b = "2") or c != "3""#);
        assert!(matches!(ks[0], TokenKind::OpenBlock));
        assert!(ks.contains(&TokenKind::And));
        assert!(ks.contains(&TokenKind::Or));
    }

    #[test]
    fn handles_escaped_quote_in_string() {
        let ks = kinds(r#"title = "say \"hi\"""#);
        assert_eq!(ks[2], TokenKind::StringLit("say \"hi\"".into()));
    }
}
