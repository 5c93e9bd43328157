//! Character-to-token scanning.
//!
//! Single forward pass over the source bytes, no backtracking beyond a
//! one-character lookahead. Numbers, identifiers/keywords, strings, and
//! operators are each handled by their own scanning function, dispatched
//! from [`tokenize`]'s main character switch.

use mcc_util::McccError;

use crate::token::{keyword_kind, Token, TokenKind};

struct Scanner<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    _source: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            _source: source,
        }
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn peek_at(&self, offset: usize) -> char {
        self.chars.get(self.pos + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        if c != '\0' {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
            }
        }
        c
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

/// Scans `source` into a flat token stream, terminated by one `TokenKind::Eof`.
///
/// Mirrors the original scanner's per-character dispatch, including the fix
/// for its keyword-matching bug: each letter starts its own independent
/// identifier/keyword decision, so matching (or failing to match) one
/// keyword never leaks into scanning of an unrelated one.
pub fn tokenize(source: &str) -> Result<Vec<Token>, McccError> {
    let mut s = Scanner::new(source);
    let mut tokens = Vec::new();

    loop {
        skip_whitespace_and_comments(&mut s);
        if s.at_end() {
            tokens.push(Token::new(s.line, TokenKind::Eof));
            return Ok(tokens);
        }

        let line = s.line;
        let c = s.peek();

        let token = if is_alpha(c) {
            scan_identifier(&mut s, line)
        } else if is_digit(c) {
            scan_number(&mut s, line)?
        } else if c == '.' {
            // A `.` right after an identifier is member access; anywhere
            // else it begins a number (and `scan_number` rejects a `.`
            // with no digits around it).
            if matches!(tokens.last(), Some(t) if t.kind == TokenKind::Id) {
                s.advance();
                Token::new(line, TokenKind::Dot)
            } else {
                scan_number(&mut s, line)?
            }
        } else {
            match c {
                '"' | '\'' => scan_string(&mut s, line),
                _ => scan_operator(&mut s, line)?,
            }
        };
        tokens.push(token);
    }
}

fn skip_whitespace_and_comments(s: &mut Scanner) {
    loop {
        match s.peek() {
            ' ' | '\t' | '\r' | '\n' => {
                s.advance();
            }
            '/' if s.peek_at(1) == '/' => {
                while !s.at_end() && s.peek() != '\n' {
                    s.advance();
                }
            }
            '/' if s.peek_at(1) == '*' => {
                s.advance();
                s.advance();
                while !s.at_end() && !(s.peek() == '*' && s.peek_at(1) == '/') {
                    s.advance();
                }
                if !s.at_end() {
                    s.advance();
                    s.advance();
                }
            }
            '#' => {
                // preprocessor lines are skipped whole, same as the original scanner
                while !s.at_end() && s.peek() != '\n' {
                    s.advance();
                }
            }
            _ => break,
        }
    }
}

fn scan_identifier(s: &mut Scanner, line: u32) -> Token {
    let start = s.pos;
    while is_alpha(s.peek()) || is_digit(s.peek()) {
        s.advance();
    }
    let text: String = s.chars[start..s.pos].iter().collect();
    match keyword_kind(&text) {
        Some(kind) => Token::new(line, kind),
        None => Token::with_lexeme(line, TokenKind::Id, text),
    }
}

fn scan_number(s: &mut Scanner, line: u32) -> Result<Token, McccError> {
    let start = s.pos;
    let mut dot_count = 0;

    if s.peek() == '0' && (s.peek_at(1) == 'x' || s.peek_at(1) == 'X') {
        s.advance();
        s.advance();
        while s.peek().is_ascii_hexdigit() {
            s.advance();
        }
    } else {
        while is_digit(s.peek()) || s.peek() == '.' {
            if s.peek() == '.' {
                dot_count += 1;
            }
            s.advance();
        }
    }

    let text: String = s.chars[start..s.pos].iter().collect();
    let digit_count = text.chars().filter(|c| c.is_ascii_digit()).count();

    if dot_count > 1 || (digit_count <= 1 && dot_count == 1) {
        return Err(McccError::InvalidNumber { line, lexeme: text });
    }
    if dot_count == 1 {
        return Err(McccError::FloatingPointLiteral { line, lexeme: text });
    }

    Ok(Token::with_lexeme(line, TokenKind::Number, text))
}

/// Copies the literal verbatim between matching quote characters — either
/// `"` or `'` closes the literal, and both produce a plain `String` token.
/// No escape processing happens here; the original scanner leaves `\n`
/// translation (and leaves every other backslash sequence untouched,
/// backslash included) to the parser, which sees the raw lexeme.
fn scan_string(s: &mut Scanner, line: u32) -> Token {
    let quote = s.advance();
    let start = s.pos;
    while !s.at_end() && s.peek() != quote {
        s.advance();
    }
    let text: String = s.chars[start..s.pos].iter().collect();
    if !s.at_end() {
        s.advance();
    }
    Token::with_lexeme(line, TokenKind::String, text)
}

fn scan_operator(s: &mut Scanner, line: u32) -> Result<Token, McccError> {
    let c = s.advance();
    let kind = match c {
        ',' => TokenKind::Comma,
        ';' => TokenKind::Semicolon,
        '(' => TokenKind::LeftParen,
        ')' => TokenKind::RightParen,
        '{' => TokenKind::LeftBrace,
        '}' => TokenKind::RightBrace,
        '[' => TokenKind::LeftBracket,
        ']' => TokenKind::RightBracket,
        '~' => TokenKind::Tilde,
        '?' => TokenKind::Condition,
        ':' => TokenKind::Colon,
        '^' => TokenKind::Xor,
        '%' => TokenKind::Mod,
        '!' => {
            if s.peek() == '=' {
                s.advance();
                TokenKind::Ne
            } else {
                TokenKind::Not
            }
        }
        '=' => {
            if s.peek() == '=' {
                s.advance();
                TokenKind::Equal
            } else {
                TokenKind::Assign
            }
        }
        '<' => {
            if s.peek() == '=' {
                s.advance();
                TokenKind::Le
            } else if s.peek() == '<' {
                s.advance();
                TokenKind::Shl
            } else {
                TokenKind::Lt
            }
        }
        '>' => {
            if s.peek() == '=' {
                s.advance();
                TokenKind::Ge
            } else if s.peek() == '>' {
                s.advance();
                TokenKind::Shr
            } else {
                TokenKind::Gt
            }
        }
        '|' => {
            if s.peek() == '|' {
                s.advance();
                TokenKind::Lor
            } else {
                TokenKind::Or
            }
        }
        '&' => {
            if s.peek() == '&' {
                s.advance();
                TokenKind::Land
            } else {
                TokenKind::And
            }
        }
        '+' => {
            if s.peek() == '+' {
                s.advance();
                TokenKind::Inc
            } else {
                TokenKind::Plus
            }
        }
        '-' => {
            if s.peek() == '-' {
                s.advance();
                TokenKind::Dec
            } else {
                TokenKind::Minus
            }
        }
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        other => return Err(McccError::UnexpectedChar { line, ch: other }),
    };
    Ok(Token::new(line, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn skips_whitespace_and_line_comments() {
        assert_eq!(
            kinds("int x; // trailing\nint y;"),
            vec![
                TokenKind::Int,
                TokenKind::Id,
                TokenKind::Semicolon,
                TokenKind::Int,
                TokenKind::Id,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keyword_then_unrelated_identifier_does_not_fall_through() {
        // a naive fall-through bug would misparse "breakfast" after matching "break"
        let tokens = tokenize("break breakfast;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Break);
        assert_eq!(tokens[1].kind, TokenKind::Id);
        assert_eq!(tokens[1].lexeme.as_deref(), Some("breakfast"));
    }

    #[test]
    fn hex_and_decimal_numbers() {
        let tokens = tokenize("0x1F 42").unwrap();
        assert_eq!(tokens[0].lexeme.as_deref(), Some("0x1F"));
        assert_eq!(tokens[1].lexeme.as_deref(), Some("42"));
    }

    #[test]
    fn lone_dot_number_is_invalid() {
        let err = tokenize(".").unwrap_err();
        assert!(matches!(err, McccError::InvalidNumber { .. }));
    }

    #[test]
    fn dot_right_after_identifier_is_member_access() {
        assert_eq!(kinds("x.y"), vec![TokenKind::Id, TokenKind::Dot, TokenKind::Id, TokenKind::Eof]);
    }

    #[test]
    fn decimal_with_dot_is_floating_point_rejection() {
        let err = tokenize("3.14").unwrap_err();
        assert!(matches!(err, McccError::FloatingPointLiteral { .. }));
    }

    #[test]
    fn string_literal_keeps_escapes_literal() {
        let tokens = tokenize("\"hi\\n\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme.as_deref(), Some("hi\\n"));
    }

    #[test]
    fn two_char_operators_take_priority() {
        assert_eq!(
            kinds("<= >= == != << >> && || ++ --"),
            vec![
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Equal,
                TokenKind::Ne,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::Land,
                TokenKind::Lor,
                TokenKind::Inc,
                TokenKind::Dec,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_character_is_an_error() {
        let err = tokenize("@").unwrap_err();
        assert!(matches!(err, McccError::UnexpectedChar { ch: '@', .. }));
    }
}
