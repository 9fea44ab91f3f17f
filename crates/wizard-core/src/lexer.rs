use crate::ast::Segment;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    String(String),
    InterpolatedString(Vec<Segment>),
    Number(i64),
    LParen,
    RParen,
    Comma,
    Assign,
    PlusAssign,
    MinusAssign,
    DoubleEquals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    Plus,
    Minus,
    Bang,
    Amp,
    Pipe,
    Newline,
}

#[derive(Debug, Clone)]
pub(crate) struct Located {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Located>, ParseError> {
    let mut tokens: Vec<Located> = Vec::new();
    let mut cur = Cursor::new(source);

    while let Some(ch) = cur.peek() {
        let line = cur.line;
        let column = cur.column;
        let push = |tokens: &mut Vec<Located>, token: Token| {
            tokens.push(Located { token, line, column });
        };

        match ch {
            ';' | '#' => {
                while let Some(c) = cur.peek() {
                    if c == '\n' {
                        break;
                    }
                    cur.bump();
                }
            }
            '\n' => {
                cur.bump();
                // Collapse blank lines into a single separator
                if tokens.last().is_some_and(|t| t.token != Token::Newline) {
                    push(&mut tokens, Token::Newline);
                }
            }
            ' ' | '\t' | '\r' => {
                cur.bump();
            }
            '\\' => {
                // Line continuation: backslash, optional trailing blanks, newline
                cur.bump();
                while matches!(cur.peek(), Some(' ' | '\t' | '\r')) {
                    cur.bump();
                }
                if !cur.eat('\n') {
                    return Err(ParseError::new(
                        line,
                        column,
                        "Unexpected '\\' outside a string (line continuations must end the line)",
                    ));
                }
            }
            '(' => {
                cur.bump();
                push(&mut tokens, Token::LParen);
            }
            ')' => {
                cur.bump();
                push(&mut tokens, Token::RParen);
            }
            ',' => {
                cur.bump();
                push(&mut tokens, Token::Comma);
            }
            '&' => {
                cur.bump();
                push(&mut tokens, Token::Amp);
            }
            '|' => {
                cur.bump();
                push(&mut tokens, Token::Pipe);
            }
            '=' => {
                cur.bump();
                let token = if cur.eat('=') { Token::DoubleEquals } else { Token::Assign };
                push(&mut tokens, token);
            }
            '!' => {
                cur.bump();
                let token = if cur.eat('=') { Token::NotEquals } else { Token::Bang };
                push(&mut tokens, token);
            }
            '<' => {
                cur.bump();
                let token = if cur.eat('=') { Token::LessEquals } else { Token::Less };
                push(&mut tokens, token);
            }
            '>' => {
                cur.bump();
                let token = if cur.eat('=') { Token::GreaterEquals } else { Token::Greater };
                push(&mut tokens, token);
            }
            '+' => {
                cur.bump();
                let token = if cur.eat('=') { Token::PlusAssign } else { Token::Plus };
                push(&mut tokens, token);
            }
            '-' => {
                cur.bump();
                let token = if cur.eat('=') { Token::MinusAssign } else { Token::Minus };
                push(&mut tokens, token);
            }
            '"' | '\'' => {
                let token = lex_string(&mut cur, line, column)?;
                push(&mut tokens, token);
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = cur.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        cur.bump();
                    } else {
                        break;
                    }
                }
                if cur.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '.') {
                    return Err(ParseError::new(
                        line,
                        column,
                        format!(
                            "Invalid number: {}{} (quote versions as strings)",
                            digits,
                            cur.peek().unwrap_or(' ')
                        ),
                    ));
                }
                let n: i64 = digits.parse().map_err(|_| {
                    ParseError::new(line, column, format!("Number out of range: {}", digits))
                })?;
                push(&mut tokens, Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(c) = cur.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        cur.bump();
                    } else {
                        break;
                    }
                }
                push(&mut tokens, Token::Ident(ident));
            }
            _ => {
                return Err(ParseError::new(
                    line,
                    column,
                    format!("Unexpected character: '{}'", ch),
                ));
            }
        }
    }

    if tokens.last().is_some_and(|t| t.token != Token::Newline) {
        tokens.push(Located {
            token: Token::Newline,
            line: cur.line,
            column: cur.column,
        });
    }

    Ok(tokens)
}

fn lex_string(cur: &mut Cursor<'_>, line: usize, column: usize) -> Result<Token, ParseError> {
    let quote = cur.bump().unwrap_or('"');
    let mut s = String::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut has_interpolation = false;

    loop {
        match cur.peek() {
            Some('\\') => {
                cur.bump();
                match cur.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('\\') => s.push('\\'),
                    Some(c @ ('"' | '\'')) => s.push(c),
                    Some('\n') | None => {
                        return Err(ParseError::new(line, column, "Unterminated string"));
                    }
                    Some(c) => {
                        s.push('\\');
                        s.push(c);
                    }
                }
            }
            Some('%') => {
                cur.bump();
                if cur.eat('%') {
                    s.push('%');
                    continue;
                }
                match scan_marker(cur, quote) {
                    Some(name) => {
                        has_interpolation = true;
                        if !s.is_empty() {
                            segments.push(Segment::Literal(std::mem::take(&mut s)));
                        }
                        segments.push(Segment::Variable(name));
                    }
                    None => s.push('%'),
                }
            }
            Some('\n') | None => {
                return Err(ParseError::new(line, column, "Unterminated string"));
            }
            Some(c) if c == quote => {
                cur.bump();
                break;
            }
            Some(c) => {
                s.push(c);
                cur.bump();
            }
        }
    }

    if has_interpolation {
        if !s.is_empty() {
            segments.push(Segment::Literal(s));
        }
        Ok(Token::InterpolatedString(segments))
    } else {
        Ok(Token::String(s))
    }
}

/// Consumes `name%` after an opening `%` when it forms a marker.
///
/// Leaves the cursor untouched when the text is not an identifier followed
/// by a closing `%`, so `"50% off"` stays literal.
fn scan_marker(cur: &mut Cursor<'_>, quote: char) -> Option<String> {
    let mut lookahead = cur.chars.clone();
    let mut name = String::new();
    match lookahead.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => name.push(c),
        _ => return None,
    }
    loop {
        match lookahead.next() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
            Some('%') => break,
            Some(c) if c == quote => return None,
            _ => return None,
        }
    }
    // Commit: identifier plus the closing '%'
    for _ in 0..name.len() + 1 {
        cur.bump();
    }
    Some(name)
}
