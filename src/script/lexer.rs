//! Tokenizer for TypeScript/JavaScript modules
//!
//! Only as much of the lexical grammar as type erasure needs: every token
//! carries its byte span so erased ranges can be blanked in place.

use std::path::Path;

use super::EvaluationError;

/// A position in a source file (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// String literal, unescaped
    Str(String),
    Num,
    /// Template literal including any substitutions
    Template,
    Regex,
    Punct(char),
    /// `=>`
    Arrow,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset past the last character
    pub end: usize,
    /// A line break separates this token from the previous one
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(n) if n == name)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// True when this token can end an operand, so a following `/` divides
    /// and a following `!` is a non-null assertion
    pub fn ends_operand(&self) -> bool {
        match &self.kind {
            TokenKind::Ident(name) => !OPERATOR_KEYWORDS.contains(&name.as_str()),
            TokenKind::Str(_) | TokenKind::Num | TokenKind::Template | TokenKind::Regex => true,
            TokenKind::Punct(c) => matches!(c, ')' | ']' | '}'),
            TokenKind::Arrow | TokenKind::Eof => false,
        }
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(n) => format!("'{}'", n),
            TokenKind::Str(s) => format!("string \"{}\"", s),
            TokenKind::Num => "number".to_string(),
            TokenKind::Template => "template literal".to_string(),
            TokenKind::Regex => "regular expression".to_string(),
            TokenKind::Punct(c) => format!("'{}'", c),
            TokenKind::Arrow => "'=>'".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

/// Keywords after which an expression starts
const OPERATOR_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do", "else", "yield",
    "await", "extends", "export", "default", "import", "const", "let", "var", "if", "while", "for", "with",
];

#[derive(Debug, Clone, Copy)]
enum TemplateMode {
    Text,
    Code { depth: usize },
}

struct Lexer<'a> {
    path: &'a Path,
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

/// Splits module source into tokens, ending with [`TokenKind::Eof`]
pub fn tokenize(path: &Path, source: &str) -> Result<Vec<Token>, EvaluationError> {
    let mut lexer = Lexer {
        path,
        source,
        offset: 0,
        line: 1,
        column: 1,
    };
    let mut tokens: Vec<Token> = Vec::new();

    loop {
        let newline_before = lexer.skip_trivia()?;
        let pos = lexer.pos();
        let start = lexer.offset;

        let Some(c) = lexer.peek(0) else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                pos,
                start,
                end: start,
                newline_before,
            });
            break;
        };

        let regex_allowed = tokens.last().map_or(true, |prev| !prev.ends_operand());

        let kind = if c == '"' || c == '\'' {
            TokenKind::Str(lexer.string(c)?)
        } else if c == '`' {
            lexer.template()?;
            TokenKind::Template
        } else if c.is_ascii_digit() || (c == '.' && lexer.peek(1).is_some_and(|d| d.is_ascii_digit())) {
            lexer.number();
            TokenKind::Num
        } else if is_ident_start(c) {
            TokenKind::Ident(lexer.ident())
        } else if c == '=' && lexer.peek(1) == Some('>') {
            lexer.bump();
            lexer.bump();
            TokenKind::Arrow
        } else if c == '/' && regex_allowed {
            lexer.regex()?;
            TokenKind::Regex
        } else if c.is_ascii_punctuation() {
            lexer.bump();
            TokenKind::Punct(c)
        } else {
            return Err(lexer.error(pos, format!("unexpected character '{}'", c)));
        };

        tokens.push(Token {
            kind,
            pos,
            start,
            end: lexer.offset,
            newline_before,
        });
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl Lexer<'_> {
    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.source[self.offset..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.source[self.offset..].chars().next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, pos: Pos, message: impl Into<String>) -> EvaluationError {
        EvaluationError::Syntax {
            path: self.path.to_path_buf(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    /// Skips whitespace and comments, returning whether a line break was seen
    fn skip_trivia(&mut self) -> Result<bool, EvaluationError> {
        let mut newline = false;
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    newline |= c == '\n';
                    self.bump();
                }
                (Some('/'), Some('/')) => self.skip_line(),
                (Some('/'), Some('*')) => {
                    let start = self.pos();
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(0), self.peek(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(c), _) => {
                                newline |= c == '\n';
                                self.bump();
                            }
                            (None, _) => return Err(self.error(start, "unterminated comment")),
                        }
                    }
                }
                (Some('#'), Some('!')) if self.offset == 0 => self.skip_line(),
                _ => return Ok(newline),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn string(&mut self, quote: char) -> Result<String, EvaluationError> {
        let start = self.pos();
        self.bump();
        let mut value = String::new();

        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => {
                    if let Some(c) = self.escape(start)? {
                        value.push(c);
                    }
                }
                Some('\n') | None => return Err(self.error(start, "unterminated string literal")),
                Some(c) => value.push(c),
            }
        }
    }

    /// Decodes the escape after a backslash; line continuations yield nothing
    fn escape(&mut self, start: Pos) -> Result<Option<char>, EvaluationError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error(start, "unterminated string literal"))?;

        Ok(Some(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '\n' => return Ok(None),
            'x' => self.hex_escape(start, 2)?,
            'u' if self.peek(0) == Some('{') => {
                self.bump();
                let mut hex = String::new();
                while let Some(h) = self.bump() {
                    if h == '}' {
                        break;
                    }
                    hex.push(h);
                }
                decode_hex(&hex).ok_or_else(|| self.error(start, format!("invalid unicode escape '\\u{{{}}}'", hex)))?
            }
            'u' => self.hex_escape(start, 4)?,
            other => other,
        }))
    }

    fn hex_escape(&mut self, start: Pos, digits: usize) -> Result<char, EvaluationError> {
        let hex: String = (0..digits).filter_map(|_| self.bump()).collect();
        decode_hex(&hex).ok_or_else(|| self.error(start, format!("invalid escape sequence '{}'", hex)))
    }

    /// Skips a template literal, following `${}` substitutions and any
    /// templates nested inside them
    fn template(&mut self) -> Result<(), EvaluationError> {
        let start = self.pos();
        self.bump();
        let mut modes = vec![TemplateMode::Text];

        while let Some(mode) = modes.last().copied() {
            match mode {
                TemplateMode::Text => match self.bump() {
                    None => return Err(self.error(start, "unterminated template literal")),
                    Some('\\') => {
                        self.bump();
                    }
                    Some('`') => {
                        modes.pop();
                    }
                    Some('$') if self.peek(0) == Some('{') => {
                        self.bump();
                        modes.push(TemplateMode::Code { depth: 0 });
                    }
                    Some(_) => {}
                },
                TemplateMode::Code { depth } => match self.peek(0) {
                    None => return Err(self.error(start, "unterminated template literal")),
                    Some('`') => {
                        self.bump();
                        modes.push(TemplateMode::Text);
                    }
                    Some(quote @ ('"' | '\'')) => {
                        self.string(quote)?;
                    }
                    Some('/') if matches!(self.peek(1), Some('/' | '*')) => {
                        self.skip_trivia()?;
                    }
                    Some('{') => {
                        self.bump();
                        modes.pop();
                        modes.push(TemplateMode::Code { depth: depth + 1 });
                    }
                    Some('}') => {
                        self.bump();
                        modes.pop();
                        if depth > 0 {
                            modes.push(TemplateMode::Code { depth: depth - 1 });
                        }
                    }
                    Some(_) => {
                        self.bump();
                    }
                },
            }
        }

        Ok(())
    }

    fn regex(&mut self) -> Result<(), EvaluationError> {
        let start = self.pos();
        self.bump();
        let mut in_class = false;

        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error(start, "unterminated regular expression")),
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }

        while self.peek(0).is_some_and(is_ident_continue) {
            self.bump();
        }
        Ok(())
    }

    fn number(&mut self) {
        let start = self.offset;
        while let Some(c) = self.peek(0) {
            let text = &self.source[start..self.offset];
            let exponent_sign = (c == '+' || c == '-') && text.ends_with(['e', 'E']) && !text.contains(['x', 'X']);
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn ident(&mut self) -> String {
        let start = self.offset;
        while self.peek(0).is_some_and(is_ident_continue) {
            self.bump();
        }
        self.source[start..self.offset].to_string()
    }
}

fn decode_hex(hex: &str) -> Option<char> {
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}
