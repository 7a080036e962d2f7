//! TypeScript type erasure
//!
//! Type syntax is overwritten with spaces so the remaining JavaScript keeps
//! its line and column numbers. Imports whose bindings are only used as types
//! are dropped, the way TypeScript elides them when emitting.
//!
//! Constructs that need code generation (`enum`, `namespace`, parameter
//! properties, `import x = require(...)`) are rejected as unsupported.
//! Types inside template literal substitutions are not erased.

use std::collections::HashSet;
use std::path::Path;

use super::lexer::{tokenize, Token, TokenKind};
use super::EvaluationError;

/// Deepest nesting of function, conditional and predicate types
const MAX_TYPE_DEPTH: usize = 64;

/// Keywords whose parenthesized head is never a parameter list
const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "with", "case", "await"];

const CLASS_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "declare", "abstract", "override"];

const PARAMETER_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override"];

const TYPE_OPERATORS: &[&str] = &["keyof", "typeof", "readonly", "unique", "infer", "asserts"];

/// Erases the type syntax from TypeScript `source`
pub fn strip_types(path: &Path, source: &str) -> Result<String, EvaluationError> {
    let tokens = tokenize(path, source)?;
    let mut stripper = Stripper::new(path, source, tokens)?;
    stripper.run()?;
    Ok(stripper.render())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Parameters { in_default: bool },
    Class { in_initializer: bool },
    Other,
}

/// A local name bound by an import, with the tokens that bind it
#[derive(Debug)]
struct Binding {
    name: String,
    start: usize,
    end: usize,
}

#[derive(Debug)]
struct ImportStatement {
    start: usize,
    end: usize,
    /// False for side-effect imports (`import "x"`), which are always kept
    has_clause: bool,
    bindings: Vec<Binding>,
}

struct Stripper<'a> {
    path: &'a Path,
    source: &'a str,
    tokens: Vec<Token>,
    partners: Vec<Option<usize>>,
    erased: Vec<bool>,
    frames: Vec<Frame>,
    /// Frame depth of the `const`/`let`/`var` declaration being walked
    declaration: Option<usize>,
    expect_binding: bool,
    class_body: Option<usize>,
    imports: Vec<ImportStatement>,
}

impl<'a> Stripper<'a> {
    fn new(path: &'a Path, source: &'a str, tokens: Vec<Token>) -> Result<Self, EvaluationError> {
        let partners = match_brackets(path, &tokens)?;
        let erased = vec![false; tokens.len()];
        Ok(Self {
            path,
            source,
            tokens,
            partners,
            erased,
            frames: Vec::new(),
            declaration: None,
            expect_binding: false,
            class_body: None,
            imports: Vec::new(),
        })
    }

    fn run(&mut self) -> Result<(), EvaluationError> {
        let mut i = 0;
        while !self.is_eof(i) {
            i = self.step(i)?;
        }
        self.elide_unused_imports();
        Ok(())
    }

    fn render(&self) -> String {
        let mut bytes = self.source.as_bytes().to_vec();
        for (token, _) in self.tokens.iter().zip(&self.erased).filter(|(_, erased)| **erased) {
            for byte in &mut bytes[token.start..token.end] {
                if *byte != b'\n' && *byte != b'\r' {
                    *byte = b' ';
                }
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn tok(&self, i: usize) -> &Token {
        // tokenize always ends the list with Eof
        &self.tokens[i.min(self.tokens.len() - 1)]
    }

    fn prev(&self, i: usize) -> Option<&Token> {
        i.checked_sub(1).map(|p| self.tok(p))
    }

    fn is_eof(&self, i: usize) -> bool {
        self.tok(i).kind == TokenKind::Eof
    }

    /// The bracket closing (or opening) the one at `i`
    fn partner(&self, i: usize) -> usize {
        self.partners.get(i).copied().flatten().unwrap_or(i)
    }

    fn erase(&mut self, start: usize, end: usize) {
        let end = end.min(self.erased.len());
        for flag in &mut self.erased[start.min(end)..end] {
            *flag = true;
        }
    }

    fn with_semicolon(&self, end: usize) -> usize {
        if self.tok(end).is_punct(';') {
            end + 1
        } else {
            end
        }
    }

    fn error(&self, i: usize, message: impl Into<String>) -> EvaluationError {
        let token = self.tok(i);
        EvaluationError::Syntax {
            path: self.path.to_path_buf(),
            line: token.pos.line,
            column: token.pos.column,
            message: message.into(),
        }
    }

    fn unsupported(&self, i: usize, what: &str) -> EvaluationError {
        EvaluationError::Unsupported {
            path: self.path.to_path_buf(),
            message: format!("{} are not supported (line {})", what, self.tok(i).pos.line),
        }
    }

    fn step(&mut self, i: usize) -> Result<usize, EvaluationError> {
        if self.declaration.is_some_and(|depth| self.frames.len() < depth) {
            self.declaration = None;
            self.expect_binding = false;
        }
        if self.expect_binding && self.declaration == Some(self.frames.len()) {
            self.expect_binding = false;
            return self.binding(i);
        }

        let starts_line = self.tok(i).newline_before && self.prev(i).is_some_and(Token::ends_operand);
        if let Some(Frame::Class { in_initializer }) = self.frames.last_mut() {
            if starts_line {
                *in_initializer = false;
            }
        }

        let token = self.tok(i).clone();
        match &token.kind {
            TokenKind::Punct(open @ ('(' | '{' | '[')) => {
                let frame = match *open {
                    '(' if self.is_parameter_list(i) => Frame::Parameters { in_default: false },
                    '{' if self.class_body == Some(i) => Frame::Class { in_initializer: false },
                    _ => Frame::Other,
                };
                self.frames.push(frame);
                Ok(i + 1)
            }
            TokenKind::Punct(')' | '}' | ']') => self.close(i),
            TokenKind::Punct(c) => self.punct(i, *c),
            TokenKind::Ident(word) => self.word(i, word),
            _ => Ok(i + 1),
        }
    }

    fn close(&mut self, i: usize) -> Result<usize, EvaluationError> {
        let closed = self.frames.pop();
        let brace = self.tok(i).is_punct('}');
        if let Some(Frame::Class { in_initializer }) = self.frames.last_mut() {
            if brace {
                *in_initializer = false;
            }
        }

        let next = i + 1;
        if matches!(closed, Some(Frame::Parameters { .. })) && self.tok(next).is_punct(':') {
            // return type
            let end = self.skip_type(next + 1, 0)?;
            self.erase(next, end);
            return Ok(end);
        }
        Ok(next)
    }

    fn punct(&mut self, i: usize, c: char) -> Result<usize, EvaluationError> {
        let frame = self.frames.last().copied();
        let depth = self.frames.len();
        match c {
            ';' => {
                if self.declaration == Some(depth) {
                    self.declaration = None;
                }
                if let Some(Frame::Class { in_initializer }) = self.frames.last_mut() {
                    *in_initializer = false;
                }
            }
            ',' => {
                if self.declaration == Some(depth) {
                    self.expect_binding = true;
                }
                if let Some(Frame::Parameters { in_default }) = self.frames.last_mut() {
                    *in_default = false;
                }
            }
            '=' => match self.frames.last_mut() {
                Some(Frame::Parameters { in_default }) | Some(Frame::Class { in_initializer: in_default }) => {
                    *in_default = true;
                }
                _ => {}
            },
            ':' if self.annotates(i, frame) => {
                let end = self.skip_type(i + 1, 0)?;
                self.erase(i, end);
                return Ok(end);
            }
            '?' if self.optional_marker(i, frame) => self.erase(i, i + 1),
            '!' if self.non_null_assertion(i) => self.erase(i, i + 1),
            '<' => {
                if let Some(end) = self.type_arguments(i) {
                    self.erase(i, end);
                    return Ok(end);
                }
            }
            _ => {}
        }
        Ok(i + 1)
    }

    fn word(&mut self, i: usize, word: &str) -> Result<usize, EvaluationError> {
        let statement_start = self.statement_start(i);
        let member_access = self.prev(i).is_some_and(|p| p.is_punct('.'));
        if statement_start && self.declaration == Some(self.frames.len()) {
            self.declaration = None;
        }

        match word {
            "import" if statement_start => return self.import_statement(i),
            "export" if statement_start => return self.export_statement(i),
            "const" | "let" | "var" if !member_access => {
                if self.tok(i + 1).is_ident("enum") {
                    return Err(self.unsupported(i, "enum declarations"));
                }
                self.declaration = Some(self.frames.len());
                self.expect_binding = true;
                return Ok(i + 1);
            }
            "class" if !member_access && self.begins_class(i + 1) => return Ok(self.class_heading(i)),
            "abstract" if self.tok(i + 1).is_ident("class") => {
                self.erase(i, i + 1);
                return Ok(i + 1);
            }
            "as" | "satisfies" if self.follows_operand(i) => {
                let end = if word == "as" && self.tok(i + 1).is_ident("const") {
                    i + 2
                } else {
                    self.skip_type(i + 1, 0)?
                };
                self.erase(i, end);
                return Ok(end);
            }
            _ => {}
        }

        if statement_start {
            if let Some(end) = self.type_declaration(i)? {
                self.erase(i, end);
                return Ok(end);
            }
        }

        match self.frames.last().copied() {
            Some(Frame::Parameters { in_default: false })
                if PARAMETER_MODIFIERS.contains(&word) && self.tok(i + 1).ident().is_some() =>
            {
                Err(self.unsupported(i, "parameter properties"))
            }
            Some(Frame::Class { in_initializer: false })
                if CLASS_MODIFIERS.contains(&word) && self.begins_member(i + 1) =>
            {
                self.erase(i, i + 1);
                Ok(i + 1)
            }
            _ => Ok(i + 1),
        }
    }

    fn statement_start(&self, i: usize) -> bool {
        match self.prev(i) {
            None => true,
            Some(prev) => {
                prev.is_punct(';')
                    || prev.is_punct('{')
                    || prev.is_punct('}')
                    || (self.tok(i).newline_before && prev.ends_operand() && !prev.is_punct(')'))
            }
        }
    }

    fn follows_operand(&self, i: usize) -> bool {
        !self.tok(i).newline_before && self.prev(i).is_some_and(Token::ends_operand)
    }

    fn begins_class(&self, i: usize) -> bool {
        let next = self.tok(i);
        next.ident().is_some() || next.is_punct('{') || next.is_punct('<')
    }

    fn begins_member(&self, i: usize) -> bool {
        let next = self.tok(i);
        next.ident().is_some()
            || matches!(next.kind, TokenKind::Str(_) | TokenKind::Num)
            || next.is_punct('[')
            || next.is_punct('#')
            || next.is_punct('*')
    }

    /// Whether the `(` at `open` starts a function's parameter list
    fn is_parameter_list(&self, open: usize) -> bool {
        let close = self.partner(open);
        if close == open {
            return false;
        }
        let after = self.tok(close + 1);
        if after.kind == TokenKind::Arrow {
            return true;
        }
        let after_control = self
            .prev(open)
            .and_then(Token::ident)
            .is_some_and(|word| CONTROL_KEYWORDS.contains(&word));
        if after_control {
            return false;
        }
        if after.is_punct('{') {
            return true;
        }
        if after.is_punct(':') {
            if let Ok(end) = self.skip_type(close + 2, 0) {
                let body = self.tok(end);
                return body.is_punct('{') || body.kind == TokenKind::Arrow;
            }
        }
        false
    }

    /// A `:` that starts a type annotation on a parameter or class member
    fn annotates(&self, i: usize, frame: Option<Frame>) -> bool {
        let Some(prev) = self.prev(i) else {
            return false;
        };
        let names_binding = prev.ident().is_some()
            || prev.is_punct('}')
            || prev.is_punct(']')
            || (self.erased[i - 1] && (prev.is_punct('?') || prev.is_punct('!')));

        match frame {
            Some(Frame::Parameters { in_default: false }) => names_binding,
            Some(Frame::Class { in_initializer: false }) => {
                names_binding || matches!(prev.kind, TokenKind::Str(_) | TokenKind::Num)
            }
            _ => false,
        }
    }

    /// The `?` of an optional parameter or class member
    fn optional_marker(&self, i: usize, frame: Option<Frame>) -> bool {
        let Some(prev) = self.prev(i) else {
            return false;
        };
        let next = self.tok(i + 1);

        match frame {
            Some(Frame::Parameters { in_default: false }) => {
                prev.ident().is_some()
                    && (next.is_punct(':') || next.is_punct(',') || next.is_punct(')') || next.is_punct('='))
            }
            Some(Frame::Class { in_initializer: false }) => {
                let names_member =
                    prev.ident().is_some() || prev.is_punct(']') || matches!(prev.kind, TokenKind::Str(_) | TokenKind::Num);
                names_member && (next.is_punct(':') || next.is_punct(';') || next.is_punct('(') || next.is_punct('='))
            }
            _ => false,
        }
    }

    fn non_null_assertion(&self, i: usize) -> bool {
        let token = self.tok(i);
        let next = self.tok(i + 1);
        let inequality = next.is_punct('=') && next.start == token.end;
        !inequality && self.prev(i).is_some_and(|prev| prev.ends_operand() && prev.end == token.start)
    }

    /// Type arguments of a call (`f<T>(x)`) or type parameters of an arrow
    /// function (`<T>(x: T) => x`); returns the index after the `>`
    fn type_arguments(&self, i: usize) -> Option<usize> {
        let prev = self.prev(i)?;
        let callee = prev.ends_operand()
            && prev.end == self.tok(i).start
            && !matches!(prev.kind, TokenKind::Num | TokenKind::Str(_));
        let arrow = !prev.ends_operand();
        if !callee && !arrow {
            return None;
        }

        let close = self.angle_close(i)?;
        let call = close + 1;
        if !self.tok(call).is_punct('(') {
            return None;
        }
        (callee || self.is_parameter_list(call)).then_some(call)
    }

    /// Finds the `>` closing the `<` at `open`, or `None` when the tokens in
    /// between can't be a type list
    fn angle_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut k = open;
        loop {
            let token = self.tok(k);
            match &token.kind {
                TokenKind::Punct('<') => depth += 1,
                TokenKind::Punct('>') => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(k);
                    }
                }
                TokenKind::Punct('(' | '[' | '{') => k = self.partner(k),
                TokenKind::Punct(')' | ']' | '}' | ';' | '!' | '+' | '*' | '/' | '%')
                | TokenKind::Regex
                | TokenKind::Eof => return None,
                // `&&`, `||` and `==` only occur in expressions
                TokenKind::Punct(c @ ('&' | '|' | '=')) => {
                    let next = self.tok(k + 1);
                    if next.is_punct(*c) && next.start == token.end {
                        return None;
                    }
                }
                _ => {}
            }
            k += 1;
        }
    }

    /// Handles the binding after `const`/`let`/`var` or a `,` in the same
    /// declaration, erasing its annotation
    fn binding(&mut self, i: usize) -> Result<usize, EvaluationError> {
        let token = self.tok(i);
        let after = if token.ident().is_some() {
            i + 1
        } else if token.is_punct('{') || token.is_punct('[') {
            self.partner(i) + 1
        } else {
            return self.step(i);
        };

        let mut next = after;
        if self.tok(next).is_punct('!') && self.tok(next + 1).is_punct(':') {
            self.erase(next, next + 1);
            next += 1;
        }
        if self.tok(next).is_punct(':') {
            let end = self.skip_type(next + 1, 0)?;
            self.erase(next, end);
            return Ok(end);
        }
        Ok(after)
    }

    /// Erases type parameters and `implements` from a class heading; returns
    /// the index of the class body
    fn class_heading(&mut self, i: usize) -> usize {
        let mut k = i + 1;
        loop {
            let token = self.tok(k);
            let (brace, angle, implements, group) = (
                token.is_punct('{') || token.kind == TokenKind::Eof,
                token.is_punct('<'),
                token.is_ident("implements"),
                token.is_punct('(') || token.is_punct('['),
            );
            if brace {
                break;
            }
            if angle {
                if let Some(close) = self.angle_close(k) {
                    self.erase(k, close + 1);
                    k = close + 1;
                    continue;
                }
            }
            if implements {
                let mut body = k;
                while !self.tok(body).is_punct('{') && !self.is_eof(body) {
                    body += 1;
                }
                self.erase(k, body);
                k = body;
                break;
            }
            if group {
                k = self.partner(k);
            }
            k += 1;
        }
        self.class_body = Some(k);
        k
    }

    /// Returns the end of a type-only declaration starting at `i`
    fn type_declaration(&self, i: usize) -> Result<Option<usize>, EvaluationError> {
        let Some(word) = self.tok(i).ident() else {
            return Ok(None);
        };
        let next = self.tok(i + 1);
        let named = next.ident().is_some() && !next.newline_before;

        match word {
            "type" if named => {
                let mut k = i + 2;
                if self.tok(k).is_punct('<') {
                    k = self
                        .angle_close(k)
                        .ok_or_else(|| self.error(k, "unclosed type parameter list"))?
                        + 1;
                }
                if !self.tok(k).is_punct('=') {
                    return Ok(None);
                }
                let end = self.skip_type(k + 1, 0)?;
                Ok(Some(self.with_semicolon(end)))
            }
            "interface" if named => {
                let mut k = i + 2;
                loop {
                    let token = self.tok(k);
                    if token.is_punct('<') {
                        k = self
                            .angle_close(k)
                            .ok_or_else(|| self.error(k, "unclosed type parameter list"))?
                            + 1;
                    } else if token.is_punct('{') {
                        return Ok(Some(self.partner(k) + 1));
                    } else if token.kind == TokenKind::Eof {
                        return Err(self.error(k, "expected an interface body"));
                    } else {
                        k += 1;
                    }
                }
            }
            "declare" if named => Ok(Some(self.declaration_end(i + 1))),
            "enum" if named => Err(self.unsupported(i, "enum declarations")),
            "namespace" | "module" if named && self.tok(i + 2).is_punct('{') => {
                Err(self.unsupported(i, "namespace declarations"))
            }
            _ => Ok(None),
        }
    }

    /// End of an ambient (`declare`) statement
    fn declaration_end(&self, start: usize) -> usize {
        let mut k = start;
        loop {
            let token = self.tok(k);
            match &token.kind {
                TokenKind::Eof => return k,
                TokenKind::Punct(';') => return k + 1,
                TokenKind::Punct('{') => return self.with_semicolon(self.partner(k) + 1),
                TokenKind::Punct('(' | '[') => k = self.partner(k),
                TokenKind::Ident(_) if k > start && token.newline_before && self.tok(k - 1).ends_operand() => {
                    return k;
                }
                _ => {}
            }
            k += 1;
        }
    }

    /// Skips a type starting at `start`, returning the index after it
    fn skip_type(&self, start: usize, depth: usize) -> Result<usize, EvaluationError> {
        if depth > MAX_TYPE_DEPTH {
            return Err(self.unsupported(start, "types nested this deeply"));
        }

        let mut k = start;
        if self.is_type_operator(k) {
            k += 1;
        }
        loop {
            k = self.skip_type_operand(k, depth)?;
            let token = self.tok(k);
            if self.is_type_operator(k) {
                k += 1;
                continue;
            }
            if token.is_ident("extends") && !token.newline_before {
                k = self.skip_type_operand(k + 1, depth + 1)?;
                if !self.tok(k).is_punct('?') {
                    return Err(self.error(k, "expected '?' in conditional type"));
                }
                k = self.skip_type(k + 1, depth + 1)?;
                if !self.tok(k).is_punct(':') {
                    return Err(self.error(k, "expected ':' in conditional type"));
                }
                return self.skip_type(k + 1, depth + 1);
            }
            return Ok(k);
        }
    }

    /// A single `|` or `&` joining union or intersection members
    fn is_type_operator(&self, k: usize) -> bool {
        let token = self.tok(k);
        let next = self.tok(k + 1);
        (token.is_punct('|') || token.is_punct('&')) && !(next.kind == token.kind && next.start == token.end)
    }

    fn skip_type_operand(&self, start: usize, depth: usize) -> Result<usize, EvaluationError> {
        let mut k = start;
        while self.tok(k).ident().is_some_and(|word| TYPE_OPERATORS.contains(&word)) {
            let next = self.tok(k + 1);
            if next.ident().is_none() && !next.is_punct('(') && !next.is_punct('[') && !next.is_punct('{') {
                break;
            }
            k += 1;
        }
        if self.tok(k).is_ident("new") {
            k += 1;
        }

        let token = self.tok(k);
        let mut end = match &token.kind {
            TokenKind::Punct('(') => {
                let after = self.partner(k) + 1;
                if self.tok(after).kind == TokenKind::Arrow {
                    return self.skip_type(after + 1, depth + 1);
                }
                after
            }
            TokenKind::Punct('<') => {
                // generic function type
                let close = self
                    .angle_close(k)
                    .ok_or_else(|| self.error(k, "unclosed type parameter list"))?;
                let parameters = close + 1;
                if !self.tok(parameters).is_punct('(') {
                    return Err(self.error(parameters, "expected '(' after type parameters"));
                }
                let arrow = self.partner(parameters) + 1;
                if self.tok(arrow).kind != TokenKind::Arrow {
                    return Err(self.error(arrow, "expected '=>' in function type"));
                }
                return self.skip_type(arrow + 1, depth + 1);
            }
            TokenKind::Punct('{' | '[') => self.partner(k) + 1,
            TokenKind::Punct('-') if self.tok(k + 1).kind == TokenKind::Num => k + 2,
            TokenKind::Str(_) | TokenKind::Num | TokenKind::Template => k + 1,
            TokenKind::Ident(_) => {
                let mut end = k + 1;
                while self.tok(end).is_punct('.') && self.tok(end + 1).ident().is_some() {
                    end += 2;
                }
                if self.tok(end).is_punct('<') && !self.tok(end).newline_before {
                    if let Some(close) = self.angle_close(end) {
                        end = close + 1;
                    }
                }
                if self.tok(end).is_ident("is") && !self.tok(end).newline_before {
                    // type predicate
                    return self.skip_type(end + 1, depth + 1);
                }
                end
            }
            _ => return Err(self.error(k, format!("expected a type, found {}", token.describe()))),
        };

        // array and indexed access types
        while self.tok(end).is_punct('[') && !self.tok(end).newline_before {
            end = self.partner(end) + 1;
        }
        Ok(end)
    }

    fn import_statement(&mut self, i: usize) -> Result<usize, EvaluationError> {
        let next = self.tok(i + 1);
        let has_clause = !matches!(next.kind, TokenKind::Str(_));
        let starts_clause = next.ident().is_some() || next.is_punct('{') || next.is_punct('*');
        if has_clause && !starts_clause {
            // `import(...)`, `import.meta`
            return Ok(i + 1);
        }
        if self.tok(i + 2).is_punct('=') {
            return Err(self.unsupported(i, "import assignments"));
        }

        let after_type = self.tok(i + 2);
        let type_only =
            next.is_ident("type") && !(after_type.is_ident("from") || after_type.is_punct(','));
        let end = self.module_statement_end(i + 1)?;
        if type_only {
            self.erase(i, end);
            return Ok(end);
        }

        let mut bindings = Vec::new();
        let mut k = i + 1;
        while k < end {
            let token = self.tok(k);
            if token.is_punct('{') {
                let close = self.partner(k);
                bindings.extend(self.specifiers(k, close));
                k = close + 1;
            } else if token.is_punct('*') && self.tok(k + 1).is_ident("as") {
                let start = if self.tok(k - 1).is_punct(',') { k - 1 } else { k };
                if let Some(name) = self.tok(k + 2).ident() {
                    bindings.push(Binding {
                        name: name.to_string(),
                        start,
                        end: k + 3,
                    });
                }
                k += 3;
            } else if let Some(name) = token.ident().filter(|name| k == i + 1 && *name != "from") {
                let name = name.to_string();
                let binding_end = if self.tok(k + 1).is_punct(',') { k + 2 } else { k + 1 };
                bindings.push(Binding {
                    name,
                    start: k,
                    end: binding_end,
                });
                k += 1;
            } else {
                k += 1;
            }
        }

        self.imports.push(ImportStatement {
            start: i,
            end,
            has_clause,
            bindings,
        });
        Ok(end)
    }

    fn export_statement(&mut self, i: usize) -> Result<usize, EvaluationError> {
        let next = self.tok(i + 1);
        if next.is_punct('=') {
            return Err(self.unsupported(i, "export assignments"));
        }
        if next.is_ident("type") && (self.tok(i + 2).is_punct('{') || self.tok(i + 2).is_punct('*')) {
            let end = self.export_list_end(i + 2)?;
            self.erase(i, end);
            return Ok(end);
        }
        if next.is_punct('{') {
            let close = self.partner(i + 1);
            let remaining = self.specifiers(i + 1, close);
            let end = self.export_list_end(i + 1)?;
            if remaining.is_empty() && close > i + 2 {
                self.erase(i, end);
            }
            return Ok(end);
        }

        let declaration = if next.is_ident("default") { i + 2 } else { i + 1 };
        if let Some(end) = self.type_declaration(declaration)? {
            self.erase(i, end);
            return Ok(end);
        }
        Ok(i + 1)
    }

    /// End of an `export { ... } [from "x"]` or `export * from "x"` statement
    fn export_list_end(&self, open: usize) -> Result<usize, EvaluationError> {
        if !self.tok(open).is_punct('{') {
            return self.module_statement_end(open);
        }
        let after = self.partner(open) + 1;
        if self.tok(after).is_ident("from") {
            return self.module_statement_end(after);
        }
        Ok(self.with_semicolon(after))
    }

    /// End of a statement whose clause is followed by a module specifier
    fn module_statement_end(&self, start: usize) -> Result<usize, EvaluationError> {
        let mut k = start;
        loop {
            match &self.tok(k).kind {
                TokenKind::Str(_) => break,
                TokenKind::Punct('{') => k = self.partner(k),
                TokenKind::Punct(';') | TokenKind::Eof => return Err(self.error(k, "expected a module specifier")),
                _ => {}
            }
            k += 1;
        }

        let mut end = k + 1;
        let attributes = self.tok(end).is_ident("with") || self.tok(end).is_ident("assert");
        if attributes && self.tok(end + 1).is_punct('{') {
            end = self.partner(end + 1) + 1;
        }
        Ok(self.with_semicolon(end))
    }

    /// Erases `type` specifiers between the braces at `open` and `close`,
    /// returning the local names the other specifiers bind
    fn specifiers(&mut self, open: usize, close: usize) -> Vec<Binding> {
        let mut bindings = Vec::new();
        let mut k = open + 1;
        while k < close {
            let mut end = k;
            while end < close && !self.tok(end).is_punct(',') {
                end += 1;
            }
            let with_comma = if end < close { end + 1 } else { end };
            let len = end - k;
            let type_only = self.tok(k).is_ident("type") && (len == 2 || (len == 4 && self.tok(k + 2).is_ident("as")));

            if type_only {
                self.erase(k, with_comma);
            } else if len > 0 {
                if let Some(name) = self.tok(end - 1).ident() {
                    bindings.push(Binding {
                        name: name.to_string(),
                        start: k,
                        end: with_comma,
                    });
                }
            }
            k = with_comma;
        }
        bindings
    }

    /// Drops imported bindings that no remaining code refers to
    fn elide_unused_imports(&mut self) {
        let imports = std::mem::take(&mut self.imports);
        let inside_import = |k: usize| imports.iter().any(|import| (import.start..import.end).contains(&k));

        let mut used = HashSet::new();
        let mut templates = Vec::new();
        for (k, token) in self.tokens.iter().enumerate() {
            if self.erased[k] || inside_import(k) {
                continue;
            }
            match &token.kind {
                TokenKind::Ident(name) => {
                    used.insert(name.clone());
                }
                TokenKind::Template => templates.push(&self.source[token.start..token.end]),
                _ => {}
            }
        }
        let is_used = |name: &str| used.contains(name) || templates.iter().any(|text| contains_word(text, name));

        let mut unused = Vec::new();
        for import in &imports {
            if !import.has_clause {
                continue;
            }
            let dropped: Vec<&Binding> = import.bindings.iter().filter(|b| !is_used(&b.name)).collect();
            if dropped.len() == import.bindings.len() {
                unused.push((import.start, import.end));
            } else {
                unused.extend(dropped.iter().map(|b| (b.start, b.end)));
            }
        }

        for (start, end) in unused {
            self.erase(start, end);
        }
    }
}

/// Pairs up brackets, failing on the first one left unbalanced
fn match_brackets(path: &Path, tokens: &[Token]) -> Result<Vec<Option<usize>>, EvaluationError> {
    let error = |token: &Token, message: String| EvaluationError::Syntax {
        path: path.to_path_buf(),
        line: token.pos.line,
        column: token.pos.column,
        message,
    };

    let mut partners = vec![None; tokens.len()];
    let mut open: Vec<usize> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Punct('(' | '{' | '[') => open.push(i),
            TokenKind::Punct(c @ (')' | '}' | ']')) => {
                let Some(o) = open.pop() else {
                    return Err(error(token, format!("unexpected '{}'", c)));
                };
                let expected = match tokens[o].kind {
                    TokenKind::Punct('(') => ')',
                    TokenKind::Punct('[') => ']',
                    _ => '}',
                };
                if c != expected {
                    return Err(error(token, format!("expected '{}', found '{}'", expected, c)));
                }
                partners[o] = Some(i);
                partners[i] = Some(o);
            }
            _ => {}
        }
    }

    match open.pop() {
        Some(o) => Err(error(&tokens[o], "unclosed bracket".to_string())),
        None => Ok(partners),
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    text.match_indices(word).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + word.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}
