//! Recursive-descent reader: text to forms.
//!
//! The reader is an iterator of forms over a `CharStream`. Collections are
//! materialized through a `LiteralBuilder`, so the grammar is independent
//! of the value representation.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use regex::Regex;

use crate::builder::{CollectionMode, LiteralBuilder};
use crate::error::LispError;
use crate::language::{Name, RegexValue, Value};
use crate::stream::CharStream;

fn is_whitespace(c: char) -> bool {
    c.is_whitespace() || c == ','
}

/// Characters that may appear in a symbol or keyword.
pub fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '_' | '.' | '/' | '-' | '!' | '?' | '*' | '$' | '=' | '<' | '>' | '&' | '+' | '~'
                | '|' | '%'
        )
}

fn is_closing(c: char) -> bool {
    matches!(c, ')' | ']' | '}')
}

#[derive(Clone, Copy)]
enum CollectionKind {
    List,
    Vector,
    Map,
    Set,
}

impl CollectionKind {
    fn close(self) -> char {
        match self {
            CollectionKind::List => ')',
            CollectionKind::Vector => ']',
            CollectionKind::Map | CollectionKind::Set => '}',
        }
    }

    fn name(self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Vector => "vector",
            CollectionKind::Map => "map",
            CollectionKind::Set => "set",
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

pub struct Reader {
    stream: CharStream,
    builder: &'static dyn LiteralBuilder,
    location: (usize, usize),
    failed: bool,
}

impl Reader {
    pub fn new(input: &str, source: impl Into<String>) -> Self {
        Self::with_builder(input, source, CollectionMode::Native.builder())
    }

    pub fn with_builder(
        input: &str,
        source: impl Into<String>,
        builder: &'static dyn LiteralBuilder,
    ) -> Self {
        Reader {
            stream: CharStream::new(input, source),
            builder,
            location: (1, 0),
            failed: false,
        }
    }

    pub fn source(&self) -> &str {
        self.stream.source()
    }

    /// Line and column where the most recently read top-level form began.
    pub fn location(&self) -> (usize, usize) {
        self.location
    }

    /// Read the next top-level form, or `None` at end of input.
    pub fn read_next(&mut self) -> Result<Option<Value>, LispError> {
        loop {
            self.skip_whitespace();
            match self.stream.peek() {
                None => return Ok(None),
                // A close delimiter with no opener is skipped.
                Some(c) if is_closing(c) => {
                    self.stream.next();
                }
                Some(_) => {
                    self.location = (self.stream.line(), self.stream.column());
                    return self.read_form().map(Some);
                }
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.stream.peek() {
            if is_whitespace(c) {
                self.stream.next();
            } else if c == ';' {
                self.skip_comment();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.stream.next() {
            if c == '\n' {
                break;
            }
        }
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut buffer = String::new();
        while let Some(c) = self.stream.peek() {
            if !pred(c) {
                break;
            }
            buffer.push(c);
            self.stream.next();
        }
        buffer
    }

    /// Read one form starting at a non-whitespace character.
    fn read_form(&mut self) -> Result<Value, LispError> {
        let Some(c) = self.stream.peek() else {
            return Err(self.stream.croak("Unexpected end of input"));
        };
        let signed_number = (c == '-' || c == '+')
            && self.stream.peek_ahead().is_some_and(|n| n.is_ascii_digit());

        match c {
            '"' => self.read_string().map(|s| self.builder.string(&s)),
            c if c.is_ascii_digit() || signed_number => self.read_number(),
            ':' => self.read_keyword(),
            '\'' => {
                self.stream.next();
                self.skip_whitespace();
                let form = self.read_form()?;
                Ok(self.builder.quoted(form))
            }
            '(' => self.read_collection(CollectionKind::List),
            '[' => self.read_collection(CollectionKind::Vector),
            '{' => self.read_collection(CollectionKind::Map),
            '#' => match self.stream.peek_ahead() {
                Some('{') => {
                    self.stream.next();
                    self.read_collection(CollectionKind::Set)
                }
                Some('"') => {
                    self.stream.next();
                    self.read_regex()
                }
                _ => Err(self.stream.croak("Can't handle character: '#'")),
            },
            c if is_symbol_char(c) => Ok(self.read_symbol()),
            c => Err(self.stream.croak(format!("Can't handle character: '{c}'"))),
        }
    }

    // ========================================================================
    // Atoms
    // ========================================================================

    /// Read a double-quoted string body, decoding escapes.
    fn read_string(&mut self) -> Result<String, LispError> {
        self.stream.next();
        let mut content = String::new();
        loop {
            match self.stream.next() {
                None => return Err(self.stream.croak("Unterminated string")),
                Some('"') => return Ok(content),
                Some('\\') => content.push(self.read_escape_sequence()?),
                Some(c) => content.push(c),
            }
        }
    }

    fn read_escape_sequence(&mut self) -> Result<char, LispError> {
        let Some(c) = self.stream.next() else {
            return Err(self.stream.croak("Unterminated string"));
        };
        Ok(match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{0B}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'u' => self.read_unicode_escape()?,
            // Any other escaped character stands for itself.
            other => other,
        })
    }

    fn read_unicode_escape(&mut self) -> Result<char, LispError> {
        let mut hex = String::with_capacity(4);
        for _ in 0..4 {
            match self.stream.next() {
                Some(h) if h.is_ascii_hexdigit() => hex.push(h),
                _ => return Err(self.stream.croak("Invalid unicode escape")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.stream.croak(format!("Invalid unicode escape: \\u{hex}")))
    }

    fn read_regex(&mut self) -> Result<Value, LispError> {
        self.stream.next();
        let mut pattern = String::new();
        loop {
            match self.stream.next() {
                None => return Err(self.stream.croak("Unterminated regex")),
                Some('"') => break,
                // Backslashes belong to the regex syntax; only \" is unescaped.
                Some('\\') => match self.stream.next() {
                    Some('"') => pattern.push('"'),
                    Some(c) => {
                        pattern.push('\\');
                        pattern.push(c);
                    }
                    None => return Err(self.stream.croak("Unterminated regex")),
                },
                Some(c) => pattern.push(c),
            }
        }
        let regex = Regex::new(&pattern)
            .map_err(|e| self.stream.croak(format!("Invalid regex: {e}")))?;
        Ok(Value::Regex(Rc::new(RegexValue { regex })))
    }

    fn read_number(&mut self) -> Result<Value, LispError> {
        let mut text = String::new();
        let signed = matches!(self.stream.peek(), Some('-' | '+'));
        if signed {
            if let Some(sign) = self.stream.next() {
                text.push(sign);
            }
        }

        let mut has_dot = false;
        while let Some(c) = self.stream.peek() {
            match c {
                '.' if has_dot => return Err(self.stream.croak("unexpected '.'")),
                '.' => has_dot = true,
                '-' | '+' if signed => {
                    return Err(self.stream.croak(format!("unexpected '{c}'")));
                }
                c if c.is_ascii_digit() => {}
                '_' | ',' => {
                    self.stream.next();
                    continue;
                }
                _ => break,
            }
            text.push(c);
            self.stream.next();
        }

        text.parse::<f64>()
            .map(|n| self.builder.number(n))
            .map_err(|_| self.stream.croak(format!("Invalid number: {text}")))
    }

    fn read_symbol(&mut self) -> Value {
        let token = self.read_while(is_symbol_char);
        match token.as_str() {
            "true" => self.builder.boolean(true),
            "false" => self.builder.boolean(false),
            "nil" => self.builder.nil(),
            _ => self.builder.symbol(Name::parse(&token)),
        }
    }

    fn read_keyword(&mut self) -> Result<Value, LispError> {
        self.stream.next();
        let auto = self.stream.peek() == Some(':');
        if auto {
            self.stream.next();
        }
        let token = self.read_while(is_symbol_char);
        if token.is_empty() {
            return Err(self.stream.croak("Empty keyword"));
        }
        let name = if auto {
            Name::simple(&format!(":{token}"))
        } else {
            Name::parse(&token)
        };
        Ok(self.builder.keyword(name))
    }

    // ========================================================================
    // Collections
    // ========================================================================

    fn read_collection(&mut self, kind: CollectionKind) -> Result<Value, LispError> {
        self.stream.next();
        let end = kind.close();
        let mut elements = Vec::new();
        loop {
            self.skip_whitespace();
            match self.stream.peek() {
                None => {
                    return Err(self
                        .stream
                        .croak(format!("Unterminated {}, expected '{end}'", kind.name())));
                }
                Some(c) if c == end => {
                    self.stream.next();
                    break;
                }
                // Mismatched close delimiters are skipped like dangling ones.
                Some(c) if is_closing(c) => {
                    self.stream.next();
                }
                Some(_) => elements.push(self.read_form()?),
            }
        }

        Ok(match kind {
            CollectionKind::List => self.builder.list(elements),
            CollectionKind::Vector => self.builder.vector(elements),
            CollectionKind::Set => self.builder.set(elements),
            CollectionKind::Map => {
                if elements.len() % 2 != 0 {
                    return Err(self
                        .stream
                        .croak("Map literal must contain an even number of forms"));
                }
                let mut entries = Vec::with_capacity(elements.len() / 2);
                let mut iter = elements.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    entries.push((k, v));
                }
                self.builder.map(entries)
            }
        })
    }
}

impl Iterator for Reader {
    type Item = Result<Value, LispError>;

    /// Yields forms until end of input; stops after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_next() {
            Ok(Some(form)) => Some(Ok(form)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Read every form in `text` using native collections.
pub fn read_string(text: &str, source: &str) -> Result<Vec<Value>, LispError> {
    Reader::new(text, source).collect()
}

/// Read every form in `text` with the given literal builder.
pub fn read_string_with(
    text: &str,
    source: &str,
    builder: &'static dyn LiteralBuilder,
) -> Result<Vec<Value>, LispError> {
    Reader::with_builder(text, source, builder).collect()
}

/// Drop a leading `#!` line, keeping the newline so line numbers hold.
pub fn strip_shebang(text: &str) -> &str {
    if text.starts_with("#!") {
        match text.find('\n') {
            Some(idx) => &text[idx..],
            None => "",
        }
    } else {
        text
    }
}

/// Read every form in a file, labelled with its path.
pub fn read_file(
    path: impl AsRef<Path>,
    builder: &'static dyn LiteralBuilder,
) -> Result<Vec<Value>, LispError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| LispError::io(format!("Cannot read {}: {e}", path.display())))?;
    read_string_with(strip_shebang(&text), &path.display().to_string(), builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(text: &str) -> Value {
        let mut forms = read_string(text, "test").expect("read should succeed");
        assert_eq!(forms.len(), 1, "expected one form from {text:?}");
        forms.remove(0)
    }

    #[test]
    fn numbers_strip_separators() {
        assert_eq!(read_one("1_000_000"), Value::Number(1_000_000.0));
        assert_eq!(read_one("-2.5"), Value::Number(-2.5));
        assert_eq!(read_one("+7"), Value::Number(7.0));
    }

    #[test]
    fn second_dot_is_a_syntax_error() {
        assert!(read_string("1.2.3", "test").is_err());
    }

    #[test]
    fn sign_inside_signed_number_is_rejected() {
        assert!(read_string("-1-2", "test").is_err());
    }

    #[test]
    fn minus_alone_is_a_symbol() {
        assert_eq!(read_one("-"), Value::symbol("-"));
        assert_eq!(read_one("-x"), Value::symbol("-x"));
    }

    #[test]
    fn literal_tokens() {
        assert_eq!(read_one("true"), Value::Bool(true));
        assert_eq!(read_one("false"), Value::Bool(false));
        assert_eq!(read_one("nil"), Value::Nil);
    }

    #[test]
    fn qualified_symbols_split_on_slash() {
        match read_one("a.b/c") {
            Value::Symbol(name) => {
                assert_eq!(name.namespace_str().as_deref(), Some("a.b"));
                assert_eq!(name.name_str(), "c");
            }
            other => panic!("expected symbol, got {other}"),
        }
        assert_eq!(read_one("/"), Value::Symbol(Name::simple("/")));
    }

    #[test]
    fn keywords_and_auto_namespaced_keywords() {
        assert_eq!(read_one(":foo"), Value::keyword("foo"));
        match read_one("::foo") {
            Value::Keyword(name) => assert!(name.is_auto_namespaced()),
            other => panic!("expected keyword, got {other}"),
        }
        assert!(read_string(":", "test").is_err());
    }

    #[test]
    fn string_escapes() {
        assert_eq!(read_one(r#""a\nb\t\"q\"\\""#), Value::string("a\nb\t\"q\"\\"));
        assert_eq!(read_one(r#""\u0041""#), Value::string("A"));
        assert_eq!(read_one(r#""\q""#), Value::string("q"));
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = read_string("\"abc", "test").unwrap_err();
        assert!(err.to_string().contains("Unterminated string"));
    }

    #[test]
    fn quote_wraps_the_next_form() {
        assert_eq!(
            read_one("'(a b)"),
            Value::quoted(Value::list(vec![Value::symbol("a"), Value::symbol("b")]))
        );
    }

    #[test]
    fn comments_and_commas_are_whitespace() {
        let forms = read_string("; header\n1, 2 ; trailing\n3", "test").unwrap();
        assert_eq!(forms.len(), 3);
    }

    #[test]
    fn maps_need_pairs() {
        assert!(read_string("{:a}", "test").is_err());
        match read_one("{:a 1 :b 2}") {
            Value::Map(map) => assert_eq!(map.entries.len(), 2),
            other => panic!("expected map, got {other}"),
        }
    }

    #[test]
    fn regex_literals_compile() {
        match read_one(r#"#"\d+""#) {
            Value::Regex(re) => assert!(re.regex.is_match("123")),
            other => panic!("expected regex, got {other}"),
        }
    }

    #[test]
    fn reader_stops_after_first_error() {
        let mut reader = Reader::new("1 @ 2", "test");
        assert!(matches!(reader.next(), Some(Ok(_))));
        assert!(matches!(reader.next(), Some(Err(_))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn shebang_line_is_stripped() {
        assert_eq!(strip_shebang("#!/usr/bin/env ws\n(+ 1 2)"), "\n(+ 1 2)");
        assert_eq!(strip_shebang("(+ 1 2)"), "(+ 1 2)");
    }

    #[test]
    fn location_points_at_form_start() {
        let mut reader = Reader::new("1\n  foo", "test");
        reader.read_next().unwrap();
        reader.read_next().unwrap();
        assert_eq!(reader.location(), (2, 2));
    }
}
