//! Character stream with position tracking for the reader.

use crate::error::LispError;

// ============================================================================
// CharStream
// ============================================================================

pub struct CharStream {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    source: String,
}

impl CharStream {
    pub fn new(input: &str, source: impl Into<String>) -> Self {
        CharStream {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 0,
            source: source.into(),
        }
    }

    /// Consume one character. A newline bumps the line and resets the column.
    pub fn next(&mut self) -> Option<char> {
        let c = *self.input.get(self.position)?;
        self.position += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    pub fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// The character after the next one.
    pub fn peek_ahead(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    pub fn eof(&self) -> bool {
        self.position >= self.input.len()
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// A syntax error located at the current position.
    pub fn croak(&self, message: impl Into<String>) -> LispError {
        LispError::syntax(message, self.source.clone(), self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lines_and_columns() {
        let mut stream = CharStream::new("ab\nc", "test");
        assert_eq!(stream.next(), Some('a'));
        assert_eq!(stream.next(), Some('b'));
        assert_eq!((stream.line(), stream.column()), (1, 2));
        assert_eq!(stream.next(), Some('\n'));
        assert_eq!((stream.line(), stream.column()), (2, 0));
        assert_eq!(stream.next(), Some('c'));
        assert_eq!(stream.next(), None);
        assert!(stream.eof());
    }

    #[test]
    fn peeking_does_not_consume() {
        let mut stream = CharStream::new("#{", "test");
        assert_eq!(stream.peek(), Some('#'));
        assert_eq!(stream.peek_ahead(), Some('{'));
        assert_eq!(stream.next(), Some('#'));
        assert_eq!(stream.peek_ahead(), None);
    }

    #[test]
    fn croak_reports_location() {
        let mut stream = CharStream::new("x\ny", "file.ws");
        stream.next();
        stream.next();
        stream.next();
        let err = stream.croak("boom");
        assert_eq!(err.to_string(), "boom at file.ws:2:1");
    }
}
