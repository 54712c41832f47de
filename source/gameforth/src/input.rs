//! Source tokenizer.
//!
//! [`Tokens`] lazily splits source text on runs of whitespace, tracking the
//! 1-based line and column of each token for diagnostics. It also supports
//! the raw scans the compiler needs for comments and string literals.

use core::fmt;

/// A position in a labelled source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub label: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.label, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub line: usize,
    pub column: usize,
}

pub struct Tokens<'a> {
    src: &'a str,
    label: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(src: &'a str, label: &'a str) -> Self {
        Self {
            src,
            label,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn label(&self) -> &'a str {
        self.label
    }

    /// Attaches the source label to a token's position.
    pub fn locate(&self, tok: &Token<'_>) -> Location {
        Location {
            label: self.label.to_string(),
            line: tok.line,
            column: tok.column,
        }
    }

    /// The not-yet-consumed remainder of the source.
    pub fn remaining(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn bump_char(&mut self, c: char) {
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.remaining().chars().next() {
            if !c.is_whitespace() {
                break;
            }
            self.bump_char(c);
        }
    }

    /// Consumes everything up to and including `delim`, returning the text
    /// before it.
    ///
    /// A single whitespace character directly after the current token is
    /// skipped first, so `." hi"` yields `hi`. Returns `None` (having consumed
    /// the rest of the source) if `delim` never appears.
    pub fn take_until(&mut self, delim: char) -> Option<&'a str> {
        if let Some(c) = self.remaining().chars().next() {
            if c.is_whitespace() {
                self.bump_char(c);
            }
        }
        let start = self.pos;
        while let Some(c) = self.remaining().chars().next() {
            if c == delim {
                let text = &self.src[start..self.pos];
                self.bump_char(c);
                return Some(text);
            }
            self.bump_char(c);
        }
        None
    }

    /// Consumes the rest of the current line, including its newline.
    pub fn skip_line(&mut self) {
        while let Some(c) = self.remaining().chars().next() {
            self.bump_char(c);
            if c == '\n' {
                break;
            }
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.skip_whitespace();
        let start = self.pos;
        let (line, column) = (self.line, self.column);
        while let Some(c) = self.remaining().chars().next() {
            if c.is_whitespace() {
                break;
            }
            self.bump_char(c);
        }
        if self.pos == start {
            return None;
        }
        Some(Token {
            text: &self.src[start..self.pos],
            line,
            column,
        })
    }
}

#[cfg(test)]
pub mod test {
    use super::{Location, Tokens};

    #[test]
    fn words_and_positions() {
        let mut toks = Tokens::new("  : add2\n\t2 + ;\n", "cart");
        let all: Vec<_> = toks.by_ref().map(|t| (t.text, t.line, t.column)).collect();
        assert_eq!(
            all,
            vec![
                (":", 1, 3),
                ("add2", 1, 5),
                ("2", 2, 2),
                ("+", 2, 4),
                (";", 2, 6),
            ]
        );
        assert!(toks.next().is_none());
    }

    #[test]
    fn locate_uses_label() {
        let mut toks = Tokens::new("foo\n  bar", "game.fth");
        toks.next().unwrap();
        let bar = toks.next().unwrap();
        assert_eq!(
            toks.locate(&bar),
            Location {
                label: "game.fth".into(),
                line: 2,
                column: 3
            }
        );
        assert_eq!(toks.locate(&bar).to_string(), "game.fth:2:3");
    }

    #[test]
    fn raw_scans() {
        let mut toks = Tokens::new(r#"." hello, world!" next ( a comment ) \ rest
last"#, "t");
        assert_eq!(toks.next().unwrap().text, ".\"");
        assert_eq!(toks.take_until('"'), Some("hello, world!"));
        assert_eq!(toks.next().unwrap().text, "next");
        assert_eq!(toks.next().unwrap().text, "(");
        assert_eq!(toks.take_until(')'), Some("a comment "));
        assert_eq!(toks.next().unwrap().text, "\\");
        toks.skip_line();
        let last = toks.next().unwrap();
        assert_eq!((last.text, last.line, last.column), ("last", 2, 1));
        assert_eq!(toks.take_until('"'), None);
    }
}
