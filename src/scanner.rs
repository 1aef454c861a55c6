//! Line scanner for `@` directives.
//!
//! A directive occupies a whole line that starts with [`SENTINEL`], followed
//! by a command word and an optional argument separated by spaces or tabs:
//!
//! ```text
//! @include layout.tpl
//! @value title Hello, world
//! @section sidebar
//! @main
//! ```
//!
//! Lines starting with the sentinel but naming some other command are still
//! reported (as [`Command::Other`]) so the compiler can consume them.

/// Character that opens a directive line.
pub const SENTINEL: char = '@';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Include,
    Value,
    Section,
    Main,
    Other(&'a str),
}

impl<'a> Command<'a> {
    fn parse(word: &'a str) -> Self {
        match word {
            "include" => Command::Include,
            "value" => Command::Value,
            "section" => Command::Section,
            "main" => Command::Main,
            other => Command::Other(other),
        }
    }
}

/// One directive line found in template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    pub command: Command<'a>,
    /// Trimmed rest of the line, possibly empty.
    pub argument: &'a str,
    /// Byte offset of the start of the directive line.
    pub offset: usize,
    /// Bytes consumed by the line, trailing newline included.
    pub len: usize,
    /// 1-based line number.
    pub line: usize,
}

impl Directive<'_> {
    /// Byte offset of the first content byte after this directive.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Lazy iterator over the directives of a template source.
pub struct DirectiveScanner<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> DirectiveScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0, line: 1 }
    }
}

impl<'a> Iterator for DirectiveScanner<'a> {
    type Item = Directive<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let (raw_line, len) = match rest.find('\n') {
                Some(newline) => (&rest[..newline], newline + 1),
                None => (rest, rest.len()),
            };
            let offset = self.pos;
            let line = self.line;
            self.pos += len;
            self.line += 1;

            let Some(body) = raw_line.strip_prefix(SENTINEL) else {
                continue;
            };
            let body = body.strip_suffix('\r').unwrap_or(body);
            let (word, argument) = match body.find(&[' ', '\t'][..]) {
                Some(split) => (&body[..split], body[split..].trim()),
                None => (body, ""),
            };

            return Some(Directive {
                command: Command::parse(word),
                argument,
                offset,
                len,
                line,
            });
        }
        None
    }
}
