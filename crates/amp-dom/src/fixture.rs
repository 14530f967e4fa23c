//! Lightweight markup reader for fixtures.
//!
//! Reads well-formed markup (the kind written by hand in tests and samples)
//! into a [`DocumentTree`]. It knows about void elements, raw-text `script` and
//! `style`, comments, the doctype, and quoted, unquoted or bare attributes.
//! There is no error recovery beyond ignoring stray end tags.
//!
//! ```
//! let doc = amp_dom::fixture::parse_document(
//!     "<html><head><meta charset=utf-8></head><body><amp-img width=1 height=1></amp-img></body></html>",
//! )
//! .unwrap();
//! assert_eq!(doc.amp_elements().len(), 1);
//! ```

use crate::document::Document;
use crate::node::{is_raw_text_element, is_void_element, Attribute};
use crate::tree::{DocumentTree, NodeTree};
use crate::DocumentError;

/// Read markup into a [`Document`].
pub fn parse_document(source: &str) -> Result<Document, DocumentError> {
    Reader::read(source).map(Document::from_tree)
}

struct OpenElement {
    tag: String,
    attributes: Vec<Attribute>,
    children: Vec<NodeTree>,
}

impl OpenElement {
    fn into_node(self) -> NodeTree {
        NodeTree::Element {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

/// Markup reader over a `Vec<char>` source, tracking line and column for errors.
struct Reader {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    doctype: Option<String>,
    stack: Vec<OpenElement>,
}

impl Reader {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            doctype: None,
            // Sentinel holding top-level nodes.
            stack: vec![OpenElement {
                tag: String::new(),
                attributes: Vec::new(),
                children: Vec::new(),
            }],
        }
    }

    fn read(source: &str) -> Result<DocumentTree, DocumentError> {
        let mut reader = Reader::new(source);
        reader.read_nodes()?;
        Ok(reader.finish())
    }

    fn read_nodes(&mut self) -> Result<(), DocumentError> {
        while !self.is_at_end() {
            if self.starts_with("<!--") {
                self.read_comment()?;
            } else if self.starts_with_ignore_case("<!doctype") {
                self.read_doctype()?;
            } else if self.starts_with("</") {
                self.read_end_tag()?;
            } else if self.peek() == '<' && self.peek_next().is_ascii_alphabetic() {
                self.read_start_tag()?;
            } else {
                self.read_text();
            }
        }
        Ok(())
    }

    fn finish(mut self) -> DocumentTree {
        while self.stack.len() > 1 {
            self.close_top();
        }
        let top = self.stack.pop().map(|s| s.children).unwrap_or_default();
        DocumentTree {
            doctype: self.doctype,
            children: top,
        }
    }

    // =========================================================================
    // Node readers
    // =========================================================================

    fn read_comment(&mut self) -> Result<(), DocumentError> {
        self.advance_by(4);
        let text = self.read_until("-->")?;
        self.push_node(NodeTree::Comment { text });
        Ok(())
    }

    fn read_doctype(&mut self) -> Result<(), DocumentError> {
        self.advance_by("<!doctype".len());
        let rest = self.read_until(">")?;
        self.doctype = Some(rest.trim().to_string());
        Ok(())
    }

    fn read_text(&mut self) {
        let mut text = String::new();
        // Always take the first char, so a lone '<' is consumed as text.
        text.push(self.peek());
        self.advance();
        while !self.is_at_end() && !self.at_markup() {
            text.push(self.peek());
            self.advance();
        }
        self.push_node(NodeTree::Text {
            text: decode_entities(&text),
        });
    }

    fn read_start_tag(&mut self) -> Result<(), DocumentError> {
        self.advance(); // consume '<'
        let tag = self.read_name().to_ascii_lowercase();
        let mut attributes: Vec<Attribute> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                return Err(self.error(format!("Unterminated <{tag}> tag")));
            }
            if self.peek() == '>' {
                self.advance();
                break;
            }
            if self.starts_with("/>") {
                self.advance_by(2);
                self_closing = true;
                break;
            }
            if self.peek() == '/' {
                self.advance();
                continue;
            }

            let name = self.read_name().to_ascii_lowercase();
            if name.is_empty() {
                return Err(self.error(format!("Unexpected '{}' in <{tag}>", self.peek())));
            }
            self.skip_whitespace();
            let value = if self.peek() == '=' {
                self.advance();
                self.skip_whitespace();
                self.read_attribute_value()?
            } else {
                String::new()
            };
            if !attributes.iter().any(|a| a.name == name) {
                attributes.push(Attribute::new(name, value));
            }
        }

        if is_void_element(&tag) || self_closing {
            self.push_node(NodeTree::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
        } else if is_raw_text_element(&tag) {
            let closing = format!("</{tag}");
            let mut raw = String::new();
            while !self.is_at_end() && !self.starts_with_ignore_case(&closing) {
                raw.push(self.peek());
                self.advance();
            }
            if !self.is_at_end() {
                self.read_until(">")?;
            }
            let children = if raw.is_empty() {
                Vec::new()
            } else {
                vec![NodeTree::Text { text: raw }]
            };
            self.push_node(NodeTree::Element {
                tag,
                attributes,
                children,
            });
        } else {
            self.stack.push(OpenElement {
                tag,
                attributes,
                children: Vec::new(),
            });
        }
        Ok(())
    }

    fn read_end_tag(&mut self) -> Result<(), DocumentError> {
        self.advance_by(2);
        let tag = self.read_name().to_ascii_lowercase();
        self.read_until(">")?;

        // Stray end tags are ignored.
        let Some(depth) = self.stack.iter().skip(1).rposition(|open| open.tag == tag) else {
            return Ok(());
        };
        while self.stack.len() > depth + 1 {
            self.close_top();
        }
        Ok(())
    }

    fn read_attribute_value(&mut self) -> Result<String, DocumentError> {
        let quote = self.peek();
        if quote == '"' || quote == '\'' {
            self.advance();
            let raw = self.read_until(&quote.to_string())?;
            return Ok(decode_entities(&raw));
        }
        let mut raw = String::new();
        while !self.is_at_end() && !self.peek().is_whitespace() && self.peek() != '>' {
            raw.push(self.peek());
            self.advance();
        }
        Ok(decode_entities(&raw))
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while !self.is_at_end() {
            let ch = self.peek();
            if ch.is_whitespace() || matches!(ch, '>' | '=' | '/') {
                break;
            }
            name.push(ch);
            self.advance();
        }
        name
    }

    // =========================================================================
    // Tree building
    // =========================================================================

    fn push_node(&mut self, node: NodeTree) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(node);
        }
    }

    fn close_top(&mut self) {
        if let Some(open) = self.stack.pop() {
            let node = open.into_node();
            self.push_node(node);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn at_markup(&self) -> bool {
        self.peek() == '<'
            && (matches!(self.peek_next(), '/' | '!') || self.peek_next().is_ascii_alphabetic())
    }

    /// Consume through `terminator`, returning the text before it.
    fn read_until(&mut self, terminator: &str) -> Result<String, DocumentError> {
        let mut out = String::new();
        while !self.is_at_end() {
            if self.starts_with(terminator) {
                self.advance_by(terminator.chars().count());
                return Ok(out);
            }
            out.push(self.peek());
            self.advance();
        }
        Err(self.error(format!("Expected '{terminator}' before end of input")))
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn starts_with_ignore_case(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| {
            self.chars
                .get(self.pos + i)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(&c))
        })
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.chars.get(self.pos + 1).copied().unwrap_or('\0')
    }

    fn advance(&mut self) {
        if self.peek() == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += 1;
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn error(&self, message: String) -> DocumentError {
        DocumentError {
            message,
            line: self.line,
            column: self.column,
        }
    }
}

/// Decode the character references that appear in hand-written markup.
fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
