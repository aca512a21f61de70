//! Markup tokenizer with raw capture for script elements.
//!
//! The tokenizer walks the document once. On a `<script` start tag it reads
//! the attributes, asks the registry whether the declared type is
//! raw-capture eligible, and then either:
//!
//! - **raw capture**: takes every byte up to the literal closing sequence
//!   `</script` + optional ASCII whitespace + `>` (tag name in any case), with
//!   no tag, comment or character-reference interpretation, or
//! - **structural parse**: keeps tokenizing the body as ordinary markup until
//!   a `script` end tag.
//!
//! Every step consumes at least one byte, so no input can stall the loop.

use std::ops::Range;

use inlet_types::ScriptDeclaration;
use serde::{Deserialize, Serialize};

use crate::classify::ScriptTypeRegistry;

const SCRIPT: &str = "script";
/// Longest character reference name considered (`&#x10FFFF;` fits).
const MAX_REFERENCE_LEN: usize = 32;

// ══════════════════════════════════════════════════════════════════════════════
// Output types
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Lowercased name.
    pub name: String,
    /// Decoded value; `None` for a valueless attribute.
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    RawCapture,
    StructuralParse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "token", rename_all = "snake_case")]
pub enum MarkupToken {
    Doctype {
        text: String,
    },
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Text with character references decoded.
    Text {
        text: String,
    },
    /// A raw-captured script body, exactly as written.
    RawText {
        text: String,
    },
    Comment {
        text: String,
    },
}

/// One script element found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub declaration: ScriptDeclaration,
    pub attributes: Vec<Attribute>,
    pub mode: CaptureMode,
    /// Byte range from `<script` through the closing tag.
    pub range: Range<usize>,
    /// Byte range of the body.
    pub body: Range<usize>,
}

/// A non-fatal tokenizer observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupNote {
    /// Byte offset the note refers to.
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupOutput {
    pub tokens: Vec<MarkupToken>,
    pub scripts: Vec<ScriptElement>,
    pub notes: Vec<MarkupNote>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Tokenizer
// ══════════════════════════════════════════════════════════════════════════════

/// A script element whose body is being tokenized structurally.
struct OpenScript {
    attributes: Vec<Attribute>,
    start: usize,
    body_start: usize,
}

pub struct Tokenizer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    registry: &'a ScriptTypeRegistry,
    out: MarkupOutput,
    open_script: Option<OpenScript>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, registry: &'a ScriptTypeRegistry) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            registry,
            out: MarkupOutput::default(),
            open_script: None,
        }
    }

    /// Tokenize the whole document.
    pub fn tokenize(mut self) -> MarkupOutput {
        while self.pos < self.bytes.len() {
            self.step();
        }
        if let Some(open) = self.open_script.take() {
            self.note(open.start, "unterminated script element");
            let end = self.bytes.len();
            self.finish_script(
                open.attributes,
                CaptureMode::StructuralParse,
                open.start..end,
                open.body_start..end,
            );
        }
        tracing::debug!(
            tokens = self.out.tokens.len(),
            scripts = self.out.scripts.len(),
            notes = self.out.notes.len(),
            "markup tokenized"
        );
        self.out
    }

    fn step(&mut self) {
        if self.bytes[self.pos] == b'<' && self.markup() {
            return;
        }
        // Plain text up to the next `<` (a stray `<` is text too).
        let input = self.input;
        let start = self.pos;
        let end = self.find_from(start + 1, b"<").unwrap_or(self.bytes.len());
        self.pos = end;
        self.push_text(&input[start..end]);
    }

    fn note(&mut self, offset: usize, message: impl Into<String>) {
        self.out.notes.push(MarkupNote {
            offset,
            message: message.into(),
        });
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.bytes[self.pos..]
            .get(..prefix.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(prefix.as_bytes()))
    }

    fn find_from(&self, from: usize, needle: &[u8]) -> Option<usize> {
        self.bytes
            .get(from..)?
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|i| from + i)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_at(0).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn push_text(&mut self, raw: &str) {
        let text = decode_references(raw);
        if let Some(MarkupToken::Text { text: last }) = self.out.tokens.last_mut() {
            last.push_str(&text);
        } else {
            self.out.tokens.push(MarkupToken::Text { text });
        }
    }

    /// Try to read markup at `<`. Returns `false` if this `<` is plain text.
    fn markup(&mut self) -> bool {
        if self.starts_with("<!--") {
            self.comment();
            true
        } else if self.starts_with("<!") || self.starts_with("<?") {
            self.declaration();
            true
        } else if self.starts_with("</") && self.peek_at(2).is_some_and(|b| b.is_ascii_alphabetic()) {
            self.end_tag();
            true
        } else if self.peek_at(1).is_some_and(|b| b.is_ascii_alphabetic()) {
            self.start_tag();
            true
        } else {
            false
        }
    }

    fn comment(&mut self) {
        let start = self.pos;
        let body = start + 4;
        let (text_end, end) = match self.find_from(body, b"-->") {
            Some(close) => (close, close + 3),
            None => {
                self.note(start, "unterminated comment");
                (self.bytes.len(), self.bytes.len())
            }
        };
        self.out.tokens.push(MarkupToken::Comment {
            text: self.input[body..text_end].to_string(),
        });
        self.pos = end;
    }

    /// `<!doctype …>`, other `<!…>` and `<?…>` forms.
    fn declaration(&mut self) {
        let body = self.pos + 2;
        let (text_end, end) = match self.find_from(body, b">") {
            Some(close) => (close, close + 1),
            None => (self.bytes.len(), self.bytes.len()),
        };
        let text = &self.input[body..text_end];
        let token = match text.get(..7) {
            Some(head) if head.eq_ignore_ascii_case("doctype") => MarkupToken::Doctype {
                text: text[7..].trim().to_string(),
            },
            _ => MarkupToken::Comment {
                text: text.to_string(),
            },
        };
        self.out.tokens.push(token);
        self.pos = end;
    }

    fn tag_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek_at(0)
            .is_some_and(|b| !b.is_ascii_whitespace() && b != b'/' && b != b'>')
        {
            self.pos += 1;
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    fn end_tag(&mut self) {
        let start = self.pos;
        self.pos += 2;
        let name = self.tag_name();
        match self.find_from(self.pos, b">") {
            Some(close) => self.pos = close + 1,
            None => {
                self.note(start, "unterminated end tag");
                self.pos = self.bytes.len();
            }
        }
        if name == SCRIPT {
            if let Some(open) = self.open_script.take() {
                self.finish_script(
                    open.attributes,
                    CaptureMode::StructuralParse,
                    open.start..self.pos,
                    open.body_start..start,
                );
            }
        }
        self.out.tokens.push(MarkupToken::EndTag { name });
    }

    fn start_tag(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let name = self.tag_name();
        let mut attributes: Vec<Attribute> = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            match self.peek_at(0) {
                None => {
                    self.note(start, format!("unterminated <{name}> tag"));
                    break;
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.peek_at(1) == Some(b'>') => {
                    self_closing = true;
                    self.pos += 2;
                    break;
                }
                Some(b'/') => self.pos += 1,
                Some(_) => {
                    let attr = self.attribute();
                    // First occurrence wins.
                    if !attributes.iter().any(|a| a.name == attr.name) {
                        attributes.push(attr);
                    }
                }
            }
        }
        self.out.tokens.push(MarkupToken::StartTag {
            name: name.clone(),
            attributes: attributes.clone(),
            self_closing,
        });
        // The self-closing flag does not end a script element.
        if name == SCRIPT && self.open_script.is_none() {
            self.begin_script(attributes, start);
        }
    }

    fn attribute(&mut self) -> Attribute {
        let input = self.input;
        let start = self.pos;
        // The first byte is part of the name even if it is `=`.
        self.pos += 1;
        while self.peek_at(0).is_some_and(|b| {
            !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'=')
        }) {
            self.pos += 1;
        }
        let name = input[start..self.pos].to_ascii_lowercase();
        self.skip_whitespace();
        if self.peek_at(0) != Some(b'=') {
            return Attribute { name, value: None };
        }
        self.pos += 1;
        self.skip_whitespace();
        let raw = match self.peek_at(0) {
            Some(quote @ (b'"' | b'\'')) => {
                let body = self.pos + 1;
                match self.find_from(body, &[quote]) {
                    Some(close) => {
                        self.pos = close + 1;
                        &input[body..close]
                    }
                    None => {
                        self.note(start, format!("unterminated value for attribute '{name}'"));
                        self.pos = self.bytes.len();
                        &input[body..]
                    }
                }
            }
            _ => {
                let body = self.pos;
                while self
                    .peek_at(0)
                    .is_some_and(|b| !b.is_ascii_whitespace() && b != b'>')
                {
                    self.pos += 1;
                }
                &input[body..self.pos]
            }
        };
        Attribute {
            name,
            value: Some(decode_references(raw)),
        }
    }

    fn begin_script(&mut self, attributes: Vec<Attribute>, start: usize) {
        let declared = attribute_value(&attributes, "type");
        let mode = if self.registry.raw_capture_eligible(declared) {
            CaptureMode::RawCapture
        } else {
            CaptureMode::StructuralParse
        };
        tracing::debug!(declared = ?declared, ?mode, offset = start, "script capture decided");

        let body_start = self.pos;
        match mode {
            CaptureMode::RawCapture => {
                let (body_end, end, closed) = match find_script_close(self.bytes, body_start) {
                    Some((lt, end)) => (lt, end, true),
                    None => {
                        self.note(start, "unterminated script element");
                        (self.bytes.len(), self.bytes.len(), false)
                    }
                };
                self.out.tokens.push(MarkupToken::RawText {
                    text: self.input[body_start..body_end].to_string(),
                });
                if closed {
                    self.out.tokens.push(MarkupToken::EndTag {
                        name: SCRIPT.to_string(),
                    });
                }
                self.pos = end;
                self.finish_script(attributes, mode, start..end, body_start..body_end);
            }
            CaptureMode::StructuralParse => {
                self.open_script = Some(OpenScript {
                    attributes,
                    start,
                    body_start,
                });
            }
        }
    }

    fn finish_script(
        &mut self,
        attributes: Vec<Attribute>,
        mode: CaptureMode,
        range: Range<usize>,
        body: Range<usize>,
    ) {
        let input = self.input;
        let declared = attribute_value(&attributes, "type");
        let text = &input[body.clone()];
        let declaration = match attribute_value(&attributes, "src") {
            Some(locator) => {
                if !text.trim().is_empty() {
                    self.note(range.start, "inline script text ignored because src is set");
                }
                ScriptDeclaration::external(declared, locator)
            }
            None => ScriptDeclaration::inline(declared, text),
        };
        self.out.scripts.push(ScriptElement {
            declaration,
            attributes,
            mode,
            range,
            body,
        });
    }
}

fn attribute_value<'v>(attributes: &'v [Attribute], name: &str) -> Option<&'v str> {
    attributes
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_deref().unwrap_or(""))
}

/// Find the closing sequence of a raw-captured script body.
///
/// Returns the offset of its `<` and the offset just past its `>`.
pub fn find_script_close(bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while let Some(off) = bytes.get(i..)?.windows(2).position(|w| w == b"</") {
        let lt = i + off;
        let name_start = lt + 2;
        let name_end = name_start + SCRIPT.len();
        if bytes
            .get(name_start..name_end)
            .is_some_and(|n| n.eq_ignore_ascii_case(SCRIPT.as_bytes()))
        {
            let mut j = name_end;
            while bytes.get(j).is_some_and(|b| b.is_ascii_whitespace()) {
                j += 1;
            }
            if bytes.get(j) == Some(&b'>') {
                return Some((lt, j + 1));
            }
        }
        i = lt + 2;
    }
    None
}

// ══════════════════════════════════════════════════════════════════════════════
// Character references
// ══════════════════════════════════════════════════════════════════════════════

fn named_reference(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => return None,
    })
}

/// Decode one reference at the start of `tail` (which begins with `&`).
/// Returns the character and the number of bytes consumed.
fn decode_reference(tail: &str) -> Option<(char, usize)> {
    let semi = tail
        .bytes()
        .take(MAX_REFERENCE_LEN)
        .position(|b| b == b';')?;
    let name = &tail[1..semi];
    let ch = if let Some(num) = name.strip_prefix('#') {
        let value = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        match char::from_u32(value) {
            Some(c) if c != '\0' => c,
            _ => char::REPLACEMENT_CHARACTER,
        }
    } else {
        named_reference(name)?
    };
    Some((ch, semi + 1))
}

/// Decode character references; unknown references stay literal.
pub fn decode_references(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match decode_reference(tail) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
