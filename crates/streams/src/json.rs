//! Incremental JSON tokenizer.
//!
//! Emits one [`Token`] per call and validates the grammar as it goes:
//! brackets must match, members need a `:` and are separated by `,`, strings
//! and numbers must be well formed. Object member names come out as
//! [`Token::Key`]; string values come out as [`Leaf::String`]. Several
//! whitespace-separated top-level values are accepted.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use treeprice_core::{Leaf, StreamError, Structure, Token, TokenSource};

use crate::reader::ByteReader;

/// What the grammar allows next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    ValueOrClose,
    Key,
    KeyOrClose,
    Colon,
    CommaOrClose,
    /// A top-level value just ended.
    Done,
}

/// Streaming [`TokenSource`] over any buffered async reader.
pub struct JsonTokenStream<R> {
    reader: ByteReader<R>,
    stack: Vec<Structure>,
    expect: Expect,
    started: bool,
}

impl JsonTokenStream<BufReader<File>> {
    /// Open a JSON file for streaming.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let file = File::open(path.as_ref()).await?;
        debug!(path = %path.as_ref().display(), "JSON document opened");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin + Send> JsonTokenStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: ByteReader::new(inner),
            stack: Vec::new(),
            expect: Expect::Value,
            started: false,
        }
    }

    /// Current nesting depth of the tokenizer itself.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    async fn read_token(&mut self) -> Result<Option<Token>, StreamError> {
        if !self.started {
            self.reader.skip_bom().await?;
            self.started = true;
        }

        loop {
            self.skip_whitespace().await?;
            let Some(byte) = self.reader.peek().await? else {
                return if self.stack.is_empty() && matches!(self.expect, Expect::Value | Expect::Done) {
                    Ok(None)
                } else {
                    Err(self.reader.eof())
                };
            };

            match self.expect {
                Expect::Colon => {
                    if byte != b':' {
                        return Err(self.reader.syntax("expected ':' after object key"));
                    }
                    self.reader.bump();
                    self.expect = Expect::Value;
                }
                Expect::CommaOrClose => match byte {
                    b',' => {
                        self.reader.bump();
                        self.expect = match self.stack.last() {
                            Some(Structure::Object) => Expect::Key,
                            _ => Expect::Value,
                        };
                    }
                    b'}' | b']' => return self.close(byte).map(Some),
                    _ => return Err(self.reader.syntax("expected ',' or closing bracket")),
                },
                Expect::KeyOrClose => match byte {
                    b'}' => return self.close(byte).map(Some),
                    b'"' => return self.key().await.map(Some),
                    _ => return Err(self.reader.syntax("expected object key or '}'")),
                },
                Expect::Key => {
                    if byte != b'"' {
                        return Err(self.reader.syntax("expected object key"));
                    }
                    return self.key().await.map(Some);
                }
                Expect::ValueOrClose if byte == b']' => return self.close(byte).map(Some),
                Expect::ValueOrClose | Expect::Value | Expect::Done => {
                    return self.value(byte).await.map(Some);
                }
            }
        }
    }

    async fn skip_whitespace(&mut self) -> Result<(), StreamError> {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.reader.peek().await? {
            self.reader.bump();
        }
        Ok(())
    }

    fn after_value(&mut self) {
        self.expect = if self.stack.is_empty() {
            Expect::Done
        } else {
            Expect::CommaOrClose
        };
    }

    fn close(&mut self, byte: u8) -> Result<Token, StreamError> {
        let found = if byte == b'}' {
            Structure::Object
        } else {
            Structure::Array
        };
        match self.stack.pop() {
            Some(open) if open == found => {
                self.reader.bump();
                self.after_value();
                Ok(Token::Close(found))
            }
            _ => Err(self.reader.syntax(format!("unmatched '{}'", byte as char))),
        }
    }

    async fn key(&mut self) -> Result<Token, StreamError> {
        let name = self.string().await?;
        self.expect = Expect::Colon;
        Ok(Token::Key(name))
    }

    async fn value(&mut self, byte: u8) -> Result<Token, StreamError> {
        match byte {
            b'{' => {
                self.reader.bump();
                self.stack.push(Structure::Object);
                self.expect = Expect::KeyOrClose;
                Ok(Token::Open(Structure::Object))
            }
            b'[' => {
                self.reader.bump();
                self.stack.push(Structure::Array);
                self.expect = Expect::ValueOrClose;
                Ok(Token::Open(Structure::Array))
            }
            b'"' => {
                let text = self.string().await?;
                self.after_value();
                Ok(Token::Other(Leaf::String(text)))
            }
            b't' => self.literal("true", Leaf::Bool(true)).await,
            b'f' => self.literal("false", Leaf::Bool(false)).await,
            b'n' => self.literal("null", Leaf::Null).await,
            b'-' | b'0'..=b'9' => self.number().await,
            other => Err(self
                .reader
                .syntax(format!("unexpected character '{}'", other.escape_ascii()))),
        }
    }

    async fn literal(&mut self, word: &'static str, leaf: Leaf) -> Result<Token, StreamError> {
        for expected in word.bytes() {
            match self.reader.next().await? {
                Some(b) if b == expected => {}
                Some(_) => return Err(self.reader.syntax(format!("invalid literal, expected '{word}'"))),
                None => return Err(self.reader.eof()),
            }
        }
        self.after_value();
        Ok(Token::Other(leaf))
    }

    async fn number(&mut self) -> Result<Token, StreamError> {
        let start = self.reader.offset();
        let mut lexeme = Vec::new();
        while let Some(b @ (b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')) = self.reader.peek().await? {
            lexeme.push(b);
            self.reader.bump();
        }
        if !is_json_number(&lexeme) {
            return Err(StreamError::Syntax {
                offset: start,
                message: format!("invalid number '{}'", lexeme.escape_ascii()),
            });
        }
        self.after_value();
        // Only ASCII bytes were collected.
        Ok(Token::Number(String::from_utf8_lossy(&lexeme).into_owned()))
    }

    /// Read a quoted string; the reader is positioned on the opening quote.
    async fn string(&mut self) -> Result<String, StreamError> {
        let start = self.reader.offset();
        self.reader.bump();
        let mut bytes = Vec::new();
        loop {
            match self.reader.next().await? {
                None => return Err(self.reader.eof()),
                Some(b'"') => break,
                Some(b'\\') => self.escape(&mut bytes).await?,
                Some(b) if b < 0x20 => {
                    return Err(self.reader.syntax("control character in string"));
                }
                Some(b) => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| StreamError::InvalidUtf8 { offset: start })
    }

    async fn escape(&mut self, out: &mut Vec<u8>) -> Result<(), StreamError> {
        let Some(byte) = self.reader.next().await? else {
            return Err(self.reader.eof());
        };
        let decoded = match byte {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => self.unicode_escape().await?,
            other => {
                return Err(self
                    .reader
                    .syntax(format!("invalid escape '\\{}'", other.escape_ascii())));
            }
        };
        let mut utf8 = [0u8; 4];
        out.extend_from_slice(decoded.encode_utf8(&mut utf8).as_bytes());
        Ok(())
    }

    async fn unicode_escape(&mut self) -> Result<char, StreamError> {
        let high = self.hex4().await?;
        if !(0xD800..0xDC00).contains(&high) {
            return Ok(char::from_u32(u32::from(high)).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        // High surrogate: a low surrogate escape must follow.
        if self.reader.peek().await? != Some(b'\\') {
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        self.reader.bump();
        if self.reader.next().await? != Some(b'u') {
            return Err(self.reader.syntax("expected low surrogate escape"));
        }
        let low = self.hex4().await?;
        if !(0xDC00..0xE000).contains(&low) {
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        let code = 0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    async fn hex4(&mut self) -> Result<u16, StreamError> {
        let mut value = 0u16;
        for _ in 0..4 {
            let Some(byte) = self.reader.next().await? else {
                return Err(self.reader.eof());
            };
            let digit = (byte as char)
                .to_digit(16)
                .ok_or_else(|| self.reader.syntax("invalid hex digit in \\u escape"))?;
            value = value * 16 + digit as u16;
        }
        Ok(value)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TokenSource for JsonTokenStream<R> {
    async fn next_token(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Token>, StreamError> {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        self.read_token().await
    }
}

/// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
fn is_json_number(s: &[u8]) -> bool {
    let digits = |i: &mut usize| {
        let start = *i;
        while s.get(*i).is_some_and(u8::is_ascii_digit) {
            *i += 1;
        }
        *i > start
    };

    let mut i = 0;
    if s.first() == Some(&b'-') {
        i += 1;
    }
    match s.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            digits(&mut i);
        }
        _ => return false,
    }
    if s.get(i) == Some(&b'.') {
        i += 1;
        if !digits(&mut i) {
            return false;
        }
    }
    if matches!(s.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(s.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        if !digits(&mut i) {
            return false;
        }
    }
    i == s.len()
}
