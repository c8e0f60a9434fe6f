use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use treeprice_core::StreamError;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Single-byte lookahead over a buffered async reader, tracking the offset
/// for error messages.
pub(crate) struct ByteReader<R> {
    inner: R,
    offset: u64,
}

impl<R: AsyncBufRead + Unpin + Send> ByteReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) async fn peek(&mut self) -> Result<Option<u8>, StreamError> {
        let buf = self.inner.fill_buf().await?;
        Ok(buf.first().copied())
    }

    /// Consume the byte returned by the last successful [`peek`](Self::peek).
    pub(crate) fn bump(&mut self) {
        self.inner.consume(1);
        self.offset += 1;
    }

    pub(crate) async fn next(&mut self) -> Result<Option<u8>, StreamError> {
        let byte = self.peek().await?;
        if byte.is_some() {
            self.bump();
        }
        Ok(byte)
    }

    /// Skip a leading UTF-8 byte order mark, if present.
    pub(crate) async fn skip_bom(&mut self) -> Result<(), StreamError> {
        let buf = self.inner.fill_buf().await?;
        if buf.starts_with(&UTF8_BOM) {
            self.inner.consume(UTF8_BOM.len());
            self.offset += UTF8_BOM.len() as u64;
        }
        Ok(())
    }

    pub(crate) fn syntax(&self, message: impl Into<String>) -> StreamError {
        StreamError::Syntax {
            offset: self.offset,
            message: message.into(),
        }
    }

    pub(crate) fn eof(&self) -> StreamError {
        StreamError::UnexpectedEof {
            offset: self.offset,
        }
    }
}
