//! Source traits — the abstraction over the two raw inputs.
//!
//! A [`TokenSource`] yields primitive document tokens for the classifier;
//! a [`RecordSource`] yields tabular records for the attribute parser. Both
//! are finite, not restartable, and check cancellation before every read.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;

/// Kind of a structural token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    Object,
    Array,
}

/// A scalar leaf that carries no grouping information.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    String(String),
    Bool(bool),
    Null,
}

/// A primitive document token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `{` or `[`
    Open(Structure),
    /// `}` or `]`
    Close(Structure),
    /// An object member name.
    Key(String),
    /// A number leaf, kept as its raw lexeme.
    Number(String),
    Other(Leaf),
}

/// A lazy, cancellable sequence of document tokens.
#[async_trait]
pub trait TokenSource: Send {
    /// Next token, or `None` at a clean end of input.
    async fn next_token(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Token>, StreamError>;
}

/// A header followed by a sequence of records.
#[async_trait]
pub trait RecordSource: Send {
    /// Column names, read once when the source was opened.
    fn header(&self) -> &[String];

    /// Next record, or `None` at end of input.
    async fn next_record(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<String>>, StreamError>;
}

/// In-memory token source, mostly for tests and fixtures.
#[async_trait]
impl TokenSource for std::vec::IntoIter<Token> {
    async fn next_token(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Token>, StreamError> {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        Ok(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vec_token_source_yields_then_ends() {
        let cancel = CancellationToken::new();
        let mut source = vec![Token::Open(Structure::Object), Token::Close(Structure::Object)]
            .into_iter();
        assert_eq!(
            source.next_token(&cancel).await.unwrap(),
            Some(Token::Open(Structure::Object))
        );
        assert!(source.next_token(&cancel).await.unwrap().is_some());
        assert!(source.next_token(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn vec_token_source_honours_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut source = vec![Token::Key("a".into())].into_iter();
        assert!(matches!(
            source.next_token(&cancel).await,
            Err(StreamError::Cancelled)
        ));
    }
}
