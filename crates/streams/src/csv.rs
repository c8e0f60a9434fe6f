//! CSV record reader.
//!
//! Follows RFC 4180: fields may be quoted, `""` inside quotes is a literal
//! quote, quoted fields may span lines. Both LF and CRLF end a record; blank
//! lines are skipped. Records may have differing lengths; it is up to the
//! consumer to decide what a short record means.
//!
//! Fields are UTF-8 when they can be; a field that is not is decoded as
//! Windows-1252, so one legacy byte never fails the whole stream.

use std::path::Path;

use async_trait::async_trait;
use encoding_rs::WINDOWS_1252;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use treeprice_core::{RecordSource, StreamError};

use crate::reader::ByteReader;

/// Streaming [`RecordSource`] over any buffered async reader.
pub struct CsvRecordStream<R> {
    reader: ByteReader<R>,
    header: Vec<String>,
    delimiter: u8,
    records: u64,
}

impl CsvRecordStream<BufReader<File>> {
    /// Open a CSV file; the header row is read immediately.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let file = File::open(path.as_ref()).await?;
        Self::new(BufReader::new(file)).await
    }
}

impl<R: AsyncBufRead + Unpin + Send> CsvRecordStream<R> {
    /// Wrap a reader using `,` as the delimiter and read the header row.
    pub async fn new(inner: R) -> Result<Self, StreamError> {
        Self::with_delimiter(inner, b',').await
    }

    pub async fn with_delimiter(inner: R, delimiter: u8) -> Result<Self, StreamError> {
        let mut reader = ByteReader::new(inner);
        reader.skip_bom().await?;
        let mut stream = Self {
            reader,
            header: Vec::new(),
            delimiter,
            records: 0,
        };
        stream.header = stream.read_record().await?.unwrap_or_default();
        debug!(columns = stream.header.len(), "CSV header read");
        Ok(stream)
    }

    /// Number of data records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    async fn read_record(&mut self) -> Result<Option<Vec<String>>, StreamError> {
        loop {
            match self.reader.peek().await? {
                None => return Ok(None),
                Some(b'\n' | b'\r') => self.reader.bump(),
                Some(_) => break,
            }
        }

        let mut fields = Vec::new();
        loop {
            let field = if self.reader.peek().await? == Some(b'"') {
                self.quoted_field().await?
            } else {
                self.bare_field().await?
            };
            fields.push(field);

            match self.reader.peek().await? {
                Some(b) if b == self.delimiter => self.reader.bump(),
                Some(b'\n') => {
                    self.reader.bump();
                    return Ok(Some(fields));
                }
                Some(b'\r') => {
                    self.reader.bump();
                    if self.reader.peek().await? == Some(b'\n') {
                        self.reader.bump();
                    }
                    return Ok(Some(fields));
                }
                None => return Ok(Some(fields)),
                Some(_) => {
                    return Err(self.reader.syntax("extraneous character after quoted field"));
                }
            }
        }
    }

    async fn bare_field(&mut self) -> Result<String, StreamError> {
        let start = self.reader.offset();
        let mut bytes = Vec::new();
        loop {
            match self.reader.peek().await? {
                None | Some(b'\n' | b'\r') => break,
                Some(b) if b == self.delimiter => break,
                Some(b'"') => return Err(self.reader.syntax("bare '\"' in unquoted field")),
                Some(b) => {
                    bytes.push(b);
                    self.reader.bump();
                }
            }
        }
        Ok(decode_field(bytes, start))
    }

    async fn quoted_field(&mut self) -> Result<String, StreamError> {
        let start = self.reader.offset();
        self.reader.bump();
        let mut bytes = Vec::new();
        loop {
            match self.reader.next().await? {
                None => return Err(self.reader.eof()),
                Some(b'"') => {
                    if self.reader.peek().await? == Some(b'"') {
                        self.reader.bump();
                        bytes.push(b'"');
                    } else {
                        break;
                    }
                }
                Some(b) => bytes.push(b),
            }
        }
        Ok(decode_field(bytes, start))
    }
}

fn decode_field(bytes: Vec<u8>, offset: u64) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            trace!(offset, "Field is not UTF-8, decoding as Windows-1252");
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(e.as_bytes());
            text.into_owned()
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> RecordSource for CsvRecordStream<R> {
    fn header(&self) -> &[String] {
        &self.header
    }

    async fn next_record(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<String>>, StreamError> {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        let record = self.read_record().await?;
        if record.is_some() {
            self.records += 1;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(input: &str) -> Result<(Vec<String>, Vec<Vec<String>>), StreamError> {
        read_bytes(input.as_bytes()).await
    }

    async fn read_bytes(input: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>), StreamError> {
        let cancel = CancellationToken::new();
        let mut stream = CsvRecordStream::new(input).await?;
        let mut records = Vec::new();
        while let Some(record) = stream.next_record(&cancel).await? {
            records.push(record);
        }
        Ok((stream.header().to_vec(), records))
    }

    #[tokio::test]
    async fn reads_header_and_records() {
        let (header, records) = read_all("col1,col2\nval1,val2\nval3,val4\n").await.unwrap();
        assert_eq!(header, ["col1", "col2"]);
        assert_eq!(records, [["val1", "val2"], ["val3", "val4"]]);
    }

    #[tokio::test]
    async fn handles_quotes_crlf_and_blank_lines() {
        let input = "\u{feff}Street Name,Price\r\n\"Main St, Upper\",\"€100,000.00\"\r\n\r\n\"Say \"\"hi\"\"\",\"multi\nline\"";
        let (header, records) = read_all(input).await.unwrap();
        assert_eq!(header, ["Street Name", "Price"]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], ["Main St, Upper", "€100,000.00"]);
        assert_eq!(records[1], ["Say \"hi\"", "multi\nline"]);
    }

    #[tokio::test]
    async fn keeps_empty_fields_and_ragged_rows() {
        let (_, records) = read_all("a,b,c\n1,,3\n4\n").await.unwrap();
        assert_eq!(records, [vec!["1", "", "3"], vec!["4"]]);
    }

    #[tokio::test]
    async fn legacy_bytes_decode_per_field() {
        let input = b"Address,Street Name,Price\n1 Caf\xe9 Rd,a,\x80100\n2 Main St,b,\"\x80200\"\n";
        let (header, records) = read_bytes(input).await.unwrap();
        assert_eq!(header, ["Address", "Street Name", "Price"]);
        assert_eq!(
            records,
            [["1 Café Rd", "a", "€100"], ["2 Main St", "b", "€200"]]
        );
    }

    #[tokio::test]
    async fn empty_input_has_empty_header() {
        let (header, records) = read_all("").await.unwrap();
        assert!(header.is_empty());
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn custom_delimiter() {
        let cancel = CancellationToken::new();
        let mut stream = CsvRecordStream::with_delimiter("a;b\n1;2\n".as_bytes(), b';')
            .await
            .unwrap();
        assert_eq!(stream.header(), ["a", "b"]);
        assert_eq!(stream.next_record(&cancel).await.unwrap().unwrap(), ["1", "2"]);
        assert_eq!(stream.records_read(), 1);
    }

    #[tokio::test]
    async fn malformed_quoting_is_a_syntax_error() {
        let err = read_all("a,b\n\"x\"y,2\n").await.unwrap_err();
        assert!(matches!(err, StreamError::Syntax { .. }));
        let err = read_all("a,b\nx\"y,2\n").await.unwrap_err();
        assert!(matches!(err, StreamError::Syntax { .. }));
        let err = read_all("a,b\n\"open,2\n").await.unwrap_err();
        assert!(matches!(err, StreamError::UnexpectedEof { .. }));
    }

    #[tokio::test]
    async fn honours_cancellation() {
        let cancel = CancellationToken::new();
        let mut stream = CsvRecordStream::new("a\n1\n".as_bytes()).await.unwrap();
        cancel.cancel();
        assert!(matches!(
            stream.next_record(&cancel).await,
            Err(StreamError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn opens_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "Street Name,Price\nelm,1\n").unwrap();
        let stream = CsvRecordStream::open(&path).await.unwrap();
        assert_eq!(stream.header(), ["Street Name", "Price"]);
    }
}
