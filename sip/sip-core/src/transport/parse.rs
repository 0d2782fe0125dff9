use bytes::Bytes;
use internal::{Finish, verbose_error_to_owned};
use sip_types::header::typed::ContentLength;
use sip_types::msg::{Line, MessageLine, PullParser};
use sip_types::Headers;
use std::str::{Utf8Error, from_utf8};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("message contains invalid utf8")]
    Utf8(#[from] Utf8Error),
    #[error("message head is incomplete")]
    Incomplete,
    #[error("malformed message line, {0}")]
    Malformed(String),
    #[error("invalid content-length")]
    ContentLength,
}

/// Parse a complete message contained in `buffer`.
///
/// The body is bounded by `Content-Length` if present, else it spans the rest of the buffer.
pub(crate) fn parse_message(buffer: Bytes) -> Result<(MessageLine, Headers, Bytes), ParseError> {
    let mut parser = PullParser::new(&buffer, 0);

    let first = match parser.next() {
        Some(Ok(line)) => from_utf8(line)?,
        _ => return Err(ParseError::Incomplete),
    };

    let (_, message_line) = MessageLine::parse(&buffer, first)
        .finish()
        .map_err(|e| ParseError::Malformed(verbose_error_to_owned(e).to_string()))?;

    let mut headers = Headers::with_capacity(12);

    for line in &mut parser {
        let line = from_utf8(line.map_err(|_| ParseError::Incomplete)?)?;

        match Line::parse(&buffer, line).finish() {
            Ok((_, line)) => headers.insert(line.name, line.value),
            Err(e) => {
                log::debug!("skipping malformed header line {line:?}, {e:?}");
            }
        }
    }

    let head_end = parser.head_end();
    let available = buffer.len() - head_end;

    let body_len = match headers.try_get_named::<ContentLength>() {
        Some(Ok(ContentLength(len))) if len <= available => len,
        Some(_) => return Err(ParseError::ContentLength),
        None => available,
    };

    let body = buffer.slice(head_end..head_end + body_len);

    Ok((message_line, headers, body))
}
