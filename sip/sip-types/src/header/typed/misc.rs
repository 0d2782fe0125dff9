use crate::Name;
use crate::header::{from_str_header, text_header};

from_str_header!(
    /// `Max-Forwards` header
    MaxForwards,
    Name::MAX_FORWARDS,
    u32
);

from_str_header!(
    /// `Content-Length` header, the size of the body in bytes
    ContentLength,
    Name::CONTENT_LENGTH,
    usize
);

from_str_header!(Expires, Name::EXPIRES, u32);

text_header!(
    /// `Content-Type` header, the MIME type of the body
    ContentType,
    Name::CONTENT_TYPE
);

text_header!(UserAgent, Name::USER_AGENT);

text_header!(Server, Name::SERVER);

text_header!(Subject, Name::SUBJECT);

impl ContentType {
    /// Compares the media type ignoring case and parameters
    pub fn is(&self, mime: &str) -> bool {
        self.0
            .split(';')
            .next()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case(mime))
    }
}
