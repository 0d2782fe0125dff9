use crate::header::csv_header;
use crate::{Method, Name};
use bytesstr::BytesStr;

csv_header!(
    /// Entry of the `Accept` header, a MIME type
    Accept,
    BytesStr,
    Name::ACCEPT
);

csv_header!(
    /// Entry of the `Allow` header
    Allow,
    Method,
    Name::ALLOW
);

csv_header!(Supported, BytesStr, Name::SUPPORTED);

csv_header!(Require, BytesStr, Name::REQUIRE);
