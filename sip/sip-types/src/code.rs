use std::fmt;
use std::str::FromStr;

/// SIP response status code
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Code(u16);

/// Class of a [`Code`]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CodeKind {
    /// 1xx
    Provisional,
    /// 2xx
    Success,
    /// 3xx
    Redirection,
    /// 4xx
    RequestFailure,
    /// 5xx
    ServerFailure,
    /// 6xx
    GlobalFailure,
    /// Everything outside of 100..=699
    Custom,
}

impl Code {
    /// Returns the [`CodeKind`] of the code
    ///
    /// ```
    /// use rcse_sip_types::{Code, CodeKind};
    ///
    /// assert_eq!(Code::from(487).kind(), CodeKind::RequestFailure);
    /// ```
    pub fn kind(self) -> CodeKind {
        match self.0 {
            100..=199 => CodeKind::Provisional,
            200..=299 => CodeKind::Success,
            300..=399 => CodeKind::Redirection,
            400..=499 => CodeKind::RequestFailure,
            500..=599 => CodeKind::ServerFailure,
            600..=699 => CodeKind::GlobalFailure,
            _ => CodeKind::Custom,
        }
    }

    /// Anything but a 1xx code terminates a transaction
    pub fn is_final(self) -> bool {
        self.kind() != CodeKind::Provisional
    }

    pub fn into_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Some(text) => write!(f, "Code({} {})", self.0, text),
            None => write!(f, "Code({})", self.0),
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Code {
    fn from(code: u16) -> Self {
        Code(code)
    }
}

impl FromStr for Code {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Code)
    }
}

macro_rules! status_codes {
    ($($(#[$doc:meta])* $code:literal $konst:ident $text:literal;)*) => {
        impl Code {
            $(
            $(#[$doc])*
            pub const $konst: Code = Code($code);
            )*

            /// Default reason phrase of a well known code
            pub fn text(self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some($text),)*
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    /// [RFC3261 21.1.1](https://tools.ietf.org/html/rfc3261#section-21.1.1)
    100 TRYING "Trying";
    /// [RFC3261 21.1.2](https://tools.ietf.org/html/rfc3261#section-21.1.2)
    180 RINGING "Ringing";
    183 SESSION_PROGRESS "Session Progress";

    200 OK "OK";
    202 ACCEPTED "Accepted";

    400 BAD_REQUEST "Bad Request";
    /// Challenge issued by the registrar or user agent server
    401 UNAUTHORIZED "Unauthorized";
    403 FORBIDDEN "Forbidden";
    404 NOT_FOUND "Not Found";
    405 METHOD_NOT_ALLOWED "Method Not Allowed";
    /// Challenge issued by a proxy
    407 PROXY_AUTHENTICATION_REQUIRED "Proxy Authentication Required";
    408 REQUEST_TIMEOUT "Request Timeout";
    415 UNSUPPORTED_MEDIA_TYPE "Unsupported Media Type";
    480 TEMPORARILY_UNAVAILABLE "Temporarily Unavailable";
    481 CALL_OR_TRANSACTION_DOES_NOT_EXIST "Call/Transaction Does Not Exist";
    486 BUSY_HERE "Busy Here";
    487 REQUEST_TERMINATED "Request Terminated";
    488 NOT_ACCEPTABLE_HERE "Not Acceptable Here";

    500 SERVER_INTERNAL_ERROR "Server Internal Error";
    501 NOT_IMPLEMENTED "Not Implemented";
    503 SERVICE_UNAVAILABLE "Service Unavailable";

    600 BUSY_EVERYWHERE "Busy Everywhere";
    /// [RFC3261 21.6.2](https://tools.ietf.org/html/rfc3261#section-21.6.2)
    603 DECLINE "Decline";
    604 DOES_NOT_EXIST_ANYWHERE "Does Not Exist Anywhere";
    /// [RFC3261 21.6.4](https://tools.ietf.org/html/rfc3261#section-21.6.4)
    606 NOT_ACCEPTABLE "Not Acceptable";
}
