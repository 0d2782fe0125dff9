use sip_types::Code;
use sip_types::header::HeaderError;
use std::{fmt, io};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error returned by the endpoint and the transaction manager.
///
/// Carries the status code that should be used when the error is turned into a response.
#[derive(Debug)]
pub struct Error {
    pub status: Code,
    pub error: Option<anyhow::Error>,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}, {error}", self.status),
            None => fmt::Display::fmt(&self.status, f),
        }
    }
}

impl Error {
    pub fn new(status: Code) -> Self {
        Self {
            status,
            error: None,
        }
    }

    /// The request did not receive a final response in time
    pub fn request_timed_out() -> Self {
        Self::new(Code::REQUEST_TIMEOUT)
    }

    pub fn is_timeout(&self) -> bool {
        self.status == Code::REQUEST_TIMEOUT
    }
}

impl From<Code> for Error {
    fn from(status: Code) -> Self {
        Self::new(status)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self {
            status: Code::SERVICE_UNAVAILABLE,
            error: Some(e.into()),
        }
    }
}

impl From<HeaderError> for Error {
    fn from(e: HeaderError) -> Self {
        Self {
            status: Code::BAD_REQUEST,
            error: Some(e.into()),
        }
    }
}

/// Attach a status code to any error
pub trait WithStatus<T> {
    fn status(self, status: Code) -> Result<T>;
}

impl<T, E> WithStatus<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn status(self, status: Code) -> Result<T> {
        self.map_err(|e| Error {
            status,
            error: Some(e.into()),
        })
    }
}

impl<T> WithStatus<T> for Option<T> {
    fn status(self, status: Code) -> Result<T> {
        self.ok_or_else(|| Error::new(status))
    }
}

/// Return early with an [`Error`] carrying the given status code
#[macro_export]
macro_rules! bail_status {
    ($status:expr) => {
        return Err($crate::Error::new($status))
    };
    ($status:expr, $($arg:tt)+) => {
        return Err($crate::Error {
            status: $status,
            error: Some($crate::anyhow::anyhow!($($arg)+)),
        })
    };
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_port(s: &str) -> Result<u16> {
        if s.is_empty() {
            bail_status!(Code::BAD_REQUEST);
        }

        s.parse::<u16>().status(Code::BAD_REQUEST)
    }

    #[test]
    fn status_attached() {
        assert_eq!(parse_port("").unwrap_err().status, Code::BAD_REQUEST);
        assert_eq!(parse_port("x").unwrap_err().status, Code::BAD_REQUEST);
        assert_eq!(parse_port("5060").unwrap(), 5060);

        let e = None::<()>.status(Code::NOT_FOUND).unwrap_err();
        assert_eq!(e.status, Code::NOT_FOUND);
        assert!(e.error.is_none());
    }

    #[test]
    fn timeout() {
        assert!(Error::request_timed_out().is_timeout());
        assert!(!Error::new(Code::BUSY_HERE).is_timeout());
    }
}
