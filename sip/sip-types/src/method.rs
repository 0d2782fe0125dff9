use bytes::Bytes;
use bytesstr::BytesStr;
use internal::IResult;
use nom::bytes::complete::take_while1;
use nom::combinator::map;
use std::fmt;

/// SIP request method
///
/// ```
/// use rcse_sip_types::Method;
///
/// assert_eq!(Method::INVITE.to_string(), "INVITE");
/// assert_eq!(Method::from("PUBLISH").to_string(), "PUBLISH");
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Method(Repr);

macro_rules! methods {
    ($($konst:ident)+) => {
        #[derive(Debug, Clone, Eq, PartialEq, Hash)]
        #[allow(clippy::upper_case_acronyms)]
        enum Repr {
            $($konst,)+
            Other(BytesStr),
        }

        impl Method {
            $(pub const $konst: Method = Method(Repr::$konst);)+

            fn known(s: &str) -> Option<Self> {
                $(
                if s.eq_ignore_ascii_case(stringify!($konst)) {
                    return Some(Method(Repr::$konst));
                }
                )+

                None
            }

            pub fn as_str(&self) -> &str {
                match &self.0 {
                    $(Repr::$konst => stringify!($konst),)+
                    Repr::Other(other) => other.as_str(),
                }
            }
        }
    };
}

methods! {
    INVITE ACK CANCEL BYE OPTIONS MESSAGE UPDATE REGISTER PRACK INFO
}

impl Method {
    pub(crate) fn from_parse(src: &Bytes, s: &str) -> Self {
        Self::known(s).unwrap_or_else(|| Method(Repr::Other(BytesStr::from_parse(src, s))))
    }

    pub fn parse(src: &Bytes) -> impl Fn(&str) -> IResult<&str, Self> + '_ {
        move |i| map(take_while1(internal::token), |m| Self::from_parse(src, m))(i)
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        Self::known(s).unwrap_or_else(|| Method(Repr::Other(BytesStr::from(s))))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_known_and_other() {
        let src = Bytes::from_static(b"invite PUBLISH");
        let s = std::str::from_utf8(&src).unwrap();

        let (rem, method) = Method::parse(&src)(s).unwrap();
        assert_eq!(method, Method::INVITE);
        assert_eq!(rem, " PUBLISH");

        let (_, method) = Method::parse(&src)(rem.trim_start()).unwrap();
        assert_eq!(method.as_str(), "PUBLISH");
    }
}
