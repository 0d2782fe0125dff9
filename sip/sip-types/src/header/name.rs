use bytesstr::BytesStr;
use std::fmt;
use std::mem::discriminant;

/// Case-insensitive SIP header name, used as key inside [`Headers`](crate::Headers).
///
/// Well known names are constants. Compact forms (e.g. `i` for `Call-ID`) parse into the same constant,
/// every other name is kept as written.
#[derive(Debug, Clone)]
pub struct Name(Repr);

macro_rules! header_names {
    ($($(#[$doc:meta])* $konst:ident $print:literal $(| $compact:literal)?;)+) => {
        #[derive(Debug, Clone)]
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        enum Repr {
            $($konst,)+
            Unknown(BytesStr),
        }

        impl Name {
            $(
            $(#[$doc])*
            pub const $konst: Name = Name(Repr::$konst);
            )+

            fn lookup(s: &str) -> Option<Name> {
                $(
                if s.eq_ignore_ascii_case($print) $(|| s.eq_ignore_ascii_case($compact))? {
                    return Some(Name::$konst);
                }
                )+

                None
            }

            /// The canonical spelling used when printing
            pub fn as_print_str(&self) -> &str {
                match &self.0 {
                    $(Repr::$konst => $print,)+
                    Repr::Unknown(name) => name.as_str(),
                }
            }
        }
    };
}

header_names! {
    /// [RFC3261 20.1](https://tools.ietf.org/html/rfc3261#section-20.1)
    ACCEPT "Accept";
    /// [RFC3841 9.2](https://tools.ietf.org/html/rfc3841#section-9.2)
    ACCEPT_CONTACT "Accept-Contact" | "a";
    ALLOW "Allow";
    /// [RFC3261 20.6](https://tools.ietf.org/html/rfc3261#section-20.6)
    AUTHENTICATION_INFO "Authentication-Info";
    AUTHORIZATION "Authorization";
    CALL_ID "Call-ID" | "i";
    CONTACT "Contact" | "m";
    CONTENT_LENGTH "Content-Length" | "l";
    CONTENT_TYPE "Content-Type" | "c";
    CSEQ "CSeq";
    EXPIRES "Expires";
    FROM "From" | "f";
    MAX_FORWARDS "Max-Forwards";
    /// [RFC3325 9.1](https://tools.ietf.org/html/rfc3325#section-9.1)
    P_ASSERTED_IDENTITY "P-Asserted-Identity";
    P_PREFERRED_IDENTITY "P-Preferred-Identity";
    PROXY_AUTHENTICATE "Proxy-Authenticate";
    PROXY_AUTHORIZATION "Proxy-Authorization";
    RECORD_ROUTE "Record-Route";
    REQUIRE "Require";
    ROUTE "Route";
    SERVER "Server";
    SUBJECT "Subject" | "s";
    SUPPORTED "Supported" | "k";
    TO "To" | "t";
    USER_AGENT "User-Agent";
    VIA "Via" | "v";
    WWW_AUTHENTICATE "WWW-Authenticate";
}

impl Name {
    /// Name that is not one of the constants. Still compares case-insensitively.
    pub const fn unknown(name: BytesStr) -> Self {
        Name(Repr::Unknown(name))
    }

    pub fn from_bytesstr(name: BytesStr) -> Self {
        Self::lookup(name.as_str()).unwrap_or(Name(Repr::Unknown(name)))
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self::lookup(name).unwrap_or_else(|| Name(Repr::Unknown(BytesStr::from(name))))
    }
}

impl From<BytesStr> for Name {
    fn from(name: BytesStr) -> Self {
        Self::from_bytesstr(name)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Unknown(a), Repr::Unknown(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => discriminant(a) == discriminant(b),
        }
    }
}

impl Eq for Name {}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        *self == Name::from(other)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_print_str())
    }
}
