//! Parser helpers shared by the rcse crates.

mod ws;

pub type IResult<I, O> = nom::IResult<I, O, nom::error::VerboseError<I>>;
pub use nom::Finish;
use nom::error::VerboseError;
pub use ws::{WsSeq, ws};

/// Detach a [`VerboseError`] from the input it borrows so it can be stored inside error types.
pub fn verbose_error_to_owned(i: VerboseError<&str>) -> VerboseError<String> {
    VerboseError {
        errors: i
            .errors
            .into_iter()
            .map(|(input, kind)| (input.to_owned(), kind))
            .collect(),
    }
}

/// Parser which consumes the complete remaining input.
pub fn rest<E>() -> impl Fn(&str) -> nom::IResult<&str, &str, E> {
    |i| Ok(("", i))
}

/// Returns if `c` may appear inside a token (RFC3261 section 25.1)
pub fn token(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '.' | '!' | '%' | '*' | '_' | '`' | '\'' | '~' | '+'
        )
}

#[cfg(test)]
mod test {
    use super::*;
    use nom::bytes::complete::{tag, take_while1};
    use nom::character::complete::digit1;

    #[test]
    fn ws_skips_leading_whitespace() {
        let res: IResult<&str, _> = ws((tag("CSeq:"), digit1, take_while1(token)))("  CSeq:  12 \tINVITE");

        let (rem, (_, num, method)) = res.unwrap();
        assert_eq!(num, "12");
        assert_eq!(method, "INVITE");
        assert!(rem.is_empty());
    }

    #[test]
    fn rest_takes_everything() {
        let res: IResult<&str, &str> = rest()("abc def");
        assert_eq!(res.unwrap(), ("", "abc def"));
    }
}
