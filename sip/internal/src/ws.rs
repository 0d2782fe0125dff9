use nom::IResult;

/// A tuple of parsers which are run in sequence with whitespace skipped before each one.
pub trait WsSeq<'i, O, E> {
    fn parse_seq(&mut self, i: &'i str) -> IResult<&'i str, O, E>;
}

/// Run a tuple of parsers, skipping ascii whitespace in front of every element
#[inline]
pub fn ws<'i, O, E, S>(mut seq: S) -> impl FnMut(&'i str) -> IResult<&'i str, O, E>
where
    S: WsSeq<'i, O, E>,
{
    move |i| seq.parse_seq(i)
}

fn skip_whitespace(i: &str) -> &str {
    i.trim_start_matches(|c: char| c.is_ascii_whitespace())
}

macro_rules! impl_ws_seq {
    ($($parser:ident $out:ident),+) => {
        impl<'i, E, $($out, $parser,)+> WsSeq<'i, ($($out,)+), E> for ($($parser,)+)
        where
            $($parser: FnMut(&'i str) -> IResult<&'i str, $out, E>,)+
        {
            #[allow(non_snake_case)]
            fn parse_seq(&mut self, i: &'i str) -> IResult<&'i str, ($($out,)+), E> {
                let ($($parser,)+) = self;

                $(
                let (i, $out) = $parser(skip_whitespace(i))?;
                )+

                Ok((i, ($($out,)+)))
            }
        }
    };
}

impl_ws_seq!(P1 O1);
impl_ws_seq!(P1 O1, P2 O2);
impl_ws_seq!(P1 O1, P2 O2, P3 O3);
impl_ws_seq!(P1 O1, P2 O2, P3 O3, P4 O4);
impl_ws_seq!(P1 O1, P2 O2, P3 O3, P4 O4, P5 O5);
impl_ws_seq!(P1 O1, P2 O2, P3 O3, P4 O4, P5 O5, P6 O6);
impl_ws_seq!(P1 O1, P2 O2, P3 O3, P4 O4, P5 O5, P6 O6, P7 O7);
impl_ws_seq!(P1 O1, P2 O2, P3 O3, P4 O4, P5 O5, P6 O6, P7 O7, P8 O8);
