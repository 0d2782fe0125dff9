use crate::Name;
use crate::header::text_header;

text_header!(
    /// `Call-ID` header, identifies a dialog together with the tags of From and To
    CallID,
    Name::CALL_ID
);

#[cfg(test)]
mod test {
    use super::*;
    use crate::Headers;

    #[test]
    fn call_id_compact() {
        let mut headers = Headers::new();
        headers.insert("i", " a84b4c76e66710@pc33.atlanta.com ");

        let call_id: CallID = headers.get_named().unwrap();
        assert_eq!(call_id.0, "a84b4c76e66710@pc33.atlanta.com");
    }
}
