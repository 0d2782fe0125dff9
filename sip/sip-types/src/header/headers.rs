use super::{ConstNamed, DecodeValues, HeaderError};
use crate::header::name::Name;
use bytesstr::BytesStr;
use std::fmt;

/// Order preserving multimap of header values keyed by [`Name`].
///
/// Every value is stored as written. Typed headers are decoded on access
/// and encoded through their [`Display`](fmt::Display) implementation on insert.
#[derive(Debug, Default, Clone)]
pub struct Headers {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    name: Name,
    value: BytesStr,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.iter().any(|e| &e.name == name)
    }

    /// Append a raw value
    pub fn insert(&mut self, name: impl Into<Name>, value: impl Into<BytesStr>) {
        self.entries.push(Entry {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Insert a raw value in front of all other values with the same name.
    ///
    /// Used for `Via` and `Route` where the topmost value has meaning.
    pub fn insert_front(&mut self, name: impl Into<Name>, value: impl Into<BytesStr>) {
        let name = name.into();
        let idx = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .unwrap_or(0);

        self.entries.insert(
            idx,
            Entry {
                name,
                value: value.into(),
            },
        );
    }

    pub fn insert_named<H: ConstNamed + fmt::Display>(&mut self, header: &H) {
        self.insert_type(H::NAME, header)
    }

    pub fn insert_named_front<H: ConstNamed + fmt::Display>(&mut self, header: &H) {
        self.insert_front(H::NAME, header.to_string())
    }

    /// Append a typed header under a name it does not carry itself
    pub fn insert_type<H: fmt::Display>(&mut self, name: Name, header: &H) {
        self.insert(name, header.to_string())
    }

    /// Remove all values with the given name, returns them in order
    pub fn remove(&mut self, name: &Name) -> Vec<BytesStr> {
        let mut removed = vec![];

        self.entries.retain(|e| {
            if &e.name == name {
                removed.push(e.value.clone());
                false
            } else {
                true
            }
        });

        removed
    }

    /// Raw values stored under `name`
    pub fn values<'s>(&'s self, name: &'s Name) -> impl Iterator<Item = &'s BytesStr> + 's {
        self.entries
            .iter()
            .filter(move |e| &e.name == name)
            .map(|e| &e.value)
    }

    pub fn get_named<H: ConstNamed + DecodeValues>(&self) -> Result<H, HeaderError> {
        self.get(H::NAME)
    }

    /// Like [`Headers::get_named`] but returns `None` if the header is absent
    pub fn try_get_named<H: ConstNamed + DecodeValues>(&self) -> Option<Result<H, HeaderError>> {
        self.try_get(H::NAME)
    }

    pub fn get<H: DecodeValues>(&self, name: Name) -> Result<H, HeaderError> {
        self.try_get(name.clone())
            .unwrap_or_else(|| Err(HeaderError::missing(name)))
    }

    pub fn try_get<H: DecodeValues>(&self, name: Name) -> Option<Result<H, HeaderError>> {
        let mut values = self.values(&name).peekable();
        values.peek()?;

        Some(H::decode(&mut values).map_err(|e| HeaderError::malformed(name.clone(), e)))
    }

    /// Decode and remove a header. Values that fail to decode are removed as well.
    pub fn take_named<H: ConstNamed + DecodeValues>(&mut self) -> Option<H> {
        self.take(H::NAME)
    }

    pub fn take<H: DecodeValues>(&mut self, name: Name) -> Option<H> {
        let header = self.try_get(name.clone())?.ok();
        self.remove(&name);
        header
    }

    /// Decode all values of `H`, edit it and write it back as a single value
    pub fn edit_named<H, F>(&mut self, edit: F) -> Result<(), HeaderError>
    where
        H: ConstNamed + DecodeValues + fmt::Display,
        F: FnOnce(&mut H),
    {
        let mut header = self.get_named::<H>()?;
        edit(&mut header);

        let idx = self
            .entries
            .iter()
            .position(|e| e.name == H::NAME)
            .unwrap_or(self.entries.len());

        self.remove(&H::NAME);
        self.entries.insert(
            idx.min(self.entries.len()),
            Entry {
                name: H::NAME,
                value: header.to_string().into(),
            },
        );

        Ok(())
    }

    /// Copy all values with `name` into `dst`
    pub fn clone_into(&self, dst: &mut Self, name: Name) -> Result<(), HeaderError> {
        let mut found = false;

        for value in self.values(&name) {
            dst.insert(name.clone(), value.clone());
            found = true;
        }

        if found {
            Ok(())
        } else {
            Err(HeaderError::missing(name))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &BytesStr)> + '_ {
        self.entries.iter().map(|e| (&e.name, &e.value))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for Entry { name, value } in &self.entries {
            write!(f, "{}: {}\r\n", name, value)?;
        }

        Ok(())
    }
}

impl Extend<(Name, BytesStr)> for Headers {
    fn extend<T: IntoIterator<Item = (Name, BytesStr)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::typed::{CSeq, MaxForwards, Via};
    use crate::Method;

    #[test]
    fn insert_keeps_order() {
        let mut headers = Headers::new();
        headers.insert(Name::VIA, "SIP/2.0/UDP a;branch=z9hG4bK1");
        headers.insert(Name::CALL_ID, "abc");
        headers.insert(Name::VIA, "SIP/2.0/UDP b;branch=z9hG4bK2");

        let names: Vec<_> = headers.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, [Name::VIA, Name::CALL_ID, Name::VIA]);
    }

    #[test]
    fn insert_front_goes_before_same_name() {
        let mut headers = Headers::new();
        headers.insert(Name::CALL_ID, "abc");
        headers.insert(Name::VIA, "SIP/2.0/UDP b;branch=z9hG4bK2");
        headers.insert_front(Name::VIA, "SIP/2.0/UDP a;branch=z9hG4bK1");

        let vias: Vec<Via> = headers.get_named().unwrap();
        assert_eq!(vias[0].sent_by, "a");
        assert_eq!(vias[1].sent_by, "b");
    }

    #[test]
    fn typed_round_trip() {
        let mut headers = Headers::new();
        headers.insert_named(&MaxForwards(70));
        headers.insert_named(&CSeq::new(7, Method::MESSAGE));

        assert_eq!(headers.get_named::<MaxForwards>().unwrap(), MaxForwards(70));

        let cseq: CSeq = headers.get_named().unwrap();
        assert_eq!(cseq.cseq, 7);
        assert_eq!(cseq.method, Method::MESSAGE);
    }

    #[test]
    fn missing_and_malformed() {
        let mut headers = Headers::new();
        assert!(headers.get_named::<MaxForwards>().unwrap_err().is_missing());
        assert!(headers.try_get_named::<MaxForwards>().is_none());

        headers.insert(Name::MAX_FORWARDS, "seventy");
        let err = headers.get_named::<MaxForwards>().unwrap_err();
        assert!(!err.is_missing());
    }

    #[test]
    fn take_and_remove() {
        let mut headers = Headers::new();
        headers.insert(Name::MAX_FORWARDS, "70");
        headers.insert(Name::MAX_FORWARDS, "69");

        let first: MaxForwards = headers.take_named().unwrap();
        assert_eq!(first.0, 70);
        assert!(headers.is_empty());

        headers.insert(Name::ROUTE, "<sip:a>");
        headers.insert(Name::ROUTE, "<sip:b>");
        assert_eq!(headers.remove(&Name::ROUTE).len(), 2);
    }

    #[test]
    fn edit_rewrites_in_place() {
        let mut headers = Headers::new();
        headers.insert(Name::CALL_ID, "abc");
        headers.insert(Name::MAX_FORWARDS, "70");
        headers.insert(Name::CONTENT_LENGTH, "0");

        headers
            .edit_named(|max_fwd: &mut MaxForwards| max_fwd.0 -= 1)
            .unwrap();

        let printed = headers.to_string();
        assert_eq!(
            printed,
            "Call-ID: abc\r\nMax-Forwards: 69\r\nContent-Length: 0\r\n"
        );
    }

    #[test]
    fn clone_into_copies_all() {
        let mut a = Headers::new();
        a.insert(Name::RECORD_ROUTE, "<sip:p1;lr>");
        a.insert(Name::RECORD_ROUTE, "<sip:p2;lr>");

        let mut b = Headers::new();
        a.clone_into(&mut b, Name::RECORD_ROUTE).unwrap();
        assert_eq!(b.len(), 2);

        assert!(a.clone_into(&mut b, Name::ROUTE).unwrap_err().is_missing());
    }
}
