use bytesstr::BytesStr;
use rand::{Rng, distr::Alphanumeric, rng};

pub fn random_string() -> BytesStr {
    rng()
        .sample_iter(Alphanumeric)
        .take(30)
        .map(char::from)
        .collect::<String>()
        .into()
}

pub fn random_sequence_number() -> u32 {
    rand::rng().random_range(0..(u32::MAX >> 1))
}

/// Call-ID for a new dialog, `<random>@<host>`
pub fn random_call_id(host: &str) -> BytesStr {
    format!("{}@{host}", random_string()).into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn call_id_has_host() {
        let call_id = random_call_id("10.0.0.1");

        assert!(call_id.ends_with("@10.0.0.1"));
        assert_eq!(call_id.len(), 30 + "@10.0.0.1".len());
    }

    #[test]
    fn sequence_number_leaves_room() {
        for _ in 0..100 {
            assert!(random_sequence_number() < u32::MAX >> 1);
        }
    }
}
