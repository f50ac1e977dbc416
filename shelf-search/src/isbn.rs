//! ISBN normalisation.
//!
//! Providers hand back ISBNs with hyphens, spaces and mixed case check
//! digits. Everything downstream (dedup, ISBN override ranking, cache keys)
//! compares the canonical form: the 13-digit ISBN, with ISBN-10s converted.

/// Normalise a raw ISBN string.
///
/// Strips hyphens and whitespace and upper-cases a trailing `x`. Returns
/// `None` unless the result is a 13-digit ISBN-13 or a 10-character ISBN-10.
/// Check digits are not verified; providers routinely publish ISBNs with bad
/// checksums and we still want them to dedup against each other.
pub fn normalize_isbn(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    match cleaned.len() {
        13 if cleaned.chars().all(|c| c.is_ascii_digit()) => Some(cleaned),
        10 => {
            let (body, check) = cleaned.split_at(9);
            let body_ok = body.chars().all(|c| c.is_ascii_digit());
            let check_ok = check.chars().all(|c| c.is_ascii_digit() || c == 'X');
            (body_ok && check_ok).then_some(cleaned)
        }
        _ => None,
    }
}

/// Normalise `raw` and convert an ISBN-10 to its ISBN-13.
///
/// This is the form records store and lookups compare, so `0441013597`
/// and `978-0-441-01359-3` name the same book.
pub fn canonical_isbn(raw: &str) -> Option<String> {
    let isbn = normalize_isbn(raw)?;
    if isbn.len() == 10 {
        Some(isbn10_to_isbn13(&isbn))
    } else {
        Some(isbn)
    }
}

/// `978` prefix, the nine ISBN-10 body digits, then a recomputed check digit.
/// The ISBN-10 check character is discarded.
fn isbn10_to_isbn13(isbn10: &str) -> String {
    let body = format!("978{}", &isbn10[..9]);
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 {
                digit
            } else {
                digit * 3
            }
        })
        .sum();
    let check = (10 - sum % 10) % 10;
    format!("{body}{check}")
}

/// Pick the preferred ISBN from a provider's candidate list.
///
/// The first valid ISBN-13 wins; otherwise the first valid ISBN-10.
pub fn prefer_isbn13<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut fallback: Option<String> = None;
    for candidate in candidates {
        match normalize_isbn(candidate) {
            Some(isbn) if isbn.len() == 13 => return Some(isbn),
            Some(isbn) => {
                if fallback.is_none() {
                    fallback = Some(isbn);
                }
            }
            None => {}
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hyphens_and_spaces() {
        assert_eq!(
            normalize_isbn("978-0-13-468599-1").as_deref(),
            Some("9780134685991")
        );
        assert_eq!(
            normalize_isbn(" 0 13 468599 1 ").as_deref(),
            Some("0134685991")
        );
    }

    #[test]
    fn uppercases_check_character() {
        assert_eq!(normalize_isbn("080442957x").as_deref(), Some("080442957X"));
    }

    #[test]
    fn rejects_wrong_lengths_and_letters() {
        assert!(normalize_isbn("").is_none());
        assert!(normalize_isbn("12345").is_none());
        assert!(normalize_isbn("97801346859X1").is_none());
        assert!(normalize_isbn("X801346859").is_none());
        assert!(normalize_isbn("the hobbit").is_none());
    }

    #[test]
    fn isbn13_preferred_regardless_of_position() {
        let picked = prefer_isbn13(["0134685991", "978-0134685991"]);
        assert_eq!(picked.as_deref(), Some("9780134685991"));
    }

    #[test]
    fn isbn10_used_when_no_isbn13() {
        let picked = prefer_isbn13(["garbage", "0-13-468599-1"]);
        assert_eq!(picked.as_deref(), Some("0134685991"));
    }

    #[test]
    fn isbn10_converts_to_isbn13() {
        assert_eq!(canonical_isbn("0-441-01359-7").as_deref(), Some("9780441013593"));
        assert_eq!(canonical_isbn("0306406152").as_deref(), Some("9780306406157"));
        assert_eq!(canonical_isbn("080442957x").as_deref(), Some("9780804429573"));
        assert_eq!(canonical_isbn("978-0-13-468599-1").as_deref(), Some("9780134685991"));
        assert!(canonical_isbn("not an isbn").is_none());
    }

    #[test]
    fn no_valid_candidates() {
        assert!(prefer_isbn13(["", "abc"]).is_none());
        assert!(prefer_isbn13(Vec::<&str>::new()).is_none());
    }
}
