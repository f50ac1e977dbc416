//! Priority-ordered deduplication of book records.
//!
//! A single linear scan over records already arranged in precedence order
//! (local, then primary, then secondary). The first occurrence of a book is
//! kept; later occurrences are dropped. Books are matched by normalised
//! ISBN first and, when the ISBN is absent or unseen, by a fallback key
//! chosen by [`DedupPolicy`].

use std::collections::HashSet;

use crate::config::DedupPolicy;
use crate::types::BookRecord;

/// Lower-case, drop punctuation and collapse whitespace.
pub fn normalize_key_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The non-ISBN dedup key for `record` under `policy`, if any.
pub fn fallback_key(record: &BookRecord, policy: DedupPolicy) -> Option<String> {
    let title = normalize_key_text(record.title());
    if title.is_empty() {
        return None;
    }
    match policy {
        DedupPolicy::IsbnOnly => None,
        DedupPolicy::IsbnThenTitle => Some(title),
        DedupPolicy::IsbnThenTitleAuthor => {
            let author = record.author().map(normalize_key_text).unwrap_or_default();
            Some(format!("{title}|{author}"))
        }
    }
}

/// Seen-set state for one aggregation pass.
#[derive(Debug)]
pub struct Deduplicator {
    policy: DedupPolicy,
    seen_isbns: HashSet<String>,
    seen_keys: HashSet<String>,
}

impl Deduplicator {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            seen_isbns: HashSet::new(),
            seen_keys: HashSet::new(),
        }
    }

    /// Returns `true` if `record` is new and should be kept.
    pub fn admit(&mut self, record: &BookRecord) -> bool {
        if record.isbn().is_some_and(|isbn| self.seen_isbns.contains(isbn)) {
            return false;
        }
        let key = fallback_key(record, self.policy);
        if key.as_ref().is_some_and(|k| self.seen_keys.contains(k)) {
            return false;
        }
        if let Some(isbn) = record.isbn() {
            self.seen_isbns.insert(isbn.to_owned());
        }
        if let Some(key) = key {
            self.seen_keys.insert(key);
        }
        true
    }
}

/// Deduplicate `records`, which must already be in precedence order.
pub fn deduplicate(
    records: impl IntoIterator<Item = BookRecord>,
    policy: DedupPolicy,
) -> Vec<BookRecord> {
    let mut dedup = Deduplicator::new(policy);
    records.into_iter().filter(|r| dedup.admit(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookSource;

    fn book(
        title: &str,
        author: Option<&str>,
        isbn: Option<&str>,
        source: BookSource,
    ) -> BookRecord {
        let mut record = BookRecord::new(title, source).expect("title");
        if let Some(author) = author {
            record = record.with_author(author);
        }
        if let Some(isbn) = isbn {
            record = record.with_isbn(isbn);
        }
        record
    }

    #[test]
    fn same_isbn_keeps_first() {
        let records = vec![
            book("Dune", Some("Frank Herbert"), Some("9780441013593"), BookSource::Local),
            book("DUNE (Deluxe)", None, Some("978-0-441-01359-3"), BookSource::OpenLibrary),
            book("Dune.", Some("F. Herbert"), Some("9780441013593"), BookSource::GoogleBooks),
        ];
        let kept = deduplicate(records, DedupPolicy::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source(), BookSource::Local);
    }

    #[test]
    fn title_author_fallback_without_isbn() {
        let records = vec![
            book("The Hobbit", Some("J.R.R. Tolkien"), None, BookSource::Local),
            book("The Hobbit!", Some("j.r.r. tolkien"), None, BookSource::OpenLibrary),
            book("The Hobbit", Some("Someone Else"), None, BookSource::GoogleBooks),
        ];
        let kept = deduplicate(records, DedupPolicy::IsbnThenTitleAuthor);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn title_only_policy_merges_different_authors() {
        let records = vec![
            book("Collected Poems", Some("Auden"), None, BookSource::Local),
            book("Collected Poems", Some("Plath"), None, BookSource::OpenLibrary),
        ];
        assert_eq!(deduplicate(records, DedupPolicy::IsbnThenTitle).len(), 1);
    }

    #[test]
    fn isbn_only_policy_keeps_isbnless_records() {
        let records = vec![
            book("Dune", None, None, BookSource::Local),
            book("Dune", None, None, BookSource::OpenLibrary),
        ];
        assert_eq!(deduplicate(records, DedupPolicy::IsbnOnly).len(), 2);
    }

    #[test]
    fn fallback_applies_when_isbn_unseen() {
        let records = vec![
            book("Dune", Some("Frank Herbert"), None, BookSource::Local),
            book("Dune", Some("Frank Herbert"), Some("9780441013593"), BookSource::OpenLibrary),
        ];
        assert_eq!(deduplicate(records, DedupPolicy::default()).len(), 1);
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(
            normalize_key_text("  The Lord of the Rings: Vol. 1! "),
            "the lord of the rings vol 1"
        );
    }
}
