//! Weighted relevance scoring for local catalog matches.
//!
//! Every query term contributes the weight of each field it appears in:
//!
//! ```text
//! title       3.0
//! author      2.0
//! category    1.5
//! description 1.0
//! ```
//!
//! The compound score is the sum over all terms and fields. A query that
//! equals a record's ISBN is an override: that record outranks every
//! non-ISBN match whatever its score.

use std::cmp::Ordering;

use crate::catalog::searchable_fields;
use crate::types::{BookRecord, SortDirection, SortField};

pub const TITLE_WEIGHT: f64 = 3.0;
pub const AUTHOR_WEIGHT: f64 = 2.0;
pub const CATEGORY_WEIGHT: f64 = 1.5;
pub const DESCRIPTION_WEIGHT: f64 = 1.0;

const FIELD_WEIGHTS: [f64; 4] = [TITLE_WEIGHT, AUTHOR_WEIGHT, CATEGORY_WEIGHT, DESCRIPTION_WEIGHT];

/// A local record with its computed relevance.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: BookRecord,
    pub score: f64,
    /// The query equals this record's ISBN.
    pub isbn_match: bool,
}

/// Score `record` against `terms`.
///
/// Returns `None` when the record does not qualify: some term matches no
/// searchable field and the ISBN override does not apply.
pub fn score_record(
    record: BookRecord,
    terms: &[String],
    isbn: Option<&str>,
) -> Option<ScoredRecord> {
    let isbn_match = isbn.is_some() && record.isbn() == isbn;
    let fields = searchable_fields(&record);

    let mut score = 0.0;
    for term in terms {
        let contribution: f64 = fields
            .iter()
            .zip(FIELD_WEIGHTS)
            .filter(|(field, _)| field.contains(term.as_str()))
            .map(|(_, weight)| weight)
            .sum();
        if contribution == 0.0 && !isbn_match {
            return None;
        }
        score += contribution;
    }

    Some(ScoredRecord {
        record,
        score,
        isbn_match,
    })
}

fn title_order(a: &BookRecord, b: &BookRecord) -> Ordering {
    a.title()
        .to_lowercase()
        .cmp(&b.title().to_lowercase())
        .then_with(|| a.id().cmp(&b.id()))
}

/// Relevance order: ISBN override, then descending score, then title
/// ascending (case-insensitive), then id.
pub fn by_relevance(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    b.isbn_match
        .cmp(&a.isbn_match)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| title_order(&a.record, &b.record))
}

/// Order by an explicit field. Records missing the field sort last in
/// either direction; ties fall back to title.
pub fn by_field(
    field: SortField,
    direction: SortDirection,
    a: &BookRecord,
    b: &BookRecord,
) -> Ordering {
    fn missing_last<T>(
        a: Option<T>,
        b: Option<T>,
        cmp: impl Fn(&T, &T) -> Ordering,
        dir: SortDirection,
    ) -> Ordering {
        match (a, b) {
            (Some(x), Some(y)) => match dir {
                SortDirection::Asc => cmp(&x, &y),
                SortDirection::Desc => cmp(&y, &x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    let primary = match field {
        SortField::Relevance | SortField::Title => {
            let ord = a.title().to_lowercase().cmp(&b.title().to_lowercase());
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
        SortField::Author => missing_last(
            a.author().map(str::to_lowercase),
            b.author().map(str::to_lowercase),
            |x, y| x.cmp(y),
            direction,
        ),
        SortField::PublicationYear => {
            missing_last(a.publication_year(), b.publication_year(), |x, y| x.cmp(y), direction)
        }
        SortField::AverageRating => {
            missing_last(a.average_rating(), b.average_rating(), |x, y| x.total_cmp(y), direction)
        }
    };
    primary.then_with(|| title_order(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookSource;

    fn book(title: &str) -> BookRecord {
        BookRecord::new(title, BookSource::Local).expect("title")
    }

    fn terms(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn field_weights_add_up() {
        let record = book("Dune")
            .with_author("Dune Collective")
            .with_category("dune studies")
            .with_description("All about dune.");
        let scored = score_record(record, &terms("dune"), None).expect("qualifies");
        assert!((scored.score - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn every_term_must_match() {
        let record = book("Dune").with_author("Frank Herbert");
        assert!(score_record(record.clone(), &terms("dune herbert"), None).is_some());
        assert!(score_record(record, &terms("dune tolkien"), None).is_none());
    }

    #[test]
    fn multi_term_score_is_sum() {
        let record = book("Dune Messiah").with_author("Frank Herbert");
        let scored = score_record(record, &terms("dune herbert"), None).expect("qualifies");
        assert!((scored.score - (TITLE_WEIGHT + AUTHOR_WEIGHT)).abs() < f64::EPSILON);
    }

    #[test]
    fn isbn_override_qualifies_and_outranks() {
        let isbn_hit = book("Zzz Obscure").with_isbn("9780441013593");
        let strong = book("9780441013593 in the title").with_author("9780441013593");
        let q = terms("9780441013593");

        let a = score_record(isbn_hit, &q, Some("9780441013593")).expect("override qualifies");
        let b = score_record(strong, &q, Some("9780441013593")).expect("text match");
        assert!(a.isbn_match);
        assert!(b.score > a.score);
        assert_eq!(by_relevance(&a, &b), Ordering::Less);
    }

    #[test]
    fn ties_break_by_title() {
        let a = score_record(book("beta"), &[], None).expect("empty query qualifies");
        let b = score_record(book("Alpha"), &[], None).expect("empty query qualifies");
        let mut list = vec![a, b];
        list.sort_by(by_relevance);
        assert_eq!(list[0].record.title(), "Alpha");
    }

    #[test]
    fn field_sort_puts_missing_last() {
        let old = book("Old").with_publication_year(1900);
        let new = book("New").with_publication_year(2000);
        let undated = book("Undated");
        let mut list = vec![undated.clone(), old.clone(), new.clone()];

        list.sort_by(|a, b| by_field(SortField::PublicationYear, SortDirection::Desc, a, b));
        let titles: Vec<_> = list.iter().map(BookRecord::title).collect();
        assert_eq!(titles, vec!["New", "Old", "Undated"]);

        list.sort_by(|a, b| by_field(SortField::PublicationYear, SortDirection::Asc, a, b));
        let titles: Vec<_> = list.iter().map(BookRecord::title).collect();
        assert_eq!(titles, vec!["Old", "New", "Undated"]);
    }
}
