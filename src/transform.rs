use std::cmp::Ordering;
use tracing::debug;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::fetch::Row;

/// Keeps the header row first and stably sorts the remaining rows by label.
pub fn sort_rows(rows: Vec<Row>) -> Vec<Row> {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };

    let mut data: Vec<Row> = rows.collect();
    debug!("Sorting {} data rows by label", data.len());
    data.sort_by(|a, b| collate(a.label(), b.label()));

    std::iter::once(header).chain(data).collect()
}

/// Root-locale style comparison. Spaces, punctuation and symbols come before
/// digits, digits before letters, and letters compare without regard to accents
/// or case first. Ties go unaccented before accented, then lowercase before
/// uppercase. Precomposed and decomposed spellings compare equal.
pub fn collate(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| secondary_key(a).cmp(&secondary_key(b)))
        .then_with(|| tertiary_key(a).cmp(&tertiary_key(b)))
}

fn char_class(c: char) -> u8 {
    if c.is_alphabetic() {
        2
    } else if c.is_numeric() {
        1
    } else {
        0
    }
}

fn base_chars(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().filter(|c| !is_combining_mark(*c))
}

fn primary_key(s: &str) -> Vec<(u8, char)> {
    base_chars(s)
        .flat_map(char::to_lowercase)
        .map(|c| (char_class(c), c))
        .collect()
}

fn secondary_key(s: &str) -> String {
    s.nfd().flat_map(char::to_lowercase).collect()
}

fn tertiary_key(s: &str) -> Vec<bool> {
    base_chars(s).map(char::is_uppercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(Row::label).collect()
    }

    #[test]
    fn header_stays_first_and_data_is_ascending() {
        let rows = vec![
            Row::from(["name", "buy", "sell"]),
            Row::from(["USD", "3.50", "3.60"]),
            Row::from(["EUR", "4.10", "4.20"]),
            Row::from(["GBP", "4.70", "4.80"]),
        ];
        let sorted = sort_rows(rows);
        assert_eq!(labels(&sorted), vec!["name", "EUR", "GBP", "USD"]);
    }

    #[test]
    fn header_is_never_resorted() {
        let rows = vec![Row::from(["zzz", "h", "h"]), Row::from(["aaa", "1", "2"])];
        let sorted = sort_rows(rows);
        assert_eq!(labels(&sorted), vec!["zzz", "aaa"]);
    }

    #[test]
    fn already_sorted_data_is_unchanged() {
        let rows = vec![
            Row::from(["name", "buy", "sell"]),
            Row::from(["EUR", "4.10", "4.20"]),
            Row::from(["USD", "3.50", "3.60"]),
        ];
        assert_eq!(sort_rows(rows.clone()), rows);
    }

    #[test]
    fn equal_labels_keep_their_order() {
        let rows = vec![
            Row::from(["h", "h", "h"]),
            Row::from(["USD", "first", ""]),
            Row::from(["EUR", "", ""]),
            Row::from(["USD", "second", ""]),
        ];
        let sorted = sort_rows(rows);
        assert_eq!(sorted[2].0[1], "first");
        assert_eq!(sorted[3].0[1], "second");
    }

    #[test]
    fn comparison_ignores_case_and_accents_first() {
        assert_eq!(collate("a", "B"), Ordering::Less);
        assert_eq!(collate("a", "A"), Ordering::Less);
        assert_eq!(collate("e", "é"), Ordering::Less);
        assert_eq!(collate("é", "f"), Ordering::Less);
        assert_eq!(collate("dólar", "dolar"), Ordering::Greater);
        assert_eq!(collate("USD", "USD"), Ordering::Equal);
    }

    #[test]
    fn symbols_and_digits_sort_before_letters() {
        assert_eq!(collate("~", "a"), Ordering::Less);
        assert_eq!(collate("{x}", "A"), Ordering::Less);
        assert_eq!(collate("1", "a"), Ordering::Less);
        assert_eq!(collate("_", "0"), Ordering::Less);
        assert_eq!(collate("z", "~"), Ordering::Greater);
    }

    #[test]
    fn composed_and_decomposed_forms_are_equal() {
        assert_eq!(collate("\u{e9}", "e\u{301}"), Ordering::Equal);
        assert_eq!(collate("\u{c9}", "e\u{301}"), Ordering::Greater);
        assert_eq!(collate("d\u{f3}lar", "do\u{301}lar"), Ordering::Equal);
    }

    #[test]
    fn header_only_and_empty_inputs() {
        let header = vec![Row::from(["a", "b", "c"])];
        assert_eq!(sort_rows(header.clone()), header);
        assert!(sort_rows(Vec::new()).is_empty());
    }
}
