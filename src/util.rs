//! String and file helpers for scraper code

use crate::DredgeError;
use std::collections::HashMap;
use std::path::Path;

/// Characters [`sanitize_filename`] replaces
const UNSAFE_FILENAME_CHARS: &str = " \\/,:;`~+!\"'#$%^&*(){}[]";

/// Cleans text extracted from HTML
///
/// Runs of two or more ASCII whitespace characters and every non-breaking
/// space become a single space; remaining CR and LF are dropped; leading and
/// trailing spaces are trimmed.
///
/// ```
/// use dredge::util::tidy_html_text;
///
/// assert_eq!(tidy_html_text("  Price:\u{a0}12\n   EUR \n"), "Price: 12 EUR");
/// ```
pub fn tidy_html_text(s: &str) -> String {
    let mut collapsed = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\u{a0}' {
            collapsed.push(' ');
        } else if is_ascii_space(c) {
            let mut run = 1;
            while chars.peek().is_some_and(|&next| is_ascii_space(next)) {
                chars.next();
                run += 1;
            }
            if run > 1 {
                collapsed.push(' ');
            } else {
                collapsed.push(c);
            }
        } else {
            collapsed.push(c);
        }
    }

    collapsed
        .chars()
        .filter(|&c| c != '\r' && c != '\n')
        .collect::<String>()
        .trim_matches(' ')
        .to_string()
}

fn is_ascii_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

/// Replaces characters that are unsafe in file names with `repl`
///
/// ```
/// use dredge::util::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Q3 report: final?", "_"), "Q3_report__final?");
/// ```
pub fn sanitize_filename(s: &str, repl: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if UNSAFE_FILENAME_CHARS.contains(c) {
            result.push_str(repl);
        } else {
            result.push(c);
        }
    }
    result
}

/// Pushes `item` only if the vector does not already contain it
///
/// Returns true if the item was added.
pub fn append_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        return false;
    }
    items.push(item);
    true
}

/// Loads a CSV file with a header row into one map per record
///
/// Keys are the header names. Records shorter than the header leave the
/// missing columns out; extra columns are ignored.
pub fn csv_to_maps(path: &Path) -> Result<Vec<HashMap<String, String>>, DredgeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}
