//! Case-insensitive natural ordering.
//!
//! Digit runs compare by numeric value, everything else compares
//! case-insensitively, so `"node_2" < "node_10"` and `"a" == "A"` for sort
//! purposes. Ties fall back to plain byte order to keep sorting total.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Chunk {
    Number(String),
    Text(String),
}

fn chunks(value: &str) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    for ch in value.chars() {
        let is_digit = ch.is_ascii_digit();
        if !current.is_empty() && is_digit != in_digits {
            out.push(finish_chunk(std::mem::take(&mut current), in_digits));
        }
        in_digits = is_digit;
        if is_digit {
            current.push(ch);
        } else {
            current.extend(ch.to_lowercase());
        }
    }
    if !current.is_empty() {
        out.push(finish_chunk(current, in_digits));
    }
    out
}

fn finish_chunk(text: String, digits: bool) -> Chunk {
    if digits {
        let trimmed = text.trim_start_matches('0');
        Chunk::Number(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
    } else {
        Chunk::Text(text)
    }
}

fn compare_chunk(left: &Chunk, right: &Chunk) -> Ordering {
    match (left, right) {
        (Chunk::Number(a), Chunk::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        (Chunk::Text(a), Chunk::Text(b)) => a.cmp(b),
    }
}

/// Compares two strings in case-insensitive natural order.
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let left_chunks = chunks(left);
    let right_chunks = chunks(right);
    for (a, b) in left_chunks.iter().zip(right_chunks.iter()) {
        let ord = compare_chunk(a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left_chunks
        .len()
        .cmp(&right_chunks.len())
        .then_with(|| left.cmp(right))
}

/// Sorts `items` in place by the natural order of the derived key.
pub fn natural_sort_by_key<T, F>(items: &mut [T], mut key: F)
where
    F: FnMut(&T) -> String,
{
    items.sort_by_cached_key(|item| NaturalKey(key(item)));
}

/// Returns a naturally sorted copy of `values`.
pub fn natural_sorted<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = values.into_iter().map(Into::into).collect();
    out.sort_by(|a, b| natural_cmp(a, b));
    out
}

#[derive(Debug, PartialEq, Eq)]
struct NaturalKey(String);

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{natural_cmp, natural_sorted};
    use std::cmp::Ordering;

    #[test]
    fn digits_compare_numerically() {
        assert_eq!(natural_cmp("node_2", "node_10"), Ordering::Less);
        assert_eq!(natural_cmp("leaf_010", "leaf_9"), Ordering::Greater);
    }

    #[test]
    fn letters_compare_case_insensitively() {
        assert_eq!(
            natural_sorted(["banana", "Apple", "cherry"]),
            vec!["Apple", "banana", "cherry"]
        );
    }

    #[test]
    fn ordering_is_total_for_case_variants() {
        assert_ne!(natural_cmp("a", "A"), Ordering::Equal);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }
}
