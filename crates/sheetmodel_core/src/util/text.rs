//! Display-name helpers.
//!
//! # Responsibility
//! - Derive human-readable labels from attribute and class names.
//! - Pluralize class labels for row-oriented sheet names.
//! - Quote tokens embedded in error reports.
//!
//! # Invariants
//! - All helpers are pure and never fail.

const UNINFLECTED: &[&str] = &[
    "data", "deer", "equipment", "fish", "information", "metadata", "news", "series", "sheep",
    "species",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("analysis", "analyses"),
    ("axis", "axes"),
    ("child", "children"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("man", "men"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    ("person", "people"),
    ("phenomenon", "phenomena"),
    ("tooth", "teeth"),
    ("woman", "women"),
];

const F_TO_VES: &[&str] = &[
    "calf", "elf", "half", "knife", "leaf", "life", "loaf", "self", "sheaf", "shelf", "thief",
    "wife", "wolf",
];

/// Converts an identifier into sentence case.
///
/// Separators (`-`, `_`, `.`, whitespace) become spaces and every upper-case
/// letter starts a new lower-case word; only the first character stays
/// capitalized. `"MainRoot"` becomes `"Main root"`, `"val_1"` becomes
/// `"Val 1"`.
pub fn sentence_case(value: &str) -> String {
    let mut spaced = String::with_capacity(value.len() + 4);
    for ch in value.chars() {
        if ch == '-' || ch == '_' || ch == '.' || ch.is_whitespace() {
            spaced.push(' ');
        } else if ch.is_uppercase() {
            spaced.push(' ');
            spaced.extend(ch.to_lowercase());
        } else {
            spaced.push(ch);
        }
    }

    let trimmed = spaced.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Returns the English plural of `value`, inflecting only its last word.
///
/// The last word is found at the final space or lower-to-upper case
/// boundary, so `"MainRoot"` becomes `"MainRoots"` and `"Leaf"` becomes
/// `"Leaves"`.
pub fn pluralize(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let split = last_word_start(value);
    let (head, word) = value.split_at(split);
    let lower = word.to_lowercase();

    if UNINFLECTED.contains(&lower.as_str()) {
        return value.to_string();
    }

    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return format!("{head}{}", match_case(word, plural));
    }

    if F_TO_VES.contains(&lower.as_str()) {
        let stem_len = if lower.ends_with("fe") {
            word.len() - 2
        } else {
            word.len() - 1
        };
        return format!("{head}{}ves", &word[..stem_len]);
    }

    if lower.ends_with('y') && lower.len() > 1 {
        let before = lower.chars().rev().nth(1).unwrap_or('a');
        if !"aeiou".contains(before) {
            return format!("{}ies", &value[..value.len() - 1]);
        }
    }

    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{value}es");
    }

    format!("{value}s")
}

/// Wraps `value` in single quotes when it is empty or contains characters
/// that would blur a `file:sheet:cell` report (whitespace, `:`, `,`, `'`).
pub fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|ch| ch.is_whitespace() || ch == ':' || ch == ',' || ch == '\'');
    if needs_quotes {
        format!("'{value}'")
    } else {
        value.to_string()
    }
}

/// Converts a 1-based column number into spreadsheet letters (`1 -> A`,
/// `27 -> AA`). Column `0` renders as an empty string.
pub fn excel_col_name(col: usize) -> String {
    let mut col = col;
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn last_word_start(value: &str) -> usize {
    let chars: Vec<(usize, char)> = value.char_indices().collect();
    for pair in chars.windows(2).rev() {
        let (_, prev) = pair[0];
        let (idx, ch) = pair[1];
        if prev.is_whitespace() || prev == '_' || prev == '-' {
            return idx;
        }
        if prev.is_lowercase() && ch.is_uppercase() {
            return idx;
        }
    }
    0
}

fn match_case(original: &str, replacement: &str) -> String {
    let mut chars = original.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            if chars.all(|ch| !ch.is_lowercase()) && original.len() > 1 {
                return replacement.to_uppercase();
            }
            let mut repl = replacement.chars();
            match repl.next() {
                Some(head) => head.to_uppercase().chain(repl).collect(),
                None => String::new(),
            }
        }
        _ => replacement.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{excel_col_name, pluralize, quote, sentence_case};

    #[test]
    fn sentence_case_splits_camel_and_snake_names() {
        assert_eq!(sentence_case("MainRoot"), "Main root");
        assert_eq!(sentence_case("onetomany_rows"), "Onetomany rows");
        assert_eq!(sentence_case("val1"), "Val1");
        assert_eq!(sentence_case("TestModels3"), "Test models3");
        assert_eq!(sentence_case(""), "");
    }

    #[test]
    fn pluralize_handles_common_english_rules() {
        assert_eq!(pluralize("MainRoot"), "MainRoots");
        assert_eq!(pluralize("Leaf"), "Leaves");
        assert_eq!(pluralize("knife"), "knives");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("Day"), "Days");
        assert_eq!(pluralize("Box"), "Boxes");
        assert_eq!(pluralize("Branch"), "Branches");
        assert_eq!(pluralize("Test model"), "Test models");
        assert_eq!(pluralize("Person"), "People");
        assert_eq!(pluralize("SalesPerson"), "SalesPeople");
        assert_eq!(pluralize("Species"), "Species");
    }

    #[test]
    fn quote_wraps_only_ambiguous_tokens() {
        assert_eq!(quote("node_2"), "node_2");
        assert_eq!(quote("root 2"), "'root 2'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("reference-errors.xlsx"), "reference-errors.xlsx");
    }

    #[test]
    fn excel_col_name_uses_bijective_base_26() {
        assert_eq!(excel_col_name(1), "A");
        assert_eq!(excel_col_name(26), "Z");
        assert_eq!(excel_col_name(27), "AA");
        assert_eq!(excel_col_name(703), "AAA");
    }
}
