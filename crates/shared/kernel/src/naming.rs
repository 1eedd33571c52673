//! Translation from configured implementation names to registered type names.

use std::borrow::Cow;

/// Translates an implementation name into the type name a factory is registered under.
///
/// A name whose cased characters are all upper case (and has at least one) is kept as is:
/// `LBFGS` stays `LBFGS`. Otherwise every letter that follows a non-letter starts a word and
/// is upper-cased, the remaining letters are lower-cased, and `_` / `-` separators are dropped:
/// `my_solver` becomes `MySolver`, `steepest-descent` becomes `SteepestDescent`.
#[must_use]
pub fn type_name_for(name: &str) -> Cow<'_, str> {
    if is_upper(name) {
        return Cow::Borrowed(name);
    }

    let mut out = String::with_capacity(name.len());
    let mut word_start = true;
    for ch in name.chars() {
        if ch.is_alphabetic() {
            if word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            word_start = false;
        } else {
            if ch != '_' && ch != '-' {
                out.push(ch);
            }
            word_start = true;
        }
    }
    Cow::Owned(out)
}

fn is_upper(name: &str) -> bool {
    let mut cased = name.chars().filter(|c| c.is_lowercase() || c.is_uppercase()).peekable();
    cased.peek().is_some() && cased.all(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn translates_known_names() {
        assert_eq!(type_name_for("my_solver"), "MySolver");
        assert_eq!(type_name_for("steepest-descent"), "SteepestDescent");
        assert_eq!(type_name_for("LBFGS"), "LBFGS");
        assert_eq!(type_name_for("lbfgs"), "Lbfgs");
        assert_eq!(type_name_for("specfem2d"), "Specfem2D");
        assert_eq!(type_name_for("L_BFGS"), "L_BFGS");
        assert_eq!(type_name_for("mySolver"), "Mysolver");
        assert_eq!(type_name_for(""), "");
    }

    proptest! {
        #[test]
        fn upper_case_names_are_fixed_points(name in "[A-Z][A-Z0-9_]{0,12}") {
            prop_assert_eq!(type_name_for(&name), name.as_str());
        }

        #[test]
        fn lower_words_become_capitalised_concatenation(
            words in prop::collection::vec("[a-z]{1,8}", 1..5),
            sep in prop::sample::select(vec!["_", "-"]),
        ) {
            let expected: String = words
                .iter()
                .map(|w| {
                    let mut chars = w.chars();
                    let first = chars.next().map(|c| c.to_ascii_uppercase()).into_iter();
                    first.chain(chars).collect::<String>()
                })
                .collect();
            let joined = words.join(sep);
            prop_assert_eq!(type_name_for(&joined), expected);
        }

        #[test]
        fn mixed_names_lose_their_separators(name in "[a-z][a-zA-Z_-]{0,16}") {
            let out = type_name_for(&name);
            prop_assert!(!out.contains('_') && !out.contains('-'));
            prop_assert!(out.chars().next().is_some_and(char::is_uppercase));
        }
    }
}
