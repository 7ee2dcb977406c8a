//! Splitting `std::any::type_name` output into generic parts.
//!
//! The container identifies generic services by erasing their type
//! arguments, e.g. `dyn app::Repo<app::User>` has the definition
//! `dyn app::Repo` with arity 1. The exact text of `type_name` is not
//! stable across compiler versions, but it is consistent within one
//! binary, which is all the container relies on.

use tracing::trace;

/// A generic type name split at its top-level angle brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericName<'a> {
    /// Everything before the opening `<`, e.g. `dyn app::Repo`.
    pub base: &'a str,
    /// Top-level type arguments, trimmed.
    pub arguments: Vec<&'a str>,
    /// Anything after the closing `>`, usually `+ Send` style bounds.
    pub trailer: &'a str,
}

/// Splits `name` into base, type arguments and trailer.
///
/// Returns `None` for names without top-level type arguments, including
/// tuples, arrays and qualified paths such as `<T as Trait>::Output`.
///
/// # Examples
/// ```
/// use muajjal_support::type_name::split_generic;
///
/// let parts = split_generic("dyn app::Repo<app::User, alloc::vec::Vec<u8>>").unwrap();
/// assert_eq!(parts.base, "dyn app::Repo");
/// assert_eq!(parts.arguments, ["app::User", "alloc::vec::Vec<u8>"]);
/// assert_eq!(parts.trailer, "");
///
/// assert!(split_generic("(u8, alloc::vec::Vec<u8>)").is_none());
/// ```
pub fn split_generic(name: &str) -> Option<GenericName<'_>> {
    let open = top_level_open(name)?;
    if name[..open].trim().is_empty() {
        trace!(name, "Qualified path, not treated as generic");
        return None;
    }

    let mut arguments = Vec::new();
    let mut angle = 0usize;
    let mut nested = 0usize;
    let mut start = open + 1;
    let mut previous = '<';
    let mut close = None;

    for (offset, ch) in name[open + 1..].char_indices() {
        let index = open + 1 + offset;
        match ch {
            '(' | '[' => nested += 1,
            ')' | ']' => nested = nested.saturating_sub(1),
            '<' => angle += 1,
            // `->` in fn signatures is not a closing bracket
            '>' if previous == '-' => {}
            '>' if angle == 0 && nested == 0 => {
                close = Some(index);
                break;
            }
            '>' => angle = angle.saturating_sub(1),
            ',' if angle == 0 && nested == 0 => {
                arguments.push(name[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
        previous = ch;
    }

    let close = close?;
    let last = name[start..close].trim();
    if !last.is_empty() {
        arguments.push(last);
    }
    if arguments.is_empty() {
        return None;
    }

    Some(GenericName {
        base: name[..open].trim_end(),
        arguments,
        trailer: name[close + 1..].trim(),
    })
}

/// Position of the first `<` outside parentheses and brackets.
fn top_level_open(name: &str) -> Option<usize> {
    let mut nested = 0usize;
    for (index, ch) in name.char_indices() {
        match ch {
            '(' | '[' => nested += 1,
            ')' | ']' => nested = nested.saturating_sub(1),
            '<' if nested == 0 => return Some(index),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_generic_name() {
        assert!(split_generic("app::Mailer").is_none());
        assert!(split_generic("dyn app::Mailer").is_none());
    }

    #[test]
    fn nested_arguments_stay_whole() {
        let parts = split_generic("app::Cache<alloc::sync::Arc<dyn app::Store>, u32>").unwrap();
        assert_eq!(parts.base, "app::Cache");
        assert_eq!(parts.arguments, ["alloc::sync::Arc<dyn app::Store>", "u32"]);
    }

    #[test]
    fn fn_signature_arrow_is_not_a_bracket() {
        let parts = split_generic("app::Hook<dyn core::ops::Fn(u8) -> u8>").unwrap();
        assert_eq!(parts.arguments, ["dyn core::ops::Fn(u8) -> u8"]);
    }

    #[test]
    fn tuple_argument_commas_are_nested() {
        let parts = split_generic("app::Pair<(u8, u16), [u8; 4]>").unwrap();
        assert_eq!(parts.arguments, ["(u8, u16)", "[u8; 4]"]);
    }

    #[test]
    fn trailer_is_kept() {
        let parts = split_generic("dyn app::Repo<u8> + core::marker::Send").unwrap();
        assert_eq!(parts.base, "dyn app::Repo");
        assert_eq!(parts.trailer, "+ core::marker::Send");
    }

    #[test]
    fn qualified_path_is_not_generic() {
        assert!(split_generic("<u8 as app::Codec>::Output").is_none());
    }

    #[test]
    fn unbalanced_name_is_rejected() {
        assert!(split_generic("app::Broken<u8").is_none());
    }
}
