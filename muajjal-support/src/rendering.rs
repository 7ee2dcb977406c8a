//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to format dependency chains, generic type names,
//! and "did you mean?" suggestions in error output.

/// Renders a dependency chain as a readable string.
///
/// # Examples
/// ```
/// use muajjal_support::rendering::render_chain;
///
/// let chain = vec!["Mailer", "Transport", "Mailer"];
/// assert_eq!(render_chain(&chain), "Mailer → Transport → Mailer");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders a generic type from its base name and argument names.
///
/// ```
/// use muajjal_support::rendering::render_generic;
///
/// assert_eq!(render_generic("dyn app::Repo", &["u8", "String"]), "dyn app::Repo<u8, String>");
/// assert_eq!(render_generic("Plain", &[] as &[&str]), "Plain");
/// ```
pub fn render_generic(base: &str, arguments: &[impl AsRef<str>]) -> String {
    if arguments.is_empty() {
        return base.to_string();
    }
    let arguments: Vec<&str> = arguments.iter().map(|a| a.as_ref()).collect();
    format!("{base}<{}>", arguments.join(", "))
}

/// Renders an open generic definition with `_` placeholders.
///
/// ```
/// use muajjal_support::rendering::render_definition;
///
/// assert_eq!(render_definition("dyn app::Repo", 3), "dyn app::Repo<_, _, _>");
/// ```
pub fn render_definition(base: &str, arity: usize) -> String {
    let placeholders = vec!["_"; arity];
    render_generic(base, &placeholders[..])
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use muajjal_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::mail::Mailer"), "Mailer");
/// assert_eq!(
///     shorten_type_name("dyn my_app::Repo<my_app::User, alloc::string::String>"),
///     "dyn Repo<User, String>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Ranks `available` names by similarity to `requested`.
///
/// Returns indices into `available`, best match first, at most
/// `max_suggestions` of them. Exact matches are skipped since they
/// are never a useful suggestion.
pub fn suggest_similar(
    requested: &str,
    available: &[impl AsRef<str>],
    max_suggestions: usize,
) -> Vec<usize> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(usize, usize)> = available
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            let name_lower = name.as_ref().to_lowercase();
            if name_lower == requested_lower {
                return None;
            }
            let name_short = shorten_type_name(name.as_ref()).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((index, 100));
            }

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((index, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((index, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(index, _)| index)
        .collect()
}
