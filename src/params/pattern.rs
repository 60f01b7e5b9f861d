use std::collections::HashSet;

/// Names declared in a route pattern, in the order they appear.
///
/// A name is a `:` followed by the longest run of alphanumeric or `_` characters.
/// A bare `:` contributes nothing.
#[must_use]
pub fn route_param_list(pattern: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = pattern.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != ':' {
            continue;
        }
        let start = idx + c.len_utf8();
        let mut end = start;
        while let Some(&(i, next)) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                end = i + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if end > start {
            names.push(pattern[start..end].to_string());
        }
    }
    names
}

/// Set of names declared in a route pattern.
#[must_use]
pub fn route_param_names(pattern: &str) -> HashSet<String> {
    route_param_list(pattern).into_iter().collect()
}
