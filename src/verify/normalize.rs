//! Response normalization.
//!
//! Device output and expected fragments pass through different rules before
//! comparison. Actual output loses line breaks, decorative characters, and
//! runs of whitespace; expected fragments are authored in a path-like
//! shorthand for nested configuration keys, so their separators become
//! spaces, except inside a literal URL, which must round-trip exactly.

/// Device-level syntax error marker on the first response line.
const SYNTAX_ERROR_MARKER: &str = "syntax error";

/// Empty-result marker on the first response line.
const NO_ENTRIES_MARKER: &str = "No entries found";

/// Decorative characters stripped from device output.
const DECORATIVE_CHARS: [char; 4] = ['[', ']', ',', '!'];

/// Normalizes raw device output for the command that produced it.
///
/// A syntax-error first line canonicalizes to `"<command> Element does not
/// exist"`, an empty-result first line to `"<command> No entries found"`.
/// Anything else has line-break sequences removed, decorative characters
/// stripped, and whitespace collapsed.
#[must_use]
pub fn normalize_actual(raw: &str, command: &str) -> String {
    let first_line = raw.lines().next().unwrap_or("");

    if first_line.contains(SYNTAX_ERROR_MARKER) {
        return format!("{command} Element does not exist");
    }
    if first_line.contains(NO_ENTRIES_MARKER) {
        return format!("{command} No entries found");
    }

    let joined = raw.replace("\r\n", "");
    let stripped: String = joined
        .chars()
        .filter(|c| !DECORATIVE_CHARS.contains(c))
        .collect();
    collapse_whitespace(&stripped)
}

/// Normalizes an expected fragment.
///
/// Path separators become spaces; when the fragment embeds a URL-like token,
/// only the portion before it is separator-normalized so the URL survives
/// byte-for-byte.
#[must_use]
pub fn normalize_expected(fragment: &str) -> String {
    let replaced = fragment.find("http").map_or_else(
        || fragment.replace('/', " "),
        |idx| {
            let (prefix, url) = fragment.split_at(idx);
            format!("{}{url}", prefix.replace('/', " "))
        },
    );
    collapse_whitespace(&replaced)
}

/// Collapses runs of whitespace to single spaces and trims the ends.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
