/// Maximum number of characters in a sanitized filename.
pub const MAX_FILENAME_LEN: usize = 100;

const REPLACEMENT: char = '_';

/// Returns `true` if `c` may appear in a sanitized filename.
pub fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')
}

/// Converts an arbitrary title into a filesystem-safe base name.
///
/// Every character outside `[A-Za-z0-9-_. ]` becomes `_`, runs of spaces are
/// collapsed to one, leading and trailing spaces are trimmed and the result is
/// cut to [`MAX_FILENAME_LEN`] characters. Applying it twice gives the same
/// result as applying it once.
pub fn sanitize_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len().min(MAX_FILENAME_LEN));
    let mut pending_space = false;

    for c in title.chars() {
        let c = if is_allowed_char(c) { c } else { REPLACEMENT };

        if c == ' ' {
            pending_space = !out.is_empty();
            continue;
        }

        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);

        if out.len() >= MAX_FILENAME_LEN {
            break;
        }
    }

    // Output is pure ASCII, so byte length equals char count.
    out.truncate(MAX_FILENAME_LEN);
    out.truncate(out.trim_end().len());
    out
}
