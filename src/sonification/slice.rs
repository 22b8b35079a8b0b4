//! Centered slice window selection.

/// Reduce `body` to at most `limit` characters.
///
/// Bodies that already fit are returned whole. Longer bodies yield a window of
/// exactly `limit` characters starting at `ceil((len - limit) / 2)`, so the
/// window sits in the middle of the content and leans one character later when
/// the excess is odd.
///
/// Lengths and offsets are counted in `char`s, never in bytes, so multi-byte
/// content is never split inside a code point.
pub fn select_slice(body: &str, limit: usize) -> String {
    let length = body.chars().count();
    if length <= limit {
        return body.to_string();
    }

    let start = slice_start(length, limit);
    body.chars().skip(start).take(limit).collect()
}

/// Start offset of the window for a body of `length` characters.
///
/// Only meaningful when `length > limit`.
pub fn slice_start(length: usize, limit: usize) -> usize {
    (length - limit).div_ceil(2)
}
