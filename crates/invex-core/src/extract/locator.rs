//! Best-effort location of a JSON object inside free text.

/// Return the substring from the first `{` to the last `}`, inclusive.
///
/// This is not a balanced-brace scanner: prose between an early `{` and an
/// unrelated later `}` is kept, and the result then fails to parse. Output
/// with no `{`, no `}`, or the last `}` before the first `{` yields an empty
/// string.
pub fn locate_json_object(raw: &str) -> &str {
    let Some(start) = raw.find('{') else {
        return "";
    };
    let Some(end) = raw.rfind('}') else {
        return "";
    };
    if end < start {
        return "";
    }
    &raw[start..=end]
}
