use std::sync::LazyLock;

use regex::Regex;

static REPEATED_SLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https?://)|(/)+").expect("static regex is valid"));

/// Collapse repeated `/` in `url`, keeping the `//` after an `http(s)` scheme.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    REPEATED_SLASHES.replace_all(url, "$1$2").into_owned()
}

/// Join `path` onto `base` and normalize the result.
/// An empty `path` yields `base` unchanged.
pub(crate) fn join(base: &str, path: &str) -> String {
    if path.is_empty() {
        base.to_string()
    } else {
        normalize_url(&format!("{base}/{path}"))
    }
}
