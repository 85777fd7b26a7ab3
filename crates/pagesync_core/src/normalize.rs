/// Canonical comparison key for field labels and page titles.
///
/// Lowercases, splits on runs of whitespace and the separator characters
/// `:`, `-`, `_`, trims non-alphanumeric characters from both ends of
/// each token, drops tokens that are exactly `is`, and joins what
/// remains. "Status:", "status -" and "Status" all map to the same key.
///
/// Earlier tooling stripped the substring "is" anywhere in the label,
/// which corrupted labels such as "This Field". Removal here is
/// whole-token only. The token drop runs after edge trimming, and a
/// joined key equal to `is` collapses to empty, so the function is a
/// fixpoint: normalize(normalize(x)) == normalize(x).
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let joined = lowered
        .split(is_separator)
        .map(|token| token.trim_matches(|ch: char| !ch.is_alphanumeric()))
        .filter(|token| !token.is_empty() && *token != "is")
        .collect::<String>();
    if joined == "is" { String::new() } else { joined }
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, ':' | '-' | '_')
}
