//! Partition-key sanitization: identifiers like `ES.XCME` or `BTC/USDT` contain
//! characters that are awkward or unsafe in a directory name on common
//! filesystems. Sanitization is one-way; the original value is recovered via
//! the mapping sidecar, never by reversing the sanitized string itself.

/// Characters considered unsafe in a partition directory name.
const UNSAFE: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' '];

/// Replaces unsafe filesystem characters in `key` with `_`, leaving the
/// original recoverable only via the catalog's mapping sidecar.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if UNSAFE.contains(&c) { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ES.XCME", "ES.XCME")]
    #[case("BTC/USDT.BINANCE", "BTC_USDT.BINANCE")]
    #[case("A B:C", "A_B_C")]
    fn sanitize_replaces_unsafe_characters(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_key(input), expected);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_key("BTC/USDT.BINANCE");
        assert_eq!(sanitize_key(&once), once);
    }
}
