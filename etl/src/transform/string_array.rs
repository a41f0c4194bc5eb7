//! Decoder for the bracketed pseudo-lists found in the raw dataset,
//! e.g. `['Pop', 'Dance Pop']`.
//!
//! Elements are split on every comma, so quoted names containing a comma
//! or an escaped quote are not reassembled.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected a bracketed list, got '{raw}'")]
pub struct MalformedList {
    pub raw: String,
}

/// Decodes a pseudo-list, reporting malformed input to the caller.
///
/// Empty or whitespace-only input is not malformed and yields no elements.
pub fn try_parse_string_array(input: &str) -> Result<Vec<String>, MalformedList> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let inner = input
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| MalformedList {
            raw: input.to_string(),
        })?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(inner.split(',').map(unquote).collect())
}

fn unquote(item: &str) -> String {
    let item = item.trim();
    let item = item.strip_prefix('\'').unwrap_or(item);
    let item = item.strip_suffix('\'').unwrap_or(item);
    item.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> Vec<String> {
        try_parse_string_array(input).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert!(decode("").is_empty());
        assert!(decode("   ").is_empty());
    }

    #[test]
    fn test_two_elements() {
        assert_eq!(decode("['a', 'b']"), vec!["a", "b"]);
    }

    #[test]
    fn test_artist_ids() {
        assert_eq!(
            decode("['45tIt06XoI0Iio4LBEVpls', '14jtPCOoNZwquk5wd9DxrY']"),
            vec!["45tIt06XoI0Iio4LBEVpls", "14jtPCOoNZwquk5wd9DxrY"]
        );
    }

    #[test]
    fn test_malformed_is_reported() {
        assert!(try_parse_string_array("not-a-list").is_err());
        assert_eq!(
            try_parse_string_array("['a'"),
            Err(MalformedList {
                raw: "['a'".to_string()
            })
        );
    }

    #[test]
    fn test_bracket_pair_without_elements() {
        assert!(decode("[]").is_empty());
        assert!(decode("[ ]").is_empty());
    }

    #[test]
    fn test_trailing_comma_keeps_empty_element() {
        assert_eq!(decode("['a', ]"), vec!["a", ""]);
    }

    #[test]
    fn test_commas_inside_quotes_are_split() {
        assert_eq!(
            decode("['Earth, Wind & Fire']"),
            vec!["Earth", "Wind & Fire"]
        );
    }

    #[test]
    fn test_single_quote_stripped_once() {
        assert_eq!(decode("[''quoted'']"), vec!["'quoted'"]);
    }

    #[test]
    fn test_deterministic() {
        let input = "['x', 'y', 'z']";
        assert_eq!(decode(input), decode(input));
    }
}
