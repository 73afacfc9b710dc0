//! Random alphanumeric key/value generation for test scenarios.

use rand::RngExt;

const ALPHANUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate `count` random strings with lengths in `min_len..=max_len`.
pub fn new_test_strings(count: usize, min_len: usize, max_len: usize) -> Vec<String> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let len = rng.random_range(min_len..=max_len);
            (0..len)
                .map(|_| ALPHANUM[rng.random_range(0..ALPHANUM.len())] as char)
                .collect()
        })
        .collect()
}

/// Convenience for the common key/value pair case.
pub fn new_test_pair() -> (String, String) {
    let mut strings = new_test_strings(2, 8, 16);
    let value = strings.pop().unwrap_or_default();
    let key = strings.pop().unwrap_or_default();
    (key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_length_bounds() {
        for s in new_test_strings(100, 8, 16) {
            assert!(s.len() >= 8 && s.len() <= 16, "bad length: {}", s);
        }
    }

    #[test]
    fn only_alphanumeric_output() {
        for s in new_test_strings(50, 8, 16) {
            assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn pair_yields_distinct_nonempty_strings() {
        let (key, value) = new_test_pair();
        assert!(!key.is_empty());
        assert!(!value.is_empty());
    }
}
