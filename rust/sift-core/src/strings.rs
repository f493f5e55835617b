//! Byte-level string builtin semantics.
//!
//! These are the single source of truth for `to_lower`, `strstr`, and
//! `sub_bytes`: the compiler calls them when folding constant arguments and
//! the VM calls them when executing the corresponding instructions.

/// ASCII byte-wise lowercasing. Non-ASCII bytes pass through untouched.
pub fn to_lower(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// 1-based position of the first occurrence of `little` in `big`, 0 when
/// absent. An empty needle reports position 1.
pub fn strstr(big: &str, little: &str) -> u64 {
    if little.is_empty() {
        return 1;
    }
    big.as_bytes()
        .windows(little.len())
        .position(|w| w == little.as_bytes())
        .map(|i| i as u64 + 1)
        .unwrap_or(0)
}

/// Substring extraction over bytes: `start` is 1-based (values below 1 are
/// clamped to 1), the window is clamped to the subject, and a negative `n`
/// means "through the end".
pub fn sub_bytes(s: &str, start: u64, n: i64) -> String {
    let bytes = s.as_bytes();
    let begin = (start.max(1) - 1) as usize;
    if begin >= bytes.len() {
        return String::new();
    }
    let end = if n < 0 {
        bytes.len()
    } else {
        (begin + n as usize).min(bytes.len())
    };
    String::from_utf8_lossy(&bytes[begin..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower() {
        assert_eq!(to_lower("AbC"), "abc");
        assert_eq!(to_lower("already"), "already");
        assert_eq!(to_lower("MIXED 123!"), "mixed 123!");
    }

    #[test]
    fn test_strstr() {
        assert_eq!(strstr("haystack", "stack"), 4);
        assert_eq!(strstr("haystack", "hay"), 1);
        assert_eq!(strstr("haystack", "needle"), 0);
        assert_eq!(strstr("haystack", ""), 1);
        assert_eq!(strstr("", "x"), 0);
    }

    #[test]
    fn test_sub_bytes() {
        assert_eq!(sub_bytes("abcdefgh", 2, 5), "bcdef");
        assert_eq!(sub_bytes("abcdefgh", 0, 3), "abc"); // start clamped to 1
        assert_eq!(sub_bytes("abcdefgh", 7, 10), "gh"); // window clamped
        assert_eq!(sub_bytes("abcdefgh", 3, -1), "cdefgh"); // to the end
        assert_eq!(sub_bytes("abc", 9, 2), "");
    }
}
