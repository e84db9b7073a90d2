// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The comparison oracle for judge task output: decides whether the observed
//! stdout/stderr from a task satisfies the expected pattern. Pure, no I/O.

/// Returns `true` when `expected` and `actual` are equivalent under the
/// judge's matching rule: byte-equal after normalising line endings to `\n`.
///
/// This is exact-match textual comparison, not a custom checker; see the
/// crate-level Non-goals.
pub fn matches(expected: &str, actual: &str) -> bool {
    normalize_newlines(expected) == normalize_newlines(actual)
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_match() {
        assert!(matches("Hello, World!\n", "Hello, World!\n"));
    }

    #[test]
    fn differing_strings_do_not_match() {
        assert!(!matches("42\n", "43\n"));
    }

    #[test]
    fn crlf_is_normalised_to_lf() {
        assert!(matches("a\nb\n", "a\r\nb\r\n"));
    }

    #[test]
    fn trailing_whitespace_is_significant() {
        assert!(!matches("Hello, World!\n", "Hello, World! \n"));
    }

    #[test]
    fn empty_streams_match() {
        assert!(matches("", ""));
    }
}
