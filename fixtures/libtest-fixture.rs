// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! A small libtest binary for exercising testpackage end to end.
//!
//! Build with `rustc --test`. A test fails if its name is listed in `failing.txt` in the current
//! directory.

fn told_to_fail(name: &str) -> bool {
    std::fs::read_to_string("failing.txt")
        .unwrap_or_default()
        .lines()
        .any(|line| line.trim() == name)
}

mod lexer {
    #[test]
    fn tokens() {
        println!("lexing fixture input");
        assert!(!super::told_to_fail("tokens"), "tokens was told to fail");
    }
}

mod parser {
    #[test]
    fn parses_empty() {
        assert!(
            !super::told_to_fail("parses_empty"),
            "parses_empty was told to fail"
        );
    }

    #[test]
    fn parses_nested() -> Result<(), String> {
        if super::told_to_fail("parses_nested") {
            return Err("parses_nested was told to fail".to_owned());
        }
        Ok(())
    }

    #[test]
    #[ignore = "slow"]
    fn slow() {}
}
