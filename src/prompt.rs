//! Yes/no confirmation capability.
//!
//! Injected into the reconciliation engine so the core logic never talks
//! to a terminal directly: tests script the answers, and batch mode swaps
//! in [`AssumeYes`].

use std::io::{self, BufRead, Write};

pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Interactive stdin prompt. Empty input defaults to yes.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        print!("{prompt} [Y/n] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        let answer = line.trim();
        answer.is_empty()
            || answer.eq_ignore_ascii_case("y")
            || answer.eq_ignore_ascii_case("yes")
    }
}

/// Non-interactive batch mode: every prompt is accepted.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}
