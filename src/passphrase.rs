//! Passphrase value, acceptance policy and the prompt capability.

use std::fmt;
use std::io;

use zeroize::Zeroizing;

use crate::error::{Error, Result};

pub const MIN_PASSPHRASE_LEN: usize = 3;
pub const MAX_PASSPHRASE_LEN: usize = 128;

/// Secret that unlocks a composite-key container. Wiped on drop.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Zeroizing::new(s.into()))
    }

    /// Placeholder for no-decrypt mode.
    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(..)")
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Rules applied to interactively entered passphrases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassphrasePolicy {
    pub min_len: usize,
    pub max_len: usize,
    /// Score below which a passphrase counts as weak (see [`strength`]).
    pub min_strength: u8,
    /// Accept weak passphrases with a warning instead of rejecting them.
    pub allow_weak: bool,
    /// Prompts before giving up.
    pub attempts: u32,
}

impl Default for PassphrasePolicy {
    fn default() -> Self {
        Self {
            min_len: MIN_PASSPHRASE_LEN,
            max_len: MAX_PASSPHRASE_LEN,
            min_strength: 4,
            allow_weak: true,
            attempts: 3,
        }
    }
}

impl PassphrasePolicy {
    /// Check one candidate against the policy.
    pub fn check(&self, candidate: &Passphrase) -> Result<()> {
        let len = candidate.len();
        if len < self.min_len {
            return Err(Error::Passphrase(format!("must be at least {} characters", self.min_len)));
        }
        if len > self.max_len {
            return Err(Error::Passphrase(format!("must be at most {} characters", self.max_len)));
        }
        let score = strength(candidate.expose());
        if score < self.min_strength {
            if !self.allow_weak {
                return Err(Error::Passphrase(format!(
                    "too weak (strength {} of required {})",
                    score, self.min_strength
                )));
            }
            tracing::warn!(strength = score, required = self.min_strength, "accepting weak passphrase");
        }
        Ok(())
    }
}

/// Rough strength score: one point per character class used (lower, upper,
/// digit, other) plus one per length step of 8, 12 and 16 characters.
pub fn strength(s: &str) -> u8 {
    let classes = [
        s.chars().any(|c| c.is_lowercase()),
        s.chars().any(|c| c.is_uppercase()),
        s.chars().any(|c| c.is_ascii_digit()),
        s.chars().any(|c| !c.is_alphanumeric()),
    ];
    let len = s.chars().count();
    let class_score = classes.iter().filter(|&&used| used).count() as u8;
    let length_score = [8, 12, 16].iter().filter(|&&step| len >= step).count() as u8;
    class_score + length_score
}

// ---------------------------------------------------------------------------
// Prompt capability
// ---------------------------------------------------------------------------

/// Source of interactively entered passphrases (terminal, test script, ...).
pub trait PassphrasePrompt {
    fn read_passphrase(&mut self, prompt: &str) -> io::Result<String>;
}

/// Prompt until a candidate satisfies `policy` or the attempts run out.
pub fn acquire(prompt: &mut dyn PassphrasePrompt, message: &str, policy: &PassphrasePolicy) -> Result<Passphrase> {
    let mut last = Error::Passphrase("no attempts allowed".into());
    for attempt in 1..=policy.attempts {
        let candidate = Passphrase::new(prompt.read_passphrase(message).map_err(Error::stdio)?);
        match policy.check(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) => {
                tracing::warn!(attempt, "passphrase rejected: {}", e);
                last = e;
            }
        }
    }
    Err(last)
}
