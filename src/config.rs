//! Run configuration: built once, never mutated while the pipeline runs.

use std::path::PathBuf;
use std::time::Duration;

use crate::passphrase::{Passphrase, PassphrasePolicy};

/// Largest interactive input accepted, in bytes.
pub const DEFAULT_MAX_STDIN_BYTES: usize = 10_000;

/// Pause before reporting a composite key that failed to parse.
pub const DEFAULT_UNLOCK_FAILURE_DELAY: Duration = Duration::from_millis(300);

pub const PASSPHRASE_PROMPT: &str = "Enter keypair pass: ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    /// Interactive byte stream, capped at `max_stdin_bytes`.
    Stdin,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum OutputSink {
    File(PathBuf),
    #[default]
    Stdout,
}

/// How the plaintext buffer limit is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CapacityBound {
    /// `block_count * key_byte_length`; raw RSA never yields more.
    #[default]
    Exact,
    /// `2 * decoded_input_length + key_byte_length`.
    Heuristic,
}

impl CapacityBound {
    pub fn limit(self, block_count: usize, input_len: usize, key_bytes: usize) -> usize {
        match self {
            Self::Exact => block_count.saturating_mul(key_bytes),
            Self::Heuristic => input_len.saturating_mul(2).saturating_add(key_bytes),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub key_file: PathBuf,
    pub input: Option<InputSource>,
    pub output: OutputSink,
    /// Explicit passphrase (testing only); prompts when `None`.
    pub passphrase: Option<Passphrase>,
    /// Treat the container as an unencrypted record.
    pub skip_decrypt: bool,
    /// Render the public portion of the key.
    pub print_public: bool,
    /// Hex-dump the decoded stream and blocks to the log.
    pub dump: bool,
    pub max_stdin_bytes: usize,
    pub unlock_failure_delay: Duration,
    pub passphrase_policy: PassphrasePolicy,
    pub capacity_bound: CapacityBound,
}

impl Config {
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: key_file.into(),
            input: None,
            output: OutputSink::Stdout,
            passphrase: None,
            skip_decrypt: false,
            print_public: false,
            dump: false,
            max_stdin_bytes: DEFAULT_MAX_STDIN_BYTES,
            unlock_failure_delay: DEFAULT_UNLOCK_FAILURE_DELAY,
            passphrase_policy: PassphrasePolicy::default(),
            capacity_bound: CapacityBound::default(),
        }
    }

    pub fn with_input(mut self, input: InputSource) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.output = output;
        self
    }

    pub fn with_passphrase(mut self, passphrase: Passphrase) -> Self {
        self.passphrase = Some(passphrase);
        self
    }

    pub fn skip_decrypt(mut self, skip: bool) -> Self {
        self.skip_decrypt = skip;
        self
    }

    pub fn print_public(mut self, print: bool) -> Self {
        self.print_public = print;
        self
    }

    pub fn dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    pub fn with_max_stdin_bytes(mut self, max: usize) -> Self {
        self.max_stdin_bytes = max;
        self
    }

    pub fn with_unlock_failure_delay(mut self, delay: Duration) -> Self {
        self.unlock_failure_delay = delay;
        self
    }

    pub fn with_passphrase_policy(mut self, policy: PassphrasePolicy) -> Self {
        self.passphrase_policy = policy;
        self
    }

    pub fn with_capacity_bound(mut self, bound: CapacityBound) -> Self {
        self.capacity_bound = bound;
        self
    }

    /// Name used for the key container in messages.
    pub fn key_name(&self) -> String {
        self.key_file.display().to_string()
    }
}
