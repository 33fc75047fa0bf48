//! Pipeline orchestrator.
//!
//! ```text
//! key file ──read──> container ──unlock──> PrivateKeyHandle
//!                                               │
//! input ──read──> armor ──decode──> stream ──split──> blocks ──decrypt_all──> plaintext ──> sink
//! ```
//!
//! Every intermediate buffer is owned by the stage that produced it and
//! dropped (wiped) on every exit path.

use std::io::{self as stdio, Read, Write};
use std::marker::PhantomData;

use crate::assemble;
use crate::buffer::SecureBuffer;
use crate::composite::{KeyLoader, PrivateKeyHandle};
use crate::config::{Config, InputSource, PASSPHRASE_PROMPT};
use crate::error::{Error, Result};
use crate::framing;
use crate::io;
use crate::passphrase::{self, Passphrase, PassphrasePrompt};
use crate::provider::{PrimitiveProvider, RustCryptoProvider};

/// Log target for `dump` output. Never carries key material.
pub const DUMP_TARGET: &str = "diba_decrypt::dump";

const CONTAINER_LABEL: &str = "key container";
const INPUT_LABEL: &str = "input buffer";

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub plaintext_len: usize,
    pub blocks: usize,
    pub key_bits: usize,
    /// Rendered public key, when `print_public` was requested.
    pub public_key: Option<String>,
}

/// Decrypted stream with its block count.
#[derive(Debug)]
pub struct Decrypted {
    pub plaintext: SecureBuffer,
    pub blocks: usize,
}

pub struct Pipeline<P: PrimitiveProvider = RustCryptoProvider> {
    config: Config,
    _marker: PhantomData<P>,
}

impl<P: PrimitiveProvider> Pipeline<P> {
    pub fn new(config: Config) -> Self {
        Self { config, _marker: PhantomData }
    }

    /// Run against the process's standard streams.
    pub fn run(&self, prompt: &mut dyn PassphrasePrompt) -> Result<Outcome> {
        let stdin = stdio::stdin();
        let stdout = stdio::stdout();
        self.run_with(prompt, &mut stdin.lock(), &mut stdout.lock())
    }

    /// Run with explicit streams. `stdin` is read only for
    /// [`InputSource::Stdin`]; `stdout` is written only for
    /// [`OutputSink::Stdout`](crate::config::OutputSink::Stdout).
    pub fn run_with(
        &self,
        prompt: &mut dyn PassphrasePrompt,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> Result<Outcome> {
        if self.config.input.is_none() && !self.config.print_public {
            return Err(Error::Usage("need data to decrypt".into()));
        }

        let key = self.unlock(prompt)?;
        let public_key = self.config.print_public.then(|| key.public_record().to_string());

        let Some(input) = &self.config.input else {
            return Ok(Outcome { plaintext_len: 0, blocks: 0, key_bits: key.bits(), public_key });
        };

        let raw = match input {
            InputSource::File(path) => io::read_file(path, INPUT_LABEL)?,
            InputSource::Stdin => io::read_capped(stdin, self.config.max_stdin_bytes, INPUT_LABEL)?,
        };
        let decrypted = self.decrypt(&key, raw.as_slice())?;
        drop(raw);

        io::write_output(&self.config.output, decrypted.plaintext.as_slice(), stdout)?;
        tracing::debug!(
            blocks = decrypted.blocks,
            bytes = decrypted.plaintext.len(),
            "plaintext written"
        );

        Ok(Outcome {
            plaintext_len: decrypted.plaintext.len(),
            blocks: decrypted.blocks,
            key_bits: key.bits(),
            public_key,
        })
    }

    /// Read and unlock the configured key container. The passphrase is
    /// asked for only once the container's encoding has been decoded.
    pub fn unlock(&self, prompt: &mut dyn PassphrasePrompt) -> Result<PrivateKeyHandle> {
        let name = self.config.key_name();
        let loader = KeyLoader::<P>::from_config(&self.config);
        let container = io::read_file(&self.config.key_file, CONTAINER_LABEL)?;
        let decoded = loader.decode(&name, container.as_slice())?;
        drop(container);
        let pass = self.passphrase(prompt)?;
        loader.unlock(&name, decoded, &pass)
    }

    fn passphrase(&self, prompt: &mut dyn PassphrasePrompt) -> Result<Passphrase> {
        if let Some(pass) = &self.config.passphrase {
            return Ok(pass.clone());
        }
        if self.config.skip_decrypt {
            return Ok(Passphrase::empty());
        }
        passphrase::acquire(prompt, PASSPHRASE_PROMPT, &self.config.passphrase_policy)
    }

    /// Decode, split and decrypt an encoded ciphertext stream.
    pub fn decrypt(&self, key: &PrivateKeyHandle, encoded: &[u8]) -> Result<Decrypted> {
        let stream = P::decode_stream_encoding(encoded)?;
        if self.config.dump {
            tracing::info!(target: DUMP_TARGET, bytes = stream.len(), "stream {}", hex::encode(stream.as_slice()));
        }

        let blocks = framing::split_blocks(stream.as_slice())?;
        if self.config.dump {
            for block in &blocks {
                tracing::info!(
                    target: DUMP_TARGET,
                    index = block.index,
                    offset = block.offset,
                    "block {}",
                    hex::encode(block.payload)
                );
            }
        }

        let limit = self
            .config
            .capacity_bound
            .limit(blocks.len(), stream.len(), key.byte_len());
        let plaintext = assemble::decrypt_all::<P>(&blocks, key, limit)?;
        Ok(Decrypted { plaintext, blocks: blocks.len() })
    }
}
