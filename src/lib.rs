//! # diba-decrypt
//!
//! Decrypts a chunked raw-RSA ciphertext stream with a private key unlocked
//! from a passphrase-protected composite-key container.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use diba_decrypt::{Asdecrypt, Config, InputSource, PassphrasePrompt};
//!
//! struct Fixed;
//!
//! impl PassphrasePrompt for Fixed {
//!     fn read_passphrase(&mut self, _prompt: &str) -> std::io::Result<String> {
//!         Ok("correct-horse".into())
//!     }
//! }
//!
//! let config = Config::new("alice.key").with_input(InputSource::File("secret.txt".into()));
//! let outcome = Asdecrypt::new(config).run(&mut Fixed).unwrap();
//! eprintln!("{} bytes from {} blocks", outcome.plaintext_len, outcome.blocks);
//! ```
//!
//! ## Data flow
//!
//! ```text
//! container: armor -> "DCK1" sealed body -> AES-256-CBC/PBKDF2 -> S-expression record
//! stream:    armor -> [len u16 LE | RSA ciphertext]* -> raw RSA per block -> plaintext
//! ```
//!
//! ## Properties
//!
//! - **Bounded buffers**: every buffer has a hard limit; overruns are errors,
//!   never truncation or silent growth
//! - **Scoped secrets**: buffers, passphrases and record atoms are wiped on drop
//! - **Slow rejection**: a container that does not parse after unlocking
//!   (usually a wrong passphrase) is rejected only after a fixed delay
//!
//! ## What's NOT Provided
//!
//! - Encryption or key generation
//! - Padding schemes (OAEP, PKCS#1 v1.5)
//! - Streaming output

#![deny(unsafe_code)]

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

pub mod armor;
pub mod assemble;
pub mod buffer;
pub mod composite;
pub mod config;
pub mod container;
pub mod error;
pub mod framing;
pub mod io;
pub mod passphrase;
pub mod pipeline;
pub mod provider;
pub mod sexp;

// ---------------------------------------------------------------------------
// Public interface
// ---------------------------------------------------------------------------

pub use composite::{KeyLoader, PrivateKeyHandle};
pub use config::{CapacityBound, Config, InputSource, OutputSink};
pub use error::{Error, ErrorKind, Result};
pub use passphrase::{Passphrase, PassphrasePolicy, PassphrasePrompt};
pub use pipeline::{Decrypted, Outcome, Pipeline};
pub use provider::{PrimitiveProvider, RustCryptoProvider};

/// Pipeline over the default RustCrypto primitives.
pub type Asdecrypt = Pipeline<RustCryptoProvider>;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
