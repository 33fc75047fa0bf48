//! asdecrypt: decrypt a chunked RSA ciphertext with a composite key.
//!
//! Usage:
//!   asdecrypt [-k] <KEYFILE> (-i <INFILE> | -r) [-o <OUTFILE>] [-x] [-v] [-d] [-n]
//!
//! Plaintext goes to stdout unless `-o` is given; diagnostics, the public
//! key (`-x`) and the passphrase prompt use stderr / the terminal.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use diba_decrypt::pipeline::DUMP_TARGET;
use diba_decrypt::{
    buffer, Asdecrypt, Config, Error, InputSource, OutputSink, Passphrase, PassphrasePrompt, VERSION,
};

/// Exit status used when the last-resort panic hook fires.
const PANIC_EXIT: i32 = 111;

#[derive(Parser, Debug)]
#[command(name = "asdecrypt", version = VERSION, about = "Decrypt a chunked RSA ciphertext with a composite key")]
struct Cli {
    /// Composite key container
    #[arg(value_name = "KEYFILE", conflicts_with = "keyfile")]
    key: Option<PathBuf>,

    /// Composite key container
    #[arg(short = 'k', long = "keyfile", value_name = "KEYFILE")]
    keyfile: Option<PathBuf>,

    /// Armored ciphertext to decrypt
    #[arg(short = 'i', long = "infile", value_name = "INFILE", conflicts_with = "stdin")]
    infile: Option<PathBuf>,

    /// Write plaintext here instead of stdout
    #[arg(short = 'o', long = "outfile", value_name = "OUTFILE")]
    outfile: Option<PathBuf>,

    /// Key passphrase (testing only; prompts otherwise)
    #[arg(short = 'p', long = "pass", value_name = "PASS")]
    pass: Option<String>,

    /// Read ciphertext from stdin
    #[arg(short = 'r', long = "stdin")]
    stdin: bool,

    /// Debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Hex-dump the decoded stream and its blocks
    #[arg(short = 'd', long = "dump")]
    dump: bool,

    /// Key container is not encrypted
    #[arg(short = 'n', long = "nocrypt")]
    nocrypt: bool,

    /// Print the public key
    #[arg(short = 'x', long = "printpub")]
    printpub: bool,
}

/// Reads the passphrase from the controlling terminal without echo.
struct TerminalPrompt;

impl PassphrasePrompt for TerminalPrompt {
    fn read_passphrase(&mut self, prompt: &str) -> std::io::Result<String> {
        rpassword::prompt_password(prompt)
    }
}

fn init_logging(cli: &Cli) {
    let mut directives = String::from("warn");
    if cli.verbose {
        directives.push_str(",diba_decrypt=debug");
    }
    if cli.dump {
        directives.push_str(&format!(",{}=info", DUMP_TARGET));
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives)))
        .with_writer(std::io::stderr)
        .init();
}

fn config_from(cli: Cli) -> Result<Config, Error> {
    let key_file = cli
        .keyfile
        .or(cli.key)
        .ok_or_else(|| Error::Usage("no key file given".into()))?;

    let mut config = Config::new(key_file)
        .skip_decrypt(cli.nocrypt)
        .print_public(cli.printpub)
        .dump(cli.dump);
    if let Some(path) = cli.infile {
        config = config.with_input(InputSource::File(path));
    } else if cli.stdin {
        config = config.with_input(InputSource::Stdin);
    }
    if let Some(path) = cli.outfile {
        config = config.with_output(OutputSink::File(path));
    }
    if let Some(pass) = cli.pass {
        config = config.with_passphrase(Passphrase::new(pass));
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Error> {
    let config = config_from(cli)?;
    let outcome = Asdecrypt::new(config).run(&mut TerminalPrompt)?;
    if let Some(public) = &outcome.public_key {
        eprintln!("{}", public);
    }
    tracing::debug!(blocks = outcome.blocks, bytes = outcome.plaintext_len, "done");
    Ok(())
}

/// 0 on success, otherwise the error's own code (2 for usage errors, 1 for
/// the rest).
fn exit_status(result: &Result<(), Error>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => e.exit_code(),
    }
}

fn main() -> ExitCode {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        eprintln!("asdecrypt: internal error at {:?}: {}", location, payload);
        std::process::exit(PANIC_EXIT);
    }));

    let cli = Cli::parse();
    init_logging(&cli);

    let result = run(cli);
    buffer::report_leaks();

    if let Err(e) = &result {
        eprintln!("asdecrypt: {}", e);
    }
    ExitCode::from(exit_status(&result))
}
