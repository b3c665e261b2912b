use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use gxmss::MESSAGE_LENGTH;
use gxmss::params::{EncodingKind, HashVariant, ParameterSet};
use gxmss::serialization::Serializable;
use gxmss::signature::generalized_xmss::instantiations_poseidon::*;
use gxmss::signature::{KeyRetention, SignatureScheme, SignatureSchemeSecretKey};

/// Generalized XMSS signatures over KoalaBear / Poseidon2.
#[derive(Parser)]
#[command(name = "gxmss")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    /// Rejection-sample rho until the chunks hit a fixed target sum.
    TargetSum,
    /// Winternitz chunks with a checksum, single attempt.
    Winternitz,
}

#[derive(Clone, Copy, ValueEnum)]
enum HashArg {
    /// Chain steps on the width-16 Poseidon2 permutation.
    W16,
    /// Chain steps on the width-24 Poseidon2 permutation.
    W24,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair; writes <out>.pk and <out>.sk.
    Keygen {
        /// Base-2 logarithm of the key lifetime (8, 10, 16, 18, 20, 28, 32).
        #[arg(long)]
        lifetime: usize,
        /// First epoch the key is active for.
        #[arg(long, default_value_t = 0)]
        activation: u64,
        /// Number of active epochs.
        #[arg(long)]
        count: u64,
        /// Output path prefix.
        #[arg(long)]
        out: PathBuf,
        /// Message encoding.
        #[arg(long, value_enum, default_value_t = EncodingArg::TargetSum)]
        encoding: EncodingArg,
        /// Chain hash variant.
        #[arg(long, value_enum, default_value_t = HashArg::W16)]
        hash: HashArg,
        /// Drop old subtrees while advancing; the secret key serializes in
        /// its minimal form.
        #[arg(long)]
        minimal: bool,
    },
    /// Sign a message at an epoch.
    Sign {
        /// Secret key file.
        #[arg(long)]
        sk: PathBuf,
        /// Epoch to sign at. The caller must never reuse an epoch.
        #[arg(long)]
        epoch: u64,
        /// Message, exactly 32 bytes, hex encoded.
        #[arg(long)]
        msg: String,
        /// Output path for the signature.
        #[arg(long)]
        out: PathBuf,
    },
    /// Verify a signature.
    Verify {
        /// Public key file.
        #[arg(long)]
        pk: PathBuf,
        /// Epoch the signature was issued for.
        #[arg(long)]
        epoch: u64,
        /// Message, exactly 32 bytes, hex encoded.
        #[arg(long)]
        msg: String,
        /// Signature file.
        #[arg(long)]
        sig: PathBuf,
    },
    /// Print what a key file contains.
    Inspect {
        /// Public or secret key file.
        #[arg(long)]
        key: PathBuf,
    },
}

type CliError = Box<dyn std::error::Error>;

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Keygen {
            lifetime,
            activation,
            count,
            out,
            encoding,
            hash,
            minimal,
        } => keygen(lifetime, activation, count, &out, encoding, hash, minimal),
        Commands::Sign {
            sk,
            epoch,
            msg,
            out,
        } => sign(&sk, epoch, &msg, &out),
        Commands::Verify {
            pk,
            epoch,
            msg,
            sig,
        } => verify(&pk, epoch, &msg, &sig),
        Commands::Inspect { key } => inspect(&key),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Runs a closure generic over the scheme selected by a parameter tag.
macro_rules! with_scheme {
    ($tag:expr, $S:ident, $body:block) => {
        match $tag {
            0x01 => { type $S = SigTargetSumLifetime8; $body }
            0x02 => { type $S = SigTargetSumLifetime10; $body }
            0x03 => { type $S = SigTargetSumLifetime16; $body }
            0x04 => { type $S = SigTargetSumLifetime18; $body }
            0x05 => { type $S = SigTargetSumLifetime20; $body }
            0x06 => { type $S = SigTargetSumLifetime28; $body }
            0x07 => { type $S = SigTargetSumLifetime32; $body }
            0x11 => { type $S = SigWinternitzLifetime8; $body }
            0x12 => { type $S = SigWinternitzLifetime10; $body }
            0x13 => { type $S = SigWinternitzLifetime16; $body }
            0x14 => { type $S = SigWinternitzLifetime18; $body }
            0x15 => { type $S = SigWinternitzLifetime20; $body }
            0x16 => { type $S = SigWinternitzLifetime28; $body }
            0x17 => { type $S = SigWinternitzLifetime32; $body }
            0x21 => { type $S = SigTargetSumW24Lifetime8; $body }
            0x22 => { type $S = SigTargetSumW24Lifetime10; $body }
            0x23 => { type $S = SigTargetSumW24Lifetime16; $body }
            0x24 => { type $S = SigTargetSumW24Lifetime18; $body }
            0x25 => { type $S = SigTargetSumW24Lifetime20; $body }
            0x26 => { type $S = SigTargetSumW24Lifetime28; $body }
            0x27 => { type $S = SigTargetSumW24Lifetime32; $body }
            other => Err(format!("unrecognized parameter tag {other:#04x}").into()),
        }
    };
}

/// Maps the keygen flags to the parameter tag of the matching instantiation.
fn select_tag(lifetime: usize, encoding: EncodingArg, hash: HashArg) -> Result<u8, CliError> {
    let (encoding, hash_variant) = match (encoding, hash) {
        (EncodingArg::TargetSum, HashArg::W16) => {
            (EncodingKind::TargetSum, HashVariant::Poseidon2Width16)
        }
        (EncodingArg::TargetSum, HashArg::W24) => {
            (EncodingKind::TargetSum, HashVariant::Poseidon2Width24)
        }
        (EncodingArg::Winternitz, HashArg::W16) => {
            (EncodingKind::Winternitz, HashVariant::Poseidon2Width16)
        }
        (EncodingArg::Winternitz, HashArg::W24) => {
            return Err("the Winternitz encoding is only available with --hash w16".into());
        }
    };

    gxmss::params::RECOGNIZED
        .iter()
        .find(|p| {
            p.lifetime_log2 == lifetime && p.encoding == encoding && p.hash_variant == hash_variant
        })
        .map(|p| p.tag)
        .ok_or_else(|| format!("no parameter set with lifetime 2^{lifetime}").into())
}

fn parse_message(msg: &str) -> Result<[u8; MESSAGE_LENGTH], CliError> {
    let bytes = hex::decode(msg)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("message must be exactly {MESSAGE_LENGTH} bytes").into())
}

/// Reads the parameter tag out of a key file: the last byte of a public key,
/// the byte after the header of a secret key.
fn peek_tag(bytes: &[u8]) -> Result<u8, CliError> {
    match bytes.len() {
        33 => Ok(bytes[32]),
        n if n >= 49 => Ok(bytes[48]),
        n => Err(format!("{n} bytes is not a key file").into()),
    }
}

fn keygen(
    lifetime: usize,
    activation: u64,
    count: u64,
    out: &Path,
    encoding: EncodingArg,
    hash: HashArg,
    minimal: bool,
) -> Result<(), CliError> {
    let tag = select_tag(lifetime, encoding, hash)?;
    let retention = if minimal {
        KeyRetention::Minimal
    } else {
        KeyRetention::Full
    };

    with_scheme!(tag, S, {
        let mut rng = rand::rng();
        let (pk, sk) = S::key_gen(&mut rng, activation, count, retention)?;

        let pk_path = out.with_extension("pk");
        let sk_path = out.with_extension("sk");
        fs::write(&pk_path, pk.to_bytes())?;
        fs::write(&sk_path, sk.to_bytes())?;

        let interval = sk.activation_interval();
        println!(
            "wrote {} and {} (active epochs [{}, {}))",
            pk_path.display(),
            sk_path.display(),
            interval.start,
            interval.end
        );
        Ok(())
    })
}

fn sign(sk_path: &Path, epoch: u64, msg: &str, out: &Path) -> Result<(), CliError> {
    let message = parse_message(msg)?;
    let sk_bytes = fs::read(sk_path)?;
    let tag = peek_tag(&sk_bytes)?;

    with_scheme!(tag, S, {
        let mut sk = <S as SignatureScheme>::SecretKey::from_bytes(&sk_bytes)?;

        // materialise and advance until the epoch is in the window
        sk.prepare()?;
        while !sk.prepared_interval().contains(&epoch)
            && sk.activation_interval().contains(&epoch)
        {
            sk.advance_preparation()?;
        }

        let signature = S::sign(&sk, epoch, &message)?;
        fs::write(out, signature.to_bytes())?;
        println!("wrote {}", out.display());
        Ok(())
    })
}

fn verify(pk_path: &Path, epoch: u64, msg: &str, sig_path: &Path) -> Result<(), CliError> {
    let message = parse_message(msg)?;
    let pk_bytes = fs::read(pk_path)?;
    let sig_bytes = fs::read(sig_path)?;
    let tag = peek_tag(&pk_bytes)?;

    with_scheme!(tag, S, {
        let pk = <S as SignatureScheme>::PublicKey::from_bytes(&pk_bytes)?;
        let signature = <S as SignatureScheme>::Signature::from_bytes(&sig_bytes)?;

        if S::verify(&pk, epoch, &message, &signature)? {
            println!("signature valid");
            Ok(())
        } else {
            Err("signature invalid".into())
        }
    })
}

fn describe(params: &ParameterSet) -> String {
    let encoding = match params.encoding {
        EncodingKind::TargetSum => "target-sum",
        EncodingKind::Winternitz => "winternitz",
    };
    let hash = match params.hash_variant {
        HashVariant::Poseidon2Width16 => "poseidon2-w16",
        HashVariant::Poseidon2Width24 => "poseidon2-w24",
    };
    format!(
        "tag {:#04x}: {hash}, lifetime 2^{}, {encoding}, {} chains of length {}, {} field elements per hash",
        params.tag,
        params.lifetime_log2,
        params.num_chains,
        params.chain_length,
        params.field_elems_per_hash
    )
}

fn inspect(key_path: &Path) -> Result<(), CliError> {
    let bytes = fs::read(key_path)?;
    let tag = peek_tag(&bytes)?;
    let params =
        ParameterSet::from_tag(tag).ok_or(format!("unrecognized parameter tag {tag:#04x}"))?;

    if bytes.len() == 33 {
        println!("public key, {}", describe(params));
        println!("root: {}", hex::encode(&bytes[..32]));
        return Ok(());
    }

    with_scheme!(tag, S, {
        let sk = <S as SignatureScheme>::SecretKey::from_bytes(&bytes)?;
        let form = if bytes.len() == 49 { "minimal" } else { "full" };
        println!("secret key ({form} form), {}", describe(params));
        let activation = sk.activation_interval();
        println!("active epochs: [{}, {})", activation.start, activation.end);
        let window = sk.prepared_interval();
        if window.is_empty() {
            println!("prepared window: none (prepare to materialise)");
        } else {
            println!("prepared window: [{}, {})", window.start, window.end);
        }
        Ok(())
    })
}
