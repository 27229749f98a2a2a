use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use a64_tv::aslt::lower_semantics_to_ir;
use a64_tv::{Config, HttpSemanticsClient, SemanticsClient};

#[derive(Parser)]
#[command(name = "a64-tv")]
#[command(about = "Debugging driver for the AArch64 machine-code lifter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the semantics listing the backend returns for an encoding.
    Fetch {
        #[arg(help = "32-bit instruction words, hex (e.g. 0x8b020020)")]
        encodings: Vec<String>,
    },
    /// Fetch, parse, and lower encodings; print the resulting IR.
    Lift {
        #[arg(help = "32-bit instruction words, hex")]
        encodings: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::global().map_err(|e| anyhow::anyhow!("{e}"))?;
    let mut client = HttpSemanticsClient::from_config(config);

    match cli.command {
        Commands::Fetch { encodings } => {
            for raw in encodings {
                let word = parse_word(&raw)?;
                match client.fetch(word).map_err(|e| anyhow::anyhow!("{e}"))? {
                    Some(reply) => {
                        println!("# 0x{word:08x} {}", reply.encoding);
                        println!("{}", reply.semantics);
                    }
                    None => println!("# 0x{word:08x} missing"),
                }
            }
        }
        Commands::Lift { encodings } => {
            for raw in encodings {
                let word = parse_word(&raw)?;
                let Some(reply) = client.fetch(word).map_err(|e| anyhow::anyhow!("{e}"))? else {
                    bail!("no semantics for 0x{word:08x}");
                };
                let ir = lower_semantics_to_ir(&reply.encoding, &reply.semantics, config.debug)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                println!("; 0x{word:08x} {}", reply.encoding);
                println!("{ir}");
            }
        }
    }

    Ok(())
}

fn parse_word(raw: &str) -> Result<u32> {
    let trimmed = raw.trim().trim_start_matches("0x");
    u32::from_str_radix(trimmed, 16).with_context(|| format!("bad instruction word: {raw}"))
}
