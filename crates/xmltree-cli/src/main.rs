use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use xmltree_core::XmlDocument;

#[derive(Parser, Debug)]
#[command(name = "xmltree")]
#[command(about = "Read and edit path-addressed XML configuration documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the decoded text value of a key
    Get { file: PathBuf, key: String },
    /// Set a key's value, creating or deleting it as needed
    Set {
        file: PathBuf,
        key: String,
        /// New value; omit together with --delete to remove the key
        #[arg(long)]
        value: Option<String>,
        /// Delete the key instead of setting a value
        #[arg(long, conflicts_with = "value")]
        delete: bool,
    },
    /// Append a new element that must not already exist
    Append {
        file: PathBuf,
        key: String,
        #[arg(long)]
        value: Option<String>,
    },
    /// Delete an element (idempotent)
    Delete { file: PathBuf, key: String },
    /// Check whether a key resolves to anything
    Exists { file: PathBuf, key: String },
    /// Print the canonical form of a key
    ExpandKey { file: PathBuf, key: String },
    /// List every key in the document, in write order
    Keys { file: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Warn).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Get { file, key } => {
            let source = read_file(&file)?;
            let doc = XmlDocument::new(&source);
            log::debug!("get {key:?} against {}", file.display());
            let value = doc.get(&key).with_context(|| format!("get {key:?}"))?;
            println!("{value}");
        }
        Command::Set { file, key, value, delete } => {
            let source = read_file(&file)?;
            let mut doc = XmlDocument::new(&source);
            let value = if delete { None } else { value.as_deref() };
            log::debug!("set {key:?} = {value:?} against {}", file.display());
            doc.set(&key, value).with_context(|| format!("set {key:?}"))?;
            write_back(&file, &doc)?;
        }
        Command::Append { file, key, value } => {
            let source = read_file(&file)?;
            let mut doc = XmlDocument::new(&source);
            log::debug!("append {key:?} = {value:?} against {}", file.display());
            doc.append(&key, value.as_deref()).with_context(|| format!("append {key:?}"))?;
            write_back(&file, &doc)?;
        }
        Command::Delete { file, key } => {
            let source = read_file(&file)?;
            let mut doc = XmlDocument::new(&source);
            log::debug!("delete {key:?} against {}", file.display());
            doc.delete(&key).with_context(|| format!("delete {key:?}"))?;
            write_back(&file, &doc)?;
        }
        Command::Exists { file, key } => {
            let source = read_file(&file)?;
            let doc = XmlDocument::new(&source);
            println!("{}", doc.exists(&key));
        }
        Command::ExpandKey { file, key } => {
            let source = read_file(&file)?;
            let doc = XmlDocument::new(&source);
            let expanded = doc.expand_key(&key).with_context(|| format!("expand-key {key:?}"))?;
            println!("{expanded}");
        }
        Command::Keys { file } => {
            let source = read_file(&file)?;
            let doc = XmlDocument::new(&source);
            for key in doc.keys() {
                println!("{key}");
            }
        }
    }
    Ok(())
}

fn read_file(path: &PathBuf) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write_back(path: &PathBuf, doc: &XmlDocument<'_>) -> Result<()> {
    let mut out = Vec::new();
    let written = doc.write_to(|chunk| {
        out.extend_from_slice(chunk);
        Ok(chunk.len())
    })?;
    if written as usize != out.len() {
        bail!("writer truncated output for {}", path.display());
    }
    fs::write(path, &out).with_context(|| format!("writing {}", path.display()))
}
