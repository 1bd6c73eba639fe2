//! bigline - print lines of huge text files through a prebuilt line index.

use anyhow::{Context, Result};
use bigline::{scan_lines, Encoding, ReadContext, ReaderConfig};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging, controlled by RUST_LOG
    env_logger::init();

    let matches = cli().get_matches();

    let file_path = PathBuf::from(
        matches
            .get_one::<String>("file")
            .context("file argument is required")?,
    );
    let index_path = PathBuf::from(
        matches
            .get_one::<String>("index")
            .context("--index is required")?,
    );

    let config = build_config(&matches)?;
    let mut context = ReadContext::open(&file_path, &index_path, &config)
        .with_context(|| format!("Failed to open {}", file_path.display()))?;

    let line_count = context.index().line_count();
    let from = *matches.get_one::<usize>("from").unwrap_or(&0);
    let count = *matches.get_one::<usize>("count").unwrap_or(&20);
    let max_chars = matches.get_one::<usize>("max-chars").copied();

    if let Some(needle) = matches.get_one::<String>("contains") {
        let needle = needle.clone();
        let report = scan_lines(
            &context,
            from..line_count,
            config.worker_count(),
            max_chars,
            move |_, text| text.contains(needle.as_str()),
        )
        .await?;
        for line in &report.matches {
            println!("{}", line);
        }
        for failure in &report.failures {
            eprintln!("line {}: {}", failure.line, failure.diagnostic);
        }
        eprintln!(
            "{} of {} lines matched",
            report.matches.len(),
            report.lines_scanned
        );
        if !report.truncated.is_empty() {
            eprintln!(
                "{} lines were only searched in part (--max-chars or --buffer-size)",
                report.truncated.len()
            );
        }
        return Ok(());
    }

    let until = from.saturating_add(count).min(line_count);
    for line in from..until {
        let result = match max_chars {
            Some(_) => context.extract_line_prefix(line, line + 1, max_chars),
            None => context.extract_line(line, line + 1, config.max_line_length),
        };
        match result {
            Ok(decoded) if decoded.truncated => println!("{} [truncated]", decoded.text),
            Ok(decoded) => println!("{}", decoded.text),
            Err(failure) => eprintln!("line {}: read failed: {}", line, failure),
        }
    }

    Ok(())
}

fn cli() -> Command {
    Command::new("bigline")
        .version(bigline::VERSION)
        .about("Print lines from huge text files using a prebuilt line index")
        .long_about(
            "bigline reads individual lines of arbitrarily large text files through a \
             packed line offset index, without loading the file into memory.",
        )
        .arg(
            Arg::new("file")
                .help("Path to the text file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("index")
                .long("index")
                .short('i')
                .help("Line index file: little-endian u64 packed entries")
                .required(true),
        )
        .arg(
            Arg::new("from")
                .long("from")
                .help("First line to print (0-based)")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .short('n')
                .help("Number of lines to print")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("max-chars")
                .long("max-chars")
                .help("Only read about this many characters per line")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("max-line-length")
                .long("max-line-length")
                .help("Truncate lines longer than this many bytes")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("encoding")
                .long("encoding")
                .short('e')
                .help("Text encoding label, e.g. utf-8, utf-16le, windows-1252, shift_jis, gbk"),
        )
        .arg(
            Arg::new("buffer-size")
                .long("buffer-size")
                .help("Scratch buffer size per reader in bytes")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .help("Scan workers: 0 uses every core, negative leaves cores free")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i32)),
        )
        .arg(
            Arg::new("contains")
                .long("contains")
                .help("Print the numbers of lines containing this text"),
        )
}

fn build_config(matches: &ArgMatches) -> Result<ReaderConfig> {
    #[cfg(feature = "config")]
    let mut config = ReaderConfig::load_default()?;
    #[cfg(not(feature = "config"))]
    let mut config = ReaderConfig::default();

    if let Some(label) = matches.get_one::<String>("encoding") {
        config.encoding = Encoding::from_label(label)
            .with_context(|| format!("Unknown encoding: {}", label))?;
    }
    if let Some(size) = matches.get_one::<usize>("buffer-size") {
        config.buffer_capacity = *size;
    }
    if let Some(length) = matches.get_one::<usize>("max-line-length") {
        config.max_line_length = *length;
    }
    if let Some(threads) = matches.get_one::<i32>("threads") {
        config.search_threads = *threads;
    }
    config.validate()?;
    Ok(config)
}
