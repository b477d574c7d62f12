//! Converts every input file into every writable format. Outputs are named
//! `<input extension>_<input stem>.<output extension>`.
//!
//! ```text
//! cargo run --example batch_convert -- --output out --input <FILE>... [--options options.json]
//! ```
//!
//! Inputs may be glob patterns such as `data/*.las`.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::ExitCode,
};

use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use glob::glob;
use log::LevelFilter;

use pcd_format::{convert::error_chain, convert_batch, ConversionJob, ConvertOptions, Format};

#[derive(Parser, Debug)]
#[command(
    name = "batch_convert",
    about = "Converts point cloud files into every writable format"
)]
struct Cli {
    #[arg(short, long, required = true, num_args = 1.., value_name = "FILE")]
    input: Vec<String>,

    #[arg(short, long, required = true, value_name = "DIR")]
    output: PathBuf,

    /// JSON document with conversion options.
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,
}

fn expand_globs(input_patterns: Vec<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for pattern in input_patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            match glob(&pattern) {
                Ok(entries) => {
                    for entry in entries {
                        match entry {
                            Ok(path) => paths.push(path),
                            Err(e) => log::warn!("skipping glob entry: {}", e),
                        }
                    }
                }
                Err(e) => log::error!("invalid glob pattern {:?}: {}", pattern, e),
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    paths
}

fn jobs_for(inputs: &[PathBuf], output_dir: &Path) -> Vec<ConversionJob> {
    let mut jobs = Vec::new();
    for input in inputs {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let extension = input
            .extension()
            .unwrap_or_default()
            .to_string_lossy()
            .to_lowercase();
        for format in Format::WRITABLE {
            let file_name = format!("{}_{}.{}", extension, stem, format.extension());
            let output = output_dir.join(file_name);
            if output == *input {
                continue;
            }
            jobs.push(ConversionJob::new(input.clone(), output));
        }
    }
    jobs
}

fn main() -> ExitCode {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Cli::parse();
    log::info!("output folder: {:?}", args.output);

    let options = match &args.options {
        Some(path) => match ConvertOptions::from_json_path(path) {
            Ok(options) => options,
            Err(e) => {
                log::error!("{}", error_chain(&e));
                return ExitCode::FAILURE;
            }
        },
        None => ConvertOptions::default(),
    };

    if let Err(e) = std::fs::create_dir_all(&args.output) {
        log::error!("cannot create {:?}: {}", args.output, e);
        return ExitCode::FAILURE;
    }

    let inputs = expand_globs(args.input);
    log::info!("input files: {:?}", inputs);

    let report = convert_batch(jobs_for(&inputs, &args.output), &options);
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
