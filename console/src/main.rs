use std::path::{
    Path,
    PathBuf,
};

use annotsort::prelude::*;
use annotsort::utils::{
    default_threads,
    init_logger,
};
use anyhow::{
    anyhow,
    Context,
};
use clap::Parser;
use console::style;
use log::{
    error,
    info,
};

const EXTENSIONS: [&str; 3] = ["gtf", "gff", "gff3"];

#[derive(Parser, Debug)]
#[command(
    name = "annotsort",
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Args {
    #[arg(
        short = 'i',
        long = "input",
        value_name = "UNSORTED",
        required = true,
        help = "Path to unsorted GTF/GFF3 file"
    )]
    input: PathBuf,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "OUTPUT",
        required = true,
        help = "Path to output sorted GTF/GFF3 file"
    )]
    output: PathBuf,

    #[arg(
        short = 't',
        long,
        value_name = "THREADS",
        default_value_t = default_threads(),
        help = "Number of threads"
    )]
    threads: usize,

    #[arg(
        long = "log-level",
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    log_level: String,

    #[arg(long, value_name = "JSON", help = "Write job telemetry as JSON to this path")]
    report: Option<PathBuf>,

    #[arg(long = "no-mmap", default_value_t = false, help = "Never memory-map input or output")]
    no_mmap: bool,
}

impl Args {
    fn check(&self) -> anyhow::Result<()> {
        self.check_input()?;
        self.check_output()?;
        self.check_threads()?;
        Ok(())
    }

    fn check_input(&self) -> anyhow::Result<()> {
        if !self.input.exists() {
            return Err(anyhow!("file {:?} does not exist", self.input));
        }
        if !self.input.is_file() {
            return Err(anyhow!("{:?} is not a file", self.input));
        }
        if !has_annotation_extension(&self.input) {
            return Err(anyhow!(
                "file {:?} is not a GTF or GFF3 file, please specify the correct format",
                self.input
            ));
        }
        let len = std::fs::metadata(&self.input)
            .with_context(|| format!("reading metadata of {:?}", self.input))?
            .len();
        if len == 0 {
            return Err(anyhow!("file {:?} is empty", self.input));
        }
        Ok(())
    }

    fn check_output(&self) -> anyhow::Result<()> {
        if self.output.is_dir() {
            return Err(anyhow!("output {:?} is a directory", self.output));
        }
        if !has_annotation_extension(&self.output) {
            return Err(anyhow!(
                "file {:?} is not a GTF/GFF file, please specify the correct output format",
                self.output
            ));
        }
        Ok(())
    }

    fn check_threads(&self) -> anyhow::Result<()> {
        if self.threads == 0 {
            return Err(anyhow!("number of threads must be greater than 0"));
        }
        Ok(())
    }
}

fn has_annotation_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn banner() {
    println!(
        "{} {}\n{}",
        style("annotsort").green().bold(),
        style(env!("CARGO_PKG_VERSION")).dim(),
        style("Hierarchy-aware coordinate sorting of GTF/GFF3 annotations").dim()
    );
}

fn run(args: &Args) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    let result = SortJob::new(args.threads)
        .with_mmap(!args.no_mmap)
        .run_file(&args.input, &args.output)?;

    info!(
        "Elapsed time: {:.4} seconds",
        start.elapsed().as_secs_f32()
    );
    if let Some(delta) = result.mem_delta_mb() {
        info!("Memory usage: {:.4} MB", delta);
    }

    if let Some(report) = &args.report {
        std::fs::write(report, result.to_json()?)
            .with_context(|| format!("writing report to {:?}", report))?;
        info!("Job report written to {}", report.display());
    }

    println!(
        "{} {} records written to {}",
        style("Success:").green().bold(),
        result.records,
        style(args.output.display()).cyan()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);
    banner();

    if let Err(e) = args.check() {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    run(&args).map_err(|e| {
        error!("{}", e);
        match e.downcast_ref::<SortError>() {
            Some(sort_error) => {
                eprintln!(
                    "{} [{}] {}",
                    style("Fatal:").red().bold(),
                    sort_error.code(),
                    sort_error
                );
                std::process::exit(sort_error.code().as_i32().abs());
            },
            None => e,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_extensions() {
        assert!(has_annotation_extension(Path::new("a.gtf")));
        assert!(has_annotation_extension(Path::new("a.GFF3")));
        assert!(has_annotation_extension(Path::new("dir/a.gff")));
        assert!(!has_annotation_extension(Path::new("a.bed")));
        assert!(!has_annotation_extension(Path::new("gtf")));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let args = Args::parse_from(["annotsort", "-i", "in.gtf", "-o", "out.gtf", "-t", "0"]);
        assert!(args.check_threads().is_err());
        assert!(args.check_output().is_ok());
    }
}
