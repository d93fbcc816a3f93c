use clap::Parser;
use primegen::{OsRandom, PrimeRecord, SearchConfig, SearchCoordinator};
use std::io::Write;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Generate large probable primes in parallel.
#[derive(Debug, Parser)]
#[command(name = "primegen", version, about)]
struct CliArgs {
    /// Bit length of each prime, a multiple of 8 and at least 32
    #[arg(value_parser = parse_bits)]
    bits: usize,

    /// Number of primes to generate
    #[arg(default_value_t = 1, value_parser = parse_count)]
    count: usize,

    /// Miller-Rabin witnesses per candidate (0 uses the default of 10)
    #[arg(short, long, env = "PRIMEGEN_WITNESSES", default_value_t = 10)]
    witnesses: usize,

    /// Worker threads (0 uses one per logical CPU)
    #[arg(short = 'j', long, env = "PRIMEGEN_WORKERS", default_value_t = 0)]
    workers: usize,
}

fn parse_bits(s: &str) -> Result<usize, String> {
    let bits: usize = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if bits % 8 != 0 || bits < 32 {
        return Err(format!("{bits} is not divisible by 8 or at least 32"));
    }
    Ok(bits)
}

fn parse_count(s: &str) -> Result<usize, String> {
    let count: usize = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if count < 1 {
        return Err(format!("{count} is less than 1"));
    }
    Ok(count)
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60,
        elapsed.subsec_millis()
    )
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = SearchConfig::new(args.bits / 8, args.count)
        .with_witnesses(args.witnesses)
        .with_workers(args.workers);
    let coordinator = SearchCoordinator::new(OsRandom, config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "BitLength: {} bits", args.bits)?;

    let start = Instant::now();
    let mut write_error = None;
    // records arrive only once the whole search succeeded
    coordinator.run(&mut |record: PrimeRecord| {
        let sep = if record.index == 1 { "" } else { "\n" };
        match writeln!(out, "{sep}{}: {}", record.index, record.value) {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => {
                write_error = Some(err);
                ControlFlow::Break(())
            }
        }
    })?;
    if let Some(err) = write_error {
        return Err(err.into());
    }

    writeln!(out, "Time to Generate: {}", format_elapsed(start.elapsed()))?;
    Ok(())
}
