mod cache;
mod config;
mod error;
mod replace;
mod stats;
mod trace;

use std::{fs, io, path::PathBuf, process};

use log::{error, info};

use cache::IsCache;
use config::Config;
use error::{Error, Result};
use stats::{RunSummary, Stats};
use trace::{Access, Trace};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run() {
        error!("{}", err);
        process::exit(1);
    }
}

/// Everything on the command line besides the cache itself.
#[derive(Debug, PartialEq)]
struct Options {
    n_warm: u64,
    heartbeat_int: u64,
    trace_path: Option<PathBuf>,
    stats_path: Option<PathBuf>,
    access_per_block: usize,
    blocks_per_queue: usize,
}

fn parse(mut args: pico_args::Arguments) -> Result<(Config, Options)> {
    let opts = Options {
        n_warm: args.opt_value_from_str("-w")?.unwrap_or(0),
        heartbeat_int: args.opt_value_from_str("-h")?.unwrap_or(0),
        trace_path: args.opt_value_from_str("-t")?,
        stats_path: args.opt_value_from_str("--json")?,
        access_per_block: args
            .opt_value_from_str("--buffer-size")?
            .unwrap_or(1024 * 16),
        blocks_per_queue: args.opt_value_from_str("--queue-size")?.unwrap_or(32),
    };
    let seed: Option<u64> = args.opt_value_from_str("--seed")?;

    let config_str: Option<String> = match args.opt_value_from_str("--config")? {
        Some(config_str) => Some(config_str),
        None => args
            .opt_value_from_str::<_, PathBuf>("-p")?
            .map(fs::read_to_string)
            .transpose()?,
    };
    let mut config = match config_str {
        Some(config_str) => Config::from_json(&config_str)?,
        None => Config::from_free_args(&mut args)?,
    };
    if seed.is_some() {
        config.seed = seed;
    }
    let remaining = args.finish();
    if !remaining.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "unexpected arguments: {:?}",
            remaining
        )));
    }
    Ok((config, opts))
}

fn run() -> Result<()> {
    let (config, opts) = parse(pico_args::Arguments::from_env())?;

    let geometry = config.geometry()?;
    let mut cache = config.to_cache()?;

    let trace = Trace::read(opts.trace_path, opts.access_per_block, opts.blocks_per_queue)?;
    let stats = replay(cache.as_mut(), trace.rec.iter(), opts.n_warm, opts.heartbeat_int)?;
    info!(
        "{} of {} blocks resident",
        cache.resident(),
        geometry.sets * geometry.ways
    );
    let report = stats.report();
    println!("{}", report);

    if let Some(stats_path) = opts.stats_path {
        let summary = RunSummary {
            policy: config.policy.to_string(),
            geometry,
            report,
        };
        let stats_file = fs::File::create(stats_path)?;
        serde_json::to_writer_pretty(stats_file, &summary)?;
    }
    Ok(())
}

/// Drives every access through the cache. Counters are reset once `n_warm`
/// accesses have gone by.
fn replay<I>(cache: &mut dyn IsCache, batches: I, n_warm: u64, heartbeat_int: u64) -> Result<Stats>
where
    I: IntoIterator<Item = io::Result<Vec<Access>>>,
{
    let mut stats = Stats::default();
    let mut n_seen: u64 = 0;

    for batch in batches {
        for access in batch? {
            let result = cache.access(access.addr);
            stats.record(access.op, result);
            n_seen += 1;

            if n_seen == n_warm {
                stats.clear();
                info!("Finished warm-up after {} accesses", n_seen);
            }
            if heartbeat_int != 0 && n_seen % heartbeat_int == 0 {
                info!("Accesses: {}", n_seen);
            }
        }
    }
    info!("Replayed {} accesses", n_seen);
    Ok(stats)
}
