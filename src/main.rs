use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hostpool::{config, HostPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hostpool")]
#[command(version, about = "Adaptive host selection with failure backoff", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (falls back to HOSTPOOL_* environment variables)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configured hosts in selection order
    Hosts,

    /// Drive the pool with synthetic traffic and report the distribution
    Simulate {
        /// Total number of requests
        #[arg(long, default_value = "1000")]
        requests: usize,

        /// Number of concurrent workers
        #[arg(long, default_value = "8")]
        concurrency: usize,

        /// Simulated latency per host (HOST=MS, repeatable)
        #[arg(long = "latency", value_parser = parse_latency)]
        latencies: Vec<(String, u64)>,

        /// Latency for hosts without an explicit value
        #[arg(long, default_value = "20")]
        default_latency_ms: u64,

        /// Host whose requests always fail (repeatable)
        #[arg(long = "fail")]
        failing: Vec<String>,
    },
}

fn parse_latency(s: &str) -> std::result::Result<(String, u64), String> {
    let (host, ms) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected HOST=MS, got '{}'", s))?;
    let ms = ms
        .parse()
        .map_err(|e| format!("invalid latency '{}': {}", ms, e))?;
    Ok((host.to_string(), ms))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref())?;
    let pool = Arc::new(config.build_pool()?);

    match cli.command {
        Commands::Hosts => {
            for host in pool.hosts() {
                println!("{}", host);
            }
        }
        Commands::Simulate {
            requests,
            concurrency,
            latencies,
            default_latency_ms,
            failing,
        } => {
            let profile = SimulatedProfile {
                latencies: latencies.into_iter().collect(),
                default_latency: Duration::from_millis(default_latency_ms),
                failing,
            };
            simulate(&pool, Arc::new(profile), requests, concurrency.max(1)).await?;
        }
    }

    pool.shutdown();
    Ok(())
}

struct SimulatedProfile {
    latencies: HashMap<String, u64>,
    default_latency: Duration,
    failing: Vec<String>,
}

impl SimulatedProfile {
    fn latency(&self, host: &str) -> Duration {
        self.latencies
            .get(host)
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(self.default_latency)
    }

    fn fails(&self, host: &str) -> bool {
        self.failing.iter().any(|h| h == host)
    }
}

async fn simulate(
    pool: &Arc<HostPool>,
    profile: Arc<SimulatedProfile>,
    requests: usize,
    concurrency: usize,
) -> Result<()> {
    info!(requests, concurrency, strategy = pool.strategy(), "starting simulation");

    let mut handles = Vec::with_capacity(concurrency);
    for worker in 0..concurrency {
        let pool = Arc::clone(pool);
        let profile = Arc::clone(&profile);
        let share = requests / concurrency + usize::from(worker < requests % concurrency);

        handles.push(tokio::spawn(async move {
            let mut picks: HashMap<String, usize> = HashMap::new();
            for _ in 0..share {
                let response = pool.get();
                let host = response.host().to_string();

                tokio::time::sleep(profile.latency(&host)).await;
                if profile.fails(&host) {
                    response.mark_failed("simulated failure");
                } else {
                    response.mark_success();
                }

                *picks.entry(host).or_default() += 1;
            }
            picks
        }));
    }

    let mut totals: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        let picks = handle.await.context("Simulation worker panicked")?;
        for (host, count) in picks {
            *totals.entry(host).or_default() += count;
        }
    }

    println!(
        "{:<32} {:>8} {:>7} {:>6} {:>10} {:>10}",
        "HOST", "PICKS", "SHARE", "DEAD", "RETRY(s)", "AVG(ms)"
    );
    for stats in pool.stats() {
        let picks = totals.get(&stats.host).copied().unwrap_or(0);
        let share = if requests > 0 {
            picks as f64 * 100.0 / requests as f64
        } else {
            0.0
        };
        let avg = stats
            .weighted_average_ms
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:>8} {:>6.1}% {:>6} {:>10} {:>10}",
            stats.host,
            picks,
            share,
            stats.is_dead,
            stats.retry_delay.as_secs(),
            avg
        );
    }
    if let Some(epsilon) = pool.epsilon() {
        println!("epsilon: {:.4}", epsilon);
    }

    Ok(())
}
