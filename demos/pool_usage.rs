//! Example demonstrating epsilon-greedy host selection
//!
//! This example shows how to:
//! 1. Build an adaptive pool with a latency calculator
//! 2. Report request outcomes so the pool learns host latency
//! 3. Monitor the learned averages and exploration rate

use hostpool::lb::{HostPool, LinearCalculator};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let latencies = HashMap::from([
        ("http://api-1.example.com", Duration::from_millis(5)),
        ("http://api-2.example.com", Duration::from_millis(25)),
        ("http://api-3.example.com", Duration::from_millis(50)),
    ]);

    let pool = HostPool::epsilon_greedy(
        latencies.keys().map(|h| h.to_string()).collect(),
        Duration::from_secs(60),
        LinearCalculator,
    )?;

    // Simulate requests; api-3 fails every seventh call
    let mut picks: HashMap<String, usize> = HashMap::new();
    for i in 0..200 {
        let response = pool.get();
        let host = response.host().to_string();
        let latency = latencies.get(host.as_str()).copied().unwrap_or_default();

        tokio::time::sleep(latency).await;

        if host.ends_with("api-3.example.com") && i % 7 == 0 {
            warn!("Request {} to {} failed", i, host);
            response.mark_failed("simulated timeout");
        } else {
            response.mark_success();
        }

        *picks.entry(host).or_default() += 1;
    }

    // Print statistics
    info!("=== Host Statistics ===");
    for stats in pool.stats() {
        info!(
            "{}: picks={}, dead={}, avg_ms={:.2}",
            stats.host,
            picks.get(&stats.host).copied().unwrap_or(0),
            stats.is_dead,
            stats.weighted_average_ms.unwrap_or_default()
        );
    }
    if let Some(epsilon) = pool.epsilon() {
        info!("Exploration rate: {:.4}", epsilon);
    }

    pool.shutdown();
    Ok(())
}
