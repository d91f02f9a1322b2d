//! Basic usage example for hostpool
//!
//! This example demonstrates round-robin selection with failure backoff.
//!
//! Run with:
//! ```
//! cargo run --example basic_usage
//! ```

use hostpool::{HostPool, PoolError};

fn main() -> Result<(), PoolError> {
    let pool = HostPool::new(vec![
        "http://api-1.example.com".to_string(),
        "http://api-2.example.com".to_string(),
        "http://api-3.example.com".to_string(),
    ])?;

    println!("hostpool - Basic Usage Example");
    println!("==============================\n");

    // Example 1: Round-robin selection
    println!("1. Selecting hosts...");
    for _ in 0..3 {
        let response = pool.get();
        println!("   -> {}", response.host());
        response.mark_success();
    }
    println!();

    // Example 2: A failed request takes its host out of rotation
    println!("2. Reporting a failure...");
    let response = pool.get();
    let failed = response.host().to_string();
    let outcome: Result<(), String> = Err("connection refused".to_string());
    response.mark(&outcome);
    println!("   {} marked dead", failed);
    for _ in 0..4 {
        println!("   -> {}", pool.get().host());
    }
    println!();

    // Example 3: Outcomes can also be reported by host id
    println!("3. Reporting recovery by host id...");
    pool.mark_host(&failed, &Ok::<_, String>(()))?;
    for stats in pool.stats() {
        println!(
            "   {} dead={} retry_delay={}s",
            stats.host,
            stats.is_dead,
            stats.retry_delay.as_secs()
        );
    }

    println!("\nAll operations completed successfully!");

    Ok(())
}
