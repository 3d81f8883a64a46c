//! WooCommerce Checkout Load Test
//!
//! Ramps virtual shoppers through homepage → category → product → cart →
//! checkout and reports error rate plus page/object-cache effectiveness.
//!
//! Usage:
//!   SITE_URL=https://shop.example.com cargo run --release --bin load-checkout
//!
//! Output: JSON line on stdout (and LOAD_RESULT_FILE), section in RESULTS.md

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, OnceLock};

use goose::prelude::*;
use load_checkout::logging::init_tracing;
use load_checkout::{
    iteration_seed, update_section, CheckoutScenario, MetricsSink, RandomProfile, RandomSelector,
    RunReport, ScenarioConfig, RESULTS_SECTION,
};
use tracing::{info, warn};

const TRANSACTION_NAME: &str = "checkout funnel";

/// Shared by every Goose user; set once before the attack starts
static SCENARIO: OnceLock<CheckoutScenario> = OnceLock::new();

/// Iterations started per Goose user, for replayable seeds
static USER_ITERATIONS: LazyLock<Mutex<HashMap<usize, u64>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static FAILED_ITERATIONS: AtomicU64 = AtomicU64::new(0);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info");

    let config = ScenarioConfig::from_env()?;
    let ramp = config.ramp.clone();
    let host = config.site_url.to_string();
    let result_file = config.result_file.clone();
    let results_markdown = config.results_markdown.clone();

    eprintln!("=== WooCommerce Checkout Load Test ===");
    eprintln!(
        "Site: {} | Users: {} | Ramp: {}s | Run: {}s | Bypass cache: {}",
        host, ramp.users, ramp.ramp_secs, ramp.run_time_secs, config.bypass_cache
    );
    if let Some(seed) = config.seed {
        eprintln!("Seed: {seed} (sessions are replayable)");
    }

    let sink = Arc::new(MetricsSink::new());
    let scenario = CheckoutScenario::http(config, Arc::clone(&sink))?;
    if SCENARIO.set(scenario).is_err() {
        return Err("scenario already initialized".into());
    }

    eprintln!("\n--- Running Checkout Funnel ---");
    let metrics = GooseAttack::initialize()?
        .register_scenario(
            scenario!("Checkout Funnel")
                .register_transaction(transaction!(checkout_funnel).set_name(TRANSACTION_NAME)),
        )
        .set_default(GooseDefault::Host, host.as_str())?
        .set_default(GooseDefault::Users, ramp.users)?
        .set_default(GooseDefault::HatchRate, ramp.hatch_rate().as_str())?
        .set_default(GooseDefault::RunTime, ramp.run_time_secs as usize)?
        .execute()
        .await?;

    let duration_secs = metrics.duration as f64;
    let report = RunReport::from_sink("checkout-funnel", ramp.users, duration_secs, &sink);

    eprintln!("\n  CHECKOUT FUNNEL RESULTS:");
    eprintln!("    Iterations:     {}", report.iterations);
    eprintln!("    Orders placed:  {}", report.orders);
    eprintln!(
        "    Failed:         {} ({:.1}%)",
        FAILED_ITERATIONS.load(Ordering::Relaxed),
        report.error_rate * 100.0
    );
    eprintln!("    Cached:         {:.1}% of responses", report.cache_hit_rate * 100.0);

    report.emit(result_file.as_deref());

    if let Err(error) = update_section(&results_markdown, RESULTS_SECTION, &report.markdown()) {
        warn!(path = %results_markdown.display(), %error, "failed to update results markdown");
    }
    info!(summary = %report.summary, "load test finished");

    Ok(())
}

fn next_iteration(user_index: usize) -> u64 {
    let mut iterations = USER_ITERATIONS.lock().unwrap_or_else(|e| e.into_inner());
    let counter = iterations.entry(user_index).or_insert(0);
    let current = *counter;
    *counter += 1;
    current
}

/// One full shopper session. Failures are already counted in the error
/// series, so Goose always sees success.
async fn checkout_funnel(user: &mut GooseUser) -> TransactionResult {
    let Some(scenario) = SCENARIO.get() else {
        return Ok(());
    };

    let user_index = user.weighted_users_index;
    let mut selector = match scenario.config().seed {
        Some(seed) => RandomSelector::seeded(iteration_seed(seed, user_index, next_iteration(user_index))),
        None => RandomSelector::from_entropy(),
    };
    let mut profile = RandomProfile::new(selector.fork());

    if let Err(error) = scenario.run_iteration(&mut selector, &mut profile).await {
        FAILED_ITERATIONS.fetch_add(1, Ordering::Relaxed);
        warn!(user = user_index, stage = %error.stage, %error, "iteration failed");
    }
    Ok(())
}
