//! trust-runner: headless demo run for the trust & fairness scoring core.
//!
//! Wires a router, trust engine and gameplay analyzer together, feeds a
//! seeded stream of synthetic spins and domain events through the bus,
//! drives the hourly recovery sweep, and prints an end-of-run summary.
//!
//! Usage:
//!   trust-runner --seed 42 --spins 300 --data-dir ./data

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use rand_pcg::Pcg64;
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use trust_core::{
    analyzer::GameplayAnalyzer,
    event::{EventPayload, LinkRisk},
    router::HistoryFilter,
    trust_engine::TrustEngine,
    AnalyzerConfig, EngineConfig, EventRouter, EventType, SpinResult,
};

const CASINOS: [&str; 3] = ["stake", "duelbits", "shuffle"];
const USERS: [&str; 4] = ["degen-alice", "degen-bob", "degen-carol", "degen-dave"];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let spins = parse_arg(&args, "--spins", 300usize);
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| PathBuf::from(&w[1]));

    println!("trust-runner");
    println!("  seed:     {seed}");
    println!("  spins:    {spins}");
    println!(
        "  data_dir: {}",
        data_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(in-memory)".into())
    );
    println!();

    let router = EventRouter::new();
    let engine_config = EngineConfig {
        persist_dir: data_dir.clone(),
        log_dir: data_dir,
        ..EngineConfig::default()
    };
    let engine = Arc::new(Mutex::new(TrustEngine::new(
        engine_config,
        router.clone(),
    )?));
    let _subs = TrustEngine::attach(&engine, &router);
    log::info!("trust engine attached to router");

    let mut analyzer = GameplayAnalyzer::new(AnalyzerConfig::default(), router.clone());

    let mut rng = Pcg64::new(seed as u128, 0xa02b_dbf7_bb3c_0a7_u128);

    // One casino runs hot so the pump detector has something to find.
    let pumped_casino = CASINOS[(seed % CASINOS.len() as u64) as usize];

    for i in 0..spins {
        let user = USERS[rng.gen_range(0..USERS.len())];
        let casino = CASINOS[rng.gen_range(0..CASINOS.len())];
        let wager = rng.gen_range(0.5..20.0f64);
        // Fair games pay ~0.96 RTP; the pumped casino pays ~1.3.
        let target_rtp = if casino == pumped_casino { 1.3 } else { 0.96 };
        let payout = if rng.gen_bool(0.42) {
            wager * target_rtp / 0.42 * rng.gen_range(0.5..1.5)
        } else {
            0.0
        };
        analyzer.record_spin(SpinResult::new(user, casino, "slots", wager, payout));

        // Sprinkle business events through the run.
        if i % 60 == 20 {
            router.publish(
                "bonus-tracker",
                EventPayload::BonusNerfDetected {
                    casino_name: casino.to_string(),
                    bonus_type: "daily-reload".into(),
                    previous_value: 100.0,
                    new_value: 75.0,
                    percent_drop: 0.25,
                },
                None,
                None,
            );
        }
        if i % 90 == 45 {
            router.publish(
                "link-scanner",
                EventPayload::LinkFlagged {
                    url: format!("https://{casino}.com/freespins"),
                    risk: LinkRisk::Critical,
                    casino_name: Some(casino.to_string()),
                },
                None,
                None,
            );
        }
        if i % 70 == 10 {
            router.publish(
                "tilt-watch",
                EventPayload::TiltDetected {
                    user_id: user.to_string(),
                    severity: rng.gen_range(1..=3),
                    indicators: vec!["loss-chasing".into()],
                },
                Some(user.to_string()),
                None,
            );
        }
        if i % 110 == 55 {
            router.publish(
                "tip-bot",
                EventPayload::TipCompleted {
                    from_user: USERS[rng.gen_range(0..USERS.len())].to_string(),
                    to_user: user.to_string(),
                    amount: rng.gen_range(5.0..250.0),
                },
                None,
                None,
            );
        }
    }

    // Simulate the hourly recovery timer having run 8 hours later.
    let sweep_at = Utc::now().timestamp_millis() + 8 * 3_600_000;
    let recovered = engine.lock().unwrap().recovery_sweep(sweep_at);

    print_summary(&engine, &analyzer, &router, recovered);
    engine.lock().unwrap().shutdown();
    Ok(())
}

fn print_summary(
    engine: &Arc<Mutex<TrustEngine>>,
    analyzer: &GameplayAnalyzer,
    router: &EventRouter,
    recovered: usize,
) {
    let engine = engine.lock().unwrap();
    let router_stats = router.stats();
    let analyzer_stats = analyzer.stats();

    println!("=== RUN SUMMARY ===");
    println!("  events published: {}", router_stats.published_total);
    println!(
        "  history buffer:   {}/{}",
        router_stats.history_len, router_stats.history_capacity
    );
    println!("  sessions:         {}", analyzer_stats.sessions);
    println!("  spins recorded:   {}", analyzer_stats.total_spins);
    println!("  tilt recoveries:  {recovered}");
    println!();

    println!("=== CASINO TRUST ===");
    for casino in CASINOS {
        if let Some(record) = engine.casino_record(casino) {
            println!(
                "  {casino:<10} {:>3.0}/100 ({})",
                record.score,
                record.trust_level().as_str()
            );
            for reason in engine.explain_casino_score(casino).iter().take(3) {
                println!("    - {reason}");
            }
        }
    }
    println!();

    println!("=== DEGEN TRUST ===");
    for user in USERS {
        if let Some(record) = engine.degen_record(user) {
            println!(
                "  {user:<12} {:>3.0}/100 ({})",
                record.score,
                record.trust_level().as_str()
            );
        }
    }
    println!();

    let pumps = router.history(&HistoryFilter {
        event_type: Some(EventType::PumpDetected),
        ..HistoryFilter::default()
    });
    println!("  pump detections:  {}", pumps.len());
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
