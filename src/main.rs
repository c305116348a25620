use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::time::Duration;

use rhythmdrill::config::{self, Config};
use rhythmdrill::core::clock::{Clock, ManualClock, MonotonicClock};
use rhythmdrill::game::autoplay::Autoplay;
use rhythmdrill::game::chart::ChartGenerator;
use rhythmdrill::game::gameplay::{GameLoop, TickStatus};
use rhythmdrill::game::judgment::Quality;
use rhythmdrill::game::session::{Outcome, Session};
use rhythmdrill::game::timing_stats::{self, TimingStats};

#[derive(Serialize)]
struct Summary {
    seed: u64,
    notes: usize,
    outcome: Outcome,
    score: u64,
    max_combo: u32,
    health: i32,
    perfect: u32,
    great: u32,
    good: u32,
    miss: u32,
    whiffs: u32,
    timing_ms: TimingStats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::CONFIG_PATH.to_string());
    config::load(&path);
    let cfg = config::get();
    log::set_max_level(cfg.log_level.as_level_filter());
    cfg.validate()?;

    if cfg.realtime {
        let clock = MonotonicClock::new();
        play(&cfg, &clock, |dt| std::thread::sleep(Duration::from_secs_f64(dt)))
    } else {
        let clock = ManualClock::new(0.0);
        play(&cfg, &clock, |dt| clock.advance(dt))
    }
}

/// Generates a chart, runs it to completion under autoplay, and prints every
/// event and a final summary to stdout as JSON lines.
fn play<C: Clock>(
    cfg: &Config,
    clock: &C,
    mut wait: impl FnMut(f64),
) -> Result<(), Box<dyn std::error::Error>> {
    let seed = cfg.seed.unwrap_or_else(rand::random);
    info!("Chart seed: {seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    let chart = ChartGenerator::new(cfg.chart)?.generate(&mut rng)?;
    let notes = chart.len();

    let mut game = GameLoop::new(clock, Session::new(cfg.session)?);
    game.start(chart)?;
    let mut autoplay = match (game.session().chart(), game.session().transport()) {
        (Some(chart), Some(transport)) => Autoplay::new(
            chart,
            transport,
            cfg.autoplay_jitter_beats,
            cfg.autoplay_skip,
            &mut rng,
        ),
        _ => return Err("session started without a chart".into()),
    };

    let dt = 1.0 / f64::from(cfg.tick_hz);
    let outcome = loop {
        let now = clock.now_seconds();
        for &t in autoplay.due(now) {
            game.queue_input(t);
        }
        let status = game.update();
        for event in game.drain_events() {
            println!("{}", serde_json::to_string(&event)?);
        }
        if let TickStatus::Finished(outcome) = status {
            break outcome;
        }
        wait(dt);
    };

    let session = game.session();
    let spb = session.transport().map_or(0.0, |t| t.seconds_per_beat());
    let timing_ms = session
        .chart()
        .map(timing_stats::compute_timing_stats)
        .unwrap_or_default()
        .to_ms(spb);
    info!(
        "Timing: mean {:+.1}ms, mean abs {:.1}ms, stddev {:.1}ms, worst {:.1}ms over {} hits",
        timing_ms.mean, timing_ms.mean_abs, timing_ms.stddev, timing_ms.max_abs, timing_ms.count
    );
    let s = session.state();
    let summary = Summary {
        seed,
        notes,
        outcome,
        score: s.score,
        max_combo: s.max_combo,
        health: s.health,
        perfect: s.count(Quality::Perfect),
        great: s.count(Quality::Great),
        good: s.count(Quality::Good),
        miss: s.count(Quality::Miss),
        whiffs: s.whiffs,
        timing_ms,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
