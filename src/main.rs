//! Entropy Field headless driver
//!
//! Builds a world, seeds a few entropy hot spots and runs simulated frames:
//! simulation updates, render data, the performance governor and scripted
//! taps on whatever star is worth harvesting.
//!
//! Usage: entropy-field [settings.json] [--frames N] [--save PATH]

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::path::PathBuf;

    use entropy_field::input::{GestureRecognizer, HarvestOutcome};
    use entropy_field::sim::{ResourceKind, SectorId, World};
    use entropy_field::view::{PerformanceGovernor, Viewport};
    use entropy_field::Settings;
    use glam::Vec2;

    /// Simulated frame rate
    const FRAME_DT: f64 = 1.0 / 60.0;
    /// Seconds between scripted taps
    const TAP_EVERY: f64 = 2.0;
    /// Hot spots seeded at start
    const HOT_SPOTS: u32 = 6;

    struct Options {
        settings: Option<PathBuf>,
        frames: u32,
        save: Option<PathBuf>,
    }

    fn parse_args() -> Options {
        let mut options = Options {
            settings: None,
            frames: 60 * 120,
            save: None,
        };
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => match args.next().and_then(|v| v.parse().ok()) {
                    Some(n) => options.frames = n,
                    None => log::warn!("--frames needs a number"),
                },
                "--save" => options.save = args.next().map(PathBuf::from),
                path => options.settings = Some(PathBuf::from(path)),
            }
        }
        options
    }

    /// Synthetic frame cost: a heavy stretch in the middle of the run
    fn frame_cost(frame: u32, frames: u32) -> f32 {
        let third = frames / 3;
        if (third..2 * third).contains(&frame) {
            1.0 / 28.0
        } else {
            1.0 / 60.0
        }
    }

    pub fn run() {
        let options = parse_args();
        let settings = match &options.settings {
            Some(path) => Settings::load(path),
            None => Settings::default(),
        };
        if let Err(err) = settings.validate() {
            log::error!("{err}");
            return;
        }

        let mut governor = PerformanceGovernor::new(settings.governor_config(), settings.render_budget());
        let mut world = match World::new(settings, 0.0) {
            Ok(world) => world,
            Err(err) => {
                log::error!("World generation failed: {err}");
                return;
            }
        };
        world.harvester_mut().set_on_harvest(|star, kind, amount| {
            log::info!("Harvested {amount} {kind:?} from {star}");
        });

        let sectors = world.store().len() as u32;
        for i in 0..HOT_SPOTS {
            let sector = SectorId(i * sectors / HOT_SPOTS);
            if let Err(err) = world.increase_entropy(sector, 0.95, 0.0) {
                log::warn!("Could not seed {sector}: {err}");
            }
        }

        let screen = Vec2::new(1280.0, 720.0);
        let mut viewport = Viewport::looking_at(screen, world.bounds().center(), 0.3);
        let mut gestures = GestureRecognizer::new(world.settings().gesture_config());
        let mut next_tap = TAP_EVERY;
        let mut now = 0.0;

        world.start(now);
        for frame in 0..options.frames {
            now += FRAME_DT;
            let update = world.update(now);
            for change in &update.transitions {
                log::debug!("{} {:?} -> {:?}", change.id, change.old_state, change.new_state);
            }

            // Slow drift so the culler sees different regions
            viewport.pan(Vec2::new(0.2, 0.1));
            let data = world.render_data(&viewport, &governor);
            if let Some(advisory) = governor.record_frame(frame_cost(frame, options.frames), now) {
                log::debug!("Governor: {:?}", advisory.kind);
                world.apply_budget(&governor);
            }

            if now >= next_tap {
                next_tap += TAP_EVERY;
                let target = data
                    .visible_entities
                    .iter()
                    .find(|e| e.harvestable)
                    .map(|e| viewport.world_to_screen(e.position));
                if let Some(position) = target {
                    gestures.touch_down(position, now);
                    gestures.touch_up(position, now + 0.05);
                }
            }
            if let Some(gesture) = gestures.poll(now) {
                if let HarvestOutcome::Rejected { star, error } = world.handle_gesture(gesture, &viewport, now) {
                    log::debug!("Tap on {star} refused: {error}");
                }
            }
        }
        world.stop();

        let stats = world.store().entropy_stats();
        log::info!(
            "After {:.0}s: entropy avg {:.3} max {:.3}, {} dying / {} dead sectors",
            now,
            stats.average,
            stats.max,
            stats.dying_sectors,
            stats.dead_sectors
        );
        log::info!(
            "Stars: {:?}; harvested {} essence, {} fragments",
            world.lifecycle().census(),
            world.ledger().total(ResourceKind::StellarEssence),
            world.ledger().total(ResourceKind::VoidFragments)
        );

        if let Some(path) = options.save {
            if let Err(err) = world.save(&path, now) {
                log::error!("{err}");
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Entropy Field (headless) starting...");
    headless::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page; there is no native loop here
}
