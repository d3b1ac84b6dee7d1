use std::process::ExitCode;

use engine::Vec2;
use tracing::{error, info};

use super::bootstrap::{AppWiring, DemoError};
use super::scene::{apply_behaviors, build_scene, LoadedScene};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSummary {
    pub ticks: u64,
    pub entities: usize,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_inner(app) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                entities = summary.entities,
                "demo_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "demo_failed");
            ExitCode::FAILURE
        }
    }
}

fn run_inner(app: AppWiring) -> Result<RunSummary, DemoError> {
    let mut scene = build_scene(&app.config, app.textures)?;
    Ok(run_scene(
        &mut scene,
        app.config.ticks,
        app.config.log_interval_ticks,
    ))
}

pub(crate) fn run_scene(scene: &mut LoadedScene, ticks: u64, log_interval_ticks: u64) -> RunSummary {
    for _ in 0..ticks {
        step_scene(scene);
        let tick = scene.simulation.tick_count();
        if log_interval_ticks > 0 && tick % log_interval_ticks == 0 {
            log_snapshot(scene, tick);
        }
    }

    RunSummary {
        ticks: scene.simulation.tick_count(),
        entities: scene.simulation.entity_count(),
    }
}

pub(crate) fn step_scene(scene: &mut LoadedScene) {
    apply_behaviors(scene);
    scene.simulation.tick();
}

fn log_snapshot(scene: &LoadedScene, tick: u64) {
    for scene_entity in &scene.entities {
        let Some(entity) = scene.simulation.entity(scene_entity.id) else {
            continue;
        };
        let Vec2 { x, y } = entity.position();
        let velocity = entity.velocity();
        info!(
            tick,
            entity = scene_entity.name.as_str(),
            x,
            y,
            vx = velocity.x,
            vy = velocity.y,
            speed = velocity.length(),
            "entity_snapshot"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::load_scene_config;
    use engine::TextureCache;
    use tempfile::TempDir;

    fn default_scene(temp: &TempDir) -> LoadedScene {
        let config = load_scene_config(None).expect("default scene");
        build_scene(&config, TextureCache::with_asset_root(temp.path())).expect("scene")
    }

    #[test]
    fn run_scene_counts_ticks() {
        let temp = TempDir::new().expect("tempdir");
        let mut scene = default_scene(&temp);
        let summary = run_scene(&mut scene, 12, 5);
        assert_eq!(
            summary,
            RunSummary {
                ticks: 12,
                entities: scene.entities.len(),
            }
        );
    }

    #[test]
    fn paused_simulation_does_not_advance() {
        let temp = TempDir::new().expect("tempdir");
        let mut scene = default_scene(&temp);
        scene.simulation.pause();
        let summary = run_scene(&mut scene, 10, 0);
        assert_eq!(summary.ticks, 0);
    }

    #[test]
    fn seeker_moves_toward_target_without_exceeding_max_speed() {
        let temp = TempDir::new().expect("tempdir");
        let mut scene = default_scene(&temp);
        let seeker_id = scene.find("seeker").expect("seeker").id;
        let start_x = scene
            .simulation
            .entity(seeker_id)
            .expect("seeker entity")
            .position()
            .x;

        for _ in 0..120 {
            step_scene(&mut scene);
            for (_, entity) in scene.simulation.entities() {
                if entity.max_speed().is_finite() {
                    assert!(
                        entity.velocity().length() <= entity.max_speed() + 1e-4,
                        "speed {} above cap {}",
                        entity.velocity().length(),
                        entity.max_speed()
                    );
                }
            }
        }

        let end_x = scene
            .simulation
            .entity(seeker_id)
            .expect("seeker entity")
            .position()
            .x;
        assert!(end_x < start_x - 1.0, "seeker stayed at {end_x}");
    }
}
