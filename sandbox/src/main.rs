// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Leap Sandbox
// Spins a small solar system while every allocation goes through the block allocator.

use std::alloc::System;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use leap_core::math::{AngleUnit, Vec3};
use leap_core::memory::GLOBAL_TRACKER;
use leap_core::SandboxConfig;
use leap_data::{LeapAllocator, NodeId, SceneGraph};

#[global_allocator]
static GLOBAL: LeapAllocator = LeapAllocator::new(System, &GLOBAL_TRACKER);

struct SolarSystem {
    scene: SceneGraph,
    sun: NodeId,
    planet: NodeId,
    moon: NodeId,
}

impl SolarSystem {
    fn build() -> Result<Self> {
        let mut scene = SceneGraph::new();
        let sun = scene.spawn("sun")?;
        let planet = scene.spawn_child(sun, "planet")?;
        let moon = scene.spawn_child(planet, "moon")?;

        scene.transform_mut(sun)?.set_local_scale_uniform(2.0);
        scene
            .transform_mut(planet)?
            .set_local_position(Vec3::new(5.0, 0.0, 0.0))
            .set_local_scale_uniform(0.5);
        scene
            .transform_mut(moon)?
            .set_local_position(Vec3::new(1.5, 0.0, 0.0))
            .set_local_scale_uniform(0.25);

        Ok(Self {
            scene,
            sun,
            planet,
            moon,
        })
    }

    fn step(&mut self, degrees: f32) -> Result<u64> {
        self.scene
            .transform_mut(self.sun)?
            .rotate_euler(Vec3::new(0.0, degrees, 0.0), AngleUnit::Degrees);
        self.scene
            .transform_mut(self.planet)?
            .rotate_euler(Vec3::new(0.0, 3.0 * degrees, 0.0), AngleUnit::Degrees);
        Ok(self.scene.refresh_world_transforms())
    }

    fn log_positions(&self, frame: u32) -> Result<()> {
        for id in [self.planet, self.moon] {
            let world = self.scene.world(id)?;
            log::info!(
                "frame {frame:>4} {:>6}: position ({:7.3}, {:7.3}, {:7.3}) scale {:.3}",
                self.scene.name(id)?,
                world.position.x,
                world.position.y,
                world.position.z,
                world.scale.x
            );
        }
        Ok(())
    }
}

/// `sandbox/sandbox.ron`, next to this crate's manifest.
const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sandbox.ron");

/// The file named on the command line, or [`DEFAULT_CONFIG`].
fn config_path(arg: Option<OsString>) -> PathBuf {
    arg.map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from)
}

fn run(config: &SandboxConfig) -> Result<()> {
    let probe = Box::new([0u8; 64]);
    log::info!(
        "Probe block at {:p} registered: {} ({:?} bytes)",
        probe.as_ptr(),
        GLOBAL.contains(probe.as_ptr()),
        GLOBAL.block_size(probe.as_ptr())
    );
    drop(probe);

    let mut system = SolarSystem::build()?;
    let degrees_per_frame = config.spin_degrees_per_second * config.delta_seconds;
    let mut recomputed = 0;
    for frame in 0..config.frames {
        recomputed += system.step(degrees_per_frame)?;
        if frame % 30 == 0 {
            system.log_positions(frame)?;
        }
    }
    log::info!(
        "Ran {} frames, {} world transform(s) recomputed",
        config.frames,
        recomputed
    );

    // Detach the moon without moving it, then drop the planet.
    let before = system.scene.world_position(system.moon)?;
    system
        .scene
        .set_parent(system.moon, Some(system.sun), true)
        .context("moving the moon under the sun")?;
    let after = system.scene.world_position(system.moon)?;
    log::info!("Moon reparented: {before:?} -> {after:?}");
    let removed = system.scene.despawn(system.planet)?;
    log::info!("Despawned {removed} node(s), {} left", system.scene.len());

    let stats = GLOBAL.stats();
    log::info!(
        "Allocator: {} bytes live in {} block(s), peak {} bytes, {} allocations, average {:.1} bytes",
        stats.current_bytes,
        GLOBAL.block_count(),
        stats.peak_bytes,
        stats.total_allocations,
        stats.average_allocation_size
    );
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    GLOBAL.init();

    let config = SandboxConfig::load_or_default(config_path(std::env::args_os().nth(1)))?;
    run(&config)?;

    let report = GLOBAL.shutdown(&config.allocator);
    if report.is_clean() {
        log::info!("No block left at shutdown");
    }
    log::info!("Final statistics: {}", serde_json::to_string(&report.stats)?);
    Ok(())
}
