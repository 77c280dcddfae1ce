#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Hostile wave orchestration.
//!
//! The director owns the hostile roster end to end: wave countdowns, spawn
//! scheduling, per-tick agent updates, strike routing, death reclamation,
//! and wave completion rewards. Waves never desync: a `remaining` counter
//! tracks every enemy the wave promised, decremented only on death or on a
//! consumed spawn failure, and the wave completes exactly when it reaches
//! zero (or a watchdog forces the issue).

use std::time::Duration;

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thornfall_core::schedule::{OwnerId, Schedule};
use thornfall_core::{
    AgentId, EnemyBreed, Event, Inventory, ResourceKind, SpawnError, Strike, TargetCandidate,
    TargetRef, Targetable, Variation, WaveReward,
};
use thornfall_system_agent_ai::Agent;
use thornfall_world::objective::Objective;
use thornfall_world::ChunkStore;

/// Distance from the objective at which enemies spawn.
pub const SPAWN_RADIUS: f64 = 40.0;
/// Delay between the opening-burst spawns of a wave.
const BURST_STAGGER: Duration = Duration::from_millis(500);
/// Bounds of the random delay between follow-up batches.
const BATCH_DELAY: (Duration, Duration) = (Duration::from_secs(4), Duration::from_secs(8));
/// Chance a spawned enemy rolls a stat variation.
const VARIATION_CHANCE: f64 = 0.15;
/// Countdown before the first wave.
const INITIAL_COUNTDOWN: Duration = Duration::from_secs(5);
/// A wave older than this is force-completed.
const WAVE_WATCHDOG: Duration = Duration::from_secs(60);
/// Pending spawns older than this since the last spawn are flushed at once.
const BATCH_WATCHDOG: Duration = Duration::from_secs(30);

/// Number of enemies a wave produces in total.
#[must_use]
pub fn wave_total(wave: u32) -> u32 {
    (5 + 2 * wave).min(30)
}

/// Size of the staggered burst that opens a wave.
#[must_use]
pub fn wave_burst(wave: u32) -> u32 {
    (3 + wave / 2).min(10)
}

/// Size of each follow-up batch after the burst.
#[must_use]
pub fn wave_batch(wave: u32) -> u32 {
    (1 + wave / 3).min(3)
}

/// Owner and driver of the hostile agent roster.
pub struct WaveDirector {
    wave: u32,
    enemies: Vec<Agent>,
    /// Enemies scheduled but not yet spawned this wave.
    pending: u32,
    /// Enemies the wave still owes: pending plus alive.
    remaining: u32,
    wave_in_progress: bool,
    countdown: Duration,
    spawns: Schedule<u32>,
    clock: Duration,
    wave_started_at: Duration,
    last_spawn_at: Duration,
    objective_position: DVec3,
    rng: ChaCha8Rng,
    next_agent: u32,
}

impl WaveDirector {
    /// Creates the director with its deterministic seed and the objective
    /// position its spawn ring is centred on.
    #[must_use]
    pub fn new(seed: u64, objective_position: DVec3) -> Self {
        Self {
            wave: 0,
            enemies: Vec::new(),
            pending: 0,
            remaining: 0,
            wave_in_progress: false,
            countdown: INITIAL_COUNTDOWN,
            spawns: Schedule::new(),
            clock: Duration::ZERO,
            wave_started_at: Duration::ZERO,
            last_spawn_at: Duration::ZERO,
            objective_position,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_agent: 0,
        }
    }

    /// Number of the wave currently spawning or most recently completed.
    #[must_use]
    pub const fn wave(&self) -> u32 {
        self.wave
    }

    /// Whether a wave is currently unresolved.
    #[must_use]
    pub const fn wave_in_progress(&self) -> bool {
        self.wave_in_progress
    }

    /// Time until the next wave starts, while between waves.
    #[must_use]
    pub const fn countdown(&self) -> Duration {
        self.countdown
    }

    /// Enemies currently alive.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.enemies.len()
    }

    /// Enemies the current wave still owes.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Enemies scheduled but not yet spawned this wave.
    #[must_use]
    pub const fn pending(&self) -> u32 {
        self.pending
    }

    /// Perception snapshots of the hostile roster for allied agents.
    #[must_use]
    pub fn candidates(&self) -> Vec<TargetCandidate> {
        self.enemies.iter().map(Agent::candidate).collect()
    }

    /// Applies routed damage to an owned enemy. Unknown identifiers are
    /// ignored; the attacker's information may be one tick stale.
    pub fn apply_strike(&mut self, id: AgentId, amount: u32) {
        if let Some(enemy) = self.enemies.iter_mut().find(|enemy| enemy.id() == id) {
            enemy.take_damage(amount);
        }
    }

    /// Runs one simulation tick.
    ///
    /// `allied` are the opposing roster's perception snapshots. Damage
    /// enemies deal to the objective is applied here; damage aimed at allied
    /// agents leaves through `out_strikes` for the session to route.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        dt: Duration,
        terrain: &ChunkStore,
        allied: &[TargetCandidate],
        objective: &mut Objective,
        inventory: &mut dyn Inventory,
        out_events: &mut Vec<Event>,
        out_strikes: &mut Vec<Strike>,
    ) {
        self.clock += dt;

        if !self.wave_in_progress {
            self.countdown = self.countdown.saturating_sub(dt);
            if self.countdown.is_zero() && !objective.is_dead() {
                self.start_wave(out_events);
            }
        }

        self.run_spawns(terrain, out_events);
        self.run_watchdogs(inventory, out_events);
        self.run_agents(dt, terrain, allied, objective, out_events, out_strikes);
        self.reclaim_dead(inventory, out_events);

        if self.wave_in_progress && self.remaining == 0 {
            self.complete_wave(inventory, out_events);
        }
    }

    fn start_wave(&mut self, out_events: &mut Vec<Event>) {
        self.wave += 1;
        let total = wave_total(self.wave);
        self.remaining = total;
        self.pending = total;
        self.wave_in_progress = true;
        self.wave_started_at = self.clock;
        self.last_spawn_at = self.clock;

        let burst = wave_burst(self.wave).min(total);
        for index in 0..burst {
            self.spawns
                .insert(self.clock + BURST_STAGGER * index, self.wave_owner(), 1);
        }

        tracing::info!(wave = self.wave, total, burst, "wave started");
        out_events.push(Event::WaveStarted {
            wave: self.wave,
            total,
        });
    }

    fn run_spawns(&mut self, terrain: &ChunkStore, out_events: &mut Vec<Event>) {
        let due: u32 = self.spawns.drain_due(self.clock).into_iter().sum();
        for _ in 0..due.min(self.pending) {
            self.pending -= 1;
            self.last_spawn_at = self.clock;
            match self.spawn_enemy(terrain) {
                Ok(enemy) => {
                    out_events.push(Event::EnemySpawned {
                        agent: enemy.id(),
                        breed: enemy.breed().unwrap_or(EnemyBreed::Goblin),
                    });
                    self.enemies.push(enemy);
                }
                Err(error) => {
                    // Consume the failure so wave accounting stays balanced.
                    self.remaining -= 1;
                    tracing::warn!(wave = self.wave, %error, "enemy spawn failed");
                }
            }
        }

        // Follow-up batches are scheduled lazily so a flushed or failed
        // batch never leaves stale timers behind.
        if self.wave_in_progress && self.pending > 0 && self.spawns.is_empty() {
            let size = wave_batch(self.wave).min(self.pending);
            let delay = self
                .rng
                .gen_range(BATCH_DELAY.0.as_millis()..=BATCH_DELAY.1.as_millis());
            let delay = Duration::from_millis(delay as u64);
            self.spawns
                .insert(self.clock + delay, self.wave_owner(), size);
        }
    }

    fn run_watchdogs(&mut self, inventory: &mut dyn Inventory, out_events: &mut Vec<Event>) {
        if !self.wave_in_progress {
            return;
        }

        if self.pending > 0 && self.clock - self.last_spawn_at > BATCH_WATCHDOG {
            tracing::warn!(
                wave = self.wave,
                pending = self.pending,
                "spawn stall, flushing pending spawns"
            );
            let _ = self.spawns.cancel_owner(self.wave_owner());
            self.spawns.insert(self.clock, self.wave_owner(), self.pending);
        }

        // A wave that has run long with nothing alive can only mean its
        // spawn registrations were lost. Treat it as won rather than hang.
        if self.enemies.is_empty() && self.clock - self.wave_started_at > WAVE_WATCHDOG {
            tracing::warn!(
                wave = self.wave,
                remaining = self.remaining,
                "wave watchdog fired, force-completing"
            );
            self.pending = 0;
            self.complete_wave(inventory, out_events);
        }
    }

    fn run_agents(
        &mut self,
        dt: Duration,
        terrain: &ChunkStore,
        allied: &[TargetCandidate],
        objective: &mut Objective,
        out_events: &mut Vec<Event>,
        out_strikes: &mut Vec<Strike>,
    ) {
        let mut candidates = allied.to_vec();
        candidates.push(TargetCandidate {
            target: TargetRef::Objective,
            position: objective.position(),
            alive: !objective.is_dead(),
        });

        let mut strikes = Vec::new();
        for enemy in &mut self.enemies {
            enemy.update(
                dt,
                |x, z| terrain.height_at(x, z),
                &candidates,
                &mut self.rng,
                &mut strikes,
            );
        }

        for strike in strikes {
            match strike.target {
                TargetRef::Objective => {
                    objective.take_damage(strike.amount);
                    out_events.push(Event::ObjectiveDamaged {
                        remaining: objective.health(),
                    });
                    if objective.take_destroyed_edge() {
                        out_events.push(Event::ObjectiveDestroyed);
                    }
                }
                TargetRef::Agent(_) => out_strikes.push(strike),
            }
        }
    }

    fn reclaim_dead(&mut self, inventory: &mut dyn Inventory, out_events: &mut Vec<Event>) {
        let mut index = 0;
        while index < self.enemies.len() {
            if !self.enemies[index].is_dead() {
                index += 1;
                continue;
            }
            let enemy = self.enemies.remove(index);
            let loot = Agent::roll_loot(
                &mut self.rng,
                enemy.breed().unwrap_or(EnemyBreed::Goblin),
            );
            inventory.add_item(loot.kind, loot.amount);
            self.remaining -= 1;
            out_events.push(Event::EnemyRemoved {
                agent: enemy.id(),
                loot,
            });
        }
    }

    fn complete_wave(&mut self, inventory: &mut dyn Inventory, out_events: &mut Vec<Event>) {
        let _ = self.spawns.cancel_owner(self.wave_owner());
        let reward = WaveReward::for_wave(self.wave, self.remaining);
        inventory.add_item(ResourceKind::Wood, reward.wood);
        inventory.add_item(ResourceKind::Stone, reward.stone);
        self.remaining = 0;
        self.pending = 0;
        self.wave_in_progress = false;
        self.countdown = Duration::from_secs(u64::from(20 + 2 * self.wave));

        tracing::info!(wave = self.wave, ?reward, "wave completed");
        out_events.push(Event::WaveCompleted {
            wave: self.wave,
            reward,
        });
    }

    fn spawn_enemy(&mut self, terrain: &ChunkStore) -> Result<Agent, SpawnError> {
        let unlocked = EnemyBreed::unlocked_for(self.wave);
        let breed = unlocked[self.rng.gen_range(0..unlocked.len())];

        let mut spec = breed.spec();
        if self.rng.gen_bool(VARIATION_CHANCE) {
            let variation = Variation::ALL[self.rng.gen_range(0..Variation::ALL.len())];
            spec = variation.apply(spec);
        }
        spec = spec.scaled_for_wave(self.wave);

        let angle = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let x = self.objective_position.x + angle.cos() * SPAWN_RADIUS;
        let z = self.objective_position.z + angle.sin() * SPAWN_RADIUS;
        let position = DVec3::new(x, terrain.height_at(x, z), z);
        if !position.is_finite() {
            return Err(SpawnError::NonFinitePosition);
        }

        let id = AgentId::new(self.next_agent);
        self.next_agent += 1;

        let mut enemy = Agent::hostile(id, breed, spec, position);
        enemy.pin_target(TargetRef::Objective);
        Ok(enemy)
    }

    fn wave_owner(&self) -> OwnerId {
        OwnerId::new(u64::from(self.wave))
    }
}
