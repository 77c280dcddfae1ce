//! Headless game session wiring the world and both directors together.

use std::time::Duration;

use glam::DVec3;
use thornfall_core::{
    Event, Inventory, ResourceKind, Stockpile, Strike, TargetRef, Targetable, UnitKind,
    ALLIED_ID_BASE,
};
use thornfall_system_unit_director::UnitDirector;
use thornfall_system_wave_director::WaveDirector;
use thornfall_world::objective::Objective;
use thornfall_world::ChunkStore;

/// Health pool of the defended objective.
const OBJECTIVE_HEALTH: u32 = 1_000;
/// Minimum distance between the player start and the objective.
const TOWER_MIN_DISTANCE: f64 = 60.0;
/// Radius of the observer's stroll around the objective.
const STROLL_RADIUS: f64 = 20.0;
/// Angular speed of the stroll in radians per second.
const STROLL_SPEED: f64 = 0.15;
/// Reach of the observer's harvest interaction.
const HARVEST_REACH: f64 = 3.0;
/// Distance from the objective at which defenders are stationed.
const DEFENCE_RING: f64 = 6.0;

/// One running game: terrain, objective, both rosters, and the player's
/// stockpile. Drives all of them in a fixed per-tick order so replays with
/// the same seed and tick size are identical.
pub(crate) struct Session {
    terrain: ChunkStore,
    objective: Objective,
    waves: WaveDirector,
    units: UnitDirector,
    stockpile: Stockpile,
    clock: Duration,
    placed: u32,
    slain: u32,
    game_over: bool,
}

impl Session {
    /// Boots a session and loads the chunks around the objective.
    #[must_use]
    pub(crate) fn new(seed: u64) -> Self {
        let player_start = DVec3::ZERO;
        let mut terrain = ChunkStore::new(seed);
        let mut events = Vec::new();
        terrain.set_observer(player_start, None, &mut events);

        // The defended structure is placed away from the player start, once
        // per session.
        let x = player_start.x + TOWER_MIN_DISTANCE;
        let z = player_start.z;
        let objective_position = DVec3::new(x, terrain.height_at(x, z), z);

        Self {
            terrain,
            objective: Objective::new(
                objective_position,
                thornfall_core::Health::new(OBJECTIVE_HEALTH),
            ),
            waves: WaveDirector::new(seed, objective_position),
            units: UnitDirector::new(seed.wrapping_add(1)),
            stockpile: Stockpile::new(),
            clock: Duration::ZERO,
            placed: 0,
            slain: 0,
            game_over: false,
        }
    }

    /// Whether the objective has been destroyed, ending the session.
    #[must_use]
    pub(crate) const fn game_over(&self) -> bool {
        self.game_over
    }

    /// Number of the current wave.
    #[must_use]
    pub(crate) fn wave(&self) -> u32 {
        self.waves.wave()
    }

    /// Enemies slain so far.
    #[must_use]
    pub(crate) const fn slain(&self) -> u32 {
        self.slain
    }

    /// Defenders placed so far.
    #[must_use]
    pub(crate) const fn defenders_placed(&self) -> u32 {
        self.placed
    }

    /// Units of a resource currently stockpiled.
    #[must_use]
    pub(crate) fn stock(&self, kind: ResourceKind) -> u32 {
        self.stockpile.count(kind)
    }

    /// Remaining objective health.
    #[must_use]
    pub(crate) fn objective_health(&self) -> u32 {
        self.objective.health().get()
    }

    /// Advances the session by one tick, returning the events it produced.
    pub(crate) fn update(&mut self, dt: Duration) -> Vec<Event> {
        let mut events = Vec::new();
        if self.game_over {
            return events;
        }
        self.clock += dt;

        let observer = self.stroll_position();
        self.terrain.set_observer(observer, None, &mut events);
        self.terrain.update(dt, &mut events);
        self.harvest(observer, &mut events);

        let hostile = self.waves.candidates();
        let allied = self.units.candidates();

        let mut unit_strikes = Vec::new();
        self.units
            .update(dt, &self.terrain, &hostile, &mut events, &mut unit_strikes);

        let mut wave_strikes = Vec::new();
        self.waves.update(
            dt,
            &self.terrain,
            &allied,
            &mut self.objective,
            &mut self.stockpile,
            &mut events,
            &mut wave_strikes,
        );

        self.route_strikes(unit_strikes, wave_strikes);
        self.reinforce(&mut events);

        for event in &events {
            if matches!(event, Event::EnemyRemoved { loot, .. } if loot.experience > 0) {
                self.slain += 1;
            }
        }
        if self.objective.is_dead() {
            self.game_over = true;
        }
        events
    }

    fn stroll_position(&self) -> DVec3 {
        let angle = self.clock.as_secs_f64() * STROLL_SPEED;
        let center = self.objective.position();
        let x = center.x + angle.cos() * STROLL_RADIUS;
        let z = center.z + angle.sin() * STROLL_RADIUS;
        DVec3::new(x, self.terrain.height_at(x, z), z)
    }

    fn harvest(&mut self, observer: DVec3, out_events: &mut Vec<Event>) {
        if let Some(node) = self.terrain.check_interaction(observer, HARVEST_REACH) {
            if let Some(harvest) = self.terrain.interact(node.id, out_events) {
                self.stockpile.add_item(harvest.kind, harvest.amount);
            }
        }
    }

    /// Forwards each roster's outgoing strikes to the roster that owns the
    /// target. Allied identifiers sit above [`ALLIED_ID_BASE`].
    fn route_strikes(&mut self, unit_strikes: Vec<Strike>, wave_strikes: Vec<Strike>) {
        for strike in unit_strikes.into_iter().chain(wave_strikes) {
            if let TargetRef::Agent(id) = strike.target {
                if id.get() >= ALLIED_ID_BASE {
                    self.units.apply_strike(id, strike.amount);
                } else {
                    self.waves.apply_strike(id, strike.amount);
                }
            }
        }
    }

    fn reinforce(&mut self, out_events: &mut Vec<Event>) {
        let (kind, cost) = UnitKind::Militia.cost();
        while self.stockpile.has_item(kind, cost) {
            let angle = f64::from(self.placed) * 1.1;
            let center = self.objective.position();
            let position = DVec3::new(
                center.x + angle.cos() * DEFENCE_RING,
                0.0,
                center.z + angle.sin() * DEFENCE_RING,
            );
            match self.units.try_place(
                UnitKind::Militia,
                position,
                &self.terrain,
                &mut self.stockpile,
                out_events,
            ) {
                Ok(_) => self.placed += 1,
                Err(error) => {
                    tracing::warn!(%error, "defender placement rejected");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn session_boots_with_resident_terrain() {
        let session = Session::new(7);
        assert!(!session.game_over());
        assert!(session.terrain.is_loaded(0.0, 0.0));
        assert_eq!(session.objective_health(), OBJECTIVE_HEALTH);
    }

    #[test]
    fn first_wave_spawns_and_is_observable_through_events() {
        let mut session = Session::new(7);
        let mut saw_wave_start = false;
        let mut saw_spawn = false;
        for _ in 0..120 {
            for event in session.update(TICK) {
                match event {
                    Event::WaveStarted { wave: 1, .. } => saw_wave_start = true,
                    Event::EnemySpawned { .. } => saw_spawn = true,
                    _ => {}
                }
            }
        }
        assert!(saw_wave_start);
        assert!(saw_spawn);
        assert_eq!(session.wave(), 1);
    }

    #[test]
    fn harvested_wood_turns_into_defenders() {
        let mut session = Session::new(7);
        // Credit enough wood directly; reinforcement drains it into units.
        session.stockpile.add_item(ResourceKind::Wood, 12);
        let events = session.update(TICK);
        assert_eq!(session.defenders_placed(), 2);
        assert_eq!(session.stock(ResourceKind::Wood), 2);
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, Event::AllyPlaced { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn same_seed_replays_identically() {
        let run = |seed: u64| -> (u32, u32, Vec<Event>) {
            let mut session = Session::new(seed);
            let mut events = Vec::new();
            for _ in 0..600 {
                events.extend(session.update(TICK));
            }
            (session.objective_health(), session.slain(), events)
        };

        assert_eq!(run(11), run(11));
    }
}
