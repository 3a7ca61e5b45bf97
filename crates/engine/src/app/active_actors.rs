use tracing::debug;

use crate::world::{Actor, Id, World};

use super::mode::EngineMode;

/// Actors that take part in the current frame, rebuilt lazily from the
/// actor pool, plus the actors currently speaking a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveActorCache {
    actors: Vec<Id<Actor>>,
    talking: Vec<Id<Actor>>,
    dirty: bool,
}

impl Default for ActiveActorCache {
    fn default() -> Self {
        Self {
            actors: Vec::new(),
            talking: Vec::new(),
            dirty: true,
        }
    }
}

impl ActiveActorCache {
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Repopulates from the pool if stale. Actors of the current set count in
    /// modes that show the scene; overworld actors always count.
    pub fn rebuild(&mut self, world: &World, current_set: Option<&str>, mode: EngineMode) {
        if !self.dirty {
            return;
        }
        let scene_mode = mode.policy().scene_actors_active;
        self.actors.clear();
        for (id, actor) in world.actors.iter() {
            let in_scene = scene_mode && current_set.is_some_and(|name| actor.is_in_set(name));
            if in_scene || actor.in_overworld {
                self.actors.push(id);
            }
        }
        self.dirty = false;
        debug!(count = self.actors.len(), mode = %mode, "active_actors_rebuilt");
    }

    pub fn actors(&self) -> &[Id<Actor>] {
        &self.actors
    }

    /// Drops an actor from both lists right away, without waiting for a rebuild.
    pub fn immediately_remove(&mut self, id: Id<Actor>) {
        self.actors.retain(|active| *active != id);
        self.talking.retain(|talking| *talking != id);
    }

    pub fn add_talking(&mut self, id: Id<Actor>) {
        self.talking.push(id);
    }

    pub fn talking(&self) -> &[Id<Actor>] {
        &self.talking
    }

    pub fn are_actors_talking(&self, world: &World) -> bool {
        self.talking.iter().any(|id| {
            world
                .actors
                .get(*id)
                .is_some_and(Actor::is_talking_foreground)
        })
    }

    /// Advances every talking actor and forgets those that finished.
    pub(crate) fn update_talking(&mut self, world: &mut World, frame_time_ms: u32) {
        self.talking.retain(|id| {
            world
                .actors
                .get_mut(*id)
                .is_some_and(|actor| actor.update_talk(frame_time_ms))
        });
    }

    pub(crate) fn clear(&mut self) {
        self.actors.clear();
        self.talking.clear();
        self.dirty = true;
    }

    #[cfg(test)]
    pub(crate) fn mark_clean_for_test(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_actors() -> (World, Vec<Id<Actor>>) {
        let mut world = World::default();
        let mut ids = Vec::new();
        for (name, set) in [("manny", "mo.set"), ("glottis", "gs.set"), ("eva", "mo.set")] {
            let mut actor = Actor::new(name);
            actor.put_in_set(set);
            ids.push(world.actors.create(actor));
        }
        let mut narrator = Actor::new("narrator");
        narrator.in_overworld = true;
        ids.push(world.actors.create(narrator));
        (world, ids)
    }

    #[test]
    fn normal_mode_keeps_set_members_and_overworld() {
        let (world, ids) = world_with_actors();
        let mut cache = ActiveActorCache::default();
        cache.rebuild(&world, Some("mo.set"), EngineMode::Normal);
        assert_eq!(cache.actors(), &[ids[0], ids[2], ids[3]]);
    }

    #[test]
    fn smush_mode_keeps_only_overworld() {
        let (world, ids) = world_with_actors();
        let mut cache = ActiveActorCache::default();
        cache.rebuild(&world, Some("mo.set"), EngineMode::Smush);
        assert_eq!(cache.actors(), &[ids[3]]);
    }

    #[test]
    fn rebuild_is_lazy_until_invalidated() {
        let (mut world, ids) = world_with_actors();
        let mut cache = ActiveActorCache::default();
        cache.rebuild(&world, Some("mo.set"), EngineMode::Normal);

        if let Some(actor) = world.actors.get_mut(ids[1]) {
            actor.put_in_set("mo.set");
        }
        cache.rebuild(&world, Some("mo.set"), EngineMode::Normal);
        assert_eq!(cache.actors().len(), 3);

        cache.invalidate();
        cache.rebuild(&world, Some("mo.set"), EngineMode::Normal);
        assert_eq!(cache.actors().len(), 4);
    }

    #[test]
    fn immediate_removal_hits_active_and_talking_lists() {
        let (mut world, ids) = world_with_actors();
        let mut cache = ActiveActorCache::default();
        cache.rebuild(&world, Some("mo.set"), EngineMode::Normal);
        if let Some(actor) = world.actors.get_mut(ids[0]) {
            actor.say_line(500, false);
        }
        cache.add_talking(ids[0]);
        assert!(cache.are_actors_talking(&world));

        cache.immediately_remove(ids[0]);
        assert!(!cache.actors().contains(&ids[0]));
        assert!(cache.talking().is_empty());
        assert!(!cache.is_dirty());
    }

    #[test]
    fn finished_talkers_leave_the_talking_list() {
        let (mut world, ids) = world_with_actors();
        let mut cache = ActiveActorCache::default();
        for (id, duration) in [(ids[0], 100), (ids[2], 1000)] {
            if let Some(actor) = world.actors.get_mut(id) {
                actor.say_line(duration, false);
            }
            cache.add_talking(id);
        }
        cache.update_talking(&mut world, 150);
        assert_eq!(cache.talking(), &[ids[2]]);
    }

    #[test]
    fn background_talk_does_not_count_as_talking() {
        let (mut world, ids) = world_with_actors();
        let mut cache = ActiveActorCache::default();
        if let Some(actor) = world.actors.get_mut(ids[1]) {
            actor.say_line(500, true);
        }
        cache.add_talking(ids[1]);
        assert!(!cache.are_actors_talking(&world));
    }
}
