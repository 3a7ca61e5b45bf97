use tracing::{debug, info, warn};

use crate::config::GameVariant;
use crate::services::{BitmapDescriptor, Renderer, ResourceLoader, SetDescriptor};
use crate::world::{Bitmap, Id, ObjectState, Set, Setup, World};

use super::active_actors::ActiveActorCache;
use super::engine::EngineError;

/// Setup indices handed to the camera-change handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupChange {
    pub previous: usize,
    pub next: usize,
}

/// Owns the identity of the current set and the "setup changed" flag the
/// scene draw consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetManager {
    current: Option<Id<Set>>,
    setup_changed: bool,
}

impl SetManager {
    pub fn current(&self) -> Option<Id<Set>> {
        self.current
    }

    pub fn current_set<'w>(&self, world: &'w World) -> Option<&'w Set> {
        self.current.and_then(|id| world.sets.get(id))
    }

    pub fn current_set_name<'w>(&self, world: &'w World) -> Option<&'w str> {
        self.current_set(world).map(|set| set.name.as_str())
    }

    pub fn setup_changed(&self) -> bool {
        self.setup_changed
    }

    pub(crate) fn mark_setup_changed(&mut self) {
        self.setup_changed = true;
    }

    pub(crate) fn take_setup_changed(&mut self) -> bool {
        std::mem::take(&mut self.setup_changed)
    }

    /// Points at a restored set without any of the swap side effects.
    pub(crate) fn restore_current(&mut self, current: Option<Id<Set>>) {
        self.current = current;
    }

    /// Returns the pooled set called `name`, or builds one from its resource.
    /// A resource that does not exist is fatal.
    pub fn load_set(
        &self,
        name: &str,
        world: &mut World,
        loader: &mut dyn ResourceLoader,
        variant: GameVariant,
    ) -> Result<Id<Set>, EngineError> {
        if let Some(id) = world.find_set_by_name(name) {
            return Ok(id);
        }
        let resource = match variant {
            GameVariant::Monkey4 => format!("{name}b"),
            GameVariant::Grim => name.to_string(),
        };
        let descriptor = loader
            .open_set(&resource)?
            .ok_or_else(|| EngineError::SetNotFound {
                name: name.to_string(),
            })?;
        let id = build_set(name, &descriptor, world);
        info!(set = name, resource = %resource, "set_loaded");
        Ok(id)
    }

    /// Makes `id` the current set. Returns false when it already was.
    pub fn set_set(
        &mut self,
        id: Id<Set>,
        world: &mut World,
        actors: &mut ActiveActorCache,
        renderer: &mut dyn Renderer,
        variant: GameVariant,
    ) -> bool {
        if self.current == Some(id) {
            return false;
        }
        if variant == GameVariant::Monkey4 {
            for (_, sound) in world.pool_sounds.iter_mut() {
                sound.stop();
            }
        }
        for (_, actor) in world.actors.iter_mut() {
            actor.stop_walking();
            actor.clear_clean_buffer();
            actor.sort_order = 0;
        }
        renderer.refresh_buffers();

        let previous = self.current.replace(id);
        if let Some(set) = world.sets.get_mut(id) {
            set.set_sound_parameters(20, 127);
        }
        if let Some(previous) = previous {
            if world.sets.get(previous).is_some_and(|set| !set.locked) {
                destroy_set(previous, world);
            }
        }
        self.setup_changed = true;
        actors.invalidate();
        debug!(set = ?self.current_set_name(world), "set_changed");
        true
    }

    /// Locks or unlocks any pooled set by name. Unknown names are only logged.
    pub fn set_set_lock(&self, name: &str, locked: bool, world: &mut World) -> bool {
        let Some(id) = world.find_set_by_name(name) else {
            warn!(set = name, "set_lock_target_missing");
            return false;
        };
        if let Some(set) = world.sets.get_mut(id) {
            set.locked = locked;
        }
        true
    }

    /// Switches the current set's camera setup. On an actual change returns
    /// the indices the camera-change handler must be told about.
    pub fn make_current_setup(
        &mut self,
        index: usize,
        world: &mut World,
        renderer: &mut dyn Renderer,
    ) -> Option<SetupChange> {
        let id = self.current?;
        let set = world.sets.get(id)?;
        let previous = set.current_setup;
        if previous == index {
            return None;
        }
        if set.setup(index).is_none() {
            warn!(set = %set.name, setup = index, "setup_out_of_range");
            return None;
        }
        for (_, actor) in world.actors.iter_mut() {
            actor.clear_clean_buffer();
        }
        renderer.refresh_buffers();
        if let Some(set) = world.sets.get_mut(id) {
            set.current_setup = index;
            set.set_sound_parameters(20, 127);
        }
        self.setup_changed = true;
        Some(SetupChange {
            previous,
            next: index,
        })
    }
}

fn create_bitmap(descriptor: &BitmapDescriptor, world: &mut World) -> Id<Bitmap> {
    world.bitmaps.create(Bitmap::new(
        descriptor.filename.clone(),
        descriptor.width,
        descriptor.height,
    ))
}

/// Creates the set and the bitmaps and object states it owns.
fn build_set(name: &str, descriptor: &SetDescriptor, world: &mut World) -> Id<Set> {
    let setups = descriptor
        .setups
        .iter()
        .map(|setup| Setup {
            name: setup.name.clone(),
            camera: setup.camera,
            background: setup
                .background
                .as_ref()
                .map(|bitmap| create_bitmap(bitmap, world)),
        })
        .collect();
    let mut set = Set::new(name, setups);
    set.sound = descriptor.sound;
    for state in &descriptor.states {
        let bitmap = create_bitmap(&state.bitmap, world);
        let mut object_state = ObjectState::new(state.setup, state.layer, Some(bitmap));
        object_state.zbitmap = state
            .zbitmap
            .as_ref()
            .map(|zbitmap| create_bitmap(zbitmap, world));
        set.states.push(world.object_states.create(object_state));
    }
    world.sets.create(set)
}

fn destroy_set(id: Id<Set>, world: &mut World) {
    let Some(set) = world.sets.remove(id) else {
        return;
    };
    for state_id in set.states {
        if let Some(state) = world.object_states.remove(state_id) {
            for bitmap in [state.bitmap, state.zbitmap].into_iter().flatten() {
                world.bitmaps.remove(bitmap);
            }
        }
    }
    for background in set.setups.iter().filter_map(|setup| setup.background) {
        world.bitmaps.remove(background);
    }
    debug!(set = %set.name, "set_destroyed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        DrawCall, HeadlessRenderer, MemoryResourceLoader, RendererConfig, SetupDescriptor,
        StateDescriptor,
    };
    use crate::world::{Actor, Camera, PoolSound, SoundParams, StateLayer, Vec3};

    fn descriptor(name: &str) -> SetDescriptor {
        let bitmap = |file: &str| BitmapDescriptor {
            filename: file.to_string(),
            width: 640,
            height: 480,
        };
        SetDescriptor {
            name: name.to_string(),
            setups: vec![
                SetupDescriptor {
                    name: "wide".to_string(),
                    camera: Camera::default(),
                    background: Some(bitmap("wide.bm")),
                },
                SetupDescriptor {
                    name: "close".to_string(),
                    camera: Camera::default(),
                    background: None,
                },
            ],
            states: vec![StateDescriptor {
                setup: 0,
                layer: StateLayer::State,
                bitmap: bitmap("door.bm"),
                zbitmap: Some(bitmap("door.zbm")),
            }],
            sound: SoundParams {
                min_volume: 5,
                max_volume: 90,
            },
        }
    }

    fn renderer() -> (HeadlessRenderer, crate::services::DrawLog) {
        let log = crate::services::DrawLog::default();
        let config = RendererConfig {
            width: 640,
            height: 480,
            fullscreen: false,
            software: true,
        };
        (HeadlessRenderer::new(config, log.clone()), log)
    }

    #[test]
    fn load_set_builds_entities_from_resource() {
        let mut world = World::default();
        let mut loader = MemoryResourceLoader::new().with_set("mo.set", descriptor("mo.set"));
        let sets = SetManager::default();
        let id = sets
            .load_set("mo.set", &mut world, &mut loader, GameVariant::Grim)
            .expect("load");

        let set = world.sets.get(id).expect("set");
        assert_eq!(set.setups.len(), 2);
        assert_eq!(set.states.len(), 1);
        assert_eq!(set.sound.min_volume, 5);
        assert_eq!(world.bitmaps.len(), 3);

        let again = sets
            .load_set("mo.set", &mut world, &mut loader, GameVariant::Grim)
            .expect("reuse");
        assert_eq!(again, id);
        assert_eq!(world.sets.len(), 1);
    }

    #[test]
    fn monkey4_loads_binary_set_resource() {
        let mut world = World::default();
        let mut loader = MemoryResourceLoader::new().with_set("ship.setb", descriptor("ship.set"));
        let sets = SetManager::default();
        let id = sets
            .load_set("ship.set", &mut world, &mut loader, GameVariant::Monkey4)
            .expect("load");
        assert_eq!(world.sets.get(id).map(|set| set.name.as_str()), Some("ship.set"));
    }

    #[test]
    fn missing_set_resource_is_fatal() {
        let mut world = World::default();
        let mut loader = MemoryResourceLoader::new();
        let error = SetManager::default()
            .load_set("nowhere.set", &mut world, &mut loader, GameVariant::Grim)
            .expect_err("missing");
        assert!(matches!(error, EngineError::SetNotFound { ref name } if name == "nowhere.set"));
    }

    #[test]
    fn set_swap_resets_actors_and_destroys_unlocked_set() {
        let mut world = World::default();
        let mut loader = MemoryResourceLoader::new()
            .with_set("a.set", descriptor("a.set"))
            .with_set("b.set", descriptor("b.set"));
        let mut sets = SetManager::default();
        let mut actors = ActiveActorCache::default();
        let (mut renderer, log) = renderer();

        let a = sets
            .load_set("a.set", &mut world, &mut loader, GameVariant::Grim)
            .expect("a");
        assert!(sets.set_set(a, &mut world, &mut actors, &mut renderer, GameVariant::Grim));
        sets.take_setup_changed();

        let mut manny = Actor::new("manny");
        manny.walk_to(Vec3::new(1.0, 0.0, 0.0));
        manny.sort_order = 4;
        manny.clean_buffer = true;
        let manny = world.actors.create(manny);

        let b = sets
            .load_set("b.set", &mut world, &mut loader, GameVariant::Grim)
            .expect("b");
        actors.mark_clean_for_test();
        log.take_calls();
        assert!(sets.set_set(b, &mut world, &mut actors, &mut renderer, GameVariant::Grim));

        let actor = world.actors.get(manny).expect("actor");
        assert!(!actor.walking);
        assert!(!actor.clean_buffer);
        assert_eq!(actor.sort_order, 0);
        assert!(world.sets.get(a).is_none());
        assert_eq!(world.bitmaps.len(), 3);
        assert_eq!(world.sets.get(b).map(|set| set.sound.max_volume), Some(127));
        assert!(sets.setup_changed());
        assert!(actors.is_dirty());
        assert_eq!(log.calls(), vec![DrawCall::RefreshBuffers]);
    }

    #[test]
    fn locked_set_survives_swap_and_same_set_is_noop() {
        let mut world = World::default();
        let mut loader = MemoryResourceLoader::new()
            .with_set("a.set", descriptor("a.set"))
            .with_set("b.set", descriptor("b.set"));
        let mut sets = SetManager::default();
        let mut actors = ActiveActorCache::default();
        let (mut renderer, _log) = renderer();

        let a = sets
            .load_set("a.set", &mut world, &mut loader, GameVariant::Grim)
            .expect("a");
        sets.set_set(a, &mut world, &mut actors, &mut renderer, GameVariant::Grim);
        assert!(!sets.set_set(a, &mut world, &mut actors, &mut renderer, GameVariant::Grim));

        assert!(sets.set_set_lock("a.set", true, &mut world));
        let b = sets
            .load_set("b.set", &mut world, &mut loader, GameVariant::Grim)
            .expect("b");
        sets.set_set(b, &mut world, &mut actors, &mut renderer, GameVariant::Grim);
        assert!(world.sets.get(a).is_some_and(|set| set.locked));
        assert!(!sets.set_set_lock("missing.set", true, &mut world));
    }

    #[test]
    fn monkey4_swap_stops_pool_sounds() {
        let mut world = World::default();
        let mut loader = MemoryResourceLoader::new().with_set("a.setb", descriptor("a.set"));
        let mut sets = SetManager::default();
        let mut actors = ActiveActorCache::default();
        let (mut renderer, _log) = renderer();
        let sound = world.pool_sounds.create(PoolSound::new("wind.wav", 100, true));
        if let Some(sound) = world.pool_sounds.get_mut(sound) {
            sound.playing = true;
        }

        let a = sets
            .load_set("a.set", &mut world, &mut loader, GameVariant::Monkey4)
            .expect("a");
        sets.set_set(a, &mut world, &mut actors, &mut renderer, GameVariant::Monkey4);
        assert!(world.pool_sounds.iter().all(|(_, sound)| !sound.playing));
    }

    #[test]
    fn setup_change_reports_indices_once() {
        let mut world = World::default();
        let mut loader = MemoryResourceLoader::new().with_set("a.set", descriptor("a.set"));
        let mut sets = SetManager::default();
        let mut actors = ActiveActorCache::default();
        let (mut renderer, _log) = renderer();
        let a = sets
            .load_set("a.set", &mut world, &mut loader, GameVariant::Grim)
            .expect("a");
        sets.set_set(a, &mut world, &mut actors, &mut renderer, GameVariant::Grim);
        sets.take_setup_changed();

        assert_eq!(
            sets.make_current_setup(1, &mut world, &mut renderer),
            Some(SetupChange {
                previous: 0,
                next: 1
            })
        );
        assert!(sets.take_setup_changed());
        assert_eq!(sets.make_current_setup(1, &mut world, &mut renderer), None);
        assert_eq!(sets.make_current_setup(7, &mut world, &mut renderer), None);
        assert!(!sets.setup_changed());
        assert_eq!(
            sets.current_set(&world).map(Set::current_setup_name),
            Some("close")
        );
    }
}
