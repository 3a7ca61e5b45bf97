mod actor;
mod bitmap;
mod font;
mod object_state;
mod pool;
mod primitive;
mod set;
mod sound;
mod text_object;
mod types;

use tracing::debug;

use crate::config::GameVariant;
use crate::savegame::{SaveError, SaveReader, SaveWriter};

pub use actor::Actor;
pub use bitmap::Bitmap;
pub use font::Font;
pub use object_state::{ObjectState, StateLayer};
pub use pool::{Id, ObjectPool, PoolKind, PoolObject};
pub use primitive::{PrimitiveObject, PrimitiveShape};
pub use set::{Camera, Set, Setup, SoundParams};
pub use sound::{Layer, PoolSound};
pub use text_object::{Justify, TextDefaults, TextObject, TextStyle};
pub use types::{Color, Point, Vec3};

/// Every entity pool of the running game.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct World {
    pub bitmaps: ObjectPool<Bitmap>,
    pub fonts: ObjectPool<Font>,
    pub object_states: ObjectPool<ObjectState>,
    pub sets: ObjectPool<Set>,
    pub text_objects: ObjectPool<TextObject>,
    pub primitives: ObjectPool<PrimitiveObject>,
    pub actors: ObjectPool<Actor>,
    pub pool_sounds: ObjectPool<PoolSound>,
    pub layers: ObjectPool<Layer>,
}

/// Pools persisted for a game variant, in save order.
pub fn pools_for(variant: GameVariant) -> impl Iterator<Item = PoolKind> {
    PoolKind::SAVE_ORDER
        .into_iter()
        .filter(move |kind| variant == GameVariant::Monkey4 || !kind.is_variant_specific())
}

impl World {
    pub fn clear_all(&mut self) {
        for kind in PoolKind::SAVE_ORDER {
            self.clear_pool(kind);
        }
        debug!("pools_cleared");
    }

    pub fn len_of(&self, kind: PoolKind) -> usize {
        match kind {
            PoolKind::Bitmap => self.bitmaps.len(),
            PoolKind::Font => self.fonts.len(),
            PoolKind::ObjectState => self.object_states.len(),
            PoolKind::Set => self.sets.len(),
            PoolKind::TextObject => self.text_objects.len(),
            PoolKind::PrimitiveObject => self.primitives.len(),
            PoolKind::Actor => self.actors.len(),
            PoolKind::PoolSound => self.pool_sounds.len(),
            PoolKind::Layer => self.layers.len(),
        }
    }

    pub fn find_set_by_name(&self, name: &str) -> Option<Id<Set>> {
        self.sets.find(|set| set.name == name)
    }

    pub fn find_actor_by_name(&self, name: &str) -> Option<Id<Actor>> {
        self.actors.find(|actor| actor.name == name)
    }

    pub fn save_pools(&self, sink: &mut SaveWriter, variant: GameVariant) {
        for kind in pools_for(variant) {
            match kind {
                PoolKind::Bitmap => self.bitmaps.save_all(sink),
                PoolKind::Font => self.fonts.save_all(sink),
                PoolKind::ObjectState => self.object_states.save_all(sink),
                PoolKind::Set => self.sets.save_all(sink),
                PoolKind::TextObject => self.text_objects.save_all(sink),
                PoolKind::PrimitiveObject => self.primitives.save_all(sink),
                PoolKind::Actor => self.actors.save_all(sink),
                PoolKind::PoolSound => self.pool_sounds.save_all(sink),
                PoolKind::Layer => self.layers.save_all(sink),
            }
        }
    }

    /// Restores every pool of `variant` in save order, then checks that every
    /// identity-valued field names a live entity. The world is only replaced
    /// once all of that succeeded.
    pub fn restore_pools(
        &mut self,
        source: &mut SaveReader<'_>,
        variant: GameVariant,
    ) -> Result<(), SaveError> {
        let mut staged = World::default();
        for kind in pools_for(variant) {
            match kind {
                PoolKind::Bitmap => staged.bitmaps.restore_all(source)?,
                PoolKind::Font => staged.fonts.restore_all(source)?,
                PoolKind::ObjectState => staged.object_states.restore_all(source)?,
                PoolKind::Set => staged.sets.restore_all(source)?,
                PoolKind::TextObject => staged.text_objects.restore_all(source)?,
                PoolKind::PrimitiveObject => staged.primitives.restore_all(source)?,
                PoolKind::Actor => staged.actors.restore_all(source)?,
                PoolKind::PoolSound => staged.pool_sounds.restore_all(source)?,
                PoolKind::Layer => staged.layers.restore_all(source)?,
            }
        }
        staged.resolve_references()?;
        *self = staged;
        Ok(())
    }

    fn resolve_references(&self) -> Result<(), SaveError> {
        self.bitmaps.resolve_all(self)?;
        self.fonts.resolve_all(self)?;
        self.object_states.resolve_all(self)?;
        self.sets.resolve_all(self)?;
        self.text_objects.resolve_all(self)?;
        self.primitives.resolve_all(self)?;
        self.actors.resolve_all(self)?;
        self.pool_sounds.resolve_all(self)?;
        self.layers.resolve_all(self)
    }

    fn clear_pool(&mut self, kind: PoolKind) {
        match kind {
            PoolKind::Bitmap => self.bitmaps.delete_all(),
            PoolKind::Font => self.fonts.delete_all(),
            PoolKind::ObjectState => self.object_states.delete_all(),
            PoolKind::Set => self.sets.delete_all(),
            PoolKind::TextObject => self.text_objects.delete_all(),
            PoolKind::PrimitiveObject => self.primitives.delete_all(),
            PoolKind::Actor => self.actors.delete_all(),
            PoolKind::PoolSound => self.pool_sounds.delete_all(),
            PoolKind::Layer => self.layers.delete_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_world() -> World {
        let mut world = World::default();
        let background = world.bitmaps.create(Bitmap::new("mo_ddtws.bm", 640, 480));
        let lamp = world.bitmaps.create(Bitmap::new("mo_lamp.bm", 32, 64));
        let font = world.fonts.create(Font::new("font0.laf"));
        let state = world
            .object_states
            .create(ObjectState::new(0, StateLayer::Overlay, Some(lamp)));
        let mut office = Set::new(
            "mo.set",
            vec![Setup {
                name: "mo_ddtws".to_string(),
                camera: Camera::default(),
                background: Some(background),
            }],
        );
        office.states.push(state);
        office.locked = true;
        world.sets.create(office);
        world.text_objects.create(TextObject::new(
            "Hello",
            TextStyle {
                font: Some(font),
                fg_color: Color::new(12, 200, 99),
                ..TextStyle::default()
            },
        ));
        world.primitives.create(PrimitiveObject::line(
            Point::new(0, 0),
            Point::new(10, 10),
            Color::WHITE,
        ));
        let mut manny = Actor::new("manny");
        manny.put_in_set("mo.set");
        manny.talk_font = Some(font);
        manny.walk_to(Vec3::new(1.0, 2.0, 3.0));
        world.actors.create(manny);
        world.pool_sounds.create(PoolSound::new("ambience.wav", 90, true));
        world.layers.create(Layer {
            bitmap: Some(lamp),
            sort_order: 3,
            frame: 1,
        });
        world
    }

    #[test]
    fn save_restore_round_trip_is_identity() {
        let world = populated_world();
        let mut sink = SaveWriter::new();
        world.save_pools(&mut sink, GameVariant::Monkey4);
        let bytes = sink.finish();

        let mut restored = World::default();
        let mut source = SaveReader::new(&bytes).expect("header");
        restored
            .restore_pools(&mut source, GameVariant::Monkey4)
            .expect("restore");
        assert_eq!(restored, world);
    }

    #[test]
    fn grim_saves_skip_variant_specific_pools() {
        let kinds = pools_for(GameVariant::Grim).collect::<Vec<_>>();
        assert_eq!(kinds.len(), 7);
        assert!(!kinds.contains(&PoolKind::PoolSound));
        assert!(!kinds.contains(&PoolKind::Layer));
        assert_eq!(pools_for(GameVariant::Monkey4).count(), 9);
    }

    #[test]
    fn dangling_font_reference_is_rejected_and_world_untouched() {
        let mut world = World::default();
        let font = world.fonts.create(Font::new("font0.laf"));
        let mut actor = Actor::new("manny");
        actor.talk_font = Some(font);
        world.actors.create(actor);
        world.fonts.remove(font);

        let mut sink = SaveWriter::new();
        world.save_pools(&mut sink, GameVariant::Grim);
        let bytes = sink.finish();

        let mut target = populated_world();
        let before = target.clone();
        let mut source = SaveReader::new(&bytes).expect("header");
        let error = target
            .restore_pools(&mut source, GameVariant::Grim)
            .expect_err("dangling");
        assert!(matches!(
            error,
            SaveError::DanglingReference {
                owner: PoolKind::Actor,
                kind: PoolKind::Font,
                id,
            } if id == font.raw()
        ));
        assert_eq!(target, before);
    }

    #[test]
    fn clear_all_empties_every_pool() {
        let mut world = populated_world();
        world.clear_all();
        for kind in PoolKind::SAVE_ORDER {
            assert_eq!(world.len_of(kind), 0, "{kind}");
        }
    }
}
