use crate::savegame::{SaveError, SaveReader, SaveWriter};

use super::{Color, Font, Id, PoolKind, PoolObject, Vec3, World};

const ARRIVAL_THRESHOLD: f32 = 0.01;

/// A character or prop that lives in a set (or in the overworld).
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub name: String,
    pub set_name: String,
    pub pos: Vec3,
    pub yaw: f32,
    pub visible: bool,
    pub walking: bool,
    pub walk_target: Vec3,
    /// Units per second.
    pub walk_rate: f32,
    pub sort_order: i32,
    pub clean_buffer: bool,
    pub in_overworld: bool,
    pub talk_color: Color,
    pub talk_font: Option<Id<Font>>,
    pub talking: bool,
    pub background_talk: bool,
    pub talk_remaining_ms: i32,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            set_name: String::new(),
            pos: Vec3::default(),
            yaw: 0.0,
            visible: true,
            walking: false,
            walk_target: Vec3::default(),
            walk_rate: 1.0,
            sort_order: 0,
            clean_buffer: false,
            in_overworld: false,
            talk_color: Color::WHITE,
            talk_font: None,
            talking: false,
            background_talk: false,
            talk_remaining_ms: 0,
        }
    }

    pub fn put_in_set(&mut self, set_name: impl Into<String>) {
        self.set_name = set_name.into();
    }

    pub fn is_in_set(&self, set_name: &str) -> bool {
        !self.set_name.is_empty() && self.set_name == set_name
    }

    pub fn walk_to(&mut self, target: Vec3) {
        self.walk_target = target;
        self.walking = true;
    }

    pub fn stop_walking(&mut self) {
        self.walking = false;
        self.walk_target = self.pos;
    }

    pub fn clear_clean_buffer(&mut self) {
        self.clean_buffer = false;
    }

    /// Advances an in-progress walk by one frame.
    pub fn update(&mut self, frame_time_ms: u32) {
        if !self.walking {
            return;
        }
        let step = self.walk_rate * frame_time_ms as f32 / 1000.0;
        let remaining = self.pos.distance(self.walk_target);
        if remaining <= step.max(ARRIVAL_THRESHOLD) {
            self.pos = self.walk_target;
            self.walking = false;
            return;
        }
        let t = step / remaining;
        self.pos = Vec3::new(
            self.pos.x + (self.walk_target.x - self.pos.x) * t,
            self.pos.y + (self.walk_target.y - self.pos.y) * t,
            self.pos.z + (self.walk_target.z - self.pos.z) * t,
        );
    }

    pub fn say_line(&mut self, duration_ms: i32, background: bool) {
        self.talking = true;
        self.background_talk = background;
        self.talk_remaining_ms = duration_ms.max(0);
    }

    pub fn shut_up(&mut self) {
        self.talking = false;
        self.background_talk = false;
        self.talk_remaining_ms = 0;
    }

    /// Advances the current line; returns whether the actor is still talking.
    pub fn update_talk(&mut self, frame_time_ms: u32) -> bool {
        if !self.talking {
            return false;
        }
        self.talk_remaining_ms = self
            .talk_remaining_ms
            .saturating_sub(i32::try_from(frame_time_ms).unwrap_or(i32::MAX));
        if self.talk_remaining_ms <= 0 {
            self.shut_up();
        }
        self.talking
    }

    pub fn is_talking_foreground(&self) -> bool {
        self.talking && !self.background_talk
    }
}

impl PoolObject for Actor {
    const KIND: PoolKind = PoolKind::Actor;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_string(&self.name);
        sink.write_string(&self.set_name);
        self.pos.write(sink);
        sink.write_f32(self.yaw);
        sink.write_bool(self.visible);
        sink.write_bool(self.walking);
        self.walk_target.write(sink);
        sink.write_f32(self.walk_rate);
        sink.write_i32(self.sort_order);
        sink.write_bool(self.clean_buffer);
        sink.write_bool(self.in_overworld);
        self.talk_color.write(sink);
        sink.write_id(self.talk_font);
        sink.write_bool(self.talking);
        sink.write_bool(self.background_talk);
        sink.write_i32(self.talk_remaining_ms);
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            name: source.read_string()?,
            set_name: source.read_string()?,
            pos: Vec3::read(source)?,
            yaw: source.read_f32()?,
            visible: source.read_bool()?,
            walking: source.read_bool()?,
            walk_target: Vec3::read(source)?,
            walk_rate: source.read_f32()?,
            sort_order: source.read_i32()?,
            clean_buffer: source.read_bool()?,
            in_overworld: source.read_bool()?,
            talk_color: Color::read(source)?,
            talk_font: source.read_id()?,
            talking: source.read_bool()?,
            background_talk: source.read_bool()?,
            talk_remaining_ms: source.read_i32()?,
        })
    }

    fn resolve_references(&self, world: &World) -> Result<(), SaveError> {
        world.fonts.resolve(Self::KIND, self.talk_font)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_reaches_target_and_stops() {
        let mut actor = Actor::new("manny");
        actor.walk_rate = 2.0;
        actor.walk_to(Vec3::new(1.0, 0.0, 0.0));

        actor.update(250);
        assert!(actor.walking);
        assert!((actor.pos.x - 0.5).abs() < 0.0001);

        actor.update(500);
        assert!(!actor.walking);
        assert_eq!(actor.pos, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn talk_runs_out_after_duration() {
        let mut actor = Actor::new("glottis");
        actor.say_line(100, false);
        assert!(actor.is_talking_foreground());
        assert!(actor.update_talk(50));
        assert!(!actor.update_talk(50));
        assert!(!actor.is_talking_foreground());
    }

    #[test]
    fn oversized_frame_time_ends_talk() {
        let mut actor = Actor::new("meche");
        actor.say_line(100, false);
        assert!(!actor.update_talk(u32::MAX));
        assert!(!actor.talking);
    }

    #[test]
    fn background_talk_is_not_foreground() {
        let mut actor = Actor::new("eva");
        actor.say_line(1000, true);
        assert!(actor.talking);
        assert!(!actor.is_talking_foreground());
    }

    #[test]
    fn empty_set_name_matches_nothing() {
        let actor = Actor::new("domino");
        assert!(!actor.is_in_set(""));
    }
}
