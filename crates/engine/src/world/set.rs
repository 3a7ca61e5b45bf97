use crate::savegame::{SaveError, SaveReader, SaveWriter};

use super::{Bitmap, Id, ObjectState, PoolKind, PoolObject, Vec3, World};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub interest: Vec3,
    pub roll: f32,
    pub fov: f32,
}

impl Camera {
    fn write(self, sink: &mut SaveWriter) {
        self.position.write(sink);
        self.interest.write(sink);
        sink.write_f32(self.roll);
        sink.write_f32(self.fov);
    }

    fn read(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            position: Vec3::read(source)?,
            interest: Vec3::read(source)?,
            roll: source.read_f32()?,
            fov: source.read_f32()?,
        })
    }
}

/// A named camera configuration within a set.
#[derive(Debug, Clone, PartialEq)]
pub struct Setup {
    pub name: String,
    pub camera: Camera,
    pub background: Option<Id<Bitmap>>,
}

/// Ambient volume range applied when a set becomes current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundParams {
    pub min_volume: i32,
    pub max_volume: i32,
}

impl Default for SoundParams {
    fn default() -> Self {
        Self {
            min_volume: 20,
            max_volume: 127,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    pub name: String,
    pub setups: Vec<Setup>,
    pub current_setup: usize,
    pub locked: bool,
    pub sound: SoundParams,
    pub states: Vec<Id<ObjectState>>,
}

impl Set {
    pub fn new(name: impl Into<String>, setups: Vec<Setup>) -> Self {
        Self {
            name: name.into(),
            setups,
            current_setup: 0,
            locked: false,
            sound: SoundParams::default(),
            states: Vec::new(),
        }
    }

    pub fn setup(&self, index: usize) -> Option<&Setup> {
        self.setups.get(index)
    }

    pub fn current_setup(&self) -> Option<&Setup> {
        self.setups.get(self.current_setup)
    }

    pub fn current_setup_name(&self) -> &str {
        self.current_setup().map_or("", |setup| setup.name.as_str())
    }

    pub fn setup_index(&self, name: &str) -> Option<usize> {
        self.setups.iter().position(|setup| setup.name == name)
    }

    pub fn set_sound_parameters(&mut self, min_volume: i32, max_volume: i32) {
        self.sound = SoundParams {
            min_volume,
            max_volume,
        };
    }
}

impl PoolObject for Set {
    const KIND: PoolKind = PoolKind::Set;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_string(&self.name);
        sink.write_u32(self.setups.len() as u32);
        for setup in &self.setups {
            sink.write_string(&setup.name);
            setup.camera.write(sink);
            sink.write_id(setup.background);
        }
        sink.write_u32(self.current_setup as u32);
        sink.write_bool(self.locked);
        sink.write_i32(self.sound.min_volume);
        sink.write_i32(self.sound.max_volume);
        sink.write_u32(self.states.len() as u32);
        for state in &self.states {
            sink.write_id(Some(*state));
        }
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        let name = source.read_string()?;
        let setup_count = source.read_u32()?;
        let mut setups = Vec::new();
        for _ in 0..setup_count {
            setups.push(Setup {
                name: source.read_string()?,
                camera: Camera::read(source)?,
                background: source.read_id()?,
            });
        }
        let current_setup = source.read_u32()? as usize;
        if !setups.is_empty() && current_setup >= setups.len() {
            return Err(SaveError::invalid_format(format!(
                "set {name} current setup {current_setup} out of range"
            )));
        }
        let locked = source.read_bool()?;
        let sound = SoundParams {
            min_volume: source.read_i32()?,
            max_volume: source.read_i32()?,
        };
        let state_count = source.read_u32()?;
        let mut states = Vec::new();
        for _ in 0..state_count {
            let state = source
                .read_id()?
                .ok_or_else(|| SaveError::invalid_format("set lists object state 0"))?;
            states.push(state);
        }
        Ok(Self {
            name,
            setups,
            current_setup,
            locked,
            sound,
            states,
        })
    }

    fn resolve_references(&self, world: &World) -> Result<(), SaveError> {
        for setup in &self.setups {
            world.bitmaps.resolve(Self::KIND, setup.background)?;
        }
        for state in &self.states {
            world.object_states.resolve(Self::KIND, Some(*state))?;
        }
        Ok(())
    }
}
