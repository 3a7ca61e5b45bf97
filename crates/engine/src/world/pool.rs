use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use tracing::debug;

use crate::savegame::{SaveError, SaveReader, SaveWriter, Tag};

use super::World;

/// Pool-local identity of an entity. Raw value 0 is reserved for "no reference",
/// so a live identity is always non-zero and an absent reference is `Option::None`.
pub struct Id<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self {
            raw,
            _marker: PhantomData,
        })
    }

    pub fn raw(self) -> u32 {
        self.raw
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.raw)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Entity types with a pool of their own. The declaration order is the save order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Bitmap,
    Font,
    ObjectState,
    Set,
    TextObject,
    PrimitiveObject,
    Actor,
    PoolSound,
    Layer,
}

impl PoolKind {
    pub const SAVE_ORDER: [PoolKind; 9] = [
        PoolKind::Bitmap,
        PoolKind::Font,
        PoolKind::ObjectState,
        PoolKind::Set,
        PoolKind::TextObject,
        PoolKind::PrimitiveObject,
        PoolKind::Actor,
        PoolKind::PoolSound,
        PoolKind::Layer,
    ];

    pub const fn tag(self) -> Tag {
        match self {
            PoolKind::Bitmap => Tag::new(*b"BMAP"),
            PoolKind::Font => Tag::new(*b"FONT"),
            PoolKind::ObjectState => Tag::new(*b"STAT"),
            PoolKind::Set => Tag::new(*b"SET "),
            PoolKind::TextObject => Tag::new(*b"TEXT"),
            PoolKind::PrimitiveObject => Tag::new(*b"PRIM"),
            PoolKind::Actor => Tag::new(*b"ACTR"),
            PoolKind::PoolSound => Tag::new(*b"PSND"),
            PoolKind::Layer => Tag::new(*b"LAYR"),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PoolKind::Bitmap => "bitmap",
            PoolKind::Font => "font",
            PoolKind::ObjectState => "object_state",
            PoolKind::Set => "set",
            PoolKind::TextObject => "text_object",
            PoolKind::PrimitiveObject => "primitive_object",
            PoolKind::Actor => "actor",
            PoolKind::PoolSound => "pool_sound",
            PoolKind::Layer => "layer",
        }
    }

    /// Pools that only exist for the Monkey4 variant.
    pub const fn is_variant_specific(self) -> bool {
        matches!(self, PoolKind::PoolSound | PoolKind::Layer)
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An entity stored in an [`ObjectPool`], with its fixed-layout save record.
pub trait PoolObject: Sized {
    const KIND: PoolKind;

    fn save_record(&self, sink: &mut SaveWriter);

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError>;

    /// Second restore pass: every identity-valued field must name a live entity.
    fn resolve_references(&self, _world: &World) -> Result<(), SaveError> {
        Ok(())
    }
}

/// Owning container for every live entity of one type, indexed by identity.
///
/// Identities are allocated from a monotonically increasing counter, so
/// ascending identity order is creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPool<T> {
    objects: BTreeMap<u32, T>,
    next_id: u32,
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> ObjectPool<T> {
    pub fn create(&mut self, object: T) -> Id<T> {
        let raw = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.objects.insert(raw, object);
        Id {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.objects.get(&id.raw)
    }

    pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
        self.objects.get_mut(&id.raw)
    }

    pub fn contains(&self, id: Id<T>) -> bool {
        self.objects.contains_key(&id.raw)
    }

    pub fn remove(&mut self, id: Id<T>) -> Option<T> {
        self.objects.remove(&id.raw)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> + '_ {
        self.objects.iter().map(|(raw, object)| {
            (
                Id {
                    raw: *raw,
                    _marker: PhantomData,
                },
                object,
            )
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Id<T>, &mut T)> + '_ {
        self.objects.iter_mut().map(|(raw, object)| {
            (
                Id {
                    raw: *raw,
                    _marker: PhantomData,
                },
                object,
            )
        })
    }

    pub fn ids(&self) -> Vec<Id<T>> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn delete_all(&mut self) {
        self.objects.clear();
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<Id<T>> {
        self.iter()
            .find(|(_, object)| predicate(object))
            .map(|(id, _)| id)
    }
}

impl<T: PoolObject> ObjectPool<T> {
    pub fn save_all(&self, sink: &mut SaveWriter) {
        sink.begin_section(T::KIND.tag());
        sink.write_u32(self.next_id);
        sink.write_u32(self.objects.len() as u32);
        for (raw, object) in &self.objects {
            sink.write_u32(*raw);
            object.save_record(sink);
        }
        sink.end_section();
        debug!(pool = %T::KIND, count = self.objects.len(), "pool_saved");
    }

    /// Replaces the whole pool with the records of the next section. The live
    /// pool is only swapped once every record decoded, so a failure leaves it untouched.
    pub fn restore_all(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError> {
        source.begin_section(T::KIND.tag())?;
        let saved_next_id = source.read_u32()?;
        let count = source.read_u32()?;
        let mut restored = BTreeMap::new();
        for _ in 0..count {
            let raw = source.read_u32()?;
            if raw == 0 {
                return Err(SaveError::invalid_format(format!(
                    "{} record uses reserved identity 0",
                    T::KIND
                )));
            }
            let object = T::restore_record(source)?;
            if restored.insert(raw, object).is_some() {
                return Err(SaveError::invalid_format(format!(
                    "duplicate {} identity {raw}",
                    T::KIND
                )));
            }
        }
        source.end_section()?;

        let highest = restored.keys().next_back().copied().unwrap_or(0);
        self.objects = restored;
        self.next_id = saved_next_id.max(highest.saturating_add(1)).max(1);
        debug!(pool = %T::KIND, count = self.objects.len(), "pool_restored");
        Ok(())
    }

    /// Checks an identity held outside any pool, such as the current set.
    pub(crate) fn resolve_field(
        &self,
        field: &'static str,
        id: Option<Id<T>>,
    ) -> Result<(), SaveError> {
        match id {
            Some(id) if !self.contains(id) => Err(SaveError::DanglingEngineReference {
                field,
                kind: T::KIND,
                id: id.raw(),
            }),
            _ => Ok(()),
        }
    }

    /// Fails when a restored `owner` record names an identity this pool does not hold.
    pub(crate) fn resolve(&self, owner: PoolKind, id: Option<Id<T>>) -> Result<(), SaveError> {
        match id {
            Some(id) if !self.contains(id) => Err(SaveError::DanglingReference {
                owner,
                kind: T::KIND,
                id: id.raw(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn resolve_all(&self, world: &World) -> Result<(), SaveError> {
        for object in self.objects.values() {
            object.resolve_references(world)?;
        }
        Ok(())
    }
}
