//! A bounded pool of identity-bearing workers.
//!
//! The pool hands its entities out through a bounded `kanal` channel sized to the pool
//! capacity: `take` waits on the channel until an entity is available, `release` puts
//! it back. A separate ownership map, guarded by a single mutex, records which ids are
//! currently in the pool so that an entity is never handed back twice.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use kanal::{AsyncReceiver, AsyncSender, bounded_async};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::error::PoolError;

/// Runtime type information for trait-object entities.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Anything that can live in an [`EntityPool`].
pub trait Entity: AsAny + Send + Sync + 'static {
    /// Unique id of this entity within its pool.
    fn id(&self) -> u32;
}

/// The concrete type every member of a pool must have.
#[derive(Debug, Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// The type tag of `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The concrete type behind `entity`, looked through any trait object.
    pub fn of_entity<E: Entity + ?Sized>(entity: &E) -> Self {
        Self {
            id: Any::type_id(AsAny::as_any(entity)),
            name: AsAny::type_name(entity),
        }
    }

    /// Type name of the tagged entity, for log messages.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

/// Bounded pool of entities with blocking take and checked release.
pub struct EntityPool<E: Entity + ?Sized> {
    total: u32,
    entity_type: EntityType,
    available_tx: AsyncSender<Arc<E>>,
    available_rx: AsyncReceiver<Arc<E>>,
    // id -> true while the entity sits in the pool.
    owned: Mutex<HashMap<u32, bool>>,
}

impl<E: Entity + ?Sized> EntityPool<E> {
    /// Fills a pool of `total` entities by calling `factory` exactly `total` times.
    ///
    /// Every generated entity must be of `entity_type`, and ids must be distinct.
    pub fn new<F>(total: u32, entity_type: EntityType, mut factory: F) -> Result<Self, PoolError>
    where
        F: FnMut() -> Arc<E>,
    {
        if total == 0 {
            return Err(PoolError::ZeroCapacity(total));
        }
        let (available_tx, available_rx) = bounded_async(total as usize);
        let mut owned = HashMap::with_capacity(total as usize);
        for _ in 0..total {
            let entity = factory();
            if EntityType::of_entity(&*entity) != entity_type {
                return Err(PoolError::FactoryType {
                    expected: entity_type.name(),
                });
            }
            let id = entity.id();
            if owned.insert(id, true).is_some() {
                return Err(PoolError::DuplicateId(id));
            }
            if !matches!(available_tx.try_send(entity), Ok(true)) {
                return Err(PoolError::Closed);
            }
        }
        debug!(
            "Entity pool of {} initialized with {} entities",
            entity_type.name(),
            total
        );
        Ok(Self {
            total,
            entity_type,
            available_tx,
            available_rx,
            owned: Mutex::new(owned),
        })
    }

    /// Like [`new`](Self::new), taking the expected type from the first generated entity.
    pub fn with_factory<F>(total: u32, mut factory: F) -> Result<Self, PoolError>
    where
        F: FnMut() -> Arc<E>,
    {
        if total == 0 {
            return Err(PoolError::ZeroCapacity(total));
        }
        let first = factory();
        let entity_type = EntityType::of_entity(&*first);
        let mut first = Some(first);
        Self::new(total, entity_type, move || match first.take() {
            Some(entity) => entity,
            None => factory(),
        })
    }

    /// Waits until an entity is available. Fails once the pool is closed.
    pub async fn take(&self) -> Result<Arc<E>, PoolError> {
        let entity = self
            .available_rx
            .recv()
            .await
            .map_err(|_| PoolError::Closed)?;
        self.owned.lock().insert(entity.id(), false);
        trace!("Entity {} taken from pool", entity.id());
        Ok(entity)
    }

    /// Hands a taken entity back to the pool.
    pub fn release(&self, entity: Arc<E>) -> Result<(), PoolError> {
        if EntityType::of_entity(&*entity) != self.entity_type {
            return Err(PoolError::ForeignType {
                expected: self.entity_type.name(),
            });
        }
        let id = entity.id();
        {
            let mut owned = self.owned.lock();
            match owned.get_mut(&id) {
                None => return Err(PoolError::UnknownEntity(id)),
                Some(true) => return Err(PoolError::AlreadyReturned(id)),
                Some(in_pool) => *in_pool = true,
            }
        }
        match self.available_tx.try_send(entity) {
            Ok(true) => {
                trace!("Entity {} returned to pool", id);
                Ok(())
            }
            _ => Err(PoolError::Closed),
        }
    }

    /// Capacity of the pool.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of entities currently taken.
    pub fn used(&self) -> u32 {
        self.total
            .saturating_sub(self.available_rx.len().min(self.total as usize) as u32)
    }

    /// Concrete type of the entities this pool was filled with.
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Closes the pool for good; pending and future `take` calls fail.
    pub fn close(&self) {
        let _ = self.available_tx.close();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.available_tx.is_closed()
    }
}
