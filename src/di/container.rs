use crate::error::{Result, SiteError};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Casts an `Arc<dyn Any>` holding the implementation into an `Arc<dyn Any>`
/// holding the `Arc<dyn Trait>`. `None` when the implementation type is wrong.
type CasterFn =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> Option<Arc<dyn Any + Send + Sync>> + Send + Sync>;

/// Thread-safe dependency injection container.
///
/// Registering a type or binding a trait twice replaces the earlier entry,
/// which is how a site swaps a default platform service for its own.
pub struct Container {
    services: DashMap<TypeId, ServiceEntry>,
    trait_mappings: DashMap<TypeId, TypeId>,
    casters: DashMap<TypeId, CasterFn>,
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            trait_mappings: self.trait_mappings.clone(),
            casters: self.casters.clone(),
        }
    }
}

#[derive(Clone)]
struct ServiceEntry {
    instance: Arc<dyn Any + Send + Sync>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            trait_mappings: DashMap::new(),
            casters: DashMap::new(),
        }
    }

    pub fn register<T: 'static + Send + Sync>(&mut self, instance: T) -> &mut Self {
        self.register_arc(Arc::new(instance))
    }

    pub fn register_arc<T: 'static + Send + Sync>(&mut self, instance: Arc<T>) -> &mut Self {
        let type_id = TypeId::of::<T>();
        let entry = ServiceEntry { instance };
        self.services.insert(type_id, entry);
        self
    }

    pub fn register_trait<Trait, Impl, F>(&mut self, caster_fn: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        let trait_id = TypeId::of::<Trait>();
        let impl_id = TypeId::of::<Impl>();

        self.trait_mappings.insert(trait_id, impl_id);

        let caster: CasterFn = Arc::new(move |instance: Arc<dyn Any + Send + Sync>| {
            let concrete = instance.downcast::<Impl>().ok()?;
            let trait_obj: Arc<Trait> = caster_fn(concrete);
            Some(Arc::new(trait_obj) as Arc<dyn Any + Send + Sync>)
        });

        self.casters.insert(trait_id, caster);
        self
    }

    /// Register an implementation and bind a trait to it in one step
    pub fn register_as<Trait, Impl, F>(&mut self, instance: Impl, caster_fn: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        self.register(instance);
        self.register_trait::<Trait, Impl, F>(caster_fn)
    }

    pub fn resolve<T: 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        let requested_type_id = TypeId::of::<T>();
        let entry = self.services.get(&requested_type_id).ok_or_else(|| {
            SiteError::DependencyNotFound {
                type_name: std::any::type_name::<T>().to_string(),
            }
        })?;
        entry
            .instance
            .clone()
            .downcast::<T>()
            .map_err(|_| SiteError::DowncastFailed {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn resolve_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        let requested_type_id = TypeId::of::<T>();

        let caster = self.casters.get(&requested_type_id).ok_or_else(|| {
            SiteError::DependencyNotFound {
                type_name: std::any::type_name::<T>().to_string(),
            }
        })?;

        let impl_type_id = self.trait_mappings.get(&requested_type_id).ok_or_else(|| {
            SiteError::DependencyNotFound {
                type_name: format!(
                    "No implementation mapping found for trait '{}'",
                    std::any::type_name::<T>()
                ),
            }
        })?;

        let entry =
            self.services
                .get(&*impl_type_id)
                .ok_or_else(|| SiteError::DependencyNotFound {
                    type_name: format!(
                        "Implementation for trait '{}' not registered",
                        std::any::type_name::<T>()
                    ),
                })?;

        let downcast_failed = || SiteError::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        };

        // The caster hands back an Arc<dyn Any> wrapping the Arc<T>.
        let wrapper = (caster.value())(entry.instance.clone())
            .ok_or_else(downcast_failed)?
            .downcast::<Arc<T>>()
            .map_err(|_| downcast_failed())?;
        Ok(wrapper.as_ref().clone())
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.services.contains_key(&type_id) || self.trait_mappings.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}
