use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

struct ServiceEntry {
    service_id: Option<String>,
    service: Box<dyn Any + Send + Sync>,
}

/// Services keyed by their `Arc<S>` type and an optional service id.
///
/// `S` is usually a trait object such as `dyn ChatCompletionService`, so the
/// same concrete connector can be registered under every trait it implements.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, Vec<ServiceEntry>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service`; an entry with the same id and type is replaced.
    pub fn register<S>(&mut self, service: Arc<S>, service_id: Option<&str>)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let entries = self.services.entry(TypeId::of::<Arc<S>>()).or_default();
        let service_id = service_id.map(str::to_string);

        if let Some(pos) = entries
            .iter()
            .position(|e| service_id.is_some() && e.service_id == service_id)
        {
            warn!(
                "Replacing {} registered as '{}'",
                std::any::type_name::<S>(),
                service_id.as_deref().unwrap_or_default()
            );
            entries.remove(pos);
        }

        debug!(
            "Registered {} with id {:?}",
            std::any::type_name::<S>(),
            service_id
        );
        entries.push(ServiceEntry {
            service_id,
            service: Box::new(service),
        });
    }

    /// With an id, the service registered under it. Without one, the most
    /// recently registered service of that type.
    pub fn get<S>(&self, service_id: Option<&str>) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let entries = self.services.get(&TypeId::of::<Arc<S>>())?;
        let entry = match service_id {
            Some(id) => entries.iter().rev().find(|e| e.service_id.as_deref() == Some(id)),
            None => entries.last(),
        }?;
        entry.service.downcast_ref::<Arc<S>>().cloned()
    }

    pub fn get_all<S>(&self) -> Vec<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<Arc<S>>())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.service.downcast_ref::<Arc<S>>().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn ids<S>(&self) -> Vec<String>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<Arc<S>>())
            .map(|entries| entries.iter().filter_map(|e| e.service_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.services.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Fixed(&'static str);

    impl Greeter for Fixed {
        fn greet(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_lookup_by_id_and_default() {
        let mut registry = ServiceRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(Fixed("a")), Some("first"));
        registry.register::<dyn Greeter>(Arc::new(Fixed("b")), Some("second"));

        assert_eq!(registry.get::<dyn Greeter>(Some("first")).unwrap().greet(), "a");
        assert_eq!(registry.get::<dyn Greeter>(None).unwrap().greet(), "b");
        assert!(registry.get::<dyn Greeter>(Some("third")).is_none());
        assert_eq!(registry.ids::<dyn Greeter>(), vec!["first", "second"]);
    }

    #[test]
    fn test_same_id_replaces() {
        let mut registry = ServiceRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(Fixed("old")), Some("g"));
        registry.register::<dyn Greeter>(Arc::new(Fixed("new")), Some("g"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get::<dyn Greeter>(Some("g")).unwrap().greet(), "new");
    }

    #[test]
    fn test_types_are_separate() {
        let mut registry = ServiceRegistry::new();
        registry.register::<dyn Greeter>(Arc::new(Fixed("x")), None);
        registry.register::<Fixed>(Arc::new(Fixed("y")), None);

        assert_eq!(registry.get_all::<dyn Greeter>().len(), 1);
        assert_eq!(registry.get::<Fixed>(None).unwrap().greet(), "y");
        assert!(registry.get::<String>(None).is_none());
        assert!(registry.ids::<Fixed>().is_empty());
    }
}
