//! Service registration and resolution.
//!
//! This module provides [`ServiceRegistry`], which maps interface types to
//! proxied implementations, and [`Scope`], which owns scoped instances.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use telemetry_proxy::telemetry_proxy_core::{Interface, Proxy, ProxyCreationError, ProxyResult};
use telemetry_proxy::{Activate, ProxyFactory};

use crate::error::{RegistryError, RegistryResult};

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance per registry.
    Singleton,
    /// One instance per [`Scope`].
    Scoped,
    /// A new instance on every resolution.
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "singleton"),
            Lifetime::Scoped => write!(f, "scoped"),
            Lifetime::Transient => write!(f, "transient"),
        }
    }
}

type Instance = Box<dyn Any + Send + Sync>;
type Builder = Arc<dyn Fn(&ProxyFactory) -> ProxyResult<Instance> + Send + Sync>;

struct Registration {
    interface: &'static str,
    lifetime: Lifetime,
    build: Builder,
}

/// Maps interfaces to proxied implementations.
///
/// Every instance is built through the registry's [`ProxyFactory`], so all
/// resolved services emit telemetry.
///
/// # Example
///
/// ```ignore
/// use telemetry_proxy_registry::ServiceRegistry;
///
/// let registry = ServiceRegistry::new(ProxyFactory::trace());
/// registry.register_singleton::<dyn Weather, WeatherService>();
///
/// let weather = registry.resolve::<dyn Weather>()?;
/// ```
pub struct ServiceRegistry {
    factory: ProxyFactory,
    registrations: DashMap<TypeId, Registration>,
    singletons: DashMap<TypeId, Instance>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new(factory: ProxyFactory) -> Self {
        Self {
            factory,
            registrations: DashMap::new(),
            singletons: DashMap::new(),
        }
    }

    /// The factory used to build instances.
    pub fn factory(&self) -> &ProxyFactory {
        &self.factory
    }

    /// Register `T` as `I`, one instance per registry.
    pub fn register_singleton<I, T>(&self) -> &Self
    where
        I: ?Sized + Interface<T> + Interface<Proxy<I>> + Send + Sync + 'static,
        T: Activate + 'static,
    {
        self.register_with::<I>(Lifetime::Singleton, |factory| factory.create::<I, T>())
    }

    /// Register `T` as `I`, one instance per scope.
    pub fn register_scoped<I, T>(&self) -> &Self
    where
        I: ?Sized + Interface<T> + Interface<Proxy<I>> + Send + Sync + 'static,
        T: Activate + 'static,
    {
        self.register_with::<I>(Lifetime::Scoped, |factory| factory.create::<I, T>())
    }

    /// Register `T` as `I`, a new instance per resolution.
    pub fn register_transient<I, T>(&self) -> &Self
    where
        I: ?Sized + Interface<T> + Interface<Proxy<I>> + Send + Sync + 'static,
        T: Activate + 'static,
    {
        self.register_with::<I>(Lifetime::Transient, |factory| factory.create::<I, T>())
    }

    /// Register a custom builder for `I`.
    ///
    /// Replaces any earlier registration and drops a cached singleton.
    pub fn register_with<I>(
        &self,
        lifetime: Lifetime,
        build: impl Fn(&ProxyFactory) -> ProxyResult<Arc<I>> + Send + Sync + 'static,
    ) -> &Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let id = TypeId::of::<I>();
        let interface = std::any::type_name::<I>();
        let build: Builder = Arc::new(move |factory: &ProxyFactory| {
            build(factory).map(|instance| Box::new(instance) as Instance)
        });

        self.registrations.insert(
            id,
            Registration {
                interface,
                lifetime,
                build,
            },
        );
        self.singletons.remove(&id);

        info!(interface, lifetime = %lifetime, "Service registered");
        self
    }

    /// Check if `I` has a registration.
    pub fn is_registered<I: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<I>())
    }

    /// The registered lifetime of `I`.
    pub fn lifetime_of<I: ?Sized + 'static>(&self) -> Option<Lifetime> {
        self.registrations
            .get(&TypeId::of::<I>())
            .map(|registration| registration.lifetime)
    }

    /// Get the number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Open a scope for scoped services.
    pub fn scope(&self) -> Scope<'_> {
        Scope {
            registry: self,
            instances: DashMap::new(),
        }
    }

    /// Resolve `I` outside any scope.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ScopeRequired`] for scoped services.
    pub fn resolve<I>(&self) -> RegistryResult<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let (interface, lifetime, build) = self.lookup::<I>()?;
        match lifetime {
            Lifetime::Singleton => self.singleton::<I>(interface, &build),
            Lifetime::Scoped => Err(RegistryError::ScopeRequired(interface)),
            Lifetime::Transient => self.build::<I>(interface, &build),
        }
    }

    fn lookup<I: ?Sized + 'static>(&self) -> RegistryResult<(&'static str, Lifetime, Builder)> {
        self.registrations
            .get(&TypeId::of::<I>())
            .map(|registration| {
                (
                    registration.interface,
                    registration.lifetime,
                    Arc::clone(&registration.build),
                )
            })
            .ok_or(RegistryError::NotRegistered(std::any::type_name::<I>()))
    }

    fn singleton<I>(&self, interface: &'static str, build: &Builder) -> RegistryResult<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        cached::<I>(&self.singletons, interface, || self.create(interface, build))
    }

    fn build<I>(&self, interface: &'static str, build: &Builder) -> RegistryResult<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let instance = self.create(interface, build)?;
        downcast::<I>(interface, &instance)
    }

    fn create(&self, interface: &'static str, build: &Builder) -> RegistryResult<Instance> {
        debug!(interface, "Creating service instance");
        build(&self.factory).map_err(|source| RegistryError::Creation { interface, source })
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(ProxyFactory::default())
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("registrations", &self.len())
            .field("singletons", &self.singletons.len())
            .finish()
    }
}

/// A resolution scope. Scoped services are created once per scope and
/// dropped with it.
pub struct Scope<'r> {
    registry: &'r ServiceRegistry,
    instances: DashMap<TypeId, Instance>,
}

impl Scope<'_> {
    /// Resolve `I` within this scope.
    pub fn resolve<I>(&self) -> RegistryResult<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let (interface, lifetime, build) = self.registry.lookup::<I>()?;
        match lifetime {
            Lifetime::Singleton => self.registry.singleton::<I>(interface, &build),
            Lifetime::Transient => self.registry.build::<I>(interface, &build),
            Lifetime::Scoped => cached::<I>(&self.instances, interface, || {
                self.registry.create(interface, &build)
            }),
        }
    }

    /// Get the number of scoped instances created so far.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Check if no scoped instance was created yet.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("instances", &self.instances.len())
            .finish()
    }
}

/// Look `I` up in `cache`, creating and inserting it on a miss.
///
/// `create` runs without any shard lock held, so builders may resolve other
/// services from the same registry. If two callers race, the first insert
/// wins and both get that instance.
fn cached<I>(
    cache: &DashMap<TypeId, Instance>,
    interface: &'static str,
    create: impl FnOnce() -> RegistryResult<Instance>,
) -> RegistryResult<Arc<I>>
where
    I: ?Sized + Send + Sync + 'static,
{
    let id = TypeId::of::<I>();
    if let Some(existing) = cache.get(&id) {
        return downcast::<I>(interface, existing.value());
    }

    let instance = create()?;
    let entry = cache.entry(id).or_insert(instance);
    downcast::<I>(interface, entry.value())
}

fn downcast<I>(interface: &'static str, instance: &Instance) -> RegistryResult<Arc<I>>
where
    I: ?Sized + Send + Sync + 'static,
{
    (**instance)
        .downcast_ref::<Arc<I>>()
        .cloned()
        .ok_or(RegistryError::Creation {
            interface,
            source: ProxyCreationError::Binding {
                interface,
                implementation: "<unknown>",
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use telemetry_proxy::telemetry_proxy_observe::{CollectingExporter, SpanExporter, TraceSource};
    use telemetry_proxy::{EngineKind, intercept};

    pub trait Greeter: Send + Sync {
        fn greet(&self, name: &str) -> String;
    }

    intercept! {
        impl Greeter {
            fn greet(&self, name: &str) -> String;
        }
    }

    static CREATED: AtomicUsize = AtomicUsize::new(0);

    struct Polite;

    impl Default for Polite {
        fn default() -> Self {
            CREATED.fetch_add(1, Ordering::SeqCst);
            Polite
        }
    }

    impl Greeter for Polite {
        fn greet(&self, name: &str) -> String {
            format!("Hello, {name}")
        }
    }

    fn registry() -> (ServiceRegistry, Arc<CollectingExporter>) {
        let source = Arc::new(TraceSource::new("registry-tests"));
        let spans = Arc::new(CollectingExporter::new(100));
        source.add_exporter(Arc::clone(&spans) as Arc<dyn SpanExporter>);
        let factory = ProxyFactory::builder(EngineKind::Trace)
            .with_trace_source(source)
            .build();
        (ServiceRegistry::new(factory), spans)
    }

    #[test]
    fn test_not_registered() {
        let (registry, _) = registry();
        let result = registry.resolve::<dyn Greeter>();
        assert!(matches!(result, Err(RegistryError::NotRegistered(_))));
    }

    #[test]
    fn test_singleton_is_shared() {
        let (registry, spans) = registry();
        registry.register_singleton::<dyn Greeter, Polite>();

        let first = registry.resolve::<dyn Greeter>().unwrap();
        let second = registry.scope().resolve::<dyn Greeter>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.greet("Ada"), "Hello, Ada");
        assert_eq!(spans.spans()[0].tag("name"), Some("Ada"));
    }

    #[test]
    fn test_transient_is_fresh() {
        let (registry, _) = registry();
        registry.register_transient::<dyn Greeter, Polite>();

        let first = registry.resolve::<dyn Greeter>().unwrap();
        let second = registry.resolve::<dyn Greeter>().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.lifetime_of::<dyn Greeter>(), Some(Lifetime::Transient));
    }

    #[test]
    fn test_scoped_requires_scope() {
        let (registry, _) = registry();
        registry.register_scoped::<dyn Greeter, Polite>();

        let result = registry.resolve::<dyn Greeter>();
        assert!(matches!(result, Err(RegistryError::ScopeRequired(_))));
    }

    #[test]
    fn test_scoped_once_per_scope() {
        let (registry, _) = registry();
        registry.register_scoped::<dyn Greeter, Polite>();

        let scope = registry.scope();
        let first = scope.resolve::<dyn Greeter>().unwrap();
        let second = scope.resolve::<dyn Greeter>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(scope.len(), 1);

        let other = registry.scope().resolve::<dyn Greeter>().unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_creation_failure() {
        let (registry, _) = registry();
        registry.register_with::<dyn Greeter>(Lifetime::Transient, |_| {
            Err(ProxyCreationError::construction::<Polite>("database offline"))
        });

        let error = registry.resolve::<dyn Greeter>().err().unwrap();
        assert!(matches!(error, RegistryError::Creation { .. }));
        assert!(error.to_string().contains("database offline"));
    }

    #[test]
    fn test_reregistration_replaces_singleton() {
        let (registry, _) = registry();
        registry.register_singleton::<dyn Greeter, Polite>();
        let before = CREATED.load(Ordering::SeqCst);
        let first = registry.resolve::<dyn Greeter>().unwrap();

        registry.register_singleton::<dyn Greeter, Polite>();
        let second = registry.resolve::<dyn Greeter>().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(CREATED.load(Ordering::SeqCst) >= before + 2);
        assert_eq!(registry.len(), 1);
    }

    struct Leaf<const N: usize>;

    struct Root {
        leaves: usize,
    }

    macro_rules! register_leaves {
        ($registry:expr, $($n:literal),*) => {
            $(
                $registry.register_with::<Leaf<$n>>(Lifetime::Singleton, |_: &ProxyFactory| {
                    Ok(Arc::new(Leaf::<$n>))
                });
            )*
        };
    }

    macro_rules! count_leaves {
        ($registry:expr, $($n:literal),*) => {
            0usize $(+ usize::from($registry.resolve::<Leaf<$n>>().is_ok()))*
        };
    }

    #[test]
    fn test_builder_resolves_other_singletons() {
        let (registry, _) = registry();
        let registry = Arc::new(registry);
        register_leaves!(
            registry, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
            21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31
        );

        let nested = Arc::clone(&registry);
        registry.register_with::<Root>(Lifetime::Singleton, move |_: &ProxyFactory| {
            let leaves = count_leaves!(
                nested, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19,
                20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31
            );
            Ok(Arc::new(Root { leaves }))
        });

        let (sender, receiver) = mpsc::channel();
        let resolver = Arc::clone(&registry);
        thread::spawn(move || {
            let leaves = resolver.resolve::<Root>().map(|root| root.leaves);
            let _ = sender.send(leaves.ok());
        });

        let leaves = receiver
            .recv_timeout(Duration::from_secs(10))
            .expect("nested resolution did not finish");
        assert_eq!(leaves, Some(32));

        let first = registry.resolve::<Root>().unwrap();
        let second = registry.resolve::<Root>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.is_registered::<Leaf<31>>());
    }
}
