//! Lazily constructed, shared components.
//!
//! Every component is named by a [`Dependency`]. The first request for a name
//! builds it, resolving its own dependencies through the same registry, and
//! every later request returns the cached instance. Callers can inject
//! prebuilt components (for example a fake embedding provider) as overrides.
//!
//! Each registry owns its cache; two registries never share instances.

use crate::config::Settings;
use crate::embedding::EmbeddingProvider;
use crate::error::{NotFoundError, RegistryError, RegistryResult};
use crate::graph::{Subgraph, SymbolGraph};
use crate::rank::SymbolRank;
use crate::search::SymbolSearch;
use crate::similarity::{EmbeddingStore, SymbolSimilarity};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const DEPENDENCY_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dependency {
    SymbolGraph,
    Subgraph,
    SymbolRank,
    EmbeddingProvider,
    EmbeddingStore,
    SymbolSimilarity,
    SymbolSearch,
}

impl Dependency {
    pub const ALL: [Dependency; DEPENDENCY_COUNT] = [
        Dependency::SymbolGraph,
        Dependency::Subgraph,
        Dependency::SymbolRank,
        Dependency::EmbeddingProvider,
        Dependency::EmbeddingStore,
        Dependency::SymbolSimilarity,
        Dependency::SymbolSearch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dependency::SymbolGraph => "symbol_graph",
            Dependency::Subgraph => "subgraph",
            Dependency::SymbolRank => "symbol_rank",
            Dependency::EmbeddingProvider => "embedding_provider",
            Dependency::EmbeddingStore => "embedding_store",
            Dependency::SymbolSimilarity => "symbol_similarity",
            Dependency::SymbolSearch => "symbol_search",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Dependency {
    type Err = NotFoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|dep| dep.name() == name)
            .ok_or_else(|| NotFoundError::Dependency {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A constructed component.
#[derive(Clone)]
pub enum Component {
    SymbolGraph(Arc<SymbolGraph>),
    Subgraph(Arc<Subgraph>),
    SymbolRank(Arc<SymbolRank>),
    EmbeddingProvider(Arc<dyn EmbeddingProvider>),
    EmbeddingStore(Arc<EmbeddingStore>),
    SymbolSimilarity(Arc<SymbolSimilarity>),
    SymbolSearch(Arc<SymbolSearch>),
}

impl Component {
    pub fn dependency(&self) -> Dependency {
        match self {
            Component::SymbolGraph(_) => Dependency::SymbolGraph,
            Component::Subgraph(_) => Dependency::Subgraph,
            Component::SymbolRank(_) => Dependency::SymbolRank,
            Component::EmbeddingProvider(_) => Dependency::EmbeddingProvider,
            Component::EmbeddingStore(_) => Dependency::EmbeddingStore,
            Component::SymbolSimilarity(_) => Dependency::SymbolSimilarity,
            Component::SymbolSearch(_) => Dependency::SymbolSearch,
        }
    }

    /// Whether both hold the very same instance.
    pub fn ptr_eq(&self, other: &Component) -> bool {
        match (self, other) {
            (Component::SymbolGraph(a), Component::SymbolGraph(b)) => Arc::ptr_eq(a, b),
            (Component::Subgraph(a), Component::Subgraph(b)) => Arc::ptr_eq(a, b),
            (Component::SymbolRank(a), Component::SymbolRank(b)) => Arc::ptr_eq(a, b),
            (Component::EmbeddingProvider(a), Component::EmbeddingProvider(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Component::EmbeddingStore(a), Component::EmbeddingStore(b)) => Arc::ptr_eq(a, b),
            (Component::SymbolSimilarity(a), Component::SymbolSimilarity(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Component::SymbolSearch(a), Component::SymbolSearch(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.dependency()).finish()
    }
}

pub struct DependencyRegistryBuilder {
    settings: Settings,
    overrides: HashMap<Dependency, Component>,
}

impl DependencyRegistryBuilder {
    /// Use `component` instead of constructing its dependency. A later
    /// override for the same dependency replaces an earlier one.
    #[must_use]
    pub fn with_override(mut self, component: Component) -> Self {
        self.overrides.insert(component.dependency(), component);
        self
    }

    pub fn build(self) -> DependencyRegistry {
        DependencyRegistry {
            settings: self.settings,
            overrides: self.overrides,
            cache: RwLock::new(HashMap::new()),
            build_locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }
}

pub struct DependencyRegistry {
    settings: Settings,
    overrides: HashMap<Dependency, Component>,
    cache: RwLock<HashMap<Dependency, Component>>,
    /// One lock per dependency, indexed by `Dependency::index`
    build_locks: [Mutex<()>; DEPENDENCY_COUNT],
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut built: Vec<Dependency> = self.cache.read().keys().copied().collect();
        built.sort();
        f.debug_struct("DependencyRegistry")
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .field("built", &built)
            .finish()
    }
}

impl DependencyRegistry {
    pub fn builder(settings: Settings) -> DependencyRegistryBuilder {
        DependencyRegistryBuilder {
            settings,
            overrides: HashMap::new(),
        }
    }

    pub fn new(settings: Settings) -> Self {
        Self::builder(settings).build()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve a dependency by name.
    pub fn get(&self, name: &str) -> RegistryResult<Component> {
        self.resolve(name.parse()?)
    }

    /// Resolve a dependency, constructing it on first request.
    ///
    /// Concurrent first requests for one name construct it exactly once.
    pub fn resolve(&self, dependency: Dependency) -> RegistryResult<Component> {
        if let Some(component) = self.cache.read().get(&dependency) {
            return Ok(component.clone());
        }

        let _guard = self.build_locks[dependency.index()].lock();

        // Another thread may have finished while we waited
        if let Some(component) = self.cache.read().get(&dependency) {
            return Ok(component.clone());
        }

        let component = match self.overrides.get(&dependency) {
            Some(component) => {
                tracing::debug!("Using override for dependency {dependency}");
                component.clone()
            }
            None => {
                tracing::info!("Creating dependency {dependency}");
                self.construct(dependency)?
            }
        };

        self.cache.write().insert(dependency, component.clone());
        Ok(component)
    }

    /// Resolve several dependencies by name, each at most once, in the order
    /// first requested.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> RegistryResult<Vec<(Dependency, Component)>> {
        let mut resolved: Vec<(Dependency, Component)> = Vec::new();
        for name in names {
            let dependency: Dependency = name.as_ref().parse()?;
            if resolved.iter().any(|(d, _)| *d == dependency) {
                continue;
            }
            tracing::info!("Building {dependency}...");
            resolved.push((dependency, self.resolve(dependency)?));
        }
        Ok(resolved)
    }

    pub fn is_built(&self, dependency: Dependency) -> bool {
        self.cache.read().contains_key(&dependency)
    }

    fn construct(&self, dependency: Dependency) -> RegistryResult<Component> {
        let settings = &self.settings;
        let component = match dependency {
            Dependency::SymbolGraph => {
                let path = settings.resolve_path(&settings.index.artifact_path);
                Component::SymbolGraph(Arc::new(SymbolGraph::from_artifact(&path)?))
            }
            Dependency::Subgraph => {
                let graph = self.symbol_graph()?;
                let rules = settings.subgraph.exclusion_rules();
                Component::Subgraph(Arc::new(Subgraph::extract(
                    &graph,
                    settings.subgraph.flow_policy,
                    &rules,
                )))
            }
            Dependency::SymbolRank => {
                let subgraph = self.subgraph()?;
                Component::SymbolRank(Arc::new(SymbolRank::new(subgraph, settings.rank)?))
            }
            Dependency::EmbeddingProvider => {
                Component::EmbeddingProvider(self.default_provider()?)
            }
            Dependency::EmbeddingStore => {
                let path = settings.resolve_path(&settings.embedding.store_path);
                Component::EmbeddingStore(Arc::new(EmbeddingStore::open(path)?))
            }
            Dependency::SymbolSimilarity => Component::SymbolSimilarity(Arc::new(
                SymbolSimilarity::new(
                    self.symbol_graph()?,
                    self.embedding_provider()?,
                    self.embedding_store()?,
                ),
            )),
            Dependency::SymbolSearch => {
                let search = SymbolSearch::new(self.symbol_rank()?, self.symbol_similarity()?)
                    .with_combiner(Arc::new(settings.search.combination));
                Component::SymbolSearch(Arc::new(search))
            }
        };
        Ok(component)
    }

    #[cfg(feature = "fastembed")]
    fn default_provider(&self) -> RegistryResult<Arc<dyn EmbeddingProvider>> {
        use crate::embedding::{FastEmbedProvider, RetryingProvider};

        let config = &self.settings.embedding;
        let provider =
            FastEmbedProvider::new(&config.model, self.settings.resolve_path(&config.cache_dir))?;
        Ok(Arc::new(RetryingProvider::new(
            provider,
            config.retry_policy(),
        )))
    }

    #[cfg(not(feature = "fastembed"))]
    fn default_provider(&self) -> RegistryResult<Arc<dyn EmbeddingProvider>> {
        Err(RegistryError::ProviderUnavailable)
    }

    pub fn symbol_graph(&self) -> RegistryResult<Arc<SymbolGraph>> {
        match self.resolve(Dependency::SymbolGraph)? {
            Component::SymbolGraph(graph) => Ok(graph),
            other => Err(mismatch(&other)),
        }
    }

    pub fn subgraph(&self) -> RegistryResult<Arc<Subgraph>> {
        match self.resolve(Dependency::Subgraph)? {
            Component::Subgraph(subgraph) => Ok(subgraph),
            other => Err(mismatch(&other)),
        }
    }

    pub fn symbol_rank(&self) -> RegistryResult<Arc<SymbolRank>> {
        match self.resolve(Dependency::SymbolRank)? {
            Component::SymbolRank(rank) => Ok(rank),
            other => Err(mismatch(&other)),
        }
    }

    pub fn embedding_provider(&self) -> RegistryResult<Arc<dyn EmbeddingProvider>> {
        match self.resolve(Dependency::EmbeddingProvider)? {
            Component::EmbeddingProvider(provider) => Ok(provider),
            other => Err(mismatch(&other)),
        }
    }

    pub fn embedding_store(&self) -> RegistryResult<Arc<EmbeddingStore>> {
        match self.resolve(Dependency::EmbeddingStore)? {
            Component::EmbeddingStore(store) => Ok(store),
            other => Err(mismatch(&other)),
        }
    }

    pub fn symbol_similarity(&self) -> RegistryResult<Arc<SymbolSimilarity>> {
        match self.resolve(Dependency::SymbolSimilarity)? {
            Component::SymbolSimilarity(similarity) => Ok(similarity),
            other => Err(mismatch(&other)),
        }
    }

    pub fn symbol_search(&self) -> RegistryResult<Arc<SymbolSearch>> {
        match self.resolve(Dependency::SymbolSearch)? {
            Component::SymbolSearch(search) => Ok(search),
            other => Err(mismatch(&other)),
        }
    }
}

fn mismatch(component: &Component) -> RegistryError {
    RegistryError::TypeMismatch {
        name: component.dependency().name().to_string(),
    }
}
