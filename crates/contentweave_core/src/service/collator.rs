//! Content collation engine.
//!
//! # Responsibility
//! - Assemble content items from their primary container plus the
//!   containers their redirect rules point at (`collate`).
//! - Decompose edited content back into the primary and referenced
//!   containers, applying writebacks after persist (`decollate`, `set`).
//! - Materialize new items, resolve and move addresses.
//!
//! # Invariants
//! - Every version frame pushed by this module is popped on all exit paths.
//! - `collate` finishes all storage I/O before returning its iterator.
//! - Read-only rules are applied on collate and never written.

use crate::config::{CollatorConfig, DuplicatePolicy};
use crate::model::address::{Address, VersionedAddress};
use crate::model::container::Container;
use crate::model::content::{Content, Summary};
use crate::model::item_id::ItemId;
use crate::model::property_path::{PathError, PropertyPath};
use crate::model::version::ItemVersion;
use crate::model::{ModelError, TypeName};
use crate::repo::{ContainerStore, PersistOptions, RepoError};
use crate::schema::content_type::ContentTypeRegistry;
use crate::schema::path_algebra::{PathAlgebra, PatternRedirect};
use crate::schema::RegistryError;
use crate::service::events::{
    EventHub, EventPayload, EVENT_CONTENT_MOVE, EVENT_CONTENT_NEW, EVENT_GET_CONTAINER,
};
use crate::service::version_context::{VersionContext, VersioningMode};
use log::{error, info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type CollateResult<T> = Result<T, CollateError>;

/// Errors raised by collation use-cases.
#[derive(Debug)]
pub enum CollateError {
    /// Required input is missing or cannot be resolved.
    InvalidArgument(String),
    /// Serialized identity or address is malformed.
    Format(String),
    /// More than one container matches where one is required.
    Conflict(String),
    /// The operation would overwrite existing content.
    ProhibitedAction(String),
    /// Target item does not exist.
    NotFound(String),
    /// Two loaded containers share a versioned address under the strict policy.
    DuplicateVersionedAddress(String),
    Path(PathError),
    Repo(RepoError),
    Registry(RegistryError),
}

impl Display for CollateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Format(message) => write!(f, "format error: {message}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::ProhibitedAction(message) => write!(f, "prohibited action: {message}"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::DuplicateVersionedAddress(address) => {
                write!(f, "duplicate versioned address: {address}")
            }
            Self::Path(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CollateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Path(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PathError> for CollateError {
    fn from(value: PathError) -> Self {
        Self::Path(value)
    }
}

impl From<RepoError> for CollateError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<RegistryError> for CollateError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<ModelError> for CollateError {
    fn from(value: ModelError) -> Self {
        match value {
            ModelError::InvalidArgument(message) => Self::InvalidArgument(message),
            ModelError::Format(message) => Self::Format(message),
        }
    }
}

/// Lazily spliced content items produced by `ContentCollator::collate`.
///
/// Holds every container loaded for the collation; iterating performs no
/// storage I/O.
pub struct CollatedItems {
    registry: Arc<ContentTypeRegistry>,
    paths: Arc<dyn PathAlgebra>,
    loaded: HashMap<VersionedAddress, Container>,
    pending: VecDeque<VersionedAddress>,
}

impl CollatedItems {
    /// Number of containers loaded for this collation.
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Splices the next item and also returns its primary container.
    pub fn next_with_container(&mut self) -> Option<(&Container, CollateResult<Content>)> {
        while let Some(key) = self.pending.pop_front() {
            if let Some(container) = self.loaded.get(&key) {
                let spliced = splice(
                    &self.registry,
                    self.paths.as_ref(),
                    &self.loaded,
                    &key.address,
                    container,
                );
                return Some((container, spliced));
            }
        }
        None
    }
}

impl Iterator for CollatedItems {
    type Item = CollateResult<Content>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_with_container().map(|(_, spliced)| spliced)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.pending.len()))
    }
}

fn splice(
    registry: &ContentTypeRegistry,
    paths: &dyn PathAlgebra,
    loaded: &HashMap<VersionedAddress, Container>,
    address: &Address,
    container: &Container,
) -> CollateResult<Content> {
    let owner = &container.data_type;
    let mut content = container.content(registry.carries_metadata(owner));
    let primary_path = address.path();

    for rule in registry.redirects(owner) {
        let target = rule.target_type(owner);
        let referenced = registry.address_from_path(
            target,
            &paths.redirect(&primary_path, rule.source_descriptor()),
        );
        if &referenced == address {
            continue;
        }
        let version = registry.applicable_version(target, &container.version);
        let Some(source) = loaded.get(&VersionedAddress::new(referenced, version)) else {
            continue;
        };

        let record_view = rule.has_writebacks().then(|| source.record_view());
        for pair in rule.pairs() {
            let from = match (&record_view, pair.writeback) {
                (Some(view), true) => view,
                _ => &source.content,
            };
            pair.destination.copy_from(&mut content.data, from, &pair.source)?;
        }
    }

    Ok(content)
}

/// Collation engine over a container store.
pub struct ContentCollator<S: ContainerStore> {
    store: S,
    registry: Arc<ContentTypeRegistry>,
    events: EventHub,
    paths: Arc<dyn PathAlgebra>,
    config: CollatorConfig,
}

impl<S: ContainerStore> ContentCollator<S> {
    /// Creates a collator with pattern redirects, no event handlers and the
    /// default configuration.
    pub fn new(store: S, registry: Arc<ContentTypeRegistry>) -> Self {
        Self {
            store,
            registry,
            events: EventHub::new(),
            paths: Arc::new(PatternRedirect),
            config: CollatorConfig::default(),
        }
    }

    pub fn with_events(mut self, events: EventHub) -> Self {
        self.events = events;
        self
    }

    pub fn with_path_algebra(mut self, paths: Arc<dyn PathAlgebra>) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_config(mut self, config: CollatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ContentTypeRegistry {
        &self.registry
    }

    pub fn events_mut(&mut self) -> &mut EventHub {
        &mut self.events
    }

    /// Keys start containers by versioned address and merges their versions.
    ///
    /// Returns the loaded map, the keys in input order and the least abstract
    /// common version (`None` without containers).
    pub fn process_containers(
        &self,
        start_containers: Vec<Container>,
    ) -> CollateResult<(HashMap<VersionedAddress, Container>, Vec<VersionedAddress>, Option<ItemVersion>)>
    {
        let mut loaded = HashMap::new();
        let mut order = Vec::new();
        let mut common_version: Option<ItemVersion> = None;

        for container in start_containers {
            let key = self.versioned_address_of(&container);
            common_version = Some(match common_version {
                Some(common) => common.least_abstract_common_version(&key.version),
                None => key.version.clone(),
            });
            if loaded.contains_key(&key) {
                self.on_duplicate(&key, "start")?;
                continue;
            }
            order.push(key.clone());
            loaded.insert(key, container);
        }

        Ok((loaded, order, common_version))
    }

    /// Collates content at `start_addresses` and the addresses of
    /// `start_containers`.
    ///
    /// Start containers are used as already loaded; only missing primaries
    /// and redirect targets are fetched.
    pub fn collate(
        &self,
        ctx: &mut VersionContext,
        start_containers: Vec<Container>,
        start_addresses: &[Address],
    ) -> CollateResult<CollatedItems> {
        let started_at = Instant::now();
        let has_start_containers = !start_containers.is_empty();
        let (mut loaded, start_keys, common_version) = self.process_containers(start_containers)?;

        let loaded_addresses: HashSet<Address> =
            start_keys.iter().map(|key| key.address.clone()).collect();
        let mut primaries: Vec<Address> = Vec::new();
        for address in start_addresses
            .iter()
            .map(|address| self.normalize(address))
            .chain(start_keys.iter().map(|key| key.address.clone()))
        {
            if !primaries.contains(&address) {
                primaries.push(address);
            }
        }

        let mut fetch: Vec<Address> = Vec::new();
        for address in &primaries {
            if !loaded_addresses.contains(address) && !fetch.contains(address) {
                fetch.push(address.clone());
            }
        }
        for address in &primaries {
            for referenced in self.redirect_addresses(address) {
                if !fetch.contains(&referenced) {
                    fetch.push(referenced);
                }
            }
        }

        let fetched = if fetch.is_empty() {
            Vec::new()
        } else if has_start_containers {
            let scope = ctx.scoped(VersioningMode::Widen, common_version.unwrap_or_default());
            self.fetch_logged(&fetch, &scope.current_version())?
        } else {
            self.fetch_logged(&fetch, &ctx.current_version())?
        };

        let mut order = start_keys;
        for container in fetched {
            let key = self.versioned_address_of(&container);
            match loaded.get(&key) {
                Some(existing) if existing.row_id.is_some() && existing.row_id == container.row_id => {}
                Some(_) => self.on_duplicate(&key, "fetched")?,
                None => {
                    order.push(key.clone());
                    loaded.insert(key, container);
                }
            }
        }

        let mut pending = VecDeque::new();
        for address in &primaries {
            pending.extend(order.iter().filter(|key| &key.address == address).cloned());
        }

        info!(
            "event=collate module=collator status=ok primaries={} fetched_addresses={} loaded={} items={} duration_ms={}",
            primaries.len(),
            fetch.len(),
            loaded.len(),
            pending.len(),
            started_at.elapsed().as_millis()
        );

        Ok(CollatedItems {
            registry: Arc::clone(&self.registry),
            paths: Arc::clone(&self.paths),
            loaded,
            pending,
        })
    }

    /// Collated content at the given addresses.
    pub fn get_by_addresses(
        &self,
        ctx: &mut VersionContext,
        addresses: &[Address],
    ) -> CollateResult<Vec<Content>> {
        self.collate(ctx, Vec::new(), addresses)?.collect()
    }

    /// Collated content of the identified items in the current version.
    pub fn get_by_ids(&self, ctx: &mut VersionContext, ids: &[ItemId]) -> CollateResult<Vec<Content>> {
        let containers = self.store.fetch_by_ids(ids, &ctx.current_version())?;
        if containers.is_empty() {
            return Ok(Vec::new());
        }
        self.collate(ctx, containers, &[])?.collect()
    }

    /// Summaries of containers at the given addresses, without collation.
    pub fn get_summaries(
        &self,
        ctx: &VersionContext,
        addresses: &[Address],
    ) -> CollateResult<Vec<Summary>> {
        let addresses: Vec<Address> = addresses.iter().map(|a| self.normalize(a)).collect();
        let containers = self
            .store
            .fetch_by_addresses(&addresses, &ctx.current_version())?;
        summarize(&containers)
    }

    /// Summaries of the identified items, without collation.
    pub fn get_summaries_by_ids(
        &self,
        ctx: &VersionContext,
        ids: &[ItemId],
    ) -> CollateResult<Vec<Summary>> {
        let containers = self.store.fetch_by_ids(ids, &ctx.current_version())?;
        summarize(&containers)
    }

    /// Collates every item of `types` in scope and keeps those `filter` accepts.
    pub fn query(
        &self,
        ctx: &mut VersionContext,
        types: &[TypeName],
        filter: impl Fn(&Content) -> bool,
    ) -> CollateResult<Vec<Content>> {
        let mut matches = Vec::new();
        for spliced in self.collate_all(ctx, types)? {
            let content = spliced?;
            if filter(&content) {
                matches.push(content);
            }
        }
        Ok(matches)
    }

    /// Like `query`, projecting matches to summaries.
    pub fn query_summaries(
        &self,
        ctx: &mut VersionContext,
        types: &[TypeName],
        filter: impl Fn(&Content) -> bool,
    ) -> CollateResult<Vec<Summary>> {
        let mut items = self.collate_all(ctx, types)?;
        let mut summaries = Vec::new();
        while let Some((container, spliced)) = items.next_with_container() {
            if filter(&spliced?) {
                summaries.push(container.summary()?);
            }
        }
        Ok(summaries)
    }

    /// Materializes and collates a new item at `address`.
    pub fn get_new(
        &self,
        ctx: &mut VersionContext,
        address: Option<&Address>,
    ) -> CollateResult<Content> {
        let address = address.map(|address| self.normalize(address)).ok_or_else(|| {
            CollateError::InvalidArgument("new item requires an address".to_string())
        })?;
        let record = self.new_record(ctx, address.content_type(), &address.path())?;
        let mut items = self.collate(ctx, vec![record], std::slice::from_ref(&address))?;
        items
            .next()
            .unwrap_or_else(|| Err(CollateError::NotFound(format!("new item at {address}"))))
    }

    /// Builds an unsaved container holding a fresh item of `data_type` at `path`.
    pub fn new_record(
        &self,
        ctx: &VersionContext,
        data_type: &TypeName,
        path: &str,
    ) -> CollateResult<Container> {
        let def = self.registry.require(data_type)?;
        let mut container = self.store.new_container(data_type);
        let address = def.address_from_path(path);
        container.path = address.path();
        container.data_type = data_type.clone();

        let mut data = def.new_data();
        def.apply_address(&address, &mut data)?;
        let mut content = Content::new(data_type.clone(), ItemVersion::new(), data);
        if def.is_metadata_carrier() {
            content.metadata = Some(container.metadata());
        }
        if let EventPayload::NewItem(notified) = self
            .events
            .process_event(EVENT_CONTENT_NEW, EventPayload::NewItem(content.clone()))
        {
            content = notified;
        }

        let title = def.title_of(&content.data);
        container.set_content(&content, title);
        ctx.set_version(&self.registry, &ctx.current_version(), &mut container);
        Ok(container)
    }

    /// Address of content: address fields first, then the metadata path.
    pub fn get_address(&self, content: &Content) -> Option<Address> {
        if let Some(def) = self.registry.get(&content.content_type) {
            if def.derives_address_from_data() {
                let address = def.address_from_data(&content.data);
                if !address.is_empty() {
                    return Some(address);
                }
            }
        }
        let path = content.metadata.as_ref()?.path.as_str();
        Some(self.registry.address_from_path(&content.content_type, path))
    }

    /// Resolves the container that `content` is written into.
    pub fn get_container(
        &self,
        ctx: &mut VersionContext,
        address: Option<&Address>,
        content: &Content,
    ) -> CollateResult<Container> {
        let container = self.resolve_container(ctx, address, content)?;
        match self.events.process_event(
            EVENT_GET_CONTAINER,
            EventPayload::GetContainer {
                content: content.clone(),
                container,
            },
        ) {
            EventPayload::GetContainer { container, .. } => Ok(container),
            _ => Err(CollateError::InvalidArgument(
                "container event returned another payload".to_string(),
            )),
        }
    }

    /// Writes `content` and the referenced containers it redirects into.
    ///
    /// Writeback values are applied to `content`; metadata-carrying content
    /// without metadata receives the persisted container's metadata. Returns
    /// whether the primary container was created.
    pub fn set(
        &self,
        ctx: &mut VersionContext,
        address: Option<&Address>,
        content: &mut Content,
        options: PersistOptions,
    ) -> CollateResult<bool> {
        let address = match address {
            Some(address) => Some(self.normalize(address)),
            None => self.get_address(content),
        };
        let mut container = self.get_container(ctx, address.as_ref(), content)?;

        if let Some(updated) =
            self.decollate(ctx, &container.path, content, options.bypass_checks)?
        {
            *content = updated;
            container = self.get_container(ctx, address.as_ref(), content)?;
        }

        let created = self
            .store
            .persist(std::slice::from_mut(&mut container), options)
            .inspect_err(|err| {
                error!(
                    "event=content_set module=collator status=error type={} path={} error={err}",
                    container.data_type, container.path
                );
            })?;
        let created = created.first().copied().unwrap_or(false);

        if self.registry.carries_metadata(&content.content_type) && !content.has_metadata() {
            content.metadata = Some(container.metadata());
        }

        info!(
            "event=content_set module=collator status=ok type={} path={} created={created}",
            container.data_type, container.path
        );
        Ok(created)
    }

    /// Pushes redirected properties of `content` into their referenced
    /// containers and persists them.
    ///
    /// Returns the content with writebacks applied, or `None` when no
    /// writeback pair was involved.
    pub fn decollate(
        &self,
        ctx: &mut VersionContext,
        path: &str,
        content: &Content,
        bypass_checks: bool,
    ) -> CollateResult<Option<Content>> {
        let mut scope = ctx.scoped(VersioningMode::Specific, content.version.clone());
        self.decollate_in_scope(&mut scope, path, content, bypass_checks)
    }

    fn decollate_in_scope(
        &self,
        ctx: &mut VersionContext,
        path: &str,
        content: &Content,
        bypass_checks: bool,
    ) -> CollateResult<Option<Content>> {
        let owner = &content.content_type;
        let primary = self.registry.address_from_path(owner, path);
        let primary_path = primary.path();

        let mut targets = Vec::new();
        for rule in self
            .registry
            .redirects(owner)
            .iter()
            .filter(|rule| !rule.is_read_only())
        {
            let target = rule.target_type(owner);
            let referenced = self.registry.address_from_path(
                target,
                &self.paths.redirect(&primary_path, rule.source_descriptor()),
            );
            if referenced == primary {
                continue;
            }
            targets.push((rule, referenced));
        }
        if targets.is_empty() {
            return Ok(None);
        }

        let mut addresses: Vec<Address> = Vec::new();
        for (_, address) in &targets {
            if !addresses.contains(address) {
                addresses.push(address.clone());
            }
        }
        let records = self
            .store
            .fetch_by_addresses(&addresses, &ctx.current_version())?;

        let mut batch: Vec<Container> = Vec::new();
        let mut batch_index: HashMap<Address, usize> = HashMap::new();
        let mut writebacks: Vec<(&PropertyPath, &PropertyPath, usize)> = Vec::new();

        for (rule, address) in &targets {
            let index = match batch_index.get(address) {
                Some(index) => *index,
                None => {
                    let record = match self.pick_record(&records, address, &content.version) {
                        Some(record) => record.clone(),
                        None => self.new_record(ctx, address.content_type(), &address.path())?,
                    };
                    batch.push(record);
                    batch_index.insert(address.clone(), batch.len() - 1);
                    batch.len() - 1
                }
            };

            let record = &mut batch[index];
            for pair in rule.pairs() {
                if pair.writeback {
                    writebacks.push((&pair.destination, &pair.source, index));
                    continue;
                }
                if let Some(value) = pair.destination.get(&content.data) {
                    pair.source.set(&mut record.content, value.clone())?;
                }
            }
            if let Some(def) = self.registry.get(&record.data_type) {
                record.title = def.title_of(&record.content);
            }
        }

        let created = self
            .store
            .persist(&mut batch, PersistOptions { bypass_checks })?;
        info!(
            "event=decollate module=collator status=ok type={} path={} records={} created={} writebacks={}",
            owner,
            primary_path,
            batch.len(),
            created.iter().filter(|created| **created).count(),
            writebacks.len()
        );

        if writebacks.is_empty() {
            return Ok(None);
        }
        let mut updated = content.clone();
        for (destination, source, index) in writebacks {
            destination.copy_from(&mut updated.data, &batch[index].record_view(), source)?;
        }
        Ok(Some(updated))
    }

    /// Deletes the container `content` resolves to.
    pub fn delete(
        &self,
        ctx: &mut VersionContext,
        address: Option<&Address>,
        content: &Content,
        bypass_checks: bool,
    ) -> CollateResult<()> {
        let address = match address {
            Some(address) => Some(self.normalize(address)),
            None => self.get_address(content),
        };
        let container = self.get_container(ctx, address.as_ref(), content)?;
        self.store.delete(&container, bypass_checks)?;
        info!(
            "event=content_delete module=collator status=ok type={} path={}",
            container.data_type, container.path
        );
        Ok(())
    }

    /// Moves every version of an item to `to`.
    pub fn move_address(&self, id: &ItemId, to: &Address) -> CollateResult<()> {
        let to = self.normalize(to);
        let to_path = to.path();
        let occupied = self
            .store
            .fetch_by_path(to.content_type(), &to_path, &ItemVersion::new())?;
        if !occupied.is_empty() {
            warn!(
                "event=content_move module=collator status=warn reason=occupied item={id} to={to}"
            );
            return Err(CollateError::ProhibitedAction(format!(
                "there is an item already at {to}"
            )));
        }

        let mut containers = self.store.fetch_by_ids(std::slice::from_ref(id), &ItemVersion::new())?;
        if containers.is_empty() {
            return Err(CollateError::NotFound(format!("item {id}")));
        }

        let def = self.registry.require(id.content_type())?;
        for container in &mut containers {
            if def.derives_address_from_data() {
                def.apply_address(&to, &mut container.content)?;
                container.title = def.title_of(&container.content);
            }
            container.path.clone_from(&to_path);
            if let EventPayload::Move { container: moved, .. } = self.events.process_event(
                EVENT_CONTENT_MOVE,
                EventPayload::Move {
                    to: to.clone(),
                    container: container.clone(),
                },
            ) {
                *container = moved;
            }
        }

        self.store.persist(&mut containers, PersistOptions::default())?;
        info!(
            "event=content_move module=collator status=ok item={id} to={to} versions={}",
            containers.len()
        );
        Ok(())
    }

    fn resolve_container(
        &self,
        ctx: &mut VersionContext,
        address: Option<&Address>,
        content: &Content,
    ) -> CollateResult<Container> {
        let def = self.registry.require(&content.content_type)?;
        let mut content = content.clone();
        let data_path = |content: &Content| {
            if !def.derives_address_from_data() {
                return None;
            }
            let address = def.address_from_data(&content.data);
            (!address.is_empty()).then(|| address.path())
        };

        let mut found_path = data_path(&content);
        let route_path = address.map(Address::path);
        let disagree = matches!((&found_path, &route_path), (Some(from_data), Some(route)) if from_data != route);
        if let (true, Some(to)) = (disagree, address) {
            if let EventPayload::AddressChanged { content: moved, .. } = self.events.process_event(
                EVENT_CONTENT_MOVE,
                EventPayload::AddressChanged {
                    to: to.clone(),
                    content: content.clone(),
                },
            ) {
                content = moved;
            }
            info!(
                "event=address_changed module=collator status=ok type={} to={to}",
                content.content_type
            );
            found_path = data_path(&content);
        }
        let path = found_path.or_else(|| route_path.clone());

        if def.is_metadata_carrier() {
            if let Some(metadata) = &content.metadata {
                if path.as_deref().map_or(true, |path| path == metadata.path) {
                    let mut container = self.store.new_container(&content.content_type);
                    container.copy_metadata_from(metadata);
                    container.set_content(&content, def.title_of(&content.data));
                    container.version = self
                        .registry
                        .applicable_version(&content.content_type, &content.version);
                    return Ok(container);
                }
            }
        }

        let Some(path) = path else {
            return Err(CollateError::InvalidArgument(format!(
                "cannot find path of {} content",
                content.content_type
            )));
        };

        let find_path = route_path.unwrap_or_else(|| path.clone());
        let version = self
            .registry
            .applicable_version(&content.content_type, &content.version);
        let scope = ctx.current_version().overlaid_with(&version);
        let pinned = self
            .registry
            .applicable_version(&content.content_type, &scope);
        let candidates = self
            .store
            .fetch_by_path(&content.content_type, &find_path, &scope)?;
        // Exact version first, then the version new content is pinned to.
        let mut existing: Vec<Container> = candidates
            .iter()
            .filter(|container| container.version == version)
            .cloned()
            .collect();
        if existing.is_empty() && pinned != version {
            existing = candidates
                .into_iter()
                .filter(|container| container.version == pinned)
                .collect();
        }
        if existing.len() > 1 {
            return Err(CollateError::Conflict(format!(
                "duplicate content items at {find_path} of type {}",
                content.content_type
            )));
        }

        let mut container = match existing.pop() {
            Some(container) => container,
            None => {
                let mut container = self.store.new_container(&content.content_type);
                ctx.set_version(&self.registry, &scope, &mut container);
                container
            }
        };
        container.data_type = content.content_type.clone();
        if let Some(metadata) = &content.metadata {
            container.copy_metadata_from(metadata);
        }
        container.path = path;
        container.set_content(&content, def.title_of(&content.data));
        Ok(container)
    }

    fn pick_record<'r>(
        &self,
        records: &'r [Container],
        address: &Address,
        version: &ItemVersion,
    ) -> Option<&'r Container> {
        let wanted = self.registry.applicable_version(address.content_type(), version);
        let candidates: Vec<&Container> = records
            .iter()
            .filter(|record| {
                record.data_type == *address.content_type()
                    && self.registry.address_from_path(&record.data_type, &record.path) == *address
            })
            .collect();
        candidates
            .iter()
            .find(|record| record.version == wanted)
            .or(candidates.first())
            .copied()
    }

    fn redirect_addresses(&self, address: &Address) -> Vec<Address> {
        let owner = address.content_type();
        let path = address.path();
        self.registry
            .redirects(owner)
            .iter()
            .map(|rule| {
                self.registry.address_from_path(
                    rule.target_type(owner),
                    &self.paths.redirect(&path, rule.source_descriptor()),
                )
            })
            .collect()
    }

    fn collate_all(
        &self,
        ctx: &mut VersionContext,
        types: &[TypeName],
    ) -> CollateResult<CollatedItems> {
        let containers = self.store.fetch_all(types, &ctx.current_version())?;
        self.collate(ctx, containers, &[])
    }

    fn fetch_logged(
        &self,
        addresses: &[Address],
        scope: &ItemVersion,
    ) -> CollateResult<Vec<Container>> {
        self.store
            .fetch_by_addresses(addresses, scope)
            .map_err(|err| {
                error!(
                    "event=collate_fetch module=collator status=error addresses={} error={err}",
                    addresses.len()
                );
                CollateError::Repo(err)
            })
    }

    fn versioned_address_of(&self, container: &Container) -> VersionedAddress {
        VersionedAddress::new(
            self.registry
                .address_from_path(&container.data_type, &container.path),
            self.registry
                .applicable_version(&container.data_type, &container.version),
        )
    }

    fn normalize(&self, address: &Address) -> Address {
        let mut address = address.clone();
        self.registry.fix_case(&mut address);
        self.registry
            .address_from_path(address.content_type(), &address.path())
    }

    fn on_duplicate(&self, key: &VersionedAddress, origin: &str) -> CollateResult<()> {
        match self.config.duplicate_policy {
            DuplicatePolicy::TolerateAndLog => {
                warn!(
                    "event=collate module=collator status=warn reason=duplicate_versioned_address origin={origin} address={key}"
                );
                Ok(())
            }
            DuplicatePolicy::Reject => {
                Err(CollateError::DuplicateVersionedAddress(key.to_string()))
            }
        }
    }
}

fn summarize(containers: &[Container]) -> CollateResult<Vec<Summary>> {
    containers
        .iter()
        .map(|container| container.summary().map_err(CollateError::from))
        .collect()
}
