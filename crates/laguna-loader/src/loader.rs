//! Paged, paced entity loading with reconciliation.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use laguna_assets::{AssetCacheConfig, AssetResolutionCache, ModelLoader};
use laguna_coords::CoordinateTransform;
use laguna_recovery::{ErrorRecoveryCoordinator, RecoveryReport, RenderError};
use laguna_scene::{EntityId, EventBuffer, Layer, MeshId, MeshRegistry, Scene, SceneEvent};

use crate::entity::{Entity, EntityDetails};
use crate::renderer::EntityRenderer;
use crate::source::{EntitySource, SourceError};

/// Pacing of the loader.
#[derive(Clone, Debug, PartialEq)]
pub struct LoaderConfig {
    /// Size of the first page, rendered without pauses.
    pub initial_batch: usize,
    /// Size of every later page.
    pub page_size: usize,
    /// Entities rendered between render pauses.
    pub render_batch: usize,
    pub page_pause: Duration,
    pub render_pause: Duration,
    pub recovery_interval: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            initial_batch: 20,
            page_size: 20,
            render_batch: 10,
            page_pause: Duration::from_millis(200),
            render_pause: Duration::from_millis(50),
            recovery_interval: Duration::from_secs(5),
        }
    }
}

/// Position within the collection being loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadCursor {
    pub offset: usize,
    pub batch_size: usize,
    pub has_more: bool,
}

/// One load pass over the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadSession {
    pub generation: u64,
    pub cursor: LoadCursor,
}

/// Flags for the UI layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadStatus {
    /// The initial batch is still loading.
    pub loading: bool,
    /// Background pages are still being fetched.
    pub background: bool,
    /// Last fetch error, cleared by the next successful fetch.
    pub error: Option<String>,
}

/// A page to fetch, stamped with the session it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub offset: usize,
    pub limit: usize,
}

/// A fetched page, still tagged with its request.
#[derive(Clone, Debug)]
pub struct FetchedPage {
    pub request: PageRequest,
    pub result: Result<Vec<Entity>, SourceError>,
}

/// What a loading step achieved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// A page was rendered; more may follow.
    Loaded { fetched: usize },
    /// The session has drained the collection.
    Exhausted,
    /// The page belonged to an older session and was dropped.
    Superseded,
    /// The fetch failed; the same page is retried by the next step.
    Failed,
    /// No session is active.
    Idle,
}

struct RenderedEntity {
    mesh: MeshId,
    entity: Entity,
    /// Shown as a placeholder; upgraded on the next data pass or retry.
    degraded: bool,
}

/// Rendered-entity registry plus what it needs to render.
struct Registry {
    renderer: EntityRenderer,
    assets: AssetResolutionCache<EntityDetails>,
    /// Entities seen in the current session.
    known: BTreeMap<EntityId, Entity>,
    rendered: BTreeMap<EntityId, RenderedEntity>,
    events: EventBuffer<SceneEvent>,
}

impl Registry {
    fn render(&mut self, scene: &mut Scene, entity: &Entity, now: Instant) -> Result<MeshId, RenderError> {
        let mesh = self
            .renderer
            .render(scene, self.assets.models_mut(), entity, now)?;
        self.register(entity, mesh, false);
        Ok(mesh)
    }

    fn render_placeholder(&mut self, scene: &mut Scene, entity: &Entity) -> Result<MeshId, RenderError> {
        let mesh = self.renderer.render_placeholder(scene, entity)?;
        self.register(entity, mesh, true);
        Ok(mesh)
    }

    fn register(&mut self, entity: &Entity, mesh: MeshId, degraded: bool) {
        self.rendered.insert(
            entity.id.clone(),
            RenderedEntity {
                mesh,
                entity: entity.clone(),
                degraded,
            },
        );
        self.events.send(SceneEvent::EntityCreated {
            id: entity.id.clone(),
            layer: Layer::Entity,
        });
    }

    fn update(&mut self, scene: &mut Scene, entity: &Entity, now: Instant) -> Result<(), RenderError> {
        let Some(existing) = self.rendered.get_mut(&entity.id) else {
            return self.render(scene, entity, now).map(|_| ());
        };
        self.renderer
            .update(scene, existing.mesh, self.assets.models_mut(), entity, now)?;
        existing.entity = entity.clone();
        existing.degraded = false;
        Ok(())
    }

    /// Full render used by recovery: update in place or create.
    fn retry(&mut self, scene: &mut Scene, id: &EntityId, now: Instant) -> Result<(), RenderError> {
        match self.known.get(id).cloned() {
            Some(entity) => self.update(scene, &entity, now),
            None => Ok(()),
        }
    }

    fn dispose(&mut self, scene: &mut Scene, id: &EntityId) -> bool {
        let Some(entry) = self.rendered.remove(id) else {
            return false;
        };
        self.renderer.dispose(scene, entry.mesh);
        self.events.send(SceneEvent::EntityRemoved {
            id: id.clone(),
            layer: Layer::Entity,
        });
        true
    }
}

struct Ctx<'a> {
    registry: &'a mut Registry,
    scene: &'a mut Scene,
}

/// Loads, renders and reconciles one entity collection.
pub struct AsyncEntityLoader<S> {
    source: S,
    registry: Registry,
    recovery: ErrorRecoveryCoordinator,
    config: LoaderConfig,
    session: Option<LoadSession>,
    generation: u64,
    status: LoadStatus,
    fetches: usize,
}

/// Current time on the tokio clock, so paused test clocks apply.
fn clock() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl<S: EntitySource> AsyncEntityLoader<S> {
    pub fn new(
        source: S,
        transform: CoordinateTransform,
        models: Box<dyn ModelLoader>,
        config: LoaderConfig,
        assets: AssetCacheConfig,
    ) -> Self {
        let recovery = ErrorRecoveryCoordinator::new(config.recovery_interval);
        Self {
            source,
            registry: Registry {
                renderer: EntityRenderer::new(transform),
                assets: AssetResolutionCache::new(models, assets),
                known: BTreeMap::new(),
                rendered: BTreeMap::new(),
                events: EventBuffer::new(),
            },
            recovery,
            config,
            session: None,
            generation: 0,
            status: LoadStatus::default(),
            fetches: 0,
        }
    }

    // --- sessions ---

    fn begin_session(&mut self) -> LoadSession {
        self.generation += 1;
        let session = LoadSession {
            generation: self.generation,
            cursor: LoadCursor {
                offset: 0,
                batch_size: self.config.initial_batch.max(1),
                has_more: true,
            },
        };
        self.session = Some(session);
        self.registry.known.clear();
        self.status = LoadStatus {
            loading: true,
            background: true,
            error: None,
        };
        tracing::debug!(generation = self.generation, "Load session started");
        session
    }

    /// Start a session and render the initial batch without pauses. The view
    /// is interactive once this returns; call [`step`](Self::step) or
    /// [`load_remaining`](Self::load_remaining) for the rest.
    pub async fn load_initial(&mut self, scene: &mut Scene) -> StepOutcome {
        self.begin_session();
        self.recovery.start(clock());
        let outcome = match self.next_request() {
            Some(request) => {
                let page = self.fetch(request).await;
                self.apply_page(scene, page, false).await
            }
            None => StepOutcome::Idle,
        };
        self.status.loading = false;
        tracing::info!(
            rendered = self.registry.rendered.len(),
            "Initial entity batch ready"
        );
        outcome
    }

    /// Clear everything and load from scratch.
    pub async fn reload(&mut self, scene: &mut Scene) -> StepOutcome {
        let ids: Vec<EntityId> = self.registry.rendered.keys().cloned().collect();
        for id in &ids {
            self.registry.dispose(scene, id);
            self.recovery.forget(id);
        }
        tracing::info!(disposed = ids.len(), "Forced reload");
        self.load_initial(scene).await
    }

    /// Re-fetch without clearing. Entities missing from the new data are
    /// disposed once the session drains.
    pub async fn refresh(&mut self, scene: &mut Scene) -> StepOutcome {
        self.load_initial(scene).await
    }

    /// The next page the current session wants, if any.
    pub fn next_request(&self) -> Option<PageRequest> {
        let session = self.session?;
        session.cursor.has_more.then_some(PageRequest {
            generation: session.generation,
            offset: session.cursor.offset,
            limit: session.cursor.batch_size,
        })
    }

    pub async fn fetch(&mut self, request: PageRequest) -> FetchedPage {
        self.fetches += 1;
        let result = self.source.fetch_page(request.offset, request.limit).await;
        FetchedPage { request, result }
    }

    /// Pause, fetch the next page and render it in paced sub-batches.
    pub async fn step(&mut self, scene: &mut Scene) -> StepOutcome {
        let Some(request) = self.next_request() else {
            return if self.session.is_some() {
                StepOutcome::Exhausted
            } else {
                StepOutcome::Idle
            };
        };
        tokio::time::sleep(self.config.page_pause).await;
        let page = self.fetch(request).await;
        self.apply_page(scene, page, true).await
    }

    /// Step until the session drains, fails or is superseded.
    pub async fn load_remaining(&mut self, scene: &mut Scene) -> StepOutcome {
        loop {
            match self.step(scene).await {
                StepOutcome::Loaded { .. } => {}
                done => return done,
            }
        }
    }

    /// Render a fetched page. Pages from an older session are ignored.
    pub async fn apply_page(&mut self, scene: &mut Scene, page: FetchedPage, paced: bool) -> StepOutcome {
        let Some(session) = self.session.filter(|s| s.generation == page.request.generation) else {
            tracing::debug!(
                generation = page.request.generation,
                current = self.generation,
                "Dropping page from superseded session"
            );
            return StepOutcome::Superseded;
        };
        if session.cursor.offset != page.request.offset {
            tracing::debug!(offset = page.request.offset, "Dropping out-of-order page");
            return StepOutcome::Superseded;
        }

        let entities = match page.result {
            Ok(entities) => entities,
            Err(error) => {
                tracing::warn!(offset = page.request.offset, error = %error, "Entity page fetch failed");
                self.status.error = Some(error.to_string());
                return StepOutcome::Failed;
            }
        };
        self.status.error = None;

        let fetched = entities.len();
        let has_more = fetched >= page.request.limit;
        self.session = Some(LoadSession {
            generation: session.generation,
            cursor: LoadCursor {
                offset: session.cursor.offset + fetched,
                batch_size: self.config.page_size.max(1),
                has_more,
            },
        });

        let mut chunks = entities.chunks(self.config.render_batch.max(1)).peekable();
        while let Some(chunk) = chunks.next() {
            let now = clock();
            for entity in chunk {
                self.upsert(scene, entity, now);
            }
            if paced && chunks.peek().is_some() {
                tokio::time::sleep(self.config.render_pause).await;
            }
        }
        tracing::debug!(
            offset = page.request.offset,
            fetched,
            rendered = self.registry.rendered.len(),
            "Entity page rendered"
        );

        if has_more {
            StepOutcome::Loaded { fetched }
        } else {
            self.finish_session(scene);
            StepOutcome::Exhausted
        }
    }

    fn upsert(&mut self, scene: &mut Scene, entity: &Entity, now: Instant) {
        self.registry
            .known
            .insert(entity.id.clone(), entity.clone());
        let state = self
            .registry
            .rendered
            .get(&entity.id)
            .map(|r| (r.entity == *entity, r.degraded));
        let kind = entity.kind.name();
        let mut cx = Ctx {
            registry: &mut self.registry,
            scene,
        };
        match state {
            None => {
                self.recovery.run_with_fallback(
                    kind,
                    &entity.id,
                    &mut cx,
                    |cx| cx.registry.render(cx.scene, entity, now),
                    |cx| cx.registry.render_placeholder(cx.scene, entity),
                );
            }
            Some((true, false)) => {}
            Some(_) => {
                self.recovery.run(kind, &entity.id, &mut cx, |cx| {
                    cx.registry.update(cx.scene, entity, now)
                });
            }
        }
    }

    /// Dispose entities the drained session no longer contains.
    fn finish_session(&mut self, scene: &mut Scene) {
        let stale: Vec<EntityId> = self
            .registry
            .rendered
            .keys()
            .filter(|id| !self.registry.known.contains_key(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.registry.dispose(scene, id);
            self.recovery.forget(id);
        }
        for id in self.recovery.failed_ids().cloned().collect::<Vec<_>>() {
            if !self.registry.known.contains_key(&id) {
                self.recovery.forget(&id);
            }
        }
        self.status.background = false;
        tracing::info!(
            rendered = self.registry.rendered.len(),
            disposed = stale.len(),
            fetches = self.fetches,
            "Entity collection loaded"
        );
    }

    // --- frame work ---

    /// Run a recovery cycle if one is due.
    pub fn tick(&mut self, scene: &mut Scene, now: Instant) -> Option<RecoveryReport> {
        let mut cx = Ctx {
            registry: &mut self.registry,
            scene,
        };
        let report = self
            .recovery
            .tick(now, &mut cx, |cx, id| cx.registry.retry(cx.scene, id, now))?;
        let purged = self.registry.assets.purge_expired(now);
        if purged > 0 {
            tracing::debug!(purged, "Expired asset entries dropped");
        }
        Some(report)
    }

    /// Detail record for an entity, served from the record cache when fresh.
    pub async fn details(&mut self, id: &EntityId) -> Result<EntityDetails, SourceError> {
        let source = &self.source;
        self.registry
            .assets
            .records_mut()
            .get_or_fetch(id, clock(), |id| async move { source.fetch_details(&id).await })
            .await
    }

    /// Remove every mesh and stop retrying.
    pub fn teardown(&mut self, scene: &mut Scene) {
        let ids: Vec<EntityId> = self.registry.rendered.keys().cloned().collect();
        for id in &ids {
            self.registry.dispose(scene, id);
        }
        self.session = None;
        self.recovery.shutdown();
    }

    // --- inspection ---

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn session(&self) -> Option<LoadSession> {
        self.session
    }

    /// Page fetches issued since construction.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    pub fn rendered_count(&self) -> usize {
        self.registry.rendered.len()
    }

    pub fn is_rendered(&self, id: &EntityId) -> bool {
        self.registry.rendered.contains_key(id)
    }

    pub fn is_degraded(&self, id: &EntityId) -> bool {
        self.registry.rendered.get(id).is_some_and(|r| r.degraded)
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.registry.rendered.get(id).map(|r| &r.entity)
    }

    pub fn recovery(&self) -> &ErrorRecoveryCoordinator {
        &self.recovery
    }

    pub fn assets(&self) -> &AssetResolutionCache<EntityDetails> {
        &self.registry.assets
    }

    pub fn events(&self) -> &EventBuffer<SceneEvent> {
        &self.registry.events
    }

    pub fn events_mut(&mut self) -> &mut EventBuffer<SceneEvent> {
        &mut self.registry.events
    }
}

impl<S> MeshRegistry for AsyncEntityLoader<S> {
    fn for_each_mesh(&self, f: &mut dyn FnMut(&EntityId, MeshId)) {
        for (id, entry) in &self.registry.rendered {
            f(id, entry.mesh);
        }
    }

    fn mesh_for(&self, id: &EntityId) -> Option<MeshId> {
        self.registry.rendered.get(id).map(|r| r.mesh)
    }
}
