//! View host: lifecycle orchestration and the resource read surface

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::runtime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use vista_bundle::{stop_channel, BuildOptions, Bundler, Manifest, Plugin, StopHandle};
use vista_core::{ArtifactPaths, RegistryError, View, ViewRegistry, ViewRole};
use vista_script::{ScriptBridge, ScriptError, ScriptValue};

use crate::cache::RenderCache;
use crate::document::render_document;
use crate::error::{RenderError, ServeError};
use crate::fingerprint::{ArtifactKind, Fingerprint};
use crate::settings::HostSettings;
use crate::worker::Worker;

/// Observable lifecycle of a [`ViewHost`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    RunningProd,
    RunningDev,
    Stopping,
}

/// Orchestrates the bundler and plugins across production and development
/// modes and serves rendered views through a fingerprint cache.
///
/// `start`/`stop` take `&mut self`, so lifecycle transitions are exclusive
/// by construction; registration and reads share `&self`.
pub struct ViewHost {
    shared: Arc<HostShared>,
    bundler: Arc<dyn Bundler>,
    plugins: Vec<Arc<dyn Plugin>>,
    state: LifecycleState,
    worker: Option<Worker>,
    background: Vec<JoinHandle<()>>,
    stop_handle: Option<StopHandle>,
}

impl std::fmt::Debug for ViewHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHost")
            .field("state", &self.state)
            .field("plugins", &self.plugins.len())
            .finish_non_exhaustive()
    }
}

struct HostShared {
    settings: HostSettings,
    views_root: PathBuf,
    output_root: PathBuf,
    registry: RwLock<ViewRegistry>,
    manifest: RwLock<Manifest>,
    cache: RenderCache,
    bridge: ScriptBridge,
    worker_handle: RwLock<Option<runtime::Handle>>,
    dev_mode: AtomicBool,
}

impl ViewHost {
    /// Create an idle host serving views from `views_root`.
    ///
    /// Artifacts live under the hidden `.vista` directory inside the root.
    pub fn new(
        views_root: impl Into<PathBuf>,
        bundler: Arc<dyn Bundler>,
        settings: HostSettings,
    ) -> Result<Self, ServeError> {
        let views_root = views_root.into();
        if !views_root.is_dir() {
            return Err(ServeError::ViewsRootMissing(views_root));
        }
        let output_root = views_root.join(".vista");
        let registry = ViewRegistry::new(&views_root).with_default_ssr(settings.ssr);

        Ok(Self {
            shared: Arc::new(HostShared {
                settings,
                views_root,
                output_root,
                registry: RwLock::new(registry),
                manifest: RwLock::new(Manifest::new()),
                cache: RenderCache::default(),
                bridge: ScriptBridge::new(),
                worker_handle: RwLock::new(None),
                dev_mode: AtomicBool::new(false),
            }),
            bundler,
            plugins: Vec::new(),
            state: LifecycleState::Idle,
            worker: None,
            background: Vec::new(),
            stop_handle: None,
        })
    }

    /// Attach a build/watch plugin. Plugins run in attachment order.
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn settings(&self) -> &HostSettings {
        &self.shared.settings
    }

    pub fn views_root(&self) -> &Path {
        &self.shared.views_root
    }

    pub fn output_root(&self) -> &Path {
        &self.shared.output_root
    }

    /// Register (or re-register) a view. See [`ViewRegistry::register`].
    pub fn register(
        &self,
        path: &Path,
        role: ViewRole,
        ssr: Option<bool>,
    ) -> Result<View, RegistryError> {
        self.shared
            .registry
            .write()
            .expect("registry lock poisoned")
            .register(path, role, ssr)
    }

    /// Addresses of every registered view.
    pub fn addresses(&self) -> Vec<String> {
        let registry = self.shared.registry.read().expect("registry lock poisoned");
        let mut addresses: Vec<String> = registry.addresses().map(str::to_owned).collect();
        addresses.sort();
        addresses
    }

    /// Start serving.
    ///
    /// Production blocks until the build and every plugin build hook have
    /// completed; any failure aborts startup entirely. Development returns
    /// immediately and runs the continuous build and plugin watchers in the
    /// background. With zero registered views neither the bundler nor any
    /// plugin is invoked.
    pub fn start(&mut self, dev: bool) -> Result<(), ServeError> {
        if self.state != LifecycleState::Idle {
            return Err(ServeError::AlreadyRunning);
        }
        self.state = LifecycleState::Starting;

        let worker = match Worker::spawn() {
            Ok(worker) => worker,
            Err(err) => {
                self.state = LifecycleState::Idle;
                return Err(err.into());
            }
        };

        let views = self
            .shared
            .registry
            .read()
            .expect("registry lock poisoned")
            .snapshot();

        if views.is_empty() {
            debug!("no views registered; starting without a build");
            self.install(worker, dev);
            return Ok(());
        }

        *self.shared.manifest.write().expect("manifest lock poisoned") =
            Manifest::fallback(&views);

        let options = BuildOptions {
            dev,
            minify: self.shared.settings.effective_minify(dev),
            views_root: self.shared.views_root.clone(),
            output_root: self.shared.output_root.clone(),
        };

        if dev {
            self.start_dev(worker, views, options);
            Ok(())
        } else {
            self.start_prod(worker, views, options)
        }
    }

    fn start_prod(
        &mut self,
        worker: Worker,
        views: Vec<View>,
        options: BuildOptions,
    ) -> Result<(), ServeError> {
        let bundler = Arc::clone(&self.bundler);
        let plugins = self.plugins.clone();

        let outcome = worker.run(async move {
            let manifest = bundler.build(&views, &options).await?;
            for plugin in &plugins {
                plugin
                    .build(&options.views_root, &options.output_root)
                    .await
                    .map_err(|source| ServeError::Plugin {
                        plugin: plugin.name().to_owned(),
                        source,
                    })?;
            }
            Ok::<Manifest, ServeError>(manifest)
        });

        match outcome.and_then(|inner| inner) {
            Ok(manifest) => {
                *self.shared.manifest.write().expect("manifest lock poisoned") = manifest;
                info!("production build completed");
                self.install(worker, false);
                Ok(())
            }
            Err(err) => {
                worker.shutdown();
                self.state = LifecycleState::Idle;
                Err(err)
            }
        }
    }

    fn start_dev(&mut self, worker: Worker, views: Vec<View>, options: BuildOptions) {
        let (stop_handle, stop_signal) = stop_channel();

        let bundler = Arc::clone(&self.bundler);
        self.background.push(worker.spawn_task(async move {
            if let Err(err) = bundler.build(&views, &options).await {
                error!(error = %err, "background build failed");
            }
        }));

        for plugin in &self.plugins {
            let plugin = Arc::clone(plugin);
            let signal = stop_signal.clone();
            let views_root = self.shared.views_root.clone();
            let output_root = self.shared.output_root.clone();
            self.background.push(worker.spawn_task(async move {
                if let Err(err) = plugin.watch(&views_root, &output_root, signal).await {
                    error!(plugin = plugin.name(), error = %err, "plugin watch failed");
                }
            }));
        }

        self.stop_handle = Some(stop_handle);
        info!("development watch started");
        self.install(worker, true);
    }

    fn install(&mut self, worker: Worker, dev: bool) {
        self.shared.dev_mode.store(dev, Ordering::SeqCst);
        *self
            .shared
            .worker_handle
            .write()
            .expect("worker handle lock poisoned") = Some(worker.handle());
        self.worker = Some(worker);
        self.state = if dev {
            LifecycleState::RunningDev
        } else {
            LifecycleState::RunningProd
        };
    }

    /// Stop serving. Idempotent: stopping an idle host is a no-op, and
    /// repeated calls never error.
    ///
    /// Signals every watch-stop condition, cancels outstanding background
    /// tasks, awaits their termination (cancellation is expected, anything
    /// else is logged), and tears the worker context down so repeated
    /// start/stop cycles leak nothing.
    pub fn stop(&mut self) {
        if !matches!(
            self.state,
            LifecycleState::RunningProd | LifecycleState::RunningDev
        ) {
            return;
        }
        self.state = LifecycleState::Stopping;

        if let Some(stop_handle) = self.stop_handle.take() {
            stop_handle.stop();
        }

        // Refuse new reads before unwinding the background work.
        *self
            .shared
            .worker_handle
            .write()
            .expect("worker handle lock poisoned") = None;
        self.shared.dev_mode.store(false, Ordering::SeqCst);

        let tasks = std::mem::take(&mut self.background);
        if let Some(worker) = self.worker.take() {
            if !tasks.is_empty() {
                let _ = worker.run(async move {
                    for task in tasks {
                        task.abort();
                        match task.await {
                            Ok(()) => {}
                            Err(err) if err.is_cancelled() => {}
                            Err(err) => {
                                error!(error = %err, "background task ended abnormally")
                            }
                        }
                    }
                });
            }
            worker.shutdown();
        }

        info!("host stopped");
        self.state = LifecycleState::Idle;
    }

    /// Handler for the view registered at `address`, if any.
    pub fn handler(&self, address: &str) -> Option<ResourceHandler> {
        let registry = self.shared.registry.read().expect("registry lock poisoned");
        let canonical = registry.by_address(address)?.canonical().to_path_buf();
        Some(ResourceHandler {
            shared: Arc::clone(&self.shared),
            address: address.to_owned(),
            canonical,
        })
    }

    /// Render the view at `address`, blocking the calling thread.
    pub fn render(&self, address: &str) -> Result<String, RenderError> {
        let handler = self
            .handler(address)
            .ok_or_else(|| RenderError::NotRegistered(address.to_owned()))?;
        handler.read_blocking()
    }
}

impl Drop for ViewHost {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Addressable read surface for one registered view.
///
/// Reads run on the host's worker context; the handler itself can live on
/// any thread or runtime.
#[derive(Clone)]
pub struct ResourceHandler {
    shared: Arc<HostShared>,
    address: String,
    canonical: PathBuf,
}

impl ResourceHandler {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Render the view, awaiting the result from the caller's runtime.
    pub async fn read(&self) -> Result<String, RenderError> {
        let handle = self.worker_handle()?;
        let shared = Arc::clone(&self.shared);
        let canonical = self.canonical.clone();
        handle
            .spawn(async move { render_view(shared, canonical).await })
            .await
            .map_err(|_| RenderError::Interrupted)?
    }

    /// Render the view, blocking the calling thread.
    pub fn read_blocking(&self) -> Result<String, RenderError> {
        let handle = self.worker_handle()?;
        let shared = Arc::clone(&self.shared);
        let canonical = self.canonical.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        handle.spawn(async move {
            let _ = tx.send(render_view(shared, canonical).await);
        });
        rx.recv().map_err(|_| RenderError::Interrupted)?
    }

    fn worker_handle(&self) -> Result<runtime::Handle, RenderError> {
        self.shared
            .worker_handle
            .read()
            .expect("worker handle lock poisoned")
            .clone()
            .ok_or(RenderError::NotRunning)
    }
}

async fn render_view(shared: Arc<HostShared>, canonical: PathBuf) -> Result<String, RenderError> {
    let view = shared
        .registry
        .read()
        .expect("registry lock poisoned")
        .get(&canonical)
        .cloned()
        .ok_or_else(|| RenderError::NotRegistered(canonical.display().to_string()))?;
    let artifacts = shared
        .manifest
        .read()
        .expect("manifest lock poisoned")
        .artifacts_for(&view);

    if shared.dev_mode.load(Ordering::SeqCst) {
        wait_for_artifact(&shared, &artifacts.client).await;
    }

    let slot = shared.cache.slot(&canonical);

    let fingerprint = Fingerprint::capture(&shared.output_root, &artifacts).await;
    if shared.settings.cache {
        if let Some(html) = slot.lookup(&fingerprint) {
            return Ok(html);
        }
    }

    let _gate = slot.gate.lock().await;
    // Close the race against a writer that finished while we waited.
    let fingerprint = Fingerprint::capture(&shared.output_root, &artifacts).await;
    if shared.settings.cache {
        if let Some(html) = slot.lookup(&fingerprint) {
            return Ok(html);
        }
    }

    let html = render_fresh(&shared, &view, &artifacts).await?;
    if shared.settings.cache {
        slot.store(fingerprint, html.clone());
    }
    Ok(html)
}

async fn render_fresh(
    shared: &HostShared,
    view: &View,
    artifacts: &ArtifactPaths,
) -> Result<String, RenderError> {
    let js = read_required(shared, &artifacts.client, ArtifactKind::Client, view).await?;

    let ssr_html = if view.ssr() {
        let server = artifacts
            .server
            .as_deref()
            .ok_or_else(|| RenderError::MissingArtifact {
                kind: ArtifactKind::Server,
                view: view.canonical().to_path_buf(),
            })?;
        let source = read_required(shared, server, ArtifactKind::Server, view).await?;
        match shared.bridge.run(&source).await? {
            ScriptValue::Str(markup) => Some(markup),
            other => {
                return Err(RenderError::Execution(ScriptError::Execution(format!(
                    "server bundle produced no markup (got {other:?})"
                ))))
            }
        }
    } else {
        None
    };

    let css = match artifacts.stylesheet.as_deref() {
        Some(stylesheet) => read_optional(shared, stylesheet).await?,
        None => None,
    };

    Ok(render_document(&js, css.as_deref(), ssr_html.as_deref()))
}

/// Development reads poll for the client artifact instead of failing while
/// the first background build is still running. On timeout the regular
/// missing-artifact path reports the problem.
async fn wait_for_artifact(shared: &HostShared, relative: &Path) {
    let path = shared.output_root.join(relative);
    let deadline = tokio::time::Instant::now() + shared.settings.wait_timeout();
    while tokio::time::Instant::now() < deadline {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return;
        }
        tokio::time::sleep(shared.settings.poll_interval()).await;
    }
}

async fn read_required(
    shared: &HostShared,
    relative: &Path,
    kind: ArtifactKind,
    view: &View,
) -> Result<String, RenderError> {
    let path = shared.output_root.join(relative);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(RenderError::MissingArtifact {
            kind,
            view: view.canonical().to_path_buf(),
        }),
        Err(source) => Err(RenderError::Io { path, source }),
    }
}

async fn read_optional(shared: &HostShared, relative: &Path) -> Result<Option<String>, RenderError> {
    let path = shared.output_root.join(relative);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RenderError::Io { path, source }),
    }
}
