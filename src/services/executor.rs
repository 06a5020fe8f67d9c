use crate::error::{PdfWizardError, Result};
use crate::services::engine::PdfEngine;
use crate::services::loader::DocumentLoader;
use crate::services::validator::{RangeValidator, Validate};
use crate::types::{
    OperationKind, OperationState, OutputManifest, OutputSpec, RotateDefinition, SplitDefinition,
    WatermarkDefinition,
};
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One operation with everything the engine needs, except where the output goes.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    Merge {
        inputs: Vec<PathBuf>,
    },
    Split {
        source: PathBuf,
        definitions: Vec<SplitDefinition>,
    },
    Rotate {
        source: PathBuf,
        definitions: Vec<RotateDefinition>,
    },
    Watermark {
        source: PathBuf,
        definition: WatermarkDefinition,
    },
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Merge { .. } => OperationKind::Merge,
            Self::Split { .. } => OperationKind::Split,
            Self::Rotate { .. } => OperationKind::Rotate,
            Self::Watermark { .. } => OperationKind::Watermark,
        }
    }

    pub fn sources(&self) -> Vec<PathBuf> {
        match self {
            Self::Merge { inputs } => inputs.clone(),
            Self::Split { source, .. }
            | Self::Rotate { source, .. }
            | Self::Watermark { source, .. } => vec![source.clone()],
        }
    }

    pub fn definition_count(&self) -> usize {
        match self {
            Self::Merge { inputs } => inputs.len(),
            Self::Split { definitions, .. } => definitions.len(),
            Self::Rotate { definitions, .. } => definitions.len(),
            Self::Watermark { .. } => 1,
        }
    }

    /// Names of the files this request will produce, relative to the output directory.
    fn output_names(&self, output: &OutputSpec) -> Result<Vec<String>> {
        match self {
            Self::Split { definitions, .. } => {
                Ok(definitions.iter().map(SplitDefinition::output_name).collect())
            }
            _ => {
                let name = output.filename.as_deref().unwrap_or_default();
                RangeValidator::check_filename(name)?;
                Ok(vec![format!("{}{}", name.trim(), crate::PDF_EXTENSION)])
            }
        }
    }
}

/// Aborts an in-flight execution. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`CancelHandle::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs one operation at a time against a [`PdfEngine`].
pub struct DocumentOperationExecutor<E: PdfEngine> {
    engine: Arc<E>,
    in_flight: AtomicBool,
    state: watch::Sender<OperationState>,
    timeout: Option<Duration>,
}

impl<E: PdfEngine> DocumentOperationExecutor<E> {
    pub fn new(engine: E) -> Self {
        Self::with_engine(Arc::new(engine))
    }

    pub fn with_engine(engine: Arc<E>) -> Self {
        let (state, _) = watch::channel(OperationState::Idle);
        Self {
            engine,
            in_flight: AtomicBool::new(false),
            state,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> OperationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.state.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validates and runs `request`, writing results into `output`.
    ///
    /// Nothing is written to the output directory unless the whole operation
    /// succeeds. A second call while one is running fails with
    /// [`PdfWizardError::Busy`] and leaves the running one alone.
    pub async fn execute(
        &self,
        request: OperationRequest,
        output: &OutputSpec,
        cancel: &CancelHandle,
    ) -> Result<OutputManifest> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Refusing {} while another operation is running", request.kind());
            return Err(PdfWizardError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        let kind = request.kind();
        let result = self.run(request, output, cancel).await;
        let final_state = match &result {
            Ok(_) => OperationState::Succeeded,
            Err(PdfWizardError::Cancelled) | Err(PdfWizardError::Timeout { .. }) => {
                OperationState::Cancelled
            }
            Err(_) => OperationState::Failed,
        };
        self.state.send_replace(final_state);

        match &result {
            Ok(manifest) => info!(
                "{} finished: {} file(s) written",
                kind,
                manifest.outputs.len()
            ),
            Err(e) => warn!("{} did not complete: {}", kind, e),
        }
        result
    }

    async fn run(
        &self,
        request: OperationRequest,
        output: &OutputSpec,
        cancel: &CancelHandle,
    ) -> Result<OutputManifest> {
        self.state.send_replace(OperationState::Validating);
        let names = self.validate(&request, output).await?;
        if cancel.is_cancelled() {
            return Err(PdfWizardError::Cancelled);
        }

        self.state.send_replace(OperationState::Executing);
        let staging = tempfile::Builder::new()
            .prefix(".pdf-wizard-")
            .tempdir_in(&output.directory)?;
        debug!("Staging output in {}", staging.path().display());

        let staged_dir = staging.path().to_path_buf();
        let job = request.clone();
        let file_name = names.first().cloned().unwrap_or_default();
        let work = self.blocking(move |engine| perform(engine, &job, &staged_dir, &file_name));

        let staged = tokio::select! {
            result = self.limited(work) => result?,
            _ = cancel.cancelled() => {
                warn!("{} cancelled, discarding staged output", request.kind());
                return Err(PdfWizardError::Cancelled);
            }
        };

        let outputs = promote(&staged, &output.directory, output.overwrite)?;
        drop(staging);

        Ok(OutputManifest {
            operation: request.kind(),
            sources: request.sources(),
            outputs,
            definitions: request.definition_count(),
            completed_at: Utc::now(),
        })
    }

    /// Re-reads page counts and re-checks every definition against them.
    /// Returns the output file names.
    async fn validate(&self, request: &OperationRequest, output: &OutputSpec) -> Result<Vec<String>> {
        DocumentLoader::validate_output_directory(&output.directory)?;
        let names = request.output_names(output)?;

        match request {
            OperationRequest::Merge { inputs } => {
                if inputs.is_empty() {
                    return Err(PdfWizardError::invalid("no input files provided"));
                }
                for (idx, input) in inputs.iter().enumerate() {
                    self.page_count(input).await.map_err(|e| PdfWizardError::Merge {
                        reason: format!("PDF file {} ({}) is invalid: {}", idx + 1, input.display(), e),
                    })?;
                }
            }
            OperationRequest::Split {
                source,
                definitions,
            } => {
                let total = self.page_count(source).await?;
                check_all(definitions, total)?;
                let mut seen = HashSet::new();
                for name in &names {
                    if !seen.insert(name.as_str()) {
                        return Err(PdfWizardError::invalid(format!(
                            "duplicate filename: {}",
                            name
                        )));
                    }
                }
            }
            OperationRequest::Rotate {
                source,
                definitions,
            } => {
                let total = self.page_count(source).await?;
                check_all(definitions, total)?;
            }
            OperationRequest::Watermark { source, definition } => {
                let total = self.page_count(source).await?;
                definition.check(total)?;
            }
        }

        if !output.overwrite {
            if let Some(existing) = names
                .iter()
                .map(|name| output.directory.join(name))
                .find(|path| path.exists())
            {
                return Err(PdfWizardError::OutputDirectory {
                    reason: format!(
                        "{} already exists. Use --force to overwrite.",
                        existing.display()
                    ),
                });
            }
        }

        debug!("Validated {} with {} output(s)", request.kind(), names.len());
        Ok(names)
    }

    async fn page_count(&self, path: &Path) -> Result<u32> {
        let path = path.to_path_buf();
        let info = self.blocking(move |engine| engine.metadata(&path)).await?;
        Ok(info.total_pages)
    }

    async fn blocking<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&E) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || job(engine.as_ref()))
            .await
            .map_err(|e| PdfWizardError::Execution {
                reason: format!("worker thread failed: {}", e),
            })?
    }

    async fn limited<T>(&self, work: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| PdfWizardError::Timeout {
                    seconds: limit.as_secs(),
                })?,
            None => work.await,
        }
    }
}

fn check_all<D: Validate>(definitions: &[D], total_pages: u32) -> Result<()> {
    if definitions.is_empty() {
        return Err(PdfWizardError::invalid("no page ranges defined"));
    }
    for (idx, definition) in definitions.iter().enumerate() {
        definition.check(total_pages).map_err(|e| {
            warn!("Entry {} is invalid: {}", idx + 1, e);
            PdfWizardError::Validation(e)
        })?;
    }
    Ok(())
}

/// The single engine call for a request. Runs on a blocking thread.
fn perform<E: PdfEngine>(
    engine: &E,
    request: &OperationRequest,
    staging: &Path,
    file_name: &str,
) -> Result<Vec<PathBuf>> {
    let target = staging.join(file_name);
    match request {
        OperationRequest::Merge { inputs } => engine.merge(inputs, &target).map(|_| vec![target]),
        OperationRequest::Split {
            source,
            definitions,
        } => engine.split(source, definitions, staging),
        OperationRequest::Rotate {
            source,
            definitions,
        } => engine.rotate(source, definitions, &target).map(|_| vec![target]),
        OperationRequest::Watermark { source, definition } => engine
            .watermark(source, definition, &target)
            .map(|_| vec![target]),
    }
}

/// Moves staged files into `directory`, keeping their names.
///
/// If one move fails, the files already moved are removed again. Files they
/// replaced under `overwrite` are not restored.
fn promote(staged: &[PathBuf], directory: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    let targets: Vec<PathBuf> = staged
        .iter()
        .map(|path| {
            path.file_name()
                .map(|name| directory.join(name))
                .ok_or_else(|| PdfWizardError::Execution {
                    reason: format!("engine produced an unnamed output: {}", path.display()),
                })
        })
        .collect::<Result<_>>()?;

    if !overwrite {
        if let Some(existing) = targets.iter().find(|target| target.exists()) {
            return Err(PdfWizardError::OutputDirectory {
                reason: format!(
                    "{} appeared while processing. Use --force to overwrite.",
                    existing.display()
                ),
            });
        }
    }

    for (idx, (from, to)) in staged.iter().zip(&targets).enumerate() {
        if let Err(e) = fs::rename(from, to) {
            for moved in &targets[..idx] {
                if let Err(cleanup) = fs::remove_file(moved) {
                    warn!("Could not remove {}: {}", moved.display(), cleanup);
                }
            }
            return Err(PdfWizardError::Execution {
                reason: format!("could not move output to {}: {}", to.display(), e),
            });
        }
        debug!("Moved {} into place", to.display());
    }
    Ok(targets)
}
