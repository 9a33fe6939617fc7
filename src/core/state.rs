use std::sync::Arc;

use crate::core::config::Settings;
use crate::dispatch::JobDispatcher;
use crate::registry::TemplateRegistry;
use crate::services::grading::GradingEngine;
use crate::services::notify::Notifier;
use crate::services::reports::ReportGenerator;
use crate::services::review::ReviewRouter;
use crate::services::scoring::{ModelTrainer, Scorer};
use crate::services::training::TrainingOrchestrator;
use crate::store::SheetStore;

/// Explicitly constructed service bundle handed by reference to
/// collaborators; there is no global dispatcher or registry.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    dispatcher: JobDispatcher,
    registry: TemplateRegistry,
    sheets: SheetStore,
    review: ReviewRouter,
    training: TrainingOrchestrator,
    reports: ReportGenerator,
    engine: GradingEngine,
    trainer: Arc<dyn ModelTrainer>,
    notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        dispatcher: JobDispatcher,
        scorer: Arc<dyn Scorer>,
        trainer: Arc<dyn ModelTrainer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let sheets = SheetStore::new();
        let training = TrainingOrchestrator::new(dispatcher.clone());
        let reports = ReportGenerator::new(dispatcher.clone(), sheets.clone());
        Self {
            inner: Arc::new(InnerState {
                settings,
                dispatcher,
                registry: TemplateRegistry::new(),
                sheets,
                review: ReviewRouter::new(),
                training,
                reports,
                engine: GradingEngine::new(scorer),
                trainer,
                notifier,
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn dispatcher(&self) -> &JobDispatcher {
        &self.inner.dispatcher
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.inner.registry
    }

    pub fn sheets(&self) -> &SheetStore {
        &self.inner.sheets
    }

    pub fn review(&self) -> &ReviewRouter {
        &self.inner.review
    }

    pub fn training(&self) -> &TrainingOrchestrator {
        &self.inner.training
    }

    pub fn reports(&self) -> &ReportGenerator {
        &self.inner.reports
    }

    pub fn engine(&self) -> &GradingEngine {
        &self.inner.engine
    }

    pub fn trainer(&self) -> &Arc<dyn ModelTrainer> {
        &self.inner.trainer
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.inner.notifier
    }
}
