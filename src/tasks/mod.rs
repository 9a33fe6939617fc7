//! Background work executed by the dispatcher's worker pool.

mod handlers;

pub use handlers::{
    GradingHandler, PdfGenerationHandler, SheetProcessingHandler, TrainingHandler,
};

use std::sync::Arc;

use crate::core::state::AppState;
use crate::dispatch::JobType;

/// Binds every job type to its handler. Called once during startup, before
/// any job is submitted.
pub async fn register_handlers(state: &AppState) {
    let dispatcher = state.dispatcher();
    dispatcher
        .register_handler(
            JobType::SheetProcessing,
            Arc::new(SheetProcessingHandler::new(state.clone())),
        )
        .await;
    dispatcher
        .register_handler(JobType::Grading, Arc::new(GradingHandler::new(state.clone())))
        .await;
    dispatcher
        .register_handler(JobType::Training, Arc::new(TrainingHandler::new(state.clone())))
        .await;
    dispatcher
        .register_handler(
            JobType::PdfGeneration,
            Arc::new(PdfGenerationHandler::new(state.clone())),
        )
        .await;
}
