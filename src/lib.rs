pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::core::config::{Settings, StorageBackend};
use crate::core::{state::AppState, telemetry};
use crate::repositories::{seed, MemoryStore, PgStore};
use crate::services::answer_codec::AnswerCodec;
use crate::services::submission_lifecycle::ExamEngine;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let engine = build_engine(&settings).await?;
    let state = AppState::new(settings, engine);

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        backend = %state.settings().database().backend.as_str(),
        "Exam engine API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}

async fn build_engine(settings: &Settings) -> anyhow::Result<ExamEngine> {
    let codec = AnswerCodec::new(settings.engine().answer_payload_max_chars);
    let bank_seed = match settings.question_bank().seed_path.as_deref() {
        Some(path) => Some(seed::load(Path::new(path)).await?),
        None => None,
    };

    match settings.database().backend {
        StorageBackend::Postgres => {
            let pool = db::init_pool(settings).await.context("failed to connect to Postgres")?;
            db::run_migrations(&pool).await.context("failed to apply migrations")?;

            if let Some(bank_seed) = bank_seed {
                let summary = seed::import_into_postgres(&pool, &bank_seed).await?;
                tracing::info!(
                    questions = summary.questions,
                    papers = summary.papers,
                    "Question bank seed imported"
                );
            }

            let store = Arc::new(PgStore::new(pool));
            Ok(ExamEngine::new(store.clone(), store, codec))
        }
        StorageBackend::InMemory => {
            let store = Arc::new(MemoryStore::new());
            match bank_seed {
                Some(bank_seed) => {
                    let summary = seed::apply_to_memory(&store, bank_seed).await;
                    tracing::info!(
                        questions = summary.questions,
                        papers = summary.papers,
                        "Question bank seed loaded into memory"
                    );
                }
                None => {
                    tracing::warn!("In-memory store started without QUESTION_BANK_SEED; no papers available");
                }
            }

            Ok(ExamEngine::new(store.clone(), store, codec))
        }
    }
}
