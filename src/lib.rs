pub mod cache;
pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::cache::CacheService;
use crate::services::{
    ai_service::AiService, batch_service::BatchService, quiz_service::QuizService,
    result_service::ResultService,
};
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: CacheService,
    pub batch_service: BatchService,
    pub quiz_service: QuizService,
    pub result_service: ResultService,
    pub ai_service: AiService,
}

impl AppState {
    pub fn new(pool: PgPool, cache: CacheService) -> Self {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        let batch_service = BatchService::new(pool.clone(), cache.clone());
        let quiz_service = QuizService::new(pool.clone(), cache.clone());
        let result_service = ResultService::new(pool.clone(), cache.clone());
        let ai_service = AiService::new(config.groq_api_key.clone(), http_client);

        Self {
            pool,
            cache,
            batch_service,
            quiz_service,
            result_service,
            ai_service,
        }
    }
}
