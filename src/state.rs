use std::sync::Arc;

use reqwest::Client;

use crate::core::config::Settings;
use crate::core::errors::ApiError;
use crate::llm::{ChatModel, OpenAiProvider};
use crate::pipeline::AnswerPipeline;
use crate::tools::search::{SearchProvider, SerperProvider};

/// Global application state shared across routes and connections.
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub pipeline: AnswerPipeline,
}

impl AppState {
    /// Wires the concrete providers from settings.
    pub fn initialize(settings: Settings) -> Result<Arc<Self>, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::internal)?;

        let model: Arc<dyn ChatModel> = Arc::new(OpenAiProvider::new(
            settings.llm_base_url.clone(),
            settings.llm_api_key.clone(),
            client.clone(),
        ));
        let search: Arc<dyn SearchProvider> = Arc::new(SerperProvider::new(
            settings.search_base_url.clone(),
            settings.search_api_key.clone(),
            client.clone(),
        ));

        Ok(Self::with_providers(settings, model, search, client))
    }

    /// Builds state from explicit collaborators. Tests inject fakes here.
    pub fn with_providers(
        settings: Settings,
        model: Arc<dyn ChatModel>,
        search: Arc<dyn SearchProvider>,
        client: Client,
    ) -> Arc<Self> {
        let pipeline = AnswerPipeline::new(settings.clone(), model, search, client);
        Arc::new(AppState { settings, pipeline })
    }
}
