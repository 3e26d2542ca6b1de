use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recon_agent::{MissionExecutor, MissionRunner};
use recon_api::{
    config::Config,
    middleware::logging,
    routes::{agent, chat, health},
    state::AppState,
};
use recon_llm::{
    ClientFactory, GeminiConfig, GroqConfig, LlmClient, ProviderConfig, ProviderDetails,
};
use recon_memory::{
    ChunkParams, DocumentStore, Embedder, FastEmbedder, MemoryIngestor, QdrantBackend, RagService,
};
use recon_persist::PersistClient;
use recon_tools::{
    ActionConfig, ActionDispatcher, BrowserScraper, DuckDuckGoClient, HttpActionDispatcher,
    PageScraper, ScrapeConfig, SearchClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("starting recon api server");

    // LLM gateway singleton
    let llm = build_llm_client(&config)?;
    tracing::info!(provider = llm.provider(), "llm gateway ready");

    // Embeddings and vector store
    tracing::info!(model = %config.memory.embedding_model, "loading embedding model");
    let embedder: Arc<dyn Embedder> = Arc::new(
        FastEmbedder::new(&config.memory.embedding_model)
            .map_err(|e| anyhow::anyhow!("embedder init failed: {}", e))?,
    );

    tracing::info!(url = %config.memory.qdrant_url, "connecting to vector store");
    let backend = QdrantBackend::connect(&config.memory.qdrant_url, embedder.dimension())
        .await
        .map_err(|e| anyhow::anyhow!("vector store init failed: {}", e))?;
    let store = Arc::new(DocumentStore::new(Arc::new(backend)));

    let ingestor = Arc::new(
        MemoryIngestor::new(Arc::clone(&embedder), Arc::clone(&store)).with_params(ChunkParams {
            chunk_size: config.memory.chunk_size,
            overlap: config.memory.chunk_overlap,
        }),
    );

    // Relational audit log
    tracing::info!("connecting to relational store");
    let persist = PersistClient::connect(&config.database_url).await?;

    // Research tools
    let search: Arc<dyn SearchClient> = Arc::new(DuckDuckGoClient::new(Duration::from_secs(
        config.tools.search_timeout_secs,
    )));
    let scraper: Arc<dyn PageScraper> = Arc::new(
        BrowserScraper::new(ScrapeConfig {
            total_timeout: Duration::from_secs(config.tools.scrape_timeout_secs),
            sandbox: config.tools.browser_sandbox,
            ..ScrapeConfig::default()
        })
        .with_ingestor(Arc::clone(&ingestor)),
    );
    let actions: Arc<dyn ActionDispatcher> = Arc::new(HttpActionDispatcher::new(ActionConfig {
        notion_token: config.notion_token.clone(),
        notion_parent_page_id: config.actions.notion_parent_page_id.clone(),
        email_endpoint: config.actions.email_endpoint.clone(),
        email_to: config.actions.email_to.clone(),
    }));

    // Mission executor and RAG service
    let executor = Arc::new(MissionExecutor::new(
        Arc::clone(&llm),
        search,
        scraper,
        actions,
        persist.clone(),
        ingestor,
    ));
    let runner = MissionRunner::new(executor);
    let rag = Arc::new(RagService::new(
        Arc::clone(&embedder),
        Arc::clone(&store),
        Arc::clone(&llm),
    ));

    let state = AppState::new(config.clone(), persist, llm, store, rag, runner);
    let app = build_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_llm_client(config: &Config) -> anyhow::Result<Arc<dyn LlmClient>> {
    let details = match config.llm.provider.as_str() {
        "gemini" => ProviderDetails::Gemini(GeminiConfig {
            api_key: config.gemini_api_key.clone(),
            model_candidates: if config.llm.model.is_empty() {
                Vec::new()
            } else {
                vec![config.llm.model.clone()]
            },
            max_payload_bytes: config.llm.max_payload_bytes,
            timeout_secs: config.llm.timeout_secs,
        }),
        "groq" => ProviderDetails::Groq(GroqConfig {
            api_key: config.groq_api_key.clone(),
            model: config.llm.model.clone(),
            max_payload_bytes: config.llm.max_payload_bytes,
            timeout_secs: config.llm.timeout_secs,
        }),
        other => anyhow::bail!("unknown llm provider: {}", other),
    };

    ClientFactory::create_client(ProviderConfig { details })
        .map_err(|e| anyhow::anyhow!("llm client init failed: {}", e))
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness))
        // Agent
        .route("/agent/analyze", post(agent::analyze_mission))
        .route("/agent/execute", post(agent::execute_mission))
        .route("/agent/execute/stream", post(agent::execute_mission_stream))
        .route("/agent/reports", get(agent::get_reports))
        .route("/agent/stats", get(agent::get_stats))
        // Chat
        .route("/chat/ask", post(chat::ask_question))
        .route("/chat/conversations", get(chat::list_conversations))
        .route("/chat/conversations/:conversation_id", get(chat::get_conversation))
        .route(
            "/chat/conversations/:conversation_id",
            delete(chat::delete_conversation),
        )
        .route(
            "/chat/conversations/:conversation_id/title",
            patch(chat::update_title),
        )
        .route("/chat/missions", get(chat::list_missions));

    Router::new()
        .merge(api_routes)
        .layer(middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(Duration::from_secs(300)))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let mut cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors = cors.allow_origin(Any);
        } else {
            for origin in &config.cors.origins {
                if let Ok(parsed_origin) = origin.parse::<axum::http::HeaderValue>() {
                    cors = cors.allow_origin(parsed_origin);
                }
            }
        }

        cors
    } else {
        CorsLayer::permissive()
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
