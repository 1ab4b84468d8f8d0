use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use price_change_engine::config::EngineConfig;
use price_change_engine::domain::price_change::{AdjustmentType, StoreId};
use price_change_engine::integration::{LoggingNotifier, Notifier, RedpandaNotifier, SimulatedPosClient};
use price_change_engine::metrics::{self, Metrics};
use price_change_engine::sequence::{self, InMemorySequenceGenerator, RedisSequenceGenerator, SequenceGenerator};
use price_change_engine::workflow::{PriceChangeRequest, PricingWorkflow};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Default to INFO, engine at DEBUG; override with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,price_change_engine=debug")),
        )
        .init();

    tracing::info!("🚀 Starting price change engine");

    let config = EngineConfig::from_env()?;
    tracing::info!(
        max_adjustment = %config.policy.max_adjustment,
        max_decrease_ratio = %config.policy.max_decrease_ratio,
        concurrency = config.execution.max_concurrency,
        outlet_attempts = config.execution.outlet_attempts,
        "Configuration loaded"
    );

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let result = actix_web::rt::System::new()
            .block_on(metrics::start_metrics_server(metrics_registry, metrics_port));
        if let Err(e) = result {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 2. Order numbering ===
    let mut local_sequence = None;
    let sequencer: Arc<dyn SequenceGenerator> = match &config.redis_url {
        Some(url) => {
            tracing::info!(url = %url, "Using Redis order sequence");
            Arc::new(RedisSequenceGenerator::connect(url, "price_change:sequence").await?)
        }
        None => {
            tracing::info!("Using in-memory order sequence");
            let generator = Arc::new(InMemorySequenceGenerator::new());
            local_sequence = Some(generator.clone());
            generator
        }
    };

    // === 3. Notifications ===
    let notifier: Arc<dyn Notifier> = match &config.kafka_brokers {
        Some(brokers) => {
            tracing::info!(brokers = %brokers, topic = %config.notification_topic, "Publishing notifications to Redpanda");
            Arc::new(RedpandaNotifier::new(brokers, config.notification_topic.as_str(), Some(metrics.clone()))?)
        }
        None => Arc::new(LoggingNotifier),
    };

    // === 4. Outlets: store 104 is offline ===
    let outlets = Arc::new(SimulatedPosClient::new().unavailable(StoreId(104)));

    let workflow = PricingWorkflow::new(&config, sequencer, outlets, notifier, metrics.clone());

    // a process-local counter resumes after today's stored orders
    if let Some(generator) = &local_sequence {
        workflow.seed_sequence(generator, sequence::today()).await?;
    }

    // === 5. Demonstrate a successful and a failed change ===
    let stores: Vec<StoreId> = (101..=103).map(StoreId).collect();
    let request = PriceChangeRequest {
        product_code: "LATTE".to_string(),
        product_name: "Caffè Latte".to_string(),
        specification: Some("Grande".to_string()),
        target_region: "EAST".to_string(),
        adjustment_type: AdjustmentType::Increase,
        adjustment_amount: dec!(2.00),
        change_reason: "Coffee bean cost increase".to_string(),
        effective_date: Utc::now(),
        affected_store_ids: stores,
        created_by: "pricing.manager".to_string(),
    };

    let order = workflow.create(request.clone()).await?;
    workflow.approve(&order.order_no, "regional.director").await?;
    let completed = workflow.execute(&order.order_no).await?;
    tracing::info!(order_no = %order.order_no, completed, "First change finished");

    let failing = PriceChangeRequest {
        product_code: "MOCHA".to_string(),
        product_name: "Caffè Mocha".to_string(),
        affected_store_ids: (102..=105).map(StoreId).collect(),
        ..request
    };
    let order = workflow.create(failing).await?;
    workflow.approve(&order.order_no, "regional.director").await?;
    let outcome = workflow.execute_with_report(&order.order_no).await?;
    tracing::info!(
        order_no = %order.order_no,
        completed = outcome.completed(),
        reason = ?outcome.order.failure_reason(),
        rolled_back = ?outcome.order.rolled_back_stores,
        "Second change finished"
    );

    for transition in workflow.transitions(&order.order_no).await? {
        tracing::info!(
            sequence = transition.sequence,
            actor = ?transition.actor,
            from = ?transition.from.as_ref().map(|s| s.name()),
            to = %transition.to,
            "Transition"
        );
    }

    for record in workflow.history("LATTE", "EAST").await {
        tracing::info!(
            store_id = ?record.store_id,
            change_type = %record.change_type,
            "{}",
            record.describe()
        );
    }

    let created_today = workflow.orders_created_on(sequence::today()).await?;
    tracing::info!(created_today, "🎉 Demo complete");

    Ok(())
}
