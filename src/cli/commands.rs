// src/cli/commands.rs
// Command dispatch for the operational CLI. Each command builds its own
// CoreRuntime against the configured backends; this binary never invokes
// chat or enrichment live, so it wires the deterministic fallback
// enrichment and the echo model capability rather than a real provider
// client (mirroring CoreRuntime::for_tests's choice of fakes, but against
// real storage).

use super::args::{CliArgs, Command, OutputFormat};
use crate::config::CoreConfig;
use crate::enrichment::fallback::DeterministicFallbackEnrichment;
use crate::gateway::fake::EchoModelCapability;
use crate::runtime::CoreRuntime;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

const FAR_PAST_LIMIT: i64 = 1_000_000;

pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    match args.command {
        Command::Init => init(args.output_format).await,
        Command::Migrate { batch_size } => migrate(args.output_format, batch_size).await,
        Command::Backup { out_dir } => backup(args.output_format, out_dir).await,
        Command::VerifyInvariants => verify_invariants(args.output_format).await,
        Command::Reindex => reindex(args.output_format).await,
        Command::DumpProfile { user } => dump_profile(args.output_format, &user).await,
    }
}

async fn build_runtime() -> anyhow::Result<CoreRuntime> {
    let config = CoreConfig::from_env();
    CoreRuntime::new(
        config,
        Arc::new(DeterministicFallbackEnrichment),
        Arc::new(EchoModelCapability),
        vec![],
    )
    .await
}

async fn init(format: OutputFormat) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;
    std::fs::create_dir_all(&runtime.config.store.cold_store_dir)?;
    report(format, "init", serde_json::json!({ "status": "ready" }));
    Ok(())
}

async fn migrate(format: OutputFormat, batch_size: i64) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;
    let migrated = runtime.run_migration_pass(batch_size).await?;
    report(format, "migrate", serde_json::json!({ "migrated": migrated }));
    Ok(())
}

async fn backup(format: OutputFormat, out_dir: std::path::PathBuf) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;
    std::fs::create_dir_all(&out_dir)?;

    let since = Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now);
    let users = runtime.store.distinct_user_ids().await?;
    let mut total = 0usize;
    for user_id in &users {
        let observations = runtime.store.recent_for_user(user_id, since, FAR_PAST_LIMIT).await?;
        let path = out_dir.join(format!("{user_id}.jsonl"));
        let mut buf = String::new();
        for obs in &observations {
            buf.push_str(&serde_json::to_string(obs)?);
            buf.push('\n');
        }
        std::fs::write(path, buf)?;
        total += observations.len();
    }

    report(
        format,
        "backup",
        serde_json::json!({ "users": users.len(), "observations": total, "out_dir": out_dir.display().to_string() }),
    );
    Ok(())
}

async fn verify_invariants(format: OutputFormat) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;
    let since = Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now);
    let users = runtime.store.distinct_user_ids().await?;

    let mut violations = Vec::new();
    for user_id in &users {
        let observations = runtime.store.recent_for_user(user_id, since, FAR_PAST_LIMIT).await?;
        for obs in &observations {
            if !(0.0..=1.0).contains(&obs.influence_weight) {
                violations.push(format!("{}: influence_weight {} out of [0,1]", obs.id, obs.influence_weight));
            }
            if !(0.0..=1.0).contains(&obs.quality_score) {
                violations.push(format!("{}: quality_score {} out of [0,1]", obs.id, obs.quality_score));
            }
            let norm: f32 = obs.embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if !obs.embedding.is_empty() && (norm - 1.0).abs() > 1e-3 {
                violations.push(format!("{}: embedding norm {norm} not unit length", obs.id));
            }
        }

        let components = runtime.profile_engine.load_profile(user_id).await?;
        let weight_sum: f32 = components.iter().map(|c| c.normalized_weight).sum();
        if !components.is_empty() && (weight_sum - 1.0).abs() > 1e-3 {
            violations.push(format!("{user_id}: normalized_weight sum {weight_sum} != 1"));
        }
    }

    report(
        format,
        "verify-invariants",
        serde_json::json!({ "users_checked": users.len(), "violations": violations }),
    );
    Ok(())
}

async fn reindex(format: OutputFormat) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;
    let since = Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now);
    let users = runtime.store.distinct_user_ids().await?;

    let vector_index = runtime.store.vector_index();
    let full_text_index = runtime.store.full_text_index();
    let composite_index = runtime.store.composite_index();

    let mut reindexed = 0usize;
    for user_id in &users {
        let observations = runtime.store.recent_for_user(user_id, since, FAR_PAST_LIMIT).await?;
        for obs in &observations {
            vector_index.upsert(obs).await?;
            full_text_index.index(obs);
            composite_index.upsert(obs);
            reindexed += 1;
        }
    }

    report(format, "reindex", serde_json::json!({ "users": users.len(), "observations_reindexed": reindexed }));
    Ok(())
}

async fn dump_profile(format: OutputFormat, user_id: &str) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;
    let components = runtime.profile_engine.load_profile(user_id).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&components)?),
        OutputFormat::Text => {
            if components.is_empty() {
                println!("no profile components for user {user_id}");
            }
            for c in &components {
                println!(
                    "{:<24} weight={:.3} priority={:?} {}",
                    format!("{:?}", c.component_type),
                    c.normalized_weight,
                    c.priority,
                    c.description
                );
            }
        }
    }
    Ok(())
}

fn report(format: OutputFormat, command: &str, payload: serde_json::Value) {
    match format {
        OutputFormat::Json => println!("{payload}"),
        OutputFormat::Text => println!("{command}: {payload}"),
    }
}
