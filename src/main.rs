use anyhow::Context;
use clap::Parser;
use retrofit_cascade::config::{Command, RunArgs};
use retrofit_cascade::utils::error::{EngineError, ErrorSeverity};
use retrofit_cascade::utils::{logger, validation::Validate};
use retrofit_cascade::{
    standard_registry, BuildingProfile, CascadeEngine, CascadeReport, CliConfig, EngineConfig,
    ExecutionPlanner, InMemoryRecordStore, JsonFileRecordStore, OverrideSet, RecordStore,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path))?,
        None => EngineConfig::default(),
    };

    // 初始化日誌
    if config.logging.json {
        logger::init_json_logger(cli.verbose, config.logging.level.as_deref());
    } else {
        logger::init_cli_logger(cli.verbose, config.logging.level.as_deref());
    }

    tracing::info!("🚀 Starting retrofit-cascade");
    if cli.verbose {
        tracing::debug!("Engine config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let result = if config.is_memory_store() {
        tracing::warn!("⚠️ In-memory store selected; records are discarded on exit");
        let engine = build_engine(Arc::new(InMemoryRecordStore::new()), &config);
        dispatch(&engine, cli.command).await
    } else {
        tracing::info!("📁 Record store: {}", config.store.path);
        let engine = build_engine(Arc::new(JsonFileRecordStore::new(&config.store.path)), &config);
        dispatch(&engine, cli.command).await
    };

    if let Err(e) = result {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        if e.is_pre_execution() {
            // 驗證階段即被拒絕，失敗的服務沒有寫入任何結果
            eprintln!("ℹ️ 失敗步驟在執行前即被拒絕，紀錄未被修改");
        }

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn build_engine<S: RecordStore>(store: Arc<S>, config: &EngineConfig) -> CascadeEngine<S> {
    CascadeEngine::new(store, standard_registry(), config.executor_options())
}

async fn dispatch<S: RecordStore>(
    engine: &CascadeEngine<S>,
    command: Command,
) -> retrofit_cascade::Result<()> {
    match command {
        Command::Init { id, building } => {
            let content = tokio::fs::read_to_string(&building).await?;
            let profile: BuildingProfile = serde_json::from_str(&content)?;
            let record = engine.create_calculation(&id, profile).await?;
            println!("✅ Created calculation '{}'", record.calculation_id);
        }
        Command::RunAll { id } => {
            let report = engine.execute_all(&id).await?;
            print_report(report)?;
        }
        Command::Run(args) => {
            let overrides = parse_overrides(&args)?;
            let report = engine
                .execute_service(
                    &args.id,
                    &args.service,
                    overrides,
                    !args.no_cascade,
                    args.actor.as_deref(),
                )
                .await?;
            print_report(report)?;
        }
        Command::Status { id } => {
            let status = engine.status(&id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Plan {
            service,
            no_cascade,
            all,
        } => {
            let planner = ExecutionPlanner::default();
            let plan = match service {
                Some(service) if !all => planner.plan_from_name(&service, !no_cascade)?,
                _ => planner.plan_all()?,
            };
            tracing::info!("🔍 DRY RUN - nothing will be executed");
            println!("{}", plan);
        }
        Command::Show { id } => {
            let record = engine.store().load(&id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}

fn parse_overrides(args: &RunArgs) -> retrofit_cascade::Result<OverrideSet> {
    let mut overrides = OverrideSet::new();
    for assignment in &args.overrides {
        overrides
            .insert_assignment(assignment)
            .ok_or_else(|| EngineError::InvalidConfigValueError {
                field: "--set".to_string(),
                value: assignment.clone(),
                reason: "Expected FIELD=VALUE".to_string(),
            })?;
    }
    Ok(overrides)
}

fn print_report(report: CascadeReport) -> retrofit_cascade::Result<()> {
    println!("{}", serde_json::to_string_pretty(&report.summary())?);
    for step in &report.steps {
        for warning in &step.warnings {
            println!("⚠️ {}: {}", step.service, warning);
        }
    }
    if !report.not_attempted().is_empty() {
        println!("⏭️ Not attempted: {:?}", report.not_attempted());
    }
    report.into_result().map(|_| ())
}
