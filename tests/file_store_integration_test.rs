use anyhow::Result;
use retrofit_cascade::{
    standard_registry, BuildingProfile, CascadeEngine, CascadeStatus, EngineConfig, EngineError,
    JsonFileRecordStore, OverrideSet, RecordStore, ServiceName,
};
use std::sync::Arc;
use tempfile::TempDir;

fn file_engine(dir: &TempDir) -> CascadeEngine<JsonFileRecordStore> {
    let config = EngineConfig::default();
    CascadeEngine::new(
        Arc::new(JsonFileRecordStore::new(dir.path())),
        standard_registry(),
        config.executor_options(),
    )
}

#[tokio::test]
async fn test_results_survive_store_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    {
        let engine = file_engine(&dir);
        engine
            .create_calculation("bldg-001", BuildingProfile::new(48, 40_000.0))
            .await?;
        let report = engine.execute_all("bldg-001").await?;
        assert_eq!(report.status(), CascadeStatus::Succeeded);
    }

    assert!(dir.path().join("bldg-001.json").exists());

    let reopened = file_engine(&dir);
    let status = reopened.status("bldg-001").await?;
    assert!(status.all_services_executed);
    assert_eq!(status.last_calculated_service, Some(ServiceName::PropertyValue));

    let record = reopened.store().load("bldg-001").await?;
    assert_eq!(record.revision, 6);
    assert!(record.property_value.is_some());
    Ok(())
}

#[tokio::test]
async fn test_stale_writer_gets_conflict() -> Result<()> {
    let dir = TempDir::new()?;
    let first = file_engine(&dir);
    let second = file_engine(&dir);

    first
        .create_calculation("shared", BuildingProfile::new(12, 9_600.0))
        .await?;
    let stale = second.store().load("shared").await?;

    first.execute_all("shared").await?.into_result()?;

    let result = second.store().save("shared", &stale).await;
    assert!(matches!(
        result,
        Err(EngineError::Conflict {
            expected: 0,
            actual: 6,
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_cascades_on_same_id_are_serialized() -> Result<()> {
    let dir = TempDir::new()?;
    let engine = Arc::new(file_engine(&dir));
    engine
        .create_calculation("busy", BuildingProfile::new(30, 25_000.0))
        .await?;
    engine.execute_all("busy").await?.into_result()?;

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .execute_service("busy", "energy", OverrideSet::new().with("electricityRate", 0.3), true, None)
                .await
        })
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .execute_service("busy", "financial", OverrideSet::new().with("loanTermYears", 15), true, None)
                .await
        })
    };

    let report_a = a.await??;
    let report_b = b.await??;
    assert!(report_a.is_success());
    assert!(report_b.is_success());

    // 6 + energy 串聯 5 + financial 串聯 3
    let record = engine.store().load("busy").await?;
    assert_eq!(record.revision, 14);
    Ok(())
}

#[tokio::test]
async fn test_missing_calculation_and_bad_ids() -> Result<()> {
    let dir = TempDir::new()?;
    let engine = file_engine(&dir);

    assert!(matches!(
        engine.status("nope").await,
        Err(EngineError::NotFound(id)) if id == "nope"
    ));
    assert!(matches!(
        engine.execute_all("nope").await,
        Err(EngineError::NotFound(_))
    ));
    assert!(engine.store().load("../escape").await.is_err());
    Ok(())
}
