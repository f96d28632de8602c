//! End-to-end requests through `RemovalService` with scripted model sessions

mod common;

use clothing_bgremove::{
    DefaultRemoverFactory, InitMode, RegistryConfig, RemovalOptions, RemovalService,
    RemoverRegistry, Role,
};
use common::{write_png, ScriptedProvider};
use std::sync::Arc;
use tempfile::TempDir;

fn service(provider: Arc<ScriptedProvider>, config: RegistryConfig) -> RemovalService {
    let init_mode = config.init_mode;
    let factory = DefaultRemoverFactory::with_provider(config, provider);
    RemovalService::new(Arc::new(RemoverRegistry::new(Arc::new(factory))), init_mode)
}

#[tokio::test]
async fn test_model_path_reports_model_name() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "coat.png", 120, 80);
    let provider = Arc::new(ScriptedProvider::available());
    let service = service(provider.clone(), RegistryConfig::default());

    let outcome = service
        .process("advanced", &input, RemovalOptions::default(), Some("u2net_cloth_seg"))
        .await
        .unwrap();

    assert!(!outcome.used_fallback);
    assert!(outcome.model_used.contains("clothing"));
    assert!(outcome.model_used.contains("u2net_cloth_seg"));
    assert!(outcome.size_bytes > 0);

    // Threshold session keeps pixels whose red channel is above 128
    let result = image::open(&outcome.output_path).unwrap().to_rgba8();
    assert_eq!(result.get_pixel(10, 40)[3], 0);
    assert_eq!(result.get_pixel(100, 40)[3], 255);
    assert_eq!(provider.acquisitions(), 1);
}

#[tokio::test]
async fn test_unavailable_model_downgrades_when_allowed() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "dress.png", 120, 80);
    let service = service(
        Arc::new(ScriptedProvider::unavailable()),
        RegistryConfig::default(),
    );

    let outcome = service
        .process("ultra", &input, RemovalOptions::default(), None)
        .await
        .unwrap();
    assert!(outcome.used_fallback);
    assert_eq!(outcome.model_used, "simple_ultra");

    let status = &service.status_snapshot()[&Role::Ultra];
    assert!(status.ready);
    assert!(status.used_fallback);
    assert!(status
        .degraded_reason
        .as_deref()
        .is_some_and(|reason| reason.contains("not installed")));

    let json = serde_json::to_value(status).unwrap();
    assert!(json["degraded_reason"]
        .as_str()
        .unwrap()
        .contains("u2net_cloth_seg"));
}

#[tokio::test]
async fn test_unavailable_model_fails_when_strict() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "dress.png", 32, 32);
    let provider = Arc::new(ScriptedProvider::unavailable());
    let config = RegistryConfig::builder()
        .allow_fallback(false)
        .build()
        .unwrap();
    let service = service(provider.clone(), config);

    for attempt in 1..=2 {
        let err = service
            .process("advanced", &input, RemovalOptions::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "backend_unavailable");
        assert!(err.to_string().contains("not installed"));
        assert_eq!(provider.acquisitions(), attempt);
    }
    assert!(!service.status_snapshot()[&Role::Advanced].ready);
}

#[tokio::test]
async fn test_decode_failure_on_ready_remover() {
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("photo.jpg");
    std::fs::write(&bogus, b"\xff\xd8 truncated").unwrap();
    let service = service(
        Arc::new(ScriptedProvider::available()),
        RegistryConfig::default(),
    );

    let err = service
        .process("ultra", &bogus, RemovalOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "decode_error");
    // The remover itself is fine
    assert!(service.status_snapshot()[&Role::Ultra].ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_remover() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::available());
    let service = service(provider.clone(), RegistryConfig::default());

    let inputs: Vec<_> = (0..6)
        .map(|i| write_png(dir.path(), &format!("item_{i}.png"), 40 + i, 30))
        .collect();

    let handles: Vec<_> = inputs
        .iter()
        .cloned()
        .map(|input| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .process("ultra", &input, RemovalOptions::default(), None)
                    .await
            })
        })
        .collect();

    let mut outputs = Vec::new();
    for handle in handles {
        outputs.push(handle.await.unwrap().unwrap().output_path);
    }

    outputs.sort();
    outputs.dedup();
    assert_eq!(outputs.len(), inputs.len());
    assert_eq!(provider.acquisitions(), 1);
}

#[tokio::test]
async fn test_eager_start_initializes_all_roles() {
    let provider = Arc::new(ScriptedProvider::available());
    let config = RegistryConfig::builder()
        .init_mode(InitMode::Eager)
        .advanced_sub_model("u2netp")
        .build()
        .unwrap();
    let service = service(provider.clone(), config);

    service.start().await.unwrap();
    let snapshot = service.status_snapshot();
    assert_eq!(
        snapshot[&Role::Ultra].model_name.as_deref(),
        Some("clothing_optimized")
    );
    assert_eq!(
        snapshot[&Role::Advanced].model_name.as_deref(),
        Some("clothing_u2netp")
    );
    assert_eq!(provider.acquisitions(), 2);
}

#[tokio::test]
async fn test_options_from_client_json() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "tee.png", 24, 24);
    let service = service(
        Arc::new(ScriptedProvider::unavailable()),
        RegistryConfig::default(),
    );

    let options = RemovalOptions::from_json(&serde_json::json!({
        "positioning_mode": "center",
        "create_variants": true,
        "unknown_flag": 3
    }))
    .unwrap();

    let outcome = service
        .process("advanced", &input, options, None)
        .await
        .unwrap();
    assert_eq!(outcome.model_used, "simple_u2net_cloth_seg");
}

#[tokio::test]
async fn test_unknown_role_string() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "sock.png", 8, 8);
    let provider = Arc::new(ScriptedProvider::available());
    let service = service(provider.clone(), RegistryConfig::default());

    let err = service
        .process("basic", &input, RemovalOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_role");
    assert_eq!(provider.acquisitions(), 0);
}
