use podium_node::demo::run_demo;
use podium_node::{NodeConfig, PodiumNode};
use podium_types::{EntityKind, RequestContext, Role, TenantId, UserId};
use tempfile::TempDir;

fn admin() -> RequestContext {
    RequestContext::new(TenantId::new("tenant-a"), UserId::new("admin"), Role::Admin)
}

fn config_in(dir: &TempDir) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node.data_dir = dir.path().to_path_buf();
    config
}

#[tokio::test]
async fn test_state_survives_restart_through_snapshot() {
    let dir = TempDir::new().unwrap();

    let node = PodiumNode::new(config_in(&dir)).await.unwrap();
    let event = node
        .services
        .catalog
        .create_event(&admin(), "Regional Finals")
        .await
        .unwrap();
    node.shutdown().await.unwrap();
    drop(node);

    let restarted = PodiumNode::new(config_in(&dir)).await.unwrap();
    let restored = restarted
        .services
        .catalog
        .get_event(&admin(), &event.id)
        .await
        .unwrap();
    assert_eq!(restored.name, "Regional Finals");

    let page = restarted.browse(EntityKind::Events, 0, 10).await.unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_snapshots_disabled() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.storage.snapshots_enabled = false;

    let node = PodiumNode::new(config).await.unwrap();
    assert!(node.snapshot().await.unwrap().is_none());
    node.shutdown().await.unwrap();
    assert!(!dir.path().join("snapshots").exists());
}

#[tokio::test]
async fn test_unsupported_backend_is_rejected() {
    let mut config = NodeConfig::default();
    config.storage.backend = "postgres".to_string();
    assert!(PodiumNode::new(config).await.is_err());
}

#[tokio::test]
async fn test_demo_ranks_contestants() {
    let winners = run_demo().await.unwrap();

    assert!(winners.board_certified);
    assert!(winners.can_show_winners);
    assert_eq!(winners.total_possible_score, Some(20.0));
    assert_eq!(winners.results.len(), 3);
    assert_eq!(winners.results[0].name, "Rowan Blake");
    assert_eq!(winners.results[0].total_score, 36.0);
    assert_eq!(winners.results[0].rank, 1);
    assert_eq!(winners.results[2].name, "Sasha Moreno");
}
