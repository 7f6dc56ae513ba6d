use std::time::Duration;

use pretty_assertions::assert_eq;
use zqlz_core::ZqlzError;

use super::*;
use crate::state::Role;
use crate::testing::{MockCluster, init_test_logging, served_by};

fn three_hosts() -> MockCluster {
    MockCluster::new(&[("db-1", false), ("db-2", true), ("db-3", true)])
}

async fn open(cluster: &MockCluster, max_attempts: u32) -> FailoverConnection {
    init_test_logging();
    let config = FailoverConfig::new(cluster.hosts())
        .with_credentials("app", Some("secret".into()))
        .with_max_attempts(max_attempts);
    FailoverConnection::open(config, cluster.connector())
        .await
        .unwrap()
}

fn count(statements: &[String], text: &str) -> usize {
    statements.iter().filter(|s| s.as_str() == text).count()
}

/// Take the primary down and promote db-3
fn promote_db3(cluster: &MockCluster) {
    cluster.set_down("db-1");
    cluster.set_read_only("db-3", false);
}

#[tokio::test]
async fn test_open_single_host() {
    init_test_logging();
    let cluster = MockCluster::new(&[("db-1", false)]);
    let config = FailoverConfig::new(cluster.hosts());

    let conn = FailoverConnection::open(config, cluster.connector())
        .await
        .unwrap();

    assert_eq!(conn.current_host(), cluster.host("db-1"));
    assert_eq!(conn.phase(), FailoverPhase::Stable);
    let result = conn.query("SELECT @@hostname").await.unwrap();
    assert_eq!(served_by(&result).as_deref(), Some("db-1"));
}

#[tokio::test]
async fn test_open_rejects_invalid_config() {
    let cluster = three_hosts();
    let err = FailoverConnection::open(FailoverConfig::new(vec![]), cluster.connector())
        .await
        .unwrap_err();
    assert!(matches!(err, ZqlzError::Configuration(_)));
}

#[tokio::test]
async fn test_open_fails_when_no_host_answers() {
    let cluster = three_hosts();
    for name in ["db-1", "db-2", "db-3"] {
        cluster.set_down(name);
    }

    let err = FailoverConnection::open(FailoverConfig::new(cluster.hosts()), cluster.connector())
        .await
        .unwrap_err();
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn test_sql_errors_bypass_failover() {
    let cluster = three_hosts();
    let conn = open(&cluster, 120).await;

    let err = conn.query("BAD SELEKT").await.unwrap_err();

    assert!(matches!(err, ZqlzError::Query(_)));
    assert_eq!(conn.attempt_count(), 1);
    assert_eq!(conn.phase(), FailoverPhase::Stable);
    assert!(!conn.state().is_failed(Role::Primary));
}

#[tokio::test]
async fn test_failover_is_transparent() {
    let cluster = three_hosts();
    let conn = open(&cluster, 120).await;
    promote_db3(&cluster);

    let result = conn
        .execute_statement("UPDATE stock SET qty = qty - 1")
        .await
        .unwrap();

    assert_eq!(result.affected_rows, 1);
    assert_eq!(conn.current_host(), cluster.host("db-3"));
    assert_eq!(
        count(&cluster.statements("db-3"), "UPDATE stock SET qty = qty - 1"),
        1
    );
    assert_eq!(
        count(&cluster.statements("db-1"), "UPDATE stock SET qty = qty - 1"),
        0
    );
    assert_eq!(conn.phase(), FailoverPhase::Stable);
}

#[tokio::test]
async fn test_failed_replay_is_not_retried() {
    let cluster = three_hosts();
    let conn = open(&cluster, 120).await;
    promote_db3(&cluster);

    let err = conn.query("BAD QUERY").await.unwrap_err();

    assert!(matches!(err, ZqlzError::Query(_)));
    assert_eq!(count(&cluster.statements("db-3"), "BAD QUERY"), 1);
}

#[tokio::test]
async fn test_session_state_follows_the_new_primary() {
    let cluster = three_hosts();
    let conn = open(&cluster, 120).await;
    conn.set_database("orders").await.unwrap();
    conn.set_auto_commit(false).await.unwrap();
    promote_db3(&cluster);

    conn.query("SELECT * FROM items").await.unwrap();

    let statements = cluster.statements("db-3");
    let use_db = statements.iter().position(|s| s == "USE `orders`");
    let autocommit = statements.iter().position(|s| s == "SET autocommit=0");
    let query = statements.iter().position(|s| s == "SELECT * FROM items");
    assert!(use_db.is_some() && autocommit.is_some());
    assert!(use_db < query && autocommit < query);
}

#[tokio::test]
async fn test_read_only_routing() {
    let cluster = three_hosts();
    let conn = open(&cluster, 120).await;

    conn.set_read_only(true).await.unwrap();
    assert_eq!(conn.current_host(), cluster.host("db-2"));
    let result = conn.query("SELECT 1 FROM dual").await.unwrap();
    assert_eq!(served_by(&result).as_deref(), Some("db-2"));
    assert_eq!(
        count(
            &cluster.statements("db-2"),
            "SET SESSION TRANSACTION READ ONLY"
        ),
        1
    );

    conn.set_read_only(false).await.unwrap();
    assert_eq!(conn.current_host(), cluster.host("db-1"));
}

#[tokio::test]
async fn test_events_describe_the_failover() {
    let cluster = three_hosts();
    let conn = open(&cluster, 120).await;
    let mut events = conn.subscribe();
    promote_db3(&cluster);

    conn.ping().await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(
        received,
        vec![
            FailoverEvent::RoleFailed {
                role: Role::Primary,
                host: cluster.host("db-1"),
            },
            FailoverEvent::SearchStarted { attempt: 2 },
            FailoverEvent::RoleRestored {
                role: Role::Primary,
                host: cluster.host("db-3"),
            },
            FailoverEvent::Stable,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_connection_stays_down() {
    let cluster = MockCluster::new(&[("db-1", false), ("db-2", true)]);
    let conn = open(&cluster, 3).await;
    cluster.set_down("db-1");
    cluster.set_down("db-2");

    // Nothing to fail over to yet, the original error comes back
    let err = conn.query("SELECT 1").await.unwrap_err();
    assert!(err.is_connectivity());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(conn.phase(), FailoverPhase::Exhausted);
    assert_eq!(conn.attempt_count(), 3);

    let ops = cluster.network_ops();
    for _ in 0..1000 {
        let err = conn.query("SELECT 1").await.unwrap_err();
        assert!(err.is_terminal());
    }
    assert_eq!(cluster.network_ops(), ops);
    assert_eq!(conn.attempt_count(), 3);
}

#[tokio::test]
async fn test_closed_connection_refuses_calls() {
    let cluster = three_hosts();
    let conn = open(&cluster, 120).await;

    conn.commit().await.unwrap();
    conn.rollback().await.unwrap();
    assert_eq!(count(&cluster.statements("db-1"), "COMMIT"), 1);

    conn.close().await.unwrap();
    assert!(conn.is_closed());

    let ops = cluster.network_ops();
    let err = conn.ping().await.unwrap_err();
    assert!(matches!(err, ZqlzError::Connection(_)));
    assert_eq!(cluster.network_ops(), ops);
}
