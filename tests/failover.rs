//! End-to-end failover behavior against a scripted protocol layer.

use broker_connect::{
    AddressListBehavior, AttemptError, BrokerAddress, CancelToken, ConnectConfig, ConnectError,
    ConnectionCreator, ConnectionShape, Connector, Credentials,
};
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// Connection handle produced by the scripted connector, recording what the
/// protocol layer was asked for.
#[derive(Debug)]
struct MockConnection {
    address: String,
    shape: ConnectionShape,
    username: Option<String>,
    client_id: Option<String>,
}

/// Connector whose per-attempt outcome is decided by a closure receiving the
/// endpoint and the overall attempt index. Every attempt is logged in order.
struct ScriptedConnector<F> {
    counter: AtomicUsize,
    log: Arc<Mutex<Vec<String>>>,
    script: F,
}

impl<F> ScriptedConnector<F>
where
    F: Fn(&BrokerAddress, usize) -> Result<(), AttemptError> + Send + Sync,
{
    fn new(script: F) -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                counter: AtomicUsize::new(0),
                log: Arc::clone(&log),
                script,
            },
            log,
        )
    }
}

impl<F> Connector for ScriptedConnector<F>
where
    F: Fn(&BrokerAddress, usize) -> Result<(), AttemptError> + Send + Sync,
{
    type Connection = MockConnection;

    fn connect<'a>(
        &'a self,
        shape: ConnectionShape,
        address: &'a BrokerAddress,
        credentials: &'a Credentials,
        client_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<MockConnection, AttemptError>> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(address.to_string());
        let outcome = (self.script)(address, n);
        let connection = MockConnection {
            address: address.to_string(),
            shape,
            username: credentials.username().map(str::to_string),
            client_id: client_id.map(str::to_string),
        };
        Box::pin(async move { outcome.map(|()| connection) })
    }
}

fn unreachable() -> AttemptError {
    AttemptError::Unreachable("connection refused".into())
}

#[tokio::test]
async fn ordered_failover_binds_second_endpoint() {
    let (connector, log) = ScriptedConnector::new(|address, _| {
        if address.to_string() == "a:1" {
            Err(unreachable())
        } else {
            Ok(())
        }
    });

    let config = ConnectConfig::builder()
        .address_list("a:1,b:2")
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let connection = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap();

    assert_eq!(connection.address, "b:2");
    assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:2"]);
}

#[tokio::test]
async fn exhaustion_carries_ordered_failure_history() {
    let (connector, _log) = ScriptedConnector::new(|_, _| Err(unreachable()));

    let config = ConnectConfig::builder()
        .address_list("a:1,b:2")
        .address_list_iterations(2)
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let err = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap_err();

    match &err {
        ConnectError::Exhausted { passes, failures } => {
            assert_eq!(*passes, 2);
            assert_eq!(failures.len(), 4);
            let attempted: Vec<&str> = failures.iter().map(|f| f.address.as_str()).collect();
            assert_eq!(attempted, vec!["a:1", "b:2", "a:1", "b:2"]);
            assert_eq!(failures[0].pass, 1);
            assert_eq!(failures[3].pass, 2);
            assert!(failures.iter().all(|f| f.attempt == 1));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn minimal_configuration_fails_fast_after_one_attempt() {
    let (connector, log) = ScriptedConnector::new(|_, _| Err(unreachable()));

    let config = ConnectConfig::builder().address_list("a:1").build().unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let err = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap_err();

    assert_eq!(err.failures().len(), 1);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_is_attempted_n_plus_one_times_with_waits() {
    let (connector, log) = ScriptedConnector::new(|_, _| Err(unreachable()));

    let config = ConnectConfig::builder()
        .address_list("a:1")
        .reconnect_enabled(true)
        .reconnect_attempts(2)
        .reconnect_interval(Duration::from_millis(50))
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let start = tokio::time::Instant::now();
    let err = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap_err();

    // Exactly 3 attempts, with a 50ms wait before each of the 2 retries.
    assert_eq!(log.lock().unwrap().len(), 3);
    assert!(start.elapsed() >= Duration::from_millis(100));

    match &err {
        ConnectError::Exhausted { failures, .. } => {
            assert_eq!(failures.len(), 3);
            let attempts: Vec<u32> = failures.iter().map(|f| f.attempt).collect();
            assert_eq!(attempts, vec![1, 2, 3]);
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn auth_rejection_skips_retries_and_moves_on_immediately() {
    let (connector, log) = ScriptedConnector::new(|address, _| {
        if address.to_string() == "a:1" {
            Err(AttemptError::AuthRejected("bad password".into()))
        } else {
            Ok(())
        }
    });

    let config = ConnectConfig::builder()
        .address_list("a:1,b:2")
        .reconnect_enabled(true)
        .reconnect_attempts(5)
        .reconnect_interval(Duration::from_secs(10))
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let start = tokio::time::Instant::now();
    let connection = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap();

    assert_eq!(connection.address, "b:2");
    assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:2"]);
    // No retry interval was applied on the way to the next endpoint.
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn random_behavior_touches_every_endpoint_once_per_pass() {
    let (connector, _log) = ScriptedConnector::new(|_, _| Err(unreachable()));

    let config = ConnectConfig::builder()
        .address_list("a:1,b:2,c:3,d:4")
        .behavior(AddressListBehavior::Random)
        .address_list_iterations(3)
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let err = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap_err();

    let failures = err.failures();
    assert_eq!(failures.len(), 12);

    let all: BTreeSet<&str> = ["a:1", "b:2", "c:3", "d:4"].into_iter().collect();
    for (i, pass_failures) in failures.chunks(4).enumerate() {
        let touched: BTreeSet<&str> = pass_failures.iter().map(|f| f.address.as_str()).collect();
        assert_eq!(touched, all, "pass {} must touch every endpoint", i + 1);
        assert!(pass_failures.iter().all(|f| f.pass == (i + 1) as u32));
    }
}

#[tokio::test]
async fn shape_is_forwarded_to_the_protocol_layer() {
    let (connector, _log) = ScriptedConnector::new(|_, _| Ok(()));
    let config = ConnectConfig::builder().address_list("a:1").build().unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let generic = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap();
    assert_eq!(generic.shape, ConnectionShape::Generic);

    let queue = creator
        .create_queue_connection(Credentials::anonymous())
        .await
        .unwrap();
    assert_eq!(queue.shape, ConnectionShape::Queue);

    let topic = creator
        .create_topic_connection(Credentials::anonymous())
        .await
        .unwrap();
    assert_eq!(topic.shape, ConnectionShape::Topic);
}

#[tokio::test]
async fn empty_credentials_fall_back_to_configured_defaults() {
    let (connector, _log) = ScriptedConnector::new(|_, _| Ok(()));
    let config = ConnectConfig::builder()
        .address_list("a:1")
        .credentials("admin", "secret")
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let defaulted = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap();
    assert_eq!(defaulted.username.as_deref(), Some("admin"));

    let explicit = creator
        .create_connection(Credentials::new("app", "pw"))
        .await
        .unwrap();
    assert_eq!(explicit.username.as_deref(), Some("app"));
}

#[tokio::test]
async fn client_id_reaches_the_protocol_layer_on_every_attempt() {
    let (connector, _log) = ScriptedConnector::new(|address, _| {
        if address.to_string() == "a:1" {
            Err(unreachable())
        } else {
            Ok(())
        }
    });
    let config = ConnectConfig::builder()
        .address_list("a:1,b:2")
        .client_id("client-7")
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let connection = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap();
    assert_eq!(connection.client_id.as_deref(), Some("client-7"));
}

#[tokio::test]
async fn cancelled_token_aborts_before_the_first_attempt() {
    let (connector, log) = ScriptedConnector::new(|_, _| Ok(()));
    let config = ConnectConfig::builder().address_list("a:1").build().unwrap();
    let creator = ConnectionCreator::new(connector, config);

    creator.cancel_token().cancel();

    let err = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_is_honored_before_a_retry_wait() {
    // The scripted connector cancels the factory while failing, the way a
    // pool manager closes a factory with a creation call in flight.
    let token_slot: Arc<OnceLock<CancelToken>> = Arc::new(OnceLock::new());
    let slot = Arc::clone(&token_slot);

    let (connector, log) = ScriptedConnector::new(move |_, _| {
        if let Some(token) = slot.get() {
            token.cancel();
        }
        Err(unreachable())
    });

    let config = ConnectConfig::builder()
        .address_list("a:1")
        .reconnect_enabled(true)
        .reconnect_attempts(5)
        .reconnect_interval(Duration::from_secs(60))
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);
    token_slot.set(creator.cancel_token()).unwrap();

    let start = tokio::time::Instant::now();
    let err = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.failures().len(), 1);
    assert_eq!(log.lock().unwrap().len(), 1);
    // Aborted before sleeping out the 60s retry interval.
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn runtime_config_update_applies_to_the_next_call() {
    let (connector, _log) = ScriptedConnector::new(|_, _| Ok(()));
    let config = ConnectConfig::builder().address_list("a:1").build().unwrap();
    let creator = ConnectionCreator::new(connector, config);

    creator
        .config()
        .update(|builder| builder.address_list("c:3"))
        .unwrap();

    let connection = creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap();
    assert_eq!(connection.address, "c:3");
}

#[tokio::test(start_paused = true)]
async fn event_callbacks_observe_the_whole_lifecycle() {
    let failures = Arc::new(AtomicUsize::new(0));
    let retries = Arc::new(AtomicUsize::new(0));
    let exhaustions = Arc::new(AtomicUsize::new(0));
    let (fc, rc, ec) = (
        Arc::clone(&failures),
        Arc::clone(&retries),
        Arc::clone(&exhaustions),
    );

    let (connector, _log) = ScriptedConnector::new(|_, _| Err(unreachable()));
    let config = ConnectConfig::builder()
        .address_list("a:1")
        .reconnect_enabled(true)
        .reconnect_attempts(1)
        .reconnect_interval(Duration::from_millis(10))
        .on_attempt_failure(move |_, _| {
            fc.fetch_add(1, Ordering::SeqCst);
        })
        .on_retry(move |_, _| {
            rc.fetch_add(1, Ordering::SeqCst);
        })
        .on_exhausted(move |_| {
            ec.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    let _ = creator.create_connection(Credentials::anonymous()).await;

    assert_eq!(failures.load(Ordering::SeqCst), 2);
    assert_eq!(retries.load(Ordering::SeqCst), 1);
    assert_eq!(exhaustions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connected_callback_reports_endpoint_and_attempt_count() {
    let connected: Arc<Mutex<Option<(String, u32)>>> = Arc::new(Mutex::new(None));
    let cc = Arc::clone(&connected);

    let (connector, _log) = ScriptedConnector::new(|address, _| {
        if address.to_string() == "a:1" {
            Err(unreachable())
        } else {
            Ok(())
        }
    });
    let config = ConnectConfig::builder()
        .address_list("a:1,b:2")
        .on_connected(move |address, total_attempts| {
            *cc.lock().unwrap() = Some((address.to_string(), total_attempts));
        })
        .build()
        .unwrap();
    let creator = ConnectionCreator::new(connector, config);

    creator
        .create_connection(Credentials::anonymous())
        .await
        .unwrap();

    assert_eq!(
        connected.lock().unwrap().clone(),
        Some(("b:2".to_string(), 2))
    );
}
