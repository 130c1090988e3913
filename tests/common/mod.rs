//! Shared test fixtures: a recording transport factory and a harness
//! wiring it to a middleware with a manual scheduler.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use ws_middleware::{
    Action, ConnectConfig, EventSink, ManualScheduler, Middleware, ReconnectPolicy, Result,
    Transport, TransportEvent, TransportFactory,
};

// ============================================================================
// Tracing
// ============================================================================

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FakeTransport
// ============================================================================

/// Everything the fake transports did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Text(String),
    Binary(Vec<u8>),
    Close(String),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub struct FakeTransport {
    url: String,
    log: CallLog,
    closed: AtomicBool,
}

impl FakeTransport {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn send_text(&self, text: String) -> Result<()> {
        self.log.lock().push(Call::Text(text));
        Ok(())
    }

    fn send_binary(&self, data: Vec<u8>) -> Result<()> {
        self.log.lock().push(Call::Binary(data));
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.log.lock().push(Call::Close(self.url.clone()));
        }
    }
}

// ============================================================================
// FakeFactory
// ============================================================================

#[derive(Clone)]
pub struct Created {
    pub config: ConnectConfig,
    pub sink: EventSink,
    pub transport: Arc<FakeTransport>,
}

impl Created {
    pub fn emit(&self, event: TransportEvent) {
        self.sink.emit(event);
    }
}

#[derive(Default)]
pub struct FakeFactory {
    pub log: CallLog,
    created: Mutex<Vec<Created>>,
}

impl FakeFactory {
    pub fn count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn get(&self, index: usize) -> Created {
        self.created.lock()[index].clone()
    }

    pub fn last(&self) -> Created {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("no transport created")
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().clone()
    }

    pub fn sent(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Text(_) | Call::Binary(_)))
            .collect()
    }
}

impl TransportFactory for FakeFactory {
    fn create(&self, config: &ConnectConfig, sink: EventSink) -> Result<Arc<dyn Transport>> {
        config.validate()?;

        let transport = Arc::new(FakeTransport {
            url: config.url.clone(),
            log: Arc::clone(&self.log),
            closed: AtomicBool::new(false),
        });

        self.log.lock().push(Call::Create(config.url.clone()));
        self.created.lock().push(Created {
            config: config.clone(),
            sink,
            transport: Arc::clone(&transport),
        });

        Ok(transport)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub middleware: Middleware,
    pub factory: Arc<FakeFactory>,
    pub scheduler: Arc<ManualScheduler>,
    pub dispatched: Arc<Mutex<Vec<Action>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(ReconnectPolicy::default())
    }

    pub fn with_policy(policy: ReconnectPolicy) -> Self {
        init_tracing();

        let factory = Arc::new(FakeFactory::default());
        let scheduler = Arc::new(ManualScheduler::new());
        let dispatched: Arc<Mutex<Vec<Action>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&dispatched);

        let middleware = Middleware::builder()
            .dispatcher(move |action| sink.lock().push(action))
            .factory(factory.clone())
            .scheduler(scheduler.clone())
            .reconnect_policy(policy)
            .build()
            .expect("middleware");

        Self {
            middleware,
            factory,
            scheduler,
            dispatched,
        }
    }

    /// Handles `action`, returning the result and what reached `next`.
    pub fn handle(&self, action: Action) -> (Result<()>, Vec<Action>) {
        let mut forwarded = Vec::new();
        let result = self
            .middleware
            .handle(action, |action| forwarded.push(action));
        (result, forwarded)
    }

    pub fn connect(&self, url: &str) -> Created {
        let (result, _) = self.handle(Action::connect(ConnectConfig::new(url)));
        result.expect("connect");
        self.factory.last()
    }

    pub fn dispatched(&self) -> Vec<Action> {
        self.dispatched.lock().clone()
    }

    pub fn dispatched_types(&self) -> Vec<String> {
        self.dispatched
            .lock()
            .iter()
            .map(|action| action.action_type().to_string())
            .collect()
    }
}
