//! Single-shot requests over a storage engine.
//!
//! A request is built by one of the [`RequestHandle`] factories, which only bind the
//! arguments, and then run with [`RequestHandle::execute`]. Executing consumes the
//! handle, so a request runs at most once; retrying means building a new one.
//!
//! # Execution
//!
//! Every request goes through the same phases:
//!
//! 1. open a [`TimeRecorder`] scope named after the request and its main argument
//! 2. validate arguments with the context's [`Validator`]
//! 3. describe each target table; unknown tables are `EntityNotFound`, partitions are
//!    `InvalidTarget`
//! 4. record the `check validation` checkpoint
//! 5. delegate to the [`Engine`]
//! 6. build the [`Output`] and report `Ok`
//!
//! Any failure stops execution at the phase it occurred in. Engine errors are
//! translated into a [`Status`] on the way out. A panic anywhere in these phases is
//! caught in [`RequestHandle::execute`] and reported as `Unexpected`.
//!
//! # Fault injection
//!
//! Each phase that can fail observably has a named injection point, listed by
//! [`RequestKind::point`]. Points are only live when armed in the context's
//! [`FaultRegistry`].
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use ferry::{Context, RequestHandle, StatusCode, engine::memory::MemoryEngine};
//!
//! let engine = Arc::new(MemoryEngine::new());
//! engine.create_table("t1").unwrap();
//! let ctx = Context::new(engine);
//!
//! let reply = RequestHandle::count_table(&ctx, "t1").execute();
//! assert!(reply.is_ok());
//! assert_eq!(reply.row_count(), Some(0));
//!
//! let reply = RequestHandle::drop_index(&ctx, "missing").execute();
//! assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
//! ```
mod count_table;
mod describe_table;
mod drop_index;
mod flush;

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::{debug, error, warn};

use crate::{
    Status,
    engine::{Engine, EngineError, TableSchema},
    fault::FaultRegistry,
    recorder::{LogSink, RecordSink, TimeRecorder},
    validation::{NameValidator, Validator},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    CountTable,
    DropIndex,
    Flush,
    DescribeTable,
}

/// Execution phases that carry a fault injection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Start of execution, before the recorder scope opens.
    Enter,
    /// Schema lookup of a target table.
    Describe,
    /// The request's own engine call.
    Delegate,
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::CountTable => "CountTableRequest",
            RequestKind::DropIndex => "DropIndexRequest",
            RequestKind::Flush => "FlushRequest",
            RequestKind::DescribeTable => "DescribeTableRequest",
        }
    }

    /// Name of the fault injection point for `phase`.
    ///
    /// | kind | enter | describe | delegate |
    /// |------|-------|----------|----------|
    /// | `CountTable` | `count_table.enter` | `count_table.describe` | `count_table.row_count` |
    /// | `DropIndex` | `drop_index.enter` | `drop_index.describe` | `drop_index.drop_index` |
    /// | `Flush` | `flush.enter` | `flush.describe` | `flush.flush` |
    /// | `DescribeTable` | `describe_table.enter` | `describe_table.describe` | `describe_table.describe` |
    pub fn point(&self, phase: Phase) -> &'static str {
        match (self, phase) {
            (RequestKind::CountTable, Phase::Enter) => "count_table.enter",
            (RequestKind::CountTable, Phase::Describe) => "count_table.describe",
            (RequestKind::CountTable, Phase::Delegate) => "count_table.row_count",
            (RequestKind::DropIndex, Phase::Enter) => "drop_index.enter",
            (RequestKind::DropIndex, Phase::Describe) => "drop_index.describe",
            (RequestKind::DropIndex, Phase::Delegate) => "drop_index.drop_index",
            (RequestKind::Flush, Phase::Enter) => "flush.enter",
            (RequestKind::Flush, Phase::Describe) => "flush.describe",
            (RequestKind::Flush, Phase::Delegate) => "flush.flush",
            (RequestKind::DescribeTable, Phase::Enter) => "describe_table.enter",
            // describing is the delegated step
            (RequestKind::DescribeTable, _) => "describe_table.describe",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collaborators a request runs against.
#[derive(Clone)]
pub struct Context {
    engine: Arc<dyn Engine>,
    validator: Arc<dyn Validator>,
    faults: Arc<FaultRegistry>,
    sink: Arc<dyn RecordSink>,
}

impl Context {
    /// Context with the default name rules, the global fault registry and timing
    /// records sent to the log.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            validator: Arc::new(NameValidator),
            faults: FaultRegistry::global(),
            sink: Arc::new(LogSink),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_faults(mut self, faults: Arc<FaultRegistry>) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    pub fn faults(&self) -> &FaultRegistry {
        &self.faults
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("faults", &self.faults)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    CountTable { table: String },
    DropIndex { table: String },
    Flush { tables: Vec<String> },
    DescribeTable { table: String },
}

/// Value produced by a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Unit,
    RowCount(i64),
    Schema(TableSchema),
}

/// Result of executing a request. The output is present if and only if the status
/// is `Ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    status: Status,
    output: Option<Output>,
}

impl Reply {
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    pub fn row_count(&self) -> Option<i64> {
        match self.output {
            Some(Output::RowCount(count)) => Some(count),
            _ => None,
        }
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        match &self.output {
            Some(Output::Schema(schema)) => Some(schema),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Output, Status> {
        match self.output {
            Some(output) => Ok(output),
            None => Err(self.status),
        }
    }
}

impl From<Result<Output, Status>> for Reply {
    fn from(value: Result<Output, Status>) -> Self {
        match value {
            Ok(output) => Self {
                status: Status::ok(),
                output: Some(output),
            },
            Err(status) if status.is_ok() => Self {
                status: Status::unexpected("failure reported with an ok status"),
                output: None,
            },
            Err(status) => Self {
                status,
                output: None,
            },
        }
    }
}

/// A bound, not yet executed request.
#[derive(Debug)]
pub struct RequestHandle {
    ctx: Context,
    request: Request,
}

impl RequestHandle {
    pub fn count_table(ctx: &Context, table: impl Into<String>) -> Self {
        Self::new(ctx, Request::CountTable {
            table: table.into(),
        })
    }

    pub fn drop_index(ctx: &Context, table: impl Into<String>) -> Self {
        Self::new(ctx, Request::DropIndex {
            table: table.into(),
        })
    }

    pub fn flush<I, S>(ctx: &Context, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ctx, Request::Flush {
            tables: tables.into_iter().map(Into::into).collect(),
        })
    }

    pub fn describe_table(ctx: &Context, table: impl Into<String>) -> Self {
        Self::new(ctx, Request::DescribeTable {
            table: table.into(),
        })
    }

    fn new(ctx: &Context, request: Request) -> Self {
        Self {
            ctx: ctx.clone(),
            request,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self.request {
            Request::CountTable { .. } => RequestKind::CountTable,
            Request::DropIndex { .. } => RequestKind::DropIndex,
            Request::Flush { .. } => RequestKind::Flush,
            Request::DescribeTable { .. } => RequestKind::DescribeTable,
        }
    }

    /// Recorder and log label, e.g. `CountTableRequest(table=t1)`.
    pub fn header(&self) -> String {
        match &self.request {
            Request::CountTable { table }
            | Request::DropIndex { table }
            | Request::DescribeTable { table } => format!("{}(table={table})", self.kind()),
            Request::Flush { tables } => format!("{}(tables={})", self.kind(), tables.join(",")),
        }
    }

    /// Runs the request.
    pub fn execute(self) -> Reply {
        let header = self.header();
        debug!("executing {header}");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.on_execute(&header)))
            .unwrap_or_else(|cause| {
                let msg = panic_message(cause.as_ref());
                error!("{header} aborted: {msg}");
                Err(Status::unexpected(msg))
            });

        if let Err(status) = &result {
            warn!("{header} failed: {status}");
        }

        result.into()
    }

    fn on_execute(&self, header: &str) -> Result<Output, Status> {
        self.ctx
            .faults()
            .check(self.kind().point(Phase::Enter))
            .map_err(|err| match &self.request {
                Request::CountTable { table }
                | Request::DropIndex { table }
                | Request::DescribeTable { table } => translate(err, table),
                Request::Flush { tables } => translate_set(err, tables),
            })?;
        let mut rc = TimeRecorder::start(header, Arc::clone(&self.ctx.sink));

        match &self.request {
            Request::CountTable { table } => count_table::execute(&self.ctx, table, &mut rc),
            Request::DropIndex { table } => drop_index::execute(&self.ctx, table, &mut rc),
            Request::Flush { tables } => flush::execute(&self.ctx, tables, &mut rc),
            Request::DescribeTable { table } => describe_table::execute(&self.ctx, table, &mut rc),
        }
    }
}

/// Validates `table` and checks that it names an existing root table.
fn validate_root_table(
    ctx: &Context,
    kind: RequestKind,
    table: &str,
) -> Result<TableSchema, Status> {
    ctx.validator().validate_name(table)?;
    describe_root_table(ctx, kind, table)
}

/// Looks `table` up, rejecting partitions.
fn describe_root_table(
    ctx: &Context,
    kind: RequestKind,
    table: &str,
) -> Result<TableSchema, Status> {
    let schema = ctx
        .faults()
        .intercept_describe(kind.point(Phase::Describe), || ctx.engine().describe_table(table))
        .map_err(|err| translate(err, table))?;

    if schema.is_partition() {
        return Err(Status::invalid_target(table));
    }

    Ok(schema)
}

/// Translates an engine error raised while working on `table`. A missing table is
/// always reported under the requested name.
fn translate(err: EngineError, table: &str) -> Status {
    match err {
        EngineError::NotFound(_) => Status::not_found(table),
        err => err.into(),
    }
}

/// Like [`translate`] for a request over several tables. The engine's name is kept
/// when it is one of `tables`; otherwise the whole set is reported.
fn translate_set(err: EngineError, tables: &[String]) -> Status {
    match err {
        EngineError::NotFound(name) if tables.contains(&name) => Status::not_found(&name),
        EngineError::NotFound(_) => Status::not_found(&tables.join(",")),
        err => err.into(),
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown internal fault".to_string()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use crate::{
        engine::{Engine, EngineError, TableSchema, memory::MemoryEngine},
        fault::FaultRegistry,
        recorder::testing::CaptureSink,
    };

    use super::Context;

    /// Engine wrapper that records every call and can be told to fail an operation.
    #[derive(Debug, Default)]
    pub struct SpyEngine {
        pub inner: MemoryEngine,
        calls: Mutex<Vec<String>>,
        failures: Mutex<HashMap<&'static str, EngineError>>,
    }

    impl SpyEngine {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn fail(&self, op: &'static str, err: EngineError) {
            self.failures.lock().unwrap().insert(op, err);
        }

        fn enter(&self, op: &'static str, arg: &str) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(format!("{op}({arg})"));
            match self.failures.lock().unwrap().get(op) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    impl Engine for SpyEngine {
        fn describe_table(&self, table: &str) -> Result<TableSchema, EngineError> {
            self.enter("describe_table", table)?;
            self.inner.describe_table(table)
        }

        fn row_count(&self, table: &str) -> Result<u64, EngineError> {
            self.enter("row_count", table)?;
            self.inner.row_count(table)
        }

        fn drop_index(&self, table: &str) -> Result<(), EngineError> {
            self.enter("drop_index", table)?;
            self.inner.drop_index(table)
        }

        fn flush(&self, tables: &[String]) -> Result<(), EngineError> {
            self.enter("flush", &tables.join(","))?;
            self.inner.flush(tables)
        }
    }

    pub struct Harness {
        pub engine: Arc<SpyEngine>,
        pub faults: Arc<FaultRegistry>,
        pub sink: Arc<CaptureSink>,
        pub ctx: Context,
    }

    /// Context over an engine holding root table `t1` and its partition `t1_p1`.
    pub fn harness() -> Harness {
        let engine = Arc::new(SpyEngine::default());
        engine.inner.create_table("t1").unwrap();
        engine.inner.create_partition("t1", "p1").unwrap();

        let faults = Arc::new(FaultRegistry::new());
        let sink = Arc::new(CaptureSink::default());
        let ctx = Context::new(engine.clone())
            .with_faults(faults.clone())
            .with_sink(sink.clone());

        Harness {
            engine,
            faults,
            sink,
            ctx,
        }
    }
}
