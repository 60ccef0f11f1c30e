//! Named fault switches for exercising failure paths.
//!
//! Requests consult a [`FaultRegistry`] at a handful of fixed injection points (see
//! [`RequestKind::point`](crate::request::RequestKind::point)). A point does nothing
//! unless a test has armed it; an armed point skips the real step and produces the
//! configured [`Fault`] instead.
//!
//! While nothing is armed, [`FaultRegistry::intercept`] is a single atomic load before
//! running the real step.
//!
//! # Example
//! ```rust
//! use ferry::{EngineError, fault::{Fault, FaultRegistry}};
//!
//! let faults = FaultRegistry::new();
//! faults.arm("count_table.row_count", Fault::Engine(EngineError::NotFound("t1".into())));
//!
//! let res: Result<u64, EngineError> = faults.intercept("count_table.row_count", || Ok(10));
//! assert_eq!(res, Err(EngineError::NotFound("t1".into())));
//!
//! faults.clear();
//! assert_eq!(faults.intercept("count_table.row_count", || Ok(10)), Ok(10));
//! ```
use std::{
    collections::HashMap,
    sync::{
        Arc, OnceLock, PoisonError, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use log::{info, trace, warn};

use crate::engine::{EngineError, TableSchema};

/// Outcome substituted at an armed injection point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The step reports this engine error.
    Engine(EngineError),
    /// The step panics with this message.
    Panic(String),
    /// A schema lookup returns this descriptor. Only meaningful at describe points,
    /// see [`FaultRegistry::intercept_describe`].
    Schema(TableSchema),
}

#[derive(Debug, Default)]
pub struct FaultRegistry {
    armed: AtomicUsize,
    switches: RwLock<HashMap<String, Fault>>,
}

static GLOBAL: OnceLock<Arc<FaultRegistry>> = OnceLock::new();

impl FaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, empty until armed.
    pub fn global() -> Arc<FaultRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(FaultRegistry::new())))
    }

    pub fn arm(&self, point: &str, fault: Fault) {
        info!("arming fault point '{point}': {fault:?}");
        let mut switches = self.switches.write().unwrap_or_else(PoisonError::into_inner);
        if switches.insert(point.to_string(), fault).is_none() {
            self.armed.fetch_add(1, Ordering::Release);
        }
    }

    pub fn disarm(&self, point: &str) {
        let mut switches = self.switches.write().unwrap_or_else(PoisonError::into_inner);
        if switches.remove(point).is_some() {
            info!("disarmed fault point '{point}'");
            self.armed.fetch_sub(1, Ordering::Release);
        }
    }

    /// Disarms every point.
    pub fn clear(&self) {
        let mut switches = self.switches.write().unwrap_or_else(PoisonError::into_inner);
        switches.clear();
        self.armed.store(0, Ordering::Release);
    }

    pub fn is_armed(&self, point: &str) -> bool {
        self.fault(point).is_some()
    }

    fn fault(&self, point: &str) -> Option<Fault> {
        if self.armed.load(Ordering::Acquire) == 0 {
            return None;
        }

        self.switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(point)
            .cloned()
    }

    /// Runs `step` unless `point` is armed, in which case the armed fault is produced
    /// instead. A [`Fault::Schema`] armed here has no substitute value and leaves the
    /// real step in place.
    ///
    /// # Panics
    ///
    /// If `point` is armed with [`Fault::Panic`].
    pub fn intercept<T, F>(&self, point: &str, step: F) -> Result<T, EngineError>
    where
        F: FnOnce() -> Result<T, EngineError>,
    {
        match self.fault(point) {
            None => step(),
            Some(Fault::Schema(_)) => {
                warn!("fault point '{point}' cannot substitute a schema, ignoring");
                step()
            }
            Some(fault) => fire(point, fault),
        }
    }

    /// Like [`intercept`](Self::intercept) for schema lookups, where
    /// [`Fault::Schema`] replaces the engine's descriptor.
    pub fn intercept_describe<F>(&self, point: &str, step: F) -> Result<TableSchema, EngineError>
    where
        F: FnOnce() -> Result<TableSchema, EngineError>,
    {
        match self.fault(point) {
            None => step(),
            Some(Fault::Schema(schema)) => {
                trace!("fault point '{point}' fired: {schema:?}");
                Ok(schema)
            }
            Some(fault) => fire(point, fault),
        }
    }

    /// Checks a point that guards no engine step.
    pub fn check(&self, point: &str) -> Result<(), EngineError> {
        self.intercept(point, || Ok(()))
    }
}

fn fire<T>(point: &str, fault: Fault) -> Result<T, EngineError> {
    match fault {
        Fault::Engine(err) => {
            trace!("fault point '{point}' fired: {err}");
            Err(err)
        }
        Fault::Panic(msg) => {
            trace!("fault point '{point}' fired: panic");
            panic!("{msg}");
        }
        Fault::Schema(_) => unreachable!("schema faults are resolved by the caller"),
    }
}
