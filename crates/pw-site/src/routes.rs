//! Atomically swappable route table.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use pw_routes::{RouteTable, RouteTableBuilder};

use crate::lock;

const SOURCE: &str = "routes";

/// Holds the current [`RouteTable`] snapshot.
///
/// Readers clone the `Arc` and match against a consistent table for as long
/// as they like; a rebuild swaps the reference without touching the old table.
pub(crate) struct RouteRegistry {
    current: RwLock<Arc<RouteTable>>,
    builder: Option<RouteTableBuilder>,
    reload_lock: Mutex<()>,
}

impl RouteRegistry {
    pub(crate) fn new(table: RouteTable, builder: Option<RouteTableBuilder>) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
            builder,
            reload_lock: Mutex::new(()),
        }
    }

    pub(crate) fn current(&self) -> Arc<RouteTable> {
        Arc::clone(&*lock::read(&self.current, SOURCE, "current"))
    }

    pub(crate) fn replace(&self, table: RouteTable) {
        *lock::write(&self.current, SOURCE, "replace") = Arc::new(table);
    }

    /// Rebuild from the page tree. Returns `None` when no builder is
    /// configured.
    pub(crate) fn rebuild(&self) -> Option<Arc<RouteTable>> {
        let builder = self.builder.as_ref()?;
        let _guard = lock::lock(&self.reload_lock, SOURCE, "rebuild");
        let start = Instant::now();

        let previous = self.current().len();
        let table = Arc::new(builder.build());
        *lock::write(&self.current, SOURCE, "rebuild") = Arc::clone(&table);

        tracing::info!(
            previous,
            routes = table.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Route table swapped"
        );
        Some(table)
    }
}
