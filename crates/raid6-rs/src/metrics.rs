//! Lightweight metrics hooks for recording engine events.

use std::sync::{Arc, OnceLock};

/// `IoOpType` describes a read or write operation.
#[derive(Copy, Clone, Debug)]
pub enum IoOpType {
    Read,
    Write,
}

/// `StoreOp` captures one public file-store operation.
#[derive(Copy, Clone, Debug)]
pub struct StoreOp {
    pub op: IoOpType,
    pub bytes: u64,
    pub latency_seconds: f64,
    pub error: bool,
}

/// `RecoveryOp` captures one stripe-recovery pass.
#[derive(Copy, Clone, Debug)]
pub struct RecoveryOp {
    /// Stripes scanned by the pass (the whole array after a disk loss).
    pub stripes: u64,
    /// Blocks actually rebuilt and written back.
    pub blocks_rebuilt: u64,
    pub latency_seconds: f64,
}

/// `MetricsSink` records file-store and recovery events.
pub trait MetricsSink: Send + Sync + 'static {
    /// `record_store_op` records a public file-store operation.
    fn record_store_op(&self, op: StoreOp);
    /// `record_recovery_op` records a stripe-recovery pass.
    fn record_recovery_op(&self, op: RecoveryOp);
}

static METRICS_SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

/// `install_metrics_sink` installs a global metrics sink.
///
/// # Returns
/// `true` if the sink was installed, `false` if one was already
/// registered.
pub fn install_metrics_sink(sink: Arc<dyn MetricsSink>) -> bool {
    METRICS_SINK.set(sink).is_ok()
}

/// `is_enabled` reports whether a metrics sink has been installed.
pub fn is_enabled() -> bool {
    METRICS_SINK.get().is_some()
}

/// `record_store_op` forwards a store operation to the installed sink.
pub fn record_store_op(op: StoreOp) {
    if let Some(sink) = METRICS_SINK.get() {
        sink.record_store_op(op);
    }
}

/// `record_recovery_op` forwards a recovery pass to the installed sink.
pub fn record_recovery_op(op: RecoveryOp) {
    if let Some(sink) = METRICS_SINK.get() {
        sink.record_recovery_op(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct TestSink {
        store_ops: Mutex<Vec<StoreOp>>,
        recovery_ops: Mutex<Vec<RecoveryOp>>,
    }

    impl MetricsSink for TestSink {
        fn record_store_op(&self, op: StoreOp) {
            self.store_ops.lock().unwrap().push(op);
        }

        fn record_recovery_op(&self, op: RecoveryOp) {
            self.recovery_ops.lock().unwrap().push(op);
        }
    }

    #[test]
    fn metrics_sink_records_ops_when_enabled() {
        let sink = Arc::new(TestSink {
            store_ops: Mutex::new(Vec::new()),
            recovery_ops: Mutex::new(Vec::new()),
        });

        assert!(install_metrics_sink(sink.clone()));
        assert!(is_enabled());

        record_store_op(StoreOp {
            op: IoOpType::Write,
            bytes: 2048,
            latency_seconds: 0.15,
            error: false,
        });
        record_recovery_op(RecoveryOp {
            stripes: 16,
            blocks_rebuilt: 3,
            latency_seconds: 0.05,
        });

        {
            let store_ops = sink.store_ops.lock().unwrap();
            assert_eq!(store_ops.len(), 1);
            assert_eq!(store_ops[0].bytes, 2048);
            assert!(!store_ops[0].error);
        }
        {
            let recovery_ops = sink.recovery_ops.lock().unwrap();
            assert_eq!(recovery_ops.len(), 1);
            assert_eq!(recovery_ops[0].blocks_rebuilt, 3);
        }
    }
}
