//! Hot-swappable ownership of the serving predictor
//!
//! Readers clone the current `Arc<Predictor>` under a short read lock and
//! keep using that snapshot for the whole request, so a swap never affects
//! in-flight predictions. A reload builds and verifies the replacement
//! outside the lock; only a fully valid predictor is swapped in. The
//! replaced instance is kept for a single-step rollback.

use super::Predictor;
use crate::artifact::ModelArtifact;
use crate::error::{ModelError, Result};
use crate::schema::Task;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Slots {
    current: Option<Arc<Predictor>>,
    previous: Option<Arc<Predictor>>,
}

/// Result of a successful reload.
#[derive(Debug, Clone)]
pub struct Reloaded {
    pub predictor: Arc<Predictor>,
    /// SHA-256 of the artifact bytes
    pub checksum: String,
}

#[derive(Debug)]
pub struct PredictorHandle {
    task: Task,
    slots: RwLock<Slots>,
}

impl PredictorHandle {
    /// An empty handle; `current()` returns `None` until a predictor is
    /// swapped in.
    pub fn new(task: Task) -> Self {
        Self {
            task,
            slots: RwLock::new(Slots::default()),
        }
    }

    pub fn with_predictor(predictor: Predictor) -> Self {
        let handle = Self::new(predictor.schema().task);
        handle.write().current = Some(Arc::new(predictor));
        handle
    }

    pub fn task(&self) -> Task {
        self.task
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the serving predictor.
    pub fn current(&self) -> Option<Arc<Predictor>> {
        self.read().current.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.read().current.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.read().previous.is_some()
    }

    /// Atomically install `predictor`, keeping the replaced one for
    /// rollback. Returns the replaced predictor.
    pub fn swap(&self, predictor: Predictor) -> Result<Option<Arc<Predictor>>> {
        self.install(Arc::new(predictor))
    }

    fn install(&self, incoming: Arc<Predictor>) -> Result<Option<Arc<Predictor>>> {
        if incoming.schema().task != self.task {
            return Err(ModelError::schema_mismatch(format!(
                "cannot install a '{}' predictor into the '{}' handle",
                incoming.schema().task,
                self.task
            )));
        }
        let mut slots = self.write();
        let replaced = slots.current.replace(incoming);
        if replaced.is_some() {
            slots.previous = replaced.clone();
        }
        Ok(replaced)
    }

    /// Load, verify and install the artifact at `path`. On any failure the
    /// current predictor keeps serving.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<Reloaded> {
        let path = path.as_ref();
        let loaded = ModelArtifact::open(path, Some(self.task))
            .and_then(|loaded| Ok((Predictor::from_artifact(loaded.artifact)?, loaded.checksum)));

        match loaded {
            Ok((predictor, checksum)) => {
                let predictor = Arc::new(predictor);
                self.install(predictor.clone())?;
                info!(
                    task = %self.task,
                    path = %path.display(),
                    checksum = %checksum,
                    "Swapped in reloaded predictor"
                );
                Ok(Reloaded {
                    predictor,
                    checksum,
                })
            }
            Err(e) => {
                warn!(
                    task = %self.task,
                    path = %path.display(),
                    error = %e,
                    "Reload rejected, keeping current predictor"
                );
                Err(e)
            }
        }
    }

    /// Reinstate the previous predictor. Returns `None` when there is
    /// nothing to roll back to.
    pub fn rollback(&self) -> Option<Arc<Predictor>> {
        let mut slots = self.write();
        let previous = slots.previous.take()?;
        slots.current = Some(previous.clone());
        info!(task = %self.task, "Rolled back to previous predictor");
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::Estimator;
    use crate::models::{EncodedVector, OutputValue, RawRecord};
    use crate::preprocess::Preprocessor;
    use crate::schema::TaskSchema;

    #[derive(Debug)]
    struct ConstantEstimator {
        n_features: usize,
        value: f64,
    }

    impl Estimator for ConstantEstimator {
        fn predict(&self, _x: &EncodedVector) -> Result<Vec<f64>> {
            Ok(vec![self.value; 3])
        }

        fn n_features(&self) -> usize {
            self.n_features
        }

        fn n_outputs(&self) -> usize {
            3
        }
    }

    fn record(porosity: f64) -> RawRecord {
        RawRecord::new()
            .with("Scaffold_Geometry", "Body Centered")
            .with("Porosity_Percentage", porosity)
            .with("Immersion_Time_Days", 14.0)
            .with("Mechanical_Loading", 0.0)
    }

    fn predictor(value: f64) -> Predictor {
        let schema = TaskSchema::for_task(Task::Degradation);
        let mut pre = Preprocessor::new(&schema);
        pre.fit(&[record(40.0), record(60.0)]).unwrap();
        let estimator = Arc::new(ConstantEstimator {
            n_features: pre.output_width().unwrap(),
            value,
        });
        Predictor::new(schema, pre, estimator).unwrap()
    }

    fn served_value(handle: &PredictorHandle) -> OutputValue {
        handle
            .current()
            .unwrap()
            .predict(&record(50.0))
            .unwrap()
            .outputs
            .get("Weight_Loss_Percentage")
            .unwrap()
    }

    #[test]
    fn test_empty_handle() {
        let handle = PredictorHandle::new(Task::Degradation);
        assert!(!handle.is_loaded());
        assert!(handle.current().is_none());
        assert!(handle.rollback().is_none());
    }

    #[test]
    fn test_swap_keeps_snapshot_alive() {
        let handle = PredictorHandle::with_predictor(predictor(1.0));
        let snapshot = handle.current().unwrap();

        handle.swap(predictor(2.0)).unwrap();
        assert_eq!(served_value(&handle), OutputValue::Continuous(2.0));

        let in_flight = snapshot.predict(&record(50.0)).unwrap();
        assert_eq!(
            in_flight.outputs.get("Weight_Loss_Percentage"),
            Some(OutputValue::Continuous(1.0))
        );
    }

    #[test]
    fn test_rollback_restores_previous() {
        let handle = PredictorHandle::with_predictor(predictor(1.0));
        handle.swap(predictor(2.0)).unwrap();
        assert!(handle.has_previous());

        assert!(handle.rollback().is_some());
        assert_eq!(served_value(&handle), OutputValue::Continuous(1.0));
        assert!(handle.rollback().is_none());
    }

    #[test]
    fn test_swap_rejects_other_task() {
        let handle = PredictorHandle::new(Task::Printability);
        assert!(matches!(
            handle.swap(predictor(1.0)),
            Err(ModelError::SchemaMismatch(_))
        ));
        assert!(!handle.is_loaded());
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("degradation.json");
        std::fs::write(&bad, b"{ not an artifact").unwrap();

        let handle = PredictorHandle::with_predictor(predictor(1.0));
        assert!(handle.reload(&bad).is_err());
        assert!(handle.reload(dir.path().join("missing.json")).is_err());
        assert_eq!(served_value(&handle), OutputValue::Continuous(1.0));
        assert!(!handle.has_previous());
    }

    #[test]
    fn test_reload_returns_installed_predictor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printability.json");
        let checksum = crate::artifact::tests::artifact().save(&path).unwrap();

        let handle = PredictorHandle::new(Task::Printability);
        let reloaded = handle.reload(&path).unwrap();
        assert_eq!(reloaded.checksum, checksum);
        assert!(Arc::ptr_eq(&reloaded.predictor, &handle.current().unwrap()));
        assert!(!handle.has_previous());
    }
}
