//! One open measurement dataset and the calculators attached to it.

use std::path::Path;
use std::sync::Arc;

use orca_config::{ConfigManager, CueConfig};
use orca_store::{ActiveSubject, DataStore, SubjectChange};

use crate::calculator::Calculator;
use crate::error::Result;
use crate::markers::ReferenceMarkers;
use crate::measurement::MeasurementManager;
use crate::reference::ReferenceCalculator;

/// Configuration, store and calculators wired together.
#[derive(Debug)]
pub struct MeasurementSession {
    config: ConfigManager,
    store: DataStore,
    measurements: MeasurementManager,
    references: ReferenceCalculator,
    cues: CueConfig,
    active: ActiveSubject,
}

impl MeasurementSession {
    /// Open a session over the configuration in `config`.
    ///
    /// Outdated files are backed up and replaced by the bundled defaults;
    /// missing files are installed. The store starts empty.
    pub fn open(config: &ConfigManager) -> Result<Self> {
        let upgraded = config.upgrade_outdated_configs()?;
        if !upgraded.is_empty() {
            tracing::warn!(files = ?upgraded, "Replaced outdated configuration files");
        }

        let schema = Arc::new(config.load_column_schema()?);
        let mut store = DataStore::new(Arc::clone(&schema));
        let measurements = MeasurementManager::from_config(config, &schema)?;
        measurements.register(&mut store);
        let references = ReferenceCalculator::from_config(config, &schema)?;
        references.register(&mut store);

        let cues = config.load_cue_config()?;
        for entry in cues.entries() {
            if !references.has_rule(&entry.cue) {
                tracing::warn!(cue = %entry.cue, "Cue names no reference rule and will be skipped");
            }
        }

        tracing::info!(
            dir = %config.config_dir().display(),
            columns = schema.len(),
            "Opened measurement session"
        );
        Ok(Self {
            config: config.clone(),
            store,
            measurements,
            references,
            cues,
            active: ActiveSubject::new(),
        })
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DataStore {
        &mut self.store
    }

    pub fn measurements(&self) -> &MeasurementManager {
        &self.measurements
    }

    pub fn references(&self) -> &ReferenceCalculator {
        &self.references
    }

    pub fn cue_config(&self) -> &CueConfig {
        &self.cues
    }

    pub fn active(&self) -> &ActiveSubject {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut ActiveSubject {
        &mut self.active
    }

    /// Load a dataset (or reset for `None`) and close the active subject.
    pub fn load_data(&mut self, path: Option<&Path>) -> Result<()> {
        self.store.load_data(path)?;
        self.active.clear();
        Ok(())
    }

    pub fn set_active(&mut self, key: &str) -> Option<SubjectChange> {
        self.active.set_active(key)
    }

    /// Markers of every cue configured for `measurement`, computed for the
    /// active subject. Empty when no subject is open.
    pub fn cue_markers(&self, measurement: &str) -> Result<Vec<(String, ReferenceMarkers)>> {
        if !self.active.is_open() {
            return Ok(Vec::new());
        }
        let key = self.active.current();
        self.cues
            .cues_for(measurement)
            .iter()
            .filter(|cue| self.references.has_rule(cue))
            .map(|cue| {
                let markers = self.references.do_measurement(&self.store, cue, key)?;
                Ok((cue.clone(), markers))
            })
            .collect()
    }
}
