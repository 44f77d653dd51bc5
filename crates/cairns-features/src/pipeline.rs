//! Cleaning followed by cross-sectional labeling.

use crate::clean::BasicCleaner;
use crate::error::Result;
use crate::label::{CrossSectionalLabeler, LabelerConfig};
use crate::schema::RET_T11;
use polars::prelude::DataFrame;

/// Turns raw exported bars into the labeled feature table.
#[derive(Debug, Default)]
pub struct FeaturePipeline {
    cleaner: BasicCleaner,
    labeler: CrossSectionalLabeler,
}

impl FeaturePipeline {
    /// Create a pipeline labeling with the given configuration.
    pub fn new(labeler: LabelerConfig) -> Self {
        Self {
            cleaner: BasicCleaner::default(),
            labeler: CrossSectionalLabeler::with_config(labeler),
        }
    }

    /// Clean `raw` and label the forward return.
    pub fn run(&self, raw: DataFrame) -> Result<DataFrame> {
        let cleaned = self.cleaner.clean(raw)?;
        self.labeler.label(cleaned, &[RET_T11])
    }
}
