#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cairns/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod clean;
pub mod error;
pub mod label;
pub mod pipeline;
pub mod schema;
pub mod transform;

pub use clean::{BasicCleaner, ForwardReturnConfig};
pub use error::{FeatureError, Result};
pub use label::{CrossSectionalLabeler, LabelerConfig};
pub use pipeline::FeaturePipeline;
pub use transform::{
    FeatureTransform, ModelSchema, NormalizationFitParams, ScaleParams, ScalingConfig,
    ScalingMethod, TechnicalConfig, TechnicalFeatures, WindowedScaling,
};
