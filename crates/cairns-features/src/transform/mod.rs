//! Alternative feature transforms applied to a cleaned, labeled table.
//!
//! | Method | Variant | Output |
//! |--------|---------|--------|
//! | 1 | [`FeatureTransform::Technical`] | input plus rolling technical features |
//! | 2 | [`FeatureTransform::ModelSchema`] | fixed model column layout with `adjvwap` |
//! | 3 | [`FeatureTransform::WindowedScaling`] | columns scaled with window-fitted parameters |

pub mod projection;
pub mod scaling;
pub mod technical;

pub use projection::{ModelSchema, model_columns};
pub use scaling::{
    NormalizationFitParams, ScaleParams, ScalingConfig, ScalingMethod, WindowedScaling,
};
pub use technical::{TechnicalConfig, TechnicalFeatures};

use crate::error::{FeatureError, Result};
use crate::schema::DAY;
use polars::prelude::DataFrame;
use tracing::info;

/// Selects one of the feature transforms.
#[derive(Debug, Clone)]
pub enum FeatureTransform {
    /// Rolling technical features
    Technical(TechnicalConfig),
    /// Projection onto the model column layout
    ModelSchema,
    /// Normalization fitted on a window of days
    WindowedScaling(ScalingConfig),
}

impl FeatureTransform {
    /// Map a numeric method tag to a transform with default settings.
    ///
    /// Method 3 needs the `(fit_start, fit_end)` window.
    pub fn from_method(method: u8, window: Option<(i64, i64)>) -> Result<Self> {
        match method {
            1 => Ok(Self::Technical(TechnicalConfig::default())),
            2 => Ok(Self::ModelSchema),
            3 => {
                let (start, end) = window.ok_or(FeatureError::MissingFitWindow)?;
                Ok(Self::WindowedScaling(ScalingConfig::new(start, end)))
            }
            other => Err(FeatureError::UnknownMethod(other)),
        }
    }

    /// Short name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Technical(_) => "technical",
            Self::ModelSchema => "model_schema",
            Self::WindowedScaling(_) => "windowed_scaling",
        }
    }

    /// Columns the input table must contain.
    pub fn required_columns(&self) -> Vec<String> {
        match self {
            Self::Technical(_) => technical::TECHNICAL_INPUTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            Self::ModelSchema => ModelSchema::required_columns(),
            Self::WindowedScaling(_) => vec![DAY.to_string()],
        }
    }

    /// Run the transform.
    pub fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        let rows = df.height();
        let out = match self {
            Self::Technical(config) => TechnicalFeatures::with_config(config.clone()).transform(df)?,
            Self::ModelSchema => ModelSchema.transform(df)?,
            Self::WindowedScaling(config) => {
                WindowedScaling::new(config.clone()).fit_transform(df)?
            }
        };
        info!(
            transform = self.name(),
            rows,
            columns = out.width(),
            "feature transform finished"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, "technical")]
    #[case(2, "model_schema")]
    fn test_from_method(#[case] method: u8, #[case] name: &str) {
        assert_eq!(FeatureTransform::from_method(method, None).unwrap().name(), name);
    }

    #[test]
    fn test_scaling_needs_window() {
        assert!(matches!(
            FeatureTransform::from_method(3, None),
            Err(FeatureError::MissingFitWindow)
        ));

        let transform = FeatureTransform::from_method(3, Some((20_200_101, 20_201_231))).unwrap();
        match transform {
            FeatureTransform::WindowedScaling(config) => {
                assert_eq!(config.fit_start, 20_200_101);
                assert_eq!(config.fit_end, 20_201_231);
                assert_eq!(config.method, ScalingMethod::Robust);
            }
            other => panic!("unexpected transform {other:?}"),
        }
    }

    #[test]
    fn test_unknown_method() {
        assert!(matches!(
            FeatureTransform::from_method(4, None),
            Err(FeatureError::UnknownMethod(4))
        ));
    }

    #[test]
    fn test_required_columns() {
        let required = FeatureTransform::ModelSchema.required_columns();
        assert!(required.contains(&"Ret_t11_rank_std".to_string()));
        assert!(!required.contains(&"adjvwap".to_string()));

        let technical = FeatureTransform::from_method(1, None).unwrap().required_columns();
        assert!(technical.contains(&"pre_close".to_string()));
    }
}
