//! Parameter grids for exhaustive search.
//!
//! A grid is an ordered list of axes, each naming one strategy parameter and
//! the values to try. Combinations are enumerated in odometer order: the last
//! axis varies fastest, so the enumeration order (and therefore tie-breaking
//! during selection) depends only on how the grid was written.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use forwardlab_core::strategy::{ParamSet, StrategyFactory};

/// One searched parameter and its candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamAxis {
    pub name: String,
    pub values: Vec<f64>,
}

impl ParamAxis {
    pub fn new(name: impl Into<String>, values: impl Into<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            values: values.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GridError {
    #[error("parameter axis '{name}' has no values")]
    EmptyAxis { name: String },

    #[error("parameter '{name}' appears in more than one axis")]
    DuplicateAxis { name: String },

    #[error("parameter '{name}' is not accepted by strategy {strategy}")]
    UnknownParam { strategy: String, name: String },

    #[error("parameter axis '{name}' contains non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },
}

/// Ordered Cartesian product of parameter axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    pub axes: Vec<ParamAxis>,
}

impl ParamGrid {
    pub fn new(axes: Vec<ParamAxis>) -> Self {
        Self { axes }
    }

    /// Builder-style axis append.
    pub fn axis(mut self, name: impl Into<String>, values: impl Into<Vec<f64>>) -> Self {
        self.axes.push(ParamAxis::new(name, values));
        self
    }

    /// Number of combinations. An empty grid has exactly one: the defaults.
    pub fn size(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Check the grid against the parameters `factory` accepts.
    pub fn validate(&self, factory: &dyn StrategyFactory) -> Result<(), GridError> {
        let known = factory.param_names();
        for (i, axis) in self.axes.iter().enumerate() {
            if axis.values.is_empty() {
                return Err(GridError::EmptyAxis {
                    name: axis.name.clone(),
                });
            }
            if let Some(&value) = axis.values.iter().find(|v| !v.is_finite()) {
                return Err(GridError::NonFiniteValue {
                    name: axis.name.clone(),
                    value,
                });
            }
            if self.axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(GridError::DuplicateAxis {
                    name: axis.name.clone(),
                });
            }
            if !known.contains(&axis.name.as_str()) {
                return Err(GridError::UnknownParam {
                    strategy: factory.name().to_string(),
                    name: axis.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// All combinations in odometer order (last axis fastest).
    pub fn combinations(&self) -> Vec<ParamSet> {
        let size = self.size();
        let mut out = Vec::with_capacity(size);
        if size == 0 {
            return out;
        }
        let mut cursor = vec![0usize; self.axes.len()];
        loop {
            out.push(
                self.axes
                    .iter()
                    .zip(&cursor)
                    .map(|(axis, &i)| (axis.name.clone(), axis.values[i]))
                    .collect(),
            );

            // Advance the odometer from the rightmost axis.
            let mut pos = self.axes.len();
            loop {
                if pos == 0 {
                    return out;
                }
                pos -= 1;
                cursor[pos] += 1;
                if cursor[pos] < self.axes[pos].values.len() {
                    break;
                }
                cursor[pos] = 0;
            }
        }
    }

    /// Deterministic BLAKE3 fingerprint of the grid, axis order included.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for axis in &self.axes {
            hasher.update(axis.name.as_bytes());
            hasher.update(&[0]);
            for v in &axis.values {
                hasher.update(&v.to_le_bytes());
            }
            hasher.update(&[0xff]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forwardlab_core::strategy::StrategyKind;

    fn grid_2x3() -> ParamGrid {
        ParamGrid::default()
            .axis("risk_per_trade", vec![0.01, 0.02])
            .axis("atr_stop_multiplier", vec![1.5, 2.0, 2.5])
    }

    #[test]
    fn size_is_product() {
        assert_eq!(grid_2x3().size(), 6);
        assert_eq!(ParamGrid::default().size(), 1);
    }

    #[test]
    fn empty_grid_yields_defaults_once() {
        let combos = ParamGrid::default().combinations();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn odometer_order_last_axis_fastest() {
        let combos = grid_2x3().combinations();
        let pairs: Vec<(f64, f64)> = combos
            .iter()
            .map(|p| {
                (
                    p.get("risk_per_trade").unwrap(),
                    p.get("atr_stop_multiplier").unwrap(),
                )
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                (0.01, 1.5),
                (0.01, 2.0),
                (0.01, 2.5),
                (0.02, 1.5),
                (0.02, 2.0),
                (0.02, 2.5),
            ]
        );
    }

    #[test]
    fn combinations_match_size() {
        let grid = grid_2x3().axis("reward_risk_ratio", vec![1.0, 2.0]);
        assert_eq!(grid.combinations().len(), grid.size());
    }

    #[test]
    fn validate_accepts_known_params() {
        assert!(grid_2x3().validate(&StrategyKind::TrendCrossover).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_param() {
        let grid = ParamGrid::default().axis("rsi_oversold", vec![30.0]);
        let err = grid.validate(&StrategyKind::SmaCross).unwrap_err();
        assert_eq!(
            err,
            GridError::UnknownParam {
                strategy: "sma_cross".into(),
                name: "rsi_oversold".into()
            }
        );
    }

    #[test]
    fn validate_rejects_empty_and_duplicate_axes() {
        let empty = ParamGrid::default().axis("risk_per_trade", Vec::new());
        assert!(matches!(
            empty.validate(&StrategyKind::TrendCrossover),
            Err(GridError::EmptyAxis { .. })
        ));

        let dup = ParamGrid::default()
            .axis("risk_per_trade", vec![0.01])
            .axis("risk_per_trade", vec![0.02]);
        assert!(matches!(
            dup.validate(&StrategyKind::TrendCrossover),
            Err(GridError::DuplicateAxis { .. })
        ));
    }

    #[test]
    fn validate_rejects_nan() {
        let grid = ParamGrid::default().axis("risk_per_trade", vec![0.01, f64::NAN]);
        assert!(matches!(
            grid.validate(&StrategyKind::MeanReversion),
            Err(GridError::NonFiniteValue { .. })
        ));
    }

    #[test]
    fn fingerprint_depends_on_axis_order() {
        let a = grid_2x3();
        let b = ParamGrid::new(a.axes.iter().rev().cloned().collect());
        assert_eq!(a.fingerprint(), grid_2x3().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn grid_parses_from_toml_array_of_tables() {
        #[derive(Deserialize)]
        struct Wrapper {
            param_grid: ParamGrid,
        }
        let w: Wrapper = toml::from_str(
            r#"
            [[param_grid]]
            name = "risk_per_trade"
            values = [0.01, 0.02]

            [[param_grid]]
            name = "use_trailing_stop"
            values = [0.0, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(w.param_grid.axes.len(), 2);
        assert_eq!(w.param_grid.axes[1].name, "use_trailing_stop");
    }
}
