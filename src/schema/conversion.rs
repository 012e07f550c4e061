//! Per-parameter scaling rules from genome space to physical units.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Scaling rule for a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterConversion {
    /// Map the gene linearly from [0, 1] onto [range_min, range_max].
    pub interpolate: bool,
    pub range_min: f64,
    pub range_max: f64,
    /// Raise `base` to the (possibly interpolated) value.
    pub exponentiate: bool,
    pub base: f64,
}

impl ParameterConversion {
    /// Log-uniform rule: the gene selects an exponent in [min, max] of base 10.
    pub fn log10(range_min: f64, range_max: f64) -> Self {
        Self {
            interpolate: true,
            range_min,
            range_max,
            exponentiate: true,
            base: 10.0,
        }
    }

    /// Linear rule without exponentiation.
    pub fn linear(range_min: f64, range_max: f64) -> Self {
        Self {
            interpolate: true,
            range_min,
            range_max,
            exponentiate: false,
            base: 10.0,
        }
    }
}

/// Conversion rules for every parameter, indexed like the genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionSpec {
    parameters: Vec<ParameterConversion>,
}

impl ConversionSpec {
    /// Build from explicit rules.
    pub fn new(parameters: Vec<ParameterConversion>) -> Result<Self, ConfigError> {
        let spec = Self { parameters };
        spec.validate()?;
        Ok(spec)
    }

    /// Every parameter interpolated and exponentiated with base 10.
    pub fn log_uniform(minimums: &[f64], maximums: &[f64]) -> Result<Self, ConfigError> {
        if minimums.len() != maximums.len() {
            return Err(ConfigError::BoundsLengthMismatch {
                minimums: minimums.len(),
                maximums: maximums.len(),
            });
        }
        Self::new(
            minimums
                .iter()
                .zip(maximums)
                .map(|(&min, &max)| ParameterConversion::log10(min, max))
                .collect(),
        )
    }

    /// Number of parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Rules in parameter order.
    pub fn parameters(&self) -> &[ParameterConversion] {
        &self.parameters
    }

    /// Check bounds and bases. Called by the constructors and again by
    /// consumers that received a deserialized spec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parameters.is_empty() {
            return Err(ConfigError::NoParameters);
        }
        for (index, p) in self.parameters.iter().enumerate() {
            if p.interpolate
                && !(p.range_min.is_finite() && p.range_max.is_finite() && p.range_min <= p.range_max)
            {
                return Err(ConfigError::InvalidRange {
                    index,
                    min: p.range_min,
                    max: p.range_max,
                });
            }
            if p.exponentiate && !(p.base.is_finite() && p.base > 0.0) {
                return Err(ConfigError::InvalidBase {
                    index,
                    base: p.base,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_uniform_sets_all_flags() {
        let spec = ConversionSpec::log_uniform(&[-2.0, -1.0], &[2.0, 3.0]).unwrap();
        assert_eq!(spec.len(), 2);
        for p in spec.parameters() {
            assert!(p.interpolate);
            assert!(p.exponentiate);
            assert_eq!(p.base, 10.0);
        }
        assert_eq!(spec.parameters()[1].range_max, 3.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = ConversionSpec::log_uniform(&[0.0, 1.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::BoundsLengthMismatch {
                minimums: 2,
                maximums: 1
            }
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = ConversionSpec::log_uniform(&[3.0], &[1.0]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange { index: 0, .. }));
    }

    #[test]
    fn test_bad_base_rejected() {
        let mut rule = ParameterConversion::log10(0.0, 1.0);
        rule.base = 0.0;
        assert!(matches!(
            ConversionSpec::new(vec![rule]),
            Err(ConfigError::InvalidBase { index: 0, .. })
        ));
    }

    #[test]
    fn test_serde_transparent() {
        let spec = ConversionSpec::log_uniform(&[-1.0], &[1.0]).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.starts_with('['));
        let back: ConversionSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
