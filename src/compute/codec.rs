//! Genome decoding into physical parameter units.

use crate::schema::{ConfigError, ConversionSpec, Genome, ParameterConversion};

/// Decode a genome into physical parameter values.
///
/// Genes are mapped index by index. Values outside [0, 1] extrapolate past
/// the declared range; no clamping is applied here. A genome whose length
/// differs from the spec is rejected.
pub fn decode(genome: &Genome, spec: &ConversionSpec) -> Result<Vec<f64>, ConfigError> {
    if genome.len() != spec.len() {
        return Err(ConfigError::GenomeLengthMismatch {
            expected: spec.len(),
            actual: genome.len(),
        });
    }
    Ok(decode_genes(genome.genes(), spec))
}

/// Decode genes already known to match the spec in length.
pub(crate) fn decode_genes(genes: &[f64], spec: &ConversionSpec) -> Vec<f64> {
    debug_assert_eq!(genes.len(), spec.len());
    genes
        .iter()
        .zip(spec.parameters())
        .map(|(&gene, rule)| decode_gene(gene, rule))
        .collect()
}

/// Decode a single gene.
#[inline]
pub fn decode_gene(gene: f64, rule: &ParameterConversion) -> f64 {
    let value = if rule.interpolate {
        rule.range_min + gene * (rule.range_max - rule.range_min)
    } else {
        gene
    };

    if rule.exponentiate {
        rule.base.powf(value)
    } else {
        value
    }
}
