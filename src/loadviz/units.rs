use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("unparseable quantity {0:?}")]
    BadNumber(String),
    #[error("unknown memory unit in {0:?}")]
    BadUnit(String),
}

/// Multiplier convention for `Ki/Mi/Gi/...` memory suffixes.
///
/// The upstream feed historically decoded these with decimal multipliers
/// (`Ki` = 1e3), which every consumer of the JSON output now depends on.
/// `Binary` gives the true Kubernetes semantics (`Ki` = 1024) for
/// deployments that opt in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryConvention {
    #[default]
    Decimal,
    Binary,
}

/// Decodes a CPU quantity string to cores: `"500m"` -> 0.5, `"3656065n"`
/// -> ~0.0037, `"2"` -> 2.0.
pub fn decode_cpu(input: &str) -> Result<f64, QuantityError> {
    if input.is_empty() {
        return Err(QuantityError::Empty);
    }
    let (value, scale) = match input.as_bytes()[input.len() - 1] {
        b'n' => (&input[..input.len() - 1], 1e-9),
        b'm' => (&input[..input.len() - 1], 1e-3),
        _ => (input, 1.0),
    };
    let n: f64 = value
        .parse()
        .map_err(|_| QuantityError::BadNumber(input.to_string()))?;
    Ok(n * scale)
}

/// Decodes a memory quantity string to bytes: `"128Mi"` -> 128e6 under the
/// decimal convention, 134217728 under the binary one; `"1024"` -> 1024.
pub fn decode_memory(input: &str, convention: MemoryConvention) -> Result<f64, QuantityError> {
    if input.is_empty() {
        return Err(QuantityError::Empty);
    }
    if !input.ends_with('i') || input.len() < 2 {
        return input
            .parse()
            .map_err(|_| QuantityError::BadNumber(input.to_string()));
    }

    let (value, unit) = input.split_at(input.len() - 2);
    let exponent = match unit {
        "Ki" => 1,
        "Mi" => 2,
        "Gi" => 3,
        "Ti" => 4,
        "Pi" => 5,
        "Ei" => 6,
        _ => return Err(QuantityError::BadUnit(input.to_string())),
    };
    let base: f64 = match convention {
        MemoryConvention::Decimal => 1e3,
        MemoryConvention::Binary => 1024.0,
    };
    let n: f64 = value
        .parse()
        .map_err(|_| QuantityError::BadNumber(input.to_string()))?;
    Ok(n * base.powi(exponent))
}
