use serde::{Deserialize, Serialize};

use crate::record::{number_of, FieldValue, QueryRecord};

// -------------------------------------------------------------------------------------------------
// DerivedFeatures
// -------------------------------------------------------------------------------------------------
/// Geometric and efficiency ratios that the price model expects alongside the raw attributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    /// `length * width * height`, in mm³
    pub volume: f64,

    /// `horsepower / volume`
    pub power_density: f64,

    /// `airflow / horsepower`
    pub airflow_efficiency: f64,

    /// `static_pressure / horsepower`
    pub pressure_efficiency: f64,

    /// `length / width`
    pub length_width_ratio: f64,

    /// `height / width`
    pub height_width_ratio: f64,
}

const RATIO_DECIMALS: i32 = 6;

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// `a / b`, or 0 when `b` is 0.
fn ratio(a: f64, b: f64) -> f64 {
    if b != 0.0 {
        round_to(a / b, RATIO_DECIMALS)
    } else {
        0.0
    }
}

impl DerivedFeatures {
    /// Compute derived features for a query.
    ///
    /// Missing or unparsable inputs count as zero. Unless all three dimensions are non-zero,
    /// every feature is zero.
    pub fn compute(query: &QueryRecord) -> Self {
        let num = |v: &Option<FieldValue>| number_of(v).unwrap_or(0.0);
        let (l, w, h) = (num(&query.length), num(&query.width), num(&query.height));
        let hp = num(&query.horsepower);
        let airflow = num(&query.airflow);
        let pressure = num(&query.static_pressure);

        if l == 0.0 || w == 0.0 || h == 0.0 {
            return Self::default();
        }

        let volume = l * w * h;
        DerivedFeatures {
            volume,
            power_density: ratio(hp, volume),
            airflow_efficiency: ratio(airflow, hp),
            pressure_efficiency: ratio(pressure, hp),
            length_width_ratio: ratio(l, w),
            height_width_ratio: ratio(h, w),
        }
    }
}
