use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

// -------------------------------------------------------------------------------------------------
// FieldValue
// -------------------------------------------------------------------------------------------------
/// A scalar attribute value, as it appears in form state or in history-endpoint responses.
///
/// The same attribute can arrive as a JSON number from one source and as a string from another,
/// so interpretation is deferred to the accessors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

lazy_static! {
    static ref LEADING_NUMBER: Regex = Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?")
        .expect("leading number regex should compile");
}

impl FieldValue {
    /// Interpret this value as a finite number.
    ///
    /// For strings, the longest leading decimal number is used and any trailing text such as a
    /// unit is ignored, so `"2500mm"` gives 2500 and `"75 HP"` gives 75. A string that does not
    /// start with a number, or a value that is not finite, yields `None`.
    pub fn number(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => {
                let m = LEADING_NUMBER.find(s.trim_start())?;
                m.as_str().parse::<f64>().ok()?
            }
        };
        n.is_finite().then_some(n)
    }

    /// Interpret this value as non-empty text.
    ///
    /// Numbers are rendered in their shortest decimal form.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Text(s) if s.is_empty() => None,
            FieldValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            FieldValue::Number(n) => Some(Cow::Owned(n.to_string())),
        }
    }

    /// Is this an empty string?
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Get the numeric interpretation of an optional field.
pub fn number_of(v: &Option<FieldValue>) -> Option<f64> {
    v.as_ref().and_then(FieldValue::number)
}

/// Get the text interpretation of an optional field.
pub fn text_of(v: &Option<FieldValue>) -> Option<Cow<'_, str>> {
    v.as_ref().and_then(FieldValue::text)
}

// -------------------------------------------------------------------------------------------------
// QueryRecord
// -------------------------------------------------------------------------------------------------
/// The attributes of the unit being quoted.
///
/// Every field is optional. An absent field takes no part in similarity scoring and is sent as
/// a zero or an empty string to the prediction endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRecord {
    /// Length in millimetres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<FieldValue>,

    /// Width in millimetres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<FieldValue>,

    /// Height in millimetres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<FieldValue>,

    /// Static pressure in mmAq
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_pressure: Option<FieldValue>,

    /// Motor power in HP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horsepower: Option<FieldValue>,

    /// Airflow in NCMM
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airflow: Option<FieldValue>,

    /// Operating temperature in °C
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_temperature: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_quantity: Option<FieldValue>,

    /// Impeller diameter in millimetres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impeller_diameter: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub specification: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_direction: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub casing_material: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_material: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_method: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fire_spark_level: Option<FieldValue>,

    /// Single or double suction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suction: Option<FieldValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_grade: Option<FieldValue>,
}

/// Material assumed for casing and frame when nothing else is known.
pub const DEFAULT_MATERIAL: &str = "SS400";

impl QueryRecord {
    /// The initial state of a fresh quotation form: median dimensions and the most common
    /// categorical choices.
    pub fn form_defaults() -> Self {
        QueryRecord {
            length: Some(2500.0.into()),
            width: Some(2500.0.into()),
            height: Some(2500.0.into()),
            static_pressure: Some(1500.0.into()),
            horsepower: Some(250.0.into()),
            airflow: Some(1500.0.into()),
            operating_temperature: Some(20.0.into()),
            purchase_quantity: Some(1.0.into()),
            impeller_diameter: Some(1500.0.into()),
            series: None,
            specification: None,
            outlet_direction: None,
            casing_material: Some(DEFAULT_MATERIAL.into()),
            frame_material: Some(DEFAULT_MATERIAL.into()),
            product_name: None,
            drive_method: Some("皮帶式".into()),
            fire_spark_level: Some("無".into()),
            suction: Some("單吸".into()),
            fan_grade: Some("A".into()),
        }
    }

    /// Replace each field of `self` with the corresponding field of `other`, where `other` has a
    /// non-blank value.
    pub fn overlay(&mut self, other: &QueryRecord) {
        fn take(dst: &mut Option<FieldValue>, src: &Option<FieldValue>) {
            if let Some(v) = src {
                if !v.is_blank() {
                    *dst = Some(v.clone());
                }
            }
        }

        take(&mut self.length, &other.length);
        take(&mut self.width, &other.width);
        take(&mut self.height, &other.height);
        take(&mut self.static_pressure, &other.static_pressure);
        take(&mut self.horsepower, &other.horsepower);
        take(&mut self.airflow, &other.airflow);
        take(&mut self.operating_temperature, &other.operating_temperature);
        take(&mut self.purchase_quantity, &other.purchase_quantity);
        take(&mut self.impeller_diameter, &other.impeller_diameter);
        take(&mut self.series, &other.series);
        take(&mut self.specification, &other.specification);
        take(&mut self.outlet_direction, &other.outlet_direction);
        take(&mut self.casing_material, &other.casing_material);
        take(&mut self.frame_material, &other.frame_material);
        take(&mut self.product_name, &other.product_name);
        take(&mut self.drive_method, &other.drive_method);
        take(&mut self.fire_spark_level, &other.fire_spark_level);
        take(&mut self.suction, &other.suction);
        take(&mut self.fan_grade, &other.fan_grade);
    }
}

/// Reuse the attributes of a historical record as a new query.
impl From<&CandidateRecord> for QueryRecord {
    fn from(c: &CandidateRecord) -> Self {
        let or_default_material = |v: &Option<FieldValue>| match v {
            Some(v) if !v.is_blank() => Some(v.clone()),
            _ => Some(FieldValue::from(DEFAULT_MATERIAL)),
        };

        QueryRecord {
            length: c.length.clone(),
            width: c.width.clone(),
            height: c.height.clone(),
            static_pressure: c.static_pressure_mmaq.clone(),
            horsepower: c.horsepower_hp.clone(),
            airflow: c.airflow_ncmm.clone(),
            operating_temperature: c.operating_temperature_c.clone(),
            purchase_quantity: c.purchase_quantity.clone(),
            impeller_diameter: c.impeller_diameter_mm.clone(),
            series: c.model.clone(),
            specification: c.specification.clone(),
            outlet_direction: c.outlet_direction.clone(),
            casing_material: or_default_material(&c.casing_material),
            frame_material: or_default_material(&c.frame_material),
            product_name: c.product_name.clone(),
            drive_method: c.drive_method.clone(),
            fire_spark_level: c.fire_spark_level.clone(),
            suction: c.single_double_suction.clone(),
            fan_grade: c.fan_grade.clone(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// CandidateRecord
// -------------------------------------------------------------------------------------------------
/// A historical purchase record, as returned by the history endpoint.
///
/// Fields not modeled here are kept in `extra` so that a record can be written back out
/// unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRecord {
    pub vendor_name: Option<FieldValue>,
    pub order_number: Option<FieldValue>,

    pub length: Option<FieldValue>,
    pub width: Option<FieldValue>,
    pub height: Option<FieldValue>,
    pub volume: Option<FieldValue>,

    pub product_name: Option<FieldValue>,
    pub model: Option<FieldValue>,
    pub specification: Option<FieldValue>,
    pub outlet_direction: Option<FieldValue>,
    pub material: Option<FieldValue>,
    pub casing_material: Option<FieldValue>,
    pub frame_material: Option<FieldValue>,

    pub static_pressure_mmaq: Option<FieldValue>,
    pub horsepower_hp: Option<FieldValue>,
    pub airflow_ncmm: Option<FieldValue>,
    pub impeller_diameter_mm: Option<FieldValue>,
    pub operating_temperature_c: Option<FieldValue>,

    pub drive_method: Option<FieldValue>,
    pub fire_spark_level: Option<FieldValue>,
    pub single_double_suction: Option<FieldValue>,
    pub fan_grade: Option<FieldValue>,

    pub unit_price: Option<FieldValue>,
    pub purchase_quantity: Option<FieldValue>,
    pub created_at: Option<FieldValue>,
    pub purchase_date: Option<FieldValue>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CandidateRecord {
    /// The date to show for this record: the purchase date, falling back to the creation date.
    pub fn date(&self) -> Option<Cow<'_, str>> {
        text_of(&self.purchase_date).or_else(|| text_of(&self.created_at))
    }
}
