//! The wire format of the price-prediction endpoint.
//!
//! The model was trained on a table with Chinese column headings, and the endpoint expects
//! requests keyed by those headings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::features::DerivedFeatures;
use crate::record::{number_of, text_of, FieldValue, QueryRecord};

// -------------------------------------------------------------------------------------------------
// column names
// -------------------------------------------------------------------------------------------------
pub const COL_LENGTH: &str = "長度";
pub const COL_WIDTH: &str = "寬度";
pub const COL_HEIGHT: &str = "高度";
pub const COL_STATIC_PRESSURE: &str = "靜壓mmAq";
pub const COL_HORSEPOWER: &str = "馬力HP";
pub const COL_AIRFLOW: &str = "風量NCMM";
pub const COL_OPERATING_TEMPERATURE: &str = "操作溫度°C";
pub const COL_PURCHASE_QUANTITY: &str = "採購數量";
pub const COL_IMPELLER_DIAMETER: &str = "葉輪直徑mm";

pub const COL_VOLUME: &str = "體積";
pub const COL_POWER_DENSITY: &str = "功率密度";
pub const COL_AIRFLOW_EFFICIENCY: &str = "風量效率";
pub const COL_PRESSURE_EFFICIENCY: &str = "壓力效率";
pub const COL_LENGTH_WIDTH_RATIO: &str = "長寬比";
pub const COL_HEIGHT_WIDTH_RATIO: &str = "高寬比";

pub const COL_SERIES: &str = "系列";
pub const COL_SPECIFICATION: &str = "規格";
pub const COL_MODEL: &str = "型號";
// NOTE: the middle character is U+2F45 (KANGXI RADICAL SQUARE), not U+65B9; the model's
// column heading was captured that way and must be matched exactly.
pub const COL_OUTLET_DIRECTION: &str = "出口\u{2f45}向";
pub const COL_CASING_MATERIAL: &str = "機殼材質";
pub const COL_FRAME_MATERIAL: &str = "架台材質";
pub const COL_PRODUCT_NAME: &str = "產品名稱";
pub const COL_DRIVE_METHOD: &str = "驅動方式";
pub const COL_FIRE_SPARK_LEVEL: &str = "防火花級";
pub const COL_SUCTION: &str = "單雙吸";
pub const COL_FAN_GRADE: &str = "風機等級";

/// Response key holding the formatted predicted price
pub const KEY_PREDICTED_PRICE: &str = "預測價格";
/// Response key holding the server's echo of the input
pub const KEY_INPUT_SUMMARY: &str = "輸入資料摘要";
/// Error-response key holding the underlying error
pub const KEY_ERROR: &str = "錯誤";
/// Error-response key holding a human-readable message
pub const KEY_MESSAGE: &str = "訊息";

// -------------------------------------------------------------------------------------------------
// request
// -------------------------------------------------------------------------------------------------
/// Build the JSON body for a prediction request.
///
/// Numeric columns are single-element arrays, with missing or unparsable values sent as 0.
/// Categorical columns are plain strings, with missing values sent as `""`. The model column
/// `型號` repeats the specification.
pub fn request_body(query: &QueryRecord) -> Value {
    let features = DerivedFeatures::compute(query);
    let mut body = Map::new();

    let mut numeric = |col: &str, value: f64| {
        body.insert(col.to_string(), Value::Array(vec![json_number(value)]));
    };
    let num = |v: &Option<FieldValue>| number_of(v).unwrap_or(0.0);

    numeric(COL_LENGTH, num(&query.length));
    numeric(COL_WIDTH, num(&query.width));
    numeric(COL_HEIGHT, num(&query.height));
    numeric(COL_STATIC_PRESSURE, num(&query.static_pressure));
    numeric(COL_HORSEPOWER, num(&query.horsepower));
    numeric(COL_AIRFLOW, num(&query.airflow));
    numeric(COL_OPERATING_TEMPERATURE, num(&query.operating_temperature));
    numeric(COL_PURCHASE_QUANTITY, num(&query.purchase_quantity));
    numeric(COL_IMPELLER_DIAMETER, num(&query.impeller_diameter));
    numeric(COL_VOLUME, features.volume);
    numeric(COL_POWER_DENSITY, features.power_density);
    numeric(COL_AIRFLOW_EFFICIENCY, features.airflow_efficiency);
    numeric(COL_PRESSURE_EFFICIENCY, features.pressure_efficiency);
    numeric(COL_LENGTH_WIDTH_RATIO, features.length_width_ratio);
    numeric(COL_HEIGHT_WIDTH_RATIO, features.height_width_ratio);

    let mut categorical = |col: &str, value: &Option<FieldValue>| {
        let s = text_of(value).map(|s| s.into_owned()).unwrap_or_default();
        body.insert(col.to_string(), Value::String(s));
    };

    categorical(COL_SERIES, &query.series);
    categorical(COL_SPECIFICATION, &query.specification);
    categorical(COL_MODEL, &query.specification);
    categorical(COL_OUTLET_DIRECTION, &query.outlet_direction);
    categorical(COL_CASING_MATERIAL, &query.casing_material);
    categorical(COL_FRAME_MATERIAL, &query.frame_material);
    categorical(COL_PRODUCT_NAME, &query.product_name);
    categorical(COL_DRIVE_METHOD, &query.drive_method);
    categorical(COL_FIRE_SPARK_LEVEL, &query.fire_spark_level);
    categorical(COL_SUCTION, &query.suction);
    categorical(COL_FAN_GRADE, &query.fan_grade);

    Value::Object(body)
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0))
}

// -------------------------------------------------------------------------------------------------
// response
// -------------------------------------------------------------------------------------------------
/// The body of a successful prediction response.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResponse {
    #[serde(rename = "預測價格")]
    pub predicted_price: Option<String>,

    #[serde(rename = "輸入資料摘要")]
    pub input_summary: Option<Value>,
}

/// The body of a failed prediction or history response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerErrorBody {
    #[serde(rename = "錯誤")]
    pub error: Option<String>,

    #[serde(rename = "訊息")]
    pub message: Option<String>,
}

/// A parsed prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The predicted unit price, rounded to a whole currency unit
    pub price: u64,

    /// The price as formatted by the server
    pub formatted: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_summary: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The response had no price field
    Missing,

    /// The price field could not be read as a number
    Unparsable(String),
}

impl std::fmt::Display for PriceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceError::Missing => write!(f, "response did not include a predicted price"),
            PriceError::Unparsable(s) => write!(f, "could not parse predicted price {s:?}"),
        }
    }
}

impl std::error::Error for PriceError {}

/// Parse a localized price string such as `"1,234,567.89 元"`.
///
/// Every character other than ASCII digits and `.` is dropped before parsing, and the result is
/// rounded to the nearest whole unit.
pub fn parse_price(formatted: &str) -> Result<u64, PriceError> {
    let digits: String = formatted
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = digits
        .parse()
        .map_err(|_| PriceError::Unparsable(formatted.to_string()))?;
    if !value.is_finite() || value > u64::MAX as f64 {
        return Err(PriceError::Unparsable(formatted.to_string()));
    }
    Ok(value.round() as u64)
}

impl PredictionResponse {
    pub fn into_prediction(self) -> Result<Prediction, PriceError> {
        let formatted = self.predicted_price.ok_or(PriceError::Missing)?;
        let price = parse_price(&formatted)?;
        Ok(Prediction {
            price,
            formatted,
            input_summary: self.input_summary,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_body_for_form_defaults() {
        let mut q = QueryRecord::form_defaults();
        q.specification = Some("型五".into());
        q.outlet_direction = Some("A".into());
        let body = request_body(&q);

        assert_eq!(body[COL_LENGTH], json!([2500.0]));
        assert_eq!(body[COL_HORSEPOWER], json!([250.0]));
        assert_eq!(body[COL_VOLUME], json!([15_625_000_000.0]));
        assert_eq!(body[COL_AIRFLOW_EFFICIENCY], json!([6.0]));
        assert_eq!(body[COL_SPECIFICATION], json!("型五"));
        assert_eq!(body[COL_MODEL], json!("型五"));
        assert_eq!(body["出口⽅向"], json!("A"));
        assert_eq!(body[COL_SERIES], json!(""));
        assert_eq!(body[COL_CASING_MATERIAL], json!("SS400"));
        assert_eq!(body.as_object().unwrap().len(), 26);
    }

    #[test]
    fn request_body_zero_fills_bad_numbers() {
        let q = QueryRecord {
            length: Some("n/a".into()),
            horsepower: Some("75".into()),
            series: Some(5500.0.into()),
            ..Default::default()
        };
        let body = request_body(&q);
        assert_eq!(body[COL_LENGTH], json!([0.0]));
        assert_eq!(body[COL_HORSEPOWER], json!([75.0]));
        assert_eq!(body[COL_VOLUME], json!([0.0]));
        assert_eq!(body[COL_SERIES], json!("5500"));
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price("1,234,567.89 元"), Ok(1_234_568));
        assert_eq!(parse_price("NT$ 380,000.00"), Ok(380_000));
        assert_eq!(parse_price("12.4"), Ok(12));
        assert_eq!(parse_price("N/A"), Err(PriceError::Unparsable("N/A".into())));
        assert_eq!(parse_price("1.2.3"), Err(PriceError::Unparsable("1.2.3".into())));
    }

    #[test]
    fn response_into_prediction() {
        let r: PredictionResponse = serde_json::from_value(json!({
            "預測價格": "456,789.50 元",
            "輸入資料摘要": {"基本資訊": {"規格": "型五"}}
        }))
        .unwrap();
        let p = r.into_prediction().unwrap();
        assert_eq!(p.price, 456_790);
        assert_eq!(p.formatted, "456,789.50 元");
        assert!(p.input_summary.is_some());

        let r: PredictionResponse = serde_json::from_value(json!({"status": "ok"})).unwrap();
        assert_eq!(r.into_prediction(), Err(PriceError::Missing));
    }
}
