use crate::record::{text_of, FieldValue, QueryRecord};

/// Build the query-string parameters for a history lookup.
///
/// Fields that are absent, empty, or a numeric zero are left out entirely. The casing material
/// is sent twice, as `material` and as `casing_material`, and the specification is sent as
/// `model`.
pub fn history_params(query: &QueryRecord) -> Vec<(&'static str, String)> {
    let fields: [(&'static str, &Option<FieldValue>); 14] = [
        ("length", &query.length),
        ("width", &query.width),
        ("height", &query.height),
        ("static_pressure", &query.static_pressure),
        ("horsepower", &query.horsepower),
        ("airflow", &query.airflow),
        ("impeller_diameter", &query.impeller_diameter),
        ("material", &query.casing_material),
        ("casing_material", &query.casing_material),
        ("frame_material", &query.frame_material),
        ("product_name", &query.product_name),
        ("model", &query.specification),
        ("outlet_direction", &query.outlet_direction),
        ("drive_method", &query.drive_method),
    ];

    fields
        .into_iter()
        .filter(|(_, value)| !matches!(value, Some(FieldValue::Number(n)) if *n == 0.0))
        .filter_map(|(name, value)| Some((name, text_of(value)?.into_owned())))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_query_has_no_params() {
        assert_eq!(history_params(&QueryRecord::default()), vec![]);
    }

    #[test]
    fn zero_numbers_are_not_sent() {
        let q = QueryRecord {
            length: Some(0.0.into()),
            width: Some(1200.0.into()),
            airflow: Some(0.0.into()),
            ..Default::default()
        };
        assert_eq!(history_params(&q), vec![("width", "1200".to_string())]);
    }

    #[test]
    fn params_in_order_and_renamed() {
        let q = QueryRecord {
            length: Some(2500.0.into()),
            width: Some("".into()),
            horsepower: Some("75".into()),
            casing_material: Some("SUS304".into()),
            specification: Some("型五".into()),
            series: Some("TF".into()),
            fan_grade: Some("A".into()),
            ..Default::default()
        };
        assert_eq!(
            history_params(&q),
            vec![
                ("length", "2500".to_string()),
                ("horsepower", "75".to_string()),
                ("material", "SUS304".to_string()),
                ("casing_material", "SUS304".to_string()),
                ("model", "型五".to_string()),
            ]
        );
    }
}
