use serde::{Deserialize, Serialize};

/// A number that upstream feeds encode either as a JSON number or as a
/// decimal string (`"0.97"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            Numeric::Number(n) => *n,
            Numeric::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numbers_and_strings() {
        let parsed: Vec<Numeric> = serde_json::from_str(r#"[0.5, "0.25", " 7.5 ", "n/a"]"#).unwrap();
        let values: Vec<Option<f64>> = parsed.iter().map(Numeric::value).collect();
        assert_eq!(values, vec![Some(0.5), Some(0.25), Some(7.5), None]);
    }
}
