use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

pub use product::{
    CatalogSchema, FieldDescriptor, FieldKind, FieldValue, ProductRecord, IDENTIFYING_FIELD,
};

mod product;

/// Scores arrive either as JSON numbers or as numeric strings; anything else
/// is a deserialization failure and therefore a 400.
fn deserialize_score<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        Int(i64),
        String(String),
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::Int(n) => Ok(n),
        StringOrInt::String(s) => i64::from_str(s.trim()).map_err(serde::de::Error::custom),
    }
}

/// One entry of a recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub product_name: String,
    #[serde(deserialize_with = "deserialize_score")]
    pub score: i64,
}

/// Request body for POST /api/recommend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// Free-text customer context the explanations are tailored to.
    pub context: String,
    pub recommendation: Vec<RecommendationItem>,
}

/// One generated recommendation; built fresh per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecommendation {
    pub product_name: String,
    pub label: String,
    pub reason: String,
}

/// Response body for POST /api/recommend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<ProductRecommendation>,
}

/// Health check response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_accepts_number_and_string() {
        let item: RecommendationItem =
            serde_json::from_str(r#"{"product_name": "Camry", "score": 90}"#).unwrap();
        assert_eq!(item.score, 90);

        let item: RecommendationItem =
            serde_json::from_str(r#"{"product_name": "Camry", "score": "85"}"#).unwrap();
        assert_eq!(item.score, 85);
    }

    #[test]
    fn test_non_numeric_score_is_rejected() {
        let result: Result<RecommendationItem, _> =
            serde_json::from_str(r#"{"product_name": "Camry", "score": "high"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_round_trip() {
        let body = r#"{
            "context": "The user works in retail",
            "recommendation": [
                {"product_name": "Camry", "score": "90"},
                {"product_name": "Accord", "score": 70},
                {"product_name": "Model 3", "score": 60}
            ]
        }"#;

        let request: RecommendationRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.recommendation.len(), 3);
        assert_eq!(request.recommendation[0].score, 90);
        assert_eq!(request.recommendation[2].product_name, "Model 3");
    }
}
