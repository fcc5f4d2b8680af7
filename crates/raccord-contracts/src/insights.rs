use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Prop,
    Environment,
    Character,
    Flow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Advisory continuity note for a shot, recomputed on every analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaccordInsight {
    #[serde(rename = "type")]
    pub kind: InsightType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_ids: Option<Vec<String>>,
}

impl RaccordInsight {
    pub fn new(kind: InsightType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            suggestion: None,
            affected_ids: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_affected_ids(mut self, ids: Vec<String>) -> Self {
        self.affected_ids = (!ids.is_empty()).then_some(ids);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{InsightType, RaccordInsight, Severity};

    #[test]
    fn insight_serializes_with_wire_names() -> anyhow::Result<()> {
        let insight = RaccordInsight::new(InsightType::Prop, Severity::Warning, "knife gone")
            .with_affected_ids(vec!["knife-id".to_string()]);
        let value = serde_json::to_value(&insight)?;
        assert_eq!(
            value,
            json!({
                "type": "prop",
                "severity": "warning",
                "message": "knife gone",
                "affectedIds": ["knife-id"],
            })
        );
        Ok(())
    }

    #[test]
    fn empty_affected_ids_are_omitted() {
        let insight = RaccordInsight::new(InsightType::Flow, Severity::Info, "x")
            .with_affected_ids(Vec::new());
        assert!(insight.affected_ids.is_none());
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
