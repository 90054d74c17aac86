#![forbid(unsafe_code)]

use std::path::Path;

use miette::IntoDiagnostic;
use porter_core::{Analysis, NonExtensionals, QuantifierPlan};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub schema: &'static str,
    pub input: String,
    pub target: String,
    pub natives: usize,
    pub non_extensional: NonExtensionals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plans: Option<Vec<QuantifierPlan>>,
}

impl AnalysisReport {
    pub fn new(input: &Path, target: &str, analysis: &Analysis) -> Self {
        Self {
            schema: "porter.analysis.v1",
            input: input.display().to_string(),
            target: target.to_string(),
            natives: analysis.natives,
            non_extensional: analysis.non_extensionals.clone(),
            plans: None,
        }
    }

    pub fn with_plans(mut self, plans: Vec<QuantifierPlan>) -> Self {
        self.plans = Some(plans);
        self
    }

    pub fn to_json(&self) -> miette::Result<String> {
        serde_json::to_string_pretty(self).into_diagnostic()
    }
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize>(value: &T, out_path: &Path) -> miette::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    std::fs::write(out_path, json).into_diagnostic()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use porter_ast::Program;
    use porter_core::{PorterConfig, run_pipeline};

    #[test]
    fn report_lists_violations_by_symbol() {
        let analysis = run_pipeline(Program::default(), &PorterConfig::default()).unwrap();
        let report = AnalysisReport::new(Path::new("empty.json"), "java", &analysis);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["schema"], "porter.analysis.v1");
        assert_eq!(value["natives"], 0);
        assert_eq!(value["non_extensional"], serde_json::json!({}));
        assert!(value.get("plans").is_none());
    }

    #[test]
    fn write_json_creates_directories() {
        let temp = tempfile::TempDir::new().unwrap();
        let out = temp.path().join("out").join("program.json");
        write_json(&Program::default(), &out).unwrap();
        let back: Program = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(back, Program::default());
    }
}
