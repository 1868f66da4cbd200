//! Pipeline Service
//!
//! Validation of definitions submitted over the API.

use ferry_core::definition::{DefinitionError, PipelineDefinition};
use ferry_core::dto::pipeline::{PipelinePlan, ValidatePipeline};

/// Parse and validate a definition, returning its execution plan
pub fn validate_pipeline(req: &ValidatePipeline) -> Result<PipelinePlan, DefinitionError> {
    let definition = PipelineDefinition::from_toml_str(&req.definition)?;
    let order = definition.plan()?;

    tracing::debug!(
        "Pipeline '{}' is valid ({} stages)",
        definition.name,
        order.len()
    );

    Ok(PipelinePlan::new(&definition, &order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_returns_plan_in_dependency_order() {
        let req = ValidatePipeline {
            definition: r#"
                name = "release"

                [[stages]]
                name = "deploy"
                depends_on = ["build"]
                approval = { message = "Ship {version}?" }

                [[stages.tasks]]
                name = "upload"
                target = "all"
                program = "true"

                [[stages]]
                name = "build"

                [[stages.tasks]]
                name = "linux"
                target = "linux"
                program = "make"
                output = "dist/{target}.tar.gz"
            "#
            .to_string(),
        };

        let plan = validate_pipeline(&req).unwrap();
        let names: Vec<_> = plan.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["build", "deploy"]);
        assert!(plan.stages[0].collects_artifacts);
        assert_eq!(plan.stages[1].approval.as_deref(), Some("Ship {version}?"));
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let req = ValidatePipeline {
            definition: r#"
                name = "release"

                [[stages]]
                name = "deploy"
                depends_on = ["build"]

                [[stages.tasks]]
                name = "upload"
                target = "all"
                program = "true"
            "#
            .to_string(),
        };

        let result = validate_pipeline(&req);
        assert!(matches!(
            result,
            Err(DefinitionError::UnknownDependency { .. })
        ));
    }
}
