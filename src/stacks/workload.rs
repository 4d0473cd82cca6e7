//! Workload stack: model, endpoint configuration and endpoint.
//!
//! Foundation values arrive as [`FoundationOutputs`]. When the stack is
//! synthesized on its own, the exports must already be recorded in an
//! [`ExportRegistry`].

use crate::core::environment::Settings;
use crate::core::exports::{ExportContract, ExportRegistry, FoundationOutputs};
use crate::core::template::{get_att, StackValue, TemplateBuilder};
use crate::core::types::{ResourceKind, Template};
use crate::error::Result;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct WorkloadStack {
    settings: Settings,
    foundation: FoundationOutputs,
}

impl WorkloadStack {
    pub fn new(settings: Settings, foundation: FoundationOutputs) -> Self {
        Self {
            settings,
            foundation,
        }
    }

    /// Workload bound to the imported foundation exports, provided the
    /// registry already holds every one of them.
    pub fn standalone(settings: Settings, registry: &ExportRegistry) -> Result<Self> {
        let contract = ExportContract::new(settings.project.prefix.clone());
        registry.require(&contract)?;
        tracing::debug!(exports = registry.len(), "foundation exports present");
        Ok(Self::new(settings, FoundationOutputs::imported(&contract)))
    }

    /// `{storage_uri}/models/<model_artifact_prefix>-<env>.tar.gz`
    pub fn model_artifact_url(&self, storage_uri: &StackValue) -> StackValue {
        storage_uri.clone().concat(&format!(
            "/models/{}-{}.tar.gz",
            self.settings.project.model_artifact_prefix, self.settings.environment
        ))
    }

    pub fn synth(&self) -> Result<Template> {
        let project = &self.settings.project;
        let prefix = &project.prefix;
        let mut b = TemplateBuilder::new(self.settings.environment, project.description.clone());

        let model = format!("{}DummyModel", prefix);
        b.declare(
            &model,
            ResourceKind::Model,
            json!({
                "ExecutionRoleArn": self.foundation.execution_role_arn.to_template(),
                "ModelName": format!("{}-Dummy-Model", prefix),
                "PrimaryContainer": {
                    "Image": project.image,
                    "Mode": "SingleModel",
                    "ModelDataUrl": self.model_artifact_url(&self.foundation.storage_uri).to_template(),
                },
            }),
        )?;

        let config = format!("{}DummyEndpointConfig", prefix);
        b.declare(
            &config,
            ResourceKind::EndpointConfig,
            json!({
                "EndpointConfigName": format!("{}-Dummy-Endpoint-Config", prefix),
                "ProductionVariants": [{
                    "InitialInstanceCount": project.instance_count,
                    "InstanceType": project.instance_type,
                    "ModelName": get_att(&model, "ModelName"),
                    "VariantName": "AllTraffic",
                }],
            }),
        )?;

        b.declare(
            &format!("{}DummyEndpoint", prefix),
            ResourceKind::Endpoint,
            json!({
                "EndpointName": format!("{}-Dummy-Endpoint", prefix),
                "EndpointConfigName": get_att(&config, "EndpointConfigName"),
            }),
        )?;

        let template = b.build();
        tracing::info!(
            environment = %self.settings.environment,
            resources = template.resources.len(),
            "synthesized workload stack"
        );
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::environment::{Environment, ENV_VAR};
    use crate::core::exports::template_exports;
    use crate::core::resolver::{build_resource_order, template_imports};
    use crate::core::template::declared_name_tag;
    use crate::core::types::ProjectConfig;
    use crate::error::StackError;
    use crate::stacks::FoundationStack;
    use crate::tripwire::hasher;
    use proptest::prelude::*;

    fn imported(env: Environment) -> WorkloadStack {
        let settings = Settings::for_env(env);
        let contract = ExportContract::new(settings.project.prefix.clone());
        WorkloadStack::new(settings, FoundationOutputs::imported(&contract))
    }

    #[test]
    fn test_artifact_url_from_literal_uri_qa() {
        let stack = imported(Environment::Qa);
        let uri = StackValue::literal("s3://idriss-s3-bucket-swisscom-challenge-qa");
        assert_eq!(
            stack.model_artifact_url(&uri).as_literal().as_deref(),
            Some("s3://idriss-s3-bucket-swisscom-challenge-qa/models/idriss-model-qa.tar.gz")
        );
    }

    #[test]
    fn test_qa_end_to_end_from_env_var() {
        temp_env::with_var(ENV_VAR, Some("qa"), || {
            let settings = Settings::resolve(ProjectConfig::default(), None).unwrap();
            let foundation = FoundationStack::new(settings.clone()).synth().unwrap();
            assert_eq!(
                foundation.template.resources["IdrissS3Bucket"].properties["BucketName"],
                "idriss-s3-bucket-swisscom-challenge-qa"
            );

            let contract = ExportContract::new(settings.project.prefix.clone());
            let stack = WorkloadStack::new(settings, FoundationOutputs::imported(&contract));
            let mocked = StackValue::literal("s3://idriss-s3-bucket-swisscom-challenge-qa");
            assert_eq!(
                stack.model_artifact_url(&mocked),
                StackValue::literal(
                    "s3://idriss-s3-bucket-swisscom-challenge-qa/models/idriss-model-qa.tar.gz"
                )
            );
        });
    }

    #[test]
    fn test_artifact_url_from_import_is_join() {
        let stack = imported(Environment::Qa);
        let t = stack.synth().unwrap();
        assert_eq!(
            t.resources["IdrissDummyModel"].properties["PrimaryContainer"]["ModelDataUrl"],
            json!({"Fn::Join": ["", [
                {"Fn::ImportValue": "Idriss-S3-URI-Output"},
                "/models/idriss-model-qa.tar.gz"
            ]]})
        );
    }

    #[test]
    fn test_foundation_values_feed_workload() {
        let settings = Settings::for_env(Environment::Qa);
        let foundation = FoundationStack::new(settings.clone()).synth().unwrap();
        let stack = WorkloadStack::new(settings, foundation.outputs.clone());
        let t = stack.synth().unwrap();
        let container = &t.resources["IdrissDummyModel"].properties["PrimaryContainer"];
        assert_eq!(
            container["ModelDataUrl"],
            "s3://idriss-s3-bucket-swisscom-challenge-qa/models/idriss-model-qa.tar.gz"
        );
    }

    #[test]
    fn test_export_names_match_imports() {
        let settings = Settings::for_env(Environment::Dev);
        let foundation = FoundationStack::new(settings).synth().unwrap();
        let mut exported: Vec<String> = template_exports(&foundation.template)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        exported.sort();

        let workload = imported(Environment::Dev).synth().unwrap();
        assert_eq!(template_imports(&workload), exported);
    }

    #[test]
    fn test_chain_uses_provider_identifiers() {
        let t = imported(Environment::Dev).synth().unwrap();
        assert_eq!(
            t.resources["IdrissDummyEndpointConfig"].properties["ProductionVariants"][0]
                ["ModelName"],
            json!({"Fn::GetAtt": ["IdrissDummyModel", "ModelName"]})
        );
        assert_eq!(
            t.resources["IdrissDummyEndpoint"].properties["EndpointConfigName"],
            json!({"Fn::GetAtt": ["IdrissDummyEndpointConfig", "EndpointConfigName"]})
        );
        let order = build_resource_order(&t).unwrap();
        assert_eq!(
            order,
            vec!["IdrissDummyModel", "IdrissDummyEndpointConfig", "IdrissDummyEndpoint"]
        );
    }

    #[test]
    fn test_sizing_from_project() {
        let mut settings = Settings::for_env(Environment::Prod);
        settings.project.instance_count = 3;
        settings.project.instance_type = "ml.m5.large".to_string();
        let contract = ExportContract::new("Idriss");
        let t = WorkloadStack::new(settings, FoundationOutputs::imported(&contract))
            .synth()
            .unwrap();
        let variant = &t.resources["IdrissDummyEndpointConfig"].properties["ProductionVariants"][0];
        assert_eq!(variant["InitialInstanceCount"], 3);
        assert_eq!(variant["InstanceType"], "ml.m5.large");
        assert_eq!(variant["VariantName"], "AllTraffic");
    }

    #[test]
    fn test_standalone_requires_exports() {
        let settings = Settings::for_env(Environment::Dev);
        let err = WorkloadStack::standalone(settings, &ExportRegistry::new()).unwrap_err();
        match err {
            StackError::MissingExport(names) => assert_eq!(
                names,
                vec![
                    "Idriss-S3-URI-Output".to_string(),
                    "Idriss-Execution-Role-ARN-Output".to_string()
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_standalone_with_recorded_exports() {
        let settings = Settings::for_env(Environment::Dev);
        let foundation = FoundationStack::new(settings.clone()).synth().unwrap();
        let registry = ExportRegistry::from_template(&foundation.template);
        let stack = WorkloadStack::standalone(settings, &registry).unwrap();
        let t = stack.synth().unwrap();
        assert_eq!(
            t.resources["IdrissDummyModel"].properties["ExecutionRoleArn"],
            json!({"Fn::ImportValue": "Idriss-Execution-Role-ARN-Output"})
        );
    }

    proptest! {
        #[test]
        fn prop_name_tags_carry_env(idx in 0usize..5) {
            let env = Environment::ALL[idx];
            let t = imported(env).synth().unwrap();
            for (id, decl) in &t.resources {
                prop_assert_eq!(declared_name_tag(decl).map(str::to_string), Some(format!("{}_{}", id, env)));
            }
        }

        #[test]
        fn prop_synthesis_is_deterministic(idx in 0usize..5) {
            let env = Environment::ALL[idx];
            let a = imported(env).synth().unwrap();
            let b = imported(env).synth().unwrap();
            prop_assert_eq!(hasher::hash_json(&a).unwrap(), hasher::hash_json(&b).unwrap());
            prop_assert_eq!(a, b);
        }
    }
}
