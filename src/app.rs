//! Composition of the two stacks: names, roles and deployment order.

use crate::core::environment::Settings;
use crate::core::exports::ExportRegistry;
use crate::core::resolver::{self, StackGraph};
use crate::core::types::{StackRole, SynthesizedStack, Template};
use crate::error::{Result, StackError};
use crate::stacks::{FoundationStack, WorkloadStack};

/// Both stacks of one deployment environment.
#[derive(Debug, Clone)]
pub struct App {
    settings: Settings,
    foundation: FoundationStack,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let foundation = FoundationStack::new(settings.clone());
        Self {
            settings,
            foundation,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Stack names, foundation first.
    pub fn stack_names(&self) -> [&str; 2] {
        let stacks = &self.settings.project.stacks;
        [stacks.foundation.as_str(), stacks.workload.as_str()]
    }

    pub fn role_of(&self, name: &str) -> Result<StackRole> {
        let stacks = &self.settings.project.stacks;
        if name == stacks.foundation {
            Ok(StackRole::Foundation)
        } else if name == stacks.workload {
            Ok(StackRole::Workload)
        } else {
            Err(StackError::UnknownStack(name.to_string()))
        }
    }

    /// Synthesize both stacks, returned in deployment order.
    pub fn synth_all(&self) -> Result<Vec<SynthesizedStack>> {
        let (templates, graph) = self.compose()?;
        let mut stacks = Vec::with_capacity(templates.len());
        for name in &graph.order {
            let Some((_, role, template)) = templates.iter().find(|(n, _, _)| n == name) else {
                continue;
            };
            stacks.push(finish(name, *role, template.clone())?);
        }
        Ok(stacks)
    }

    /// Cross-stack order and the export edges behind it.
    pub fn stack_graph(&self) -> Result<StackGraph> {
        Ok(self.compose()?.1)
    }

    /// Synthesize one stack on its own. The workload resolves the foundation
    /// exports against `registry`.
    pub fn synth_stack(&self, name: &str, registry: &ExportRegistry) -> Result<SynthesizedStack> {
        let role = self.role_of(name)?;
        let template = match role {
            StackRole::Foundation => self.foundation.synth()?.template,
            StackRole::Workload => {
                WorkloadStack::standalone(self.settings.clone(), registry)?.synth()?
            }
        };
        finish(name, role, template)
    }

    fn compose(&self) -> Result<(Vec<(String, StackRole, Template)>, StackGraph)> {
        let [foundation_name, workload_name] = self.stack_names();
        let foundation = self.foundation.synth()?;

        // The workload consumes the foundation by export name only
        let registry = ExportRegistry::from_template(&foundation.template);
        let workload = WorkloadStack::standalone(self.settings.clone(), &registry)?.synth()?;

        let templates = vec![
            (foundation_name.to_string(), StackRole::Foundation, foundation.template),
            (workload_name.to_string(), StackRole::Workload, workload),
        ];
        let refs: Vec<(&str, &Template)> = templates
            .iter()
            .map(|(name, _, t)| (name.as_str(), t))
            .collect();
        let graph = resolver::build_stack_order(&refs)?;
        tracing::debug!(order = ?graph.order, "resolved stack order");
        Ok((templates, graph))
    }
}

fn finish(name: &str, role: StackRole, template: Template) -> Result<SynthesizedStack> {
    let resource_order = resolver::build_resource_order(&template)?;
    Ok(SynthesizedStack {
        name: name.to_string(),
        role,
        template,
        resource_order,
    })
}
