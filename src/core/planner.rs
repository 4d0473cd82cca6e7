//! Plan generation: diff synthesized templates against lock state.

use super::types::*;
use crate::error::Result;
use crate::tripwire::hasher;
use std::collections::HashMap;

/// Compare each stack's declarations with its lock. `stacks` must already be
/// in deployment order.
pub fn plan(
    environment: &str,
    stacks: &[SynthesizedStack],
    locks: &HashMap<String, StateLock>,
) -> Result<ExecutionPlan> {
    let mut changes = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut to_delete = 0u32;
    let mut unchanged = 0u32;

    for stack in stacks {
        let lock = locks.get(&stack.name);

        for resource_id in &stack.resource_order {
            let decl = match stack.template.resources.get(resource_id) {
                Some(d) => d,
                None => continue,
            };
            let action = determine_action(resource_id, decl, lock)?;
            match action {
                PlanAction::Create => to_create += 1,
                PlanAction::Update => to_update += 1,
                PlanAction::Delete => to_delete += 1,
                PlanAction::NoOp => unchanged += 1,
            }
            changes.push(PlannedChange {
                stack: stack.name.clone(),
                resource_id: resource_id.clone(),
                resource_type: decl.kind,
                description: describe_action(resource_id, decl, &action),
                action,
            });
        }

        // Locked resources that are no longer declared
        if let Some(lock) = lock {
            for (resource_id, rl) in &lock.resources {
                if stack.template.resources.contains_key(resource_id) {
                    continue;
                }
                to_delete += 1;
                changes.push(PlannedChange {
                    stack: stack.name.clone(),
                    resource_id: resource_id.clone(),
                    resource_type: rl.resource_type,
                    action: PlanAction::Delete,
                    description: format!("{}: delete (no longer declared)", resource_id),
                });
            }
        }
    }

    Ok(ExecutionPlan {
        environment: environment.to_string(),
        changes,
        stack_order: stacks.iter().map(|s| s.name.clone()).collect(),
        to_create,
        to_update,
        to_delete,
        unchanged,
    })
}

fn determine_action(
    resource_id: &str,
    decl: &ResourceDecl,
    lock: Option<&StateLock>,
) -> Result<PlanAction> {
    let Some(rl) = lock.and_then(|l| l.resources.get(resource_id)) else {
        return Ok(PlanAction::Create);
    };
    if rl.resource_type != decl.kind {
        // Type change replaces the resource; the engine reports it as an update
        return Ok(PlanAction::Update);
    }
    if rl.hash == hasher::hash_json(decl)? {
        Ok(PlanAction::NoOp)
    } else {
        Ok(PlanAction::Update)
    }
}

/// Property that best identifies a resource of this kind in plan output.
fn identifying_property(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::Vpc | ResourceKind::Subnet => Some("CidrBlock"),
        ResourceKind::VpcEndpoint => Some("ServiceName"),
        ResourceKind::Bucket => Some("BucketName"),
        ResourceKind::StudioDomain => Some("DomainName"),
        ResourceKind::UserProfile => Some("UserProfileName"),
        ResourceKind::Model => Some("ModelName"),
        ResourceKind::EndpointConfig => Some("EndpointConfigName"),
        ResourceKind::Endpoint => Some("EndpointName"),
        _ => None,
    }
}

fn describe_action(resource_id: &str, decl: &ResourceDecl, action: &PlanAction) -> String {
    match action {
        PlanAction::Create => {
            let detail = identifying_property(decl.kind)
                .and_then(|key| decl.properties.get(key))
                .and_then(|v| v.as_str());
            match detail {
                Some(d) => format!("{}: create {} ({})", resource_id, decl.kind, d),
                None => format!("{}: create {}", resource_id, decl.kind),
            }
        }
        PlanAction::Update => format!("{}: update (declaration changed)", resource_id),
        PlanAction::Delete => format!("{}: delete", resource_id),
        PlanAction::NoOp => format!("{}: no changes", resource_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::environment::Environment;
    use crate::core::state::lock_for_template;
    use crate::core::template::TemplateBuilder;
    use serde_json::json;

    fn make_stack(cidr: &str) -> SynthesizedStack {
        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("Vpc", ResourceKind::Vpc, json!({"CidrBlock": cidr}))
            .unwrap();
        b.declare("Bucket", ResourceKind::Bucket, json!({"BucketName": "b-dev"}))
            .unwrap();
        SynthesizedStack {
            name: "InfraStack".to_string(),
            role: StackRole::Foundation,
            template: b.build(),
            resource_order: vec!["Bucket".to_string(), "Vpc".to_string()],
        }
    }

    fn locks_for(stack: &SynthesizedStack) -> HashMap<String, StateLock> {
        let lock =
            lock_for_template(&stack.name, "dev", &stack.template, &stack.resource_order, None)
                .unwrap();
        HashMap::from([(stack.name.clone(), lock)])
    }

    #[test]
    fn test_plan_all_create() {
        let stack = make_stack("10.0.0.0/16");
        let plan = plan("dev", &[stack], &HashMap::new()).unwrap();
        assert_eq!(plan.to_create, 2);
        assert_eq!(plan.unchanged, 0);
        assert!(plan.changes.iter().all(|c| c.action == PlanAction::Create));
        assert_eq!(plan.changes[0].resource_id, "Bucket");
        assert!(plan.changes[0].description.contains("b-dev"));
        assert_eq!(plan.stack_order, vec!["InfraStack"]);
    }

    #[test]
    fn test_plan_all_unchanged() {
        let stack = make_stack("10.0.0.0/16");
        let locks = locks_for(&stack);
        let plan = plan("dev", &[stack], &locks).unwrap();
        assert_eq!(plan.unchanged, 2);
        assert_eq!(plan.to_create + plan.to_update + plan.to_delete, 0);
    }

    #[test]
    fn test_plan_update_on_changed_declaration() {
        let locks = locks_for(&make_stack("10.0.0.0/16"));
        let plan = plan("dev", &[make_stack("10.1.0.0/16")], &locks).unwrap();
        assert_eq!(plan.to_update, 1);
        assert_eq!(plan.unchanged, 1);
        let changed = plan
            .changes
            .iter()
            .find(|c| c.action == PlanAction::Update)
            .unwrap();
        assert_eq!(changed.resource_id, "Vpc");
    }

    #[test]
    fn test_plan_delete_undeclared() {
        let old = make_stack("10.0.0.0/16");
        let locks = locks_for(&old);

        let mut b = TemplateBuilder::new(Environment::Dev, None);
        b.declare("Vpc", ResourceKind::Vpc, json!({"CidrBlock": "10.0.0.0/16"}))
            .unwrap();
        let new = SynthesizedStack {
            name: "InfraStack".to_string(),
            role: StackRole::Foundation,
            template: b.build(),
            resource_order: vec!["Vpc".to_string()],
        };
        let plan = plan("dev", &[new], &locks).unwrap();
        assert_eq!(plan.to_delete, 1);
        assert_eq!(plan.unchanged, 1);
        let deleted = plan.changes.last().unwrap();
        assert_eq!(deleted.resource_id, "Bucket");
        assert_eq!(deleted.resource_type, ResourceKind::Bucket);
    }

    #[test]
    fn test_describe_without_identifying_property() {
        let decl = ResourceDecl {
            kind: ResourceKind::Route,
            properties: serde_json::Map::new(),
            depends_on: vec![],
        };
        assert_eq!(
            describe_action("R", &decl, &PlanAction::Create),
            "R: create AWS::EC2::Route"
        );
    }
}
