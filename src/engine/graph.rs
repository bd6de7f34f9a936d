use std::collections::{HashMap, HashSet};

use crate::schemas::Workflow;

use super::EngineError;

/// Dependency-order step ids via depth-first topological sort.
///
/// Re-entering a node that is still on the visit stack means the
/// `depends` relation has a cycle; a dependency id with no matching
/// step is rejected before any sorting happens.
pub fn topological_order(workflow: &Workflow) -> Result<Vec<String>, EngineError> {
    let mut seen = HashSet::new();
    for step in &workflow.steps {
        if !seen.insert(step.id.as_str()) {
            return Err(EngineError::DuplicateStepId(step.id.clone()));
        }
    }

    for step in &workflow.steps {
        for dep in &step.depends {
            if !seen.contains(dep.as_str()) {
                return Err(EngineError::MissingDependency {
                    dep: dep.clone(),
                    step: step.id.clone(),
                });
            }
        }
    }

    let mut order = Vec::with_capacity(workflow.steps.len());
    let mut visited: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();

    for step in &workflow.steps {
        visit(workflow, &step.id, &mut visited, &mut visiting, &mut order)?;
    }

    Ok(order)
}

fn visit<'a>(
    workflow: &'a Workflow,
    id: &str,
    visited: &mut HashSet<&'a str>,
    visiting: &mut HashSet<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), EngineError> {
    if visited.contains(id) {
        return Ok(());
    }
    if visiting.contains(id) {
        return Err(EngineError::CircularDependency(id.to_string()));
    }

    // The id was validated against the step list above.
    let step = workflow
        .step(id)
        .ok_or_else(|| EngineError::MissingDependency {
            dep: id.to_string(),
            step: id.to_string(),
        })?;

    visiting.insert(&step.id);
    for dep in &step.depends {
        visit(workflow, dep, visited, visiting, order)?;
    }
    visiting.remove(step.id.as_str());
    visited.insert(&step.id);
    order.push(step.id.clone());
    Ok(())
}

/// Partition a topologically sorted workflow into waves: each step lands
/// in the earliest wave after all of its dependencies. Steps sharing a
/// wave have no path between them and may run concurrently.
pub fn partition_waves(
    workflow: &Workflow,
    order: &[String],
) -> Result<Vec<Vec<String>>, EngineError> {
    let mut assigned: HashMap<&str, usize> = HashMap::new();
    let mut waves: Vec<Vec<String>> = Vec::new();
    let mut remaining: Vec<&str> = order.iter().map(String::as_str).collect();

    while !remaining.is_empty() {
        let wave_index = waves.len();
        let mut wave = Vec::new();

        remaining.retain(|id| {
            let step = match workflow.step(id) {
                Some(step) => step,
                None => return false,
            };
            let ready = step
                .depends
                .iter()
                .all(|dep| assigned.contains_key(dep.as_str()));
            if ready {
                wave.push((*id).to_string());
                false
            } else {
                true
            }
        });

        if wave.is_empty() {
            return Err(EngineError::Deadlock);
        }

        for id in &wave {
            let step = workflow.step(id).ok_or(EngineError::Deadlock)?;
            assigned.insert(step.id.as_str(), wave_index);
        }
        waves.push(wave);
    }

    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Step;

    fn workflow(steps: Vec<Step>) -> Workflow {
        Workflow::new("test", steps)
    }

    #[test]
    fn test_linear_order() {
        let w = workflow(vec![
            Step::new("c", "t").with_depends(["b"]),
            Step::new("a", "t"),
            Step::new("b", "t").with_depends(["a"]),
        ]);
        let order = topological_order(&w).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_is_detected() {
        let w = workflow(vec![
            Step::new("a", "t").with_depends(["b"]),
            Step::new("b", "t").with_depends(["a"]),
        ]);
        let err = topological_order(&w).unwrap_err();
        assert!(err
            .to_string()
            .contains("Circular dependency detected involving step"));
    }

    #[test]
    fn test_self_cycle_is_detected() {
        let w = workflow(vec![Step::new("a", "t").with_depends(["a"])]);
        let err = topological_order(&w).unwrap_err();
        assert!(err.to_string().contains("Circular dependency"));
    }

    #[test]
    fn test_missing_dependency() {
        let w = workflow(vec![Step::new("a", "t").with_depends(["ghost"])]);
        let err = topological_order(&w).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Step dependency not found: ghost required by a"
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let w = workflow(vec![Step::new("a", "t"), Step::new("a", "t")]);
        assert!(matches!(
            topological_order(&w),
            Err(EngineError::DuplicateStepId(_))
        ));
    }

    #[test]
    fn test_diamond_partitions_into_three_waves() {
        let w = workflow(vec![
            Step::new("root", "t"),
            Step::new("left", "t").with_depends(["root"]),
            Step::new("right", "t").with_depends(["root"]),
            Step::new("join", "t").with_depends(["left", "right"]),
        ]);
        let order = topological_order(&w).unwrap();
        let waves = partition_waves(&w, &order).unwrap();

        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["root"]);
        let mut middle = waves[1].clone();
        middle.sort();
        assert_eq!(middle, vec!["left", "right"]);
        assert_eq!(waves[2], vec!["join"]);
    }

    #[test]
    fn test_independent_steps_share_the_first_wave() {
        let w = workflow(vec![
            Step::new("a", "t"),
            Step::new("b", "t"),
            Step::new("c", "t").with_depends(["a", "b"]),
        ]);
        let order = topological_order(&w).unwrap();
        let waves = partition_waves(&w, &order).unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].len(), 2);
        assert_eq!(waves[1], vec!["c"]);
    }
}
