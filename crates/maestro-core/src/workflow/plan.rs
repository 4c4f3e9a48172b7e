//! Step planner: derives per-step dependencies and groups independent
//! steps into fan-out groups.
//!
//! ```text
//! steps:  fetch ─► compare ─┬─► hot  ─┬─► join
//!                           └─► cold ─┘
//! groups: [fetch] [compare] [hot, cold] [join]
//! ```
//!
//! Grouping is greedy in declared order: a step joins the current group
//! unless it depends on a step already in it. Declared order is therefore
//! preserved both across and within groups.

use std::collections::BTreeSet;

use crate::spec::{StepTarget, Workflow};
use crate::template::{self, placeholder_name, CONNECTOR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    dependencies: Vec<BTreeSet<usize>>,
    /// Step whose output a step consumes as its implicit input
    implicit_inputs: Vec<Option<usize>>,
    groups: Vec<Vec<usize>>,
}

impl Plan {
    /// `is_static_agent` reports whether an agent is known before the run.
    /// Steps naming any other agent may depend on a synthesized spec, so they
    /// wait for everything declared before them.
    pub fn build(workflow: &Workflow, is_static_agent: impl Fn(&str) -> bool) -> Self {
        let steps = workflow.steps();
        let mut dependencies = Vec::with_capacity(steps.len());
        let mut implicit_inputs = Vec::with_capacity(steps.len());

        for (i, step) in steps.iter().enumerate() {
            let implicit = step.template().is_none() && step.literal_prompt().is_none();
            implicit_inputs.push(if implicit { i.checked_sub(1) } else { None });

            let barrier = match step.target() {
                Some(StepTarget::Agent(agent)) => !is_static_agent(agent),
                Some(StepTarget::Workflow(_)) | None => true,
            };

            let deps: BTreeSet<usize> = if barrier {
                (0..i).collect()
            } else if let Some(tpl) = step.template() {
                template::placeholders(tpl)
                    .iter()
                    .filter(|name| name.as_str() != CONNECTOR)
                    .flat_map(move |name| {
                        steps[..i].iter().enumerate().filter_map(move |(j, earlier)| {
                            (earlier.name == *name || placeholder_name(&earlier.name) == *name)
                                .then_some(j)
                        })
                    })
                    .collect()
            } else if step.literal_prompt().is_some() {
                BTreeSet::new()
            } else {
                i.checked_sub(1).into_iter().collect()
            };
            dependencies.push(deps);
        }

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        for (i, deps) in dependencies.iter().enumerate() {
            if current.iter().any(|member| deps.contains(member)) {
                groups.push(std::mem::take(&mut current));
            }
            current.push(i);
        }
        if !current.is_empty() {
            groups.push(current);
        }

        Self {
            dependencies,
            implicit_inputs,
            groups,
        }
    }

    /// Step indices per group, in execution order.
    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Indices of the earlier steps step `index` waits for.
    pub fn dependencies(&self, index: usize) -> Option<&BTreeSet<usize>> {
        self.dependencies.get(index)
    }

    /// The earlier step feeding step `index` through the running output.
    /// Such a step cannot run once that predecessor has failed.
    pub fn implicit_input(&self, index: usize) -> Option<usize> {
        self.implicit_inputs.get(index).copied().flatten()
    }

    pub fn fan_out_groups(&self) -> impl Iterator<Item = &Vec<usize>> {
        self.groups.iter().filter(|g| g.len() > 1)
    }
}
