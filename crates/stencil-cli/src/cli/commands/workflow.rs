use anyhow::bail;
use stencil_core::{Workflow, WorkflowChain};

use crate::cli::args::{WorkflowArgs, WorkflowCmd};
use crate::cli::helpers::{parse_vars, Workspace};
use crate::exit_codes::SUCCESS;

pub fn run(args: WorkflowArgs, ws: &Workspace) -> anyhow::Result<i32> {
    match args.cmd {
        WorkflowCmd::Save {
            name,
            steps,
            description,
        } => {
            let mut workflow = Workflow::new(name);
            workflow.description = description;
            for step in &steps {
                let Some((key, slug)) = step.split_once('=') else {
                    bail!("expected KEY=SLUG, got {:?}", step);
                };
                workflow = workflow.step(key.trim(), slug.trim());
            }
            let saved = ws.store.save_workflow(&workflow)?;
            println!("{} ({} steps)", saved.name, saved.steps.len());
            Ok(SUCCESS)
        }
        WorkflowCmd::Run {
            name,
            input,
            vars,
            steps,
        } => {
            let workflow = ws.store.get_workflow(&name)?;
            let docs = ws.documents();
            let chain = WorkflowChain::new(&workflow, &docs);
            let variables = parse_vars(&vars)?;
            if !steps {
                println!("{}", chain.execute(&input, variables)?);
                return Ok(SUCCESS);
            }
            let report = chain.execute_with_steps(&input, variables)?;
            for record in &report.steps {
                eprintln!(
                    "[{}] {} ({} ms)",
                    record.key,
                    record.slug,
                    record.elapsed.as_millis()
                );
            }
            println!("{}", report.output);
            Ok(SUCCESS)
        }
        WorkflowCmd::List => {
            for wf in ws.store.list_workflows()? {
                let steps: Vec<String> = wf
                    .ordered_steps()
                    .into_iter()
                    .map(|(key, slug)| format!("{}={}", key, slug))
                    .collect();
                println!("{}\t{}", wf.name, steps.join(" "));
            }
            Ok(SUCCESS)
        }
    }
}
