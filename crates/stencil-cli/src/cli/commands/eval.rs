use std::sync::Arc;

use anyhow::Context;
use stencil_core::{
    GraderType, NewEvaluationSet, Orchestrator, RunStatus, StencilError, TestCaseRecord,
};
use stencil_evals::EvalsClient;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::args::{EvalArgs, EvalCmd};
use crate::cli::helpers::{find_doc_id, parse_vars, read_file, Workspace};
use crate::exit_codes::{REMOTE_ERROR, SUCCESS};

pub async fn run(args: EvalArgs, ws: &Workspace) -> anyhow::Result<i32> {
    match args.cmd {
        EvalCmd::CreateSet {
            slug,
            name,
            grader,
            grader_config,
        } => {
            let doc_id = find_doc_id(&ws.documents(), &slug)?;
            let mut new = NewEvaluationSet::new(doc_id, name, GraderType::parse(&grader));
            if let Some(raw) = grader_config {
                let value = serde_json::from_str(&raw)
                    .context("--grader-config must be valid JSON")?;
                new = new.with_config(value);
            }
            let set = ws.store.insert_evaluation_set(&new)?;
            println!("{}\t{}\t{}", set.id, set.grader_type.as_str(), set.name);
            Ok(SUCCESS)
        }
        EvalCmd::AddCase {
            set_id,
            expected,
            vars,
            description,
        } => {
            ws.store.get_evaluation_set(set_id)?;
            let record = TestCaseRecord {
                input_variables: parse_vars(&vars)?,
                expected_output: expected,
                description,
            };
            let case = ws.store.insert_test_case(set_id, &record)?;
            println!("{}", case.id);
            Ok(SUCCESS)
        }
        EvalCmd::Import { set_id, file } => {
            ws.store.get_evaluation_set(set_id)?;
            let text = read_file(&file)?;
            let mut records = Vec::new();
            for (idx, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: TestCaseRecord = serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: invalid test case", file.display(), idx + 1))?;
                records.push(record);
            }
            let count = ws.store.import_test_cases(set_id, &records)?;
            println!("imported {} test cases", count);
            Ok(SUCCESS)
        }
        EvalCmd::Run { set_id, version } => execute(set_id, version, ws).await,
        EvalCmd::Runs { set_id } => {
            for run in ws.store.list_runs(set_id)? {
                let rate = run
                    .pass_rate()
                    .map(|r| format!("{:.1}%", r * 100.0))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}/{}\t{}\t{}",
                    run.id,
                    run.status,
                    run.counts.passed,
                    run.counts.total,
                    rate,
                    run.error_message.as_deref().unwrap_or("")
                );
            }
            Ok(SUCCESS)
        }
    }
}

async fn execute(set_id: i64, version: Option<u32>, ws: &Workspace) -> anyhow::Result<i32> {
    let client = EvalsClient::from_env().map_err(StencilError::from)?;
    let orchestrator = Orchestrator::new(ws.store.clone(), Arc::new(client))
        .with_poll(ws.config.poll_config());
    let run = orchestrator.create_run(set_id, version)?;

    let token = CancellationToken::new();
    let watcher = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, canceling evaluation");
                token.cancel();
            }
        })
    };
    let result = orchestrator.execute_with_cancel(run.id, &token).await;
    watcher.abort();
    let run = result?;

    println!("run {}: {}", run.id, run.status);
    match run.status {
        RunStatus::Completed => {
            println!(
                "passed {} / {} (failed {})",
                run.counts.passed, run.counts.total, run.counts.failed
            );
            if let Some(url) = &run.report_url {
                println!("report: {}", url);
            }
            Ok(SUCCESS)
        }
        _ => {
            if let Some(msg) = &run.error_message {
                eprintln!("error: {}", msg);
            }
            Ok(REMOTE_ERROR)
        }
    }
}
