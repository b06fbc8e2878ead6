use std::sync::Arc;

use stampede_core::run_load_test;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::plan::{self, PlanYaml};
use crate::run_error::RunError;
use crate::workflow;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let file = match &args.plan {
        Some(path) => plan::load_plan(path)
            .await
            .map_err(RunError::InvalidInput)?,
        None => PlanYaml::default(),
    };

    let resolved = plan::resolve(&args, file).map_err(RunError::InvalidInput)?;
    resolved
        .run
        .validate()
        .map_err(|e| RunError::InvalidInput(e.into()))?;

    let out = output::formatter(resolved.output);
    out.print_header(&resolved);

    let workflow_cfg = Arc::new(resolved.workflow.clone());
    let report = run_load_test(resolved.run.clone(), move |ctx| {
        let cfg = workflow_cfg.clone();
        async move { workflow::run_iteration(&cfg, &ctx).await }
    })
    .await
    .map_err(|e| RunError::RuntimeError(e.into()))?;

    out.print_summary(&report)
        .map_err(RunError::RuntimeError)?;

    Ok(ExitCode::from_verdict(report.verdict.passed))
}
