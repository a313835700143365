use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use graph::GraphBuilder;
use jobs::{DockingJob, JobQueue, JobScheduler, ProcessedJob, SubmitOutcome};
use steps::{generation_steps, ParamValue, ProgramDirs};

use crate::exec::GraphExecutor;
use crate::fs::{Fs, JobPaths};
use crate::settings::Settings;
use crate::ui::Ui;

use super::config::{ConfigFile, ParamEntry, StepConfig};
use super::results::{ResultsRow, ResultsTable};
use super::{assemble, expand, outdock, results, score, Error};

/// Everything a pipeline run needs, wired up by the `App`.
pub struct PipelineCtx<'a> {
    pub settings: &'a Settings,
    pub fs: &'a Fs,
    pub ui: &'a Ui,
    pub scheduler: &'a dyn JobScheduler,
    pub config: &'a ConfigFile,
    pub programs: ProgramDirs,
    pub temp_storage_path: String,
}

/// Run every pipeline component in declared order. Each component's ranked
/// results table is persisted and handed to the next component so its '^'
/// parameter references resolve against the best configuration so far.
pub fn run_pipeline(ctx: &PipelineCtx) -> Result<ResultsTable> {
    let criterion = &ctx.config.pipeline.criterion;
    if criterion != score::ENRICHMENT_SCORE {
        return Err(Error::UnknownCriterion(criterion.clone()).into());
    }

    let mut previous: Option<ResultsTable> = None;
    for (i, component) in ctx.config.pipeline.components.iter().enumerate() {
        let id = (i + 1).to_string();
        eprintln!("\n{} {id}\n", "Running pipeline component".magenta());
        let table = run_component(ctx, &id, &component.step, previous.as_ref())
            .with_context(|| format!("while running pipeline component {id}"))?;
        previous = Some(table);
    }
    previous.ok_or_else(|| Error::EmptyPipeline.into())
}

fn run_component(
    ctx: &PipelineCtx,
    id: &str,
    step: &StepConfig,
    previous: Option<&ResultsTable>,
) -> Result<ResultsTable> {
    let paths = JobPaths::for_component(ctx.fs.job_dir(), id);
    let working_dir = paths.working_dir();
    ctx.fs.create_dir(&working_dir)?;
    ctx.fs.create_dir(paths.retrodock_jobs_dir())?;

    // expand the parameter grids:
    let params = &step.parameters;
    let generation_dicts = expand::expand(
        &params.dock_files_generation,
        "dock_files_generation",
        previous,
    )?;
    let modification_dicts = expand::expand(
        &params.dock_files_modification,
        "dock_files_modification",
        previous,
    )?;
    let indock_dicts = expand::expand(&params.indock, "indock", previous)?;
    let dock_executables = resolve_dock_executables(params.custom_dock_executable.as_ref(), previous)?;
    log::info!(
        "expanded parameter grids: {} generation x {} modification x {} indock x {} executables",
        generation_dicts.len(),
        modification_dicts.len(),
        indock_dicts.len(),
        dock_executables.len(),
    );

    // build the merged dock-file graph:
    ctx.ui.verbose_progress("Building dock file graph");
    let mut builder = GraphBuilder::new();
    for dict in &generation_dicts {
        let steps = generation_steps(dict, &ctx.programs)?;
        builder.add_configuration(&steps)?;
    }
    let (graph, combos) = builder.finish()?;
    ctx.ui.done();
    log::info!(
        "graph has {} nodes and {} step instances for {} configurations",
        graph.num_nodes(),
        graph.num_steps(),
        combos.len(),
    );

    stage_input_files(ctx, &graph, &working_dir)?;

    // materialize every demanded dock file:
    let mut executor = GraphExecutor::new(&graph, ctx.fs, &working_dir, ctx.ui.verbose);
    for combo in &combos {
        for node in &combo.nodes {
            executor.ensure_materialized(*node)?;
        }
    }
    log::info!("materialization ran {} steps", executor.runs());

    // expand perturbation variants, write control files:
    let configurations = assemble::assemble_configurations(
        ctx.fs,
        &working_dir,
        &graph,
        &combos,
        &generation_dicts,
        &modification_dicts,
        &indock_dicts,
        &dock_executables,
    )?;
    eprintln!(
        "{} docking configurations prepared.",
        configurations.len().to_string().green()
    );

    write_sdi_file(ctx, &paths)?;

    let mut jobs = create_jobs(ctx, &paths, &configurations)?;
    for job in &mut jobs {
        let outcome = job.submit(ctx.scheduler, true)?;
        log_submission(job, outcome);
    }

    // poll to completion and score:
    let queue = JobQueue::new(ctx.settings.max_reattempts, ctx.settings.poll_interval);
    let fs = ctx.fs;
    let processed = queue.process(ctx.scheduler, jobs, |job| score_job(fs, job))?;

    if processed.is_empty() {
        return Err(Error::AllJobsFailed(configurations.len()).into());
    }
    if processed.len() < configurations.len() {
        log::warn!(
            "finished only {} out of {} docking jobs",
            processed.len(),
            configurations.len(),
        );
    } else {
        log::info!("finished all {} docking jobs", configurations.len());
    }

    let table = make_table(&configurations, processed);
    table.write_csv(ctx.fs, &paths.results_csv())?;
    promote_best(ctx, &paths, &table)?;
    Ok(table)
}

/// Copy the user-supplied input files into the working directory under their
/// numbered graph names. A missing input is fatal before anything runs.
fn stage_input_files(ctx: &PipelineCtx, graph: &graph::BuildGraph, working_dir: &PathBuf) -> Result<()> {
    for (node, artifact) in graph.artifacts() {
        if graph.producer(node).is_some() {
            continue;
        }
        let staged = working_dir.join(&artifact.file_name);
        if ctx.fs.exists(&staged) {
            continue;
        }
        let source = ctx.fs.job_dir().join(&artifact.logical_name);
        if !ctx.fs.exists(&source) {
            return Err(Error::InputFileMissing(artifact.logical_name.clone()).into());
        }
        ctx.fs.copy(&source, &staged)?;
    }
    Ok(())
}

fn resolve_dock_executables(
    entry: Option<&ParamEntry>,
    previous: Option<&ResultsTable>,
) -> Result<Vec<String>> {
    let Some(entry) = entry else {
        return Ok(vec![default_dock_executable()]);
    };
    let values = expand::resolve_entry(entry, "", "custom_dock_executable", previous)?;
    values
        .into_iter()
        .map(|v| match v {
            ParamValue::Str(path) => Ok(path),
            _ => Err(Error::BadDockExecutable.into()),
        })
        .collect()
}

fn default_dock_executable() -> String {
    std::env::var(super::DOCK_EXECUTABLE_ENV_VAR)
        .unwrap_or_else(|_| super::DEFAULT_DOCK_EXECUTABLE.to_owned())
}

fn dock_run_script() -> PathBuf {
    std::env::var(super::DOCK_RUN_SCRIPT_ENV_VAR)
        .unwrap_or_else(|_| super::DEFAULT_DOCK_RUN_SCRIPT.to_owned())
        .into()
}

/// Actives first, decoys second: the line order defines the task ids.
fn write_sdi_file(ctx: &PipelineCtx, paths: &JobPaths) -> Result<()> {
    let text = format!(
        "{}\n{}\n",
        ctx.settings.actives_tgz.display(),
        ctx.settings.decoys_tgz.display(),
    );
    ctx.fs.write_file(paths.sdi_file(), &text)
}

const ACTIVES_TASK_ID: &str = "1";
const DECOYS_TASK_ID: &str = "2";

fn create_jobs(
    ctx: &PipelineCtx,
    paths: &JobPaths,
    configurations: &[assemble::DockingConfiguration],
) -> Result<Vec<DockingJob>> {
    let run_script = dock_run_script();
    let component_tag = graph::hash::hash_one(paths.component_dir().display());
    let working_dir = paths.working_dir();

    let mut jobs = Vec::with_capacity(configurations.len());
    for (i, configuration) in configurations.iter().enumerate() {
        let job_dir = paths.retrodock_job_dir(i + 1);
        let env_vars = vec![
            ("EXPORT_DEST".to_owned(), job_dir.display().to_string()),
            ("TMPDIR".to_owned(), ctx.temp_storage_path.clone()),
            ("SDI_FILE".to_owned(), paths.sdi_file().display().to_string()),
            ("DOCK_FILES_DIR".to_owned(), working_dir.display().to_string()),
            (
                "INDOCK_FILE".to_owned(),
                working_dir
                    .join(&configuration.indock_file_name)
                    .display()
                    .to_string(),
            ),
            (
                "DOCK_EXECUTABLE".to_owned(),
                configuration.dock_executable_path.clone(),
            ),
        ];
        jobs.push(DockingJob::create(
            format!("dockopt_{}_{}", &component_tag.as_str()[..12], i + 1),
            &job_dir,
            vec![ACTIVES_TASK_ID.to_owned(), DECOYS_TASK_ID.to_owned()],
            run_script.clone(),
            env_vars,
            ctx.settings.timeout_minutes,
        )?);
    }
    Ok(jobs)
}

fn log_submission(job: &DockingJob, outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Submitted => log::info!("submitted job \"{}\"", job.name),
        SubmitOutcome::SubmitFailed => {
            log::warn!("job \"{}\" was rejected at submission time", job.name)
        }
        SubmitOutcome::SkippedAlreadyComplete => {
            log::info!("job \"{}\" is already complete; not resubmitting", job.name)
        }
        SubmitOutcome::SkippedOnQueue => {
            log::info!("job \"{}\" is still on the scheduler queue", job.name)
        }
    }
}

/// Parse both task outputs, rank, and score. Any failure here counts as a
/// job failure for retry purposes.
fn score_job(fs: &Fs, job: &DockingJob) -> Result<f64> {
    let actives = outdock::parse_outdock(fs, &job.task_sentinel_path(ACTIVES_TASK_ID), true)?;
    let decoys = outdock::parse_outdock(fs, &job.task_sentinel_path(DECOYS_TASK_ID), false)?;

    let mut molecules = actives;
    molecules.extend(decoys);
    let ranked = results::rank_molecules(molecules);

    let booleans: Vec<bool> = ranked.iter().map(|m| m.is_active).collect();
    Ok(score::enrichment_score(&booleans)?)
}

fn make_table(
    configurations: &[assemble::DockingConfiguration],
    processed: Vec<ProcessedJob<f64>>,
) -> ResultsTable {
    let rows = processed
        .into_iter()
        .map(|p| {
            let configuration = &configurations[p.index];
            let mut dock_files = configuration.dock_files.named();
            dock_files.push((
                "indock_file".to_owned(),
                configuration.indock_file_name.clone(),
            ));
            ResultsRow {
                params: configuration.params.clone(),
                criterion: p.row,
                dock_files,
                job_dir_path: p.job.dir.display().to_string(),
            }
        })
        .collect();
    ResultsTable::new(score::ENRICHMENT_SCORE, rows)
}

/// Copy the top-N winners into stable numbered slots, with their dock files
/// alongside so a winning setup can be reused directly.
fn promote_best(ctx: &PipelineCtx, paths: &JobPaths, table: &ResultsTable) -> Result<()> {
    let best_dir = paths.best_retrodock_jobs_dir();
    if ctx.fs.exists(&best_dir) {
        ctx.fs.delete_dir(&best_dir)?;
    }
    ctx.fs.create_dir(&best_dir)?;

    let working_dir = paths.working_dir();
    for (rank, row) in table.top_n(ctx.config.pipeline.top_n).iter().enumerate() {
        let dst = paths.best_retrodock_job_dir(rank + 1);
        ctx.fs
            .copy(&row.job_dir_path, &dst)
            .context("copying winning job dir")?;

        let dockfiles_dir = dst.join("dockfiles");
        ctx.fs.create_dir(&dockfiles_dir)?;
        for (_, file_name) in &row.dock_files {
            ctx.fs
                .copy(working_dir.join(file_name), dockfiles_dir.join(file_name))
                .context("copying winning dock file")?;
        }
    }
    Ok(())
}
