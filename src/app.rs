use anyhow::{Context, Result};
use colored::Colorize;

use steps::{names, ProgramDirs};

use crate::fs::{paths, Fs};
use crate::pipeline::{self, config, PipelineCtx};
use crate::settings::Settings;
use crate::ui::Ui;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Config file not found. Are you in the job directory?")]
    ConfigNotFound,
    #[error("Actives TGZ file and/or decoys TGZ file not found. Did you put them in the job directory?")]
    InputTarballsNotFound,
    #[error("The TMPDIR environment variable is required to submit docking jobs")]
    TmpdirMissing,
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let fs = Fs::new(&settings.job_dir, settings.dry_run);
        let ui = Ui::new(&settings);
        Self { settings, fs, ui }
    }

    /// Run the app, using settings to determine what to do.
    pub fn run(mut self) -> Result<()> {
        if self.settings.verbose > 0 {
            eprintln!("Using job directory {:?}", self.settings.job_dir);
        }
        self.fs.ensure_job_dir_exists(self.settings.verbose > 0)?;

        if self.settings.init {
            self.scaffold()?;
        }

        if self.settings.run {
            self.run_pipeline()?;
        }

        Ok(())
    }
}

// SCAFFOLDING (--init) //////////////////
impl App {
    /// Create a fresh job directory: copy in whatever recognized input files
    /// sit in the current directory, and write the template config.
    fn scaffold(&self) -> Result<()> {
        let mut copied = 0;
        let mut missing = Vec::with_capacity(8);
        let candidates = names::INPUT_FILE_NAMES
            .iter()
            .chain([paths::ACTIVES_TGZ_FILE_NAME, paths::DECOYS_TGZ_FILE_NAME].iter());
        for name in candidates {
            let src = std::path::Path::new(name);
            let dst = self.fs.job_dir().join(name);
            if self.fs.exists(&dst) {
                continue;
            }
            if src.is_file() {
                log::info!("copying {name} into job directory");
                self.fs.copy(src, &dst)?;
                copied += 1;
            } else {
                missing.push(*name);
            }
        }
        if !missing.is_empty() {
            eprintln!(
                "The following files were not found in the current directory; \
                 add them to the job directory before running:\n\t{}",
                missing.join("\n\t"),
            );
        }

        let config_path = self.fs.job_dir().join(paths::CONFIG_FILE_NAME);
        if self.fs.exists(&config_path) {
            eprintln!("A config file already exists: {:?}", config_path);
        } else {
            eprintln!("Writing config file: {:?}", config_path);
            self.fs
                .write_file(&config_path, config::DEFAULT_CONFIG_YAML)?;
        }

        eprintln!(
            "\n{} ({} input files copied in).",
            "Job directory ready".green(),
            copied,
        );
        Ok(())
    }
}

// RUNNING /////////////////
impl App {
    fn run_pipeline(&mut self) -> Result<()> {
        if !self.fs.exists(&self.settings.config) {
            return Err(Error::ConfigNotFound.into());
        }
        if !self.fs.exists(&self.settings.actives_tgz) || !self.fs.exists(&self.settings.decoys_tgz)
        {
            return Err(Error::InputTarballsNotFound.into());
        }

        let scheduler_kind = self.settings.require_scheduler()?;
        let scheduler = scheduler_kind.from_env()?;
        let temp_storage_path = std::env::var("TMPDIR").map_err(|_| Error::TmpdirMissing)?;

        self.ui.verbose_progress_debug("Loading config file", &self.settings.config);
        let config = config::load(&self.fs, &self.settings.config)?;
        self.ui.done();
        log::info!(
            "pipeline has {} component(s), criterion {}, top_n {}",
            config.pipeline.components.len(),
            config.pipeline.criterion,
            config.pipeline.top_n,
        );

        if self.settings.dry_run {
            eprintln!(
                "{}; config and scheduler check out, not running anything.",
                "Dry run".green()
            );
            return Ok(());
        }
        if !self.ui.confirm("Proceed?")? {
            return Ok(());
        }

        self.ui.start_timer();
        let ctx = PipelineCtx {
            settings: &self.settings,
            fs: &self.fs,
            ui: &self.ui,
            scheduler: scheduler.as_ref(),
            config: &config,
            programs: ProgramDirs::from_env(),
            temp_storage_path,
        };
        let table = pipeline::run_pipeline(&ctx).context("while running pipeline")?;
        self.ui.print_elapsed("Pipeline run")?;

        eprintln!("\n{}.", "Pipeline complete".green());
        if let Some(best) = table.best() {
            eprintln!(
                "Best configuration scored {} ({}); see {:?}.",
                format!("{:.4}", best.criterion).cyan(),
                table.criterion_name,
                best.job_dir_path,
            );
        }
        Ok(())
    }
}
