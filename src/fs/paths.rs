use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "dockopt_config.yaml";
pub const ACTIVES_TGZ_FILE_NAME: &str = "actives.tgz";
pub const DECOYS_TGZ_FILE_NAME: &str = "decoys.tgz";
pub const RESULTS_CSV_FILE_NAME: &str = "results.csv";
pub const SDI_FILE_NAME: &str = "actives_and_decoys.sdi";

const WORKING_DIR_NAME: &str = "working";
const RETRODOCK_JOBS_DIR_NAME: &str = "retrodock_jobs";
const BEST_RETRODOCK_JOBS_DIR_NAME: &str = "best_retrodock_jobs";

/// Well-known paths inside one pipeline component's directory.
///
/// Components are laid out as `<job_dir>/<component_id>/`, each with its own
/// working directory (the build graph's realm), a directory of submitted
/// docking jobs, and a directory of promoted winners.
#[derive(Debug, Clone)]
pub struct JobPaths {
    component_dir: PathBuf,
}

impl JobPaths {
    pub fn for_component(job_dir: &Path, component_id: &str) -> Self {
        Self {
            component_dir: job_dir.join(component_id),
        }
    }

    pub fn component_dir(&self) -> &Path {
        &self.component_dir
    }

    pub fn working_dir(&self) -> PathBuf {
        self.component_dir.join(WORKING_DIR_NAME)
    }

    pub fn retrodock_jobs_dir(&self) -> PathBuf {
        self.component_dir.join(RETRODOCK_JOBS_DIR_NAME)
    }

    pub fn retrodock_job_dir(&self, job_num: usize) -> PathBuf {
        self.retrodock_jobs_dir().join(job_num.to_string())
    }

    pub fn best_retrodock_jobs_dir(&self) -> PathBuf {
        self.component_dir.join(BEST_RETRODOCK_JOBS_DIR_NAME)
    }

    pub fn best_retrodock_job_dir(&self, rank: usize) -> PathBuf {
        self.best_retrodock_jobs_dir().join(rank.to_string())
    }

    pub fn results_csv(&self) -> PathBuf {
        self.component_dir.join(RESULTS_CSV_FILE_NAME)
    }

    pub fn sdi_file(&self) -> PathBuf {
        self.component_dir.join(SDI_FILE_NAME)
    }
}
