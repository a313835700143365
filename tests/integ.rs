use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use anyhow::Result;
use dockopt::{App, Args};
use tempfile::tempdir;

/// These integration tests mutate process-global environment variables
/// (TMPDIR, the scheduler/program paths). Left alone they race each other and
/// leak a TMPDIR that points into an already-deleted tempdir. This guard
/// serializes the tests and restores the touched vars when each one finishes.
fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

const SANDBOXED_ENV_VARS: [&str; 4] =
    ["DOCKOPT_PROGRAMS_DIR", "SBATCH_EXEC", "SQUEUE_EXEC", "TMPDIR"];

struct TestEnv {
    _guard: MutexGuard<'static, ()>,
    saved: Vec<(&'static str, Option<String>)>,
}

impl TestEnv {
    fn new() -> Self {
        let guard = env_lock().lock().unwrap_or_else(|e| e.into_inner());
        let saved = SANDBOXED_ENV_VARS
            .iter()
            .map(|v| (*v, std::env::var(v).ok()))
            .collect();
        Self { _guard: guard, saved }
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        for (k, v) in &self.saved {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }
    }
}

fn basic_args(job_dir: String) -> Args {
    Args {
        init: false,
        job_dir,
        config: None,
        scheduler: None,
        actives_tgz: None,
        decoys_tgz: None,
        max_reattempts: 0,
        timeout_minutes: None,
        poll_interval_seconds: 0,
        yes: true,
        verbose: 1,
        dry_run: false,
    }
}

fn run_app(args: Args) -> Result<()> {
    let settings = args.try_into()?;
    App::new(settings).run()
}

fn write_executable(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn write_stub_programs(dir: &Path) {
    let stub = |name: &str, body: &str| {
        write_executable(&dir.join(name), &format!("#!/bin/sh\n{body}\n"));
    };
    stub(
        "dms",
        "while [ $# -gt 0 ]; do if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi; shift; done\n\
         echo surface > \"$out\"",
    );
    stub(
        "sphgen",
        "out=$(tail -n 1 INSPH)\n\
         printf 'header line\\n    1    1.00000    2.00000    3.00000    1.400\\n' > \"$out\"",
    );
    stub("makespheres3", "cp \"$1\" \"$3\"");
    stub("makespheres1", "cp \"$2\" \"$4\"");
    stub("makebox", "echo box > \"$2\"");
    stub(
        "qnifft",
        "phi=$(grep '^phi_file=' qnifft.parm | cut -d= -f2)\n\
         size=$(grep '^phi_size_file=' qnifft.parm | cut -d= -f2)\n\
         echo phi > \"$phi\"\necho 193 > \"$size\"",
    );
    stub("solvmap", "echo solv > \"$3\"");
    stub("chemgrid", "echo vdw > vdw.vdw\necho bmp > vdw.bmp");
}

/// An sbatch stand-in that "runs" the docking job synchronously: it unpacks
/// the --export env assignments, then drops plausible OUTDOCK files into the
/// job's task dirs so the poll loop sees a completed job.
const FAKE_SBATCH: &str = r#"#!/bin/bash
for arg in "$@"; do
  case "$arg" in
    --export=*)
      rest="${arg#--export=}"
      IFS=',' read -ra kvs <<< "$rest"
      for kv in "${kvs[@]}"; do
        case "$kv" in
          ALL) ;;
          *=*) export "$kv" ;;
        esac
      done
      ;;
  esac
done
cat > "$EXPORT_DEST/1/OUTDOCK.0" <<'ODK'
open the file: /db/actives/a1.db2
  1  A1  1  -42.50
close the file: /db/actives/a1.db2
open the file: /db/actives/a2.db2
  1  A2  1  -40.10
close the file: /db/actives/a2.db2
ODK
cat > "$EXPORT_DEST/2/OUTDOCK.0" <<'ODK'
open the file: /db/decoys/d1.db2
  1  D1  1  -41.00
close the file: /db/decoys/d1.db2
open the file: /db/decoys/d2.db2
  1  D2  1  -20.00
close the file: /db/decoys/d2.db2
ODK
echo "Submitted batch job 1"
"#;

const TEST_CONFIG: &str = "\
pipeline:
  criterion: enrichment_score
  top_n: 1
  components:
    - step:
        parameters:
          dock_files_generation:
            matching_spheres.num_spheres: 45
            box.margin: 10.0
            vdw.grid_spacing: [0.2, 0.4]
          dock_files_modification:
            matching_spheres_perturbation.use: false
            matching_spheres_perturbation.num_samples_per_matching_spheres_file: 1
            matching_spheres_perturbation.max_deviation_angstroms: 0.0
            matching_spheres_perturbation.seed: 0
          indock:
            distance_tolerance: 1.5
            match_goal: 1000
            nodes_maximum: 4
            nodes_minimum: 4
            bump_maximum: 100.0
            electrostatic_scale: 1.0
            vdw_scale: 1.0
            internal_scale: 0.0
            ligand_desolv_scale: 1.0
            number_save: 1
            number_write: 1
";

const INPUT_FILE_NAMES: [&str; 5] = [
    "rec.crg.pdb",
    "rec.site",
    "radii",
    "prot.table.ambcrg.ambH",
    "vdw.parms.amb.mindock",
];

/// Lay out a complete job directory plus the stub programs and scheduler,
/// and point the relevant env vars at them.
fn prepare_job_dir(root: &Path) -> PathBuf {
    let job_dir = root.join("job");
    fs::create_dir(&job_dir).unwrap();
    for name in INPUT_FILE_NAMES {
        fs::write(job_dir.join(name), "input contents\n").unwrap();
    }
    fs::write(job_dir.join("actives.tgz"), "tarball bytes").unwrap();
    fs::write(job_dir.join("decoys.tgz"), "tarball bytes").unwrap();
    fs::write(job_dir.join("dockopt_config.yaml"), TEST_CONFIG).unwrap();

    let programs_dir = root.join("programs");
    fs::create_dir(&programs_dir).unwrap();
    write_stub_programs(&programs_dir);

    let sbatch = root.join("sbatch");
    write_executable(&sbatch, FAKE_SBATCH);
    let squeue = root.join("squeue");
    write_executable(&squeue, "#!/bin/sh\nexit 0\n");

    let tmp_dir = root.join("tmp");
    fs::create_dir(&tmp_dir).unwrap();

    std::env::set_var("DOCKOPT_PROGRAMS_DIR", &programs_dir);
    std::env::set_var("SBATCH_EXEC", &sbatch);
    std::env::set_var("SQUEUE_EXEC", &squeue);
    std::env::set_var("TMPDIR", &tmp_dir);

    job_dir
}

#[test]
fn test_full_run_and_rerun() -> Result<()> {
    let _env = TestEnv::new();
    let root = tempdir()?;
    let job_dir = prepare_job_dir(root.path());

    let mut args = basic_args(job_dir.to_str().unwrap().to_owned());
    args.scheduler = Some("slurm".to_owned());
    run_app(args)?;

    // two configurations (two grid spacings) share everything upstream:
    let working = job_dir.join("1/working");
    assert!(working.join("rec.ms_1").exists(), "shared surface exists");
    assert!(!working.join("rec.ms_2").exists(), "surface was deduplicated");
    assert!(working.join("vdw.vdw_1").exists());
    assert!(working.join("vdw.vdw_2").exists());
    assert!(working.join("INDOCK_1").exists());
    assert!(working.join("INDOCK_2").exists());

    // both jobs completed and were scored:
    let results = fs::read_to_string(job_dir.join("1/results.csv"))?;
    let lines: Vec<&str> = results.lines().collect();
    assert_eq!(lines.len(), 3, "header + one row per configuration");
    assert!(lines[0].contains("enrichment_score"));
    assert!(lines[0].contains("job_dir_path"));
    assert!(lines[0].contains("parameters.dock_files_generation.vdw.grid_spacing"));

    // the winner was promoted with its dock files:
    let best = job_dir.join("1/best_retrodock_jobs/1");
    assert!(best.join("1/OUTDOCK.0").exists());
    assert!(best.join("dockfiles").is_dir());
    assert!(best.join("dockfiles").join("INDOCK_1").exists() || best.join("dockfiles").join("INDOCK_2").exists());

    // rerunning is a no-op for materialized artifacts and completed jobs:
    let surface_mtime = fs::metadata(working.join("rec.ms_1"))?.modified()?;
    let mut args = basic_args(job_dir.to_str().unwrap().to_owned());
    args.scheduler = Some("slurm".to_owned());
    run_app(args)?;
    assert_eq!(
        fs::metadata(working.join("rec.ms_1"))?.modified()?,
        surface_mtime,
        "shared step was not rerun",
    );

    Ok(())
}

#[test]
fn test_init_scaffolds_and_preserves_existing_config() -> Result<()> {
    let _env = TestEnv::new();
    let root = tempdir()?;
    let job_dir = root.path().join("scaffold");

    let mut args = basic_args(job_dir.to_str().unwrap().to_owned());
    args.init = true;
    run_app(args)?;

    let config_path = job_dir.join("dockopt_config.yaml");
    assert!(config_path.exists(), "template config was written");

    // a hand-edited config survives a second init:
    fs::write(&config_path, "pipeline: edited\n")?;
    let mut args = basic_args(job_dir.to_str().unwrap().to_owned());
    args.init = true;
    run_app(args)?;
    assert_eq!(fs::read_to_string(&config_path)?, "pipeline: edited\n");

    Ok(())
}

#[test]
fn test_run_without_inputs_fails_cleanly() -> Result<()> {
    let _env = TestEnv::new();
    let root = tempdir()?;
    let job_dir = root.path().join("empty");
    fs::create_dir(&job_dir)?;
    fs::write(job_dir.join("dockopt_config.yaml"), TEST_CONFIG)?;

    let mut args = basic_args(job_dir.to_str().unwrap().to_owned());
    args.scheduler = Some("slurm".to_owned());
    let err = run_app(args).unwrap_err();
    assert!(err.to_string().contains("decoys TGZ"));
    Ok(())
}
