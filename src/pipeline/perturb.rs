use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use steps::{ParamDict, ParamValue};

use crate::fs::Fs;

use super::sph::SphereFile;
use super::Error;

pub const USE_KEY: &str = "matching_spheres_perturbation.use";
pub const NUM_SAMPLES_KEY: &str = "matching_spheres_perturbation.num_samples_per_matching_spheres_file";
pub const MAX_DEVIATION_KEY: &str = "matching_spheres_perturbation.max_deviation_angstroms";
pub const SEED_KEY: &str = "matching_spheres_perturbation.seed";

/// Whether perturbation is on, validated to be uniform across all
/// modification param dicts. A run may not mix perturbed and unperturbed
/// configurations; a mixed set is a fatal configuration error.
pub fn uniform_use_flag(modification_dicts: &[ParamDict]) -> Result<bool, Error> {
    let mut flags = modification_dicts.iter().map(|d| {
        matches!(d.get(USE_KEY), Some(ParamValue::Bool(true)))
    });
    let first = flags.next().unwrap_or(false);
    if flags.any(|f| f != first) {
        return Err(Error::InconsistentPerturbationFlag);
    }
    Ok(first)
}

/// Expand one matching-spheres file into `num_samples` perturbed variants:
/// every sphere center is translated by an independent uniform draw from
/// `[-max_deviation, +max_deviation]` per axis. Variants that already exist
/// on disk are not regenerated, so reruns are cheap and stable.
///
/// The generator is seeded explicitly (from the config) so a run can be
/// reproduced; the file name salts the seed so variants of different base
/// files differ.
pub fn perturb_matching_spheres(
    fs: &Fs,
    working_dir: &Path,
    base_file_name: &str,
    params: &ParamDict,
) -> Result<Vec<String>> {
    let num_samples = require_int(params, NUM_SAMPLES_KEY)?;
    let max_deviation = require_float(params, MAX_DEVIATION_KEY)?;
    let seed = require_int(params, SEED_KEY)? as u64;

    let base_path = working_dir.join(base_file_name);
    let text = fs
        .read_to_string(&base_path)
        .context("reading matching spheres file for perturbation")?;
    let base = SphereFile::parse(&text)?;

    let mut rng = seeded_rng(seed, base_file_name);

    let mut variant_names = Vec::with_capacity(num_samples as usize);
    for i in 0..num_samples {
        let variant_name = format!("{}_{}", base_file_name, i + 1);
        let variant_path = working_dir.join(&variant_name);
        variant_names.push(variant_name);

        if fs.exists(&variant_path) {
            // keep the rng in step with a fresh run so later variants match:
            let mut sink = base.clone();
            perturb_spheres(&mut sink, max_deviation, &mut rng);
            continue;
        }

        let mut variant = base.clone();
        perturb_spheres(&mut variant, max_deviation, &mut rng);
        fs.write_file(&variant_path, &variant.render())
            .context("writing perturbed matching spheres file")?;
    }
    Ok(variant_names)
}

fn perturb_spheres(file: &mut SphereFile, max_deviation: f64, rng: &mut StdRng) {
    for sphere in &mut file.spheres {
        sphere.x += rng.gen_range(-max_deviation..=max_deviation);
        sphere.y += rng.gen_range(-max_deviation..=max_deviation);
        sphere.z += rng.gen_range(-max_deviation..=max_deviation);
    }
}

fn seeded_rng(seed: u64, file_name: &str) -> StdRng {
    let salt = graph::hash::hash_one(file_name);
    let mut salted = seed;
    for byte in salt.as_str().bytes() {
        salted = salted.wrapping_mul(31).wrapping_add(byte as u64);
    }
    StdRng::seed_from_u64(salted)
}

fn require_int(params: &ParamDict, key: &str) -> Result<i64> {
    match params.get(key) {
        Some(v) => Ok(v.as_int(key)?),
        None => Err(Error::MissingModificationParam(key.to_owned()).into()),
    }
}

fn require_float(params: &ParamDict, key: &str) -> Result<f64> {
    match params.get(key) {
        Some(v) => Ok(v.as_float(key)?),
        None => Err(Error::MissingModificationParam(key.to_owned()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn modification_params(use_flag: bool, samples: i64, deviation: f64, seed: i64) -> ParamDict {
        let mut p = BTreeMap::new();
        p.insert(USE_KEY.to_owned(), ParamValue::Bool(use_flag));
        p.insert(NUM_SAMPLES_KEY.to_owned(), ParamValue::Int(samples));
        p.insert(MAX_DEVIATION_KEY.to_owned(), ParamValue::Float(deviation));
        p.insert(SEED_KEY.to_owned(), ParamValue::Int(seed));
        p
    }

    fn write_base(fs: &Fs, dir: &Path) {
        fs.write_file(
            dir.join("matching_spheres.sph_1"),
            "    1    1.00000    2.00000    3.00000    1.400\n",
        )
        .unwrap();
    }

    #[test]
    fn test_mixed_use_flags_are_fatal() {
        let dicts = vec![
            modification_params(true, 1, 0.1, 0),
            modification_params(false, 1, 0.1, 0),
        ];
        assert!(matches!(
            uniform_use_flag(&dicts),
            Err(Error::InconsistentPerturbationFlag)
        ));
    }

    #[test]
    fn test_uniform_use_flags_pass() {
        let dicts = vec![
            modification_params(true, 1, 0.1, 0),
            modification_params(true, 2, 0.2, 0),
        ];
        assert!(uniform_use_flag(&dicts).unwrap());
    }

    #[test]
    fn test_same_seed_reproduces_identical_variants() {
        let dir = tempfile::tempdir().unwrap();
        let fs = Fs::new(dir.path(), false);
        write_base(&fs, dir.path());
        let params = modification_params(true, 2, 0.5, 42);

        let names = perturb_matching_spheres(&fs, dir.path(), "matching_spheres.sph_1", &params)
            .unwrap();
        assert_eq!(
            names,
            vec!["matching_spheres.sph_1_1", "matching_spheres.sph_1_2"]
        );
        let first = fs.read_to_string(dir.path().join(&names[0])).unwrap();

        // wipe variants, regenerate with the same seed:
        for name in &names {
            fs.delete_file(dir.path().join(name)).unwrap();
        }
        perturb_matching_spheres(&fs, dir.path(), "matching_spheres.sph_1", &params).unwrap();
        let again = fs.read_to_string(dir.path().join(&names[0])).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_existing_variants_are_not_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let fs = Fs::new(dir.path(), false);
        write_base(&fs, dir.path());
        let params = modification_params(true, 1, 0.5, 7);

        perturb_matching_spheres(&fs, dir.path(), "matching_spheres.sph_1", &params).unwrap();
        let path = dir.path().join("matching_spheres.sph_1_1");
        let first = fs.read_to_string(&path).unwrap();
        let first_mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

        perturb_matching_spheres(&fs, dir.path(), "matching_spheres.sph_1", &params).unwrap();
        assert_eq!(fs.read_to_string(&path).unwrap(), first);
        assert_eq!(
            std::fs::metadata(&path).unwrap().modified().unwrap(),
            first_mtime
        );
    }

    #[test]
    fn test_variants_actually_move_the_spheres() {
        let dir = tempfile::tempdir().unwrap();
        let fs = Fs::new(dir.path(), false);
        write_base(&fs, dir.path());
        let params = modification_params(true, 1, 0.5, 3);

        perturb_matching_spheres(&fs, dir.path(), "matching_spheres.sph_1", &params).unwrap();
        let text = fs
            .read_to_string(dir.path().join("matching_spheres.sph_1_1"))
            .unwrap();
        let perturbed = SphereFile::parse(&text).unwrap();
        assert_ne!(perturbed.spheres[0].x, 1.0);
        assert!((perturbed.spheres[0].x - 1.0).abs() <= 0.5);
    }
}
