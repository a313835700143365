use std::fs::File;
use std::io::{stderr, stdout, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::fs::Fs;

const SCRIPT_FILE_NAME: &str = "step.sh";
const STDOUT_FILE_NAME: &str = "stdout.txt";
const STDERR_FILE_NAME: &str = "stderr.txt";

/// Run a step's shell lines as one bash script in `step_dir`, storing stdout
/// and stderr in the same directory. The script is also written to disk as a
/// record of what ran.
/// Based on:
/// <https://stackoverflow.com/questions/66060139/how-to-tee-stdout-stderr-from-a-subprocess-in-rust>
pub fn run_script(lines: &[String], step_dir: &std::path::Path, fs: &Fs, verbose: bool) -> Result<bool> {
    let script = lines.join("\n");
    fs.write_file(step_dir.join(SCRIPT_FILE_NAME), &script)
        .context("writing step.sh record")?;

    let out_file = fs
        .create_file(step_dir.join(STDOUT_FILE_NAME))
        .context("creating stdout.txt file")?;
    let err_file = fs
        .create_file(step_dir.join(STDERR_FILE_NAME))
        .context("creating stderr.txt file")?;

    if verbose {
        eprintln!("{}", "Running step script...".magenta());
    }
    let mut cmd = Command::new("/usr/bin/env");
    cmd.arg("bash")
        .arg("-xeuo")
        .arg("pipefail")
        .arg("-c")
        .arg(&script)
        .current_dir(step_dir);

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|_| panic!("failed to execute step script in {:?}", step_dir));

    let child_out = child.stdout.take().expect("Cannot attach to child stdout");
    let child_err = child.stderr.take().expect("Cannot attach to child stderr");

    let thread_out = thread::spawn(move || {
        communicate(child_out, out_file, stdout()).expect("error communicating with child stdout")
    });
    let thread_err = thread::spawn(move || {
        communicate(child_err, err_file, stderr()).expect("error communicating with child stderr")
    });

    thread_out.join().expect("Error joining stdout thread");
    thread_err.join().expect("Error joining stderr thread");

    let status = child.wait().expect("failed to wait on child process");

    if verbose {
        eprintln!("\n{} with {status}.", "Process finished".green());
    }
    Ok(status.success())
}

fn communicate<R: Read, W: Write>(
    mut stream: R,
    mut file: File,
    mut output: W,
) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        let num_read = stream.read(&mut buf)?;
        if num_read == 0 {
            break;
        }

        let buf = &buf[..num_read];
        file.write_all(buf)?;
        output.write_all(buf)?;
    }

    Ok(())
}
