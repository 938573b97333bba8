//! cellscript - convert spreadsheet formula jobs into standalone Rhai scripts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use cellscript_core::{ConversionJob, ExecutionOutcome, Sandbox, SandboxLimits, convert};

fn print_usage() {
    eprintln!("Usage: cellscript [OPTIONS] <JOB_FILE>");
    eprintln!("       cellscript run <SCRIPT_FILE>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <JOB_FILE>               Conversion job JSON from the parsing collaborator");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output <FILE>      Save the generated script instead of executing it");
    eprintln!("      --force-evaluator    Defer every formula to the runtime evaluator");
    eprintln!("      --no-exec            Print the script without sandboxed execution");
    eprintln!("      --timeout <SECONDS>  Wall-clock limit for execution (default: 30)");
    eprintln!("  -h, --help               Print help");
    eprintln!();
    eprintln!("The `run` subcommand evaluates a generated script directly; the");
    eprintln!("sandbox uses it as the child-process entry point.");
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() >= 2 && args[1] == "run" {
        if args.len() != 3 {
            eprintln!("Error: `run` requires exactly one script path");
            std::process::exit(2);
        }
        let code = match run_script_file(Path::new(&args[2])) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                1
            }
        };
        std::process::exit(code);
    }

    let mut job_path: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut force_evaluator = false;
    let mut no_exec = false;
    let mut timeout_seconds: u64 = 30;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --output requires a file path");
                    std::process::exit(2);
                }
                output = Some(PathBuf::from(&args[i]));
            }
            "--force-evaluator" => {
                force_evaluator = true;
            }
            "--no-exec" => {
                no_exec = true;
            }
            "--timeout" => {
                i += 1;
                let value = args.get(i).and_then(|v| v.parse::<u64>().ok());
                let Some(value) = value else {
                    eprintln!("Error: --timeout requires a number of seconds");
                    std::process::exit(2);
                };
                timeout_seconds = value;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(2);
            }
            _ => {
                if job_path.is_none() {
                    job_path = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: Unexpected argument: {}", args[i]);
                    print_usage();
                    std::process::exit(2);
                }
            }
        }
        i += 1;
    }

    let Some(job_path) = job_path else {
        print_usage();
        std::process::exit(2);
    };

    let code = match convert_command(
        &job_path,
        output.as_deref(),
        force_evaluator,
        no_exec,
        timeout_seconds,
    ) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn convert_command(
    job_path: &Path,
    output: Option<&Path>,
    force_evaluator: bool,
    no_exec: bool,
    timeout_seconds: u64,
) -> Result<i32> {
    let mut job = ConversionJob::from_file(job_path)
        .with_context(|| format!("failed to load job {}", job_path.display()))?;
    if force_evaluator {
        job.force_runtime_fallback = true;
    }

    let conversion = convert(&job)?;
    for warning in conversion.warnings() {
        eprintln!("Warning: {}", warning);
    }

    let script = conversion.runnable_script();

    if let Some(path) = output {
        std::fs::write(path, &script)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved generated script to {}", path.display());
        return Ok(0);
    }

    println!("{}", script);
    if no_exec {
        return Ok(0);
    }

    eprintln!("Executing generated script in sandbox...");
    let limits = SandboxLimits {
        timeout: Duration::from_secs(timeout_seconds),
        ..SandboxLimits::default()
    };
    let sandbox = Sandbox::for_current_exe()?;
    let result = sandbox.run_script(&script, &limits)?;
    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }

    match result.outcome {
        ExecutionOutcome::Completed => Ok(0),
        ExecutionOutcome::TimedOut => {
            eprintln!("Error: script execution timed out");
            Ok(1)
        }
        ExecutionOutcome::Failed(detail) => {
            eprintln!("Error: {}", detail);
            Ok(1)
        }
    }
}

fn run_script_file(path: &Path) -> Result<i32> {
    let script = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    match cellscript_engine::engine::eval_script(&script) {
        Ok(value) => {
            if !value.is_unit() {
                println!("{}", value);
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(1)
        }
    }
}
