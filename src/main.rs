//! Pathway Fit CLI - Fit the relay model from `fit.json` in the working directory.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use pathway_fit::{
    compute::RelayModel,
    compute::evolution::{FitContext, FitnessEvaluator, RunOrchestrator},
    schema::{ConversionSpec, FitConfig, JobConfig, ProblemConfig},
    storage::{JsonResultSink, OutputDirectory, load_dataset},
};

const CONFIG_FILE: &str = "fit.json";

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let config_path = Path::new(CONFIG_FILE);
    if !config_path.exists() {
        eprintln!("No {CONFIG_FILE} in the working directory.");
        eprintln!();
        print_example_config();
        std::process::exit(1);
    }

    // Load configuration
    let config_str = fs::read_to_string(config_path).unwrap_or_else(|e| {
        eprintln!("Error reading {CONFIG_FILE}: {e}");
        std::process::exit(1);
    });

    let job: JobConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing {CONFIG_FILE}: {e}");
        std::process::exit(1);
    });

    let (fit, problem) = (&job.fit, &job.problem);

    // Load experimental data
    let dataset = load_dataset(&problem.phospho_dir, &problem.nuclear_dir).unwrap_or_else(|e| {
        eprintln!("Error loading data: {e}");
        std::process::exit(1);
    });

    let conversion =
        ConversionSpec::log_uniform(&problem.minimums, &problem.maximums).unwrap_or_else(|e| {
            eprintln!("Invalid parameter bounds: {e}");
            std::process::exit(1);
        });

    let context = FitContext::new(
        RelayModel,
        conversion,
        dataset,
        problem.initial_state.clone(),
        problem.total_protein.clone(),
        fit,
    )
    .unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    });

    println!("Pathway Fit");
    println!("===========");
    println!("Doses: {:?}", context.dataset().doses());
    println!("Parameters: {}", context.genome_len());
    println!(
        "Population: {}, generations: {}, runs: {}",
        fit.population.size, fit.population.generations, fit.population.runs
    );
    println!();

    let evaluator = FitnessEvaluator::new(context, fit);
    let report_every = (fit.population.generations / 10).max(1);
    let orchestrator = RunOrchestrator::new(fit.clone(), evaluator)
        .unwrap_or_else(|e| {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        })
        .with_callback(move |progress| {
            let last = progress.generation + 1 == progress.total_generations;
            if progress.generation % report_every == 0 || last {
                println!(
                    "  Run {} generation {}/{}: best={:.6e}, median={:.6e}",
                    progress.run,
                    progress.generation,
                    progress.total_generations - 1,
                    progress.best_fitness,
                    progress.median_fitness
                );
            }
        });

    let data_paths = [problem.phospho_dir.as_path(), problem.nuclear_dir.as_path()];
    let output = OutputDirectory::create(
        &problem.save_filename,
        &problem.output_root,
        &data_paths,
        &job,
    )
    .unwrap_or_else(|e| {
        eprintln!("Error preparing output directory: {e}");
        std::process::exit(1);
    });
    let mut sink = JsonResultSink::new(output);

    let start = Instant::now();
    let summaries = orchestrator.run_all(&mut sink).unwrap_or_else(|e| {
        eprintln!("Fit failed: {e}");
        std::process::exit(1);
    });

    println!();
    for summary in &summaries {
        println!(
            "Run {}: best={:.6e} ({:?}, {} generations)",
            summary.run,
            summary.stats.best_fitness,
            summary.stats.stop_reason,
            summary.stats.generations
        );
        if let Some(parameters) = &summary.best_parameters {
            println!("  parameters: {parameters:?}");
        }
    }
    println!();
    println!(
        "Saved {} run(s) to {} in {:.2}s",
        sink.written().len(),
        sink.output().path().display(),
        start.elapsed().as_secs_f32()
    );
}

fn print_example_config() {
    let example = JobConfig {
        fit: FitConfig::default(),
        problem: ProblemConfig {
            phospho_dir: PathBuf::from("data/phospho"),
            nuclear_dir: PathBuf::from("data/nuclear"),
            save_filename: "relay_fit".to_string(),
            output_root: PathBuf::from("."),
            initial_state: vec![0.0, 0.0],
            total_protein: vec![1.0],
            minimums: vec![-4.0; 4],
            maximums: vec![4.0; 4],
        },
    };

    eprintln!("Example configuration ({CONFIG_FILE}):");
    match serde_json::to_string_pretty(&example) {
        Ok(json) => eprintln!("{json}"),
        Err(e) => eprintln!("Error serializing example: {e}"),
    }
}
