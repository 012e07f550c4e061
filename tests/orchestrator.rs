//! End-to-end fit: CSV directories in, JSON artifacts out.

use std::fs;
use std::path::Path;

use pathway_fit::{
    compute::RelayModel,
    compute::evolution::{FitContext, FitnessEvaluator, RunOrchestrator},
    schema::{Channel, ConversionSpec, Genome, JobConfig},
    storage::{JsonResultSink, MANIFEST_FILE, OutputDirectory, RunArtifact, load_dataset},
};
use tempfile::TempDir;

/// Relay observables for `k_act = 1, k_deact = 1, k_import = 1, k_export = 1`
/// and `K_tot = 1`, starting from rest.
fn relay_truth(dose: f64, t: f64) -> (f64, f64) {
    let rate = dose + 1.0;
    let p_inf = dose / rate;
    let p = p_inf * (1.0 - (-rate * t).exp());
    // N solves dN/dt = P - N from N(0) = 0.
    let n = if (rate - 1.0).abs() < 1e-12 {
        0.0
    } else {
        p_inf * (1.0 - (-t).exp()) - p_inf / (1.0 - rate) * ((-rate * t).exp() - (-t).exp())
    };
    (p, n)
}

fn write_channel(dir: &Path, channel: Channel, doses: &[f64], times: &[f64]) {
    fs::create_dir_all(dir).unwrap();
    for (i, &dose) in doses.iter().enumerate() {
        let mut csv = String::from("Time,Dose,r1,r2,r3\n");
        for &t in times {
            let (p, n) = relay_truth(dose, t);
            let value = match channel {
                Channel::Phospho => p,
                Channel::Nuclear => n,
            };
            csv.push_str(&format!(
                "{t},{dose},{},{},{}\n",
                value * 0.98,
                value,
                value * 1.02
            ));
        }
        fs::write(dir.join(format!("dose_{i}.csv")), csv).unwrap();
    }
}

fn job(root: &Path) -> JobConfig {
    let json = serde_json::json!({
        "fit": {
            "population": { "size": 16, "generations": 6, "runs": 2 },
            "grid": { "dt": 0.1, "steps": 51, "substeps": 2 },
            "random_seed": 17
        },
        "problem": {
            "phospho_dir": root.join("phospho"),
            "nuclear_dir": root.join("nuclear"),
            "save_filename": "relay_fit.out",
            "output_root": root,
            "initial_state": [0.0, 0.0],
            "total_protein": [1.0],
            "minimums": [-1.0, -1.0, -1.0, -1.0],
            "maximums": [1.0, 1.0, 1.0, 1.0]
        }
    });
    serde_json::from_value(json).unwrap()
}

#[test]
fn test_fit_writes_sequential_artifacts() {
    let root = TempDir::new().unwrap();
    let doses = [0.5, 0.1, 2.0];
    let times = [0.0, 0.5, 1.0, 2.0, 4.0];
    write_channel(&root.path().join("phospho"), Channel::Phospho, &doses, &times);
    write_channel(&root.path().join("nuclear"), Channel::Nuclear, &doses, &times);

    let job = job(root.path());
    let dataset = load_dataset(&job.problem.phospho_dir, &job.problem.nuclear_dir).unwrap();
    assert_eq!(dataset.doses(), &[0.1, 0.5, 2.0]);

    let conversion =
        ConversionSpec::log_uniform(&job.problem.minimums, &job.problem.maximums).unwrap();
    let context = FitContext::new(
        RelayModel,
        conversion,
        dataset,
        job.problem.initial_state.clone(),
        job.problem.total_protein.clone(),
        &job.fit,
    )
    .unwrap();
    let evaluator = FitnessEvaluator::new(context, &job.fit);

    // Genome 0.5 on a symmetric log box decodes to all-ones: the true parameters.
    let truth = Genome::new(vec![0.5; 4]).unwrap();
    assert!(evaluator.evaluate(&truth).unwrap() < 1e-6);

    let data_paths = [job.problem.phospho_dir.as_path(), job.problem.nuclear_dir.as_path()];
    let output = OutputDirectory::create(
        &job.problem.save_filename,
        &job.problem.output_root,
        &data_paths,
        &job,
    )
    .unwrap();
    let mut sink = JsonResultSink::new(output);
    let orchestrator = RunOrchestrator::new(job.fit.clone(), evaluator).unwrap();
    let summaries = orchestrator.run_all(&mut sink).unwrap();
    assert_eq!(summaries.len(), 2);

    let dir = root.path().join("relay_fit");
    let manifest = fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap();
    assert!(manifest.contains("Filename: relay_fit\n"));
    assert!(manifest.contains(&format!("Data path: {}", job.problem.nuclear_dir.display())));
    for slot in ["relay_fit_0000.json", "relay_fit_0001.json"] {
        let artifact: RunArtifact =
            serde_json::from_str(&fs::read_to_string(dir.join(slot)).unwrap()).unwrap();
        assert_eq!(artifact.best_scores.len(), 6);
        assert_eq!(artifact.best_individuals.len(), 6);
        assert!(artifact.best_scores.windows(2).all(|w| w[1] <= w[0]));
        for individual in &artifact.best_individuals {
            assert_eq!(individual.len(), 4);
            assert!(individual.iter().all(|&k| (0.1 - 1e-12..=10.0 + 1e-9).contains(&k)));
        }
    }

    // A second job in the same directory continues the numbering.
    let mut sink = JsonResultSink::new(
        OutputDirectory::create(
            &job.problem.save_filename,
            &job.problem.output_root,
            &data_paths,
            &job,
        )
        .unwrap(),
    );
    let dataset = load_dataset(&job.problem.phospho_dir, &job.problem.nuclear_dir).unwrap();
    let context = FitContext::new(
        RelayModel,
        ConversionSpec::log_uniform(&job.problem.minimums, &job.problem.maximums).unwrap(),
        dataset,
        vec![0.0, 0.0],
        vec![1.0],
        &job.fit,
    )
    .unwrap();
    let orchestrator =
        RunOrchestrator::new(job.fit.clone(), FitnessEvaluator::new(context, &job.fit)).unwrap();
    orchestrator.run_all(&mut sink).unwrap();
    assert!(dir.join("relay_fit_0002.json").is_file());
    assert!(dir.join("relay_fit_0003.json").is_file());
}
