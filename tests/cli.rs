use bitheap_compression::io::SolutionReport;
use std::fs;
use std::process::Command;

fn bhc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bhc"))
}

#[test]
fn test_random_then_synth_with_verify() {
    let dir = tempfile::tempdir().unwrap();
    let heap_path = dir.path().join("heap.json");
    let solution_path = dir.path().join("solution.json");

    let output = bhc()
        .args(["random", "--seed", "9", "--width", "10", "--output"])
        .arg(&heap_path)
        .output()
        .expect("Failed to execute bhc");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = bhc()
        .arg("synth")
        .arg(&heap_path)
        .arg("--verify")
        .arg("--output")
        .arg(&solution_path)
        .output()
        .expect("Failed to execute bhc");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Solution is valid."));

    let report: SolutionReport =
        serde_json::from_str(&fs::read_to_string(&solution_path).unwrap()).unwrap();
    assert!(report.final_heights.iter().all(|&h| h <= 2));
}

#[test]
fn test_modular_synth_requires_modulus() {
    let dir = tempfile::tempdir().unwrap();
    let heap_path = dir.path().join("heap.json");
    fs::write(&heap_path, r#"{"width": 4, "bits": [{"column": 3, "count": 1}]}"#).unwrap();

    let output = bhc()
        .arg("synth")
        .arg(&heap_path)
        .args(["--mode", "modular"])
        .output()
        .expect("Failed to execute bhc");
    assert!(!output.status.success());

    let output = bhc()
        .arg("synth")
        .arg(&heap_path)
        .args(["--mode", "modular", "--modulus", "5", "--verify"])
        .output()
        .expect("Failed to execute bhc");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Pseudo-compressors: 1"));
}

#[test]
fn test_default_mode_with_modulus_reduces_modulo() {
    let dir = tempfile::tempdir().unwrap();
    let heap_path = dir.path().join("heap.json");
    let solution_path = dir.path().join("solution.json");
    fs::write(&heap_path, r#"{"width": 4, "bits": [{"column": 3, "count": 1}]}"#).unwrap();

    let output = bhc()
        .arg("synth")
        .arg(&heap_path)
        .args(["--modulus", "5", "--verify", "--output"])
        .arg(&solution_path)
        .output()
        .expect("Failed to execute bhc");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: SolutionReport =
        serde_json::from_str(&fs::read_to_string(&solution_path).unwrap()).unwrap();
    let modular = report.modular.unwrap();
    assert_eq!(modular.modulus, 5);
    assert!(modular.fits());
    assert_eq!(report.final_heights, vec![1, 1, 0, 0]);

    let output = bhc()
        .arg("synth")
        .arg(&heap_path)
        .args(["--mode", "baseline", "--modulus", "5"])
        .output()
        .expect("Failed to execute bhc");
    assert!(!output.status.success());
}

#[test]
fn test_catalog_lists_pass_through_last() {
    let output = bhc()
        .arg("catalog")
        .output()
        .expect("Failed to execute bhc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Pass-through area:"));
    assert!(stdout.contains("fa"));
}
