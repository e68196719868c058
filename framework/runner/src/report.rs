use plateau_sweep_summary_model::{StepResult, SweepOutcome, SweepRun};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "QPS")]
    qps: u32,
    #[tabled(rename = "Users")]
    users: u32,
    #[tabled(rename = "Spawn")]
    spawn_rate: u32,
    #[tabled(rename = "Running", display = "float2")]
    running: f64,
    #[tabled(rename = "Waiting", display = "optional_float2")]
    waiting: Option<f64>,
    #[tabled(rename = "Probe TTFT", display = "optional_float2")]
    probe_latency: Option<f64>,
    #[tabled(rename = "Probe (s)")]
    probe_duration_s: u64,
}

impl From<&StepResult> for StepRow {
    fn from(step: &StepResult) -> Self {
        Self {
            qps: step.qps,
            users: step.users,
            spawn_rate: step.spawn_rate,
            running: step.plateau_running,
            waiting: step.plateau_waiting,
            probe_latency: step.probe_latency,
            probe_duration_s: step.probe_duration_s,
        }
    }
}

fn float2(n: &f64) -> String {
    format!("{n:.2}")
}

fn optional_float2(n: &Option<f64>) -> String {
    n.as_ref().map(float2).unwrap_or_else(|| "-".to_string())
}

/// The measured steps as a table, or a note that nothing was measured.
pub fn render_steps(steps: &[StepResult]) -> String {
    if steps.is_empty() {
        return "No load levels were measured".to_string();
    }

    let rows = steps.iter().map(StepRow::from).collect::<Vec<_>>();
    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn print_summary(run: &SweepRun) {
    let status = match &run.outcome {
        SweepOutcome::InProgress => "in progress".to_string(),
        SweepOutcome::Completed => "completed".to_string(),
        SweepOutcome::Failed { reason } => format!("failed: {reason}"),
        SweepOutcome::Interrupted => "interrupted".to_string(),
    };

    println!("\nSweep {} for {} {status}", run.run_id, run.model_key);
    println!("{}", render_steps(&run.steps));
    println!("Results in {}", run.output_dir.display());
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn step(qps: u32, waiting: Option<f64>, latency: Option<f64>) -> StepResult {
        StepResult {
            qps,
            users: 15,
            spawn_rate: 15,
            plateau_running: 3.0,
            plateau_waiting: waiting,
            probe_latency: latency,
            probe_duration_s: 120,
            main_log: PathBuf::from("main.log"),
            probe_log: PathBuf::from("probe.log"),
        }
    }

    #[test]
    fn test_should_render_one_row_per_step() {
        let table = render_steps(&[step(10, Some(0.0), Some(85.0)), step(15, None, None)]);

        assert!(table.contains("Probe TTFT"));
        assert!(table.contains("85.00"));
        assert!(table.contains("3.00"));
        assert!(table.contains(" - "));
        assert!(table.contains("15"));
    }

    #[test]
    fn test_should_note_when_nothing_was_measured() {
        assert_eq!(render_steps(&[]), "No load levels were measured");
    }
}
