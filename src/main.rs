use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use examtable::sched::{self, SchedulePayload, SchedulerConfig, ScheduleStatus};

/// Assigns exam subjects to (day, period) slots under conflict and burden
/// constraints.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// JSON bundle with the calendar, subjects, conflicts and roster
    input: std::path::PathBuf,
    /// Wall-clock budget for the solver, in seconds
    #[arg(short, long, default_value_t = 120)]
    time_limit: u64,
    /// Per-student cap on exams per day
    #[arg(long)]
    max_exams_per_day: Option<u32>,
    /// Per-student cap on hard exams per day
    #[arg(long)]
    max_hard_exams_per_day: Option<u32>,
    /// Seed for the clique preprocessor (reproducible runs)
    #[arg(long)]
    seed: Option<u64>,
    /// Ignore the pinned slot assignments in the bundle
    #[arg(long, default_value_t = false)]
    ignore_fixed: bool,
    /// Where to write the JSON result
    #[arg(short, long)]
    output: Option<std::path::PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Cannot read input bundle {}", args.input.display()))?;
    let inputs: sched::ScheduleInputs =
        serde_json::from_str(&data).with_context(|| "Cannot parse the input bundle")?;

    let config = SchedulerConfig {
        max_exams_per_day: args.max_exams_per_day,
        max_hard_exams_per_day: args.max_hard_exams_per_day,
        use_fixed_assignments: !args.ignore_fixed,
        random_seed: args.seed,
    };

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("[{bar:30}] {pos:>3}% {msg}")
            .expect("valid progress template")
            .progress_chars("=> "),
    );
    let bar_for_callback = bar.clone();
    let callback = move |message: &str, percent: u8| {
        bar_for_callback.set_position(percent as u64);
        bar_for_callback.set_message(message.to_owned());
    };

    println!("Scheduling {} ...", args.input.display());
    let result = sched::create_schedule(&config, &inputs, args.time_limit, Some(&callback));
    bar.finish_and_clear();

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("Cannot write result to {}", path.display()))?;
        println!("Result written to {}", path.display());
    }

    match &result.payload {
        SchedulePayload::Success(success) => {
            println!(
                "Timetable found ({}), {} slots over {} days",
                success.solver_status,
                success.slots.len(),
                success.days.len()
            );
            if let Some(clique) = &success.clique_info {
                println!(
                    "Clique hint: {} subjects, {} placed",
                    clique.size, clique.hints_placed
                );
            }
            for slot in &success.slots {
                if let Some(subjects) = success.slot_assignments.get(slot) {
                    println!("  {}: {}", slot, subjects.join(", "));
                }
            }

            if !success.summary.exam_distribution.is_empty() {
                println!("Worst-day exam distribution:");
                for (bucket, entry) in &success.summary.exam_distribution {
                    println!("  {} exams: {} students", bucket, entry.count);
                }
            }
            if !success.summary.hard_exam_distribution.is_empty() {
                println!("Worst-day hard-exam distribution:");
                for (bucket, entry) in &success.summary.hard_exam_distribution {
                    println!("  {} hard exams: {} students", bucket, entry.count);
                }
            }
            for warning in &success.warnings {
                println!("warning: {}", warning);
            }
        }
        SchedulePayload::Failure(failure) => {
            println!("Scheduling failed: {}", failure.error);
            for detail in &failure.details {
                println!("  - {}", detail);
            }
            if let Some(diagnosis) = &failure.diagnosis {
                for cause in &diagnosis.possible_causes {
                    println!("  cause: {}", cause);
                }
                for recommendation in &diagnosis.recommendations {
                    println!("  try: {}", recommendation);
                }
            }
            for warning in &failure.warnings {
                println!("warning: {}", warning);
            }
        }
    }

    match result.status {
        ScheduleStatus::Success => Ok(()),
        ScheduleStatus::Infeasible => bail!("the model is structurally infeasible"),
        ScheduleStatus::NoSolution => bail!("no solution within the time budget"),
        ScheduleStatus::Error => bail!("schedule creation failed"),
    }
}
