use anyhow::{Context, Result};
use clap::Parser;

use aria_flair::{
    cli::{Cli, Commands, SubjectArgs},
    report::StageReport,
    config::PipelineConfig,
    logging::init_logging,
    pipeline::Pipeline,
    roster::load_roster,
    subject::Subject,
    toolkit::FslToolkit,
};

fn subject_from(args: &SubjectArgs, config: &PipelineConfig) -> Result<Subject> {
    let method = args.method.unwrap_or(config.registration);
    let subject = if args.time_points.is_empty() {
        Subject::with_all_time_points(&args.subject, args.total, method)
    } else {
        Subject::new(&args.subject, args.total, &args.time_points, method)
    };
    subject.with_context(|| format!("invalid subject {}", args.subject))
}

fn print_stage(subject: &Subject, report: &StageReport) {
    println!(
        "{} {}: completed={} skipped={} failed={}",
        subject.id(),
        report.stage,
        report.completed(),
        report.skipped(),
        report.failed()
    );
    for (t, reason) in report.failures() {
        eprintln!("  [{}] {reason}", t.map(|t| t.to_string()).unwrap_or_default());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = cli.data_root {
        config.data_root = root;
    }

    let pipeline: Pipeline<FslToolkit> = Pipeline::new(config.toolkit(), config.layout())
        .template_extraction(config.template_extraction)
        .use_bias_corrected(config.use_bias_corrected);

    match cli.command {
        Commands::Run(args) => {
            let subject = subject_from(&args, &config)?;
            let report = pipeline.run(&subject).await?;
            print!("{report}");
        }
        Commands::Roster(args) => {
            let roster = load_roster(&args.roster)?;
            let method = args.method.unwrap_or(config.registration);
            let subjects = roster
                .iter()
                .map(|entry| entry.subject(&args.time_points, method))
                .collect::<aria_flair::error::Result<Vec<_>>>()?;
            let parallel = args.parallel.unwrap_or(config.max_parallel_subjects);

            let mut failed = 0;
            for (id, result) in pipeline.run_many(&subjects, parallel).await {
                match result {
                    Ok(report) => print!("{report}"),
                    Err(err) => {
                        failed += 1;
                        eprintln!("{id}: {err}");
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} subjects failed", subjects.len());
            }
        }
        Commands::Convert(args) => {
            let subject = subject_from(&args.subject, &config)?;
            let report = if args.t1 {
                pipeline.convert_t1(&subject).await
            } else {
                pipeline.convert(&subject).await
            };
            print_stage(&subject, &report);
        }
        Commands::Extract(args) => {
            let subject = subject_from(&args, &config)?;
            let report = pipeline.extract(&subject).await;
            print_stage(&subject, &report);
        }
        Commands::Variance(args) => {
            let subject = subject_from(&args, &config)?;
            let outcome = pipeline
                .variance(&subject)
                .await
                .context("variance computation failed")?;
            println!("{}: variance {outcome:?}", subject.id());
        }
    }
    Ok(())
}
