use anyhow::{Context, Result};
use colored::Colorize;
use oswatch::{report::Report, report_render, supervisor, AppConfig};
use structopt::StructOpt;

const BANNER: &str = r#"
╔═══════════════════════════════════════════════════════╗
║              OSWATCH - System Call Monitor             ║
║          Process & Memory Analysis Tool                ║
╚═══════════════════════════════════════════════════════╝
"#;

#[derive(StructOpt)]
#[structopt(
    name = "oswatch",
    about = "Traces a program's syscalls and reports leaked memory and file descriptors."
)]
struct Opt {
    /// Show detailed per-syscall and per-allocation tracing as it happens.
    #[structopt(short, long)]
    verbose: bool,

    /// Suppress the banner and progress lines; only the final report prints.
    #[structopt(short, long)]
    quiet: bool,

    /// Emit the report as JSON instead of the colored terminal view.
    #[structopt(long)]
    json: bool,

    /// Program to trace, followed by its own arguments.
    #[structopt(required = true)]
    command: Vec<String>,
}

fn main() {
    env_logger::init();

    let opt = Opt::from_args();
    let config = AppConfig {
        verbose: opt.verbose,
        quiet: opt.quiet,
        json: opt.json,
        ..AppConfig::default()
    };

    match run(&opt, &config) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    }
}

fn run(opt: &Opt, config: &AppConfig) -> Result<()> {
    let program = opt.command.first().context("no program specified")?;

    if !config.quiet {
        println!("{}", BANNER.cyan());
        println!("{} {}", "Target Program:".bold(), program);
        if config.verbose {
            println!("{} Verbose", "Mode:".bold());
        }
        println!("{}", "Starting monitoring...".green());
    }

    // The traced program's own exit code is reported inside the analysis,
    // not forwarded as oswatch's exit code: oswatch's exit status reflects
    // whether monitoring itself succeeded, not what the target returned.
    let (_, stats) = supervisor::launch(program, &opt.command, config)
        .with_context(|| format!("failed to monitor {}", program))?;

    let report = Report::build(&stats, config);

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if !config.quiet {
            println!("{}", "Monitoring complete. Generating report...".green());
        }
        print!("{}", report_render::render(&report));
    }

    Ok(())
}
