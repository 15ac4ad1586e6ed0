use clap::Parser;
use std::process::ExitCode;

use kelani_rainfall::cli::{Cli, Commands};
use kelani_rainfall::config::Config;
use kelani_rainfall::logging::{self, LogLevel, Source};
use kelani_rainfall::model::PipelineError;
use kelani_rainfall::pipeline;

fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
    logging::init_logger(level, cli.log_file.as_deref(), cli.log_file.is_some());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Source::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    let config = Config::load(&cli.config)?.with_database_url(std::env::var("DATABASE_URL").ok());

    match cli.command {
        Commands::RfToCsv(args) => {
            let run = args.run_datetime()?;
            if let Some(start) = args.simulation_start()? {
                logging::info(Source::System, None, &format!("Simulation start {}", start));
            }
            let config = config.with_wrf_dirs(args.wrf_rf.clone(), args.wrf_kub.clone());
            pipeline::run_rf_to_csv(&config, run, args.tag.as_deref())?;
        }
        Commands::UpdateControl(args) => {
            pipeline::run_update_control(&config, args.csv_date()?, args.tag.as_deref())?;
        }
        Commands::WrfTrigger(args) => {
            if let Some(tag) = args.tag.as_deref() {
                logging::debug(Source::Storage, None, &format!("tag {}", tag));
            }
            pipeline::run_wrf_trigger(&config, &args.request()?)?;
        }
    }

    Ok(())
}
