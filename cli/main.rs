#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process;

use gss_income::config::Settings;
use gss_income::features::{FEATURE_NAMES, derive};
use gss_income::form::run_form;
use gss_income::session::PredictionSession;
use gss_income::survey::{
    AGE_DEFAULT, CHILDS_DEFAULT, EducationLevel, Gender, MaritalStatus, PRESTIGE_DEFAULT,
    RespondentForm, WorkStatus,
};

#[derive(Parser)]
#[command(
    name = "gss-income",
    version,
    about = "Predict annual income from General Social Survey respondent attributes",
    long_about = "Collects a respondent's age, gender, education, marital status, employment \
                  status, occupational prestige and number of children, derives the model's \
                  13 features, and reports the income predicted by a pre-trained model."
)]
struct Cli {
    /// Path to the trained model file (.toml)
    #[arg(long, global = true, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Path to a settings file (.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill in the form interactively (the default)
    Form,
    /// Predict income for a single respondent given on the command line
    Predict(RespondentArgs),
    /// Print the derived feature row as TSV without running the model
    Features(RespondentArgs),
}

#[derive(Args)]
struct RespondentArgs {
    /// Age in years, clamped to 16-99
    #[arg(long, default_value_t = AGE_DEFAULT, allow_negative_numbers = true)]
    age: i64,

    #[arg(long, default_value = "Male", value_parser = PossibleValuesParser::new(Gender::labels()))]
    gender: String,

    /// Highest completed education level
    #[arg(long, default_value = "Less Than High School", value_parser = PossibleValuesParser::new(EducationLevel::labels()))]
    educcat: String,

    #[arg(long, default_value = "Married", value_parser = PossibleValuesParser::new(MaritalStatus::labels()))]
    marital: String,

    /// Employment status during the survey week
    #[arg(long, default_value = "Full-Time", value_parser = PossibleValuesParser::new(WorkStatus::labels()))]
    wrkstat: String,

    /// Occupational prestige score, clamped to 0-100
    #[arg(long, default_value_t = PRESTIGE_DEFAULT, allow_negative_numbers = true)]
    prestg10: i64,

    /// Number of children, clamped to 0-20
    #[arg(long, default_value_t = CHILDS_DEFAULT, allow_negative_numbers = true)]
    childs: i64,
}

impl From<RespondentArgs> for RespondentForm {
    fn from(args: RespondentArgs) -> Self {
        RespondentForm {
            age: args.age,
            gender: args.gender,
            educcat: args.educcat,
            marital: args.marital,
            wrkstat: args.wrkstat,
            prestg10: args.prestg10,
            childs: args.childs,
        }
    }
}

fn start_session(model: Option<PathBuf>, settings: &Settings) -> PredictionSession {
    let model_path = model.unwrap_or_else(|| settings.model_path.clone());
    log::info!("Loading model from: {}", model_path.display());
    PredictionSession::start(&model_path).with_currency_symbol(settings.currency_symbol.clone())
}

fn run_interactive(session: &PredictionSession) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout().lock();
    let shown = run_form(session, &mut input, &mut output)?;
    log::debug!("Form closed after {shown} predictions");
    Ok(())
}

fn run_predict(
    session: &PredictionSession,
    args: RespondentArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = session.handle(&RespondentForm::from(args));
    if outcome.is_estimate() {
        println!("{outcome}");
        Ok(())
    } else {
        Err(outcome.to_string().into())
    }
}

fn run_features(args: RespondentArgs) -> Result<(), Box<dyn std::error::Error>> {
    let record = derive(&RespondentForm::from(args))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(io::stdout().lock());
    writer.write_record(FEATURE_NAMES)?;
    writer.write_record(record.values().iter().map(|v| v.to_string()))?;
    writer.flush()?;
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let Cli {
        model,
        config,
        command,
    } = cli;

    let settings = Settings::load_or_default(config.as_deref())?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log_level))
        .init();

    match command.unwrap_or(Commands::Form) {
        Commands::Form => run_interactive(&start_session(model, &settings)),
        Commands::Predict(args) => run_predict(&start_session(model, &settings), args),
        Commands::Features(args) => run_features(args),
    }
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn respondent_flags_default_to_form_defaults() {
        let cli = Cli::parse_from(["gss-income", "predict"]);
        match cli.command {
            Some(Commands::Predict(args)) => {
                assert_eq!(RespondentForm::from(args), RespondentForm::default());
            }
            _ => panic!("Expected the predict subcommand"),
        }
    }

    #[test]
    fn labels_with_spaces_are_accepted() {
        let cli = Cli::parse_from([
            "gss-income",
            "features",
            "--educcat",
            "Junior College",
            "--wrkstat",
            "Unemployed/Laid Off",
            "--marital",
            "Never Married",
        ]);
        match cli.command {
            Some(Commands::Features(args)) => {
                let form = RespondentForm::from(args);
                assert_eq!(form.educcat, "Junior College");
                assert_eq!(form.wrkstat, "Unemployed/Laid Off");
                assert_eq!(form.marital, "Never Married");
            }
            _ => panic!("Expected the features subcommand"),
        }
    }

    #[test]
    fn unknown_category_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from(["gss-income", "predict", "--gender", "Other"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_model_flag_follows_subcommand() {
        let cli = Cli::try_parse_from(["gss-income", "predict", "--model", "m.toml"]).unwrap();
        assert_eq!(cli.model, Some(PathBuf::from("m.toml")));
    }
}
