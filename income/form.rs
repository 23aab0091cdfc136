//! Interactive text form: the input collector for a terminal session.
//!
//! Fields are asked in questionnaire order. An empty answer keeps the shown default,
//! categorical fields accept either the option number or its exact label, and integers
//! outside their range are clamped rather than rejected. End of input at any prompt
//! ends the session quietly.

use crate::session::PredictionSession;
use crate::survey::{
    AGE_MAX, AGE_MIN, CHILDS_MAX, CHILDS_MIN, EducationLevel, Gender, MaritalStatus,
    PRESTIGE_MAX, PRESTIGE_MIN, RespondentForm, WorkStatus,
};
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("I/O error while running the form: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs the form until the user stops or input ends. Returns the number of
/// predictions that were shown.
pub fn run_form<R: BufRead, W: Write>(
    session: &PredictionSession,
    input: &mut R,
    output: &mut W,
) -> Result<usize, FormError> {
    writeln!(output, "Annual income estimate (General Social Survey)")?;
    if let Some(e) = session.startup_error() {
        writeln!(output, "Prediction unavailable: {e}")?;
        return Ok(0);
    }

    let mut defaults = RespondentForm::default();
    let mut shown = 0;
    loop {
        writeln!(output)?;
        writeln!(output, "1. Enter the respondent's details")?;
        let Some(form) = collect(&defaults, input, output)? else {
            break;
        };

        writeln!(output)?;
        writeln!(output, "{}", session.handle(&form))?;
        shown += 1;

        write!(output, "Predict again? [y/N]: ")?;
        output.flush()?;
        match read_answer(input)? {
            Some(answer) if answer.eq_ignore_ascii_case("y") => defaults = form,
            _ => break,
        }
    }
    Ok(shown)
}

/// Asks every field once. `None` means input ended before the form was complete.
fn collect<R: BufRead, W: Write>(
    defaults: &RespondentForm,
    input: &mut R,
    output: &mut W,
) -> Result<Option<RespondentForm>, FormError> {
    macro_rules! ask {
        ($e:expr) => {
            match $e? {
                Some(value) => value,
                None => return Ok(None),
            }
        };
    }

    let age = ask!(ask_integer("Age (age)", AGE_MIN, AGE_MAX, defaults.age, input, output));
    let gender = ask!(ask_choice(
        "Gender (gender)",
        &Gender::labels(),
        &defaults.gender,
        input,
        output
    ));
    let educcat = ask!(ask_choice(
        "Education level (educcat)",
        &EducationLevel::labels(),
        &defaults.educcat,
        input,
        output
    ));
    let marital = ask!(ask_choice(
        "Marital status (marital)",
        &MaritalStatus::labels(),
        &defaults.marital,
        input,
        output
    ));
    let wrkstat = ask!(ask_choice(
        "Employment status (wrkstat)",
        &WorkStatus::labels(),
        &defaults.wrkstat,
        input,
        output
    ));
    let prestg10 = ask!(ask_integer(
        "Occupational prestige (prestg10)",
        PRESTIGE_MIN,
        PRESTIGE_MAX,
        defaults.prestg10,
        input,
        output
    ));
    let childs = ask!(ask_integer(
        "Number of children (childs)",
        CHILDS_MIN,
        CHILDS_MAX,
        defaults.childs,
        input,
        output
    ));

    Ok(Some(RespondentForm {
        age,
        gender,
        educcat,
        marital,
        wrkstat,
        prestg10,
        childs,
    }))
}

/// Reads one trimmed line, or `None` at end of input.
fn read_answer<R: BufRead>(input: &mut R) -> Result<Option<String>, FormError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn ask_integer<R: BufRead, W: Write>(
    label: &str,
    min: i64,
    max: i64,
    default: i64,
    input: &mut R,
    output: &mut W,
) -> Result<Option<i64>, FormError> {
    loop {
        write!(output, "{label} [{min}-{max}] (default {default}): ")?;
        output.flush()?;
        let Some(answer) = read_answer(input)? else {
            return Ok(None);
        };
        if answer.is_empty() {
            return Ok(Some(default));
        }
        match answer.parse::<i64>() {
            Ok(value) => {
                let clamped = value.clamp(min, max);
                if clamped != value {
                    writeln!(output, "  {value} is outside {min}-{max}; using {clamped}.")?;
                }
                return Ok(Some(clamped));
            }
            Err(_) => writeln!(output, "  Please enter a whole number.")?,
        }
    }
}

fn ask_choice<R: BufRead, W: Write>(
    label: &str,
    options: &[&str],
    default: &str,
    input: &mut R,
    output: &mut W,
) -> Result<Option<String>, FormError> {
    writeln!(output, "{label}:")?;
    for (i, option) in options.iter().enumerate() {
        let marker = if *option == default { " (default)" } else { "" };
        writeln!(output, "  {}) {option}{marker}", i + 1)?;
    }
    loop {
        write!(output, "Choice: ")?;
        output.flush()?;
        let Some(answer) = read_answer(input)? else {
            return Ok(None);
        };
        if answer.is_empty() {
            return Ok(Some(default.to_string()));
        }
        let by_number = answer
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=options.len()).contains(n))
            .map(|n| options[n - 1]);
        let by_label = options.iter().copied().find(|o| *o == answer);
        match by_number.or(by_label) {
            Some(option) => return Ok(Some(option.to_string())),
            None => writeln!(
                output,
                "  Please choose 1-{} or type an option exactly.",
                options.len()
            )?,
        }
    }
}
