//! Answers engine suspensions from the command line.
//!
//! Pages are answered, in order of preference, from queued `--select`
//! values, from each page's defaults (`--defaults`), or by prompting on the
//! terminal. The answer `back` (or `b` at the prompt) returns to the
//! previous page.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use tracing::debug;
use wizard_core::engine::{Step, WizardEngine};
use wizard_core::page::Page;

use crate::error::CliError;
use crate::format::{page_view, requires_view};

/// Where page answers come from.
#[derive(Debug, Default)]
pub struct Answers {
    queued: VecDeque<String>,
    use_defaults: bool,
    interactive: bool,
}

impl Answers {
    pub fn new(queued: Vec<String>, use_defaults: bool, interactive: bool) -> Self {
        Self {
            queued: queued.into(),
            use_defaults,
            interactive,
        }
    }
}

/// What the user did on a page.
enum PageAction {
    Answered(Step),
    WentBack(Step),
    Closed,
}

/// `b` or `back`, unless the page has an option with that label.
fn is_back(answer: &str, page: &Page) -> bool {
    let answer = answer.trim();
    matches!(answer.to_lowercase().as_str(), "b" | "back") && page.index_of(answer).is_none()
}

/// Parses `"0,2"` or `"Full, Patches"` into option indices for `page`.
///
/// An empty answer selects nothing.
pub fn parse_selection(answer: &str, page: &Page) -> Result<Vec<usize>, String> {
    answer
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|token| match token.parse::<usize>() {
            Ok(i) => Ok(i),
            Err(_) => page
                .index_of(token)
                .ok_or_else(|| format!("No option named '{}'", token)),
        })
        .collect()
}

/// Drives the engine from `step` until it reaches a terminal state.
pub fn drive<R: BufRead, W: Write>(
    engine: &mut WizardEngine,
    mut step: Step,
    answers: &mut Answers,
    input: &mut R,
    out: &mut W,
) -> Result<Step, CliError> {
    let mut page_number = 0;
    loop {
        step = match step {
            Step::AwaitingSelection(page) => {
                page_number += 1;
                write!(out, "{}", page_view(&page, page_number))?;
                match answer_page(engine, &page, page_number, answers, input, out)? {
                    PageAction::Answered(next) => next,
                    PageAction::WentBack(previous) => {
                        page_number = page_number.saturating_sub(2);
                        previous
                    }
                    PageAction::Closed => engine.cancel()?,
                }
            }
            Step::AwaitingOverride(results) => {
                write!(out, "{}", requires_view(&results))?;
                let accept = answers.interactive && confirm(input, out, "Install anyway? [y/N]: ")?;
                engine.override_requirements(accept)?
            }
            terminal => return Ok(terminal),
        };
    }
}

/// Resumes the engine past `page`, or back to the page before it.
fn answer_page<R: BufRead, W: Write>(
    engine: &mut WizardEngine,
    page: &Page,
    page_number: usize,
    answers: &mut Answers,
    input: &mut R,
    out: &mut W,
) -> Result<PageAction, CliError> {
    if let Some(answer) = answers.queued.pop_front() {
        if is_back(&answer, page) {
            debug!(page = page_number, "going back from --select");
            writeln!(out, "Back")?;
            return Ok(PageAction::WentBack(engine.back()?));
        }
        let indices = parse_selection(&answer, page)
            .map_err(|e| CliError::Runtime(format!("Page {}: {}", page_number, e)))?;
        debug!(page = page_number, ?indices, "answering from --select");
        writeln!(out, "Selected: {}", labels(page, &indices))?;
        return Ok(PageAction::Answered(engine.resume(&indices)?));
    }

    if answers.use_defaults {
        let indices = page.initial_selection();
        writeln!(out, "Selected: {}", labels(page, &indices))?;
        return Ok(PageAction::Answered(engine.resume(&indices)?));
    }

    if !answers.interactive {
        return Err(CliError::Runtime(format!(
            "No selection given for page {}; pass --select or --defaults",
            page_number
        )));
    }

    loop {
        let defaults = page.initial_selection();
        if engine.can_go_back() {
            write!(out, "Select [{}] (b = back): ", labels(page, &defaults))?;
        } else {
            write!(out, "Select [{}]: ", labels(page, &defaults))?;
        }
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(PageAction::Closed);
        }
        if is_back(&line, page) {
            match engine.back() {
                Ok(step) => return Ok(PageAction::WentBack(step)),
                Err(e) => {
                    writeln!(out, "{}", e)?;
                    continue;
                }
            }
        }
        let indices = if line.trim().is_empty() {
            defaults
        } else {
            match parse_selection(&line, page) {
                Ok(indices) => indices,
                Err(e) => {
                    writeln!(out, "{}", e)?;
                    continue;
                }
            }
        };
        match engine.resume(&indices) {
            Ok(step) => return Ok(PageAction::Answered(step)),
            Err(e) if e.is_selection_error() => writeln!(out, "{}", e)?,
            Err(e) => return Err(e.into()),
        }
    }
}

fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    prompt: &str,
) -> Result<bool, CliError> {
    write!(out, "{}", prompt)?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn labels(page: &Page, indices: &[usize]) -> String {
    if indices.is_empty() {
        return "none".to_string();
    }
    indices
        .iter()
        .map(|&i| page.options.get(i).map_or_else(|| i.to_string(), |o| o.label.clone()))
        .collect::<Vec<_>>()
        .join(", ")
}
