//! Terminal host for one bank: mode pick, setup, the running session and
//! its results.

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use quiz_core::model::{ModeSummary, Termination, Verdict};
use quiz_core::modes::{
    CardItem, ChoiceItem, Outcome, Response, SessionItem, SessionProgress, StageItem,
    StatementItem, StatementSource,
};
use services::{CompletedSession, ControllerError, SaveStatus, Screen, SessionController, SetupInfo};

use crate::args::RunArgs;

pub type Input = Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

/// What one typed line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Respond(Vec<Response>),
    Quit,
    Help,
}

fn pick(raw: &str, len: usize) -> Option<usize> {
    let n: usize = raw.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

/// Turns one line into responses for `item`.
///
/// # Errors
///
/// A short hint when the line means nothing for the current item.
pub fn parse_command(line: &str, item: &SessionItem) -> Result<Command, String> {
    let line = line.trim();
    match line {
        "q" | "quit" => return Ok(Command::Quit),
        "?" | "help" => return Ok(Command::Help),
        _ => {}
    }

    let responses = match item {
        SessionItem::Choice(item) if item.picked.is_some() => vec![Response::Advance],
        SessionItem::Choice(item) => {
            let at = pick(line, item.choices.len())
                .ok_or_else(|| format!("type a number from 1 to {}", item.choices.len()))?;
            vec![Response::Choose {
                index: item.choices[at].canonical_index,
            }]
        }
        SessionItem::Statement(item) if item.judged.is_some() => vec![Response::Advance],
        SessionItem::Statement(_) => match line {
            "t" | "true" => vec![Response::Judge { value: true }],
            "f" | "false" => vec![Response::Judge { value: false }],
            _ => return Err("type t or f".to_string()),
        },
        SessionItem::Card(item) if !item.revealed => vec![Response::Reveal],
        SessionItem::Card(_) => match line {
            "y" | "yes" => vec![Response::Assess { known: true }],
            "n" | "no" => vec![Response::Assess { known: false }],
            _ => return Err("type y if you knew it, n otherwise".to_string()),
        },
        SessionItem::Stage(item) => parse_stage(line, item)?,
    };
    Ok(Command::Respond(responses))
}

fn parse_stage(line: &str, item: &StageItem) -> Result<Vec<Response>, String> {
    const HINT: &str = "type `<left> <right>` to connect, `u <left>` to unbind, `c` to check";
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["c" | "check"] => Ok(vec![Response::CheckStage]),
        ["u", left] => {
            let at = pick(left, item.left.len()).ok_or(HINT)?;
            Ok(vec![Response::Unbind {
                question: item.left[at].question_id,
            }])
        }
        [left, right] => {
            let l = pick(left, item.left.len()).ok_or(HINT)?;
            let r = pick(right, item.right.len()).ok_or(HINT)?;
            let question = item.left[l].question_id;
            let mut responses = Vec::with_capacity(2);
            // arming the armed question again would disarm it
            if item.armed != Some(question) {
                responses.push(Response::Arm { question });
            }
            responses.push(Response::Bind {
                slot: item.right[r].slot,
            });
            Ok(responses)
        }
        _ => Err(HINT.to_string()),
    }
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn render_progress(progress: &SessionProgress) {
    let mut line = format!(
        "[{}/{} answered, {} correct, {} mistakes",
        progress.answered, progress.total, progress.correct, progress.mistakes
    );
    if let Some(left) = progress.remaining_secs {
        line.push_str(&format!(", {}:{:02} left", left / 60, left % 60));
    }
    line.push(']');
    println!("{line}");
}

fn render_choice(item: &ChoiceItem) {
    println!();
    println!("Question {}/{}: {}", item.position, item.total, item.prompt);
    if let Some(category) = &item.category {
        println!("  ({category})");
    }
    for (n, choice) in item.choices.iter().enumerate() {
        let mark = if item.picked == Some(choice.canonical_index) {
            '>'
        } else {
            ' '
        };
        println!(" {mark}{}. {}", n + 1, choice.text);
    }
    if item.picked.is_some() {
        println!("Press Enter to continue.");
    }
}

fn render_statement(item: &StatementItem) {
    println!();
    println!("Statement {}/{}: {}", item.position, item.total, item.prompt);
    println!("  \"{}\"", item.statement);
    if let StatementSource::Degraded = item.source {
        println!("  (this question has no other answer to compare against)");
    }
    match item.judged {
        Some(_) => println!("Press Enter to continue."),
        None => println!("True or false? [t/f]"),
    }
}

fn render_card(item: &CardItem) {
    println!();
    let origin = if item.from_review { " (review)" } else { "" };
    println!(
        "Card{origin}: {}  [{} of {} known, {} to review]",
        item.prompt, item.known, item.total, item.pending_reviews
    );
    if item.revealed {
        for answer in &item.answers {
            println!("  = {answer}");
        }
        if let Some(comment) = &item.comment {
            println!("  {comment}");
        }
        println!("Did you know it? [y/n]");
    } else {
        println!("Press Enter to reveal.");
    }
}

fn render_stage(item: &StageItem) {
    println!();
    println!(
        "Stage {}/{}  ({}/{} connected, {} mistakes so far)",
        item.stage_index + 1,
        item.stage_count,
        item.connected,
        item.required,
        item.cumulative_mistakes
    );
    let width = item.left.iter().map(|e| e.prompt.len()).max().unwrap_or(0);
    let rows = item.left.len().max(item.right.len());
    for row in 0..rows {
        let left = item.left.get(row).map_or(String::new(), |entry| {
            let armed = if item.armed == Some(entry.question_id) { '*' } else { ' ' };
            let bound = entry
                .bound_to
                .and_then(|slot| item.right.iter().position(|r| r.slot == slot))
                .map_or(String::new(), |at| format!(" -> {}", at + 1));
            format!("{armed}{}. {:width$}{bound}", row + 1, entry.prompt)
        });
        let right = item
            .right
            .get(row)
            .map_or(String::new(), |slot| format!("{}. {}", row + 1, slot.text));
        println!("  {left:<w$}   {right}", w = width + 12);
    }
    if item.can_check() {
        println!("All connected: type c to check.");
    }
}

pub fn render_item(item: &SessionItem, progress: Option<&SessionProgress>) {
    match item {
        SessionItem::Choice(item) => render_choice(item),
        SessionItem::Statement(item) => render_statement(item),
        SessionItem::Card(item) => render_card(item),
        SessionItem::Stage(item) => render_stage(item),
    }
    if let Some(progress) = progress {
        render_progress(progress);
    }
}

pub fn render_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Answered(feedback) => {
            if feedback.correct {
                println!("Correct.");
            } else {
                println!("Wrong.");
            }
            if let Some(comment) = &feedback.comment {
                println!("  {comment}");
            }
        }
        Outcome::Judged(judgement) => {
            let verdict = if judgement.correct { "Correct" } else { "Wrong" };
            println!("{verdict}: the statement is {}.", judgement.truth);
            if let Some(comment) = &judgement.comment {
                println!("  {comment}");
            }
        }
        Outcome::Assessed { requeued: true, .. } => println!("Queued for review."),
        Outcome::Bound {
            displaced: Some(q), ..
        } => println!("Replaced the connection of question {q}."),
        Outcome::StageChecked(report) => {
            let right = report
                .pairs
                .iter()
                .filter(|p| p.verdict == Verdict::Correct)
                .count();
            println!(
                "Stage {} checked: {right}/{} right, {} mistakes.",
                report.stage_index + 1,
                report.pairs.len(),
                report.stage_mistakes
            );
        }
        _ => {}
    }
}

pub fn render_results(completed: &CompletedSession) {
    let result = &completed.result;
    println!();
    let reason = match result.termination {
        Termination::Completed => "Session complete",
        Termination::TimeLimit => "Time is up",
        Termination::MistakeLimit => "Mistake limit reached",
        Termination::EndedEarly => "Session ended early",
    };
    println!("{reason}.");
    println!(
        "Score: {}/{} ({}%), {} mistakes, {}s",
        result.correct_count,
        result.total_items,
        result.percentage,
        result.mistake_count,
        result.elapsed_secs
    );
    match &result.summary {
        ModeSummary::MultipleChoice => {}
        ModeSummary::TrueFalse { inconsistent_items } if *inconsistent_items > 0 => {
            println!("{inconsistent_items} statement(s) came from single-answer questions.");
        }
        ModeSummary::TrueFalse { .. } => {}
        ModeSummary::Flashcard {
            known_cards,
            pending_reviews,
        } => println!("Known cards: {known_cards}, still to review: {pending_reviews}"),
        ModeSummary::Matching {
            stage_count,
            stages_checked,
            ..
        } => println!("Stages checked: {stages_checked}/{stage_count}"),
    }
    match &completed.save {
        SaveStatus::Saved => {}
        SaveStatus::PartiallySaved { error } => {
            println!("History saved, question stats were not: {error}");
        }
        SaveStatus::NotSaved { error } => println!("Result was not saved: {error}"),
    }
}

fn render_setup(info: &SetupInfo) {
    println!();
    println!("{}: {}", info.mode.name, info.mode.description);
    println!(
        "{} of {} questions usable ({}%)",
        info.validation.supported_count, info.validation.total_count, info.validation.percentage
    );
    if !info.categories.is_empty() {
        println!("Categories: {}", info.categories.join(", "));
    }
}

//
// ─── LOOP ──────────────────────────────────────────────────────────────────────
//

async fn choose_mode(
    controller: &mut SessionController,
    lines: &mut Input,
) -> Result<Option<SetupInfo>, Box<dyn std::error::Error>> {
    loop {
        println!();
        println!("Choose a mode for {}:", controller.bank().title());
        for (n, mode) in controller.supported_modes().iter().enumerate() {
            println!(
                "  {}. {} ({} questions)",
                n + 1,
                mode.metadata.name,
                mode.validation.supported_count
            );
        }
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        if matches!(line.trim(), "q" | "quit") {
            return Ok(None);
        }
        let Some(at) = pick(&line, controller.supported_modes().len()) else {
            println!("Type a number from the list.");
            continue;
        };
        let mode = controller.supported_modes()[at].metadata.id.clone();
        return Ok(Some(controller.select_mode(&mode)?));
    }
}

async fn run_session(
    controller: &mut SessionController,
    lines: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut redraw = true;
    while controller.screen() == Screen::Running {
        if redraw && let Some(item) = controller.current_item() {
            render_item(&item, controller.progress().as_ref());
        }
        redraw = false;

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    controller.end_early().await?;
                    break;
                };
                let Some(item) = controller.current_item() else {
                    continue;
                };
                match parse_command(&line, &item) {
                    Ok(Command::Quit) => {
                        controller.end_early().await?;
                    }
                    Ok(Command::Help) => {
                        println!("q quits the session; other input depends on the item.");
                    }
                    Ok(Command::Respond(responses)) => {
                        for response in responses {
                            match controller.submit(response).await {
                                Ok(outcome) => render_outcome(&outcome),
                                Err(ControllerError::Session(err)) => {
                                    debug!(error = %err, "response refused");
                                    println!("{err}");
                                    break;
                                }
                                Err(err) => return Err(err.into()),
                            }
                        }
                        redraw = true;
                    }
                    Err(hint) => println!("{hint}"),
                }
            }
            () = controller.wait_tick() => {
                controller.tick().await?;
            }
        }
    }
    Ok(())
}

/// Drives the controller from its first screen until the user stops.
///
/// # Errors
///
/// Returns an error when reading input fails or the chosen options are
/// rejected.
pub async fn play(
    controller: &mut SessionController,
    run: &RunArgs,
    lines: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    if !controller.has_supported_modes() {
        return Err(ControllerError::NoSupportedModes.into());
    }

    let mut info = match (&run.mode, controller.screen()) {
        (Some(mode), Screen::ModeSelect) => controller.select_mode(mode)?,
        (_, Screen::Setup) => controller.setup_info()?,
        _ => match choose_mode(controller, lines).await? {
            Some(info) => info,
            None => return Ok(()),
        },
    };

    loop {
        render_setup(&info);
        controller.start(&run.options)?;
        run_session(controller, lines).await?;

        if let Some(completed) = controller.completed() {
            render_results(completed);
        }
        println!("Type r to retake, anything else to quit.");
        match lines.next_line().await? {
            Some(line) if line.trim() == "r" => info = controller.retake()?,
            _ => return Ok(()),
        }
    }
}
