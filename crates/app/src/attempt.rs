//! Interactive practice and exam attempts on the terminal.

use exam_core::model::{
    OPTION_COUNT, PerformanceAnalysis, ScoreReport, SessionMode, SessionPhase, option_label,
};
use exam_core::time::format_clock;
use services::sessions::{FinishOutcome, Navigation, TickOutcome};
use services::{ExamSession, ExamTimer, SessionLoopService};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Answer(usize),
    Next,
    Previous,
    /// 1-based position in the active subset.
    Goto(usize),
    Flag,
    Theme(String),
    Show,
    Finish,
    Confirm,
    Back,
    Quit,
    Help,
}

pub(crate) fn parse_step(line: &str) -> Option<Step> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let step = match word.to_ascii_lowercase().as_str() {
        "n" | "next" => Step::Next,
        "p" | "prev" | "previous" => Step::Previous,
        "g" | "go" => Step::Goto(rest.parse().ok().filter(|pos| *pos > 0)?),
        "f" | "flag" => Step::Flag,
        "t" | "theme" if !rest.is_empty() => Step::Theme(rest.to_string()),
        "s" | "show" => Step::Show,
        "finish" | "done" => Step::Finish,
        "y" | "confirm" => Step::Confirm,
        "back" | "cancel" => Step::Back,
        "q" | "quit" | "exit" => Step::Quit,
        "h" | "help" | "?" => Step::Help,
        letter if letter.len() == 1 && rest.is_empty() => {
            let index = usize::from(letter.as_bytes()[0].checked_sub(b'a')?);
            if index >= OPTION_COUNT {
                return None;
            }
            Step::Answer(index)
        }
        _ => return None,
    };
    Some(step)
}

fn print_help() {
    println!("  a-d          answer the current question");
    println!("  n / p        next / previous question");
    println!("  go <n>       jump to question n");
    println!("  f            flag or unflag the current question");
    println!("  theme <t>    toggle a theme in the filter");
    println!("  s            show the current question");
    println!("  finish       end the attempt (exams ask for confirmation)");
    println!("  q            quit; practice progress is kept");
}

fn show_question(session: &ExamSession) {
    let progress = session.progress();
    let Some(question) = session.current_question() else {
        println!("no questions match the theme filter");
        return;
    };
    let mut header = format!(
        "[{}/{}] {}",
        progress.position,
        progress.total,
        question.theme()
    );
    if session.is_flagged(question.id()) {
        header.push_str(" (flagged)");
    }
    if session.mode() == SessionMode::Exam {
        header.push_str(&format!("  {} left", format_clock(session.time_remaining())));
    }
    println!("{header}");
    println!("{}", question.prompt());
    let chosen = session.answer_for(question.id());
    for (index, option) in question.options().iter().enumerate() {
        let marker = if chosen == Some(index) { '>' } else { ' ' };
        println!(" {marker} {}. {option}", option_label(index));
    }
}

/// Practice feedback for one answer.
pub(crate) fn feedback(chosen: usize, correct: usize) -> String {
    if chosen == correct {
        "correct".to_string()
    } else {
        format!("incorrect, the answer is {}", option_label(correct))
    }
}

fn print_report(report: &ScoreReport, analysis: &PerformanceAnalysis) {
    println!(
        "score {}/{} ({}%) {}",
        report.score,
        report.total,
        report.percentage,
        if report.passed { "passed" } else { "failed" }
    );
    for theme in &analysis.themes {
        let weak = if theme.weak { "  weak" } else { "" };
        println!(
            "  {}: {}/{} ({}%){weak}",
            theme.theme, theme.correct, theme.total, theme.percentage
        );
    }
    for missed in &analysis.missed {
        let chosen = missed.chosen.map_or('-', option_label);
        println!(
            "  missed #{}: chose {chosen}, answer {}",
            missed.position + 1,
            option_label(missed.correct)
        );
    }
}

async fn next_tick(ticks: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match ticks {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Drive `session` from standard input until it completes or the user quits.
///
/// Exams tick once per second while in progress or awaiting confirmation; the
/// timer stops as soon as the attempt leaves the timed state.
///
/// # Errors
///
/// Returns an error if standard input cannot be read.
pub(crate) async fn run_attempt(
    sessions: &SessionLoopService,
    mut session: ExamSession,
) -> std::io::Result<()> {
    let mut timer = ExamTimer::new();
    let mut ticks = timer.sync_with(&session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{} attempt, {} questions. Type `help` for commands.", session.mode(), session.len());
    show_question(&session);

    loop {
        tokio::select! {
            Some(()) = next_tick(&mut ticks) => {
                match sessions.tick(&mut session).await {
                    TickOutcome::Running { remaining } if remaining % 600 == 0 || remaining == 60 => {
                        println!("{} left", format_clock(remaining));
                    }
                    TickOutcome::TimedOut(_) => println!("time is up"),
                    TickOutcome::Running { .. } | TickOutcome::Idle => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(step) = parse_step(&line) else {
                    println!("unrecognized input, type `help`");
                    continue;
                };
                if step == Step::Quit {
                    break;
                }
                apply_step(sessions, &mut session, step).await;
            }
        }

        if session.is_complete() {
            print_report(&session.score(), &session.analysis());
            break;
        }
        if let Some(rx) = timer.sync_with(&session) {
            ticks = Some(rx);
        }
    }
    timer.cancel();

    if !session.is_complete() {
        match session.mode() {
            SessionMode::Practice if !session.answers().is_empty() => {
                println!("progress saved, continue with `practice --resume`");
            }
            SessionMode::Practice => {}
            SessionMode::Exam => println!("exam abandoned, nothing recorded"),
        }
    }
    Ok(())
}

async fn apply_step(sessions: &SessionLoopService, session: &mut ExamSession, step: Step) {
    let current = session.current_question().map(|q| (q.id(), q.answer()));
    let result = match step {
        Step::Answer(option) => match current {
            Some((id, correct)) => sessions.answer(session, id, option).await.map(|()| {
                if session.mode() == SessionMode::Practice {
                    println!("{}", feedback(option, correct));
                }
            }),
            None => {
                println!("no question selected");
                Ok(())
            }
        },
        Step::Next => navigate(sessions, session, Navigation::Next).await,
        Step::Previous => navigate(sessions, session, Navigation::Previous).await,
        Step::Goto(position) => navigate(sessions, session, Navigation::To(position - 1)).await,
        Step::Flag => match current {
            Some((id, _)) => sessions.toggle_flag(session, id).await.map(|flagged| {
                println!("{}", if flagged { "flagged" } else { "unflagged" });
            }),
            None => {
                println!("no question selected");
                Ok(())
            }
        },
        Step::Theme(theme) => {
            let mut filter = session.filter().clone();
            filter.toggle(&theme);
            let applied = sessions.set_theme_filter(session, filter).await;
            if applied.is_ok() {
                show_question(session);
            }
            applied.map(|_| ())
        }
        Step::Show => {
            show_question(session);
            Ok(())
        }
        Step::Finish => sessions.finish(session).await.map(|outcome| {
            if let FinishOutcome::ReviewPending {
                unanswered,
                flagged,
            } = outcome
            {
                println!(
                    "{} unanswered, {} flagged. `confirm` to submit or `back` to keep working",
                    unanswered.len(),
                    flagged.len()
                );
            }
        }),
        Step::Confirm => sessions.confirm_finish(session).await.map(|_| ()),
        Step::Back => sessions.cancel_finish(session).map(|()| {
            if session.phase() == SessionPhase::InProgress {
                show_question(session);
            }
        }),
        Step::Help => {
            print_help();
            Ok(())
        }
        Step::Quit => Ok(()),
    };
    if let Err(err) = result {
        println!("{err}");
    }
}

async fn navigate(
    sessions: &SessionLoopService,
    session: &mut ExamSession,
    to: Navigation,
) -> Result<(), services::SessionLoopError> {
    sessions.navigate(session, to).await?;
    show_question(session);
    Ok(())
}
