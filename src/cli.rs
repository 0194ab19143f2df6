use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::auth::AuthSession;
use crate::core::clock;
use crate::core::config::Settings;
use crate::core::time::to_naive_local;
use crate::schemas::exam::{ExamListingDto, ExamListResponse};
use crate::services::attempt::{AttemptSession, AttemptStore, SessionPhase, SubmitReason};
use crate::services::backend::{BackendError, ExamBackend};
use crate::services::countdown::{format_remaining, CountdownEvent, CountdownTimer};
use crate::tasks::refresh::ExamListRefresher;

/// Watch mode: keep the exam list fresh on screen until Ctrl+C.
pub(crate) async fn watch_exams(
    backend: ExamBackend,
    auth: AuthSession,
    settings: &Settings,
) -> anyhow::Result<()> {
    let refresher = ExamListRefresher::spawn(
        backend,
        auth.clone(),
        Duration::from_secs(settings.exam().refresh_interval_seconds),
    );
    let mut updates = refresher.updates();

    println!("Watching your exams (Ctrl+C to stop).");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(list) = updates.borrow_and_update().as_ref() {
                    render_exam_list(list);
                }
            }
        }
    }

    refresher.stop().await;
    auth.invalidate();
    Ok(())
}

/// Take mode: run one attempt end to end from the terminal.
pub(crate) async fn take_exam(
    backend: ExamBackend,
    auth: AuthSession,
    exam_id: i64,
) -> anyhow::Result<()> {
    let reading = clock::read(&backend).await;
    if !reading.authoritative {
        println!("WARNING: the portal clock is unreachable; deadlines below use this device's clock and may be wrong.");
    }

    let list = match backend.active_exams(&auth).await {
        Ok(list) => list,
        Err(BackendError::Unauthorized) => {
            auth.invalidate();
            anyhow::bail!("the portal rejected the session token; log in again");
        }
        Err(err) => return Err(err.into()),
    };

    let listing = list
        .exams
        .iter()
        .chain(list.upcoming_exams.iter())
        .find(|listing| listing.exam.id == exam_id)
        .with_context(|| format!("exam {exam_id} is not in your exam list"))?;

    let mut session = AttemptSession::new(backend.clone(), auth.clone(), listing.exam.clone());
    session.initialize(reading).await?;

    if session.phase() == SessionPhase::Submitted {
        println!("This exam was already submitted.");
        print_result(&backend, &auth, exam_id).await;
        auth.invalidate();
        return Ok(());
    }

    let exam = session.exam();
    println!(
        "{} exam for {} ({:.0}% of the course grade) | window (Istanbul): {} -> {} | {} questions | {} minutes left",
        exam.exam_type,
        exam.course
            .as_ref()
            .map(|course| format!("{} {}", course.code, course.name))
            .unwrap_or_else(|| format!("course {}", exam.course_id)),
        exam.weight_percentage,
        to_naive_local(exam.start_time),
        to_naive_local(exam.end_time),
        session.question_count(),
        session.remaining_minutes(),
    );
    print_help();
    render_question(&session);

    let mut countdown = CountdownTimer::arm(session.remaining_minutes());
    let mut countdown_done = false;
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            event = countdown.next_event(), if !countdown_done => match event {
                Some(CountdownEvent::Tick { remaining_seconds }) => {
                    let urgent = countdown.under_one_minute();
                    if remaining_seconds % 60 == 0 || (urgent && remaining_seconds % 15 == 0) {
                        println!(
                            "  [{} remaining{}]",
                            format_remaining(remaining_seconds),
                            if urgent { " - under a minute!" } else { "" }
                        );
                    }
                }
                Some(CountdownEvent::Expired) => {
                    countdown_done = true;
                    println!("Time is up; submitting your answers.");
                    if try_submit(&mut session, SubmitReason::TimerExpired).await {
                        break;
                    }
                }
                None => countdown_done = true,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from the terminal")? else {
                    break;
                };
                match parse_command(line.trim()) {
                    Command::Empty => {}
                    Command::Help => print_help(),
                    Command::Show => render_question(&session),
                    Command::Answer(ordinal) => {
                        answer_current(&mut session, ordinal);
                        render_question(&session);
                    }
                    Command::Clear => {
                        if let Some(question_id) = session.current_question().map(|q| q.id) {
                            session.select_answer(question_id, None);
                            render_question(&session);
                        }
                    }
                    Command::Next => {
                        session.next_question();
                        render_question(&session);
                    }
                    Command::Previous => {
                        session.previous_question();
                        render_question(&session);
                    }
                    Command::Goto(number) => {
                        session.navigate_to(number.saturating_sub(1));
                        render_question(&session);
                    }
                    Command::Status => render_status(&session, &countdown),
                    Command::Submit => {
                        let unanswered = session.unanswered_count();
                        if unanswered > 0 {
                            println!("Submitting with {unanswered} unanswered question(s).");
                        }
                        if try_submit(&mut session, SubmitReason::Manual).await {
                            break;
                        }
                    }
                    Command::Quit => {
                        println!("Leaving the exam screen; the attempt stays in progress.");
                        session.abandon();
                        break;
                    }
                    Command::Unknown(raw) => {
                        println!("Unknown command {raw:?}; type 'help' for the command list.");
                    }
                }
            }
        }
    }

    countdown.cancel();
    if session.phase() == SessionPhase::Submitted {
        print_result(&backend, &auth, exam_id).await;
    }
    auth.invalidate();
    Ok(())
}

enum Command {
    Empty,
    Help,
    Show,
    Answer(usize),
    Clear,
    Next,
    Previous,
    Goto(usize),
    Status,
    Submit,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Command::Empty;
    };

    match (head, parts.next()) {
        ("help" | "h" | "?", _) => Command::Help,
        ("show", _) => Command::Show,
        ("a" | "answer", Some(ordinal)) => match ordinal.parse() {
            Ok(ordinal) => Command::Answer(ordinal),
            Err(_) => Command::Unknown(line.to_string()),
        },
        ("c" | "clear", _) => Command::Clear,
        ("n" | "next", _) => Command::Next,
        ("p" | "prev", _) => Command::Previous,
        ("g" | "goto", Some(number)) => match number.parse() {
            Ok(number) => Command::Goto(number),
            Err(_) => Command::Unknown(line.to_string()),
        },
        ("status", _) => Command::Status,
        ("submit", _) => Command::Submit,
        ("q" | "quit", _) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

fn print_help() {
    println!(
        "Commands: show | a <option#> | clear | n(ext) | p(rev) | g(oto) <question#> | status | submit | quit"
    );
}

fn answer_current<S: AttemptStore>(session: &mut AttemptSession<S>, ordinal: usize) {
    let Some(question) = session.current_question() else {
        return;
    };
    let target = question
        .answer_options
        .get(ordinal.saturating_sub(1))
        .map(|option| (option.question_id, option.id));
    match target {
        Some((question_id, option_id)) => session.select_answer(question_id, Some(option_id)),
        None => println!("There is no option {ordinal} on this question."),
    }
}

fn render_question<S: AttemptStore>(session: &AttemptSession<S>) {
    let Some(question) = session.current_question() else {
        return;
    };

    println!(
        "\nQuestion {}/{} [{}] ({} pts): {}",
        session.cursor() + 1,
        session.question_count(),
        question.question_type,
        question.points,
        question.question_text
    );
    let selected = session.selected_option(question.id);
    for (index, option) in question.answer_options.iter().enumerate() {
        let marker = if selected == Some(option.id) { "*" } else { " " };
        println!("  [{marker}] {}. {}", index + 1, option.option_text);
    }
}

fn render_status<S: AttemptStore>(session: &AttemptSession<S>, countdown: &CountdownTimer) {
    println!(
        "Answered {}/{} | unanswered {} | time remaining {}",
        session.answered_count(),
        session.question_count(),
        session.unanswered_count(),
        format_remaining(countdown.remaining_seconds()),
    );
}

async fn try_submit<S: AttemptStore>(
    session: &mut AttemptSession<S>,
    reason: SubmitReason,
) -> bool {
    match session.submit(reason).await {
        Ok(Some(response)) => {
            println!("Submitted. {}", response.message);
            true
        }
        Ok(None) => session.phase() == SessionPhase::Submitted,
        Err(err) => {
            println!("{err}. Type 'submit' to retry.");
            false
        }
    }
}

async fn print_result(backend: &ExamBackend, auth: &AuthSession, exam_id: i64) {
    match backend.exam_result(auth, exam_id).await {
        Ok(result) => {
            println!(
                "Your score: {:.2}/{:.2} ({:.1}%) | class average {:.2} ({:.1}%) over {} participant(s)",
                result.my_result.score,
                result.my_result.max_score,
                result.my_result.percentage,
                result.statistics.average_score,
                result.statistics.average_percentage,
                result.statistics.total_participants,
            );
        }
        Err(err) => {
            tracing::info!(exam_id, error = %err, "Result not available yet");
            println!("The result is not available yet; check the portal later.");
        }
    }
}

fn render_exam_list(list: &ExamListResponse) {
    println!("\nActive exams:");
    if list.exams.is_empty() {
        println!("  (none right now)");
    }
    for listing in &list.exams {
        println!("  {}", describe_listing(listing));
    }

    if !list.upcoming_exams.is_empty() {
        println!("Upcoming exams:");
        for listing in &list.upcoming_exams {
            println!("  {}", describe_listing(listing));
        }
    }
}

fn describe_listing(listing: &ExamListingDto) -> String {
    let exam = &listing.exam;
    let state = if listing.already_taken {
        "already taken"
    } else if listing.in_progress {
        "in progress"
    } else if listing.can_start {
        "can start"
    } else if listing.is_upcoming {
        "upcoming"
    } else {
        "not open yet"
    };

    let course = exam
        .course
        .as_ref()
        .map(|course| course.code.clone())
        .unwrap_or_else(|| format!("course {}", exam.course_id));

    format!(
        "#{} {} {} | Istanbul: {} -> {} | {} min | {}",
        exam.id,
        course,
        exam.exam_type,
        to_naive_local(exam.start_time),
        to_naive_local(exam.end_time),
        exam.duration_minutes,
        state,
    )
}
