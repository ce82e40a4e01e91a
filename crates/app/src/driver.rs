//! Line-oriented terminal front end for one assessment attempt.

use assessment_core::Phase;
use assessment_core::model::AnswerId;
use assessment_core::session::QuestionReview;
use assessment_core::time::format_countdown;
use services::{AssessmentController, AssessmentError, ResultView, TickEvent};
use tokio::io::{self, AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands while answering:
  <n>        choose option n for the current question
  n / p      next / previous question
  g <k>      go to question k
  s          submit
  t          show remaining time and progress
after completion:
  r          review answers
  restart    start over with a fresh question set
always:
  h          this help
  q          quit";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Choose(usize),
    Next,
    Previous,
    Goto(usize),
    Submit,
    Status,
    Review,
    Restart,
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("n"), None) => Input::Next,
        (Some("p"), None) => Input::Previous,
        (Some("g"), Some(k)) => k
            .parse::<usize>()
            .ok()
            .filter(|k| *k > 0)
            .map_or_else(|| Input::Unknown(line.to_owned()), |k| Input::Goto(k - 1)),
        (Some("s"), None) => Input::Submit,
        (Some("t"), None) => Input::Status,
        (Some("r"), None) => Input::Review,
        (Some("restart"), None) => Input::Restart,
        (Some("h" | "help" | "?"), None) => Input::Help,
        (Some("q" | "quit"), None) => Input::Quit,
        (Some(n), None) => n
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map_or_else(|| Input::Unknown(line.to_owned()), |n| Input::Choose(n - 1)),
        _ => Input::Unknown(line.to_owned()),
    }
}

fn print_question(controller: &AssessmentController) {
    let Some(view) = controller.current_question() else {
        return;
    };
    println!();
    println!(
        "Question {}/{} [{}, weight {}]",
        view.index + 1,
        view.total,
        view.difficulty,
        view.weight
    );
    println!("{}", view.prompt);
    for (i, option) in view.options.iter().enumerate() {
        let marker = if option.is_selected { "*" } else { " " };
        println!(" {marker} {}. {}", i + 1, option.text);
    }
}

fn print_status(controller: &AssessmentController) {
    let progress = controller.progress();
    let grid: String = progress
        .grid
        .iter()
        .map(|s| match (s.is_current, s.answered) {
            (true, _) => '>',
            (false, true) => '#',
            (false, false) => '.',
        })
        .collect();
    println!(
        "{} left | {}/{} answered | [{grid}]{}",
        format_countdown(progress.remaining_secs),
        progress.answered,
        progress.total,
        if progress.can_submit { "" } else { " | not ready to submit" }
    );
}

fn print_result(view: &ResultView) {
    println!();
    println!(
        "Score: {}% ({} of {} correct) - {}",
        view.rounded_score(),
        view.correct,
        view.total_questions,
        if view.passed { "passed" } else { "not passed" }
    );
    println!("Passing score: {}%", view.passing_score);
    for line in &view.breakdown {
        println!(
            "  {:<6} {}/{} ({:.0}%)",
            line.difficulty, line.stats.correct, line.stats.total, line.stats.percentage
        );
    }
    println!("Type `r` to review your answers, `restart` to try again, `q` to quit.");
}

fn print_review(reviews: &[QuestionReview]) {
    for (i, review) in reviews.iter().enumerate() {
        println!();
        let mark = if review.is_correct { "correct" } else { "incorrect" };
        println!("{}. {} ({mark})", i + 1, review.prompt);
        for option in &review.options {
            let chosen = if option.is_selected { ">" } else { " " };
            let flag = if option.is_correct { " (correct)" } else { "" };
            println!(" {chosen} {}{flag}", option.text);
        }
        println!("   {}", review.verdict);
        if review.explanation != review.verdict {
            println!("   {}", review.explanation);
        }
    }
}

fn report(err: &AssessmentError) {
    println!("! {err}");
}

/// Apply one line of input. Returns `false` when the user asked to quit.
async fn handle_input(controller: &mut AssessmentController, input: Input) -> bool {
    match input {
        Input::Quit => return false,
        Input::Help => println!("{HELP}"),
        Input::Unknown(raw) if raw.is_empty() => {}
        Input::Unknown(raw) => println!("unknown command `{raw}`, type `h` for help"),
        Input::Status => print_status(controller),
        Input::Choose(option) => {
            let answer: Option<AnswerId> = controller
                .current_question()
                .and_then(|q| q.options.get(option).map(|o| o.id.clone()));
            match answer {
                Some(id) => match controller.select_current(id) {
                    Ok(_) => print_question(controller),
                    Err(e) => report(&e),
                },
                None => println!("! no option {}", option + 1),
            }
        }
        Input::Next => match controller.next() {
            Ok(_) => print_question(controller),
            Err(e) => report(&e),
        },
        Input::Previous => match controller.previous() {
            Ok(_) => print_question(controller),
            Err(e) => report(&e),
        },
        Input::Goto(index) => match controller.navigate(index) {
            Ok(()) => print_question(controller),
            Err(e) => report(&e),
        },
        Input::Submit => {
            println!("Submitting...");
            match controller.submit().await {
                Ok(_) => {
                    if let Some(view) = controller.result_view() {
                        print_result(&view);
                    }
                }
                Err(e) => report(&e),
            }
        }
        Input::Review => match controller.phase() {
            Phase::Reviewing => match controller.review() {
                Ok(reviews) => print_review(&reviews),
                Err(e) => report(&e),
            },
            _ => match controller.enter_review() {
                Ok(reviews) => print_review(&reviews),
                Err(e) => report(&e),
            },
        },
        Input::Restart => {
            let restarted = match controller.restart(true).await {
                Ok(()) => controller.start().await,
                Err(e) => Err(e),
            };
            match restarted {
                Ok(()) => {
                    print_status(controller);
                    print_question(controller);
                }
                Err(e) => report(&e),
            }
        }
    }
    true
}

fn handle_tick(controller: &AssessmentController, event: TickEvent) {
    match event {
        TickEvent::Idle => {}
        TickEvent::Ticked { remaining_secs } => {
            if remaining_secs % 60 == 0 || remaining_secs <= 10 {
                println!("  ({} left)", format_countdown(remaining_secs));
            }
        }
        TickEvent::AutoSubmitted(_) => {
            println!();
            println!("Time is up, your answers were submitted.");
            if let Some(view) = controller.result_view() {
                print_result(&view);
            }
        }
        TickEvent::AutoSubmitFailed(message) => {
            println!();
            println!("Time is up, but submitting failed: {message}");
            println!("Type `s` to try again.");
        }
    }
}

/// Run an attempt until the user quits or stdin closes.
///
/// # Errors
///
/// Returns `AssessmentError` if the first load/start fails, or an I/O error
/// reading stdin.
pub async fn run(mut controller: AssessmentController) -> Result<(), Box<dyn std::error::Error>> {
    controller.start().await?;
    println!("{HELP}");
    print_status(&controller);
    print_question(&controller);

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_input(&mut controller, parse_input(&line)).await {
                    break;
                }
            }
            () = controller.tick_ready() => {
                let event = controller.handle_tick().await;
                handle_tick(&controller, event);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_input("2"), Input::Choose(1));
        assert_eq!(parse_input(" n "), Input::Next);
        assert_eq!(parse_input("g 3"), Input::Goto(2));
        assert_eq!(parse_input("restart"), Input::Restart);
        assert_eq!(parse_input("0"), Input::Unknown("0".into()));
        assert_eq!(parse_input("g x"), Input::Unknown("g x".into()));
    }
}
