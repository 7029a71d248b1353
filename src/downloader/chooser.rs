// Interactive chooser reading numbered answers from a line-based input

use std::io::{BufRead, BufReader, Stdin};
use std::path::Path;
use std::sync::Mutex;

use tracing::{info, warn};

use super::models::OverwriteDecision;
use super::traits::Chooser;

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Pick(usize),
    Cancel,
    Invalid,
}

// 1..=len picks, 0 cancels
fn parse_choice(input: &str, len: usize) -> Answer {
    match input.trim().parse::<usize>() {
        Ok(0) => Answer::Cancel,
        Ok(n) if n <= len => Answer::Pick(n - 1),
        _ => Answer::Invalid,
    }
}

fn parse_overwrite(input: &str) -> Option<OverwriteDecision> {
    match input.trim().to_lowercase().as_str() {
        "o" | "overwrite" | "y" | "yes" => Some(OverwriteDecision::Overwrite),
        "s" | "skip" | "n" | "no" => Some(OverwriteDecision::Skip),
        "a" | "abort" | "q" | "quit" => Some(OverwriteDecision::Abort),
        _ => None,
    }
}

/// Prompts on stderr and reads answers line by line; end of input counts as cancel/abort
pub struct LineChooser<R> {
    input: Mutex<R>,
}

impl LineChooser<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send> LineChooser<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    fn read_line(&self) -> Option<String> {
        let mut guard = match self.input.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut line = String::new();
        match guard.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }
}

impl<R: BufRead + Send> Chooser for LineChooser<R> {
    fn choose(&self, prompt: &str, options: &[String]) -> Option<usize> {
        info!("{}", prompt);
        for (i, option) in options.iter().enumerate() {
            eprintln!("  {}. {}", i + 1, option);
        }
        eprintln!("  0. none of these");

        loop {
            info!("Choose your number:");
            eprint!("> ");
            let line = self.read_line()?;
            match parse_choice(&line, options.len()) {
                Answer::Pick(i) => return Some(i),
                Answer::Cancel => return None,
                Answer::Invalid => warn!("Choose a valid number!"),
            }
        }
    }

    fn confirm_overwrite(&self, path: &Path) -> OverwriteDecision {
        loop {
            info!("{} already exists. [o]verwrite, [s]kip or [a]bort?", path.display());
            eprint!("> ");
            let Some(line) = self.read_line() else {
                return OverwriteDecision::Abort;
            };
            match parse_overwrite(&line) {
                Some(decision) => return decision,
                None => warn!("Answer o, s or a"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_numbered_answers() {
        assert_eq!(parse_choice("2\n", 3), Answer::Pick(1));
        assert_eq!(parse_choice("0", 3), Answer::Cancel);
        assert_eq!(parse_choice("4", 3), Answer::Invalid);
        assert_eq!(parse_choice("abc", 3), Answer::Invalid);
    }

    #[test]
    fn retries_until_valid_number() {
        let chooser = LineChooser::new(Cursor::new("x\n9\n2\n"));
        let options = vec!["a".to_string(), "b".to_string()];
        assert_eq!(chooser.choose("Pick", &options), Some(1));
    }

    #[test]
    fn end_of_input_cancels() {
        let chooser = LineChooser::new(Cursor::new(""));
        assert_eq!(chooser.choose("Pick", &["a".to_string()]), None);
        assert_eq!(
            chooser.confirm_overwrite(Path::new("song.mp3")),
            OverwriteDecision::Abort
        );
    }

    #[test]
    fn overwrite_answers() {
        let chooser = LineChooser::new(Cursor::new("maybe\ns\no\na\n"));
        let path = Path::new("song.mp3");
        assert_eq!(chooser.confirm_overwrite(path), OverwriteDecision::Skip);
        assert_eq!(chooser.confirm_overwrite(path), OverwriteDecision::Overwrite);
        assert_eq!(chooser.confirm_overwrite(path), OverwriteDecision::Abort);
    }
}
