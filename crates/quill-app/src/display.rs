//! Console rendering of dialogue progress.
//!
//! Assistant text and prompts go to stdout; logs stay on stderr.

use std::io::Write;
use std::path::Path;

use quill_dialogue::DialogueObserver;

const RULER: &str = "----------------------";

/// Prints the conversation as it happens.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleDisplay {
    done_hint: &'static str,
}

impl ConsoleDisplay {
    /// `done_hint` tells the user how to end a turn.
    pub fn new(done_hint: &'static str) -> Self {
        Self { done_hint }
    }
}

impl DialogueObserver for ConsoleDisplay {
    fn on_listening(&self, turn: u64) {
        if turn == 1 {
            println!("Start speaking. {} when you are DONE dictating...", self.done_hint);
        } else {
            println!("\nYour turn, please answer... ({} when done)", self.done_hint);
        }
    }

    fn on_opening_request(&self, utterance: &str) {
        println!("\n--- Raw Transcript ---");
        println!("{utterance}");
        println!("{RULER}\n");
    }

    fn on_empty_turn(&self, _turn: u64) {
        println!("(Nothing heard.)");
    }

    fn on_delta(&self, delta: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    }

    fn on_reply_complete(&self, _reply: &str) {
        println!();
    }

    fn on_aborted(&self) {
        println!("No speech captured. Exiting.");
    }

    fn on_letter_emitted(&self, path: &Path) {
        println!("Letter saved as PDF: {}", path.display());
        println!("\n--- Letter generation completed ---");
    }
}
