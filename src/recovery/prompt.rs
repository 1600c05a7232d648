//! Operator decision collaborators.

use super::summary::RecoverySummary;
use super::RecoveryDecision;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use tracing::{debug, warn};

/// Asks what to do with an interrupted run
pub trait RecoveryPrompt: Send {
    fn ask_recovery_decision(&mut self, summary: &RecoverySummary) -> RecoveryDecision;
}

/// Line-based prompt over any reader/writer pair.
///
/// Empty input or `c` continues, `r` restarts, `a` aborts. End of input or a read
/// error aborts. Anything else asks again.
#[derive(Debug)]
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn show_summary(&mut self, summary: &RecoverySummary) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "{summary}")?;
        writeln!(self.output)?;
        writeln!(self.output, "Choose an option:")?;
        writeln!(self.output, "  (C)ontinue where it stopped")?;
        writeln!(self.output, "  (R)estart from scratch")?;
        writeln!(self.output, "  (A)bort")?;
        self.output.flush()
    }
}

impl<R: BufRead + Send, W: Write + Send> RecoveryPrompt for ConsolePrompt<R, W> {
    fn ask_recovery_decision(&mut self, summary: &RecoverySummary) -> RecoveryDecision {
        if let Err(e) = self.show_summary(summary) {
            warn!(error = %e, "Could not write recovery prompt");
        }

        let mut line = String::new();
        loop {
            // Prompt text is best effort
            let _ = write!(self.output, "Option [C/r/a]: ");
            let _ = self.output.flush();

            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) => {
                    debug!("Recovery prompt reached end of input");
                    let _ = writeln!(self.output);
                    return RecoveryDecision::Abort;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Could not read recovery decision");
                    return RecoveryDecision::Abort;
                }
            }

            match line.trim().to_lowercase().as_str() {
                "" | "c" => return RecoveryDecision::Continue,
                "r" => return RecoveryDecision::Restart,
                "a" => return RecoveryDecision::Abort,
                other => {
                    debug!(input = %other, "Invalid recovery option");
                    let _ = writeln!(self.output, "Invalid option. Enter C, R or A.");
                }
            }
        }
    }
}

/// Answers every prompt with a fixed decision, for unattended runs
#[derive(Debug, Clone, Copy)]
pub struct NonInteractivePrompt(pub RecoveryDecision);

impl RecoveryPrompt for NonInteractivePrompt {
    fn ask_recovery_decision(&mut self, summary: &RecoverySummary) -> RecoveryDecision {
        debug!(decision = %self.0, interrupted = summary.is_interrupted(), "Using configured recovery decision");
        self.0
    }
}
