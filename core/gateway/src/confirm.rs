//! Confirmation hooks for destructive operations.

use std::io::{BufRead, Write};
use tokio::runtime::{Handle, RuntimeFlavor};

use tablegate_common::{Result, TableName};

/// Decides whether a table may be deleted.
pub trait Confirm: Send + Sync {
    fn confirm(&self, table: &TableName) -> Result<bool>;
}

/// Always confirms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Force;

impl Confirm for Force {
    fn confirm(&self, _table: &TableName) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on the terminal and blocks until the operator answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl StdinPrompt {
    /// Ask once on the given streams.
    pub fn ask(table: &TableName, input: &mut impl BufRead, output: &mut impl Write) -> Result<bool> {
        write!(
            output,
            "Delete table '{}' and all its contents? [y/N] ",
            table
        )?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

impl Confirm for StdinPrompt {
    fn confirm(&self, table: &TableName) -> Result<bool> {
        run_blocking(|| {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            Self::ask(table, &mut input, &mut std::io::stderr())
        })
    }
}

/// Run a blocking call without stalling other tasks on a multi-threaded
/// runtime. Elsewhere the call runs in place.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// `y` or `yes`, ignoring case and surrounding whitespace.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative("  YES "));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn test_prompt_reads_answer() {
        let table = TableName::new("sales").unwrap();
        let mut output = Vec::new();

        let confirmed = StdinPrompt::ask(&table, &mut &b"yes\n"[..], &mut output).unwrap();
        assert!(confirmed);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Delete table 'sales' and all its contents? [y/N] "
        );

        let declined = StdinPrompt::ask(&table, &mut &b"\n"[..], &mut Vec::new()).unwrap();
        assert!(!declined);

        // EOF counts as a refusal
        let eof = StdinPrompt::ask(&table, &mut &b""[..], &mut Vec::new()).unwrap();
        assert!(!eof);
    }

    #[test]
    fn test_force() {
        let table = TableName::new("t").unwrap();
        assert!(Force.confirm(&table).unwrap());
    }

    #[test]
    fn test_run_blocking_outside_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test]
    async fn test_run_blocking_current_thread() {
        assert_eq!(run_blocking(|| "in place"), "in place");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_blocking_multi_thread() {
        let answer = tokio::spawn(async { run_blocking(|| 42) }).await.unwrap();
        assert_eq!(answer, 42);
    }
}
