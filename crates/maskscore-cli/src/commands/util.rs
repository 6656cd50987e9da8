use anyhow::{Context, Result, anyhow};
use std::io::{self, IsTerminal, Read};
use std::path::Path;

/// Resolve the contexts to score from: explicit arguments, a file of lines,
/// or stdin.
///
/// Blank lines are skipped.
pub fn resolve_contexts(contexts: &[String], input: Option<&Path>) -> Result<Vec<String>> {
    if !contexts.is_empty() {
        return Ok(contexts.to_vec());
    }

    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {:?}", path))?,
        None => {
            if !stdin_has_data() {
                return Err(anyhow!(
                    "No contexts provided. Pass --context, --input <FILE>, or pipe lines via stdin."
                ));
            }
            let mut buffer = String::new();
            io::stdin().lock().read_to_string(&mut buffer)?;
            buffer
        }
    };

    Ok(split_lines(&text))
}

pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// Check if stdin has data (non-blocking check)
pub fn stdin_has_data() -> bool {
    !io::stdin().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_contexts_win() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("contexts.txt");
        std::fs::write(&path, "from file\n")?;

        let given = vec!["a|b".to_string()];
        assert_eq!(resolve_contexts(&given, Some(&path))?, given);
        Ok(())
    }

    #[test]
    fn test_input_file_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("contexts.txt");
        std::fs::write(&path, "first\n\n  \nsecond|third\n")?;

        assert_eq!(
            resolve_contexts(&[], Some(&path))?,
            vec!["first".to_string(), "second|third".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_contexts(&[], Some(&dir.path().join("nope.txt"))).is_err());
    }
}
