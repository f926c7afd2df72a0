//! `hivemind validate`: shape-check a task descriptor file.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::domain::models::SwarmTask;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Task descriptor file (JSON array of tasks)
    #[arg(long)]
    pub tasks: PathBuf,
}

pub async fn execute(args: ValidateArgs, json_mode: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.tasks)
        .await
        .with_context(|| format!("Failed to read task file {}", args.tasks.display()))?;
    let tasks: Vec<SwarmTask> = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed task file {}", args.tasks.display()))?;

    let problems = check(&tasks);
    if json_mode {
        let payload = serde_json::json!({
            "tasks": tasks.len(),
            "valid": problems.is_empty(),
            "problems": problems,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if problems.is_empty() {
        println!("{} tasks, all valid", tasks.len());
    } else {
        println!("{} tasks, {} problems:", tasks.len(), problems.len());
        for problem in &problems {
            println!("  {problem}");
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Validation failed with {} problems", problems.len())
    }
}

fn check(tasks: &[SwarmTask]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    for task in tasks {
        if let Err(e) = task.validate() {
            problems.push(e.to_string());
        }
        if !seen.insert(&task.id) {
            // Duplicate ids are last-write-wins at enqueue; surfacing
            // them here catches the usual copy-paste mistake early.
            problems.push(format!("duplicate task id '{}'", task.id));
        }
        for dep in &task.dependencies {
            if !ids.contains(dep.as_str()) {
                problems.push(format!(
                    "task '{}' depends on unknown task '{dep}'",
                    task.id
                ));
            }
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_accepts_well_formed_batch() {
        let tasks = vec![
            SwarmTask::new("a", "first", 1),
            SwarmTask::new("b", "second", 2).with_dependency("a"),
        ];
        assert!(check(&tasks).is_empty());
    }

    #[test]
    fn test_check_flags_duplicate_ids() {
        let tasks = vec![
            SwarmTask::new("a", "first", 1),
            SwarmTask::new("a", "again", 1),
        ];
        let problems = check(&tasks);
        assert!(problems.iter().any(|p| p.contains("duplicate")));
    }

    #[test]
    fn test_check_flags_unknown_dependency() {
        let tasks = vec![SwarmTask::new("a", "first", 1).with_dependency("ghost")];
        let problems = check(&tasks);
        assert!(problems.iter().any(|p| p.contains("unknown task 'ghost'")));
    }

    #[test]
    fn test_check_flags_invalid_priority() {
        let tasks = vec![SwarmTask::new("a", "first", 0)];
        assert_eq!(check(&tasks).len(), 1);
    }
}
