//! Batch training from recorded transitions

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use adopt_rl::{DqnLearner, Experience};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON-lines file with one transition per line
    #[arg(short, long)]
    pub experiences: PathBuf,

    /// Training epochs to run after loading
    #[arg(short = 'n', long, default_value = "100")]
    pub epochs: usize,

    /// Do not save the learner afterwards
    #[arg(long)]
    pub no_save: bool,
}

pub async fn run(args: TrainArgs, config: Config) -> Result<()> {
    let mut learner = super::open_learner(&config)?;
    let loaded = load_experiences(&mut learner, &args.experiences)?;
    info!(
        "Loaded {} transitions from {}",
        loaded,
        args.experiences.display()
    );

    let epochs = args.epochs;
    let (learner, summary) = tokio::task::spawn_blocking(move || {
        let summary = learner.train_epochs(epochs);
        (learner, summary)
    })
    .await
    .context("Training task panicked")?;

    println!("Training Summary");
    println!("================\n");
    println!("Transitions:     {loaded}");
    println!(
        "Epochs:          {}/{}",
        summary.epochs_trained, summary.epochs_requested
    );
    match summary.average_loss {
        Some(loss) => println!("Average loss:    {loss:.6}"),
        None => println!("Average loss:    - (replay memory smaller than one batch)"),
    }
    println!("Epsilon:         {:.4}", summary.epsilon);
    println!("Training step:   {}", summary.training_step);

    let path = config.checkpoint.path.clone();
    super::autosave(&config, args.no_save, || learner.save_checkpoint(&path))
}

/// Push every transition in `path` into the learner's replay memory
fn load_experiences(learner: &mut DqnLearner, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    remember_lines(learner, BufReader::new(file))
}

fn remember_lines(learner: &mut DqnLearner, reader: impl BufRead) -> Result<usize> {
    let state_size = learner.config().state_size;
    let mut count = 0;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("Failed to read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let experience: Experience = serde_json::from_str(&line)
            .with_context(|| format!("Line {line_no}: invalid transition"))?;
        anyhow::ensure!(
            experience.state.len() == state_size && experience.next_state.len() == state_size,
            "Line {line_no}: state must have {state_size} features"
        );
        learner
            .remember(experience)
            .with_context(|| format!("Line {line_no}: transition rejected"))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adopt_rl::{LearnerConfig, StateVector};

    fn learner() -> DqnLearner {
        DqnLearner::new(LearnerConfig {
            hidden_layers: vec![8],
            batch_size: 2,
            seed: Some(1),
            ..LearnerConfig::default()
        })
        .unwrap()
    }

    fn line(action: usize) -> String {
        let state = StateVector::fit(vec![0.1, 0.2], 20);
        let exp = Experience::new(state.clone(), action, 0.5, state, false);
        serde_json::to_string(&exp).unwrap()
    }

    #[test]
    fn test_remember_lines() {
        let mut learner = learner();
        let input = format!("{}\n\n{}\n", line(1), line(9));
        let count = remember_lines(&mut learner, input.as_bytes()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(learner.buffer_len(), 2);
        assert_eq!(learner.train_epochs(3).epochs_trained, 3);
    }

    #[test]
    fn test_invalid_line_reports_position() {
        let mut learner = learner();
        let input = format!("{}\nnot json\n", line(0));
        let err = remember_lines(&mut learner, input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn test_out_of_range_action_rejected() {
        let mut learner = learner();
        let err = remember_lines(&mut learner, line(10).as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 1"));
        assert_eq!(learner.buffer_len(), 0);
    }

    #[test]
    fn test_out_of_range_reward_rejected() {
        let mut learner = learner();
        let state = StateVector::fit(vec![0.1, 0.2], 20);
        let exp = Experience::new(state.clone(), 3, 42.0, state, false);
        let input = format!("{}\n{}\n", line(1), serde_json::to_string(&exp).unwrap());

        let err = remember_lines(&mut learner, input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
        assert_eq!(learner.buffer_len(), 1);
    }

    #[test]
    fn test_wrong_state_size_rejected() {
        let mut learner = learner();
        let state = StateVector::fit(vec![0.1, 0.2], 5);
        let exp = Experience::new(state.clone(), 0, 0.0, state, true);
        let input = serde_json::to_string(&exp).unwrap();
        assert!(remember_lines(&mut learner, input.as_bytes()).is_err());
    }
}
