//! Training statistics of the saved learner

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatsArgs, config: Config) -> Result<()> {
    let learner = super::open_learner(&config)?;
    let stats = learner.stats();
    let path = &config.checkpoint.path;

    if args.json {
        let report = json!({
            "checkpoint": path,
            "checkpoint_exists": path.exists(),
            "stats": stats,
            "params": learner.params(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Learner Statistics");
    println!("==================\n");
    let marker = if path.exists() { "" } else { " (not saved yet)" };
    println!("Checkpoint:      {}{marker}", path.display());
    println!("Backend:         {}", stats.compute_backend);
    println!("Training step:   {}", stats.training_step);
    println!("Epsilon:         {:.4}", stats.epsilon);
    println!("Buffer size:     {}", stats.buffer_size);
    println!("Episodes:        {}", stats.total_episodes);
    println!("Average reward:  {:.4}", stats.average_reward);

    let shape = learner.shape();
    println!();
    println!("Network:         {shape}");
    println!("Parameters:      {}", learner.online().parameter_count());
    Ok(())
}
