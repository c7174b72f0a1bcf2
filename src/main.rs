use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use snakedqn::{Agent, Config, Controller, GridSimulation, Renderer, TextRenderer, Trainer, encoder};

#[derive(Parser)]
#[command(name = "snakedqn")]
#[command(about = "Train and run a DQN agent on a grid Snake game", long_about = None)]
struct Cli {
    /// JSON config file; absent keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Board width in cells
    #[arg(long, global = true)]
    width: Option<i32>,

    /// Board height in cells
    #[arg(long, global = true)]
    height: Option<i32>,

    /// Seed for the agent and the food placement
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run training episodes and save the model
    Train {
        #[arg(long)]
        episodes: Option<usize>,

        /// Model file to save to (and resume from)
        #[arg(long)]
        model: Option<PathBuf>,

        /// CSV file receiving one row per episode
        #[arg(long)]
        log: Option<PathBuf>,

        #[arg(long)]
        checkpoint_every: Option<usize>,

        /// Load the model before training when it exists
        #[arg(long)]
        resume: bool,

        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Let the greedy agent play one episode in the terminal
    Play {
        #[arg(long)]
        model: Option<PathBuf>,

        /// Milliseconds between frames
        #[arg(long, default_value_t = 150)]
        delay: u64,

        #[arg(long, default_value_t = 1000)]
        max_steps: usize,
    },
    /// Read control commands from stdin, one per line
    Console,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(width) = cli.width {
        config.game.width = width;
    }
    if let Some(height) = cli.height {
        config.game.height = height;
    }
    if cli.seed.is_some() {
        config.agent.seed = cli.seed;
    }

    Ok(config)
}

fn new_simulation(config: &Config) -> Result<GridSimulation> {
    let simulation = match config.agent.seed {
        Some(seed) => GridSimulation::with_seed(&config.game, seed),
        None => GridSimulation::new(&config.game),
    };
    simulation.context("failed to create the simulation")
}

fn train(config: Config, resume: bool) -> Result<()> {
    let train = &config.train;
    let mut agent = Agent::new(&config.agent);
    let mut simulation = new_simulation(&config)?;

    if resume {
        agent.load_parameters(&train.model_path)
            .with_context(|| format!("failed to resume from {}", train.model_path.display()))?;
    }

    info!("training for {} episodes on a {}x{} board", train.episodes, config.game.width, config.game.height);

    let reports = {
        let mut trainer = Trainer::new(&mut agent, &mut simulation, config.rewards.clone())
            .with_max_steps(train.max_steps);
        if let Some(path) = &train.episode_log {
            trainer = trainer.with_episode_log(path)
                .with_context(|| format!("failed to open episode log {}", path.display()))?;
        }
        if let Some(every) = train.checkpoint_every {
            trainer = trainer.with_checkpoints(train.model_path.clone(), every);
        }
        trainer.run(train.episodes, &AtomicBool::new(false))?
    };
    let best = reports.iter().map(|r| r.score).max().unwrap_or(0);
    info!("training finished, best score {}, epsilon {:.4}", best, agent.epsilon());

    agent.save_parameters(&train.model_path)
        .with_context(|| format!("failed to save model to {}", train.model_path.display()))?;
    Ok(())
}

fn play(config: Config, delay: u64, max_steps: usize) -> Result<()> {
    let mut agent = Agent::new(&config.agent);
    let mut simulation = new_simulation(&config)?;

    let model_path = &config.train.model_path;
    if !agent.load_parameters(model_path)? {
        info!("no model at {}, playing with untrained parameters", model_path.display());
    }

    let mut renderer = TextRenderer::new(io::stdout());
    let mut snapshot = simulation.reset()?;
    renderer.render(&snapshot)?;

    for _ in 0..max_steps {
        if snapshot.game_over {
            break;
        }
        let action = agent.best_action(&encoder::encode(&snapshot));
        snapshot = simulation.step(action)?;

        thread::sleep(Duration::from_millis(delay));
        renderer.render(&snapshot)?;
    }

    info!("final score {}", snapshot.score);
    Ok(())
}

fn console(config: Config) -> Result<()> {
    let mut controller = Controller::new(config).context("failed to create the controller")?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        writeln!(stdout, "{}", controller.handle_line(line))?;
        stdout.flush()?;
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Train { episodes, model, log, checkpoint_every, resume, max_steps } => {
            if let Some(episodes) = episodes {
                config.train.episodes = episodes;
            }
            if let Some(model) = model {
                config.train.model_path = model;
            }
            config.train.episode_log = log.or(config.train.episode_log);
            config.train.checkpoint_every = checkpoint_every.or(config.train.checkpoint_every);
            config.train.max_steps = max_steps.or(config.train.max_steps);
            config.validate()?;
            train(config, resume)
        }
        Command::Play { model, delay, max_steps } => {
            if let Some(model) = model {
                config.train.model_path = model;
            }
            config.validate()?;
            play(config, delay, max_steps)
        }
        Command::Console => {
            config.validate()?;
            console(config)
        }
    }
}
