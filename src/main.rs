use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use neurogame::engine::Direction;
use neurogame::game::{Boot, Game, GameConfig, MoveReport};

#[derive(Debug, Parser)]
#[command(name = "neurogame", version, about = "Play 2048 while a neural net learns your moves")]
struct Args {
    /// State file holding the network weights and the board
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Seed for tile spawns and weight initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Ignore any saved state and start with fresh weights
    #[arg(long)]
    fresh: bool,

    /// Suppress the spinner while training
    #[arg(long)]
    quiet: bool,
}

const HELP: &str = "w/a/s/d or up/left/down/right: move | n: new game | t: train | save | load | q: quit";

fn default_state_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join("Documents").join("neurogame.sv"),
        None => PathBuf::from("neurogame.sv"),
    }
}

fn parse_direction(cmd: &str) -> Option<Direction> {
    match cmd {
        "w" | "up" => Some(Direction::Up),
        "a" | "left" => Some(Direction::Left),
        "s" | "down" => Some(Direction::Down),
        "d" | "right" => Some(Direction::Right),
        _ => None,
    }
}

fn show(game: &Game) {
    println!("{}", game.grid());
    println!("{}", game.hint());
}

fn learn(game: &mut Game, quiet: bool) {
    let pb = (!quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.set_message(format!("training on {} moves", game.brain().episodes().len()));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });
    let report = game.learn();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    println!(
        "Trained {} moves over {} epochs ({} corrections)",
        report.episodes, report.epochs, report.corrections
    );
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let cfg = GameConfig {
        state_path: args.state.unwrap_or_else(default_state_path),
        seed: args.seed,
        ..GameConfig::default()
    };
    let mut game = Game::new(cfg)?;
    let boot = if args.fresh {
        game.start_fresh();
        Boot::Fresh
    } else {
        game.boot()
    };
    if boot == Boot::Loaded {
        println!("Loaded {}", game.state_path().display());
    }
    println!("{HELP}");
    show(&game);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let cmd = line.trim().to_ascii_lowercase();
        if let Some(dir) = parse_direction(&cmd) {
            match game.play(dir) {
                MoveReport::Moved => show(&game),
                MoveReport::Lost => println!("Lost"),
                MoveReport::Blocked => println!("Try other direction"),
            }
            continue;
        }
        match cmd.as_str() {
            "" => {}
            "n" | "new" => {
                game.start();
                show(&game);
            }
            "t" | "train" => {
                learn(&mut game, args.quiet);
                show(&game);
            }
            "save" => match game.save() {
                Ok(()) => println!("Saved in {}", game.state_path().display()),
                Err(e) => eprintln!("Save failed: {e}"),
            },
            "load" => match game.load() {
                Ok(()) => show(&game),
                Err(e) => eprintln!("Load failed: {e}"),
            },
            "q" | "quit" => break,
            _ => println!("{HELP}"),
        }
        io::stdout().flush()?;
    }
    Ok(())
}
