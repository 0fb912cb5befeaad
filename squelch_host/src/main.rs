mod config;
mod project_io;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use squelch_engine::export::{self, BitDepth};
use squelch_engine::{AudioEngine, IntervalTicker, OfflineRenderer, Player, SchedulerConfig, SessionHandle};
use squelch_shared::Session;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::HostConfig;

#[derive(Parser)]
#[command(name = "squelch")]
#[command(about = "Step sequencer for acid bass lines and drum patterns", long_about = None)]
struct Cli {
    /// TOML file with [engine] and [export] tables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a pattern file on the default output device
    Play {
        /// Pattern file (.csv or .mid)
        file: PathBuf,

        /// Block to start from
        #[arg(short, long, default_value = "0")]
        block: usize,

        /// Override the file's tempo
        #[arg(long)]
        bpm: Option<u32>,

        /// Passes over the whole pattern before stopping
        #[arg(short, long, default_value = "1")]
        loops: usize,
    },

    /// Render a pattern file to WAV without an audio device
    Render {
        /// Pattern file (.csv or .mid)
        file: PathBuf,

        /// Output WAV path
        #[arg(short, long, default_value = "out.wav")]
        output: PathBuf,

        /// Override the file's tempo
        #[arg(long)]
        bpm: Option<u32>,

        /// Passes over the whole pattern
        #[arg(short, long, default_value = "1")]
        loops: usize,

        /// Write 32-bit float samples
        #[arg(long)]
        float: bool,
    },

    /// Convert between CSV and MIDI pattern files
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Override the tempo written to the output
        #[arg(long)]
        bpm: Option<u32>,
    },

    /// Print a summary of a pattern file
    Info { file: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = HostConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            file,
            block,
            bpm,
            loops,
        } => play(&config, &file, block, bpm, loops),
        Commands::Render {
            file,
            output,
            bpm,
            loops,
            float,
        } => render(&config, &file, &output, bpm, loops, float),
        Commands::Convert { input, output, bpm } => {
            let mut session = project_io::load_session(&input)?;
            if let Some(bpm) = bpm {
                session.set_bpm(bpm);
            }
            project_io::save_session(&session, &output)
        }
        Commands::Info { file } => {
            let session = project_io::load_session(&file)?;
            print_info(&session);
            Ok(())
        }
    }
}

fn load_with_tempo(file: &Path, bpm: Option<u32>) -> Result<Session> {
    let mut session = project_io::load_session(file)?;
    if let Some(bpm) = bpm {
        session.set_bpm(bpm);
    }
    Ok(session)
}

fn play(config: &HostConfig, file: &Path, block: usize, bpm: Option<u32>, loops: usize) -> Result<()> {
    let session = load_with_tempo(file, bpm)?;
    let total_steps = (session.pattern().total_steps() * loops.max(1)) as u64;
    let block = block.min(session.block_count() - 1);
    let handle = SessionHandle::new(session);

    let engine = AudioEngine::new(&config.engine).context("opening audio output")?;
    let ticker = IntervalTicker::new(config.engine.tick_interval());
    let player = Player::spawn(
        handle.clone(),
        engine.clock(),
        &ticker,
        Some(Box::new(engine.dispatch(handle))),
        SchedulerConfig::from(&config.engine),
    )?;
    let markers = player.markers();
    player.start(block)?;

    let clock = engine.clock();
    let mut seen = 0u64;
    let mut last_block = None;
    while seen < total_steps {
        let marker = markers
            .recv_timeout(Duration::from_secs(5))
            .context("scheduler stopped producing steps")?;
        // markers arrive one look-ahead early; wait until the step sounds
        if let Some(now) = clock.now() {
            let wait = marker.time - now;
            if wait > 0.0 {
                std::thread::sleep(Duration::from_secs_f64(wait));
            }
        }
        if last_block != Some(marker.block) {
            info!(block = marker.block, "playing block");
            last_block = Some(marker.block);
        }
        seen += 1;
    }

    player.stop()?;
    std::thread::sleep(Duration::from_secs_f32(config.engine.max_voice_seconds.max(0.0)));
    Ok(())
}

fn render(
    config: &HostConfig,
    file: &Path,
    output: &Path,
    bpm: Option<u32>,
    loops: usize,
    float: bool,
) -> Result<()> {
    let session = load_with_tempo(file, bpm)?;
    let renderer = OfflineRenderer::new(config.engine.clone());
    let rendered = renderer.render(&session, loops)?;
    if rendered.peak() >= 1.0 {
        warn!("render clipped, consider lowering master_gain");
    }

    let mut export_config = config.export.clone();
    if float {
        export_config.bit_depth = BitDepth::Float32;
    }
    export::write_wav(output, &rendered, &export_config)?;
    println!(
        "{} -> {} ({:.2}s, {} triggers)",
        file.display(),
        output.display(),
        rendered.duration_seconds(),
        rendered.events.len()
    );
    Ok(())
}

fn print_info(session: &Session) {
    println!("bpm:    {}", session.bpm());
    println!("blocks: {} ({} steps)", session.block_count(), session.pattern().total_steps());
    for synth in session.synths() {
        let notes: usize = session
            .pattern()
            .blocks()
            .iter()
            .filter_map(|b| b.tracks.get(&synth.id))
            .map(|lane| lane.iter().flatten().count())
            .sum();
        println!(
            "track {}: {} notes, {:?}, cutoff {} resonance {}",
            synth.id, notes, synth.waveform, synth.filter_cutoff, synth.filter_resonance
        );
    }
    let kit = &session.drums;
    for channel in kit.channels.iter() {
        let hits: usize = session
            .pattern()
            .blocks()
            .iter()
            .map(|b| b.drums.iter().filter(|d| d.contains(&channel.index)).count())
            .sum();
        println!(
            "drum {} {:<9} variant {} volume {:>3} color {} hits {}",
            channel.index,
            channel.kind.tag(),
            channel.variant,
            channel.volume,
            channel.color_id,
            hits
        );
    }
    println!("drum master volume {}", kit.master_volume);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_render_flags() {
        let cli = Cli::try_parse_from(["squelch", "render", "a.csv", "-o", "b.wav", "--loops", "3", "--float"]).unwrap();
        match cli.command {
            Commands::Render {
                file,
                output,
                loops,
                float,
                bpm,
            } => {
                assert_eq!(file, PathBuf::from("a.csv"));
                assert_eq!(output, PathBuf::from("b.wav"));
                assert_eq!(loops, 3);
                assert!(float);
                assert_eq!(bpm, None);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn render_writes_a_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("p.csv");
        let output = dir.path().join("p.wav");
        let mut session = Session::new();
        session.toggle_drum(0, 0, 0).unwrap();
        project_io::save_session(&session, &input).unwrap();

        let mut config = HostConfig::default();
        config.engine.sample_rate = 8000;
        render(&config, &input, &output, Some(180), 1, false).unwrap();
        assert!(output.metadata().unwrap().len() > 44);
    }
}
