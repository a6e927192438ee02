use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use audio_pipeline_core::{Command, CommandReply, ControllerState, PlaybackReport, Signals};
use audio_pipeline_host::args::{init_logging, Args};
use audio_pipeline_host::cli::HELP_TEXT;
use audio_pipeline_host::{parse_line, CliAction, HostConfig, Recorder};
use clap::Parser;

/// Extra time allowed on top of the pipeline's own stop timeout.
const REPLY_SLACK: Duration = Duration::from_secs(2);
const SAVE_WAIT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let mut config = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    args.apply(&mut config);

    let mut recorder = Recorder::start(&config).context("failed to start audio pipeline")?;
    let reply_timeout = config.pipeline.stop_timeout() + REPLY_SLACK;

    println!("=== Audio Recorder ===");
    println!("Storage: {}", recorder.storage.root().display());
    println!("Type 'help' for command list");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(CliAction::Help)) => println!("{}", HELP_TEXT),
            Ok(Some(CliAction::Quit)) => break,
            Ok(Some(CliAction::Submit(command))) => run_command(&recorder, command, reply_timeout),
            Err(e) => println!("Error: {}", e),
        }
    }

    recorder.pipeline.shutdown();
    Ok(())
}

fn run_command(recorder: &Recorder, command: Command, timeout: Duration) {
    let pipeline = &recorder.pipeline;
    match pipeline.commands().execute(command, timeout) {
        Ok(reply @ CommandReply::RecordingStopped(_)) => {
            println!("{}", reply);
            if !pipeline.wait_idle(SAVE_WAIT) {
                println!("Still writing; check 'ls' later.");
                return;
            }
            match (pipeline.state(), pipeline.last_saved()) {
                (ControllerState::Error, _) => {
                    if let Some(error) = pipeline.last_error() {
                        println!("Error: {}", error);
                    }
                }
                (_, Some(saved)) => println!("Saved {} ({:.2} s)", saved.file_name, saved.duration_secs),
                (_, None) => {}
            }
        }
        Ok(CommandReply::PlaybackStarted { name, header }) => {
            recorder.meter.reset();
            let length = Duration::from_secs_f64(header.format().duration_secs(header.sample_count()));
            println!("{}", CommandReply::PlaybackStarted { name, header });
            wait_for_playback(recorder, length + timeout);
        }
        Ok(reply) => println!("{}", reply),
        Err(e) => println!("Error: {}", e),
    }
}

fn wait_for_playback(recorder: &Recorder, timeout: Duration) {
    let pipeline = &recorder.pipeline;
    if pipeline.wait_for(Signals::PLAYBACK_DONE, timeout).is_none() {
        println!("Playback still running.");
        return;
    }
    match pipeline.last_playback() {
        Some(PlaybackReport { error: Some(error), .. }) => println!("Playback failed: {}", error),
        Some(report) => {
            let level = recorder
                .meter
                .peak_dbfs()
                .map_or_else(|| "silent".to_string(), |db| format!("peak {:.1} dBFS", db));
            println!("Playback completed: {} samples, {}", report.samples_played, level);
        }
        None => {}
    }
}
