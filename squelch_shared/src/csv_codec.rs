//! Text session format.
//!
//! ```text
//! <bpm>-<totalSteps>-<synthCount>,1,2,...,<totalSteps>
//! <id>:<vol>-<dist>-<distTone>-<distGain>-<cutoff>-<res>-<envMod>-<decay>-<accent>-<wave>,<cell>,...
//! drums:<masterVol>:<channelCount>|<type>-<variant>-<vol>-<colorId>|...,<bits>,...
//! ```
//!
//! Only a bad header aborts an import. Malformed cells, parameters and channel
//! entries are skipped one at a time.

use std::fmt::Write as _;
use tracing::{debug, instrument, warn};

use crate::drums::{DrumKind, DrumKit};
use crate::error::CsvError;
use crate::note::{Note, PitchClass};
use crate::session::Session;
use crate::synth::{BassSynthState, Waveform};
use crate::{DRUM_CHANNEL_COUNT, MAX_BLOCKS, STEPS_PER_BLOCK};

const DRUMS_TOKEN: &str = "drums";

#[instrument(skip_all, fields(bpm = session.bpm(), blocks = session.block_count()))]
pub fn export_csv(session: &Session) -> String {
    let pattern = session.pattern();
    let total_steps = pattern.total_steps();
    let mut out = String::new();

    let _ = write!(out, "{}-{}-{}", session.bpm(), total_steps, session.synths().len());
    for column in 1..=total_steps {
        let _ = write!(out, ",{column}");
    }
    out.push('\n');

    for synth in session.synths() {
        write_synth_config(&mut out, synth);
        for block in pattern.blocks() {
            let lane = block.tracks.get(&synth.id);
            for step in 0..pattern.steps_per_block() {
                let note = lane.and_then(|l| l.get(step)).and_then(Option::as_ref);
                out.push(',');
                write_note_cell(&mut out, note);
            }
        }
        out.push('\n');
    }

    write_drum_config(&mut out, &session.drums);
    for block in pattern.blocks() {
        for step in 0..pattern.steps_per_block() {
            out.push(',');
            let active = block.drums.get(step);
            for channel in 0..DRUM_CHANNEL_COUNT {
                let on = active.is_some_and(|set| set.contains(&channel));
                out.push(if on { '1' } else { '0' });
            }
        }
    }
    out.push('\n');

    debug!(bytes = out.len(), "csv export completed");
    out
}

fn write_synth_config(out: &mut String, synth: &BassSynthState) {
    let _ = write!(out, "{}:", synth.id);
    for value in synth.numeric_params() {
        let _ = write!(out, "{value}-");
    }
    let _ = write!(out, "{}", synth.waveform.csv_value());
}

fn write_note_cell(out: &mut String, note: Option<&Note>) {
    match note {
        None => out.push('0'),
        Some(n) => {
            let _ = write!(
                out,
                "{}-{}-{}-{}",
                n.pitch.csv_index(),
                n.octave,
                u8::from(n.slide),
                u8::from(n.accent)
            );
        }
    }
}

fn write_drum_config(out: &mut String, kit: &DrumKit) {
    let _ = write!(out, "{DRUMS_TOKEN}:{}:{}", kit.master_volume, kit.channels.len());
    for channel in &kit.channels {
        let _ = write!(
            out,
            "|{}-{}-{}-{}",
            channel.kind.tag(),
            channel.variant,
            channel.volume,
            channel.color_id
        );
    }
}

/// Parses a full session. The caller swaps it in only on `Ok`.
#[instrument(skip_all, fields(bytes = text.len()))]
pub fn import_csv(text: &str) -> Result<Session, CsvError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() < 2 {
        return Err(CsvError::TooFewLines(lines.len()));
    }

    let (bpm, total_steps) = parse_header(lines[0])?;
    let block_count = total_steps.div_ceil(STEPS_PER_BLOCK);
    let mut session = Session::blank(bpm, block_count);

    for line in &lines[1..] {
        let mut fields = line.split(',');
        let config = fields.next().unwrap_or_default().trim();
        let cells: Vec<&str> = fields.take(total_steps).map(str::trim).collect();

        if config.starts_with(DRUMS_TOKEN) {
            parse_drum_line(&mut session, config, &cells);
        } else if config.contains(':') {
            parse_synth_line(&mut session, config, &cells);
        } else {
            debug!(line = %config, "skipping unrecognised line");
        }
    }

    debug!(
        blocks = session.block_count(),
        synths = session.synths().len(),
        "csv import completed"
    );
    Ok(session)
}

fn parse_header(line: &str) -> Result<(u32, usize), CsvError> {
    let field = line.split(',').next().unwrap_or_default().trim();
    let mut parts = field.split('-');
    let bpm_text = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CsvError::MalformedHeader(field.to_string()))?;
    let steps_text = parts
        .next()
        .ok_or_else(|| CsvError::MalformedHeader(field.to_string()))?;

    let bpm = bpm_text
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|bpm| *bpm > 0)
        .ok_or_else(|| CsvError::InvalidBpm(bpm_text.to_string()))?;
    let total_steps = steps_text
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|steps| (1..=MAX_BLOCKS * STEPS_PER_BLOCK).contains(steps))
        .ok_or_else(|| CsvError::InvalidStepCount(steps_text.to_string()))?;
    Ok((bpm, total_steps))
}

fn cell_position(index: usize) -> (usize, usize) {
    (index / STEPS_PER_BLOCK, index % STEPS_PER_BLOCK)
}

fn parse_synth_line(session: &mut Session, config: &str, cells: &[&str]) {
    let Some((id, params)) = config.split_once(':') else {
        return;
    };
    let id = id.trim();
    if id.is_empty() {
        debug!("skipping synth line with empty id");
        return;
    }

    let mut values = params.split('-').map(str::trim);
    let numeric: [Option<f32>; 9] =
        std::array::from_fn(|_| values.next().and_then(|v| v.parse::<f32>().ok()));
    let waveform = values
        .next()
        .and_then(|v| v.parse::<u8>().ok())
        .map(Waveform::from_csv_value);

    let synth = session.ensure_bass_track(id);
    synth.apply_numeric_params(numeric);
    if let Some(waveform) = waveform {
        synth.waveform = waveform;
    }

    for (index, cell) in cells.iter().enumerate() {
        let Some(note) = parse_note_cell(cell) else {
            continue;
        };
        let (block, step) = cell_position(index);
        if let Err(e) = session.set_note(block, id, step, Some(note)) {
            debug!(error = %e, index, "skipping note cell");
        }
    }
}

/// `<pitch 1-12>-<octave>-<slide>-<accent>`. Anything else is treated as empty.
fn parse_note_cell(cell: &str) -> Option<Note> {
    if cell.is_empty() || cell == "0" {
        return None;
    }
    let parts: Vec<&str> = cell.split('-').collect();
    if parts.len() != 4 {
        debug!(cell, "note cell does not have 4 fields");
        return None;
    }
    let pitch = parts[0].parse::<u8>().ok().and_then(PitchClass::from_csv_index)?;
    let octave = parts[1].parse::<u8>().ok()?;
    Some(
        Note::new(pitch, octave)
            .with_slide(parts[2] == "1")
            .with_accent(parts[3] == "1"),
    )
}

fn parse_drum_line(session: &mut Session, config: &str, cells: &[&str]) {
    let mut segments = config.split('|');
    let head = segments.next().unwrap_or_default();
    let mut head_parts = head.split(':').skip(1);
    let kit = &mut session.drums;

    if let Some(volume) = head_parts.next().and_then(|v| v.trim().parse::<u8>().ok()) {
        kit.master_volume = volume.min(100);
    }
    let declared = head_parts
        .next()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(DRUM_CHANNEL_COUNT);
    if declared != DRUM_CHANNEL_COUNT {
        debug!(declared, "drum channel count differs from kit size");
    }

    for (index, segment) in segments.take(DRUM_CHANNEL_COUNT).enumerate() {
        let mut parts = segment.split('-').map(str::trim);
        let kind = parts.next().and_then(DrumKind::from_tag);
        let variant = parts.next().and_then(|v| v.parse::<u8>().ok());
        let volume = parts.next().and_then(|v| v.parse::<u8>().ok());
        let color_id = parts
            .next()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|c| *c < DRUM_CHANNEL_COUNT)
            .unwrap_or(index);

        let Some(channel) = kit.channel_mut(index) else {
            continue;
        };
        if let Some(kind) = kind {
            channel.kind = kind;
        }
        if let Some(variant) = variant {
            channel.variant = variant;
        }
        if let Some(volume) = volume {
            channel.volume = volume.min(100);
        }
        channel.color_id = color_id;
    }

    if !kit.colors_are_permutation() {
        warn!("drum colour ids are not a permutation, resetting to channel order");
        kit.reset_colors();
    }

    for (index, cell) in cells.iter().enumerate() {
        let (block, step) = cell_position(index);
        for (channel, bit) in cell.chars().take(DRUM_CHANNEL_COUNT).enumerate() {
            if bit == '1' {
                if let Err(e) = session.set_drum(block, step, channel, true) {
                    debug!(error = %e, index, "skipping drum cell");
                }
            }
        }
    }
}
