//! Standard MIDI File (format 1) export and best-effort import.
//!
//! Export writes a tempo track, one drum track on channel 10 when any hit exists,
//! and one track per bass lane. Import folds every non-drum channel onto a single
//! bass lane, last write per step wins.

use tracing::{debug, instrument, warn};

use crate::error::MidiError;
use crate::note::Note;
use crate::pattern::DEFAULT_TRACK_ID;
use crate::session::Session;
use crate::{MAX_BLOCKS, MIDI_PPQ, STEPS_PER_BEAT, STEPS_PER_BLOCK};

pub const DRUM_CHANNEL: u8 = 9;
const DRUM_VELOCITY: u8 = 100;
const DRUM_GATE_TICKS: u32 = 60;
const ACCENT_VELOCITY: u8 = 127;
const NORMAL_VELOCITY: u8 = 90;
const BASS_GATE_MARGIN_TICKS: u32 = 10;
/// Imported notes at or above this velocity are accented.
const ACCENT_THRESHOLD: u8 = 100;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const META: u8 = 0xFF;
const META_TEMPO: u8 = 0x51;
const META_END_OF_TRACK: u8 = 0x2F;

fn ticks_per_step(ppq: u16) -> u32 {
    (ppq as u32 / STEPS_PER_BEAT).max(1)
}

/// General MIDI note for a drum channel index.
pub fn drum_note(channel_index: usize) -> u8 {
    match channel_index {
        0 => 36,
        1 => 38,
        2 => 42,
        3 => 46,
        n => (48 + n).min(127) as u8,
    }
}

/// Collapses a General MIDI drum note onto one of the four importable slots.
pub fn drum_slot(note: u8) -> usize {
    match note {
        38 | 40 => 1,
        42 | 44 | 46 => 2,
        n if n >= 47 => 3,
        _ => 0,
    }
}

/// MIDI channel for the n-th bass lane, skipping the drum channel.
pub fn bass_channel(lane: usize) -> u8 {
    const MELODIC: [u8; 15] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15];
    MELODIC[lane % MELODIC.len()]
}

#[derive(Debug, Clone, Copy)]
struct TimedEvent {
    tick: u32,
    /// Note-offs sort before note-ons on the same tick.
    order: u8,
    status: u8,
    note: u8,
    velocity: u8,
}

impl TimedEvent {
    fn pair(tick: u32, gate: u32, channel: u8, note: u8, velocity: u8) -> [TimedEvent; 2] {
        [
            TimedEvent {
                tick,
                order: 1,
                status: NOTE_ON | channel,
                note,
                velocity,
            },
            TimedEvent {
                tick: tick + gate,
                order: 0,
                status: NOTE_OFF | channel,
                note,
                velocity: 0,
            },
        ]
    }
}

pub fn write_vlq(out: &mut Vec<u8>, mut value: u32) {
    let mut buffer = [0u8; 5];
    let mut len = 0;
    loop {
        buffer[len] = (value & 0x7F) as u8;
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for (i, byte) in buffer[..len].iter().rev().enumerate() {
        let continuation = if i + 1 < len { 0x80 } else { 0 };
        out.push(byte | continuation);
    }
}

/// Reads a variable-length quantity, advancing `pos`. At most four bytes are consumed.
pub fn read_vlq(data: &[u8], pos: &mut usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..4 {
        let byte = *data.get(*pos)?;
        *pos += 1;
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

fn encode_track(mut events: Vec<TimedEvent>) -> Vec<u8> {
    events.sort_by_key(|e| (e.tick, e.order));
    let mut bytes = Vec::with_capacity(events.len() * 4 + 4);
    let mut previous = 0u32;
    for event in events {
        write_vlq(&mut bytes, event.tick - previous);
        bytes.extend_from_slice(&[event.status, event.note, event.velocity]);
        previous = event.tick;
    }
    bytes.extend_from_slice(&[0x00, META, META_END_OF_TRACK, 0x00]);
    bytes
}

fn tempo_track(bpm: u32) -> Vec<u8> {
    let micros = (60_000_000.0 / bpm.max(1) as f64).round() as u32;
    let mut bytes = vec![0x00, META, META_TEMPO, 0x03];
    bytes.extend_from_slice(&micros.to_be_bytes()[1..]);
    bytes.extend_from_slice(&[0x00, META, META_END_OF_TRACK, 0x00]);
    bytes
}

#[instrument(skip_all, fields(bpm = session.bpm(), blocks = session.block_count()))]
pub fn export_midi(session: &Session) -> Vec<u8> {
    let pattern = session.pattern();
    let step_ticks = ticks_per_step(MIDI_PPQ);
    let step_tick = |block: usize, step: usize| {
        ((block * pattern.steps_per_block() + step) as u32) * step_ticks
    };

    let mut tracks = vec![tempo_track(session.bpm())];

    let mut drum_events = Vec::new();
    for (b, block) in pattern.blocks().iter().enumerate() {
        for (s, hits) in block.drums.iter().enumerate() {
            for &index in hits {
                drum_events.extend(TimedEvent::pair(
                    step_tick(b, s),
                    DRUM_GATE_TICKS,
                    DRUM_CHANNEL,
                    drum_note(index),
                    DRUM_VELOCITY,
                ));
            }
        }
    }
    if !drum_events.is_empty() {
        tracks.push(encode_track(drum_events));
    }

    let bass_gate = step_ticks.saturating_sub(BASS_GATE_MARGIN_TICKS).max(1);
    for (lane, id) in pattern.track_ids().iter().enumerate() {
        let channel = bass_channel(lane);
        let mut events = Vec::new();
        for (b, block) in pattern.blocks().iter().enumerate() {
            let Some(notes) = block.tracks.get(id) else {
                continue;
            };
            for (s, note) in notes.iter().enumerate() {
                if let Some(note) = note {
                    let velocity = if note.accent { ACCENT_VELOCITY } else { NORMAL_VELOCITY };
                    events.extend(TimedEvent::pair(
                        step_tick(b, s),
                        bass_gate,
                        channel,
                        note.midi_number(),
                        velocity,
                    ));
                }
            }
        }
        tracks.push(encode_track(events));
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&MIDI_PPQ.to_be_bytes());
    for track in &tracks {
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track.len() as u32).to_be_bytes());
        out.extend_from_slice(track);
    }
    debug!(tracks = tracks.len(), bytes = out.len(), "midi export completed");
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NoteOnEvent {
    tick: u64,
    channel: u8,
    note: u8,
    velocity: u8,
}

#[derive(Debug, Default)]
struct TrackScan {
    notes: Vec<NoteOnEvent>,
    tempo_micros: Option<u32>,
}

fn scan_track(data: &[u8], scan: &mut TrackScan) {
    let mut pos = 0usize;
    let mut tick = 0u64;
    let mut running: Option<u8> = None;

    while pos < data.len() {
        let Some(delta) = read_vlq(data, &mut pos) else {
            warn!(pos, "unterminated delta time, dropping rest of track");
            return;
        };
        tick += delta as u64;

        let Some(&lead) = data.get(pos) else {
            return;
        };
        let status = if lead >= 0x80 {
            pos += 1;
            if lead < 0xF0 {
                running = Some(lead);
            }
            lead
        } else if let Some(previous) = running {
            previous
        } else {
            warn!(pos, "data byte without running status, dropping rest of track");
            return;
        };

        match status {
            META => {
                let Some(&kind) = data.get(pos) else {
                    return;
                };
                pos += 1;
                let Some(len) = read_vlq(data, &mut pos) else {
                    return;
                };
                let len = len as usize;
                if kind == META_TEMPO && len == 3 && pos + 3 <= data.len() {
                    let micros = u32::from_be_bytes([0, data[pos], data[pos + 1], data[pos + 2]]);
                    scan.tempo_micros.get_or_insert(micros);
                }
                if kind == META_END_OF_TRACK {
                    return;
                }
                pos += len;
            }
            0xF0 | 0xF7 => {
                let Some(len) = read_vlq(data, &mut pos) else {
                    return;
                };
                pos += len as usize;
            }
            _ => {
                let data_len = match status & 0xF0 {
                    0xC0 | 0xD0 => 1,
                    _ => 2,
                };
                if pos + data_len > data.len() {
                    return;
                }
                if status & 0xF0 == NOTE_ON && data[pos + 1] > 0 {
                    scan.notes.push(NoteOnEvent {
                        tick,
                        channel: status & 0x0F,
                        note: data[pos],
                        velocity: data[pos + 1],
                    });
                }
                pos += data_len;
            }
        }
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, MidiError> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(MidiError::Truncated(at))
}

/// Parses an SMF into a fresh session. The caller swaps it in only on `Ok`.
#[instrument(skip_all, fields(bytes = bytes.len()))]
pub fn import_midi(bytes: &[u8]) -> Result<Session, MidiError> {
    if bytes.len() < 14 || &bytes[0..4] != b"MThd" {
        return Err(MidiError::BadHeader);
    }
    let header_len = read_u32(bytes, 4)? as usize;
    let division = u16::from_be_bytes([bytes[12], bytes[13]]);
    // SMPTE timing (top bit set) has no beat grid; fall back to the export division.
    let ppq = if division == 0 || division & 0x8000 != 0 {
        MIDI_PPQ
    } else {
        division
    };
    let step_ticks = ticks_per_step(ppq) as f64;

    let mut scan = TrackScan::default();
    let mut pos = 8 + header_len.max(6);
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let len = read_u32(bytes, pos + 4)? as usize;
        let start = pos + 8;
        let end = start.checked_add(len).ok_or(MidiError::Truncated(pos))?;
        if end > bytes.len() {
            return Err(MidiError::Truncated(bytes.len()));
        }
        if id == b"MTrk" {
            scan_track(&bytes[start..end], &mut scan);
        } else {
            debug!(chunk = ?String::from_utf8_lossy(id), "skipping unknown chunk");
        }
        pos = end;
    }

    let to_step = |tick: u64| (tick as f64 / step_ticks).round() as usize;
    let step_limit = MAX_BLOCKS * STEPS_PER_BLOCK;
    let before = scan.notes.len();
    scan.notes.retain(|n| to_step(n.tick) < step_limit);
    if scan.notes.len() < before {
        debug!(
            dropped = before - scan.notes.len(),
            max_blocks = MAX_BLOCKS,
            "notes past the block limit"
        );
    }
    let last_step = scan.notes.iter().map(|n| to_step(n.tick)).max().unwrap_or(0);
    let block_count = (last_step + 1).div_ceil(STEPS_PER_BLOCK).max(1);

    let bpm = scan
        .tempo_micros
        .filter(|us| *us > 0)
        .map(|us| (60_000_000.0 / us as f64).round() as u32)
        .unwrap_or(crate::DEFAULT_BPM);
    let mut session = Session::blank(bpm, block_count);
    session.ensure_bass_track(DEFAULT_TRACK_ID);

    for event in &scan.notes {
        let step = to_step(event.tick);
        let (block, step) = (step / STEPS_PER_BLOCK, step % STEPS_PER_BLOCK);
        let result = if event.channel == DRUM_CHANNEL {
            session.set_drum(block, step, drum_slot(event.note), true)
        } else {
            let note = Note::from_midi(event.note).with_accent(event.velocity >= ACCENT_THRESHOLD);
            session.set_note(block, DEFAULT_TRACK_ID, step, Some(note))
        };
        if let Err(e) = result {
            debug!(error = %e, "skipping imported note");
        }
    }

    debug!(
        notes = scan.notes.len(),
        blocks = session.block_count(),
        bpm = session.bpm(),
        "midi import completed"
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::PitchClass;

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn header(tracks: u16) -> Vec<u8> {
        let mut body = vec![0, 1];
        body.extend_from_slice(&tracks.to_be_bytes());
        body.extend_from_slice(&MIDI_PPQ.to_be_bytes());
        chunk(b"MThd", &body)
    }

    #[test]
    fn vlq_encoding() {
        let cases: [(u32, &[u8]); 5] = [
            (0, &[0x00]),
            (0x7F, &[0x7F]),
            (0x80, &[0x81, 0x00]),
            (0x3FFF, &[0xFF, 0x7F]),
            (0x0FFF_FFFF, &[0xFF, 0xFF, 0xFF, 0x7F]),
        ];
        for (value, expected) in cases {
            let mut out = Vec::new();
            write_vlq(&mut out, value);
            assert_eq!(out, expected);
            let mut pos = 0;
            assert_eq!(read_vlq(&out, &mut pos), Some(value));
            assert_eq!(pos, expected.len());
        }
    }

    #[test]
    fn header_and_tempo_track_layout() {
        let mut session = Session::new();
        session.set_bpm(125);
        let bytes = export_midi(&session);
        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[4..8], &[0, 0, 0, 6]);
        assert_eq!(&bytes[8..10], &[0, 1]);
        // tempo track + one bass lane, no drum hits
        assert_eq!(&bytes[10..12], &[0, 2]);
        assert_eq!(&bytes[12..14], &[0x01, 0xE0]);
        assert_eq!(&bytes[14..18], b"MTrk");
        assert_eq!(&bytes[18..22], &[0, 0, 0, 11]);
        // 480000 us per beat
        assert_eq!(&bytes[22..33], &[0x00, 0xFF, 0x51, 0x03, 0x07, 0x53, 0x00, 0x00, 0xFF, 0x2F, 0x00]);
    }

    #[test]
    fn c3_exports_as_note_48_and_back() {
        let mut session = Session::new();
        session
            .set_note(0, DEFAULT_TRACK_ID, 0, Some(Note::new(PitchClass::C, 3)))
            .unwrap();
        let bytes = export_midi(&session);
        let note_on = [0x00, NOTE_ON, 48, NORMAL_VELOCITY];
        assert!(bytes.windows(4).any(|w| w == note_on));
        // note-off 110 ticks later
        assert!(bytes.windows(4).any(|w| w == [110, NOTE_OFF, 48, 0]));

        let imported = import_midi(&bytes).unwrap();
        assert_eq!(
            imported.note(0, DEFAULT_TRACK_ID, 0),
            Some(&Note::new(PitchClass::C, 3))
        );
    }

    #[test]
    fn drum_track_uses_channel_ten() {
        let mut session = Session::new();
        session.set_drum(0, 2, 1, true).unwrap();
        session.set_drum(0, 2, 6, true).unwrap();
        let bytes = export_midi(&session);
        assert_eq!(&bytes[10..12], &[0, 3]);
        // step 2 = 240 ticks = VLQ 81 70
        assert!(bytes.windows(5).any(|w| w == [0x81, 0x70, 0x99, 38, DRUM_VELOCITY]));
        assert!(bytes.windows(4).any(|w| w == [0x00, 0x99, 54, DRUM_VELOCITY]));

        let imported = import_midi(&bytes).unwrap();
        let hits = &imported.pattern().block(0).unwrap().drums[2];
        assert!(hits.contains(&1));
        assert!(hits.contains(&3));
    }

    #[test]
    fn drum_note_mapping() {
        assert_eq!(drum_note(0), 36);
        assert_eq!(drum_note(3), 46);
        assert_eq!(drum_note(8), 56);
        assert_eq!(drum_slot(36), 0);
        assert_eq!(drum_slot(40), 1);
        assert_eq!(drum_slot(44), 2);
        assert_eq!(drum_slot(56), 3);
        assert_eq!(drum_slot(41), 0);
    }

    #[test]
    fn bass_channels_skip_drums() {
        let channels: Vec<u8> = (0..11).map(bass_channel).collect();
        assert_eq!(channels, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11]);
    }

    #[test]
    fn running_status_and_zero_velocity() {
        let body = [
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 120 bpm
            0x00, 0x90, 40, 100, // E2 accented at step 0
            0x78, 43, 0,         // running status note-on velocity 0 is a note-off
            0x00, 45, 64,        // running status A2 at step 1
            0x00, 0xB0, 7, 100,  // control change skipped
            0x00, 0xC0, 5,       // program change skipped
            0x00, 0xE0, 0, 64,   // pitch bend skipped
            0x78, 0x80, 45, 0,   // note-off
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let mut file = header(1);
        file.extend(chunk(b"MTrk", &body));

        let session = import_midi(&file).unwrap();
        assert_eq!(session.bpm(), 120);
        let lane = &session.pattern().block(0).unwrap().tracks[DEFAULT_TRACK_ID];
        assert_eq!(lane[0], Some(Note::new(PitchClass::E, 2).with_accent(true)));
        assert_eq!(lane[1], Some(Note::new(PitchClass::A, 2)));
        assert_eq!(lane.iter().flatten().count(), 2);
    }

    #[test]
    fn non_drum_channels_collapse_last_write_wins() {
        let first = [0x00, 0x90, 48, 90, 0x00, 0xFF, 0x2F, 0x00];
        let second = [0x00, 0x93, 55, 90, 0x00, 0xFF, 0x2F, 0x00];
        let mut file = header(2);
        file.extend(chunk(b"MTrk", &first));
        file.extend(chunk(b"MTrk", &second));

        let session = import_midi(&file).unwrap();
        assert_eq!(session.synths().len(), 1);
        assert_eq!(session.note(0, DEFAULT_TRACK_ID, 0), Some(&Note::from_midi(55)));
    }

    #[test]
    fn notes_past_first_block_grow_the_session() {
        // 40 steps * 120 ticks = 4800 = VLQ A5 40
        let body = [0xA5, 0x40, 0x90, 36, 90, 0x00, 0xFF, 0x2F, 0x00];
        let mut file = header(1);
        file.extend(chunk(b"MTrk", &body));
        let session = import_midi(&file).unwrap();
        assert_eq!(session.block_count(), 3);
        assert!(session.note(2, DEFAULT_TRACK_ID, 8).is_some());
    }

    #[test]
    fn notes_past_block_limit_are_dropped() {
        let mut body = vec![0x00, 0x90, 40, 100];
        for _ in 0..20 {
            // 0x0FFF_FFFF ticks, the largest delta a VLQ can carry
            body.extend([0xFF, 0xFF, 0xFF, 0x7F, 36, 90]);
        }
        body.extend([0x00, 0xFF, 0x2F, 0x00]);
        let mut file = header(1);
        file.extend(chunk(b"MTrk", &body));

        let session = import_midi(&file).unwrap();
        assert_eq!(session.block_count(), 1);
        assert_eq!(
            session.note(0, DEFAULT_TRACK_ID, 0),
            Some(&Note::new(PitchClass::E, 2).with_accent(true))
        );
    }

    #[test]
    fn rejects_bad_header_and_truncation() {
        assert_eq!(import_midi(b"RIFF0000000000").unwrap_err(), MidiError::BadHeader);
        assert_eq!(import_midi(b"MThd").unwrap_err(), MidiError::BadHeader);

        let mut file = header(1);
        file.extend_from_slice(b"MTrk");
        file.extend_from_slice(&100u32.to_be_bytes());
        file.extend_from_slice(&[0x00, 0x90]);
        assert!(matches!(import_midi(&file), Err(MidiError::Truncated(_))));
    }
}
