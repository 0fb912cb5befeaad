use std::path::Path;

use anyhow::{bail, Context};
use squelch_shared::{csv_codec, midi_codec, Session};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    Csv,
    Midi,
}

impl ProjectFormat {
    /// Picks the codec from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, anyhow::Error> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") | Some("txt") => Ok(ProjectFormat::Csv),
            Some("mid") | Some("midi") | Some("smf") => Ok(ProjectFormat::Midi),
            _ => bail!("unknown pattern file type: {}", path.display()),
        }
    }
}

pub fn load_session(path: &Path) -> Result<Session, anyhow::Error> {
    let session = match ProjectFormat::from_path(path)? {
        ProjectFormat::Csv => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            csv_codec::import_csv(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        ProjectFormat::Midi => {
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            midi_codec::import_midi(&bytes).with_context(|| format!("parsing {}", path.display()))?
        }
    };
    info!(
        path = %path.display(),
        bpm = session.bpm(),
        blocks = session.block_count(),
        "loaded session"
    );
    Ok(session)
}

pub fn save_session(session: &Session, path: &Path) -> Result<(), anyhow::Error> {
    let bytes = match ProjectFormat::from_path(path)? {
        ProjectFormat::Csv => csv_codec::export_csv(session).into_bytes(),
        ProjectFormat::Midi => midi_codec::export_midi(session),
    };
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "saved session");
    Ok(())
}
