//! Recorded input sessions: the arrival-ordered `FusionInput` stream as JSON,
//! gzip-compressed when the path ends in `.gz`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::FusionInput;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    pub inputs: Vec<FusionInput>,
}

impl SessionLog {
    pub fn accel_count(&self) -> usize {
        self.inputs
            .iter()
            .filter(|i| matches!(i, FusionInput::Accel(_)))
            .count()
    }

    pub fn velocity_count(&self) -> usize {
        self.inputs.len() - self.accel_count()
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

pub fn load_session<P: AsRef<Path>>(path: P) -> Result<SessionLog> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let log: SessionLog = if is_gzip(path) {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))?
    } else {
        serde_json::from_reader(BufReader::new(file))?
    };
    info!("session: loaded {} inputs from {}", log.inputs.len(), path.display());
    Ok(log)
}

pub fn save_session<P: AsRef<Path>>(path: P, log: &SessionLog) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    if is_gzip(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, log)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, log)?;
        writer.flush()?;
    }
    info!("session: saved {} inputs to {}", log.inputs.len(), path.display());
    Ok(())
}
