use crate::core::models::structure::Snapshot;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing structure file formats.
///
/// A file holds one or more frames. Seed structures are single-frame files; trajectories
/// written by the simulation collaborator hold one frame per report interval.
pub trait StructureFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every frame from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails, no atoms are present, or the reader fails.
    fn read_frames_from(reader: &mut impl BufRead) -> Result<Vec<Snapshot>, Self::Error>;

    /// Writes a single frame to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(snapshot: &Snapshot, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads every frame from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_frames_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Snapshot>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_frames_from(&mut reader)
    }

    /// Writes a single frame to a file path and flushes it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(snapshot, &mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}
