use crate::core::io::traits::StructureFile;
use crate::core::models::structure::{AtomRecord, Snapshot};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const MIN_ATOM_LINE_LEN: usize = 54;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_int<T: std::str::FromStr>(
    value: &str,
    columns: &str,
    line: usize,
) -> Result<T, PdbError> {
    value.parse().map_err(|_| PdbError::Parse {
        line,
        kind: PdbParseErrorKind::InvalidInt {
            columns: columns.into(),
            value: value.into(),
        },
    })
}

fn parse_float(value: &str, columns: &str, line: usize) -> Result<f64, PdbError> {
    value.parse().map_err(|_| PdbError::Parse {
        line,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: columns.into(),
            value: value.into(),
        },
    })
}

fn parse_atom_line(line: &str, line_num: usize, hetero: bool) -> Result<AtomRecord, PdbError> {
    if line.len() < MIN_ATOM_LINE_LEN {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::LineTooShort,
        });
    }

    let serial_str = slice_and_trim(line, 6, 11);
    let name_str = slice_and_trim(line, 12, 16);
    let res_name_str = slice_and_trim(line, 17, 20);
    let chain_id_str = slice_and_trim(line, 21, 22);
    let res_seq_str = slice_and_trim(line, 22, 26);
    let x_str = slice_and_trim(line, 30, 38);
    let y_str = slice_and_trim(line, 38, 46);
    let z_str = slice_and_trim(line, 46, 54);
    let element_str = slice_and_trim(line, 76, 78);

    if name_str.is_empty() {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::MissingRequiredField {
                columns: "13-16".into(),
            },
        });
    }

    let element = if element_str.is_empty() {
        name_str
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(String::from)
            .unwrap_or_default()
    } else {
        element_str.to_string()
    };

    Ok(AtomRecord {
        serial: parse_int(serial_str, "7-11", line_num)?,
        name: name_str.to_string(),
        residue_name: res_name_str.to_string(),
        chain_id: chain_id_str.chars().next().unwrap_or('A'),
        residue_number: parse_int(res_seq_str, "23-26", line_num)?,
        position: Point3::new(
            parse_float(x_str, "31-38", line_num)?,
            parse_float(y_str, "39-46", line_num)?,
            parse_float(z_str, "47-54", line_num)?,
        ),
        element,
        hetero,
    })
}

fn format_atom_name(name: &str) -> String {
    if name.len() < 4 {
        format!(" {:<3}", name)
    } else {
        name.to_string()
    }
}

fn write_atoms(snapshot: &Snapshot, writer: &mut impl Write) -> io::Result<()> {
    for atom in snapshot.atoms() {
        let record_type = if atom.hetero { "HETATM" } else { "ATOM" };
        writeln!(
            writer,
            "{:<6}{:>5} {:<4}{:1}{:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
            record_type,
            atom.serial,
            format_atom_name(&atom.name),
            ' ',
            atom.residue_name,
            atom.chain_id,
            atom.residue_number,
            ' ',
            atom.position.x,
            atom.position.y,
            atom.position.z,
            1.0,
            0.0,
            atom.element
        )?;
    }
    Ok(())
}

pub struct PdbFile;

impl PdbFile {
    /// Writes several frames as a `MODEL`/`ENDMDL` trajectory.
    pub fn write_frames_to(frames: &[Snapshot], writer: &mut impl Write) -> Result<(), PdbError> {
        for (i, frame) in frames.iter().enumerate() {
            writeln!(writer, "MODEL     {:>4}", i + 1)?;
            write_atoms(frame, writer)?;
            writeln!(writer, "ENDMDL")?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

impl StructureFile for PdbFile {
    type Error = PdbError;

    fn read_frames_from(reader: &mut impl BufRead) -> Result<Vec<Snapshot>, Self::Error> {
        let mut frames = Vec::new();
        let mut current = Snapshot::default();
        let mut in_model = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match slice_and_trim(&line, 0, 6) {
                "ATOM" | "HETATM" => {
                    let hetero = line.starts_with("HETATM");
                    current.push(parse_atom_line(&line, line_num, hetero)?);
                }
                "MODEL" => {
                    if in_model {
                        return Err(PdbError::Inconsistency(format!(
                            "MODEL on line {} opened before the previous ENDMDL",
                            line_num
                        )));
                    }
                    in_model = true;
                }
                "ENDMDL" => {
                    in_model = false;
                    frames.push(std::mem::take(&mut current));
                }
                "END" => break,
                _ => {}
            }
        }

        if !current.is_empty() {
            frames.push(current);
        }
        if frames.iter().all(Snapshot::is_empty) {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        if let Some(first) = frames.first() {
            if let Some(bad) = frames.iter().position(|f| f.len() != first.len()) {
                return Err(PdbError::Inconsistency(format!(
                    "frame {} has {} atoms, expected {}",
                    bad + 1,
                    frames[bad].len(),
                    first.len()
                )));
            }
        }
        Ok(frames)
    }

    fn write_to(snapshot: &Snapshot, writer: &mut impl Write) -> Result<(), Self::Error> {
        write_atoms(snapshot, writer)?;
        writeln!(writer, "END")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TWO_ATOMS: &str = "\
REMARK test peptide
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
END
";

    fn snapshot(offset: f64) -> Snapshot {
        Snapshot::new(vec![
            AtomRecord {
                serial: 1,
                name: "N".into(),
                residue_name: "ALA".into(),
                chain_id: 'A',
                residue_number: 1,
                position: Point3::new(offset, 1.0, 2.0),
                element: "N".into(),
                hetero: false,
            },
            AtomRecord {
                serial: 2,
                name: "CA".into(),
                residue_name: "ALA".into(),
                chain_id: 'A',
                residue_number: 1,
                position: Point3::new(offset + 1.5, 1.0, 2.0),
                element: "C".into(),
                hetero: false,
            },
        ])
    }

    #[test]
    fn reads_single_frame_file() {
        let frames = PdbFile::read_frames_from(&mut Cursor::new(TWO_ATOMS)).unwrap();
        assert_eq!(frames.len(), 1);
        let atoms = frames[0].atoms();
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[1].name, "CA");
        assert_eq!(atoms[1].residue_name, "ALA");
        assert_eq!(atoms[1].chain_id, 'A');
        assert!((atoms[1].position.x - 11.639).abs() < 1e-9);
        assert_eq!(atoms[1].element, "C");
    }

    #[test]
    fn written_snapshot_is_read_back_unchanged() {
        let original = snapshot(3.25);
        let mut buffer = Vec::new();
        PdbFile::write_to(&original, &mut buffer).unwrap();

        let frames = PdbFile::read_frames_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(frames, vec![original]);
    }

    #[test]
    fn trajectory_frames_are_split_on_model_records() {
        let mut buffer = Vec::new();
        PdbFile::write_frames_to(&[snapshot(0.0), snapshot(1.0), snapshot(2.0)], &mut buffer)
            .unwrap();

        let frames = PdbFile::read_frames_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(frames.len(), 3);
        assert!((frames[2].atoms()[0].position.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn file_without_atoms_is_rejected() {
        let result = PdbFile::read_frames_from(&mut Cursor::new("REMARK empty\nEND\n"));
        assert!(matches!(result, Err(PdbError::MissingRecord(_))));
    }

    #[test]
    fn short_atom_line_is_rejected() {
        let result = PdbFile::read_frames_from(&mut Cursor::new("ATOM      1  N   ALA A   1\n"));
        assert!(matches!(
            result,
            Err(PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::LineTooShort
            })
        ));
    }

    #[test]
    fn invalid_coordinate_reports_columns() {
        let line = "ATOM      1  N   ALA A   1      11.104   abcdef  -6.504  1.00  0.00           N\n";
        let result = PdbFile::read_frames_from(&mut Cursor::new(line));
        match result {
            Err(PdbError::Parse {
                kind: PdbParseErrorKind::InvalidFloat { columns, .. },
                ..
            }) => assert_eq!(columns, "39-46"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
