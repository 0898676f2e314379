use nalgebra::Point3;

/// One atom of a structural snapshot.
///
/// Only the fields needed to hand a configuration to the simulation engine are kept; the
/// physics engine owns topology and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    pub serial: usize,
    pub name: String,
    pub residue_name: String,
    pub chain_id: char,
    pub residue_number: isize,
    pub position: Point3<f64>,
    pub element: String,
    /// `true` for `HETATM` records.
    pub hetero: bool,
}

/// A single frame of a molecular configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    atoms: Vec<AtomRecord>,
}

impl Snapshot {
    pub fn new(atoms: Vec<AtomRecord>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[AtomRecord] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn push(&mut self, atom: AtomRecord) {
        self.atoms.push(atom);
    }
}
